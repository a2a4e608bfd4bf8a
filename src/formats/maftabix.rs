//! MafTabix block decoding.
//!
//! MafTabix flattens each MAF block onto one BED row of a bgzip/Tabix
//! file. The fifth extra column holds the alignments as comma-separated
//! tuples:
//!
//! ```text
//! assembly.chr:start:srcSize:strand:unknown:seq
//! ```
//!
//! Assembly names here may carry numeric version suffixes
//! (`ce11.2.chrI`), so source names are split with the versioned
//! heuristic. Each tuple's sequence is packed as it is parsed.

use log::warn;

use crate::model::{resolve_reference_row, AlignmentBlock, AlignmentRow, Strand};
use crate::names::split_source_name_versioned;
use crate::seq::PackedSeq;

/// Decode one Tabix row into a block.
///
/// `start`/`end` are the row's BED coordinates and become the block's
/// reference span. The reference row is resolved through the usual
/// cascade: the configured override, the query region's assembly, then
/// the first row. Malformed tuples are skipped with a diagnostic.
pub fn decode_maftabix_block(
    start: u64,
    end: u64,
    alignments: &str,
    ref_assembly_name: Option<&str>,
    query_assembly_name: Option<&str>,
) -> AlignmentBlock {
    let mut rows: Vec<AlignmentRow> = Vec::new();

    for tuple in alignments.split(',') {
        if tuple.is_empty() {
            continue;
        }
        match parse_tuple(tuple) {
            Some(row) => rows.push(row),
            None => warn!("skipping malformed MafTabix alignment tuple"),
        }
    }

    let (ref_name, ref_seq) =
        match resolve_reference_row(&rows, ref_assembly_name, query_assembly_name) {
            Some(i) => (rows[i].source_name(), rows[i].seq.clone()),
            None => (String::new(), PackedSeq::default()),
        };

    AlignmentBlock {
        ref_name,
        ref_start: start,
        ref_end: end,
        ref_seq,
        rows,
    }
}

/// Parse one `assembly.chr:start:srcSize:strand:unknown:seq` tuple.
fn parse_tuple(tuple: &str) -> Option<AlignmentRow> {
    let mut fields = tuple.split(':');
    let source = fields.next()?;
    let start: u64 = fields.next()?.parse().ok()?;
    let src_size: u64 = fields.next()?.parse().ok()?;
    let strand = Strand::from_symbol(fields.next()?)?;
    let _unknown = fields.next()?;
    let seq = fields.next()?;

    let (assembly_name, chr) = split_source_name_versioned(source);
    Some(AlignmentRow {
        assembly_name: assembly_name.to_string(),
        chr: chr.to_string(),
        start,
        src_size,
        strand,
        seq: PackedSeq::encode(seq.as_bytes()),
    })
}
