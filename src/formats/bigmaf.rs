//! BigMaf block decoding.
//!
//! BigMaf embeds a whole MAF block in the extra column of a BigBed record
//! as a `;`-separated list of MAF lines. Only `s` lines carry sequence:
//!
//! ```text
//! s hg38.chr1 100 4 + 248956422 ACGT
//! ```
//!
//! Fields after `s` are `src start size strand srcSize text`. By the
//! BigMaf convention the first `s` row is the reference row; its sequence
//! becomes the block's reference sequence. Each row's text is packed as it
//! is parsed so the input substrings can be dropped immediately.

use log::warn;

use crate::model::{AlignmentBlock, AlignmentRow, Strand};
use crate::names::split_source_name;
use crate::seq::PackedSeq;

/// Decode one BigBed record's `mafBlock` column into a block.
///
/// `start`/`end` are the record's own BED coordinates, which become the
/// block's reference span. Malformed segments are skipped with a
/// diagnostic; a record with no parseable `s` line yields a block with no
/// rows and an empty reference sequence.
pub fn decode_bigmaf_block(start: u64, end: u64, maf_block: &str) -> AlignmentBlock {
    let mut rows: Vec<AlignmentRow> = Vec::new();

    for segment in maf_block.split(';') {
        let segment = segment.trim_start();
        if !segment.starts_with("s ") {
            continue;
        }
        match parse_s_line(segment) {
            Some(row) => rows.push(row),
            None => warn!("skipping malformed MAF 's' line in BigMaf record"),
        }
    }

    // First s row is the reference row.
    let (ref_name, ref_seq) = match rows.first() {
        Some(first) => (first.source_name(), first.seq.clone()),
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

/// Parse `s src start size strand srcSize text`, encoding the text.
fn parse_s_line(segment: &str) -> Option<AlignmentRow> {
    let mut tokens = segment.split_ascii_whitespace();
    let _s = tokens.next()?;
    let source = tokens.next()?;
    let start: u64 = tokens.next()?.parse().ok()?;
    let _size: u64 = tokens.next()?.parse().ok()?;
    let strand = Strand::from_symbol(tokens.next()?)?;
    let src_size: u64 = tokens.next()?.parse().ok()?;
    let text = tokens.next()?;

    let (assembly_name, chr) = split_source_name(source);
    Some(AlignmentRow {
        assembly_name: assembly_name.to_string(),
        chr: chr.to_string(),
        start,
        src_size,
        strand,
        seq: PackedSeq::encode(text.as_bytes()),
    })
}
