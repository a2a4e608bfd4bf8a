//! Per-sample FASTA materialization over a block stream.
//!
//! Walks each block's reference row and selected sample rows in lockstep
//! and fills one gapped byte vector per sample, indexed by reference
//! column. Positions no block covers stay `-`. Optionally, reference-gap
//! columns (insertions) are spliced back in after the stream ends.
//!
//! Insertions owned only by samples that are not selected must not expand
//! the selected output: a hidden sample's 10 kb insertion would otherwise
//! pad every visible row with 10 kb of `-`.

use std::collections::{BTreeMap, HashMap};

use crate::error::Result;
use crate::model::{AlignmentBlock, Region};

/// Options controlling FASTA materialization.
#[derive(Debug, Clone, Default)]
pub struct FastaOptions {
    /// Write every base instead of `.` for columns matching the reference
    pub show_all_letters: bool,
    /// Splice reference-gap columns (insertions) into the output
    pub include_insertions: bool,
}

/// Materialize `samples` over `[region.start, region.end)` from a block
/// stream.
///
/// Returns `(sample, sequence)` pairs in caller order. Samples never seen
/// in any block come back all `-`. Stream errors propagate.
pub fn materialize_fasta(
    region: &Region,
    samples: &[String],
    blocks: impl Iterator<Item = Result<AlignmentBlock>>,
    options: &FastaOptions,
) -> Result<Vec<(String, String)>> {
    let length = region.len() as usize;
    let mut rows: Vec<Vec<u8>> = vec![vec![b'-'; length]; samples.len()];

    // Insertion bookkeeping, keyed by the reference position the inserted
    // bases precede. Only selected samples contribute.
    let mut max_insertion: BTreeMap<u64, usize> = BTreeMap::new();
    let mut inserted: HashMap<(usize, u64), Vec<u8>> = HashMap::new();

    for block in blocks {
        let block = block?;
        for (sample_idx, sample) in samples.iter().enumerate() {
            let Some(row) = block.row(sample) else {
                continue;
            };
            let mut non_gap_offset = 0u64;
            for col in 0..block.ref_seq.len() {
                let ref_pos = block.ref_start + non_gap_offset;
                if block.ref_seq.is_gap(col) {
                    // Insertion column: remember the sample's bases so the
                    // splice pass can restore them.
                    if options.include_insertions
                        && !row.seq.is_gap(col)
                        && ref_pos >= region.start
                        && ref_pos <= region.end
                    {
                        if let Some(base) = row.seq.base_at_lower(col) {
                            let entry = inserted
                                .entry((sample_idx, ref_pos))
                                .or_default();
                            entry.push(base as u8);
                            let longest = max_insertion.entry(ref_pos).or_insert(0);
                            *longest = (*longest).max(entry.len());
                        }
                    }
                    continue;
                }

                if ref_pos >= region.start && ref_pos < region.end {
                    let out_pos = (ref_pos - region.start) as usize;
                    debug_assert!(out_pos < length);
                    rows[sample_idx][out_pos] = render_base(&block, row, col, options);
                }
                non_gap_offset += 1;
            }
        }
    }

    // Splice insertion columns right to left so earlier offsets stay
    // valid. Every selected sample gets the column; non-inserting samples
    // pad with '-'.
    if options.include_insertions {
        for (&ref_pos, &longest) in max_insertion.iter().rev() {
            let at = (ref_pos - region.start) as usize;
            for (sample_idx, row) in rows.iter_mut().enumerate() {
                let mut column = inserted
                    .get(&(sample_idx, ref_pos))
                    .cloned()
                    .unwrap_or_default();
                column.resize(longest, b'-');
                row.splice(at..at, column);
            }
        }
    }

    Ok(samples
        .iter()
        .cloned()
        .zip(rows.into_iter().map(|r| String::from_utf8(r).unwrap()))
        .collect())
}

/// Render one aligned (non-insertion) column for a sample.
fn render_base(
    block: &AlignmentBlock,
    row: &crate::model::AlignmentRow,
    col: u32,
    options: &FastaOptions,
) -> u8 {
    if row.seq.is_gap(col) {
        return b'-';
    }
    let matches = row.seq.code_at_folded(col) == block.ref_seq.code_at_folded(col);
    if matches && !options.show_all_letters {
        b'.'
    } else {
        row.seq.base_at_lower(col).map(|c| c as u8).unwrap_or(b'-')
    }
}
