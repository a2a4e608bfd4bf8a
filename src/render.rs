//! Pixel-span geometry for rendering alignment blocks.
//!
//! Converts block columns to pixel-space rectangles for an external
//! canvas and spatial index. Only the coordinate math lives here: one
//! span per rendered column, classified as match, mismatch, gap, or
//! insertion against the reference row, with a per-row deduplication gate
//! so zoomed-out views emit a bounded number of spans per row instead of
//! one per base.

use crate::model::{AlignmentBlock, Region};

/// How a rendered column relates to the reference row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    /// Row base equals the reference base (case-folded)
    Match,
    /// Row base differs from the reference base
    Mismatch,
    /// Row has a gap where the reference has a base
    Gap,
    /// Reference has a gap where the row has bases
    Insertion,
}

/// One pixel-space rectangle plus the hit-test payload for the external
/// spatial index.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelSpan {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    /// Reference position of the column
    pub pos: u64,
    /// The row's chromosome
    pub chr: String,
    /// The row's base at this column (case-preserving)
    pub base: char,
    /// Display row index, from the sample order
    pub row_index: usize,
    pub kind: SpanKind,
}

/// Stateful span emitter for one rendered view.
///
/// Carries the per-row last-emitted-x gate across blocks, so spans
/// deduplicate over the whole query, not per block.
pub struct SpanEmitter {
    region_start: u64,
    bp_per_px: f64,
    row_height: f64,
    last_x: Vec<f64>,
}

impl SpanEmitter {
    /// Create an emitter for a view showing `region` at `bp_per_px`
    /// bases per pixel, with `rows` display rows of `row_height` pixels.
    pub fn new(region: &Region, bp_per_px: f64, rows: usize, row_height: f64) -> Self {
        SpanEmitter {
            region_start: region.start,
            bp_per_px,
            row_height,
            last_x: vec![f64::NEG_INFINITY; rows],
        }
    }

    /// Pixel x of a reference position.
    fn x_of(&self, pos: u64) -> f64 {
        (pos as f64 - self.region_start as f64) / self.bp_per_px
    }

    /// The dedup threshold scales with zoom so the span count (and the
    /// spatial index) stays small at any bp/px.
    fn gate(&self) -> f64 {
        self.bp_per_px.max(1.0)
    }

    /// Emit the spans of one block for the rows named in `samples`
    /// (display order = row index). Rows absent from the block emit
    /// nothing.
    pub fn emit_block(&mut self, block: &AlignmentBlock, samples: &[String]) -> Vec<PixelSpan> {
        let mut spans = Vec::new();
        let base_width = 1.0 / self.bp_per_px;

        for (row_index, sample) in samples.iter().enumerate() {
            let Some(row) = block.row(sample) else {
                continue;
            };
            let min_y = row_index as f64 * self.row_height;
            let max_y = min_y + self.row_height;

            let mut non_gap_offset = 0u64;
            for col in 0..block.ref_seq.len() {
                let ref_gap = block.ref_seq.is_gap(col);
                let pos = block.ref_start + non_gap_offset;
                if !ref_gap {
                    non_gap_offset += 1;
                }

                let kind = if ref_gap {
                    if row.seq.is_gap(col) {
                        continue;
                    }
                    SpanKind::Insertion
                } else if row.seq.is_gap(col) {
                    SpanKind::Gap
                } else if row.seq.code_at_folded(col) == block.ref_seq.code_at_folded(col) {
                    SpanKind::Match
                } else {
                    SpanKind::Mismatch
                };

                let x = self.x_of(pos);
                if (x - self.last_x[row_index]).abs() <= self.gate() {
                    continue;
                }
                self.last_x[row_index] = x;

                let width = if kind == SpanKind::Insertion {
                    // Insertions anchor between columns; give them a
                    // nominal pixel for hit-testing.
                    1.0
                } else {
                    base_width
                };
                spans.push(PixelSpan {
                    min_x: x,
                    min_y,
                    max_x: x + width,
                    max_y,
                    pos,
                    chr: row.chr.clone(),
                    base: row.seq.base_at(col).unwrap_or('-'),
                    row_index,
                    kind,
                });
            }
        }
        spans
    }
}
