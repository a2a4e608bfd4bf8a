//! TAF (Transposed Alignment Format) block reconstruction.
//!
//! TAF stores an alignment column-by-column: each line carries one column
//! of bases, and lines containing the `" ; "` sentinel additionally carry
//! row instructions describing how the row list changed since the previous
//! block. The stream is therefore stateful — the rows of block *N* are the
//! rows of block *N-1*, edited — and is not self-synchronizing. Random
//! access works by entering at a `.tai` boundary and replaying forward;
//! the first coordinate line after entry is rewritten to be self-contained
//! (see [`crate::formats::instructions::rewrite_for_indexed_start`]).
//!
//! # File layout
//!
//! ```text
//! #taf version:1 run_length_encode_bases:0
//! ACGT ; i 0 hg38.chr1 100 + 1000 i 1 mm10.chr1 200 + 2000
//! ACGT
//! AC-T ; g 1 50
//! ```
//!
//! `#`-prefixed lines and blank lines are ignored. A `" @"` suffix on
//! either side of a line is a tag list and is stripped. With
//! `run_length_encode_bases:1` a column is alternating `(base, count)`
//! pairs (`A 3 - 2` expands to `AAA--`).
//!
//! # Memory
//!
//! Finalization transposes columns into rows through one reused scratch
//! buffer, so peak memory is one block's rows plus the column accumulator,
//! regardless of how many blocks the buffer holds.

use log::warn;

use crate::error::{MafqError, Result};
use crate::formats::instructions::{
    parse_instructions, rewrite_for_indexed_start, RowInstruction,
};
use crate::model::{resolve_reference_row, AlignmentBlock, AlignmentRow, Strand};
use crate::query::StatusCallback;
use crate::seq::PackedSeq;

/// Lines are reported to the status callback at this coarse interval.
const STATUS_LINE_INTERVAL: usize = 1000;

/// Parsed TAF header line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TafHeader {
    /// Format version token, verbatim
    pub version: Option<String>,
    /// Whether column bases are run-length encoded
    pub run_length_encode_bases: bool,
}

impl TafHeader {
    /// Parse the first line of a TAF file.
    ///
    /// The line must begin with `#taf`; the remaining tokens are
    /// `key:value` pairs of which `version` and `run_length_encode_bases`
    /// are interpreted and the rest ignored.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end();
        if !line.starts_with("#taf") {
            return Err(MafqError::InvalidTafHeader {
                msg: format!("first line must start with '#taf', got '{}'", line),
            });
        }
        let mut header = TafHeader::default();
        for token in line["#taf".len()..].split_ascii_whitespace() {
            if let Some((key, value)) = token.split_once(':') {
                match key {
                    "version" => header.version = Some(value.to_string()),
                    "run_length_encode_bases" => {
                        header.run_length_encode_bases = value == "1";
                    }
                    _ => {}
                }
            }
        }
        Ok(header)
    }
}

/// Transient per-row state carried from block to block.
#[derive(Debug, Clone)]
struct RowState {
    assembly_name: String,
    chr: String,
    start: u64,
    strand: Strand,
    src_size: u64,
    non_gap: u64,
}

/// Options controlling one decode pass.
#[derive(Clone, Default)]
pub struct TafDecodeOptions {
    /// Whether column bases are run-length encoded (from the header)
    pub run_length_encoded: bool,
    /// Configured reference-assembly override
    pub ref_assembly_name: Option<String>,
    /// Assembly of the query region, second key of reference resolution
    pub query_assembly_name: Option<String>,
    /// Emit only blocks overlapping `[start, end)` on the reference axis.
    /// Blocks outside the range are still replayed to carry state forward.
    pub range: Option<(u64, u64)>,
    /// Cooperative progress reporting
    pub status: Option<StatusCallback>,
}

/// Stateful decoder yielding [`AlignmentBlock`]s from a decoded ASCII
/// buffer that begins at an indexed coordinate line.
///
/// The decoder carries the previous block's row list forward, applies each
/// coordinate line's instructions, accumulates columns, and transposes
/// them into rows when the next coordinate line (or end of input) closes
/// the block.
pub struct TafBlockDecoder {
    text: String,
    pos: usize,
    options: TafDecodeOptions,
    rows: Vec<RowState>,
    columns: Vec<String>,
    scratch: Vec<u8>,
    is_first_coord_line: bool,
    line_no: usize,
    done: bool,
}

impl TafBlockDecoder {
    /// Create a decoder over `text`, which must start at a coordinate line
    /// boundary (a `.tai` entry's `dataPos`).
    pub fn new(text: impl Into<String>, options: TafDecodeOptions) -> Self {
        TafBlockDecoder {
            text: text.into(),
            pos: 0,
            options,
            rows: Vec::new(),
            columns: Vec::new(),
            scratch: Vec::new(),
            is_first_coord_line: true,
            line_no: 0,
            done: false,
        }
    }

    /// Next raw line, owned, without its terminator. `None` at end of
    /// input.
    fn take_line(&mut self) -> Option<String> {
        if self.pos >= self.text.len() {
            return None;
        }
        let rest = &self.text[self.pos..];
        let (line, advance) = match rest.find('\n') {
            Some(i) => (&rest[..i], i + 1),
            None => (rest, rest.len()),
        };
        self.pos += advance;
        self.line_no += 1;
        if self.line_no % STATUS_LINE_INTERVAL == 0 {
            if let Some(status) = &self.options.status {
                status(&format!("Processing line {}", self.line_no));
            }
        }
        Some(line.trim_end_matches('\r').to_string())
    }

    /// Expand a run-length-encoded column (`A 3 - 2` -> `AAA--`).
    ///
    /// A dangling base with no count, or an unparsable count, drops that
    /// pair; a count of zero expands to nothing.
    fn expand_rle(column: &str) -> String {
        let mut out = String::new();
        let mut tokens = column.split_ascii_whitespace();
        while let Some(base) = tokens.next() {
            let Some(ch) = base.chars().next() else {
                continue;
            };
            match tokens.next().map(str::parse::<usize>) {
                Some(Ok(count)) => {
                    for _ in 0..count {
                        out.push(ch);
                    }
                }
                _ => {
                    warn!("skipping malformed run-length pair in column");
                }
            }
        }
        out
    }

    /// Strip a trailing `" @"` tag list.
    fn strip_tags(part: &str) -> &str {
        match part.find(" @") {
            Some(i) => &part[..i],
            None => part,
        }
    }

    fn push_column(&mut self, bases: &str) {
        let column = if self.options.run_length_encoded {
            Self::expand_rle(bases)
        } else {
            bases.trim().to_string()
        };
        self.columns.push(column);
    }

    /// Apply one coordinate line's instructions to the carried row list.
    ///
    /// Row indexes out of range are clamped or dropped with a diagnostic;
    /// the block is still emitted with best-effort state.
    fn apply_instructions(&mut self, instructions: Vec<RowInstruction>) {
        for inst in instructions {
            match inst {
                RowInstruction::Insert {
                    row,
                    assembly_name,
                    chr,
                    start,
                    strand,
                    src_size,
                } => {
                    let at = row.min(self.rows.len());
                    self.rows.insert(
                        at,
                        RowState {
                            assembly_name,
                            chr,
                            start,
                            strand,
                            src_size,
                            non_gap: 0,
                        },
                    );
                }
                RowInstruction::Substitute {
                    row,
                    assembly_name,
                    chr,
                    start,
                    strand,
                    src_size,
                } => {
                    if row < self.rows.len() {
                        self.rows[row] = RowState {
                            assembly_name,
                            chr,
                            start,
                            strand,
                            src_size,
                            non_gap: 0,
                        };
                    } else {
                        warn!("substitute references missing row {}", row);
                    }
                }
                RowInstruction::Delete { row } => {
                    if row < self.rows.len() {
                        self.rows.remove(row);
                    } else {
                        warn!("delete references missing row {}", row);
                    }
                }
                RowInstruction::Gap { row, len } => {
                    if let Some(state) = self.rows.get_mut(row) {
                        state.start += len;
                    } else {
                        warn!("gap references missing row {}", row);
                    }
                }
            }
        }
    }

    /// Transpose the column accumulator into rows, encode each row, and
    /// build the block. Clears the accumulator; row states keep their
    /// `non_gap` counts so the next block can advance starts.
    fn finalize_block(&mut self) -> Option<AlignmentBlock> {
        let ncols = self.columns.len();
        if ncols == 0 || self.rows.is_empty() {
            self.columns.clear();
            return None;
        }

        let mut rows_out = Vec::with_capacity(self.rows.len());
        for (r, state) in self.rows.iter_mut().enumerate() {
            // One scratch buffer reused across rows: the naive per-byte
            // string append is quadratic at 447-row x 10 KB block sizes.
            self.scratch.clear();
            let mut non_gap = 0u64;
            for column in &self.columns {
                let base = column.as_bytes().get(r).copied().unwrap_or(b'-');
                if base != b'-' {
                    non_gap += 1;
                }
                self.scratch.push(base);
            }
            state.non_gap = non_gap;
            rows_out.push(AlignmentRow {
                assembly_name: state.assembly_name.clone(),
                chr: state.chr.clone(),
                start: state.start,
                src_size: state.src_size,
                strand: state.strand,
                seq: PackedSeq::encode(&self.scratch),
            });
        }
        self.columns.clear();

        let ref_idx = resolve_reference_row(
            &rows_out,
            self.options.ref_assembly_name.as_deref(),
            self.options.query_assembly_name.as_deref(),
        );
        let block = match ref_idx {
            Some(i) => {
                let r = &rows_out[i];
                AlignmentBlock {
                    ref_name: r.source_name(),
                    ref_start: r.start,
                    ref_end: r.start + r.seq.non_gap_count() as u64,
                    ref_seq: r.seq.clone(),
                    rows: rows_out,
                }
            }
            None => AlignmentBlock {
                rows: rows_out,
                ..Default::default()
            },
        };
        Some(block)
    }

    /// Start the next block: copy rows forward with starts advanced past
    /// the bases each row contributed to the finalized block.
    fn advance_row_starts(&mut self) {
        for state in &mut self.rows {
            state.start += state.non_gap;
            state.non_gap = 0;
        }
    }

    fn emit(&mut self, block: AlignmentBlock) -> Option<AlignmentBlock> {
        match self.options.range {
            Some((start, end)) if !block.overlaps(start, end) => None,
            _ => Some(block),
        }
    }
}

impl Iterator for TafBlockDecoder {
    type Item = AlignmentBlock;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let Some(line) = self.take_line() else {
                // End of input: the in-progress block is yielded if it has
                // at least one column, otherwise silently dropped.
                self.done = true;
                let last = self.finalize_block();
                return last.and_then(|b| self.emit(b));
            };
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some(sentinel) = line.find(" ; ") else {
                // Bases-only continuation line; meaningful only after an
                // initial coordinate line.
                if self.rows.is_empty() {
                    continue;
                }
                let bases = Self::strip_tags(&line).to_string();
                self.push_column(&bases);
                continue;
            };

            // Coordinate line: close out the current block, then edit the
            // row list and open the next one.
            let ready = self.finalize_block();
            if ready.is_some() {
                self.advance_row_starts();
            }

            let bases = Self::strip_tags(&line[..sentinel]).to_string();
            let mut instructions =
                parse_instructions(Self::strip_tags(&line[sentinel + 3..]));
            if self.is_first_coord_line {
                instructions = rewrite_for_indexed_start(instructions);
                self.is_first_coord_line = false;
            }
            self.apply_instructions(instructions);
            self.push_column(&bases);

            if let Some(block) = ready {
                if let Some(block) = self.emit(block) {
                    return Some(block);
                }
            }
        }
    }
}
