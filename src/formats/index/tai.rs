//! TAI (Taffy index) format support.
//!
//! A `.tai` file maps reference positions to BGZF virtual offsets so a TAF
//! file can be entered mid-stream. It is plain ASCII with tab-separated
//! columns:
//!
//! ```text
//! chr     chrStart    virtualOffset
//! ```
//!
//! A literal `*` in the `chr` column means the line is relative: its
//! `chrStart` and `virtualOffset` are deltas added to the previous line's
//! absolute values (running-delta compression keeps indexes small). An
//! absolute `chr` may be fully qualified (`hg38.chr1`); the canonical
//! reference name is the substring after the last `.`.
//!
//! # Virtual File Offsets
//!
//! As in BAI/CSI, a virtual offset is a 64-bit value combining:
//! - High bits (>= 17): compressed byte position of a BGZF block
//! - Low 16 bits: byte position within the decompressed block
//!
//! # Example
//!
//! ```
//! use mafq::formats::index::TaiIndex;
//!
//! let index = TaiIndex::parse("chr1\t0\t131072\n*\t5000\t65536\n");
//! let (first, next) = index.query("chr1", 4000, 6000).unwrap();
//! assert_eq!(first.chr_start, 0);
//! assert_eq!(next.chr_start, 5000);
//! ```

use log::warn;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::Result;

/// Virtual file offset in BGZF format.
///
/// A 64-bit value combining:
/// - Bits 63-16: compressed file offset (start of a BGZF block)
/// - Bits 15-0: uncompressed offset within the decompressed block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualOffset(u64);

impl VirtualOffset {
    /// Create a virtual offset from compressed and uncompressed components.
    ///
    /// # Panics
    ///
    /// Panics if `uncompressed` does not fit in 16 bits (callers pass a
    /// `u16`, so this cannot happen through the public API).
    pub fn new(compressed: u64, uncompressed: u16) -> Self {
        VirtualOffset((compressed << 16) | (uncompressed as u64))
    }

    /// Create from a raw 64-bit value.
    pub fn from_raw(value: u64) -> Self {
        VirtualOffset(value)
    }

    /// Raw 64-bit value.
    pub fn as_raw(self) -> u64 {
        self.0
    }

    /// Compressed file offset (high 48 bits).
    pub fn compressed_offset(self) -> u64 {
        self.0 >> 16
    }

    /// Uncompressed offset within the block (low 16 bits).
    pub fn uncompressed_offset(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }
}

/// One index entry: a reference position and where its block begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaiEntry {
    /// Reference position (0-based) of the first column at this offset
    pub chr_start: u64,
    /// Virtual offset of the coordinate line for that column
    pub offset: VirtualOffset,
}

/// TAI (Taffy index).
///
/// Entries are grouped per reference name and sorted by `chr_start`
/// ascending, ready for binary search.
#[derive(Debug, Clone, Default)]
pub struct TaiIndex {
    entries: HashMap<String, Vec<TaiEntry>>,
}

impl TaiIndex {
    /// Load a TAI index from a file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut text = String::new();
        File::open(path)?.read_to_string(&mut text)?;
        Ok(Self::parse(&text))
    }

    /// Parse TAI text.
    ///
    /// Malformed lines are skipped with a diagnostic rather than failing
    /// the whole index; a relative line with no preceding absolute line is
    /// likewise skipped.
    pub fn parse(text: &str) -> Self {
        let mut entries: HashMap<String, Vec<TaiEntry>> = HashMap::new();
        // Previous line's absolute values, for `*` delta lines.
        let mut prev: Option<(String, u64, u64)> = None;

        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split('\t');
            let (chr, start_str, off_str) =
                match (fields.next(), fields.next(), fields.next()) {
                    (Some(a), Some(b), Some(c)) => (a, b, c),
                    _ => {
                        warn!("tai line {}: expected 3 tab-separated fields", lineno + 1);
                        continue;
                    }
                };
            let (start_val, off_val) = match (start_str.parse::<u64>(), off_str.parse::<u64>()) {
                (Ok(s), Ok(o)) => (s, o),
                _ => {
                    warn!("tai line {}: unparsable coordinate or offset", lineno + 1);
                    continue;
                }
            };

            let (ref_name, chr_start, raw_offset) = if chr == "*" {
                match &prev {
                    Some((name, prev_start, prev_off)) => {
                        (name.clone(), prev_start + start_val, prev_off + off_val)
                    }
                    None => {
                        warn!("tai line {}: relative line with no previous entry", lineno + 1);
                        continue;
                    }
                }
            } else {
                // Fully qualified names keep only the part after the last dot.
                let name = chr.rsplit('.').next().unwrap_or(chr).to_string();
                (name, start_val, off_val)
            };

            prev = Some((ref_name.clone(), chr_start, raw_offset));
            entries.entry(ref_name).or_default().push(TaiEntry {
                chr_start,
                offset: VirtualOffset::from_raw(raw_offset),
            });
        }

        for list in entries.values_mut() {
            list.sort_by_key(|e| e.chr_start);
        }
        TaiIndex { entries }
    }

    /// Reference names present in the index.
    pub fn ref_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }

    /// Entries for one reference, sorted by `chr_start`.
    pub fn entries(&self, ref_name: &str) -> Option<&[TaiEntry]> {
        self.entries.get(ref_name).map(|v| v.as_slice())
    }

    /// Find the entry pair bracketing `[start, end)` on `ref_name`.
    ///
    /// The first entry is the last whose `chr_start <= start`, i.e. the
    /// block that may still contain the start position. The second is the
    /// entry one past the first whose `chr_start >= end`, clamped to the
    /// final entry, so the read spans at least one block boundary beyond
    /// the query.
    ///
    /// Returns `None` only when the reference is absent from the index
    /// (an empty query result, not an error). An out-of-range query may
    /// return the same entry twice, which reads a single block.
    pub fn query(&self, ref_name: &str, start: u64, end: u64) -> Option<(TaiEntry, TaiEntry)> {
        let entries = self.entries.get(ref_name)?;
        if entries.is_empty() {
            return None;
        }

        let i = entries.partition_point(|e| e.chr_start < start);
        let first = entries[i.saturating_sub(1)];

        let j = entries.partition_point(|e| e.chr_start < end);
        let next = if j + 1 < entries.len() {
            entries[j + 1]
        } else {
            *entries.last().unwrap()
        };

        Some((first, next))
    }
}
