//! Row-instruction parsing for TAF coordinate lines.
//!
//! The segment after the `" ; "` sentinel on a TAF coordinate line is a
//! space-delimited instruction stream describing how the row list changes
//! relative to the previous block:
//!
//! ```text
//! i row asm.chr start strand srcSize   insert row at index
//! s row asm.chr start strand srcSize   substitute row at index
//! d row                                delete row at index
//! g row gapLen                         advance row's start by gapLen
//! G row gapSubstring                   advance row's start by |gapSubstring|
//! ```
//!
//! When a query enters the stream at an indexed position there is no
//! previous block to edit, so the instruction list is rewritten first:
//! `d`/`g`/`G` reference state that does not exist and are dropped, and
//! every `s` becomes the structurally identical `i`.

use log::warn;

use crate::model::Strand;

/// One parsed row instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowInstruction {
    /// Insert a new row at `row`
    Insert {
        row: usize,
        assembly_name: String,
        chr: String,
        start: u64,
        strand: Strand,
        src_size: u64,
    },
    /// Replace the row at `row`
    Substitute {
        row: usize,
        assembly_name: String,
        chr: String,
        start: u64,
        strand: Strand,
        src_size: u64,
    },
    /// Delete the row at `row`
    Delete { row: usize },
    /// Advance the start of the row at `row` by `len` bases
    Gap { row: usize, len: u64 },
}

/// Parse an instruction segment into an ordered vector.
///
/// Recovery is per-token: a token that does not begin a well-formed
/// instruction is skipped with a diagnostic and parsing continues at the
/// next token, so one bad edit cannot take down the rest of the line.
pub fn parse_instructions(segment: &str) -> Vec<RowInstruction> {
    let tokens: Vec<&str> = segment.split_ascii_whitespace().collect();
    let mut out = Vec::new();
    let mut pos = 0;

    while pos < tokens.len() {
        match tokens[pos] {
            op @ ("i" | "s") => match parse_coordinate_args(&tokens[pos + 1..]) {
                Some((row, assembly_name, chr, start, strand, src_size)) => {
                    out.push(if op == "i" {
                        RowInstruction::Insert {
                            row,
                            assembly_name,
                            chr,
                            start,
                            strand,
                            src_size,
                        }
                    } else {
                        RowInstruction::Substitute {
                            row,
                            assembly_name,
                            chr,
                            start,
                            strand,
                            src_size,
                        }
                    });
                    pos += 6;
                }
                None => {
                    warn!("skipping malformed '{}' instruction", op);
                    pos += 1;
                }
            },
            "d" => match tokens.get(pos + 1).and_then(|t| t.parse().ok()) {
                Some(row) => {
                    out.push(RowInstruction::Delete { row });
                    pos += 2;
                }
                None => {
                    warn!("skipping malformed 'd' instruction");
                    pos += 1;
                }
            },
            "g" => match parse_gap_args(&tokens[pos + 1..]) {
                Some((row, len)) => {
                    out.push(RowInstruction::Gap { row, len });
                    pos += 3;
                }
                None => {
                    warn!("skipping malformed 'g' instruction");
                    pos += 1;
                }
            },
            "G" => {
                // The gap is given as the substring itself; only its
                // length matters to coordinate replay.
                match (
                    tokens.get(pos + 1).and_then(|t| t.parse().ok()),
                    tokens.get(pos + 2),
                ) {
                    (Some(row), Some(gap)) => {
                        out.push(RowInstruction::Gap {
                            row,
                            len: gap.len() as u64,
                        });
                        pos += 3;
                    }
                    _ => {
                        warn!("skipping malformed 'G' instruction");
                        pos += 1;
                    }
                }
            }
            other => {
                warn!("skipping unknown instruction token '{}'", other);
                pos += 1;
            }
        }
    }
    out
}

fn parse_coordinate_args(
    tokens: &[&str],
) -> Option<(usize, String, String, u64, Strand, u64)> {
    if tokens.len() < 5 {
        return None;
    }
    let row = tokens[0].parse().ok()?;
    let (assembly, chr) = crate::names::split_source_name(tokens[1]);
    let start = tokens[2].parse().ok()?;
    let strand = Strand::from_symbol(tokens[3])?;
    let src_size = tokens[4].parse().ok()?;
    Some((row, assembly.to_string(), chr.to_string(), start, strand, src_size))
}

fn parse_gap_args(tokens: &[&str]) -> Option<(usize, u64)> {
    if tokens.len() < 2 {
        return None;
    }
    Some((tokens[0].parse().ok()?, tokens[1].parse().ok()?))
}

/// Rewrite an instruction list for a fresh start at an indexed position.
///
/// Drops `d`/`g`/`G` and converts every `s` to `i`, leaving only
/// insertions. Mirrors the coordinate rewrite the index contract requires:
/// the first coordinate line after an index entry must be self-contained.
pub fn rewrite_for_indexed_start(instructions: Vec<RowInstruction>) -> Vec<RowInstruction> {
    instructions
        .into_iter()
        .filter_map(|inst| match inst {
            RowInstruction::Insert { .. } => Some(inst),
            RowInstruction::Substitute {
                row,
                assembly_name,
                chr,
                start,
                strand,
                src_size,
            } => Some(RowInstruction::Insert {
                row,
                assembly_name,
                chr,
                start,
                strand,
                src_size,
            }),
            RowInstruction::Delete { .. } | RowInstruction::Gap { .. } => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_insert_and_substitute() {
        let parsed =
            parse_instructions("i 0 hg38.chr1 100 + 1000 s 1 mm10.chr1 200 - 2000");
        assert_eq!(parsed.len(), 2);
        assert_eq!(
            parsed[0],
            RowInstruction::Insert {
                row: 0,
                assembly_name: "hg38".to_string(),
                chr: "chr1".to_string(),
                start: 100,
                strand: Strand::Forward,
                src_size: 1000,
            }
        );
        assert_eq!(
            parsed[1],
            RowInstruction::Substitute {
                row: 1,
                assembly_name: "mm10".to_string(),
                chr: "chr1".to_string(),
                start: 200,
                strand: Strand::Reverse,
                src_size: 2000,
            }
        );
    }

    #[test]
    fn test_parse_delete_and_gaps() {
        let parsed = parse_instructions("d 2 g 1 50 G 0 TTAGG");
        assert_eq!(
            parsed,
            vec![
                RowInstruction::Delete { row: 2 },
                RowInstruction::Gap { row: 1, len: 50 },
                RowInstruction::Gap { row: 0, len: 5 },
            ]
        );
    }

    #[test]
    fn test_parse_skips_bad_token_and_continues() {
        // "q" is not an op; "i" is truncated; the trailing "d 0" must
        // still parse.
        let parsed = parse_instructions("q i 3 hg38.chr1 d 0");
        assert!(parsed.contains(&RowInstruction::Delete { row: 0 }));
    }

    #[test]
    fn test_parse_empty_segment() {
        assert!(parse_instructions("").is_empty());
        assert!(parse_instructions("   ").is_empty());
    }

    #[test]
    fn test_rewrite_for_indexed_start() {
        let parsed = parse_instructions(
            "d 2 d 2 s 0 ce10.chrI 2272337 + 15072423 s 1 caeSp111.Scaffold80 35303 - 57550",
        );
        let rewritten = rewrite_for_indexed_start(parsed);
        assert_eq!(rewritten.len(), 2);
        assert!(rewritten.iter().all(|i| matches!(i, RowInstruction::Insert { .. })));
        match &rewritten[0] {
            RowInstruction::Insert { row, start, strand, .. } => {
                assert_eq!(*row, 0);
                assert_eq!(*start, 2272337);
                assert_eq!(*strand, Strand::Forward);
            }
            other => panic!("expected insert, got {:?}", other),
        }
        match &rewritten[1] {
            RowInstruction::Insert { row, start, strand, .. } => {
                assert_eq!(*row, 1);
                assert_eq!(*start, 35303);
                assert_eq!(*strand, Strand::Reverse);
            }
            other => panic!("expected insert, got {:?}", other),
        }
    }

    #[test]
    fn test_rewrite_drops_state_dependent_ops() {
        let parsed = parse_instructions("g 0 10 G 1 ACGT d 2");
        assert!(rewrite_for_indexed_start(parsed).is_empty());
    }
}
