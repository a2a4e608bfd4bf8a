//! End-to-end TAF query tests.
//!
//! These tests build real bgzf-compressed TAF files with companion `.tai`
//! indexes on disk, then run indexed region queries through the adapter:
//! multi-block replay, mid-file entry with the substitute-to-insert
//! rewrite, range filtering, cancellation, and status reporting.

use flate2::write::GzEncoder;
use flate2::Compression;
use mafq::{CancelToken, MafBlockSource, MafqError, QueryOptions, Region, TafAdapter};
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Build one BGZF member (gzip member carrying the BC extra subfield)
/// around `payload`.
fn bgzf_member(payload: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload).unwrap();
    let gz = encoder.finish().unwrap();

    let body = &gz[10..];
    let total = 10 + 2 + 6 + body.len();
    let bsize = (total - 1) as u16;

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&gz[..3]);
    out.push(gz[3] | 0x04); // FEXTRA
    out.extend_from_slice(&gz[4..10]);
    out.extend_from_slice(&6u16.to_le_bytes());
    out.push(b'B');
    out.push(b'C');
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&bsize.to_le_bytes());
    out.extend_from_slice(body);
    out
}

const HEADER: &str = "#taf version:1\n";

const BLOCK_ONE: &str = "\
ACGT ; i 0 hg38.chr1 100 + 1000 i 1 mm10.chr1 200 + 2000
ACGT
ACGT
";

const BLOCK_TWO: &str = "\
AC ; s 0 hg38.chr1 103 + 1000 s 1 mm10.chr1 203 + 2000
GT
";

/// A two-member fixture: member one holds the header plus a three-column
/// block at hg38.chr1:100-103, member two a two-column block at 103-105
/// written with `s` coordinates (as the indexer would land on it).
struct Fixture {
    taf: tempfile::NamedTempFile,
    tai: tempfile::NamedTempFile,
}

fn write_fixture(relative_tai: bool) -> Fixture {
    let member_one = bgzf_member(format!("{}{}", HEADER, BLOCK_ONE).as_bytes());
    let member_two = bgzf_member(BLOCK_TWO.as_bytes());

    let mut taf = tempfile::NamedTempFile::new().unwrap();
    taf.write_all(&member_one).unwrap();
    taf.write_all(&member_two).unwrap();
    taf.flush().unwrap();

    // Entry one points inside member one, just past the header line.
    // Entry two points at the start of member two.
    let voff_one = (0u64 << 16) | HEADER.len() as u64;
    let voff_two = (member_one.len() as u64) << 16;

    let mut tai = tempfile::NamedTempFile::new().unwrap();
    if relative_tai {
        writeln!(tai, "hg38.chr1\t100\t{}", voff_one).unwrap();
        writeln!(tai, "*\t3\t{}", voff_two - voff_one).unwrap();
    } else {
        writeln!(tai, "hg38.chr1\t100\t{}", voff_one).unwrap();
        writeln!(tai, "hg38.chr1\t103\t{}", voff_two).unwrap();
    }
    tai.flush().unwrap();

    Fixture { taf, tai }
}

fn open(fixture: &Fixture) -> TafAdapter<mafq::io::LocalBgzf> {
    TafAdapter::open(fixture.taf.path(), fixture.tai.path()).unwrap()
}

fn collect_blocks(
    adapter: &TafAdapter<mafq::io::LocalBgzf>,
    region: &Region,
) -> Vec<mafq::AlignmentBlock> {
    adapter
        .query(region, &QueryOptions::default())
        .unwrap()
        .collect::<mafq::Result<Vec<_>>>()
        .unwrap()
}

#[test]
fn test_query_spanning_both_blocks() {
    let fixture = write_fixture(false);
    let adapter = open(&fixture);
    let region = Region::with_assembly("chr1", 100, 105, "hg38");

    let blocks = collect_blocks(&adapter, &region);
    assert_eq!(blocks.len(), 2);

    let first = &blocks[0];
    assert_eq!(first.ref_name, "hg38.chr1");
    assert_eq!((first.ref_start, first.ref_end), (100, 103));
    assert_eq!(first.rows[0].seq.decode(), b"AAA");
    assert_eq!(first.rows[1].seq.decode(), b"CCC");

    let second = &blocks[1];
    assert_eq!((second.ref_start, second.ref_end), (103, 105));
    assert_eq!(second.rows[0].seq.decode(), b"AG");
    assert_eq!(second.rows[1].seq.decode(), b"CT");
}

#[test]
fn test_mid_file_entry_rewrites_substitutes() {
    let fixture = write_fixture(false);
    let adapter = open(&fixture);
    // Start inside the second block: the read begins at member two,
    // whose coordinate line uses `s` instructions.
    let region = Region::with_assembly("chr1", 104, 200, "hg38");

    let blocks = collect_blocks(&adapter, &region);
    assert_eq!(blocks.len(), 1);
    assert_eq!((blocks[0].ref_start, blocks[0].ref_end), (103, 105));
    assert_eq!(blocks[0].rows[1].assembly_name, "mm10");
    assert_eq!(blocks[0].rows[1].start, 203);
}

#[test]
fn test_relative_tai_matches_absolute() {
    let absolute = write_fixture(false);
    let relative = write_fixture(true);
    let region = Region::with_assembly("chr1", 100, 105, "hg38");

    let from_absolute = collect_blocks(&open(&absolute), &region);
    let from_relative = collect_blocks(&open(&relative), &region);

    assert_eq!(from_absolute.len(), from_relative.len());
    for (a, b) in from_absolute.iter().zip(&from_relative) {
        assert_eq!((a.ref_start, a.ref_end), (b.ref_start, b.ref_end));
        assert_eq!(a.rows.len(), b.rows.len());
    }
}

#[test]
fn test_query_before_any_block_is_empty() {
    let fixture = write_fixture(false);
    let adapter = open(&fixture);
    let blocks = collect_blocks(&adapter, &Region::with_assembly("chr1", 0, 50, "hg38"));
    assert!(blocks.is_empty());
}

#[test]
fn test_query_after_all_blocks_is_empty() {
    let fixture = write_fixture(false);
    let adapter = open(&fixture);
    let blocks = collect_blocks(&adapter, &Region::with_assembly("chr1", 500, 600, "hg38"));
    assert!(blocks.is_empty());
}

#[test]
fn test_query_on_exact_block_boundary() {
    let fixture = write_fixture(false);
    let adapter = open(&fixture);
    // [103, 104) touches only the second block; the first ends at 103
    // exclusive.
    let blocks = collect_blocks(&adapter, &Region::with_assembly("chr1", 103, 104, "hg38"));
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].ref_start, 103);
}

#[test]
fn test_missing_ref_name_yields_empty_stream() {
    let fixture = write_fixture(false);
    let adapter = open(&fixture);
    let blocks = collect_blocks(&adapter, &Region::with_assembly("chrX", 0, 1000, "hg38"));
    assert!(blocks.is_empty());
}

#[test]
fn test_split_query_concatenation_matches_full_query() {
    let fixture = write_fixture(false);
    let adapter = open(&fixture);

    let full = collect_blocks(&adapter, &Region::with_assembly("chr1", 100, 105, "hg38"));
    let mut split = collect_blocks(&adapter, &Region::with_assembly("chr1", 100, 103, "hg38"));
    split.extend(collect_blocks(&adapter, &Region::with_assembly("chr1", 103, 105, "hg38")));

    assert_eq!(full.len(), split.len());
    for (a, b) in full.iter().zip(&split) {
        assert_eq!((a.ref_start, a.ref_end), (b.ref_start, b.ref_end));
    }
}

#[test]
fn test_blocks_arrive_in_ascending_ref_order() {
    let fixture = write_fixture(false);
    let adapter = open(&fixture);
    let blocks = collect_blocks(&adapter, &Region::with_assembly("chr1", 100, 105, "hg38"));
    for pair in blocks.windows(2) {
        assert!(pair[0].ref_start <= pair[1].ref_start);
    }
}

#[test]
fn test_cancelled_before_fetch() {
    let fixture = write_fixture(false);
    let adapter = open(&fixture);
    let options = QueryOptions {
        cancel: CancelToken::new(),
        status: None,
    };
    options.cancel.cancel();
    let result = adapter.query(&Region::with_assembly("chr1", 100, 105, "hg38"), &options);
    assert!(matches!(result, Err(MafqError::Cancelled)));
}

#[test]
fn test_status_callback_phases() {
    let fixture = write_fixture(false);
    let adapter = open(&fixture);
    let messages: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = messages.clone();
    let options = QueryOptions {
        cancel: CancelToken::new(),
        status: Some(Arc::new(move |msg: &str| {
            sink.lock().unwrap().push(msg.to_string());
        })),
    };

    let blocks: Vec<_> = adapter
        .query(&Region::with_assembly("chr1", 100, 105, "hg38"), &options)
        .unwrap()
        .collect();
    assert!(!blocks.is_empty());

    let seen = messages.lock().unwrap();
    assert!(seen.iter().any(|m| m == "Downloading index"));
    assert!(seen.iter().any(|m| m == "Downloading alignments"));
}

#[test]
fn test_repeated_query_hits_chunk_cache() {
    let fixture = write_fixture(false);
    let adapter = open(&fixture);
    let region = Region::with_assembly("chr1", 100, 105, "hg38");

    let first = collect_blocks(&adapter, &region);
    let second = collect_blocks(&adapter, &region);
    assert_eq!(first.len(), second.len());
}

#[test]
fn test_row_invariants_across_query() {
    let fixture = write_fixture(false);
    let adapter = open(&fixture);
    let blocks = collect_blocks(&adapter, &Region::with_assembly("chr1", 100, 105, "hg38"));
    for block in &blocks {
        assert_eq!(
            block.ref_end - block.ref_start,
            block.ref_seq.non_gap_count() as u64
        );
        for row in &block.rows {
            assert_eq!(row.seq.len(), block.ref_seq.len());
            assert!(row.start + row.seq.non_gap_count() as u64 <= row.src_size);
        }
    }
}
