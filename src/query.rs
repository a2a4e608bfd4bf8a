//! Streaming query driver: one front door over three physical encodings.
//!
//! Every adapter implements [`MafBlockSource`]: `query` takes a region and
//! returns a lazy stream of [`AlignmentBlock`]s overlapping it, in
//! `ref_start`-ascending order. The consumer observes one block at a
//! time; at steady state the pipeline holds one block plus one cached
//! chunk, regardless of query span.
//!
//! # Adapters
//!
//! - [`TafAdapter`]: `.tai` lookup, one ranged read through the chunk
//!   cache, then stateful replay from the indexed boundary
//! - [`BigMafAdapter`]: delegates interval lookup to a [`BigBedQuery`]
//!   capability and decodes each record's `mafBlock` column
//! - [`MafTabixAdapter`]: delegates to a [`TabixQuery`] capability and
//!   decodes each row's alignments column
//!
//! # Cancellation
//!
//! Every query takes a [`CancelToken`] through [`QueryOptions`]. The
//! driver checks it before each external fetch and before each yielded
//! block. Cancellation surfaces as a terminal [`MafqError::Cancelled`]
//! item; it never cancels an in-flight decompression other consumers may
//! be waiting on.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::config::{AdapterConfig, TrackConfig};
use crate::error::{MafqError, Result};
use crate::formats::index::TaiIndex;
use crate::formats::taf::{TafBlockDecoder, TafDecodeOptions, TafHeader};
use crate::formats::{decode_bigmaf_block, decode_maftabix_block};
use crate::io::cache::{ChunkCache, ChunkKey};
use crate::io::compression::{CompressedFileReader, LocalBgzf};
use crate::model::{AlignmentBlock, Region};

/// One BGZF block of read slack past the last index entry, so a block
/// boundary always lies beyond the query.
const READ_SLACK: u64 = 65536;

/// Cooperative progress reporting: invoked with human-readable phase
/// markers at coarse intervals.
pub type StatusCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Cancellation token shared between a caller and its running queries.
///
/// Cloning shares the flag; cancelling any clone cancels them all.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<std::sync::atomic::AtomicBool>,
}

impl CancelToken {
    /// A fresh, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every holder of this token.
    pub fn cancel(&self) {
        self.flag.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// Whether cancellation has been signalled.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// Per-query options: cancellation and status reporting.
#[derive(Clone, Default)]
pub struct QueryOptions {
    /// Cancellation token, checked between pipeline stages
    pub cancel: CancelToken,
    /// Optional progress callback
    pub status: Option<StatusCallback>,
}

impl QueryOptions {
    fn report(&self, message: &str) {
        if let Some(status) = &self.status {
            status(message);
        }
    }
}

/// Lazy stream of blocks produced by a query.
pub type BlockStream = Box<dyn Iterator<Item = Result<AlignmentBlock>> + Send>;

/// The capability every adapter exposes: interval in, lazy block stream
/// out.
pub trait MafBlockSource {
    /// Stream the blocks overlapping `region`, ascending by `ref_start`.
    fn query(&self, region: &Region, options: &QueryOptions) -> Result<BlockStream>;
}

/// One BigBed record, as produced by the external R-tree lookup.
#[derive(Debug, Clone)]
pub struct BedFeature {
    /// Record start (0-based)
    pub start: u64,
    /// Record end (exclusive)
    pub end: u64,
    /// The `mafBlock` extra column
    pub maf_block: String,
}

/// External BigBed interval lookup capability.
pub trait BigBedQuery: Send + Sync {
    /// Records overlapping `[start, end)` on `ref_name`, ascending by
    /// start. An unknown reference yields an empty iterator.
    fn query(
        &self,
        ref_name: &str,
        start: u64,
        end: u64,
    ) -> Result<Box<dyn Iterator<Item = Result<BedFeature>> + Send>>;
}

/// One Tabix row: the three BED columns plus the extra columns verbatim.
#[derive(Debug, Clone)]
pub struct TabixRecord {
    /// Reference name (first column)
    pub ref_name: String,
    /// Record start (0-based)
    pub start: u64,
    /// Record end (exclusive)
    pub end: u64,
    /// Columns after the first three, in order
    pub extra: Vec<String>,
}

impl TabixRecord {
    /// The alignments column (overall field 5 of the BED line:
    /// `chrom start end id score alignments`).
    pub fn alignments(&self) -> &str {
        self.extra.get(2).map(String::as_str).unwrap_or("")
    }
}

/// External Tabix interval lookup capability.
pub trait TabixQuery: Send + Sync {
    /// Rows overlapping `[start, end)` on `ref_name`, ascending by start.
    /// An unknown reference yields an empty iterator.
    fn query(
        &self,
        ref_name: &str,
        start: u64,
        end: u64,
    ) -> Result<Box<dyn Iterator<Item = Result<TabixRecord>> + Send>>;
}

/// Iterator adapter enforcing the cancellation contract: the token is
/// checked before each yielded block, and cancellation is a single
/// terminal item.
struct Cancellable<I> {
    inner: I,
    cancel: CancelToken,
    terminated: bool,
}

impl<I> Cancellable<I> {
    fn new(inner: I, cancel: CancelToken) -> Self {
        Cancellable {
            inner,
            cancel,
            terminated: false,
        }
    }
}

impl<I: Iterator<Item = Result<AlignmentBlock>>> Iterator for Cancellable<I> {
    type Item = Result<AlignmentBlock>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.terminated {
            return None;
        }
        if self.cancel.is_cancelled() {
            self.terminated = true;
            return Some(Err(MafqError::Cancelled));
        }
        match self.inner.next() {
            Some(item) => {
                if item.is_err() {
                    self.terminated = true;
                }
                Some(item)
            }
            None => None,
        }
    }
}

/// TAF adapter: `.tai`-indexed random access into a bgzf TAF file.
///
/// The index and header are read once per adapter instance, on first
/// query. Decompressed chunks are shared across queries through the
/// bounded chunk cache.
pub struct TafAdapter<R: CompressedFileReader> {
    reader: R,
    tai_path: Option<PathBuf>,
    index: OnceLock<TaiIndex>,
    header: OnceLock<TafHeader>,
    cache: ChunkCache,
    ref_assembly_name: Option<String>,
}

impl TafAdapter<LocalBgzf> {
    /// Open a local TAF/TAI pair.
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(taf_gz: P, tai: Q) -> Result<Self> {
        Ok(TafAdapter {
            reader: LocalBgzf::open(taf_gz)?,
            tai_path: Some(tai.as_ref().to_path_buf()),
            index: OnceLock::new(),
            header: OnceLock::new(),
            cache: ChunkCache::new(),
            ref_assembly_name: None,
        })
    }

    /// Open from a track configuration carrying a TAF adapter with local
    /// locations.
    pub fn from_config(config: &TrackConfig) -> Result<Self> {
        let AdapterConfig::Taf { taf_gz, tai } = &config.adapter else {
            return Err(MafqError::Config(
                "track configuration does not describe a TAF adapter".to_string(),
            ));
        };
        let (Some(taf_path), Some(tai_path)) = (taf_gz.as_local(), tai.as_local()) else {
            return Err(MafqError::Config(
                "TAF adapter locations must be local paths".to_string(),
            ));
        };
        let mut adapter = Self::open(taf_path, tai_path)?;
        adapter.ref_assembly_name = config.ref_assembly_name.clone();
        Ok(adapter)
    }
}

impl<R: CompressedFileReader> TafAdapter<R> {
    /// Build an adapter from any byte-range capability and a pre-loaded
    /// index.
    pub fn with_index(reader: R, index: TaiIndex) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(index);
        TafAdapter {
            reader,
            tai_path: None,
            index: cell,
            header: OnceLock::new(),
            cache: ChunkCache::new(),
            ref_assembly_name: None,
        }
    }

    /// Set the reference-assembly override consulted first during
    /// reference resolution.
    pub fn with_ref_assembly(mut self, assembly: impl Into<String>) -> Self {
        self.ref_assembly_name = Some(assembly.into());
        self
    }

    fn ensure_index(&self, options: &QueryOptions) -> Result<&TaiIndex> {
        if let Some(index) = self.index.get() {
            return Ok(index);
        }
        options.report("Downloading index");
        let path = self.tai_path.as_ref().ok_or_else(|| {
            MafqError::Config("TAF adapter has neither an index nor a .tai path".to_string())
        })?;
        let loaded = TaiIndex::from_path(path)?;
        // A concurrent query may have won the race; either value is the
        // same index.
        let _ = self.index.set(loaded);
        Ok(self.index.get().unwrap())
    }

    fn ensure_header(&self) -> Result<&TafHeader> {
        if let Some(header) = self.header.get() {
            return Ok(header);
        }
        let first_block = self.reader.read_range(0, READ_SLACK as usize)?;
        let text = String::from_utf8_lossy(&first_block);
        let first_line = text.lines().next().unwrap_or("");
        let parsed = TafHeader::parse(first_line)?;
        let _ = self.header.set(parsed);
        Ok(self.header.get().unwrap())
    }
}

impl<R: CompressedFileReader> MafBlockSource for TafAdapter<R> {
    fn query(&self, region: &Region, options: &QueryOptions) -> Result<BlockStream> {
        let index = self.ensure_index(options)?;
        let Some((first, next)) = index.query(&region.ref_name, region.start, region.end)
        else {
            // Reference absent from the index: an empty result, not an
            // error.
            return Ok(Box::new(std::iter::empty()));
        };
        let header = self.ensure_header()?;

        let first_block_pos = first.offset.compressed_offset();
        let next_block_pos = next.offset.compressed_offset();
        // Read the compressed span between the two entries, plus one
        // block of slack so a boundary lies beyond the query.
        let read_len = if next_block_pos > first_block_pos {
            next_block_pos - first_block_pos + READ_SLACK
        } else {
            READ_SLACK
        };

        if options.cancel.is_cancelled() {
            return Err(MafqError::Cancelled);
        }
        options.report("Downloading alignments");

        let key = ChunkKey {
            start: first.offset,
            end: next.offset,
        };
        let chunk = self.cache.get_or_fetch(key, &options.cancel, || {
            self.reader.read_range(first_block_pos, read_len as usize)
        })?;

        // Slice from the entry's in-block position; when both entries sit
        // in the same block the next entry's position bounds the slice.
        let data_start = (first.offset.uncompressed_offset() as usize).min(chunk.len());
        let data_end = if first_block_pos == next_block_pos
            && next.offset.uncompressed_offset() > first.offset.uncompressed_offset()
        {
            (next.offset.uncompressed_offset() as usize).min(chunk.len())
        } else {
            chunk.len()
        };
        let text = String::from_utf8_lossy(&chunk[data_start..data_end]).into_owned();

        let decode_options = TafDecodeOptions {
            run_length_encoded: header.run_length_encode_bases,
            ref_assembly_name: self.ref_assembly_name.clone(),
            query_assembly_name: region.assembly_name.clone(),
            range: Some((region.start, region.end)),
            status: options.status.clone(),
        };
        let decoder = TafBlockDecoder::new(text, decode_options).map(Ok);
        Ok(Box::new(Cancellable::new(decoder, options.cancel.clone())))
    }
}

/// BigMaf adapter: BigBed records whose extra column carries MAF blocks.
pub struct BigMafAdapter<Q: BigBedQuery> {
    big_bed: Q,
}

impl<Q: BigBedQuery> BigMafAdapter<Q> {
    /// Wrap an external BigBed lookup capability.
    pub fn new(big_bed: Q) -> Self {
        BigMafAdapter { big_bed }
    }
}

impl<Q: BigBedQuery> MafBlockSource for BigMafAdapter<Q> {
    fn query(&self, region: &Region, options: &QueryOptions) -> Result<BlockStream> {
        if options.cancel.is_cancelled() {
            return Err(MafqError::Cancelled);
        }
        options.report("Downloading alignments");
        let features = self
            .big_bed
            .query(&region.ref_name, region.start, region.end)?;
        let blocks = features.map(|feature| {
            feature.map(|f| decode_bigmaf_block(f.start, f.end, &f.maf_block))
        });
        Ok(Box::new(Cancellable::new(blocks, options.cancel.clone())))
    }
}

/// MafTabix adapter: Tabix rows whose alignments column carries
/// `:`-delimited tuples.
pub struct MafTabixAdapter<Q: TabixQuery> {
    tabix: Q,
    ref_assembly_name: Option<String>,
}

impl<Q: TabixQuery> MafTabixAdapter<Q> {
    /// Wrap an external Tabix lookup capability.
    pub fn new(tabix: Q) -> Self {
        MafTabixAdapter {
            tabix,
            ref_assembly_name: None,
        }
    }

    /// Set the reference-assembly override.
    pub fn with_ref_assembly(mut self, assembly: impl Into<String>) -> Self {
        self.ref_assembly_name = Some(assembly.into());
        self
    }
}

impl<Q: TabixQuery> MafBlockSource for MafTabixAdapter<Q> {
    fn query(&self, region: &Region, options: &QueryOptions) -> Result<BlockStream> {
        if options.cancel.is_cancelled() {
            return Err(MafqError::Cancelled);
        }
        options.report("Downloading alignments");
        let rows = self
            .tabix
            .query(&region.ref_name, region.start, region.end)?;
        let ref_assembly = self.ref_assembly_name.clone();
        let query_assembly = region.assembly_name.clone();
        let blocks = rows.map(move |row| {
            row.map(|r| {
                decode_maftabix_block(
                    r.start,
                    r.end,
                    r.alignments(),
                    ref_assembly.as_deref(),
                    query_assembly.as_deref(),
                )
            })
        });
        Ok(Box::new(Cancellable::new(blocks, options.cancel.clone())))
    }
}
