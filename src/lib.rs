//! # mafq
//!
//! Streaming query engine for indexed multiple-alignment files.
//!
//! Given a genomic interval over an indexed multi-species alignment,
//! `mafq` yields a lazy sequence of alignment blocks — each with a
//! reference row and per-assembly aligned rows — suitable for rendering,
//! FASTA extraction, or programmatic consumption. Three physical
//! encodings sit behind one logical interface:
//!
//! - **BigMaf**: BigBed records whose extra column embeds a MAF block
//! - **MafTabix**: bgzip/Tabix-indexed BED with `:`-delimited alignment
//!   tuples in the fifth extra column
//! - **TAF**: a column-oriented, run-length-encoded format with a `.tai`
//!   index, reconstructed by replaying row instructions from the nearest
//!   indexed boundary
//!
//! # Memory model
//!
//! Queries stream: the consumer observes one block at a time and the
//! pipeline holds one block plus one cached decompressed chunk at steady
//! state, regardless of query span. Row sequences are stored 4-bit
//! packed, cutting peak memory roughly 4x over raw strings.
//!
//! # Example
//!
//! ```no_run
//! use mafq::{MafBlockSource, QueryOptions, Region, TafAdapter};
//!
//! # fn main() -> mafq::Result<()> {
//! let adapter = TafAdapter::open("alignments.taf.gz", "alignments.tai")?;
//! let region = Region::with_assembly("chr1", 1_000_000, 1_001_000, "hg38");
//!
//! for block in adapter.query(&region, &QueryOptions::default())? {
//!     let block = block?;
//!     println!(
//!         "{}:{}-{} with {} rows",
//!         block.ref_name,
//!         block.ref_start,
//!         block.ref_end,
//!         block.rows.len()
//!     );
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod fasta;
pub mod formats;
pub mod io;
pub mod model;
pub mod names;
pub mod query;
pub mod render;
pub mod seq;

pub use config::{AdapterConfig, Location, SampleConfig, TrackConfig};
pub use error::{MafqError, Result};
pub use fasta::{materialize_fasta, FastaOptions};
pub use model::{AlignmentBlock, AlignmentRow, Region, Strand};
pub use query::{
    BedFeature, BigBedQuery, BigMafAdapter, BlockStream, CancelToken, MafBlockSource,
    MafTabixAdapter, QueryOptions, StatusCallback, TabixQuery, TabixRecord, TafAdapter,
};
pub use render::{PixelSpan, SpanEmitter, SpanKind};
pub use seq::PackedSeq;
