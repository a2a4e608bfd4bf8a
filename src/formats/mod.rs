//! Physical MAF encodings and their indexes.
//!
//! Three containers carry the same logical content — alignment blocks with
//! a reference row and per-assembly aligned rows — behind very different
//! physical layouts:
//!
//! - **BigMaf**: a BigBed record whose extra column holds a `;`-separated
//!   MAF block ([`bigmaf`])
//! - **MafTabix**: a bgzip/Tabix BED whose fifth extra column holds
//!   `:`-delimited alignment tuples ([`maftabix`])
//! - **TAF**: a column-oriented, run-length-encoded stream reconstructed
//!   by replaying row instructions ([`taf`], [`instructions`]) from a
//!   `.tai` index boundary ([`index`])

pub mod bigmaf;
pub mod index;
pub mod instructions;
pub mod maftabix;
pub mod taf;

pub use bigmaf::decode_bigmaf_block;
pub use index::{TaiEntry, TaiIndex, VirtualOffset};
pub use instructions::{parse_instructions, rewrite_for_indexed_start, RowInstruction};
pub use maftabix::decode_maftabix_block;
pub use taf::{TafBlockDecoder, TafDecodeOptions, TafHeader};
