//! I/O: BGZF range reading, decompression, and the chunk cache.

pub mod cache;
pub mod compression;

pub use cache::{ChunkCache, ChunkKey, DEFAULT_CHUNK_CAPACITY};
pub use compression::{decompress_bgzf_range, CompressedFileReader, LocalBgzf, MMAP_THRESHOLD};

#[cfg(feature = "network")]
pub mod network;
#[cfg(feature = "network")]
pub use network::HttpRangeReader;
