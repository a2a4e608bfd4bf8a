//! Index formats for random access into compressed alignment files.
//!
//! A `.tai` index turns the stateful TAF stream into a random-access file:
//! it maps reference positions to BGZF virtual offsets, so a query can
//! enter the stream at the nearest indexed boundary and replay forward.

pub mod tai;

pub use tai::{TaiEntry, TaiIndex, VirtualOffset};
