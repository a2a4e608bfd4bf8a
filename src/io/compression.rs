//! BGZF byte-range reading and decompression.
//!
//! All three container formats sit on BGZF (block gzip): a stream of
//! independent gzip members, each holding at most 64 KB of uncompressed
//! data, so any member boundary is a valid entry point. Virtual offsets
//! from the indexes point at member boundaries; this module turns a
//! compressed byte range starting at such a boundary into decompressed
//! bytes.
//!
//! The [`CompressedFileReader`] trait is the capability the query driver
//! consumes; [`LocalBgzf`] is the local-file implementation. Large files
//! are memory-mapped past a size threshold (mmap overhead dominates below
//! it), and members of a fetched range are decompressed in parallel with
//! rayon.
//!
//! # Example
//!
//! ```no_run
//! use mafq::io::{CompressedFileReader, LocalBgzf};
//!
//! # fn main() -> mafq::Result<()> {
//! let reader = LocalBgzf::open("alignments.taf.gz")?;
//! // Decompressed bytes of the first compressed 64 KB.
//! let text = reader.read_range(0, 65536)?;
//! # let _ = text;
//! # Ok(())
//! # }
//! ```

use flate2::read::GzDecoder;
use memmap2::Mmap;
use rayon::prelude::*;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{MafqError, Result};

/// Memory-mapped file threshold (50 MB). Below it, plain reads win.
pub const MMAP_THRESHOLD: u64 = 50 * 1024 * 1024;

/// Random-access reads of byte ranges over a bgzf file, returning
/// decompressed bytes.
///
/// `offset` must land on a BGZF member boundary (virtual offsets from an
/// index guarantee this). The range may end mid-member; the truncated
/// tail member is ignored.
pub trait CompressedFileReader: Send + Sync {
    /// Decompressed bytes of the compressed range `[offset, offset+len)`,
    /// clamped to the end of the file.
    fn read_range(&self, offset: u64, len: usize) -> Result<Vec<u8>>;

    /// Total compressed file length in bytes.
    fn file_len(&self) -> Result<u64>;
}

/// Split a buffer of concatenated BGZF members at their boundaries.
///
/// Member sizes come from the `BC` extra subfield mandated by the BGZF
/// spec (`BSIZE = total block size - 1`). A buffer whose members carry no
/// `BC` subfield is treated as one plain gzip stream. A truncated final
/// member is dropped — the caller's read slack guarantees the data it
/// needs ended on an earlier boundary.
fn split_bgzf_members(data: &[u8]) -> Vec<&[u8]> {
    let mut members = Vec::new();
    let mut pos = 0;

    while pos + 18 <= data.len() {
        let rest = &data[pos..];
        if rest[0] != 0x1f || rest[1] != 0x8b {
            break;
        }
        let xlen = u16::from_le_bytes([rest[10], rest[11]]) as usize;
        let Some(extra) = rest.get(12..12 + xlen) else {
            break;
        };

        let mut bsize = None;
        let mut cursor = 0;
        while cursor + 4 <= extra.len() {
            let (si1, si2) = (extra[cursor], extra[cursor + 1]);
            let slen = u16::from_le_bytes([extra[cursor + 2], extra[cursor + 3]]) as usize;
            if si1 == b'B' && si2 == b'C' && slen == 2 && cursor + 6 <= extra.len() {
                bsize = Some(
                    u16::from_le_bytes([extra[cursor + 4], extra[cursor + 5]]) as usize + 1,
                );
                break;
            }
            cursor += 4 + slen;
        }

        match bsize {
            Some(size) if size <= rest.len() => {
                members.push(&rest[..size]);
                pos += size;
            }
            Some(_) => break, // truncated tail member
            None => {
                // Not BGZF; hand the remainder to the decoder whole.
                members.push(rest);
                pos = data.len();
            }
        }
    }
    members
}

/// Decompress a range of concatenated BGZF members in parallel.
///
/// Members are independent deflate streams, so they decompress on all
/// cores and concatenate in order.
pub fn decompress_bgzf_range(data: &[u8]) -> Result<Vec<u8>> {
    let members = split_bgzf_members(data);
    let decompressed: Vec<Vec<u8>> = members
        .par_iter()
        .map(|member| {
            let mut decoder = GzDecoder::new(*member);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| MafqError::Compression(e.to_string()))?;
            Ok::<_, MafqError>(out)
        })
        .collect::<Result<_>>()?;
    Ok(decompressed.concat())
}

enum Backing {
    /// Large file, mapped once
    Mmap(Mmap),
    /// Small file, read per request
    File(Mutex<File>),
}

/// Local-file [`CompressedFileReader`] over a bgzf file.
pub struct LocalBgzf {
    path: PathBuf,
    len: u64,
    backing: Backing,
}

impl LocalBgzf {
    /// Open a local bgzf file, choosing the I/O method by size: files at
    /// or past [`MMAP_THRESHOLD`] are memory-mapped, smaller files use
    /// seek-and-read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        let backing = if len >= MMAP_THRESHOLD {
            let mmap = unsafe { Mmap::map(&file)? };
            #[cfg(target_os = "macos")]
            unsafe {
                use libc::{madvise, MADV_WILLNEED};
                madvise(mmap.as_ptr() as *mut _, mmap.len(), MADV_WILLNEED);
            }
            Backing::Mmap(mmap)
        } else {
            Backing::File(Mutex::new(file))
        };
        Ok(LocalBgzf { path, len, backing })
    }

    /// Path this reader was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn compressed_slice(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        if offset >= self.len {
            return Ok(Vec::new());
        }
        let end = (offset + len as u64).min(self.len);
        match &self.backing {
            Backing::Mmap(mmap) => Ok(mmap[offset as usize..end as usize].to_vec()),
            Backing::File(file) => {
                let mut file = file.lock().unwrap();
                file.seek(SeekFrom::Start(offset))?;
                let mut buf = vec![0u8; (end - offset) as usize];
                file.read_exact(&mut buf)?;
                Ok(buf)
            }
        }
    }
}

impl CompressedFileReader for LocalBgzf {
    fn read_range(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let compressed = self.compressed_slice(offset, len)?;
        decompress_bgzf_range(&compressed)
    }

    fn file_len(&self) -> Result<u64> {
        Ok(self.len)
    }
}
