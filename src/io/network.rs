//! Network range reading over HTTP (feature `network`).
//!
//! Remote alignment files are read through HTTP range requests: only the
//! compressed chunks an index points at are downloaded, never the whole
//! file. Decompressed results flow through the same chunk cache as local
//! reads, so the memory bound is unchanged.
//!
//! # Example
//!
//! ```no_run
//! use mafq::io::{CompressedFileReader, HttpRangeReader};
//!
//! # fn main() -> mafq::Result<()> {
//! let reader = HttpRangeReader::new("https://example.com/alignments.taf.gz")?;
//! let text = reader.read_range(0, 65536)?;
//! # let _ = text;
//! # Ok(())
//! # }
//! ```

use reqwest::blocking::Client;
use std::time::Duration;

use crate::error::{MafqError, Result};
use crate::io::compression::{decompress_bgzf_range, CompressedFileReader};

/// Default HTTP timeout (30 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of retry attempts
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// HTTP-backed [`CompressedFileReader`] using range requests.
///
/// Retries transient failures with exponential backoff. Connection
/// pooling comes from the underlying reqwest client.
pub struct HttpRangeReader {
    client: Client,
    url: String,
    max_retries: u32,
}

impl HttpRangeReader {
    /// Create a reader for `url` with default timeout and retries.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(format!("mafq/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MafqError::Network(e.to_string()))?;
        Ok(HttpRangeReader {
            client,
            url: url.into(),
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Override the retry count.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn fetch_with_retry(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        let mut attempts = 0;
        let mut backoff = Duration::from_millis(100);
        loop {
            match self.fetch_once(start, end) {
                Ok(data) => return Ok(data),
                Err(e) => {
                    attempts += 1;
                    if attempts >= self.max_retries {
                        return Err(e);
                    }
                    std::thread::sleep(backoff);
                    backoff *= 2;
                }
            }
        }
    }

    fn fetch_once(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(&self.url)
            .header("Range", format!("bytes={}-{}", start, end - 1))
            .send()
            .map_err(|e| MafqError::Network(e.to_string()))?;

        let status = response.status();
        // 206 Partial Content is the expected success for range requests.
        if !status.is_success() {
            return Err(MafqError::Network(format!(
                "HTTP {} fetching {}",
                status.as_u16(),
                self.url
            )));
        }

        let bytes = response
            .bytes()
            .map_err(|e| MafqError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl CompressedFileReader for HttpRangeReader {
    fn read_range(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let compressed = self.fetch_with_retry(offset, offset + len as u64)?;
        decompress_bgzf_range(&compressed)
    }

    fn file_len(&self) -> Result<u64> {
        let response = self
            .client
            .head(&self.url)
            .send()
            .map_err(|e| MafqError::Network(e.to_string()))?;
        response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| {
                MafqError::Network(format!("no content length for {}", self.url))
            })
    }
}
