//! Error types for mafq

use std::fmt;

/// Result type alias for mafq operations
pub type Result<T> = std::result::Result<T, MafqError>;

/// Error types that can occur in mafq
#[derive(Debug)]
pub enum MafqError {
    /// I/O error
    Io(std::io::Error),

    /// Invalid TAI index line
    InvalidTai {
        /// Line number where error occurred
        line: usize,
        /// Error message
        msg: String,
    },

    /// Invalid TAF header
    InvalidTafHeader {
        /// Error message
        msg: String,
    },

    /// Invalid record (BigMaf segment, MafTabix tuple, BED-like row)
    InvalidRecord {
        /// Line number where error occurred
        line: usize,
        /// Error message
        msg: String,
    },

    /// Compression/decompression error
    Compression(String),

    /// Track configuration does not fit the requested adapter
    Config(String),

    /// Query cancelled by the caller's token
    Cancelled,

    /// Network error
    #[cfg(feature = "network")]
    Network(String),
}

impl fmt::Display for MafqError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MafqError::Io(e) => write!(f, "I/O error: {}", e),
            MafqError::InvalidTai { line, msg } => {
                write!(f, "Invalid TAI index at line {}: {}", line, msg)
            }
            MafqError::InvalidTafHeader { msg } => {
                write!(f, "Invalid TAF header: {}", msg)
            }
            MafqError::InvalidRecord { line, msg } => {
                write!(f, "Invalid record at line {}: {}", line, msg)
            }
            MafqError::Compression(msg) => write!(f, "Compression error: {}", msg),
            MafqError::Config(msg) => write!(f, "Configuration error: {}", msg),
            MafqError::Cancelled => write!(f, "Query cancelled"),
            #[cfg(feature = "network")]
            MafqError::Network(msg) => write!(f, "Network error: {}", msg),
        }
    }
}

impl std::error::Error for MafqError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MafqError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MafqError {
    fn from(error: std::io::Error) -> Self {
        MafqError::Io(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_invalid_tai() {
        let err = MafqError::InvalidTai {
            line: 7,
            msg: "expected 3 tab-separated fields".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid TAI index at line 7: expected 3 tab-separated fields"
        );
    }

    #[test]
    fn test_io_source_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = MafqError::from(io);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_cancelled_display() {
        assert_eq!(MafqError::Cancelled.to_string(), "Query cancelled");
    }
}
