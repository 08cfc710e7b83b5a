//! # hive-types
//!
//! Shared domain and wire types used across the hive workspace.
//!
//! - [`peer`]: session-scoped peer identifiers
//! - [`file`]: content hashes, file declarations, search and download results
//! - [`events`]: the inbound/outbound event vocabulary spoken over the
//!   signaling channel

pub mod events;
pub mod file;
pub mod peer;

pub use file::{DownloadMiss, DownloadNodes, FileDeclaration, FileHash, SearchHit};
pub use peer::PeerId;

/// Length of a content hash in hex characters (SHA-256 digest).
pub const FILE_HASH_HEX_LEN: usize = 64;

/// Error text sent when a requested hash has no file record.
pub const ERR_FILE_NOT_INDEXED: &str = "file not found in index";

/// Error text sent when a file record exists but no live peer holds it.
pub const ERR_NO_ACTIVE_HOLDERS: &str = "no active nodes hold this file";

/// Validation errors for domain identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypesError {
    #[error("invalid file hash: {0}")]
    InvalidHash(String),

    #[error("invalid peer id: {0}")]
    InvalidPeerId(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TypesError::InvalidHash("zz".into());
        assert_eq!(err.to_string(), "invalid file hash: zz");
    }
}
