//! Content hashes and the file-level records exchanged with peers.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};

use crate::{PeerId, TypesError, FILE_HASH_HEX_LEN};

/// Lowercase hex content digest identifying a file.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FileHash(String);

impl FileHash {
    /// Parse a hex digest, normalizing to lowercase.
    pub fn parse(s: &str) -> Result<Self, TypesError> {
        let lower = s.to_ascii_lowercase();
        if !Self::is_hash_like(&lower) {
            return Err(TypesError::InvalidHash(s.to_string()));
        }
        Ok(Self(lower))
    }

    /// True if `s` is exactly [`FILE_HASH_HEX_LEN`] lowercase hex characters.
    ///
    /// Search uses this to decide between exact-hash lookup and name matching,
    /// so uppercase input must be lowercased by the caller first.
    pub fn is_hash_like(s: &str) -> bool {
        s.len() == FILE_HASH_HEX_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for FileHash {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FileHash> for String {
    fn from(hash: FileHash) -> Self {
        hash.0
    }
}

impl fmt::Display for FileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A peer's claim that it holds a file.
///
/// `fileSize` is accepted as a JSON number or a numeric string; browsers
/// built on older clients send the latter.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDeclaration {
    pub hash: FileHash,
    #[serde(rename = "fileName")]
    pub name: String,
    #[serde(rename = "fileSize")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub size: u64,
}

/// One entry of a `search-results` reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub hash: FileHash,
    pub file_name: String,
    pub file_size: u64,
    /// Number of live holders, always `nodes.len()`.
    pub node_count: usize,
    pub nodes: Vec<PeerId>,
    pub is_exact_match: bool,
}

/// Payload of `download-nodes-found`.
///
/// `file_hash` echoes the request as sent, like [`DownloadMiss`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadNodes {
    pub file_hash: String,
    pub file_name: String,
    pub file_size: u64,
    pub nodes: Vec<PeerId>,
    pub node_count: usize,
}

/// Payload of `download-nodes-not-found`.
///
/// `file_hash` echoes the request verbatim, which may not be a valid digest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadMiss {
    pub file_hash: String,
    pub error: String,
}
