//! Event vocabulary of the signaling channel.
//!
//! Every frame is a named event with an optional JSON payload. Inbound events
//! are decoded in two steps (name, then payload) so an unknown name and a
//! garbled payload can be told apart in logs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{DownloadMiss, DownloadNodes, FileDeclaration, PeerId, SearchHit};

pub const EV_REGISTER_FILES: &str = "register-files";
pub const EV_UNREGISTER_FILES: &str = "unregister-files";
pub const EV_SEARCH_FILES: &str = "search-files";
pub const EV_REQUEST_DOWNLOAD: &str = "request-download";
pub const EV_WEBRTC_SIGNAL: &str = "webrtc-signal";
pub const EV_HEARTBEAT: &str = "heartbeat";

/// Why an inbound frame could not be turned into an [`InboundEvent`].
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("unknown event: {0}")]
    Unknown(String),

    #[error("malformed payload for {event}: {reason}")]
    Malformed { event: &'static str, reason: String },
}

/// Signaling payload addressed to another peer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalRequest {
    #[serde(alias = "targetUserId")]
    pub target_peer_id: PeerId,
    /// Opaque offer/answer/candidate data; never inspected.
    #[serde(default)]
    pub signal: Value,
}

/// Signaling payload as delivered to its target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayedSignal {
    pub from_peer_id: PeerId,
    pub signal: Value,
}

/// Events a peer may send.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundEvent {
    RegisterFiles(Vec<FileDeclaration>),
    UnregisterFiles(Vec<String>),
    SearchFiles(String),
    RequestDownload(String),
    WebrtcSignal(SignalRequest),
    Heartbeat,
}

impl InboundEvent {
    /// Build an event from its name and raw payload.
    pub fn from_parts(name: &str, data: Value) -> Result<Self, EventError> {
        match name {
            EV_REGISTER_FILES => payload(EV_REGISTER_FILES, data).map(Self::RegisterFiles),
            EV_UNREGISTER_FILES => payload(EV_UNREGISTER_FILES, data).map(Self::UnregisterFiles),
            EV_SEARCH_FILES => payload(EV_SEARCH_FILES, data).map(Self::SearchFiles),
            EV_REQUEST_DOWNLOAD => payload(EV_REQUEST_DOWNLOAD, data).map(Self::RequestDownload),
            EV_WEBRTC_SIGNAL => payload(EV_WEBRTC_SIGNAL, data).map(Self::WebrtcSignal),
            EV_HEARTBEAT => Ok(Self::Heartbeat),
            other => Err(EventError::Unknown(other.to_string())),
        }
    }

    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RegisterFiles(_) => EV_REGISTER_FILES,
            Self::UnregisterFiles(_) => EV_UNREGISTER_FILES,
            Self::SearchFiles(_) => EV_SEARCH_FILES,
            Self::RequestDownload(_) => EV_REQUEST_DOWNLOAD,
            Self::WebrtcSignal(_) => EV_WEBRTC_SIGNAL,
            Self::Heartbeat => EV_HEARTBEAT,
        }
    }
}

fn payload<T: serde::de::DeserializeOwned>(event: &'static str, data: Value) -> Result<T, EventError> {
    serde_json::from_value(data).map_err(|e| EventError::Malformed {
        event,
        reason: e.to_string(),
    })
}

/// Events the server sends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum OutboundEvent {
    SearchResults(Vec<SearchHit>),
    DownloadNodesFound(DownloadNodes),
    DownloadNodesNotFound(DownloadMiss),
    WebrtcSignal(RelayedSignal),
    HeartbeatAck,
}
