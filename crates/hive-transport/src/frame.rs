//! JSON frame codec.
//!
//! ```text
//! {"event": "search-files", "data": "movie"}
//! {"event": "heartbeat"}
//! ```
//!
//! `data` may be omitted for payload-less events.

use hive_types::events::{InboundEvent, OutboundEvent};
use serde::Deserialize;
use serde_json::Value;

use crate::{Result, WireError};

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Decode one text frame, rejecting anything longer than `max_len` bytes.
pub fn decode(text: &str, max_len: usize) -> Result<InboundEvent> {
    if text.len() > max_len {
        return Err(WireError::Oversized {
            len: text.len(),
            max: max_len,
        });
    }
    let envelope: Envelope = serde_json::from_str(text)?;
    Ok(InboundEvent::from_parts(&envelope.event, envelope.data)?)
}

/// Encode one outbound event as a text frame.
pub fn encode(event: &OutboundEvent) -> Result<String> {
    Ok(serde_json::to_string(event)?)
}
