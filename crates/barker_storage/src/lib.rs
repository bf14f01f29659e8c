//! Crash-safe state persistence for Barker.
//!
//! Backends implement [`barker_interface::StateStore`]:
//!
//! - [`JsonFileStore`]: one JSON document, written with temp file + rename
//! - [`MemoryStore`]: serialized in memory, for tests and dry runs
//!
//! Every component mutates state through a [`StateHandle`], which serializes
//! writers and persists each read-modify-write before publishing it to readers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod file;
mod handle;
mod memory;

pub use file::JsonFileStore;
pub use handle::{LoadReport, StateHandle};
pub use memory::MemoryStore;

use barker_core::{EngineState, STATE_VERSION};
use barker_error::{StorageError, StorageErrorKind};

/// Decode a persisted document, upgrading older layouts.
///
/// Missing fields take their defaults. Documents written by a newer layout
/// are treated as corrupt rather than half-understood.
pub(crate) fn decode_state(raw: &str) -> Result<EngineState, StorageError> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| StorageError::new(StorageErrorKind::Corruption(e.to_string())))?;

    let version = value
        .get("version")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    if version > STATE_VERSION as u64 {
        return Err(StorageError::new(StorageErrorKind::Corruption(format!(
            "layout version {} is newer than supported version {}",
            version, STATE_VERSION
        ))));
    }

    let mut value = value;
    if version < 2 {
        nest_engagement_by_channel(&mut value);
    }

    let mut state: EngineState = serde_json::from_value(value)
        .map_err(|e| StorageError::new(StorageErrorKind::Corruption(e.to_string())))?;
    if state.version != STATE_VERSION {
        tracing::info!(from = state.version, to = STATE_VERSION, "Upgrading state layout");
        state.version = STATE_VERSION;
    }
    Ok(state)
}

/// Layout 1 keyed engagement records by external reference alone. Group
/// them under the channel stored on each record.
fn nest_engagement_by_channel(value: &mut serde_json::Value) {
    let Some(records) = value
        .get_mut("engagement_records")
        .and_then(serde_json::Value::as_object_mut)
    else {
        return;
    };
    let mut nested = serde_json::Map::new();
    for (external_ref, record) in std::mem::take(records) {
        let channel = record
            .get("channel")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        let entry = nested
            .entry(channel)
            .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
        if let Some(by_ref) = entry.as_object_mut() {
            by_ref.insert(external_ref, record);
        }
    }
    *records = nested;
}

pub(crate) fn encode_state(state: &EngineState) -> Result<String, StorageError> {
    serde_json::to_string_pretty(state)
        .map_err(|e| StorageError::new(StorageErrorKind::Serialization(e.to_string())))
}
