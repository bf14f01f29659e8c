//! Failure classification.

use barker_core::FailureClass;
use barker_error::{ChannelError, ChannelErrorKind};

/// Message fragments that mark an otherwise unmapped error as permanent.
const PERMANENT_MARKERS: &[&str] = &[
    "duplicate",
    "already posted",
    "already submitted",
    "banned",
    "suspended",
    "forbidden",
    "unauthorized",
    "not authorized",
    "invalid content",
    "rejected",
];

/// Decide whether a failed publish may be retried.
///
/// Duplicate content, banned or unauthorized accounts, and rejected content
/// are permanent. Everything else, including errors the adapter could not
/// map, is transient; the retry budget bounds how long those are retried.
pub fn classify(error: &ChannelError) -> FailureClass {
    match &error.kind {
        ChannelErrorKind::DuplicateContent(_)
        | ChannelErrorKind::Unauthorized(_)
        | ChannelErrorKind::Banned(_)
        | ChannelErrorKind::ContentRejected(_) => FailureClass::Permanent,
        ChannelErrorKind::Network(_)
        | ChannelErrorKind::Timeout(_)
        | ChannelErrorKind::RateLimited { .. }
        | ChannelErrorKind::Server(_) => FailureClass::Transient,
        ChannelErrorKind::Other(message) => {
            let message = message.to_lowercase();
            if PERMANENT_MARKERS.iter().any(|m| message.contains(m)) {
                FailureClass::Permanent
            } else {
                FailureClass::Transient
            }
        }
    }
}
