//! Publishing destinations.

use serde::{Deserialize, Serialize};

/// An external publishing destination.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Channel {
    /// Reddit communities.
    Reddit,
    /// Twitter / X.
    Twitter,
    /// Pinterest boards.
    Pinterest,
    /// Instagram feed.
    Instagram,
    /// Facebook pages.
    Facebook,
    /// Tumblr blog.
    Tumblr,
    /// Quora answers.
    Quora,
    /// Medium articles.
    Medium,
    /// Discord announcement channels.
    Discord,
    /// Generic web forum.
    Forum,
}

/// Channel-assigned identifier (post id or URL) of a published item.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
#[display("{}", _0)]
pub struct ExternalRef(pub String);

impl From<&str> for ExternalRef {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
