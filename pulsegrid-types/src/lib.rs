//! # pulsegrid-types
//!
//! Pattern data model shared by the pulsegrid scheduler and its collaborators.
//! Everything here is plain data: the scheduler reads it, never mutates it.

pub mod pattern;

pub use pattern::{ParameterLock, PatternSnapshot, Track, TrackIssue};

/// Stable identity of a track. Used as the key for tie tracking.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct TrackId(u32);

impl TrackId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
    pub fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque instrument identifier, resolved by the playback sink.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct InstrumentRef(String);

impl InstrumentRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InstrumentRef {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl std::fmt::Display for InstrumentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
