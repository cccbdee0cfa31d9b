use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::config::{SpawnPoint, SPAWN_ANIM};

/// Opaque identity the relay assigns to a connection.
///
/// Clients treat the contents as an uninterpreted string; the relay happens
/// to mint hyphenated UUIDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 characters, used for name tags and log lines.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl From<Uuid> for ParticipantId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.hyphenated().to_string())
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Full snapshot of one avatar. There is no velocity or timestamp: every
/// update replaces the previous snapshot wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantState {
    pub x: f64,
    pub y: f64,
    pub anim: String,
    pub flip_x: bool,
}

impl ParticipantState {
    /// An idle avatar standing at `(x, y)`.
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            anim: SPAWN_ANIM.to_string(),
            flip_x: false,
        }
    }

    pub fn spawn(point: SpawnPoint) -> Self {
        Self::at(point.x, point.y)
    }
}
