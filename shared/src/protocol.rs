use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::participant::{ParticipantId, ParticipantState};

// === Server -> Client ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(tag = "type")]
pub enum ServerMsg {
    #[serde(rename = "identity-assigned")]
    IdentityAssigned(IdentityAssignedMsg),
    #[serde(rename = "joined")]
    Joined(JoinedMsg),
    #[serde(rename = "moved")]
    Moved(MovedMsg),
    #[serde(rename = "left")]
    Left(LeftMsg),
    #[serde(rename = "whiteboardMessage")]
    Whiteboard(ContentMsg),
    #[serde(rename = "laptopMessage")]
    Laptop(ContentMsg),
}

/// Every `type` tag a server may send.
pub const SERVER_KINDS: &[&str] = &[
    "identity-assigned",
    "joined",
    "moved",
    "left",
    "whiteboardMessage",
    "laptopMessage",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
pub struct IdentityAssignedMsg {
    pub id: ParticipantId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
pub struct JoinedMsg {
    pub id: ParticipantId,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
pub struct MovedMsg {
    pub id: ParticipantId,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub anim: String,
    #[serde(rename = "flipX")]
    pub flip_x: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
pub struct LeftMsg {
    pub id: ParticipantId,
}

/// Opaque panel content (an encoded image) relayed between participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
pub struct ContentMsg {
    /// Sender, filled in by the relay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub id: Option<ParticipantId>,
    pub data: String,
}

// === Client -> Server ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(tag = "type")]
pub enum ClientMsg {
    #[serde(rename = "move")]
    Move(MoveMsg),
    #[serde(rename = "whiteboardMessage")]
    Whiteboard(ContentUploadMsg),
    #[serde(rename = "laptopMessage")]
    Laptop(ContentUploadMsg),
}

/// Every `type` tag a client may send.
pub const CLIENT_KINDS: &[&str] = &["move", "whiteboardMessage", "laptopMessage"];

/// Local avatar snapshot. Deliberately carries no identity: the relay
/// attributes it to the sending connection, and any `id` a client adds is
/// ignored during decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
pub struct MoveMsg {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub anim: String,
    #[serde(rename = "flipX")]
    pub flip_x: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
pub struct ContentUploadMsg {
    pub data: String,
}

/// Which shared panel a content message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Whiteboard,
    Laptop,
}

impl ContentKind {
    pub fn wire_name(self) -> &'static str {
        match self {
            ContentKind::Whiteboard => "whiteboardMessage",
            ContentKind::Laptop => "laptopMessage",
        }
    }
}

// === Decoding ===

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unknown message kind `{0}`")]
    UnknownKind(String),
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

fn decode<T: DeserializeOwned>(text: &str, known: &[&str]) -> Result<T, DecodeError> {
    let err = match serde_json::from_str::<T>(text) {
        Ok(msg) => return Ok(msg),
        Err(err) => err,
    };
    // Tell "well-formed but a kind we don't speak" apart from garbage.
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(text) {
        if let Some(kind) = map.get("type").and_then(serde_json::Value::as_str) {
            if !known.contains(&kind) {
                return Err(DecodeError::UnknownKind(kind.to_string()));
            }
        }
    }
    Err(DecodeError::Malformed(err))
}

impl ServerMsg {
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        decode(text, SERVER_KINDS)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn content(kind: ContentKind, from: ParticipantId, data: String) -> Self {
        let msg = ContentMsg {
            id: Some(from),
            data,
        };
        match kind {
            ContentKind::Whiteboard => ServerMsg::Whiteboard(msg),
            ContentKind::Laptop => ServerMsg::Laptop(msg),
        }
    }
}

impl ClientMsg {
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        decode(text, CLIENT_KINDS)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn content(kind: ContentKind, data: String) -> Self {
        let msg = ContentUploadMsg { data };
        match kind {
            ContentKind::Whiteboard => ClientMsg::Whiteboard(msg),
            ContentKind::Laptop => ClientMsg::Laptop(msg),
        }
    }
}

// === Conversion helpers ===

impl MoveMsg {
    pub fn from_state(state: &ParticipantState) -> Self {
        Self {
            x: state.x,
            y: state.y,
            anim: state.anim.clone(),
            flip_x: state.flip_x,
        }
    }
}

impl MovedMsg {
    /// Attribute a client's `move` to the connection it arrived on.
    pub fn attributed(id: ParticipantId, msg: MoveMsg) -> Self {
        Self {
            id,
            x: msg.x,
            y: msg.y,
            anim: msg.anim,
            flip_x: msg.flip_x,
        }
    }

    pub fn state(&self) -> ParticipantState {
        ParticipantState {
            x: self.x,
            y: self.y,
            anim: self.anim.clone(),
            flip_x: self.flip_x,
        }
    }
}

impl JoinedMsg {
    pub fn state(&self) -> ParticipantState {
        ParticipantState::at(self.x, self.y)
    }
}
