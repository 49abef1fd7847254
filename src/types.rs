//! Core types for the a3s-gate system
//!
//! Message bodies use the PascalCase field names of the SNS notification
//! envelope (`{"Message": "left", ...}`).

use crate::error::{GateError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Object name for the photo taken as a command starts
pub const BEFORE_PHOTO: &str = "before.jpg";

/// Object name for the photo taken once the gate has settled
pub const AFTER_PHOTO: &str = "after.jpg";

/// One side of the physical actuator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Both sides, in channel order
    pub const ALL: [Side; 2] = [Side::Left, Side::Right];

    /// Wire keyword for this side
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "left" => Ok(Side::Left),
            "right" => Ok(Side::Right),
            other => Err(GateError::UnknownSide(other.to_string())),
        }
    }
}

/// A command decoded from a queue message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Pulse the relay for one side, with before/after photos
    OpenSide(Side),
    /// Take an after photo only
    PhotoOnly,
    /// Any keyword other than `left`, `right` or `photo`
    Unrecognized(String),
}

impl Command {
    /// Map a command keyword to a command (exact, case-sensitive match)
    pub fn parse(keyword: &str) -> Self {
        match keyword {
            "photo" => Command::PhotoOnly,
            other => match other.parse::<Side>() {
                Ok(side) => Command::OpenSide(side),
                Err(_) => Command::Unrecognized(other.to_string()),
            },
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::OpenSide(side) => write!(f, "open:{}", side),
            Command::PhotoOnly => f.write_str("photo"),
            Command::Unrecognized(keyword) => write!(f, "unrecognized:{}", keyword),
        }
    }
}

/// Structural envelope of a message body
///
/// Only `Message` is required; the remaining notification fields
/// (`Type`, `MessageId`, `TopicArn`, ...) are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Command keyword
    #[serde(rename = "Message")]
    pub message: String,
}

impl Envelope {
    /// Parse a raw message body
    pub fn from_body(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| GateError::Decode(e.to_string()))
    }
}

/// A single delivery of a queue message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Token identifying this delivery, required to delete it
    pub receipt_handle: String,

    /// Raw message body
    pub body: String,

    /// Provider-assigned message id, if any
    pub message_id: Option<String>,
}

impl QueueMessage {
    pub fn new(receipt_handle: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            receipt_handle: receipt_handle.into(),
            body: body.into(),
            message_id: None,
        }
    }

    /// Attach the provider message id
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }
}
