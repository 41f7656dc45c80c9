//! Response events and transcript updates
//!
//! Everything the backend sends back, plus the local echo of submitted
//! commands, travels as a [`ResponseEvent`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Origin/nature of a response event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseKind {
    /// Local echo of a submitted command
    Command,
    /// Successful backend reply
    Result,
    /// Failed execution or transport failure
    Error,
    /// Any other tag a transport chooses to emit
    #[allow(dead_code)]
    Other(String),
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseKind::Command => f.write_str("command"),
            ResponseKind::Result => f.write_str("result"),
            ResponseKind::Error => f.write_str("error"),
            ResponseKind::Other(tag) => f.write_str(tag),
        }
    }
}

/// A single unit of console output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEvent {
    /// Whether the response represents a successful result
    pub is_valid: bool,
    /// Command echo or result body
    pub payload: String,
    pub kind: ResponseKind,
}

impl ResponseEvent {
    pub fn new(is_valid: bool, payload: impl Into<String>, kind: ResponseKind) -> Self {
        Self {
            is_valid,
            payload: payload.into(),
            kind,
        }
    }

    /// Echo of a submitted command
    pub fn command(payload: impl Into<String>) -> Self {
        Self::new(true, payload, ResponseKind::Command)
    }

    pub fn result(payload: impl Into<String>) -> Self {
        Self::new(true, payload, ResponseKind::Result)
    }

    pub fn error(payload: impl Into<String>) -> Self {
        Self::new(false, payload, ResponseKind::Error)
    }
}

/// Input to the transcript fold
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// Append one event after everything already shown
    Append(ResponseEvent),
    /// Drop the whole transcript
    Reset,
}

impl From<ResponseEvent> for Update {
    fn from(event: ResponseEvent) -> Self {
        Update::Append(event)
    }
}

/// A selectable command template.
///
/// Patterns come from an external catalog; the session only remembers
/// which one is selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    pub template: String,
}

impl Pattern {
    pub fn new(id: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            template: template.into(),
        }
    }
}
