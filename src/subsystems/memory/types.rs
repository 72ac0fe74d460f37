//! Core value types for the memory subsystem.
//!
//! * [`ConversationId`] — opaque key for one chat, derived by the comms
//!   channel from whatever the platform hands it (Telegram chat id, console
//!   channel id, …).
//! * [`Turn`] — one labelled line of dialogue.

use std::fmt;

// ── ConversationId ───────────────────────────────────────────────────────────

/// Opaque identifier for a chat/session.
///
/// Integer platform ids are stored in their decimal form so that a Telegram
/// chat `42` and a console session named `"42"` map to the same key only if
/// the channel chooses to make them so.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ConversationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<i64> for ConversationId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

// ── Turn ─────────────────────────────────────────────────────────────────────

/// Who produced a [`Turn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Bot,
}

impl Role {
    /// Label used when rendering a transcript line.
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Bot => "Bot",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A labelled line of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self { role: Role::Bot, text: text.into() }
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.role, self.text)
    }
}
