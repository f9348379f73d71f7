//! Storage commands embedded in messages.
//!
//! Producers attach an ordered list of command descriptors to each event under
//! the `commands` field. Extraction turns that list into typed `Command`s for
//! the execution engine.

use std::fmt;

use serde::Deserialize;

use crate::codec::FieldError;

mod extract;

pub use extract::extract;

/// Field holding the embedded command list.
pub const COMMANDS_FIELD: &str = "commands";
/// Older producers put the list under this field instead.
pub const LEGACY_COMMANDS_FIELD: &str = "redis";

/// Storage structure a command targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Group {
    /// Append to a list.
    List,
    /// Set one field of a hash.
    Hash,
    /// Assign a plain key.
    Set,
    /// Increment a sorted-set member's score by one.
    SortedSet,
    /// Tag not understood; kept only when unknown groups are tolerated.
    Unrecognized(String),
}

impl Group {
    /// Parse a group tag (case-insensitive, singular or plural).
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "LIST" | "LISTS" => Some(Self::List),
            "HASH" | "HASHES" => Some(Self::Hash),
            "SET" | "SETS" => Some(Self::Set),
            "SORTEDSET" | "SORTEDSETS" | "ZINCRBY" => Some(Self::SortedSet),
            _ => None,
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => f.write_str("LIST"),
            Self::Hash => f.write_str("HASH"),
            Self::Set => f.write_str("SET"),
            Self::SortedSet => f.write_str("SORTEDSET"),
            Self::Unrecognized(tag) => write!(f, "unrecognized({})", tag),
        }
    }
}

/// Where a command's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// The raw message value.
    SelfValue,
    /// The reply of the preceding command in the same list.
    PreviousResult,
    /// The command's own literal.
    Literal,
}

impl Source {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "SELF" => Some(Self::SelfValue),
            "PREVIOUS_RESULT" | "PREVIOUS_VALUE" => Some(Self::PreviousResult),
            "LITERAL" | "VALUE" => Some(Self::Literal),
            _ => None,
        }
    }
}

/// One storage instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub group: Group,
    pub key: String,
    /// Hash field; present for `Group::Hash` only.
    pub field: Option<String>,
    pub source: Source,
    pub literal: Option<String>,
}

impl Command {
    pub fn list(key: impl Into<String>, source: Source) -> Self {
        Self::new(Group::List, key, source)
    }

    pub fn hash(key: impl Into<String>, field: impl Into<String>, source: Source) -> Self {
        Self {
            field: Some(field.into()),
            ..Self::new(Group::Hash, key, source)
        }
    }

    pub fn set(key: impl Into<String>, source: Source) -> Self {
        Self::new(Group::Set, key, source)
    }

    pub fn sorted_set(key: impl Into<String>, source: Source) -> Self {
        Self::new(Group::SortedSet, key, source)
    }

    pub fn new(group: Group, key: impl Into<String>, source: Source) -> Self {
        Self {
            group,
            key: key.into(),
            field: None,
            source,
            literal: None,
        }
    }

    pub fn with_literal(mut self, literal: impl Into<String>) -> Self {
        self.literal = Some(literal.into());
        self
    }
}

/// What extraction does with a group tag it does not know.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownGroupPolicy {
    /// Treat the message as malformed.
    #[default]
    Reject,
    /// Keep the command as `Group::Unrecognized`; the engine skips it.
    Skip,
}

/// Errors turning a record into commands.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ExtractError {
    #[error("Invalid command list: {0}")]
    InvalidCommandList(FieldError),

    #[error("Malformed command at index {index}: {reason}")]
    Malformed { index: usize, reason: String },
}
