//! Message declarations published by sender types.
//!
//! # Responsibility
//! - Describe one named message and its ordered parameter signature.
//! - Validate declarations before they enter a sender's catalog.
//!
//! # Invariants
//! - A message name is non-empty and carries no surrounding whitespace.
//! - Names are unique within one sender type; the first declaration wins.

use crate::model::types::ArgType;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One entry of a sender type's message catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDecl {
    name: String,
    signature: Vec<ArgType>,
}

impl MessageDecl {
    pub fn new(name: impl Into<String>, signature: impl IntoIterator<Item = ArgType>) -> Self {
        Self {
            name: name.into(),
            signature: signature.into_iter().collect(),
        }
    }

    /// Message without arguments.
    pub fn unit(name: impl Into<String>) -> Self {
        Self::new(name, [])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &[ArgType] {
        &self.signature
    }

    /// Validates declaration-level invariants that do not depend on siblings.
    pub fn validate(&self) -> Result<(), MessageDeclError> {
        if self.name.trim().is_empty() {
            return Err(MessageDeclError::EmptyName);
        }
        if self.name.trim() != self.name {
            return Err(MessageDeclError::UntrimmedName(self.name.clone()));
        }
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (String, Vec<ArgType>) {
        (self.name, self.signature)
    }
}

/// Reasons a message declaration is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageDeclError {
    EmptyName,
    UntrimmedName(String),
    DuplicateName(String),
}

impl Display for MessageDeclError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "message name cannot be empty"),
            Self::UntrimmedName(value) => {
                write!(f, "message name has surrounding whitespace: `{value}`")
            }
            Self::DuplicateName(value) => write!(f, "message already declared: {value}"),
        }
    }
}

impl Error for MessageDeclError {}
