use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoreErrorCode {
    Io,
    MalformedDocument,
    UnrecognizedFormat,
    DuplicateIdentifier,
    PatchApplicationFailure,
    UnknownIdentifier,
    ReferenceNotFound,
    UnsupportedOperation,
}

impl CoreErrorCode {
    /// Fatal codes abort a load and leave the previously loaded documents in place.
    pub fn is_fatal_to_load(self) -> bool {
        matches!(
            self,
            Self::Io
                | Self::MalformedDocument
                | Self::UnrecognizedFormat
                | Self::DuplicateIdentifier
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreError {
    pub code: CoreErrorCode,
    pub message: String,
    /// The key, identifier or path the error is about, when there is one.
    pub subject: Option<String>,
}

impl CoreError {
    pub fn new(code: CoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            subject: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn duplicate(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(CoreErrorCode::DuplicateIdentifier, message).with_subject(subject)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(CoreErrorCode::MalformedDocument, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(CoreErrorCode::UnsupportedOperation, message)
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subject {
            Some(subject) => write!(f, "{:?}: {} ({subject})", self.code, self.message),
            None => write!(f, "{:?}: {}", self.code, self.message),
        }
    }
}

impl Error for CoreError {}
