//! Error types for the chart specification engine

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single structural problem found while validating a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// JSON-Pointer to the offending value ("" for the document root)
    pub path: String,
    /// Human-readable description
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{}: {}", path, self.message)
    }
}

/// Schema violation: the candidate does not match the expected shape
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{} validation issue(s): {}", .issues.len(), join_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(vec![ValidationIssue::new(path, message)])
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Patch engine errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatchError {
    #[error("Read-only path violation: {path} is protected")]
    ReadonlyPath { path: String },

    #[error("Invalid patch path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Cannot traverse into non-container value at {path}")]
    NotAContainer { path: String },

    #[error("Patch '{op}' at {path} requires a value")]
    MissingValue { op: String, path: String },

    #[error("Array index out of range at {path}")]
    IndexOutOfRange { path: String },

    #[error("Patched spec failed validation: {0}")]
    Invalid(#[from] ValidationError),
}

/// Text-generation provider failures (transport level)
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned no content: {0}")]
    MissingContent(String),
}

/// AI-edit protocol failures, kept distinct for user-facing recovery messaging
#[derive(Error, Debug)]
pub enum AiEditError {
    /// Nothing came back (timeout, cancellation, transport error, empty body)
    #[error("No response from text generator: {reason}")]
    NoResponse { reason: String },

    /// Text came back but contains no usable JSON object
    #[error("Could not parse edit response: {reason} (preview: {preview})")]
    ParseFailed { reason: String, preview: String },

    /// JSON came back but does not match the edit response shape
    #[error("Edit response failed validation: {0}")]
    ValidationFailed(ValidationError),

    /// A proposed patch touches a protected subtree
    #[error("Edit response touches read-only path {path}")]
    ReadonlyPathViolation { path: String },

    /// The patches were well-formed but could not be applied
    #[error("Edit could not be applied: {0}")]
    Patch(#[from] PatchError),
}

/// Render converter errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("Encoding field '{field}' (at {channel}) is not a column of the data source")]
    UnknownField { channel: String, field: String },
}

/// Project store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Project not found: {0}")]
    NotFound(String),

    #[error("Checksum mismatch for project {id}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        id: String,
        expected: String,
        actual: String,
    },

    #[error("Stored spec is invalid: {0}")]
    InvalidSpec(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
