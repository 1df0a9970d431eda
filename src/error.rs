//! Error types for document loading, reference resolution and validation.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Errors raised while turning a document location into a validated spec.
#[derive(Debug, Error)]
pub enum SpecError {
    // Location errors
    #[error("cannot resolve location \"{input}\": {message}")]
    Location { input: String, message: String },

    // Fetch errors
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("cannot fetch {url}: remote documents require the 'remote' feature")]
    RemoteDisabled { url: String },

    // Parse errors
    #[error("invalid document {location}: {message}")]
    Parse { location: String, message: String },

    // Resolution errors
    #[error("cannot resolve \"{reference}\" in {referrer}: {reason}")]
    Resolution {
        /// The literal `$ref` string.
        reference: String,
        /// Canonical location of the document containing the reference.
        referrer: String,
        reason: String,
        #[source]
        source: Option<Box<SpecError>>,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{message}")]
    Usage { message: String },

    #[error("cannot write {path}: {message}")]
    Write { path: PathBuf, message: String },
}

/// Coarse error classification used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Location,
    Fetch,
    Parse,
    Resolution,
    Validation,
    Usage,
    Write,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Location => "LocationError",
            ErrorKind::Fetch => "FetchError",
            ErrorKind::Parse => "ParseError",
            ErrorKind::Resolution => "ResolutionError",
            ErrorKind::Validation => "ValidationError",
            ErrorKind::Usage => "UsageError",
            ErrorKind::Write => "WriteError",
        };
        f.write_str(name)
    }
}

impl SpecError {
    pub(crate) fn location(input: &str, message: impl Into<String>) -> Self {
        SpecError::Location {
            input: input.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn parse(location: impl fmt::Display, message: impl Into<String>) -> Self {
        SpecError::Parse {
            location: location.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn usage(message: impl Into<String>) -> Self {
        SpecError::Usage {
            message: message.into(),
        }
    }

    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SpecError::Location { .. } => ErrorKind::Location,
            SpecError::FileNotFound { .. }
            | SpecError::Read { .. }
            | SpecError::RemoteDisabled { .. } => ErrorKind::Fetch,
            #[cfg(feature = "remote")]
            SpecError::Network { .. } => ErrorKind::Fetch,
            SpecError::Parse { .. } => ErrorKind::Parse,
            SpecError::Resolution { .. } => ErrorKind::Resolution,
            SpecError::Validation(_) => ErrorKind::Validation,
            SpecError::Usage { .. } => ErrorKind::Usage,
            SpecError::Write { .. } => ErrorKind::Write,
        }
    }

    /// Returns the process exit code for this error type.
    pub fn exit_code(&self) -> u8 {
        match self.kind() {
            ErrorKind::Usage => 2,
            _ => 1,
        }
    }
}

/// Category of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingKind {
    MissingVersion,
    UnsupportedVersion,
    MissingField,
    InvalidType,
    InvalidValue,
    Duplicate,
    Schema,
    BackendFailure,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FindingKind::MissingVersion => "missing-version",
            FindingKind::UnsupportedVersion => "unsupported-version",
            FindingKind::MissingField => "missing-field",
            FindingKind::InvalidType => "invalid-type",
            FindingKind::InvalidValue => "invalid-value",
            FindingKind::Duplicate => "duplicate",
            FindingKind::Schema => "schema",
            FindingKind::BackendFailure => "backend-failure",
        };
        f.write_str(name)
    }
}

/// A schema-level finding reported by a validation backend, normalized
/// across backends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    /// Name of the backend that produced the finding.
    pub backend: String,
    pub kind: FindingKind,
    pub message: String,
    /// JSON Pointer (RFC 6901) to the offending node, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,
    /// Number of further findings the backend reported.
    #[serde(skip_serializing_if = "is_zero")]
    pub additional: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.backend, self.kind)?;
        if let Some(pointer) = &self.pointer {
            let shown = if pointer.is_empty() { "/" } else { pointer };
            write!(f, " at {}", shown)?;
        }
        write!(f, ": {}", self.message)?;
        if self.additional > 0 {
            write!(f, " (and {} more)", self.additional)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}
