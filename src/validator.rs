//! Validation dispatch across interchangeable backends.

use serde_json::Value;

use crate::backends::{JsonSchemaBackend, MinimalBackend, StructuralBackend};
use crate::document::SpecVersion;
use crate::error::{FindingKind, SpecError, ValidationError};
use crate::types::DEFAULT_BACKEND;

/// A single issue found by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub kind: FindingKind,
    pub message: String,
    /// JSON Pointer (RFC 6901) to the offending node.
    pub pointer: Option<String>,
}

impl Finding {
    pub fn new(kind: FindingKind, pointer: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            pointer: Some(pointer.into()),
        }
    }
}

/// A schema conformance checker.
pub trait Backend {
    /// Name used to select the backend.
    fn name(&self) -> &'static str;

    /// One-line description shown when listing backends.
    fn description(&self) -> &'static str;

    /// Whether this backend can validate documents of `version`.
    fn supports(&self, version: &SpecVersion) -> bool;

    /// Check `spec` and return every finding; empty means valid.
    fn check(&self, spec: &Value, version: &SpecVersion) -> Vec<Finding>;
}

/// Explicit mapping from backend name to implementation.
pub struct BackendRegistry {
    backends: Vec<Box<dyn Backend>>,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.names())
            .finish()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl BackendRegistry {
    /// A registry with no backends.
    pub fn empty() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    /// A registry holding the built-in backends.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(StructuralBackend));
        registry.register(Box::new(JsonSchemaBackend));
        registry.register(Box::new(MinimalBackend));
        registry
    }

    /// Add a backend, replacing any backend with the same name.
    pub fn register(&mut self, backend: Box<dyn Backend>) {
        match self.backends.iter().position(|b| b.name() == backend.name()) {
            Some(index) => self.backends[index] = backend,
            None => self.backends.push(backend),
        }
    }

    /// Names of the registered backends, in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Backend> {
        self.backends
            .iter()
            .find(|b| b.name() == name)
            .map(|b| &**b)
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(dyn Backend + 'static)> {
        self.backends.iter().map(|b| &**b)
    }

    /// Look up a backend, failing with a usage error for unknown names.
    ///
    /// Callers run this before any I/O.
    pub fn require(&self, name: &str) -> Result<&dyn Backend, SpecError> {
        self.get(name).ok_or_else(|| {
            SpecError::usage(format!(
                "unknown backend \"{}\"; available backends: {}",
                name,
                self.names().join(", ")
            ))
        })
    }

    /// Validate `spec` with the named backend and return its version.
    ///
    /// # Errors
    ///
    /// Returns `SpecError::Usage` for an unknown backend and
    /// `SpecError::Validation` for the first finding.
    pub fn validate(&self, spec: &Value, backend: &str) -> Result<SpecVersion, SpecError> {
        let selected = self.require(backend)?;
        validate_with(selected, spec).map_err(SpecError::from)
    }
}

/// Run one backend and normalize its findings.
pub fn validate_with(backend: &dyn Backend, spec: &Value) -> Result<SpecVersion, ValidationError> {
    let failure = |finding: Finding, additional: usize| ValidationError {
        backend: backend.name().to_string(),
        kind: finding.kind,
        message: finding.message,
        pointer: finding.pointer,
        additional,
    };

    let Some(version) = SpecVersion::detect(spec) else {
        return Err(failure(
            Finding::new(
                FindingKind::MissingVersion,
                "",
                "document declares neither a 2.x 'swagger' nor a 3.x 'openapi' version",
            ),
            0,
        ));
    };

    if !backend.supports(&version) {
        return Err(failure(
            Finding::new(
                FindingKind::UnsupportedVersion,
                "",
                format!("{} is not supported by this backend", version),
            ),
            0,
        ));
    }

    let mut findings = backend.check(spec, &version).into_iter();
    match findings.next() {
        None => Ok(version),
        Some(first) => Err(failure(first, findings.count())),
    }
}

/// The backend selected when none is given.
pub fn default_backend() -> &'static str {
    DEFAULT_BACKEND
}
