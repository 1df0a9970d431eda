//! Core configuration types.

use std::time::Duration;

use crate::loader::{DocumentCache, DEFAULT_TIMEOUT};

/// Name of the backend used when none is selected.
pub const DEFAULT_BACKEND: &str = "structural";

/// Options controlling how a document is parsed, resolved and validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Expand `$ref` pointers before validation (resolving parser) or
    /// validate the raw tree (base parser).
    pub resolve: bool,
    /// Defer expansion of each reference until its subtree is accessed.
    pub lazy: bool,
    /// Name of the validation backend.
    pub backend: String,
    /// Reject non-string mapping keys instead of stringifying them.
    pub strict: bool,
    /// Timeout for each remote fetch.
    pub timeout: Duration,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BACKEND)
    }
}

impl ParserConfig {
    /// Create a resolving, eager, strict configuration for `backend`.
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            resolve: true,
            lazy: false,
            backend: backend.into(),
            strict: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn resolve(mut self, resolve: bool) -> Self {
        self.resolve = resolve;
        self
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// A fresh document cache honoring this configuration.
    pub fn document_cache(&self) -> DocumentCache {
        DocumentCache::new(self.strict, self.timeout)
    }
}

/// How a batch reacts to a failing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// Stop at the first failing document.
    #[default]
    FailFast,
    /// Process every document and report every failure.
    KeepGoing,
}

impl BatchPolicy {
    /// Create a policy from a keep-going flag.
    pub fn from_keep_going_flag(keep_going: bool) -> Self {
        if keep_going {
            BatchPolicy::KeepGoing
        } else {
            BatchPolicy::FailFast
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ParserConfig::default();
        assert!(config.resolve);
        assert!(!config.lazy);
        assert!(config.strict);
        assert_eq!(config.backend, DEFAULT_BACKEND);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn builder() {
        let config = ParserConfig::new("minimal")
            .resolve(false)
            .lazy(true)
            .strict(false)
            .timeout(Duration::from_secs(3));
        assert_eq!(config.backend, "minimal");
        assert!(!config.resolve);
        assert!(config.lazy);
        assert!(!config.strict);
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn batch_policy_from_flag() {
        assert_eq!(BatchPolicy::from_keep_going_flag(true), BatchPolicy::KeepGoing);
        assert_eq!(BatchPolicy::from_keep_going_flag(false), BatchPolicy::FailFast);
        assert_eq!(BatchPolicy::default(), BatchPolicy::FailFast);
    }
}
