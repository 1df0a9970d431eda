//! Canonical document locations.
//!
//! Every document is identified by an absolute URL: `file://` for local
//! documents, `http(s)://` for remote ones. Canonical locations are the keys
//! of the document cache, so two spellings of the same file must map to the
//! same location.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::error::SpecError;

const SUPPORTED_SCHEMES: &[&str] = &["file", "http", "https"];

/// Canonical, cache-stable identifier of a document source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    url: Url,
}

impl Location {
    /// Canonicalize a user-supplied path or URL.
    ///
    /// Existing filesystem entries become absolute `file://` locations.
    /// Strings with a URL scheme are taken as URLs. Anything else is treated
    /// as a path relative to the current directory, whether or not it exists;
    /// a missing file surfaces later as a fetch error.
    ///
    /// # Errors
    ///
    /// Returns `SpecError::Location` for empty input, malformed URLs and
    /// unsupported schemes.
    pub fn from_input(input: &str) -> Result<Self, SpecError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SpecError::location(input, "empty location"));
        }

        let path = Path::new(trimmed);
        if path.exists() {
            let absolute = std::fs::canonicalize(path)
                .map_err(|e| SpecError::location(input, e.to_string()))?;
            return Self::from_path(&absolute, input);
        }

        match Url::parse(trimmed) {
            // Single-letter schemes are Windows drive letters, not URLs.
            Ok(url) if url.scheme().len() > 1 => Self::from_url(url, input),
            Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => {
                let cwd = std::env::current_dir()
                    .map_err(|e| SpecError::location(input, e.to_string()))?;
                Self::from_path(&normalize_path(&cwd.join(path)), input)
            }
            Err(e) => Err(SpecError::location(input, e.to_string())),
        }
    }

    /// Build a location from an absolute filesystem path, canonicalized when
    /// the file exists.
    pub fn from_file_path(path: &Path) -> Result<Self, SpecError> {
        let display = path.display().to_string();
        match std::fs::canonicalize(path) {
            Ok(canonical) => Self::from_path(&canonical, &display),
            Err(_) => Self::from_path(path, &display),
        }
    }

    fn from_path(path: &Path, input: &str) -> Result<Self, SpecError> {
        let url = Url::from_file_path(path)
            .map_err(|()| SpecError::location(input, "not an absolute path"))?;
        Ok(Self { url })
    }

    fn from_url(mut url: Url, input: &str) -> Result<Self, SpecError> {
        if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
            return Err(SpecError::location(
                input,
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        url.set_fragment(None);
        Ok(Self { url })
    }

    /// Resolve a reference relative to this document's location.
    ///
    /// The fragment of `reference` is discarded. Local results are
    /// canonicalized when the file exists, so `./a.yaml` and `sub/../a.yaml`
    /// share one cache entry.
    pub fn join(&self, reference: &str) -> Result<Location, SpecError> {
        let joined = self
            .url
            .join(reference)
            .map_err(|e| SpecError::location(reference, e.to_string()))?;
        let location = Self::from_url(joined, reference)?;

        if let Some(path) = location.to_file_path() {
            if let Ok(canonical) = std::fs::canonicalize(&path) {
                return Self::from_path(&canonical, reference);
            }
        }
        Ok(location)
    }

    /// Returns true for `file://` locations.
    pub fn is_local(&self) -> bool {
        self.url.scheme() == "file"
    }

    /// Filesystem path of a local location.
    pub fn to_file_path(&self) -> Option<PathBuf> {
        if self.is_local() {
            self.url.to_file_path().ok()
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Whether the location names a `.json` document.
    pub(crate) fn has_json_extension(&self) -> bool {
        self.url.path().to_ascii_lowercase().ends_with(".json")
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Fold `.` and `..` components without touching the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
