//! Document loading and per-session caching.
//!
//! Handles loading documents from local files and HTTP URLs. Each canonical
//! location is fetched at most once per cache.

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use crate::document::Document;
use crate::error::SpecError;
use crate::location::Location;

/// Default timeout for HTTP requests (10 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Cache of parsed documents keyed by canonical location.
#[derive(Debug)]
pub struct DocumentCache {
    documents: HashMap<Location, Rc<Document>>,
    strict: bool,
    timeout: Duration,
    fetches: usize,
    #[cfg(feature = "remote")]
    client: Option<reqwest::blocking::Client>,
}

impl Default for DocumentCache {
    fn default() -> Self {
        Self::new(true, DEFAULT_TIMEOUT)
    }
}

impl DocumentCache {
    /// Create an empty cache.
    ///
    /// `strict` controls how non-string YAML mapping keys are handled;
    /// `timeout` bounds each remote fetch.
    pub fn new(strict: bool, timeout: Duration) -> Self {
        Self {
            documents: HashMap::new(),
            strict,
            timeout,
            fetches: 0,
            #[cfg(feature = "remote")]
            client: None,
        }
    }

    /// Load the document at `location`, fetching it on a cache miss.
    ///
    /// # Errors
    ///
    /// Returns a fetch error (`FileNotFound`, `Read`, `Network`,
    /// `RemoteDisabled`) if the source is unreachable, or
    /// `SpecError::Parse` if its content is malformed.
    pub fn load(&mut self, location: &Location) -> Result<Rc<Document>, SpecError> {
        if let Some(document) = self.documents.get(location) {
            debug!(%location, "document cache hit");
            return Ok(Rc::clone(document));
        }

        debug!(%location, "fetching document");
        let text = self.fetch(location)?;
        self.fetches += 1;

        let document = Rc::new(Document::parse(location.clone(), &text, self.strict)?);
        if let Some(version) = document.version() {
            debug!(%location, %version, "detected spec version");
        }
        self.documents
            .insert(location.clone(), Rc::clone(&document));
        Ok(document)
    }

    /// Seed the cache with an in-memory document, replacing any entry for
    /// the same location.
    pub fn insert(&mut self, document: Document) -> Rc<Document> {
        let document = Rc::new(document);
        self.documents
            .insert(document.location().clone(), Rc::clone(&document));
        document
    }

    pub fn contains(&self, location: &Location) -> bool {
        self.documents.contains_key(location)
    }

    /// Number of documents held.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Number of fetches performed (cache misses that reached a source).
    pub fn fetch_count(&self) -> usize {
        self.fetches
    }

    fn fetch(&mut self, location: &Location) -> Result<String, SpecError> {
        match location.to_file_path() {
            Some(path) => read_file(&path),
            None if location.is_local() => Err(SpecError::location(
                location.as_str(),
                "file URL has no filesystem path",
            )),
            None => self.fetch_remote(location),
        }
    }

    #[cfg(feature = "remote")]
    fn fetch_remote(&mut self, location: &Location) -> Result<String, SpecError> {
        let url = location.as_str();
        let network = |source: reqwest::Error| SpecError::Network {
            url: url.to_string(),
            source,
        };

        let client = match &self.client {
            Some(client) => client.clone(),
            None => {
                let client = reqwest::blocking::Client::builder()
                    .timeout(self.timeout)
                    .build()
                    .map_err(network)?;
                self.client = Some(client.clone());
                client
            }
        };

        // Check for HTTP errors before reading the body
        let response = client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(network)?;

        response.text().map_err(network)
    }

    #[cfg(not(feature = "remote"))]
    fn fetch_remote(&mut self, location: &Location) -> Result<String, SpecError> {
        let _ = self.timeout;
        Err(SpecError::RemoteDisabled {
            url: location.to_string(),
        })
    }
}

fn read_file(path: &Path) -> Result<String, SpecError> {
    if !path.exists() {
        return Err(SpecError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    std::fs::read_to_string(path).map_err(|source| SpecError::Read {
        path: path.to_path_buf(),
        source,
    })
}
