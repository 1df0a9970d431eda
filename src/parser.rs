//! Parser front: load, optionally resolve, then validate one document.

use serde_json::Value;
use tracing::debug;

use crate::document::SpecVersion;
use crate::error::SpecError;
use crate::location::Location;
use crate::resolver::{Resolution, ResolvedReference, Session};
use crate::types::ParserConfig;
use crate::validator::{validate_with, BackendRegistry};

/// A document that loaded, resolved (when requested) and validated.
#[derive(Debug, Clone)]
pub struct ParsedSpec {
    pub location: Location,
    pub version: SpecVersion,
    /// The resolved tree, or the raw tree when resolution is off.
    pub spec: Value,
    /// References expanded while resolving; empty for the base parser.
    pub references: Vec<ResolvedReference>,
}

/// Parse the document at `location`.
///
/// The backend is looked up before the document is read. Each call uses a
/// fresh session, so nothing is cached between documents.
///
/// # Errors
///
/// Returns `SpecError::Usage` for an unknown backend, the fetch, parse or
/// resolution error that stopped loading, or `SpecError::Validation` when
/// the backend rejects the tree.
pub fn parse(
    location: &Location,
    config: &ParserConfig,
    registry: &BackendRegistry,
) -> Result<ParsedSpec, SpecError> {
    let backend = registry.require(&config.backend)?;

    let (spec, references) = if config.resolve {
        let session = Session::new(config.document_cache());
        let resolved = Resolution::open(session, location, config.lazy)?.finish()?;
        (resolved.to_value(), resolved.references)
    } else {
        let mut cache = config.document_cache();
        let document = cache.load(location)?;
        (document.value().clone(), Vec::new())
    };

    let version = validate_with(backend, &spec)?;
    debug!(
        location = %location,
        version = %version,
        backend = backend.name(),
        references = references.len(),
        "document is valid"
    );

    Ok(ParsedSpec {
        location: location.clone(),
        version,
        spec,
        references,
    })
}
