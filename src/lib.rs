//! OpenAPI / Swagger reference resolver and validator
//!
//! Loads API description documents from files or URLs, expands every `$ref`
//! into a single tree (across documents, terminating on cycles) and
//! validates the result with a selectable backend.
//!
//! # Example
//!
//! ```
//! use oasref::{resolve_value, Location};
//! use serde_json::json;
//!
//! let spec = json!({
//!     "openapi": "3.0.3",
//!     "paths": {
//!         "/pets": {
//!             "get": {
//!                 "responses": { "200": { "$ref": "#/components/responses/Ok" } }
//!             }
//!         }
//!     },
//!     "components": {
//!         "responses": { "Ok": { "description": "ok" } }
//!     }
//! });
//!
//! let base = Location::from_input("https://example.com/api.json").unwrap();
//! let resolved = resolve_value(spec, &base).unwrap();
//!
//! // The reference is replaced by the node it points to
//! let ok = &resolved["paths"]["/pets"]["get"]["responses"]["200"];
//! assert_eq!(ok["description"], "ok");
//! ```
//!
//! # Pipeline
//!
//! | Step | Module | Failure |
//! |------|--------|---------|
//! | input string → canonical location | `location` | `LocationError` |
//! | location → parsed document (cached) | `loader` | `FetchError`, `ParseError` |
//! | `$ref` expansion into a node arena | `resolver` | `ResolutionError` |
//! | conformance check | `validator` | `ValidationError` |
//! | serialization | `writer` | `WriteError` |
//!
//! # Cycles
//!
//! A reference that points back into a node still being expanded is kept
//! as a link ([`Node::BackRef`]) instead of being inlined again. Rendered
//! output shows such a link as `{"$ref": "#/..."}` naming the position of
//! its target in the output, so a written tree resolves again by itself.

mod backends;
mod document;
mod error;
mod loader;
mod location;
mod orchestrator;
mod parser;
mod reference;
mod resolver;
mod tree;
mod types;
mod validator;
mod writer;

pub use backends::{JsonSchemaBackend, MinimalBackend, StructuralBackend};
pub use document::{Document, SpecFamily, SpecVersion};
pub use error::{ErrorKind, FindingKind, SpecError, ValidationError};
pub use loader::{DocumentCache, DEFAULT_TIMEOUT};
pub use location::Location;
pub use orchestrator::{BatchOutcome, Console, Failure, Orchestrator};
pub use parser::{parse, ParsedSpec};
pub use reference::{format_pointer, navigate, parse_pointer, reference_of, Reference, REF_KEY};
pub use resolver::{
    resolve_value, PendingRef, Resolution, ResolvedDocument, ResolvedReference, Session,
};
pub use tree::{Node, NodeId, Tree};
pub use types::{BatchPolicy, ParserConfig, DEFAULT_BACKEND};
pub use validator::{default_backend, validate_with, Backend, BackendRegistry, Finding};
pub use writer::{nest_local_references, serialize_tree, write_tree, OutputFormat};
