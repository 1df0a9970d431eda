//! `$ref` parsing and JSON Pointer navigation.

use percent_encoding::percent_decode_str;
use serde_json::Value;

use crate::document::escape_segment;
use crate::error::SpecError;
use crate::location::Location;

/// The key marking a reference node.
pub const REF_KEY: &str = "$ref";

/// A parsed `$ref` pointer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    /// The literal `$ref` string as written in the document.
    pub raw: String,
    /// Canonical location of the target document.
    pub location: Location,
    /// Unescaped JSON Pointer segments inside the target document.
    pub pointer: Vec<String>,
}

impl Reference {
    /// Parse a `$ref` string found in the document at `base`.
    ///
    /// A reference without a document part (`#/definitions/Pet`) targets
    /// `base` itself; anything else is resolved relative to `base`.
    ///
    /// # Errors
    ///
    /// Returns `SpecError::Resolution` when the document part cannot be
    /// resolved or the fragment is not a JSON Pointer.
    pub fn parse(raw: &str, base: &Location) -> Result<Self, SpecError> {
        let (document, fragment) = match raw.find('#') {
            Some(idx) => (&raw[..idx], &raw[idx + 1..]),
            None => (raw, ""),
        };

        let location = if document.is_empty() {
            base.clone()
        } else {
            base.join(document).map_err(|e| SpecError::Resolution {
                reference: raw.to_string(),
                referrer: base.to_string(),
                reason: "invalid target location".to_string(),
                source: Some(Box::new(e)),
            })?
        };

        let decoded = percent_decode_str(fragment)
            .decode_utf8()
            .map_err(|_| malformed(raw, base, "fragment is not valid UTF-8"))?;
        let pointer = parse_pointer(&decoded)
            .ok_or_else(|| malformed(raw, base, "fragment is not a JSON pointer"))?;

        Ok(Self {
            raw: raw.to_string(),
            location,
            pointer,
        })
    }

    /// The pointer rendered back to its escaped string form.
    pub fn pointer_string(&self) -> String {
        format_pointer(&self.pointer)
    }
}

fn malformed(raw: &str, base: &Location, reason: &str) -> SpecError {
    SpecError::Resolution {
        reference: raw.to_string(),
        referrer: base.to_string(),
        reason: reason.to_string(),
        source: None,
    }
}

/// Returns the `$ref` string when `value` is a reference node: a mapping
/// whose only key is `$ref` with a string value.
pub fn reference_of(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) if map.len() == 1 => map.get(REF_KEY).and_then(Value::as_str),
        _ => None,
    }
}

/// Split a JSON Pointer into unescaped segments.
///
/// Returns `None` unless the pointer is empty or starts with `/`.
pub fn parse_pointer(pointer: &str) -> Option<Vec<String>> {
    if pointer.is_empty() {
        return Some(Vec::new());
    }
    let rest = pointer.strip_prefix('/')?;
    Some(
        rest.split('/')
            // Unescape JSON Pointer encoding (~1 = /, ~0 = ~)
            .map(|part| part.replace("~1", "/").replace("~0", "~"))
            .collect(),
    )
}

/// Render segments as an escaped JSON Pointer.
pub fn format_pointer(segments: &[String]) -> String {
    segments
        .iter()
        .map(|segment| format!("/{}", escape_segment(segment)))
        .collect()
}

/// Navigate to the node addressed by `pointer`.
///
/// Mappings are indexed by key, sequences by decimal index.
pub fn navigate<'a>(value: &'a Value, pointer: &[String]) -> Option<&'a Value> {
    pointer
        .iter()
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}
