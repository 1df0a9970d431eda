//! Parsed documents and spec version detection.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::error::SpecError;
use crate::location::Location;

/// Family of API description format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecFamily {
    Swagger,
    OpenApi,
}

/// Version declared by a document's top-level `swagger` or `openapi` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SpecVersion {
    pub family: SpecFamily,
    /// Declared version string, e.g. `"2.0"` or `"3.0.3"`.
    pub version: String,
}

impl SpecVersion {
    /// Detect the declared version of a document root.
    ///
    /// Accepts strings and YAML numbers (`swagger: 2.0`). Returns `None` when
    /// neither a 2.x `swagger` nor a 3.x `openapi` key is present.
    pub fn detect(root: &Value) -> Option<Self> {
        let declared = |key: &str| -> Option<String> {
            match root.get(key)? {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        };

        if let Some(version) = declared("openapi") {
            if version.starts_with("3.") {
                return Some(Self {
                    family: SpecFamily::OpenApi,
                    version,
                });
            }
        }
        if let Some(version) = declared("swagger") {
            if version.starts_with("2.") || version == "2" {
                return Some(Self {
                    family: SpecFamily::Swagger,
                    version,
                });
            }
        }
        None
    }

    /// Major and minor version numbers, if the version string has them.
    pub fn major_minor(&self) -> Option<(u32, u32)> {
        let mut parts = self.version.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next().unwrap_or("0").parse().ok()?;
        Some((major, minor))
    }

    pub fn is_swagger_2(&self) -> bool {
        self.family == SpecFamily::Swagger && self.major_minor().map(|(m, _)| m) == Some(2)
    }

    pub fn is_openapi(&self, major: u32, minor: u32) -> bool {
        self.family == SpecFamily::OpenApi && self.major_minor() == Some((major, minor))
    }
}

impl fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.family {
            SpecFamily::Swagger => write!(f, "Swagger {}", self.version),
            SpecFamily::OpenApi => write!(f, "OpenAPI {}", self.version),
        }
    }
}

/// A parsed document together with its canonical location.
#[derive(Debug, Clone)]
pub struct Document {
    location: Location,
    value: Value,
    version: Option<SpecVersion>,
}

impl Document {
    /// Wrap an already-parsed tree.
    pub fn new(location: Location, value: Value) -> Self {
        let version = SpecVersion::detect(&value);
        Self {
            location,
            value,
            version,
        }
    }

    /// Parse document text as JSON or YAML.
    ///
    /// JSON is used when the location ends in `.json` or the content starts
    /// with `{` or `[`; YAML otherwise. With `strict`, mapping keys that are
    /// not strings are rejected; without it they are stringified.
    ///
    /// # Errors
    ///
    /// Returns `SpecError::Parse` on malformed content.
    pub fn parse(location: Location, text: &str, strict: bool) -> Result<Self, SpecError> {
        let trimmed = text.trim_start();
        let looks_like_json = trimmed.starts_with('{') || trimmed.starts_with('[');

        let value = if location.has_json_extension() || looks_like_json {
            serde_json::from_str(text).map_err(|e| SpecError::parse(&location, e.to_string()))?
        } else {
            let yaml: serde_yaml::Value =
                serde_yaml::from_str(text).map_err(|e| SpecError::parse(&location, e.to_string()))?;
            yaml_to_json(yaml, strict, "").map_err(|message| SpecError::parse(&location, message))?
        };

        Ok(Self::new(location, value))
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn version(&self) -> Option<&SpecVersion> {
        self.version.as_ref()
    }
}

/// Convert a YAML tree into a JSON tree, preserving mapping order.
fn yaml_to_json(value: serde_yaml::Value, strict: bool, path: &str) -> Result<Value, String> {
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => yaml_number(&n, path)?,
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(index, item)| yaml_to_json(item, strict, &format!("{}/{}", path, index)))
                .collect::<Result<_, _>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, item) in mapping {
                let key = mapping_key(key, strict, path)?;
                // `200` and `"200"` are distinct YAML keys but one JSON key.
                if map.contains_key(&key) {
                    return Err(format!(
                        "duplicate mapping key '{}' at {}",
                        key,
                        display_path(path)
                    ));
                }
                let child_path = format!("{}/{}", path, escape_segment(&key));
                let item = yaml_to_json(item, strict, &child_path)?;
                map.insert(key, item);
            }
            Value::Object(map)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value, strict, path)?,
    })
}

fn mapping_key(key: serde_yaml::Value, strict: bool, path: &str) -> Result<String, String> {
    use serde_yaml::Value as Yaml;

    let stringified = match key {
        Yaml::String(s) => return Ok(s),
        Yaml::Number(n) => n.to_string(),
        Yaml::Bool(b) => b.to_string(),
        Yaml::Null => "null".to_string(),
        Yaml::Tagged(tagged) => return mapping_key(tagged.value, strict, path),
        Yaml::Sequence(_) | Yaml::Mapping(_) => {
            return Err(format!(
                "unsupported complex mapping key at {}",
                display_path(path)
            ))
        }
    };

    if strict {
        Err(format!(
            "non-string mapping key '{}' at {} (quote the key or disable strict mode)",
            stringified,
            display_path(path)
        ))
    } else {
        Ok(stringified)
    }
}

fn yaml_number(n: &serde_yaml::Number, path: &str) -> Result<Value, String> {
    if let Some(i) = n.as_i64() {
        Ok(Value::Number(i.into()))
    } else if let Some(u) = n.as_u64() {
        Ok(Value::Number(u.into()))
    } else {
        n.as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("non-finite number at {}", display_path(path)))
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

/// Escape a key for use as a JSON Pointer segment.
pub(crate) fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}
