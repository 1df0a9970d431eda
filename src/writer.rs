//! Serialization of trees to output files.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::SpecError;
use crate::reference::REF_KEY;

/// Serialization format of an output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
}

impl OutputFormat {
    /// Pick the format from the file extension; anything but `.yaml` or
    /// `.yml` is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("yaml") | Some("yml") => OutputFormat::Yaml,
            _ => OutputFormat::Json,
        }
    }
}

/// Serialize `tree` in `format`.
pub fn serialize_tree(tree: &Value, format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(tree)
            .map(|mut text| {
                text.push('\n');
                text
            })
            .map_err(|e| e.to_string()),
        OutputFormat::Yaml => serde_yaml::to_string(tree).map_err(|e| e.to_string()),
    }
}

/// Write `tree` to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns `SpecError::Write` if the tree cannot be serialized or the file
/// cannot be written.
pub fn write_tree(path: &Path, tree: &Value) -> Result<(), SpecError> {
    let format = OutputFormat::from_path(path);
    let text = serialize_tree(tree, format).map_err(|message| SpecError::Write {
        path: path.to_path_buf(),
        message,
    })?;
    fs::write(path, text).map_err(|e| SpecError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    debug!(path = %path.display(), ?format, "wrote output");
    Ok(())
}

/// Move every local `$ref` in `tree` under `prefix`, an escaped JSON
/// Pointer, for embedding `tree` in a larger document.
///
/// References to other documents are left alone.
pub fn nest_local_references(tree: &mut Value, prefix: &str) {
    match tree {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(target)) = map.get_mut(REF_KEY) {
                    if let Some(pointer) = target.strip_prefix('#') {
                        *target = format!("#{}{}", prefix, pointer);
                    }
                    return;
                }
            }
            for child in map.values_mut() {
                nest_local_references(child, prefix);
            }
        }
        Value::Array(items) => {
            for item in items {
                nest_local_references(item, prefix);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn format_from_extension() {
        assert_eq!(OutputFormat::from_path(Path::new("out.yaml")), OutputFormat::Yaml);
        assert_eq!(OutputFormat::from_path(Path::new("out.YML")), OutputFormat::Yaml);
        assert_eq!(OutputFormat::from_path(Path::new("out.json")), OutputFormat::Json);
        assert_eq!(OutputFormat::from_path(Path::new("out")), OutputFormat::Json);
    }

    #[test]
    fn json_output_preserves_order_and_scalars() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        let tree = json!({ "z": 1, "a": 2.5, "t": true, "n": null });

        write_tree(&path, &tree).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("}\n"));
        assert!(text.find("\"z\"").unwrap() < text.find("\"a\"").unwrap());
        let read: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(read, tree);
    }

    #[test]
    fn yaml_output_is_readable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.yaml");
        let tree = json!({ "openapi": "3.0.0", "count": 3, "ratio": 0.5, "ok": false });

        write_tree(&path, &tree).unwrap();
        let read: Value = serde_yaml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(read, tree);
    }

    #[test]
    fn existing_file_is_overwritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        fs::write(&path, "old contents that are much longer than the new ones").unwrap();

        write_tree(&path, &json!(1)).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "1\n");
    }

    #[test]
    fn unwritable_path_is_write_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("out.json");
        let err = write_tree(&path, &json!({})).unwrap_err();
        assert!(matches!(err, SpecError::Write { .. }));
    }

    #[test]
    fn local_references_are_nested_under_prefix() {
        let mut tree = json!({
            "a": { "$ref": "#" },
            "b": [{ "$ref": "#/a" }],
            "c": { "$ref": "other.yaml#/x" },
            "d": { "$ref": "#/a", "description": "not a reference" }
        });
        nest_local_references(&mut tree, "/api.yaml");
        assert_eq!(
            tree,
            json!({
                "a": { "$ref": "#/api.yaml" },
                "b": [{ "$ref": "#/api.yaml/a" }],
                "c": { "$ref": "other.yaml#/x" },
                "d": { "$ref": "#/a", "description": "not a reference" }
            })
        );
    }
}
