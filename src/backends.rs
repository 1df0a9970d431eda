//! Built-in validation backends.
//!
//! - `structural`: hand-written structural rules (default)
//! - `jsonschema`: embedded JSON Schemas checked with the `jsonschema` crate
//! - `minimal`: version detection and the bare document shape

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::document::{escape_segment, SpecVersion};
use crate::error::FindingKind;
use crate::reference::REF_KEY;
use crate::validator::{Backend, Finding};

const SWAGGER_2_0_SCHEMA: &str = include_str!("schemas/swagger-2.0.json");
const OPENAPI_3_0_SCHEMA: &str = include_str!("schemas/openapi-3.0.json");
const OPENAPI_3_1_SCHEMA: &str = include_str!("schemas/openapi-3.1.json");

const SWAGGER_METHODS: &[&str] = &["get", "put", "post", "delete", "options", "head", "patch"];
const OPENAPI_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

fn supports_known_versions(version: &SpecVersion) -> bool {
    version.is_swagger_2() || version.is_openapi(3, 0) || version.is_openapi(3, 1)
}

/// Structural rules written against the Swagger 2.0 and OpenAPI 3.x object
/// models.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralBackend;

impl Backend for StructuralBackend {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn description(&self) -> &'static str {
        "built-in structural rules for Swagger 2.0 and OpenAPI 3.0/3.1"
    }

    fn supports(&self, version: &SpecVersion) -> bool {
        supports_known_versions(version)
    }

    fn check(&self, spec: &Value, version: &SpecVersion) -> Vec<Finding> {
        let mut checker = StructuralChecker {
            version,
            findings: Vec::new(),
            operation_ids: HashMap::new(),
        };
        checker.check_root(spec);
        checker.findings
    }
}

struct StructuralChecker<'a> {
    version: &'a SpecVersion,
    findings: Vec<Finding>,
    /// operationId -> pointer of the operation declaring it
    operation_ids: HashMap<String, String>,
}

impl StructuralChecker<'_> {
    fn report(&mut self, kind: FindingKind, pointer: &str, message: impl Into<String>) {
        self.findings.push(Finding::new(kind, pointer, message));
    }

    fn methods(&self) -> &'static [&'static str] {
        if self.version.is_swagger_2() {
            SWAGGER_METHODS
        } else {
            OPENAPI_METHODS
        }
    }

    fn check_root(&mut self, spec: &Value) {
        let Value::Object(root) = spec else {
            self.report(FindingKind::InvalidType, "", "document root must be a mapping");
            return;
        };

        self.check_info(root);

        let is_31 = self.version.is_openapi(3, 1);
        match root.get("paths") {
            Some(paths) => self.check_paths(paths),
            None if is_31 => {
                if !root.contains_key("components") && !root.contains_key("webhooks") {
                    self.report(
                        FindingKind::MissingField,
                        "",
                        "one of 'paths', 'components' or 'webhooks' is required",
                    );
                }
            }
            None => self.report(
                FindingKind::MissingField,
                "",
                "missing required field 'paths'",
            ),
        }

        if is_31 {
            if let Some(webhooks) = root.get("webhooks") {
                match webhooks {
                    Value::Object(hooks) => {
                        for (name, item) in hooks {
                            let pointer = format!("/webhooks/{}", escape_segment(name));
                            self.check_path_item(None, item, &pointer);
                        }
                    }
                    _ => self.report(
                        FindingKind::InvalidType,
                        "/webhooks",
                        "'webhooks' must be a mapping",
                    ),
                }
            }
        }
    }

    fn check_info(&mut self, root: &Map<String, Value>) {
        match root.get("info") {
            None => self.report(FindingKind::MissingField, "", "missing required field 'info'"),
            Some(Value::Object(info)) => {
                for field in ["title", "version"] {
                    match info.get(field) {
                        None => self.report(
                            FindingKind::MissingField,
                            "/info",
                            format!("missing required field '{}'", field),
                        ),
                        Some(Value::String(_)) => {}
                        Some(_) => self.report(
                            FindingKind::InvalidType,
                            &format!("/info/{}", field),
                            format!("'{}' must be a string", field),
                        ),
                    }
                }
            }
            Some(_) => self.report(FindingKind::InvalidType, "/info", "'info' must be a mapping"),
        }
    }

    fn check_paths(&mut self, paths: &Value) {
        let Value::Object(paths) = paths else {
            self.report(FindingKind::InvalidType, "/paths", "'paths' must be a mapping");
            return;
        };

        for (path, item) in paths {
            if path.starts_with("x-") {
                continue;
            }
            let pointer = format!("/paths/{}", escape_segment(path));
            if !path.starts_with('/') {
                self.report(
                    FindingKind::InvalidValue,
                    &pointer,
                    format!("path '{}' must start with '/'", path),
                );
                continue;
            }
            self.check_path_item(Some(path), item, &pointer);
        }
    }

    fn check_path_item(&mut self, path: Option<&str>, item: &Value, pointer: &str) {
        let Value::Object(item) = item else {
            self.report(FindingKind::InvalidType, pointer, "path item must be a mapping");
            return;
        };

        let shared_parameters = self.parameters(item, pointer);

        for method in self.methods() {
            let Some(operation) = item.get(*method) else {
                continue;
            };
            let op_pointer = format!("{}/{}", pointer, method);
            let Value::Object(operation) = operation else {
                self.report(FindingKind::InvalidType, &op_pointer, "operation must be a mapping");
                continue;
            };

            self.check_operation(operation, &op_pointer);

            if let Some(path) = path {
                let mut parameters = shared_parameters.clone();
                parameters.extend(self.parameters(operation, &op_pointer));
                self.check_path_parameters(path, &parameters, &op_pointer);
            }
        }
    }

    /// The `parameters` list of a path item or operation.
    fn parameters<'v>(&mut self, owner: &'v Map<String, Value>, pointer: &str) -> Vec<&'v Value> {
        match owner.get("parameters") {
            None => Vec::new(),
            Some(Value::Array(items)) => items.iter().collect(),
            Some(_) => {
                self.report(
                    FindingKind::InvalidType,
                    &format!("{}/parameters", pointer),
                    "'parameters' must be a sequence",
                );
                Vec::new()
            }
        }
    }

    fn check_operation(&mut self, operation: &Map<String, Value>, pointer: &str) {
        match operation.get("responses") {
            None if self.version.is_openapi(3, 1) => {}
            None => self.report(
                FindingKind::MissingField,
                pointer,
                "missing required field 'responses'",
            ),
            Some(Value::Object(responses)) => {
                if responses.is_empty() {
                    self.report(
                        FindingKind::InvalidValue,
                        &format!("{}/responses", pointer),
                        "'responses' must declare at least one response",
                    );
                }
                for code in responses.keys() {
                    if !self.is_response_key(code) {
                        self.report(
                            FindingKind::InvalidValue,
                            &format!("{}/responses/{}", pointer, escape_segment(code)),
                            format!("invalid response code '{}'", code),
                        );
                    }
                }
            }
            Some(_) => self.report(
                FindingKind::InvalidType,
                &format!("{}/responses", pointer),
                "'responses' must be a mapping",
            ),
        }

        if let Some(Value::String(id)) = operation.get("operationId") {
            match self.operation_ids.get(id) {
                Some(first) => {
                    let message = format!("operationId '{}' is already used at {}", id, first);
                    self.report(
                        FindingKind::Duplicate,
                        &format!("{}/operationId", pointer),
                        message,
                    );
                }
                None => {
                    self.operation_ids.insert(id.clone(), pointer.to_string());
                }
            }
        }
    }

    fn is_response_key(&self, key: &str) -> bool {
        if key == "default" || key.starts_with("x-") {
            return true;
        }
        let bytes = key.as_bytes();
        if bytes.len() != 3 {
            return false;
        }
        if bytes.iter().all(u8::is_ascii_digit) {
            return true;
        }
        // OpenAPI 3.x allows ranges such as 4XX.
        !self.version.is_swagger_2() && (b'1'..=b'5').contains(&bytes[0]) && &key[1..] == "XX"
    }

    fn check_path_parameters(&mut self, path: &str, parameters: &[&Value], pointer: &str) {
        // Unresolved parameter references cannot be inspected.
        if parameters
            .iter()
            .any(|p| p.get(REF_KEY).is_some())
        {
            return;
        }

        for name in path_templates(path) {
            let declared = parameters.iter().any(|p| {
                p.get("in").and_then(Value::as_str) == Some("path")
                    && p.get("name").and_then(Value::as_str) == Some(name)
            });
            if !declared {
                self.report(
                    FindingKind::MissingField,
                    pointer,
                    format!("path parameter '{}' is not declared", name),
                );
            }
        }
    }
}

/// Names of the `{templated}` segments of a path.
fn path_templates(path: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = path;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            break;
        };
        names.push(&after[..end]);
        rest = &after[end + 1..];
    }
    names
}

/// Validates against embedded JSON Schemas of each document format.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaBackend;

impl JsonSchemaBackend {
    fn schema_for(version: &SpecVersion) -> Option<&'static str> {
        if version.is_swagger_2() {
            Some(SWAGGER_2_0_SCHEMA)
        } else if version.is_openapi(3, 0) {
            Some(OPENAPI_3_0_SCHEMA)
        } else if version.is_openapi(3, 1) {
            Some(OPENAPI_3_1_SCHEMA)
        } else {
            None
        }
    }
}

impl Backend for JsonSchemaBackend {
    fn name(&self) -> &'static str {
        "jsonschema"
    }

    fn description(&self) -> &'static str {
        "JSON Schema validation of Swagger 2.0 and OpenAPI 3.0/3.1 documents"
    }

    fn supports(&self, version: &SpecVersion) -> bool {
        Self::schema_for(version).is_some()
    }

    fn check(&self, spec: &Value, version: &SpecVersion) -> Vec<Finding> {
        let Some(source) = Self::schema_for(version) else {
            return vec![Finding::new(
                FindingKind::UnsupportedVersion,
                "",
                format!("no schema for {}", version),
            )];
        };

        let schema: Value = match serde_json::from_str(source) {
            Ok(schema) => schema,
            Err(e) => {
                return vec![Finding::new(
                    FindingKind::BackendFailure,
                    "",
                    format!("embedded schema is invalid: {}", e),
                )]
            }
        };

        let validator = match jsonschema::validator_for(&schema) {
            Ok(validator) => validator,
            Err(e) => {
                return vec![Finding::new(
                    FindingKind::BackendFailure,
                    "",
                    format!("cannot compile schema: {}", e),
                )]
            }
        };

        validator
            .iter_errors(spec)
            .map(|e| Finding::new(FindingKind::Schema, e.instance_path.to_string(), e.to_string()))
            .collect()
    }
}

/// Accepts any document with a recognized version, a mapping root and an
/// `info` section.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinimalBackend;

impl Backend for MinimalBackend {
    fn name(&self) -> &'static str {
        "minimal"
    }

    fn description(&self) -> &'static str {
        "version detection and document shape only"
    }

    fn supports(&self, _version: &SpecVersion) -> bool {
        true
    }

    fn check(&self, spec: &Value, _version: &SpecVersion) -> Vec<Finding> {
        match spec.get("info") {
            Some(Value::Object(_)) => Vec::new(),
            Some(_) => vec![Finding::new(
                FindingKind::InvalidType,
                "/info",
                "'info' must be a mapping",
            )],
            None => vec![Finding::new(
                FindingKind::MissingField,
                "",
                "missing required field 'info'",
            )],
        }
    }
}
