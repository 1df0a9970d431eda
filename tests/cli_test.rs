//! CLI integration tests for the oasref binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("oasref"))
}

fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

const GOOD: &str = r##"swagger: "2.0"
info:
  title: Petstore
  version: "1.0.0"
paths:
  /pets/{petId}:
    get:
      operationId: showPet
      parameters:
        - $ref: "#/parameters/petId"
      responses:
        "200":
          description: a pet
          schema:
            $ref: "#/definitions/Pet"
parameters:
  petId:
    name: petId
    in: path
    required: true
    type: string
definitions:
  Pet:
    type: object
    properties:
      name:
        type: string
"##;

const MISSING_TITLE: &str = r#"swagger: "2.0"
info:
  version: "1.0.0"
paths: {}
"#;

const INTEGER_KEYS: &str = r#"swagger: "2.0"
info:
  title: Numbers
  version: "1.0.0"
paths:
  /pets:
    get:
      responses:
        200:
          description: ok
"#;

mod validate_command {
    use super::*;

    #[test]
    fn valid_document() {
        let dir = TempDir::new().unwrap();
        let good = write_temp_file(&dir, "good.yaml", GOOD);

        cmd()
            .args(["validate", good.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains(format!(
                "Processing \"{}\"...",
                good.display()
            )))
            .stdout(predicate::str::contains(" -> Resolving external references."))
            .stdout(predicate::str::contains("Validates OK as Swagger 2.0!"));
    }

    #[test]
    fn without_resolution() {
        let dir = TempDir::new().unwrap();
        let good = write_temp_file(&dir, "good.yaml", GOOD);

        cmd()
            .args(["validate", "--no-resolve", good.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains(" -> Not resolving external references."));
    }

    #[test]
    fn last_resolution_flag_wins() {
        let dir = TempDir::new().unwrap();
        let good = write_temp_file(&dir, "good.yaml", GOOD);

        cmd()
            .args(["validate", "--no-resolve", "--resolve", good.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains(" -> Resolving external references."));
    }

    #[test]
    fn lazy_resolution() {
        let dir = TempDir::new().unwrap();
        let good = write_temp_file(&dir, "good.yaml", GOOD);

        cmd()
            .args(["validate", "--lazy", good.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("Validates OK as Swagger 2.0!"));
    }

    #[test]
    fn each_backend_accepts_valid_document() {
        let dir = TempDir::new().unwrap();
        let good = write_temp_file(&dir, "good.yaml", GOOD);

        for backend in ["structural", "jsonschema", "minimal"] {
            cmd()
                .args(["validate", "--backend", backend, good.to_str().unwrap()])
                .assert()
                .success();
        }
    }

    #[test]
    fn invalid_document() {
        let dir = TempDir::new().unwrap();
        let bad = write_temp_file(&dir, "bad.yaml", MISSING_TITLE);

        cmd()
            .args(["validate", bad.to_str().unwrap()])
            .assert()
            .code(1)
            .stderr(predicate::str::contains(format!(
                "ERROR in \"{}\" [ValidationError]",
                bad.display()
            )))
            .stderr(predicate::str::contains("title"));
    }

    #[test]
    fn integer_keys_need_no_strict() {
        let dir = TempDir::new().unwrap();
        let spec = write_temp_file(&dir, "numbers.yaml", INTEGER_KEYS);

        cmd()
            .args(["validate", spec.to_str().unwrap()])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("[ParseError]"));

        cmd()
            .args(["validate", "--no-strict", spec.to_str().unwrap()])
            .assert()
            .success();
    }

    #[test]
    fn fail_fast_by_default() {
        let dir = TempDir::new().unwrap();
        let bad = write_temp_file(&dir, "bad.yaml", MISSING_TITLE);
        let good = write_temp_file(&dir, "good.yaml", GOOD);

        cmd()
            .args(["validate", bad.to_str().unwrap(), good.to_str().unwrap()])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("good.yaml").not());
    }

    #[test]
    fn keep_going_processes_every_input() {
        let dir = TempDir::new().unwrap();
        let bad = write_temp_file(&dir, "bad.yaml", MISSING_TITLE);
        let good = write_temp_file(&dir, "good.yaml", GOOD);

        cmd()
            .args([
                "validate",
                "--keep-going",
                bad.to_str().unwrap(),
                good.to_str().unwrap(),
            ])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("Validates OK as Swagger 2.0!"));
    }

    #[test]
    fn output_file_is_deprecated_but_written() {
        let dir = TempDir::new().unwrap();
        let good = write_temp_file(&dir, "good.yaml", GOOD);
        let out = dir.path().join("out.json");

        cmd()
            .args([
                "validate",
                "--output-file",
                out.to_str().unwrap(),
                good.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stderr(predicate::str::contains("deprecated"));

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(written["parameters"]["petId"]["in"], "path");
        assert_eq!(
            written["paths"]["/pets/{petId}"]["get"]["responses"]["200"]["schema"]["type"],
            "object"
        );
    }
}

mod error_handling {
    use super::*;

    #[test]
    fn missing_file_is_fetch_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.yaml");

        cmd()
            .args(["validate", missing.to_str().unwrap()])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("[FetchError]"));
    }

    #[test]
    fn unresolvable_reference() {
        let dir = TempDir::new().unwrap();
        let spec = write_temp_file(
            &dir,
            "dangling.yaml",
            "swagger: \"2.0\"\ninfo:\n  $ref: \"#/nowhere\"\npaths: {}\n",
        );

        cmd()
            .args(["validate", spec.to_str().unwrap()])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("[ResolutionError]"))
            .stderr(predicate::str::contains("#/nowhere"));
    }

    #[test]
    fn malformed_document_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let spec = write_temp_file(&dir, "broken.json", "{ \"swagger\": ");

        cmd()
            .args(["validate", spec.to_str().unwrap()])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("[ParseError]"));
    }

    #[test]
    fn output_file_with_several_inputs_is_usage_error() {
        let dir = TempDir::new().unwrap();
        let a = write_temp_file(&dir, "a.yaml", GOOD);
        let b = write_temp_file(&dir, "b.yaml", GOOD);

        cmd()
            .args([
                "validate",
                "--output-file",
                "out.json",
                a.to_str().unwrap(),
                b.to_str().unwrap(),
            ])
            .assert()
            .code(2)
            .stdout(predicate::str::contains("Processing").not())
            .stderr(predicate::str::contains("only one input URL"));
    }

    #[test]
    fn unknown_backend_is_usage_error() {
        let dir = TempDir::new().unwrap();
        let good = write_temp_file(&dir, "good.yaml", GOOD);

        cmd()
            .args(["validate", "--backend", "flex", good.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("unknown backend"))
            .stdout(predicate::str::is_empty());
    }

    #[test]
    fn validate_requires_an_input() {
        cmd().arg("validate").assert().code(2);
    }
}

mod compile_command {
    use super::*;

    #[test]
    fn writes_single_tree_as_yaml() {
        let dir = TempDir::new().unwrap();
        let good = write_temp_file(&dir, "good.yaml", GOOD);
        let out = dir.path().join("out.yaml");

        cmd()
            .args(["compile", good.to_str().unwrap(), out.to_str().unwrap()])
            .assert()
            .success();

        let written: serde_json::Value =
            serde_yaml::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(written["swagger"], "2.0");
        assert_eq!(
            written["paths"]["/pets/{petId}"]["get"]["parameters"][0]["name"],
            "petId"
        );
    }

    #[test]
    fn writes_mapping_for_several_inputs() {
        let dir = TempDir::new().unwrap();
        let first = write_temp_file(&dir, "first.yaml", GOOD);
        let second = write_temp_file(&dir, "second.yaml", GOOD);
        let out = dir.path().join("out.json");

        cmd()
            .args([
                "compile",
                first.to_str().unwrap(),
                second.to_str().unwrap(),
                out.to_str().unwrap(),
            ])
            .assert()
            .success();

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        let object = written.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert!(object.contains_key(first.to_str().unwrap()));
        assert!(object.contains_key(second.to_str().unwrap()));
    }

    #[test]
    fn failure_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let good = write_temp_file(&dir, "a.yaml", GOOD);
        let bad = write_temp_file(&dir, "b.yaml", MISSING_TITLE);
        let out = dir.path().join("out.json");

        cmd()
            .args([
                "compile",
                good.to_str().unwrap(),
                bad.to_str().unwrap(),
                out.to_str().unwrap(),
            ])
            .assert()
            .code(1);

        assert!(!out.exists());
    }

    #[test]
    fn output_file_alone_is_usage_error() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out.json");

        cmd()
            .args(["compile", out.to_str().unwrap()])
            .assert()
            .code(2);
        assert!(!out.exists());
    }
}

mod backends_command {
    use super::*;

    #[test]
    fn lists_builtin_backends() {
        cmd()
            .arg("backends")
            .assert()
            .success()
            .stdout(predicate::str::contains("structural (default)"))
            .stdout(predicate::str::contains("jsonschema"))
            .stdout(predicate::str::contains("minimal"));
    }
}

mod help_and_version {
    use super::*;

    #[test]
    fn help_flag() {
        cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Resolve $ref pointers"));
    }

    #[test]
    fn version_flag() {
        cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("oasref"));
    }

    #[test]
    fn validate_help() {
        cmd()
            .args(["validate", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--no-resolve"))
            .stdout(predicate::str::contains("--backend"))
            .stdout(predicate::str::contains("--keep-going"));
    }

    #[test]
    fn timeout_default_is_shown() {
        cmd()
            .args(["validate", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--timeout <SECS>"))
            .stdout(predicate::str::contains("[default: 10]"));
    }
}

#[cfg(feature = "remote")]
mod remote {
    use super::*;
    use std::io::Write;

    #[test]
    fn validate_from_url() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/api.yaml")
            .with_status(200)
            .with_header("content-type", "application/yaml")
            .with_body(GOOD)
            .create();
        let url = format!("{}/api.yaml", server.url());

        cmd()
            .args(["validate", &url])
            .assert()
            .success()
            .stdout(predicate::str::contains("Validates OK as Swagger 2.0!"));
        mock.assert();
    }

    #[test]
    fn url_404_is_fetch_error() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", "/missing.yaml").with_status(404).create();
        let url = format!("{}/missing.yaml", server.url());

        cmd()
            .args(["validate", &url])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("[FetchError]"));
    }

    #[test]
    fn timeout_flag_bounds_remote_fetch() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/slow.yaml")
            .with_status(200)
            .with_chunked_body(|w| {
                std::thread::sleep(std::time::Duration::from_secs(3));
                w.write_all(GOOD.as_bytes())
            })
            .create();
        let url = format!("{}/slow.yaml", server.url());

        cmd()
            .args(["validate", "--timeout", "1", &url])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("[FetchError]"));
    }

    #[test]
    fn non_numeric_timeout_is_usage_error() {
        cmd()
            .args(["validate", "--timeout", "soon", "api.yaml"])
            .assert()
            .code(2);
    }

    #[test]
    fn relative_reference_on_remote_document() {
        let mut server = mockito::Server::new();
        let _root = server
            .mock("GET", "/specs/api.yaml")
            .with_status(200)
            .with_body(
                "openapi: 3.0.0\ninfo:\n  $ref: common/info.yaml\npaths: {}\n",
            )
            .create();
        let info = server
            .mock("GET", "/specs/common/info.yaml")
            .with_status(200)
            .with_body("title: Remote\nversion: \"2\"\n")
            .expect(1)
            .create();
        let url = format!("{}/specs/api.yaml", server.url());

        cmd()
            .args(["validate", &url])
            .assert()
            .success()
            .stdout(predicate::str::contains("Validates OK as OpenAPI 3.0.0!"));
        info.assert();
    }
}
