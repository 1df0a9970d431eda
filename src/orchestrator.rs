//! Batch processing behind the `validate` and `compile` commands.

use std::fmt;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::error::{ErrorKind, SpecError};
use crate::location::Location;
use crate::parser::{parse, ParsedSpec};
use crate::reference::format_pointer;
use crate::types::{BatchPolicy, ParserConfig};
use crate::validator::BackendRegistry;
use crate::writer::{nest_local_references, write_tree};

/// Destination of user-facing progress and diagnostics.
///
/// Output is best-effort: a closed pipe does not change the outcome.
pub struct Console<'a> {
    out: &'a mut dyn Write,
    err: &'a mut dyn Write,
}

impl<'a> Console<'a> {
    pub fn new(out: &'a mut dyn Write, err: &'a mut dyn Write) -> Self {
        Self { out, err }
    }

    fn say(&mut self, line: impl fmt::Display) {
        let _ = writeln!(self.out, "{}", line);
    }

    fn warn(&mut self, line: impl fmt::Display) {
        let _ = writeln!(self.err, "{}", line);
    }
}

/// A document that failed, as reported to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub input: String,
    #[serde(serialize_with = "serialize_kind")]
    pub kind: ErrorKind,
    pub message: String,
}

fn serialize_kind<S: serde::Serializer>(kind: &ErrorKind, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(kind)
}

/// Summary of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub processed: usize,
    pub succeeded: usize,
    pub failures: Vec<Failure>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// `0` if every processed document succeeded, `1` otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

/// Runs the parser over a list of inputs and reports each result.
#[derive(Debug)]
pub struct Orchestrator {
    config: ParserConfig,
    registry: BackendRegistry,
    policy: BatchPolicy,
}

impl Orchestrator {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            registry: BackendRegistry::builtin(),
            policy: BatchPolicy::default(),
        }
    }

    pub fn with_registry(mut self, registry: BackendRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn policy(mut self, policy: BatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Reject configurations that cannot work for any document.
    pub fn check(&self) -> Result<(), SpecError> {
        self.registry.require(&self.config.backend).map(|_| ())
    }

    /// Validate each input in order.
    ///
    /// With `output_file`, exactly one input is allowed and its tree is
    /// written once it validates.
    ///
    /// # Errors
    ///
    /// Returns `SpecError::Usage` before touching any document when the
    /// arguments are inconsistent. Document failures are reported on the
    /// console and collected in the outcome instead.
    pub fn validate(
        &self,
        inputs: &[String],
        output_file: Option<&Path>,
        console: &mut Console<'_>,
    ) -> Result<BatchOutcome, SpecError> {
        if output_file.is_some() {
            console.warn(
                "The --output-file parameter is deprecated; use the \"compile\" command instead.",
            );
            if inputs.len() > 1 {
                return Err(SpecError::usage(
                    "If --output-file is given, only one input URL is allowed!",
                ));
            }
        }
        self.check()?;

        let (mut outcome, trees) = self.run(inputs, console);

        if let Some(path) = output_file {
            if let (true, Some((_, tree))) = (outcome.is_success(), trees.first()) {
                self.write(path, tree, &mut outcome, console);
            }
        }
        Ok(outcome)
    }

    /// Validate every input and write them all to `output_file`.
    ///
    /// Nothing is written unless every document succeeded. A single input
    /// writes its tree; several inputs write a mapping from each input to
    /// its tree, with local `$ref`s moved under the input's key.
    ///
    /// # Errors
    ///
    /// Returns `SpecError::Usage` without inputs or for an unknown backend.
    pub fn compile(
        &self,
        inputs: &[String],
        output_file: &Path,
        console: &mut Console<'_>,
    ) -> Result<BatchOutcome, SpecError> {
        if inputs.is_empty() {
            return Err(SpecError::usage(
                "compile needs at least one input URL before the output file",
            ));
        }
        self.check()?;

        let (mut outcome, trees) = self.run(inputs, console);
        if !outcome.is_success() {
            info!(output = %output_file.display(), "not writing output after failures");
            return Ok(outcome);
        }

        let combined = if trees.len() == 1 {
            trees.into_iter().map(|(_, tree)| tree).next().unwrap_or(Value::Null)
        } else {
            let mut combined = Map::new();
            for (input, mut tree) in trees {
                nest_local_references(&mut tree, &format_pointer(std::slice::from_ref(&input)));
                combined.insert(input, tree);
            }
            Value::Object(combined)
        };
        self.write(output_file, &combined, &mut outcome, console);
        Ok(outcome)
    }

    fn run(&self, inputs: &[String], console: &mut Console<'_>) -> (BatchOutcome, Vec<(String, Value)>) {
        let mut outcome = BatchOutcome::default();
        let mut trees = Vec::with_capacity(inputs.len());

        for input in inputs {
            outcome.processed += 1;
            match self.process(input, console) {
                Ok(parsed) => {
                    console.say(format_args!("Validates OK as {}!", parsed.version));
                    info!(input = %input, version = %parsed.version, "document is valid");
                    outcome.succeeded += 1;
                    trees.push((input.clone(), parsed.spec));
                }
                Err(err) => {
                    let failure = Failure {
                        input: input.clone(),
                        kind: err.kind(),
                        message: describe(&err),
                    };
                    console.warn(format_args!(
                        "ERROR in \"{}\" [{}]: {}",
                        failure.input, failure.kind, failure.message
                    ));
                    info!(input = %input, kind = %failure.kind, "document failed");
                    outcome.failures.push(failure);
                    if self.policy == BatchPolicy::FailFast {
                        break;
                    }
                }
            }
        }
        (outcome, trees)
    }

    fn process(&self, input: &str, console: &mut Console<'_>) -> Result<ParsedSpec, SpecError> {
        console.say(format_args!("Processing \"{}\"...", input));
        if self.config.resolve {
            console.say(" -> Resolving external references.");
        } else {
            console.say(" -> Not resolving external references.");
        }

        let location = Location::from_input(input)?;
        parse(&location, &self.config, &self.registry)
    }

    fn write(&self, path: &Path, tree: &Value, outcome: &mut BatchOutcome, console: &mut Console<'_>) {
        match write_tree(path, tree) {
            Ok(()) => info!(output = %path.display(), "output written"),
            Err(err) => {
                let failure = Failure {
                    input: path.display().to_string(),
                    kind: err.kind(),
                    message: err.to_string(),
                };
                console.warn(format_args!("ERROR [{}]: {}", failure.kind, failure.message));
                outcome.failures.push(failure);
            }
        }
    }
}

/// One-line description of an error, including the failure that stopped
/// a reference from loading.
fn describe(err: &SpecError) -> String {
    match err {
        SpecError::Resolution {
            source: Some(inner),
            ..
        } => format!("{}: {}", err, inner),
        _ => err.to_string(),
    }
}
