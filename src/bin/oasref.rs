//! oasref CLI
//!
//! Command-line interface for resolving and validating OpenAPI documents.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use oasref::{
    default_backend, BackendRegistry, BatchOutcome, BatchPolicy, Console, Orchestrator,
    ParserConfig, SpecError, DEFAULT_TIMEOUT,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "oasref")]
#[command(about = "Resolve $ref pointers in OpenAPI/Swagger documents and validate them")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the given documents
    Validate {
        #[command(flatten)]
        parser: ParserArgs,

        /// Process every input even after a failure
        #[arg(long)]
        keep_going: bool,

        /// Write the validated tree to this file (deprecated; use compile)
        #[arg(long, short)]
        output_file: Option<PathBuf>,

        /// Documents to validate: file paths or URLs
        #[arg(required = true, value_name = "URL")]
        urls: Vec<String>,
    },

    /// Validate the given documents and write them to OUTPUT_FILE
    Compile {
        #[command(flatten)]
        parser: ParserArgs,

        /// Process every input even after a failure
        #[arg(long)]
        keep_going: bool,

        /// Input documents followed by the output file
        #[arg(required = true, num_args = 1.., value_name = "URL... OUTPUT_FILE")]
        paths: Vec<String>,
    },

    /// List the available validation backends
    Backends,
}

#[derive(Args)]
struct ParserArgs {
    /// Resolve $ref pointers before validating (default)
    #[arg(long, overrides_with = "no_resolve")]
    resolve: bool,

    /// Validate the document as written, without resolving references
    #[arg(long, overrides_with = "resolve")]
    no_resolve: bool,

    /// Expand references only when the validator reaches them
    #[arg(long)]
    lazy: bool,

    /// Validation backend
    #[arg(long, default_value = default_backend())]
    backend: String,

    /// Reject non-string mapping keys (default)
    #[arg(long, overrides_with = "no_strict")]
    strict: bool,

    /// Stringify non-string mapping keys instead of rejecting them
    #[arg(long, overrides_with = "strict")]
    no_strict: bool,

    /// Timeout for each remote fetch, in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs(), value_name = "SECS")]
    timeout: u64,
}

impl ParserArgs {
    fn config(&self) -> ParserConfig {
        ParserConfig::new(self.backend.clone())
            .resolve(self.resolve || !self.no_resolve)
            .lazy(self.lazy)
            .strict(self.strict || !self.no_strict)
            .timeout(Duration::from_secs(self.timeout))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Validate {
            parser,
            keep_going,
            output_file,
            urls,
        } => run_validate(&parser, keep_going, output_file, &urls),

        Commands::Compile {
            parser,
            keep_going,
            paths,
        } => run_compile(&parser, keep_going, paths),

        Commands::Backends => {
            run_backends();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run_validate(
    parser: &ParserArgs,
    keep_going: bool,
    output_file: Option<PathBuf>,
    urls: &[String],
) -> Result<(), u8> {
    let orchestrator =
        Orchestrator::new(parser.config()).policy(BatchPolicy::from_keep_going_flag(keep_going));

    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    let mut console = Console::new(&mut stdout, &mut stderr);
    let outcome = orchestrator
        .validate(urls, output_file.as_deref(), &mut console)
        .map_err(report_error)?;
    finish(&outcome)
}

fn run_compile(parser: &ParserArgs, keep_going: bool, mut paths: Vec<String>) -> Result<(), u8> {
    let Some(output_file) = paths.pop().map(PathBuf::from) else {
        return Err(report_error(SpecError::Usage {
            message: "missing OUTPUT_FILE".to_string(),
        }));
    };
    let orchestrator =
        Orchestrator::new(parser.config()).policy(BatchPolicy::from_keep_going_flag(keep_going));

    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    let mut console = Console::new(&mut stdout, &mut stderr);
    let outcome = orchestrator
        .compile(&paths, &output_file, &mut console)
        .map_err(report_error)?;
    finish(&outcome)
}

fn run_backends() {
    let registry = BackendRegistry::builtin();
    for backend in registry.iter() {
        let marker = if backend.name() == default_backend() {
            " (default)"
        } else {
            ""
        };
        println!("{}{}: {}", backend.name(), marker, backend.description());
    }
}

fn finish(outcome: &BatchOutcome) -> Result<(), u8> {
    match outcome.exit_code() {
        0 => Ok(()),
        code => Err(code),
    }
}

fn report_error(err: SpecError) -> u8 {
    eprintln!("Error: {}", err);
    err.exit_code()
}
