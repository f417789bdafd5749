//! Binary entry point for the polaris CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Annotate a file with its usages (JSON)
//! polaris --root ./demo --project demo annotate /src/App.java
//!
//! # Render the annotation as HTML
//! polaris annotate /src/App.java --format html
//!
//! # Expand the project tree along several paths
//! polaris tree /src/main/App.java /docs/ --format text
//!
//! # Autocomplete and search
//! polaris complete App
//! polaris search "new Foo" --limit 5
//!
//! # Outline a file, jump to a declaration
//! polaris outline /src/App.java
//! polaris goto method 42
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

use polaris::annotate::AnnotateOptions;
use polaris::cli::{
    run_annotate, run_complete, run_goto, run_outline, run_search, run_tree, CommandOutput,
};
use polaris::config::{CliOverrides, PolarisConfig};
use polaris::error::{OutputErrorCode, PolarisError};
use polaris::local::LocalProject;
use polaris::observer::RequestCounters;
use polaris::output::{emit_response, ErrorResponse};
use polaris::service::SourceSelector;
use polaris::types::{EntityId, EntityRef, FileId, UsageKind};

// ============================================================================
// CLI Structure
// ============================================================================

/// Browse cross-referenced source code.
#[derive(Parser, Debug)]
#[command(name = "polaris", version, about = "Browse cross-referenced source code")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Project root directory (default: from polaris.toml, else current directory).
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Project name used in file handles and links.
    #[arg(long, global = true)]
    project: Option<String>,

    /// Configuration file (default: ./polaris.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level for tracing output.
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Output format for annotate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum AnnotateFormat {
    /// Full JSON response (default).
    #[default]
    Json,
    /// HTML for a code column.
    Html,
}

/// Output format for tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum TreeFormat {
    /// Full JSON response (default).
    #[default]
    Json,
    /// Indented listing of visible rows.
    Text,
}

/// Kind of entity for goto.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum EntityKind {
    Type,
    Method,
    Field,
}

impl EntityKind {
    fn to_usage_kind(self) -> UsageKind {
        match self {
            EntityKind::Type => UsageKind::Type,
            EntityKind::Method => UsageKind::Method,
            EntityKind::Field => UsageKind::Variable,
        }
    }
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Annotate a file with its usages.
    Annotate {
        /// Project path of the file (starting with `/`).
        #[arg(required_unless_present = "id")]
        path: Option<String>,
        /// Address the file by id instead of path.
        #[arg(long, conflicts_with = "path")]
        id: Option<u64>,
        /// Output format.
        #[arg(long, value_enum, default_value = "json")]
        format: AnnotateFormat,
        /// Render usages of unknown kind as plain text instead of failing.
        #[arg(long)]
        demote_unknown: bool,
    },
    /// Expand the project tree along target paths.
    Tree {
        /// Target paths; a trailing `/` names a directory.
        #[arg(required = true)]
        targets: Vec<String>,
        /// Output format.
        #[arg(long, value_enum, default_value = "json")]
        format: TreeFormat,
    },
    /// Autocomplete file names.
    Complete {
        query: String,
        /// Maximum number of choices (default: complete_limit from config).
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Search file contents.
    Search {
        query: String,
        /// Maximum number of hits (default: search_limit from config).
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Outline the types declared in a file.
    Outline {
        /// Project path of the file (starting with `/`).
        #[arg(required_unless_present = "id")]
        path: Option<String>,
        /// Address the file by id instead of path.
        #[arg(long, conflicts_with = "path")]
        id: Option<u64>,
    },
    /// Show where a type, method or field is declared.
    Goto {
        #[arg(value_enum)]
        kind: EntityKind,
        id: i64,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.global.log_level);

    match execute(cli).await {
        Ok(output) => {
            let mut stdout = io::stdout();
            let _ = write!(stdout, "{}", output.body);
            if !output.body.ends_with('\n') {
                let _ = writeln!(stdout);
            }
            let _ = stdout.flush();
            match output.code {
                None => ExitCode::SUCCESS,
                Some(code) => ExitCode::from(code.code()),
            }
        }
        Err(err) => {
            let error_code = OutputErrorCode::from(&err);
            let response = ErrorResponse::from_error(&err);

            // Errors go to stdout as JSON, like every other response
            let _ = emit_response(&response, &mut io::stdout());
            let _ = io::stdout().flush();

            ExitCode::from(error_code.code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn load_config(global: &GlobalArgs) -> Result<PolarisConfig, PolarisError> {
    let cwd = std::env::current_dir()?;
    let config = PolarisConfig::discover(global.config.as_deref(), &cwd)?.apply(CliOverrides {
        project: global.project.clone(),
        root: global.root.clone(),
    });
    debug!(project = %config.project, root = %config.root.display(), "configuration loaded");
    Ok(config)
}

fn file_selector(
    config: &PolarisConfig,
    path: Option<String>,
    id: Option<u64>,
) -> Result<SourceSelector, PolarisError> {
    match (id, path) {
        (Some(id), _) => Ok(SourceSelector::ById(FileId(id))),
        (None, Some(path)) => Ok(SourceSelector::by_path(config.project.clone(), path)),
        (None, None) => Err(PolarisError::invalid_args("a path or --id is required")),
    }
}

/// Execute the CLI command.
async fn execute(cli: Cli) -> Result<CommandOutput, PolarisError> {
    let config = load_config(&cli.global)?;
    let backend = LocalProject::from_config(&config);
    let counters = Arc::new(RequestCounters::new());

    let output = match cli.command {
        Command::Annotate {
            path,
            id,
            format,
            demote_unknown,
        } => {
            let selector = file_selector(&config, path, id)?;
            let options = if demote_unknown {
                AnnotateOptions::demote_unknown()
            } else {
                AnnotateOptions::default()
            };
            let html = format == AnnotateFormat::Html;
            run_annotate(&backend, selector, options, html, counters.clone()).await?
        }
        Command::Tree { targets, format } => {
            let text = format == TreeFormat::Text;
            run_tree(&config.project, backend, &targets, text, counters.clone()).await?
        }
        Command::Complete { query, limit } => {
            let limit = limit.unwrap_or(config.complete_limit);
            run_complete(&backend, &query, limit, counters.clone()).await?
        }
        Command::Search { query, limit } => {
            let limit = limit.unwrap_or(config.search_limit);
            run_search(&backend, &query, limit).await?
        }
        Command::Outline { path, id } => {
            let selector = file_selector(&config, path, id)?;
            run_outline(&backend, selector).await?
        }
        Command::Goto { kind, id } => {
            let entity = EntityRef {
                kind: kind.to_usage_kind(),
                id: EntityId(id),
            };
            run_goto(&backend, entity).await?
        }
    };
    debug!(counters = ?counters.snapshot(), "request counters");
    Ok(output)
}
