//! Template Guardian CLI - Command-line interface for template completeness checks
//!
//! CDD Principle: Application Layer - CLI coordinates user interactions with domain services
//! - Translates user commands to domain operations
//! - Handles external concerns like configuration discovery, terminal output and exit codes
//! - Watch mode re-validates documents as they change on disk

use clap::{Args, Parser, Subcommand, ValueEnum};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use template_guardian::config::DEFAULT_CONFIG_FILES;
use template_guardian::{
    AnalysisOptions, FindingKind, OutputFormat, ReportFormatter, ReportOptions, Severity,
    TemplateConfig, TemplateError, TemplateGuardian, TemplateResult,
};
use tokio::sync::mpsc;

/// Template Guardian - Template completeness validation
#[derive(Parser)]
#[command(name = "template-guardian")]
#[command(version)]
#[command(about = "Checks Markdown guideline documents for missing sections and unreplaced placeholders")]
#[command(long_about = "Template Guardian validates Markdown documents against section schemas. It reports required sections that are missing, template placeholders such as [Project Name] that were never replaced, and sections that appear out of order.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check documents against their schemas
    Check(CheckArgs),

    /// Watch for document changes and re-run checks
    Watch {
        /// Path to watch (defaults to current directory)
        path: Option<PathBuf>,

        /// File patterns that trigger a check (glob patterns)
        #[arg(short, long, action = clap::ArgAction::Append)]
        pattern: Vec<String>,

        /// Debounce delay in milliseconds
        #[arg(long, default_value = "500")]
        delay: u64,
    },

    /// Validate a configuration file
    ValidateConfig {
        /// Configuration file to validate
        config_file: Option<PathBuf>,
    },

    /// List schemas, or show the rules of one schema
    Schemas {
        /// Schema to show
        #[arg(long)]
        id: Option<String>,
    },

    /// Explain what a finding kind means
    Explain {
        /// Finding kind, e.g. missing_section
        kind: String,
    },
}

#[derive(Args, Clone)]
struct CheckArgs {
    /// Paths to check (files or directories)
    paths: Vec<PathBuf>,

    /// Validate every document against this schema instead of using bindings
    #[arg(long)]
    schema: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormatArg,

    /// Minimum severity level to report
    #[arg(short, long, value_enum)]
    severity: Option<SeverityArg>,

    /// Maximum number of findings to report
    #[arg(long)]
    max_findings: Option<usize>,

    /// Additional exclude patterns
    #[arg(long, action = clap::ArgAction::Append)]
    exclude: Vec<String>,

    /// Ignore .templateignore files
    #[arg(long)]
    no_ignore: bool,

    /// Disable parallel processing
    #[arg(long)]
    no_parallel: bool,

    /// Stop at the first document that cannot be read
    #[arg(long)]
    fail_fast: bool,
}

#[derive(Copy, Clone, ValueEnum, PartialEq)]
enum OutputFormatArg {
    Text,
    Json,
    Github,
    Junit,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Text => OutputFormat::Text,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Github => OutputFormat::GitHub,
            OutputFormatArg::Junit => OutputFormat::Junit,
        }
    }
}

#[derive(Copy, Clone, ValueEnum)]
enum SeverityArg {
    Info,
    Warning,
    Error,
}

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Info => Severity::Info,
            SeverityArg::Warning => Severity::Warning,
            SeverityArg::Error => Severity::Error,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    match run_command(cli).await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

async fn run_command(cli: Cli) -> TemplateResult<i32> {
    let use_colors = !cli.no_color && std::io::stdout().is_terminal();

    match cli.command {
        Commands::Check(args) => run_check(cli.config, args, use_colors).await,
        Commands::Watch { path, pattern, delay } => {
            run_watch(cli.config, path, pattern, delay, use_colors).await
        }
        Commands::ValidateConfig { config_file } => run_validate_config(config_file.or(cli.config)),
        Commands::Schemas { id } => run_schemas(cli.config, id),
        Commands::Explain { kind } => run_explain(&kind),
    }
}

/// Explicit configuration file, else one discovered in the working directory, else defaults
fn load_config(config_path: Option<&Path>) -> TemplateResult<TemplateConfig> {
    if let Some(path) = config_path {
        return TemplateConfig::load_from_file(path);
    }
    Ok(TemplateConfig::discover(".")?
        .map(|(_, config)| config)
        .unwrap_or_default())
}

async fn run_check(
    config_path: Option<PathBuf>,
    args: CheckArgs,
    use_colors: bool,
) -> TemplateResult<i32> {
    let config = load_config(config_path.as_deref())?;

    let formatter = ReportFormatter::new(ReportOptions {
        use_colors,
        max_findings: args.max_findings,
        min_severity: args.severity.map(Severity::from),
    });
    let guardian = TemplateGuardian::new_with_config(config)?.with_report_formatter(formatter);

    let paths = if args.paths.is_empty() { vec![PathBuf::from(".")] } else { args.paths };

    let options = AnalysisOptions {
        parallel: !args.no_parallel,
        fail_fast: args.fail_fast,
        exclude_patterns: args.exclude,
        ignore_ignore_files: args.no_ignore,
        schema: args.schema,
        ..Default::default()
    };

    let batch = guardian.validate_paths(paths, &options).await?;

    let formatted = guardian.format_batch(&batch, args.format.into())?;
    print!("{formatted}");

    for document in &batch.unbound {
        tracing::debug!("No schema bound to {document}");
    }

    if batch.has_errors() || !batch.failures.is_empty() {
        Ok(1)
    } else {
        Ok(0)
    }
}

async fn run_watch(
    config_path: Option<PathBuf>,
    path: Option<PathBuf>,
    patterns: Vec<String>,
    delay_ms: u64,
    use_colors: bool,
) -> TemplateResult<i32> {
    let watch_path = path.unwrap_or_else(|| PathBuf::from("."));

    let patterns = if patterns.is_empty() { vec!["**/*.md".to_string()] } else { patterns };
    let watch_patterns = patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p)
                .map_err(|e| TemplateError::pattern(format!("Invalid watch pattern '{p}': {e}")))
        })
        .collect::<TemplateResult<Vec<_>>>()?;

    println!("Watching: {}", watch_path.display());
    println!("Patterns: {}", patterns.join(", "));
    println!("Debounce delay: {delay_ms}ms");
    println!("Press Ctrl+C to stop watching\n");

    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            // The receiver only goes away at shutdown
            let _ = tx.send(event);
        }
        Err(e) => tracing::warn!("Watch error: {e}"),
    })
    .map_err(|e| TemplateError::config(format!("Failed to create file watcher: {e}")))?;

    watcher.watch(&watch_path, RecursiveMode::Recursive).map_err(|e| {
        TemplateError::config(format!("Failed to watch path '{}': {}", watch_path.display(), e))
    })?;

    let mut config_path = config_path;
    run_watch_pass(config_path.as_deref(), &watch_path, use_colors).await;

    let debounce = Duration::from_millis(delay_ms);
    while let Some(event) = rx.recv().await {
        let mut reload = is_config_change(&event);
        let mut triggered = should_trigger_analysis(&event, &watch_patterns);

        // Collapse the burst of events a single save produces
        while let Ok(Some(next)) = tokio::time::timeout(debounce, rx.recv()).await {
            if let Some(changed) = is_config_change(&next) {
                reload = Some(changed);
            }
            triggered |= should_trigger_analysis(&next, &watch_patterns);
        }

        if let Some(changed) = reload {
            println!("Configuration changed: {}", changed.display());
            config_path = Some(changed);
        } else if !triggered {
            continue;
        }

        run_watch_pass(config_path.as_deref(), &watch_path, use_colors).await;
    }

    tracing::warn!("File watcher disconnected");
    Ok(0)
}

/// Whether a file system event touches a document matching the watch patterns
fn should_trigger_analysis(event: &Event, patterns: &[glob::Pattern]) -> bool {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)) {
        return false;
    }

    event.paths.iter().any(|path| {
        let path_str = path.to_string_lossy();
        patterns.iter().any(|pattern| pattern.matches(&path_str))
    })
}

/// Configuration file touched by an event, if any
fn is_config_change(event: &Event) -> Option<PathBuf> {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return None;
    }

    event
        .paths
        .iter()
        .find(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| DEFAULT_CONFIG_FILES.contains(&name))
        })
        .cloned()
}

/// One validation pass in watch mode; failures are printed, never fatal
async fn run_watch_pass(config_path: Option<&Path>, watch_path: &Path, use_colors: bool) {
    println!("[{}] Validating documents...", chrono::Local::now().format("%H:%M:%S"));

    let guardian = match load_config(config_path).and_then(TemplateGuardian::new_with_config) {
        Ok(guardian) => guardian.with_report_formatter(ReportFormatter::new(ReportOptions {
            use_colors,
            ..Default::default()
        })),
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return;
        }
    };

    let result = guardian.validate_paths(vec![watch_path], &AnalysisOptions::default()).await;
    match result.and_then(|batch| guardian.format_batch(&batch, OutputFormat::Text)) {
        Ok(formatted) => print!("{formatted}"),
        Err(e) => eprintln!("Validation failed: {e}"),
    }
    println!("Watching for changes... (Press Ctrl+C to stop)\n");
}

fn run_validate_config(config_path: Option<PathBuf>) -> TemplateResult<i32> {
    let config_path = config_path.unwrap_or_else(|| {
        DEFAULT_CONFIG_FILES
            .iter()
            .map(PathBuf::from)
            .find(|candidate| candidate.is_file())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]))
    });

    println!("Validating configuration: {}", config_path.display());

    match TemplateConfig::load_from_file(&config_path) {
        Ok(config) => {
            println!("Configuration is valid");
            println!("Configuration summary:");
            println!("  Schemas: {}", config.schemas.len());
            println!("  Document bindings: {}", config.documents.len());
            println!("  Path patterns: {}", config.paths.patterns.len());
            println!("  Fingerprint: {}", config.fingerprint());
            Ok(0)
        }
        Err(e) => {
            eprintln!("Configuration validation failed: {e}");
            Ok(1)
        }
    }
}

fn run_schemas(config_path: Option<PathBuf>, id: Option<String>) -> TemplateResult<i32> {
    let config = load_config(config_path.as_deref())?;
    let registry = config.build_registry()?;

    let Some(id) = id else {
        println!("Available schemas\n");
        for schema in registry.schemas() {
            let bound: Vec<&str> = config
                .documents
                .iter()
                .filter(|binding| binding.schema == schema.id())
                .map(|binding| binding.pattern.as_str())
                .collect();
            println!(
                "  {} - {} ({} sections)",
                schema.id(),
                schema.description().unwrap_or("no description"),
                schema.sections().len()
            );
            if !bound.is_empty() {
                println!("      bound to: {}", bound.join(", "));
            }
        }
        return Ok(0);
    };

    let schema = registry.lookup(&id)?;
    println!("Schema: {}", schema.id());
    if let Some(description) = schema.description() {
        println!("Description: {description}");
    }
    println!();

    for (index, rule) in schema.sections().iter().enumerate() {
        let status = if rule.is_required() { "required" } else { "optional" };
        println!("  {}. {} ({status})", index + 1, rule.heading());
        if let Some(pattern) = rule.heading_pattern() {
            println!("       heading pattern: {pattern}");
        }
        if let Some(min) = rule.min_body_length() {
            println!("       minimum content: {min} characters");
        }
        if !rule.placeholders().is_empty() {
            let tokens: Vec<String> = rule.placeholders().iter().map(|t| format!("[{t}]")).collect();
            println!("       placeholders: {}", tokens.join(", "));
        }
    }

    Ok(0)
}

fn run_explain(kind: &str) -> TemplateResult<i32> {
    let Some(kind) = FindingKind::parse(kind) else {
        eprintln!("Unknown finding kind '{kind}'");
        println!();
        println!("Available kinds:");
        for kind in FindingKind::ALL {
            println!("  - {kind}");
        }
        return Ok(1);
    };

    println!("Finding: {kind}");
    println!("Severity: {}", kind.severity().as_str());
    println!("Blocking: {}", if kind.severity().is_blocking() { "yes" } else { "no" });
    println!();
    println!("{}", kind.description());

    Ok(0)
}

fn init_logging(verbose: bool, json: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}
