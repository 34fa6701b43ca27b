mod config;
mod seed;
mod serve;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use logbook_engine::{digest_pin, digest_to_hex, BookProgress, CohortProgress, CountingMode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Clinical experience logbook: record lifecycle and progress.
#[derive(Parser)]
#[command(
    name = "logbook",
    version,
    about = "Experience logbook engine and HTTP API server"
)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to listen on (overrides config and LOGBOOK_PORT)
        #[arg(long)]
        port: Option<u16>,
        /// JSON seed document to load at startup
        #[arg(long)]
        seed: Option<PathBuf>,
        /// Requests per minute per client IP
        #[arg(long)]
        rate_limit: Option<u64>,
    },

    /// Report one student's progress in a book
    Progress {
        /// JSON seed document (defaults to the configured seed)
        #[arg(long)]
        seed: Option<PathBuf>,
        /// Book ID
        #[arg(long)]
        book: String,
        /// Student ID
        #[arg(long)]
        student: String,
        /// Counting mode: overall or by-subject
        #[arg(long, default_value = "overall")]
        mode: CountingMode,
    },

    /// Report completion counts across students of a book
    Cohort {
        /// JSON seed document (defaults to the configured seed)
        #[arg(long)]
        seed: Option<PathBuf>,
        /// Book ID
        #[arg(long)]
        book: String,
        /// Student IDs to include (repeatable). Default: every student with a record.
        #[arg(long = "student")]
        students: Vec<String>,
        /// Counting mode: overall or by-subject
        #[arg(long, default_value = "overall")]
        mode: CountingMode,
    },

    /// Print the SHA-256 digest of a PIN for seed credential entries
    HashPin {
        /// The approver PIN
        pin: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            report_error(&e.to_string(), cli.output, cli.quiet);
            process::exit(1);
        }
    };
    init_tracing(&config.log_level);

    if let Err(msg) = run(cli.command, &config, cli.output, cli.quiet) {
        report_error(&msg, cli.output, cli.quiet);
        process::exit(1);
    }
}

/// Install the `tracing` subscriber. `RUST_LOG` wins over the configured
/// level. Logs go to stderr so command output on stdout stays parseable.
fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(command: Commands, config: &Config, output: OutputFormat, quiet: bool) -> Result<(), String> {
    match command {
        Commands::Serve {
            port,
            seed,
            rate_limit,
        } => cmd_serve(config, port, seed, rate_limit),
        Commands::Progress {
            seed,
            book,
            student,
            mode,
        } => {
            let seed = resolve_seed(seed, config)?;
            cmd_progress(&seed, &book, &student, mode, output, quiet)
        }
        Commands::Cohort {
            seed,
            book,
            students,
            mode,
        } => {
            let seed = resolve_seed(seed, config)?;
            cmd_cohort(&seed, &book, &students, mode, output, quiet)
        }
        Commands::HashPin { pin } => {
            cmd_hash_pin(&pin, output);
            Ok(())
        }
    }
}

fn resolve_seed(flag: Option<PathBuf>, config: &Config) -> Result<PathBuf, String> {
    flag.or_else(|| config.server.seed.clone())
        .ok_or_else(|| "no seed document: pass --seed or set server.seed".to_string())
}

fn runtime() -> Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Runtime::new().map_err(|e| format!("failed to create tokio runtime: {}", e))
}

fn cmd_serve(
    config: &Config,
    port: Option<u16>,
    seed: Option<PathBuf>,
    rate_limit: Option<u64>,
) -> Result<(), String> {
    let seed = seed.or_else(|| config.server.seed.clone());
    let engine = seed::load_engine(seed.as_deref()).map_err(|e| e.to_string())?;
    if let Some(path) = &seed {
        tracing::info!(seed = %path.display(), "loaded seed document");
    }

    let settings = serve::ServeSettings {
        port: port.unwrap_or(config.server.port),
        rate_limit: rate_limit.unwrap_or(config.server.rate_limit),
        api_key: config.server.api_key.clone(),
        admin_api_key: config.server.admin_api_key.clone(),
    };
    runtime()?
        .block_on(serve::start_server(settings, engine))
        .map_err(|e| format!("server error: {}", e))
}

fn cmd_progress(
    seed: &Path,
    book: &str,
    student: &str,
    mode: CountingMode,
    output: OutputFormat,
    quiet: bool,
) -> Result<(), String> {
    let engine = seed::SeedDocument::read(seed)
        .and_then(seed::SeedDocument::into_engine)
        .map_err(|e| e.to_string())?;
    let progress = runtime()?
        .block_on(engine.compute_progress(student, book, mode))
        .map_err(|e| e.to_string())?;

    match output {
        OutputFormat::Json => print_json(&progress)?,
        OutputFormat::Text => {
            if !quiet {
                print_progress(&progress);
            }
        }
    }
    Ok(())
}

fn cmd_cohort(
    seed: &Path,
    book: &str,
    students: &[String],
    mode: CountingMode,
    output: OutputFormat,
    quiet: bool,
) -> Result<(), String> {
    let engine = seed::SeedDocument::read(seed)
        .and_then(seed::SeedDocument::into_engine)
        .map_err(|e| e.to_string())?;
    let cohort = runtime()?
        .block_on(engine.compute_cohort_progress(students, book, mode))
        .map_err(|e| e.to_string())?;

    match output {
        OutputFormat::Json => print_json(&cohort)?,
        OutputFormat::Text => {
            if !quiet {
                print_cohort(&cohort);
            }
        }
    }
    Ok(())
}

fn cmd_hash_pin(pin: &str, output: OutputFormat) {
    let hex = digest_to_hex(&digest_pin(pin));
    match output {
        OutputFormat::Text => println!("{}", hex),
        OutputFormat::Json => println!("{}", serde_json::json!({ "pin_sha256": hex })),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let pretty = serde_json::to_string_pretty(value)
        .map_err(|e| format!("failed to serialize output: {}", e))?;
    println!("{}", pretty);
    Ok(())
}

fn ratio(done: u64, required: u64, percent: u32) -> String {
    format!("{:>3}% ({}/{})", percent, done, required)
}

fn print_progress(p: &BookProgress) {
    println!(
        "{} / {} [{}]: {}",
        p.book_id,
        p.student_id,
        p.mode,
        ratio(p.done, p.required, p.overall_percent)
    );
    for course in &p.courses {
        println!(
            "  {} {}",
            ratio(course.done, course.required, course.percent),
            course.name
        );
        for sub in &course.sub_courses {
            if !sub.applicable {
                println!("       n/a {} ({} recorded)", sub.name, sub.raw_done);
                continue;
            }
            println!(
                "    {} {}",
                ratio(sub.capped_done, sub.required, sub.percent),
                sub.name
            );
            for subject in &sub.subjects {
                println!(
                    "      {}/{} {}",
                    subject.capped_done, subject.required, subject.subject
                );
            }
        }
    }
}

fn print_cohort(c: &CohortProgress) {
    println!(
        "{} [{}]: {}/{} students complete",
        c.book_id, c.mode, c.done_student_count, c.student_count
    );
    for course in &c.courses {
        println!(
            "  {}/{} {}",
            course.done_student_count, course.student_count, course.name
        );
        for sub in &course.sub_courses {
            let note = if sub.applicable { "" } else { " (n/a)" };
            println!(
                "    {}/{} {}{}",
                sub.done_student_count, sub.student_count, sub.name, note
            );
        }
    }
}

/// Report an error message to stderr.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("error: {}", msg),
        OutputFormat::Json => eprintln!("{}", serde_json::json!({ "error": msg })),
    }
}
