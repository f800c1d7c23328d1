//! CLI binary for edgequake-pdf-a11y.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ServiceConfig`, wires the production collaborators and runs the server.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_pdf_a11y::ai::resolve_provider;
use edgequake_pdf_a11y::server::auth::mint_token;
use edgequake_pdf_a11y::{
    normalize, serve, AppState, DocumentDefaults, FilesystemStore, HttpChecker,
    LopdfRemediator, MemoryRecordStore, OpenAiService, RawReport, RecordStore, ServiceConfig,
    SqliteRecordStore,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the API server with a SQLite record store
  pdf-a11y serve --database-url sqlite://a11y.db --storage-dir ./data/objects

  # Normalize a saved checker report offline
  pdf-a11y normalize report.json

  # Mint a development bearer token
  pdf-a11y token --user alice --ttl-hours 8

ENVIRONMENT VARIABLES:
  JWT_SECRET              HS256 secret for bearer tokens (required)
  CHECKER_BASE_URL        Accessibility checker base URL
  CHECKER_API_KEY         Accessibility checker API key
  OPENAI_API_KEY          Key for transcription (and alt text via OpenAI)
  EDGEQUAKE_LLM_PROVIDER  Override the alt-text provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override the alt-text model ID
  RUST_LOG                Log filter, e.g. edgequake_pdf_a11y=debug,tower_http=debug
"#;

/// PDF accessibility remediation service.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-a11y",
    version,
    about = "PDF accessibility remediation service",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF_A11Y_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF_A11Y_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API.
    Serve(ServeArgs),

    /// Normalize a checker report file and print the issues as JSON.
    Normalize {
        /// Path to the raw checker report (JSON).
        report: PathBuf,
    },

    /// Mint a bearer token for local development.
    Token {
        /// Owner id placed in the `sub` claim.
        #[arg(long)]
        user: String,

        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        jwt_secret: String,

        /// Token lifetime in hours.
        #[arg(long, default_value_t = 24)]
        ttl_hours: i64,
    },
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Socket address to bind.
    #[arg(long, env = "PDF_A11Y_BIND", default_value = "0.0.0.0:8080")]
    bind: String,

    /// SQLite URL for the record store. Records live in memory when unset.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Root directory for stored PDF versions.
    #[arg(long, env = "PDF_A11Y_STORAGE_DIR", default_value = "./data/objects")]
    storage_dir: PathBuf,

    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: String,

    /// Accessibility checker base URL.
    #[arg(long, env = "CHECKER_BASE_URL", default_value = "http://localhost:9000")]
    checker_url: String,

    #[arg(long, env = "CHECKER_API_KEY", hide_env_values = true)]
    checker_api_key: Option<String>,

    /// OpenAI-style API base for transcription.
    #[arg(long, env = "OPENAI_API_BASE", default_value = "https://api.openai.com/v1")]
    ai_api_base: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    ai_api_key: Option<String>,

    /// Vision model for alt text (e.g. gpt-4.1-nano, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Vision provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Concurrent vision calls per alt-text request.
    #[arg(short, long, env = "PDF_A11Y_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Outbound HTTP timeout in seconds.
    #[arg(long, env = "PDF_A11Y_HTTP_TIMEOUT", default_value_t = 60)]
    http_timeout: u64,

    /// Largest accepted request body in MiB.
    #[arg(long, env = "PDF_A11Y_MAX_UPLOAD_MB", default_value_t = 50)]
    max_upload_mb: usize,

    /// Author written into remediated documents.
    #[arg(long, env = "PDF_A11Y_AUTHOR")]
    author: Option<String>,

    /// Document language written into remediated documents (BCP 47).
    #[arg(long, env = "PDF_A11Y_LANGUAGE")]
    language: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve(args) => run_server(args).await,
        Command::Normalize { report } => run_normalize(&report, cli.quiet),
        Command::Token {
            user,
            jwt_secret,
            ttl_hours,
        } => {
            let token = mint_token(&jwt_secret, &user, chrono::Duration::hours(ttl_hours))
                .context("Failed to sign token")?;
            println!("{token}");
            Ok(())
        }
    }
}

fn build_config(args: &ServeArgs) -> Result<ServiceConfig> {
    let mut document = DocumentDefaults::default();
    if let Some(ref author) = args.author {
        document.author = author.clone();
    }
    if let Some(ref language) = args.language {
        document.language = language.clone();
    }

    let mut builder = ServiceConfig::builder()
        .bind_addr(&args.bind)
        .storage_dir(&args.storage_dir)
        .jwt_secret(&args.jwt_secret)
        .checker_base_url(&args.checker_url)
        .ai_api_base(&args.ai_api_base)
        .concurrency(args.concurrency)
        .http_timeout_secs(args.http_timeout)
        .max_upload_bytes(args.max_upload_mb.saturating_mul(1024 * 1024))
        .document_defaults(document);

    if let Some(ref url) = args.database_url {
        builder = builder.database_url(url);
    }
    if let Some(ref key) = args.checker_api_key {
        builder = builder.checker_api_key(key);
    }
    if let Some(ref key) = args.ai_api_key {
        builder = builder.ai_api_key(key);
    }
    if let Some(ref model) = args.model {
        builder = builder.alt_text_model(model);
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider);
    }

    builder.build().context("Invalid configuration")
}

async fn run_server(args: ServeArgs) -> Result<()> {
    let config = Arc::new(build_config(&args)?);
    info!("Starting PDF accessibility service: {:?}", config);

    let records: Arc<dyn RecordStore> = match config.database_url {
        Some(ref url) => Arc::new(
            SqliteRecordStore::connect(url)
                .await
                .with_context(|| format!("Failed to open record store at {url}"))?,
        ),
        None => {
            warn!("No DATABASE_URL set; records are kept in memory and lost on restart");
            Arc::new(MemoryRecordStore::new())
        }
    };

    std::fs::create_dir_all(&config.storage_dir).with_context(|| {
        format!(
            "Failed to create storage directory {}",
            config.storage_dir.display()
        )
    })?;
    let objects = Arc::new(FilesystemStore::new(&config.storage_dir));

    let checker = Arc::new(
        HttpChecker::new(
            &config.checker_base_url,
            config.checker_api_key.clone(),
            config.http_timeout_secs,
        )
        .context("Failed to build checker client")?,
    );

    // Alt text degrades to placeholders when no vision provider resolves.
    let vision = match resolve_provider(&config) {
        Ok(provider) => Some(provider),
        Err(e) => {
            warn!("Alt-text generation disabled: {}", e);
            None
        }
    };
    let ai = Arc::new(OpenAiService::new(&config, vision).context("Failed to build AI client")?);

    let state = Arc::new(AppState::new(
        Arc::clone(&config),
        records,
        objects,
        checker,
        Arc::new(LopdfRemediator::new()),
        ai,
    ));

    serve(&config.bind_addr, state)
        .await
        .with_context(|| format!("Server on {} failed", config.bind_addr))
}

fn run_normalize(path: &Path, quiet: bool) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let report: RawReport = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not JSON", path.display()))?;

    let issues = normalize(Some(&report));
    println!(
        "{}",
        serde_json::to_string_pretty(&issues).context("Failed to serialize issues")?
    );
    if !quiet {
        eprintln!(
            "{} {} issues  {}",
            green("✔"),
            issues.len(),
            dim(&format!(
                "score {}",
                edgequake_pdf_a11y::score::accessibility_score(&issues)
            ))
        );
    }
    Ok(())
}
