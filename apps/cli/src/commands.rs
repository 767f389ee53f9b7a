//! CLI command definitions, routing, and tracing setup.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use quizsmith_api::AppState;
use quizsmith_core::{Coordinator, ProgressReporter};
use quizsmith_extractor::WikiExtractor;
use quizsmith_shared::{AppConfig, Quiz, api_key, init_config, load_config};
use quizsmith_storage::Storage;
use quizsmith_synthesizer::{OpenRouterClient, Synthesizer};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Quizsmith: turn encyclopedia articles into quizzes.
#[derive(Parser)]
#[command(
    name = "quizsmith",
    version,
    about = "Generate, store and serve multiple-choice quizzes from encyclopedia articles.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Start the HTTP API.
    Serve {
        /// Listen address (overrides `server.bind`).
        #[arg(long)]
        bind: Option<String>,
    },

    /// Generate a quiz for an article URL and print it as JSON.
    Generate {
        /// Article URL.
        url: String,

        /// Regenerate even if a quiz for this URL already exists.
        #[arg(long)]
        force: bool,
    },

    /// List stored quizzes.
    History,

    /// Print one stored quiz as JSON.
    Show {
        /// Quiz id.
        id: i64,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "quizsmith=info",
        1 => "quizsmith=debug",
        _ => "quizsmith=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve { bind } => cmd_serve(bind.as_deref()).await,
        Command::Generate { url, force } => cmd_generate(&url, force).await,
        Command::History => cmd_history().await,
        Command::Show { id } => cmd_show(id).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Open the configured database.
async fn open_storage(config: &AppConfig) -> Result<Storage> {
    let path = config.database.path()?;
    Ok(Storage::open(&path).await?)
}

/// Wire extractor, model client and storage into one coordinator.
async fn build_coordinator(config: &AppConfig) -> Result<Coordinator> {
    // Validate API key before doing anything
    let key = api_key(config)?;

    let storage = Arc::new(open_storage(config).await?);
    let extractor = WikiExtractor::new(&config.fetch)?;
    let model = OpenRouterClient::new(&config.openrouter, key)?;

    Ok(Coordinator::new(
        Arc::new(extractor),
        Synthesizer::new(Arc::new(model)),
        storage,
        config.generation.attempts(),
    ))
}

async fn cmd_serve(bind: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let coordinator = build_coordinator(&config).await?;
    let bind = bind.unwrap_or(&config.server.bind);

    info!(
        bind,
        model = %config.openrouter.default_model,
        origins = ?config.server.allowed_origins,
        "starting server"
    );

    quizsmith_api::serve(
        AppState::new(Arc::new(coordinator)),
        bind,
        &config.server.allowed_origins,
    )
    .await
    .map_err(|e| eyre!("server on {bind} failed: {e}"))
}

async fn cmd_generate(url: &str, force: bool) -> Result<()> {
    let config = load_config()?;
    let coordinator = build_coordinator(&config).await?;

    let reporter = CliProgress::new();
    let quiz = coordinator
        .generate(url, force, &reporter)
        .await
        .inspect_err(|_| reporter.spinner.finish_and_clear())?;
    println!("{}", serde_json::to_string_pretty(&quiz)?);
    Ok(())
}

async fn cmd_history() -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;
    let quizzes = storage.list_quizzes().await?;

    if quizzes.is_empty() {
        println!("No quizzes yet. Run `quizsmith generate <url>` to create one.");
        return Ok(());
    }

    println!("{:>5}  {:<20}  {:>3}  {:<40}  URL", "ID", "CREATED", "Q", "TITLE");
    for quiz in &quizzes {
        println!(
            "{:>5}  {:<20}  {:>3}  {:<40}  {}",
            quiz.id,
            quiz.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            quiz.questions.len(),
            truncate_title(&quiz.title, 40),
            quiz.url
        );
    }
    Ok(())
}

async fn cmd_show(id: i64) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;

    let quiz = storage
        .get_quiz(id)
        .await?
        .ok_or_else(|| eyre!("Quiz not found: {id}"))?;
    println!("{}", serde_json::to_string_pretty(&quiz)?);
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn truncate_title(title: &str, max: usize) -> String {
    if title.chars().count() <= max {
        title.to_string()
    } else {
        let cut: String = title.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, quiz: &Quiz, cached: bool) {
        let source = if cached { "cached" } else { "new" };
        self.spinner.finish_with_message(format!(
            "Quiz {} ({source}, {} questions): {}",
            quiz.id,
            quiz.questions.len(),
            quiz.title
        ));
    }
}
