use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use clap::{Parser, Subcommand, ValueEnum};

mod api;
mod ask;
mod config;
mod extract;
mod lifecycle;
mod ops;
mod shipment;
mod storage;
mod theme;
mod tui;
mod upload;

use api::ApiClient;
use config::Config;
use storage::JsonFileStore;
use theme::{TerminalAppearance, ThemePreference, ThemeStore};

#[derive(Parser)]
#[command(name = "logidoc")]
#[command(version = "0.1")]
#[command(about = "Logistics Document AI terminal client", long_about = None)]
struct Cli {
    /// Backend root URL (defaults to the config file, then http://localhost:8000)
    #[arg(long, global = true, env = "LOGIDOC_API_URL")]
    api_url: Option<String>,

    /// Log filter for the log file, e.g. `debug`
    #[arg(long, global = true, env = "LOGIDOC_LOG")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// Open the interactive dashboard (Default)
    Dashboard,
    /// Upload a PDF, DOCX, or TXT document
    Upload {
        path: PathBuf,
    },
    /// Ask a question about the most recently uploaded document
    Ask {
        question: String,
    },
    /// Extract shipment fields from the most recently uploaded document
    Extract {
        /// Print the raw record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change the colour theme
    Theme {
        #[arg(value_enum, default_value_t = ThemeArg::Show)]
        action: ThemeArg,
    },
    /// Show or edit the saved configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommand>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ThemeArg {
    Show,
    Toggle,
    Light,
    Dark,
}

impl From<ThemeArg> for ops::ThemeAction {
    fn from(arg: ThemeArg) -> Self {
        match arg {
            ThemeArg::Show => ops::ThemeAction::Show,
            ThemeArg::Toggle => ops::ThemeAction::Toggle,
            ThemeArg::Light => ops::ThemeAction::Set(ThemePreference::Light),
            ThemeArg::Dark => ops::ThemeAction::Set(ThemePreference::Dark),
        }
    }
}

#[derive(Subcommand, Clone)]
enum ConfigCommand {
    /// Print the config file location and contents
    Show,
    /// Save the backend URL
    SetUrl { url: String },
    /// Save the log filter
    SetLogLevel { level: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Ensure APP Data Dir exists
    let app_dir = Config::get_app_data_dir();
    let loaded = Config::load();
    let mut config = loaded.as_ref().ok().cloned().unwrap_or_default();
    let log_level = config.resolve_log_level(cli.log_level.as_deref());

    let file_appender = tracing_appender::rolling::never(&app_dir, config::LOG_FILE);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let file_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        // Only log errors to stderr to avoid messing up TUI
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new("error")),
        )
        .init();

    if let Err(e) = &loaded {
        tracing::warn!("Ignoring config, using defaults: {:#}", e);
    }

    let command = cli.command.unwrap_or(Commands::Dashboard);

    if let Commands::Config { action } = &command {
        match action.clone().unwrap_or(ConfigCommand::Show) {
            ConfigCommand::Show => {
                println!("# {}", Config::config_path().display());
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigCommand::SetUrl { url } => {
                config.resolve_base_url(Some(url.as_str()))?;
                config.api_base_url = Some(url);
                config.save()?;
                println!("Saved backend URL");
            }
            ConfigCommand::SetLogLevel { level } => {
                config.log_level = Some(level);
                config.save()?;
                println!("Saved log level");
            }
        }
        return Ok(());
    }

    let theme = ThemeStore::init(JsonFileStore::new(Config::preferences_path()), &TerminalAppearance);

    if let Commands::Theme { action } = command {
        let mut theme = theme;
        let current = ops::run_theme(&mut theme, action.into());
        println!("{}", current);
        return Ok(());
    }

    let base_url = config.resolve_base_url(cli.api_url.as_deref())?;
    tracing::info!("Using backend {}", base_url);
    let api = ApiClient::new(base_url);

    match command {
        Commands::Dashboard => {
            tui::run_app(api, theme).await?;
        }
        Commands::Upload { path } => {
            ops::run_upload(&api, &path).await?;
        }
        Commands::Ask { question } => {
            ops::run_ask(&api, &question).await?;
        }
        Commands::Extract { json } => {
            ops::run_extract(&api, json).await?;
        }
        Commands::Theme { .. } | Commands::Config { .. } => unreachable!(), // Handled above
    }

    Ok(())
}
