use anyhow::Result;
use clap::{Parser, ValueEnum};
use cost_saver::app::App;
use cost_saver::cloud::client::HttpCloud;
use cost_saver::cloud::memory::demo_fleet;
use cost_saver::cloud::AccountRegistry;
use cost_saver::config::Config;
use cost_saver::resource::fleet::Fleet;
use cost_saver::resource::model::ResourceKind;
use cost_saver::{event, ui};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Terminal UI to start and stop cloud resources across accounts
#[derive(Parser, Debug)]
#[command(name = "cost-saver", version, about, long_about = None)]
struct Args {
    /// Config file (.json, .yaml or .yml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Section to open on startup
    #[arg(short, long, value_enum)]
    section: Option<Section>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    /// Run in read-only mode (block start/stop)
    #[arg(long)]
    readonly: bool,

    /// Start with auto-refresh off (not saved)
    #[arg(long)]
    no_auto_refresh: bool,

    /// Use seeded in-memory accounts instead of the provider gateway
    #[arg(long)]
    demo: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Section {
    Compute,
    Database,
    Container,
}

impl From<Section> for ResourceKind {
    fn from(section: Section) -> Self {
        match section {
            Section::Compute => ResourceKind::Compute,
            Section::Database => ResourceKind::Database,
            Section::Container => ResourceKind::Container,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file {:?}: {}", log_path, e);
            return None;
        },
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("cost-saver started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("cost-saver").join("cost-saver.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".cost-saver").join("cost-saver.log");
    }
    PathBuf::from("cost-saver.log")
}

fn build_fleet(config: &Config, demo: bool) -> Result<Fleet> {
    let fleet = if demo {
        let (accounts, cloud) = demo_fleet();
        tracing::info!("Demo mode with {} seeded accounts", accounts.len());
        Fleet::with_provider(AccountRegistry::new(accounts), Arc::new(cloud))
    } else {
        let registry = AccountRegistry::load(&config.accounts);
        if registry.is_empty() {
            tracing::warn!("No accounts configured");
        }
        Fleet::with_provider(registry, Arc::new(HttpCloud::new()?))
    };

    Ok(fleet.with_concurrency_limit(config.max_concurrent_accounts))
}

fn initial_section(args: &Args, config: &Config) -> ResourceKind {
    args.section
        .map(ResourceKind::from)
        .or_else(|| {
            config
                .last_section
                .as_deref()
                .and_then(ResourceKind::from_key)
        })
        .unwrap_or(ResourceKind::Compute)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    let mut config = Config::load(args.config.as_deref());
    if args.no_auto_refresh {
        config.auto_refresh = false;
    }

    let fleet = build_fleet(&config, args.demo)?;
    let section = initial_section(&args, &config);
    tracing::info!(
        "Opening {} with {} accounts",
        section,
        fleet.registry().len()
    );

    let mut app = App::new(Arc::new(fleet), config, section, args.readonly);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    app.start();
    let run_result = run_app(&mut terminal, &mut app).await;
    cleanup_terminal(&mut terminal)?;

    if let Err(err) = run_result {
        eprintln!("Error: {err:?}");
    }

    Ok(())
}

fn cleanup_terminal<B: Backend + std::io::Write>(terminal: &mut Terminal<B>) -> Result<()>
where
    B::Error: Send + Sync + 'static,
{
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()>
where
    B::Error: Send + Sync + 'static,
{
    loop {
        terminal.draw(|f| ui::render(f, app))?;

        if event::handle_events(app).await? {
            return Ok(());
        }

        // Listings and timer ticks posted since the last frame
        app.pump();
    }
}
