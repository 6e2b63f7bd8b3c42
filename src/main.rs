//! trend-pulse binary: parse arguments, set up logging and the terminal, and
//! run the event loop.  See the library docs for the architecture.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing_subscriber::EnvFilter;

use trend_pulse::app::App;
use trend_pulse::poll::FetchWorker;
use trend_pulse::scan::{mime_for_path, ScreenshotScanner};
use trend_pulse::source::{GeminiClient, GeminiSource};
use trend_pulse::{input, ui, Config, Credentials, Scheduler};

#[derive(Parser, Debug)]
#[command(author, version, about = "Live trending-topics dashboard", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Refresh interval in seconds (overrides the config and tier).
    #[arg(long)]
    interval: Option<u32>,
    /// Cooldown after a quota failure, in seconds.
    #[arg(long)]
    cooldown: Option<u32>,
    /// Activate and enter live mode on start.
    #[arg(long)]
    live: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rank the tokens visible in a screenshot and print them.
    Scan {
        /// PNG / JPEG / WEBP image to analyse.
        image: PathBuf,
        /// Print only the uppercase keyword list.
        #[arg(long)]
        keywords: bool,
    },
}

// ---------------------------------------------------------------------------
// RAII terminal guard
// ---------------------------------------------------------------------------

/// Manages terminal raw-mode and alternate-screen lifetime via [`Drop`].
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl TerminalGuard {
    fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Restore the terminal before the default panic message is printed.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(info);
    }));
}

/// Log to a file; the terminal belongs to the UI.
fn init_logging(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trend_pulse=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(interval) = cli.interval {
        config.refresh_interval_secs = Some(interval);
    }
    if let Some(cooldown) = cli.cooldown {
        config.cooldown_secs = cooldown;
    }
    config.validate()?;
    Ok(config)
}

fn build_client(config: &Config, credentials: Credentials) -> Result<GeminiClient> {
    GeminiClient::new(
        config.endpoint.clone(),
        config.model.clone(),
        credentials,
        Duration::from_secs(config.request_timeout_secs),
    )
    .context("building HTTP client")
}

fn run_scan(client: GeminiClient, prompt: &str, image: &Path, keywords_only: bool) -> Result<()> {
    let Some(mime) = mime_for_path(image) else {
        bail!("unsupported image type: {}", image.display());
    };
    let bytes =
        std::fs::read(image).with_context(|| format!("reading {}", image.display()))?;
    let analysis = ScreenshotScanner::new(client)
        .with_prompt(prompt)
        .analyze(&bytes, mime)?;

    if keywords_only {
        println!("{}", analysis.keywords());
        return Ok(());
    }

    println!("Market sentiment: {}", analysis.market_sentiment);
    println!("Tokens detected:  {}", analysis.tokens_found);
    println!("Top picks:        {}", analysis.top_picks.join(", "));
    println!("Avoid:            {}", analysis.avoid.join(", "));
    println!();
    for token in &analysis.scored_tokens {
        let marker = if token.is_strong() { "*" } else { " " };
        println!(
            "{marker} #{:<3} {:<16} {:>2}/10  {}",
            token.rank, token.name, token.score, token.reason
        );
    }
    Ok(())
}

fn run_dashboard(
    config: &Config,
    client: GeminiClient,
    credentials: Credentials,
    live: bool,
) -> Result<()> {
    install_panic_hook();

    let source = GeminiSource::new(client, config.prompt.clone(), config.ticker_mode);
    let worker = FetchWorker::spawn(source);
    let mut app = App::new(
        Scheduler::new(config.schedule()),
        worker,
        credentials,
        config.export_dir.clone(),
    );
    if live {
        app.activate();
        app.toggle_live();
    }

    // -- terminal setup (Drop restores on exit or panic) ---------------------
    let mut guard = TerminalGuard::new()?;

    // -- main event loop -----------------------------------------------------
    // Runs at ~10 fps.  Each iteration:
    //   1. Apply finished fetches.
    //   2. Advance the scheduler once per elapsed second.
    //   3. Render.
    //   4. Poll for keyboard input (non-blocking, up to frame_rate).
    let frame_rate = Duration::from_millis(100);
    let second = Duration::from_secs(1);
    let mut last_tick = Instant::now();

    loop {
        app.drain_worker();

        while last_tick.elapsed() >= second {
            last_tick += second;
            app.tick();
        }

        guard.terminal.draw(|f| ui::draw(&mut app, f))?;

        if event::poll(frame_rate)? {
            if let Event::Key(key) = event::read()? {
                input::handle_key_event(&mut app, key);
            }
        }

        if app.quit {
            break;
        }
    }

    tracing::info!("shutting down");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(&config.log_file)?;

    let credentials = Credentials::new(config.api_key_env.clone(), config.env_file.clone());
    credentials.reload();
    tracing::info!(
        model = %config.model,
        interval = config.effective_interval_secs(),
        cooldown = config.cooldown_secs,
        key = credentials.is_configured(),
        "starting"
    );
    let client = build_client(&config, credentials.clone())?;

    match &cli.command {
        Some(Command::Scan { image, keywords }) => {
            run_scan(client, &config.scan_prompt, image, *keywords)
        }
        None => run_dashboard(&config, client, credentials, cli.live),
    }
}
