mod endpoint;
mod gateway;
mod logging;
mod state;
mod theme;
mod ui;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use clawpulse_core::{
    backoff::{BackoffPolicy, DEFAULT_MAX_DELAY, DEFAULT_MIN_DELAY, DEFAULT_MULTIPLIER},
    metrics::SyntheticMetrics,
};
use crossterm::{
    event::{Event, EventStream},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{io, path::PathBuf, time::Duration};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use url::Url;

const DEFAULT_CONFIG_URL: &str = "http://127.0.0.1:18790/api/config";
const DEFAULT_LOG_DIR: &str = ".clawpulse/logs";
const GATEWAY_EVENT_CAPACITY: usize = 256;
const UPTIME_TICK: Duration = Duration::from_secs(1);
const DEFAULT_SAMPLE_INTERVAL_SECS: u64 = 5;

#[derive(Parser, Debug)]
#[command(name = "clawpulse-monitor", about = "Live terminal dashboard for a local agent gateway")]
struct Args {
    #[arg(long, default_value = "")]
    gateway_url: String,
    #[arg(long, default_value = "")]
    config_url: String,
    #[arg(long, default_value = "")]
    log_dir: String,
    #[arg(long, default_value_t = DEFAULT_MIN_DELAY.as_millis() as u64)]
    reconnect_min_ms: u64,
    #[arg(long, default_value_t = DEFAULT_MAX_DELAY.as_millis() as u64)]
    reconnect_max_ms: u64,
    #[arg(long, default_value_t = DEFAULT_SAMPLE_INTERVAL_SECS)]
    sample_interval_secs: u64,
}

#[derive(Clone, Debug)]
struct Config {
    gateway_url: Option<String>,
    config_url: Option<Url>,
    log_dir: PathBuf,
    log_stdout: bool,
    backoff: BackoffPolicy,
    sample_interval: Duration,
}

type Tui = Terminal<CrosstermBackend<io::Stdout>>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args);
    let log_guard = logging::init_logging(&config.log_dir, config.log_stdout);
    if log_guard.path_enabled() {
        info!(
            "monitor_log_file: {}",
            logging::log_path(&config.log_dir).display()
        );
    }

    let endpoint =
        endpoint::resolve_endpoint(config.gateway_url.as_deref(), config.config_url.as_ref())
            .await;
    info!("monitor_start: endpoint={endpoint}");

    let (gateway_tx, gateway_rx) = mpsc::channel(GATEWAY_EVENT_CAPACITY);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let gateway_task = tokio::spawn(gateway::gateway_loop(
        endpoint.clone(),
        config.backoff,
        gateway_tx,
        shutdown_rx,
    ));

    let mut app = state::App::new(endpoint, Box::new(SyntheticMetrics::default()));
    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app, gateway_rx, config.sample_interval).await;
    restore_terminal(&mut terminal)?;

    let _ = shutdown_tx.send(true);
    if let Err(err) = gateway_task.await {
        warn!("gateway_task_join_error: {err}");
    }
    info!("monitor_stop: dropped_frames={}", app.dropped_frames());
    drop(log_guard);
    result
}

async fn run_app(
    terminal: &mut Tui,
    app: &mut state::App,
    mut gateway_rx: mpsc::Receiver<gateway::GatewayEvent>,
    sample_interval: Duration,
) -> Result<()> {
    let mut events = EventStream::new();
    let mut uptime_ticker = tokio::time::interval(UPTIME_TICK);
    let mut sample_ticker = tokio::time::interval_at(
        tokio::time::Instant::now() + sample_interval,
        sample_interval,
    );

    loop {
        terminal.draw(|frame| ui::render(frame, app))?;
        tokio::select! {
            _ = uptime_ticker.tick() => {}
            _ = sample_ticker.tick() => {
                app.sample_metrics(Local::now());
            }
            Some(event) = gateway_rx.recv() => {
                app.apply_gateway_event(event);
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) => app.handle_key(key),
                    Some(Ok(_)) => {}
                    Some(Err(err)) => warn!("terminal_event_error: {err}"),
                    None => break,
                }
            }
        }
        if app.should_quit() {
            break;
        }
    }
    Ok(())
}

fn setup_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn load_config(args: &Args) -> Config {
    let min_delay = Duration::from_millis(args.reconnect_min_ms);
    let max_delay = Duration::from_millis(args.reconnect_max_ms);
    Config {
        gateway_url: resolve_gateway_url(&args.gateway_url),
        config_url: resolve_config_url(&args.config_url),
        log_dir: resolve_log_dir(&args.log_dir),
        log_stdout: resolve_log_stdout(),
        backoff: BackoffPolicy {
            min_delay,
            max_delay,
            multiplier: DEFAULT_MULTIPLIER,
        }
        .normalized(),
        sample_interval: Duration::from_secs(args.sample_interval_secs.max(1)),
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|value| non_empty(&value))
}

fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn resolve_gateway_url(flag: &str) -> Option<String> {
    non_empty(flag).or_else(|| env_non_empty("CLAWPULSE_GATEWAY_URL"))
}

fn resolve_config_url(flag: &str) -> Option<Url> {
    let raw = non_empty(flag)
        .or_else(|| env_non_empty("CLAWPULSE_CONFIG_URL"))
        .unwrap_or_else(|| DEFAULT_CONFIG_URL.to_string());
    match Url::parse(&raw) {
        Ok(url) => Some(url),
        Err(err) => {
            eprintln!("clawpulse-monitor: ignoring config url {raw}: {err}");
            None
        }
    }
}

fn resolve_log_dir(flag: &str) -> PathBuf {
    non_empty(flag)
        .or_else(|| env_non_empty("CLAWPULSE_LOG_DIR"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR))
}

fn resolve_log_stdout() -> bool {
    std::env::var("CLAWPULSE_LOG_STDOUT")
        .ok()
        .and_then(|value| parse_bool_flag(&value))
        .unwrap_or(false)
}
