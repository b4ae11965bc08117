mod app;
mod ui;

use anyhow::{Context, Result};
use app::{format_throughput, poll_event, App, AppAction};
use clap::Parser;
use crossterm::event::Event;
use netgauge::logger::{self, LogLevel, LogTarget};
use netgauge::speedtest::rating::{Rating, Suitability};
use netgauge::{HttpTransport, Settings, SpeedError, SpeedTest, SpeedTestResult, Throughput};
use ratatui::DefaultTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use ui::draw_ui;

#[derive(Parser, Debug)]
#[command(name = "netgauge")]
#[command(about = "Measure latency, download and upload speed")]
struct Args {
    /// Settings file (YAML). Defaults to the per-user config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run one test, print the results and exit
    #[arg(long)]
    headless: bool,

    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Log file used by the dashboard
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let target = if args.headless {
        LogTarget::Stderr
    } else {
        LogTarget::File(args.log_file.clone().unwrap_or_else(logger::default_log_file))
    };
    let _log_guard = logger::init_logger(args.log_level, target)?;

    let settings = Settings::load(args.config.as_deref()).context("loading settings")?;
    let transport = HttpTransport::new(&settings).context("building http client")?;
    let speedtest = Arc::new(SpeedTest::new(transport, settings));
    info!(version = env!("CARGO_PKG_VERSION"), headless = args.headless, "netgauge starting");

    if args.headless {
        return run_headless(&speedtest).await;
    }

    let mut terminal = ratatui::init();
    terminal.clear()?;

    let result = run_app(&mut terminal, speedtest).await;

    ratatui::restore();
    result
}

async fn run_app(
    terminal: &mut DefaultTerminal,
    speedtest: Arc<SpeedTest<HttpTransport>>,
) -> Result<()> {
    let mut app = App::new();
    let state_rx = speedtest.subscribe();

    loop {
        let state = *state_rx.borrow();
        app.sync(state);
        terminal.draw(|frame| draw_ui(frame, &app))?;

        if let Some(Event::Key(key)) = poll_event(Duration::from_millis(30))? {
            if let Some(action) = app.handle_key_event(key) {
                match action {
                    AppAction::Quit => break,
                    AppAction::StartTest => {
                        let Some(rx) = app.begin_run() else {
                            continue;
                        };

                        let speedtest = Arc::clone(&speedtest);
                        tokio::spawn(async move {
                            match speedtest.run_full_test(rx).await {
                                Ok(result) => info!(?result, "speed test finished"),
                                Err(err) => warn!(error = %err, "speed test did not finish"),
                            }
                        });
                    }
                    AppAction::CancelTest => app.cancel_run(),
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    app.cancel_run();
    Ok(())
}

async fn run_headless(speedtest: &SpeedTest<HttpTransport>) -> Result<()> {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    match speedtest.run_full_test(cancel_rx).await {
        Ok(result) => {
            print_report(&result);
            Ok(())
        }
        Err(SpeedError::Cancelled) => {
            eprintln!("cancelled");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn print_report(result: &SpeedTestResult) {
    println!(
        "Ping      {:>6} ms   jitter {:.1} ms   {}",
        result.ping_ms,
        result.jitter_ms,
        Rating::latency(result.ping_ms)
    );
    println!("Download  {}", describe(&result.download, Rating::download));
    println!("Upload    {}", describe(&result.upload, Rating::upload));

    let suitability = Suitability::assess(result);
    let mark = |ok: bool| if ok { "yes" } else { "limited" };
    println!();
    println!("HD streaming   {}", mark(suitability.hd_streaming));
    println!("Video calls    {}", mark(suitability.video_calls));
    println!("Online gaming  {}", mark(suitability.online_gaming));
    println!("Remote work    {}", mark(suitability.remote_work));
}

fn describe(throughput: &Throughput, rate: fn(f64) -> Rating) -> String {
    match throughput {
        Throughput::Measured(mbps) | Throughput::Synthetic(mbps) => {
            format!("{}   {}", format_throughput(throughput), rate(*mbps))
        }
        _ => format_throughput(throughput),
    }
}
