// rowlib test application -- CLI tool for exercising a WaterRower S4
// monitor on real hardware.
//
// Usage:
//   rowlib-test-app fields
//   rowlib-test-app --port /dev/ttyACM0 poll distance speed
//   rowlib-test-app --port /dev/ttyACM0 monitor --duration 60
//   rowlib-test-app --port /dev/ttyACM0 units km
//   rowlib-test-app --port /dev/ttyACM0 workout distance 2000 --units meters
//   rowlib-test-app --config rowlib.toml stress --count 200
//
// Set RUST_LOG=rowlib_s4=trace to see every line on the wire.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use rowlib::{MonitorEvent, StrokeEvent};
use rowlib::s4::{IntensityOption, MonitorConfig, Registry, S4Builder, S4Monitor, Units};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// rowlib test application -- exercises an S4 monitor from the command line.
#[derive(Parser)]
#[command(name = "rowlib-test-app", version, about)]
struct Cli {
    /// Serial port path (e.g. /dev/ttyACM0, COM3). Overrides the config file.
    #[arg(long)]
    port: Option<String>,

    /// Baud rate. Overrides the config file.
    #[arg(long)]
    baud: Option<u32>,

    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Poll timeout in milliseconds. Overrides the config file.
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the fields of the memory map. Does not open the port.
    Fields,

    /// Poll one or more fields once and print the values.
    Poll {
        /// Field names (see `fields`).
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Print strokes and hot-field values as they arrive.
    Monitor {
        /// Seconds to run (0 = until Ctrl-C).
        #[arg(long, default_value_t = 0)]
        duration: u64,
    },

    /// Reset the monitor.
    Reset,

    /// Select display units (meters, miles, km, strokes).
    Units { units: String },

    /// Select the intensity readout (m/s, mph, 500m, 2km, watts, cal/hr).
    Intensity {
        option: String,

        /// Set the average intensity readout instead.
        #[arg(long)]
        average: bool,
    },

    /// Program a workout.
    Workout {
        #[command(subcommand)]
        action: WorkoutAction,
    },

    /// Poll a field repeatedly and report latency and failures.
    Stress {
        /// Number of polls.
        #[arg(long, default_value_t = 100)]
        count: u32,

        /// Field to poll.
        #[arg(long, default_value = "distance")]
        field: String,
    },
}

#[derive(Subcommand)]
enum WorkoutAction {
    /// Distance workout.
    Distance {
        distance: u32,

        #[arg(long, default_value = "meters")]
        units: String,
    },
    /// Duration workout.
    Duration {
        /// Seconds.
        seconds: u32,
    },
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_config(cli: &Cli) -> Result<MonitorConfig> {
    let mut config = match &cli.config {
        Some(path) => MonitorConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => MonitorConfig::default(),
    };
    if let Some(port) = &cli.port {
        config.port = Some(port.clone());
    }
    if let Some(baud) = cli.baud {
        config.baud_rate = baud;
    }
    if let Some(ms) = cli.timeout_ms {
        config.poll_timeout_ms = ms;
    }
    Ok(config)
}

async fn connect(config: &MonitorConfig, auto_refresh: bool) -> Result<S4Monitor> {
    let Some(port) = config.port.as_deref() else {
        bail!("--port or a config file with `port` is required");
    };
    info!(port, baud = config.baud_rate, "connecting");

    S4Builder::from_config(config)?
        .auto_refresh(auto_refresh)
        .build()
        .await
        .with_context(|| format!("opening S4 on {port}"))
}

fn format_elapsed(hours: Option<u32>, minutes: Option<u32>, seconds: Option<u32>) -> String {
    match (hours, minutes, seconds) {
        (Some(h), Some(m), Some(s)) => format!("{h}:{m:02}:{s:02}"),
        _ => "--:--:--".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_fields(registry: &Registry) -> Result<()> {
    println!("{:<22} {:<8} Width", "Field", "Address");
    println!("{:-<22} {:-<8} {:-<5}", "", "", "");
    for entry in registry.entries() {
        println!("{:<22} {:<8} {}", entry.name, entry.address, entry.width);
    }
    Ok(())
}

async fn cmd_poll(monitor: &S4Monitor, names: &[String]) -> Result<()> {
    for name in names {
        match monitor.read(name).await {
            Ok(value) => println!("{name:<22} {value:>8}  (0x{value:X})"),
            Err(e) => println!("{name:<22} error: {e}"),
        }
    }
    Ok(())
}

async fn cmd_monitor(monitor: &S4Monitor, duration_secs: u64) -> Result<()> {
    let mut strokes = monitor.subscribe_strokes();
    let mut events = monitor.subscribe_events();

    println!("Monitoring (Ctrl-C to stop)...");

    let deadline = (duration_secs > 0).then(|| Instant::now() + Duration::from_secs(duration_secs));
    let mut stroke_count = 0u32;

    loop {
        let timeout = match deadline {
            Some(dl) => {
                let remaining = dl.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    println!("Monitor duration elapsed.");
                    break;
                }
                remaining
            }
            None => Duration::from_secs(3600),
        };

        tokio::select! {
            stroke = strokes.recv() => match stroke {
                Ok(StrokeEvent::End) => {
                    stroke_count += 1;
                    let state = monitor.state();
                    println!(
                        "stroke {:>4}  {}  distance {:>6} m  speed {:>4} cm/s",
                        stroke_count,
                        format_elapsed(
                            state.get("elapsed_hours"),
                            state.get("elapsed_minutes"),
                            state.get("elapsed_seconds"),
                        ),
                        state.get("distance").unwrap_or(0),
                        state.get("speed").unwrap_or(0),
                    );
                }
                Ok(StrokeEvent::Start) => {}
                Err(RecvError::Lagged(n)) => println!("[warning] missed {n} stroke events"),
                Err(RecvError::Closed) => break,
            },
            event = events.recv() => match event {
                Ok(MonitorEvent::Disconnected) | Err(RecvError::Closed) => {
                    println!("Monitor disconnected.");
                    break;
                }
                Ok(event) => println!("[event] {event:?}"),
                Err(RecvError::Lagged(_)) => {}
            },
            _ = tokio::time::sleep(timeout) => {
                if deadline.is_some() {
                    println!("Monitor duration elapsed.");
                }
                break;
            }
        }
    }

    Ok(())
}

async fn cmd_stress(monitor: &S4Monitor, count: u32, field: &str) -> Result<()> {
    monitor.registry().require(field)?;
    println!("Stress test: {count} polls of {field}");

    let mut success = 0u32;
    let mut failures = 0u32;
    let mut worst = Duration::ZERO;
    let start = Instant::now();

    for i in 1..=count {
        let t0 = Instant::now();
        match monitor.read(field).await {
            Ok(_) => {
                success += 1;
                worst = worst.max(t0.elapsed());
            }
            Err(e) => {
                eprintln!("[{i}/{count}] poll failed: {e}");
                failures += 1;
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("Results: {success} ok, {failures} failed in {:.2}s", elapsed.as_secs_f64());
    if count > 0 {
        println!("Mean:    {:.1} ms/poll", elapsed.as_secs_f64() * 1000.0 / f64::from(count));
    }
    println!("Worst:   {:.1} ms", worst.as_secs_f64() * 1000.0);
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    // `fields` does not need a connection.
    if matches!(cli.command, Command::Fields) {
        return cmd_fields(&config.build_registry()?);
    }

    let auto_refresh = matches!(cli.command, Command::Monitor { .. });
    let monitor = connect(&config, auto_refresh).await?;

    let result = match &cli.command {
        Command::Fields => Ok(()),
        Command::Poll { names } => cmd_poll(&monitor, names).await,
        Command::Monitor { duration } => cmd_monitor(&monitor, *duration).await,
        Command::Reset => monitor.reset().await.map_err(Into::into),
        Command::Units { units } => {
            let units: Units = units.parse()?;
            monitor.set_display_units(units).await.map_err(Into::into)
        }
        Command::Intensity { option, average } => {
            let option: IntensityOption = option.parse()?;
            let result = if *average {
                monitor.set_average_intensity_display(option).await
            } else {
                monitor.set_intensity_display(option).await
            };
            result.map_err(Into::into)
        }
        Command::Workout { action } => match action {
            WorkoutAction::Distance { distance, units } => {
                let units: Units = units.parse()?;
                monitor
                    .define_distance_workout(*distance, units)
                    .await
                    .map_err(Into::into)
            }
            WorkoutAction::Duration { seconds } => monitor
                .define_duration_workout(*seconds)
                .await
                .map_err(Into::into),
        },
        Command::Stress { count, field } => cmd_stress(&monitor, *count, field).await,
    };

    if let Err(e) = monitor.close().await {
        warn!(error = %e, "closing monitor failed");
    }
    result
}
