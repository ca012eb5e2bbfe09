//! Print live rowing data from an S4 monitor.
//!
//! Connects, lets the refresh driver keep distance, speed and elapsed time
//! current, and prints a line at the end of every stroke.
//!
//! # Requirements
//!
//! - A WaterRower with an S4 monitor connected over USB
//! - Serial port path adjusted for your system
//!
//! # Usage
//!
//! ```sh
//! cargo run -p rowlib --example monitor_readings
//! ```

use std::time::Duration;

use rowlib::StrokeEvent;
use rowlib::s4::S4Builder;
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let serial_port = "/dev/ttyACM0";

    println!("Connecting to S4 on {}...", serial_port);

    let monitor = S4Builder::new()
        .serial_port(serial_port)
        .poll_timeout(Duration::from_millis(250))
        .build()
        .await?;

    let mut strokes = monitor.subscribe_strokes();
    println!("Connected. Row for 60 seconds...\n");

    let deadline = tokio::time::Instant::now() + Duration::from_secs(60);

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }

        match tokio::time::timeout(remaining, strokes.recv()).await {
            Ok(Ok(StrokeEvent::End)) => {
                let state = monitor.state();
                println!(
                    "{:>2}:{:02}  {:>6} m  {:>4} cm/s",
                    state.get("elapsed_minutes").unwrap_or(0),
                    state.get("elapsed_seconds").unwrap_or(0),
                    state.get("distance").unwrap_or(0),
                    state.get("speed").unwrap_or(0),
                );
            }
            Ok(Ok(StrokeEvent::Start)) => {}
            Ok(Err(RecvError::Lagged(n))) => println!("(missed {n} stroke events)"),
            Ok(Err(RecvError::Closed)) | Err(_) => break,
        }
    }

    monitor.close().await?;
    Ok(())
}
