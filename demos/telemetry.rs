//! Telemetry Example
//!
//! This example demonstrates the core functionality of the rover protocol library:
//! - Opening a channel on a serial port
//! - Driving both tracks at a fixed throttle
//! - Reading a single parameter synchronously
//! - Logging every completed tiered report
//! - Exporting the aggregate report as JSON
//!
//! Usage:
//!   cargo run --example telemetry -- /dev/ttyUSB0
//!   cargo run --example telemetry -- COM3
//!
//! Set RUST_LOG environment variable to control logging:
//!   RUST_LOG=debug cargo run --example telemetry -- /dev/ttyUSB0
//!   RUST_LOG=rover_protocol=trace cargo run --example telemetry -- /dev/ttyUSB0

use rover_protocol::constants::MOTOR_NEUTRAL;
use rover_protocol::{ChannelConfig, ChannelEvent, Param, Result, RoverChannel, SerialConfig};
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Gentle forward throttle (neutral is 125)
const CRUISE: u8 = 140;

const DRIVE_FOR: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Default to info level if RUST_LOG is not set
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let Some(port_name) = std::env::args().nth(1) else {
        eprintln!("usage: telemetry <serial-port>");
        std::process::exit(2);
    };

    info!("Connecting to rover on {}...", port_name);
    let channel = RoverChannel::open_serial(&SerialConfig::new(port_name), ChannelConfig::default())?;
    let mut events = channel.subscribe();
    channel.open()?;

    match channel.request_param(Param::FirmwareBuild).await {
        Ok(frame) => info!("Firmware build: {}", frame.value),
        Err(e) => warn!("No firmware build reported: {}", e),
    }

    info!("=== Driving for {} seconds ===", DRIVE_FOR.as_secs());
    channel.set_low_speed_mode(true).await?;
    channel.set_both(CRUISE, CRUISE);

    let deadline = Instant::now() + DRIVE_FOR;
    loop {
        tokio::select! {
            _ = sleep_until(deadline) => break,
            event = events.recv() => match event {
                Ok(ChannelEvent::Report(report)) => {
                    info!("{:?} report: {} values", report.tier, report.len());
                }
                Ok(ChannelEvent::ReportAbandoned { tier, missing }) => {
                    warn!("{:?} report abandoned, {} values missing", tier, missing.len());
                }
                Ok(ChannelEvent::TransportError(e)) => {
                    error!("Transport error: {}", e);
                    break;
                }
                Ok(_) => {}
                Err(e) => warn!("Event stream: {}", e),
            },
        }
    }

    channel.set_both(MOTOR_NEUTRAL, MOTOR_NEUTRAL);
    // Give the writer loop a tick to send the stop command
    sleep(channel.config().tick_interval() * 2).await;

    info!("=== Last Known Values ===");
    let report = channel.last_report();
    for (param, frame) in &report.values {
        info!("{:<28} {}", param.label(), frame.value);
    }

    if let Ok(json) = serde_json::to_string_pretty(&report) {
        info!("JSON Export:");
        info!("{}", json);
    }

    channel.close().await
}
