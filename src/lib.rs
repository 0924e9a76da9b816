//! # Rover Protocol Library
//!
//! A Rust client driver for tracked rovers controlled over a serial link with a small
//! binary protocol: 7-byte command/request frames out, 5-byte telemetry frames in.
//!
//! ## Features
//!
//! - Continuously stream motor throttle commands so the rover never stalls
//! - Poll telemetry registers in fast, medium and slow tiers, interleaved with commands
//! - Correlate replies with synchronous `request_param` callers and in-flight reports
//! - Keep the last known value of every parameter in an aggregate report
//! - Publish frames, reports and transport errors to any number of subscribers
//!
//! ## Example
//!
//! ```no_run
//! use rover_protocol::{ChannelConfig, ChannelEvent, RoverChannel, SerialConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let channel = RoverChannel::open_serial(&SerialConfig::new("/dev/ttyUSB0"), ChannelConfig::default())?;
//!     let mut events = channel.subscribe();
//!     channel.open()?;
//!
//!     while let Ok(event) = events.recv().await {
//!         if let ChannelEvent::Report(report) = event {
//!             println!("{:?} report with {} values", report.tier, report.len());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod report;
pub mod serial;
pub mod types;

pub use channel::{ChannelEvent, ChannelState, RoverChannel};
pub use config::{ChannelConfig, SerialConfig};
pub use error::{Result, RoverError};
pub use report::{Report, ReportAssembler};
pub use types::*;
