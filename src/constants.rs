//! Protocol constants for rover serial communication.
//!
//! This module defines the constants used by the rover's UART protocol,
//! including frame markers, mode flags, timing defaults, and serial port configuration.

/// Start marker opening every outbound frame
pub const START_BYTE: u8 = 0xFD;

/// Mode byte for a plain motor command
pub const MODE_NONE: u8 = 0;

/// Mode byte asking the rover to report one parameter
pub const REQUEST_FLAG: u8 = 10;

/// Mode byte toggling the rover's low speed mode
pub const LOW_SPEED_MODE_FLAG: u8 = 240;

/// Throttle byte for a stopped motor
pub const MOTOR_NEUTRAL: u8 = 125;

/// Flipper byte for a stationary flipper
pub const FLIPPER_NEUTRAL: u8 = 125;

/// Length of an outbound command/request frame
pub const OUTBOUND_FRAME_LEN: usize = 7;

/// Length of an inbound response frame
pub const INBOUND_FRAME_LEN: usize = 5;

/// Baud rate (57600 bps)
pub const BAUD_RATE: u32 = 57_600;

/// Stop bits configuration
pub const STOP_BITS: serialport::StopBits = serialport::StopBits::One;

/// Data bits configuration
pub const DATA_BITS: serialport::DataBits = serialport::DataBits::Eight;

/// Parity configuration
pub const PARITY: serialport::Parity = serialport::Parity::None;

/// Interval between writer loop ticks
pub const TICK_INTERVAL_MS: u64 = 50;

/// Minimum spacing between fast-tier reports
pub const FAST_INTERVAL_MS: u64 = 50;

/// Minimum spacing between medium-tier reports
pub const MEDIUM_INTERVAL_MS: u64 = 500;

/// Minimum spacing between slow-tier reports
pub const SLOW_INTERVAL_MS: u64 = 2000;

/// How long a synchronous parameter request waits for its answer
pub const REQUEST_TIMEOUT_MS: u64 = 1000;

/// How long an in-flight report may stay incomplete before it is abandoned
pub const REPORT_TIMEOUT_MS: u64 = 1000;

/// Buffered events per subscriber before the slowest one starts lagging
pub const EVENT_CAPACITY: usize = 64;
