//! Serial port handling
//!
//! Opens the rover's UART as an async byte stream for [`crate::RoverChannel`].

use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::debug;

use crate::config::SerialConfig;
use crate::constants::{DATA_BITS, PARITY, STOP_BITS};
use crate::error::Result;

/// Open and configure the port (8N1, no flow control) with stale input discarded.
///
/// Must be called from within a Tokio runtime.
pub fn open_port(config: &SerialConfig) -> Result<SerialStream> {
    let port = tokio_serial::new(&config.port_name, config.baud_rate)
        .data_bits(DATA_BITS)
        .parity(PARITY)
        .stop_bits(STOP_BITS)
        .flow_control(serialport::FlowControl::None)
        .open_native_async()?;

    port.clear(serialport::ClearBuffer::All)?;

    debug!(port = %config.port_name, baud = config.baud_rate, "serial port opened");
    Ok(port)
}
