use anyhow::Result;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::time::Duration;

use crate::cli::SerialOpts;

/// Name of the most recently enumerated serial device. Used when the
/// host is started without an explicit `--dev`: the actuator module is
/// normally the last thing plugged in.
pub fn last_enumerated_port() -> Result<String> {
    let ports = serialport::available_ports()?;
    ports
        .last()
        .map(|p| p.port_name.clone())
        .ok_or_else(|| anyhow::anyhow!("no serial ports enumerated"))
}

pub fn open_port(dev: &str, opts: &SerialOpts) -> Result<Box<dyn SerialPort>> {
    let builder = serialport::new(dev, opts.baud)
        .timeout(Duration::from_millis(opts.read_timeout_ms))
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None);

    builder
        .open()
        .map_err(|e| anyhow::anyhow!("open {}: {}", dev, e))
}
