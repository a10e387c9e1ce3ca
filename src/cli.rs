use anyhow::bail;
use clap::{Args, Parser, Subcommand};

use crate::proto::frame::Payload;

#[derive(Parser, Debug, Clone)]
#[command(name = "stirlink", about = "Serial control link for the stirrer module (host/device)")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Cmd {
    /// Send one framed command and print the decoded response
    Host(HostOpts),
    /// Run the device side: byte ingest plus the actuation loop
    Device(DeviceOpts),
}

#[derive(Args, Debug, Clone)]
pub struct SerialOpts {
    /// Serial device path (default: most recently enumerated port)
    #[arg(long)]
    pub dev: Option<String>,
    /// Baud rate
    #[arg(long, default_value_t = 9_600)]
    pub baud: u32,
    /// Per-read timeout in milliseconds
    #[arg(long, default_value_t = 100)]
    pub read_timeout_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct HostOpts {
    #[command(flatten)]
    pub ser: SerialOpts,
    /// Single-character command opcode
    #[arg(long)]
    pub op: char,
    /// Numeric payload (set command)
    #[arg(long)]
    pub num: Option<i64>,
    /// String payload (set command)
    #[arg(long)]
    pub text: Option<String>,
    /// Send as a query (no payload)
    #[arg(long, default_value_t = false)]
    pub query: bool,
    /// Busy-wait budget in seconds before giving up on dispatch
    #[arg(long, default_value_t = 5.0)]
    pub busy_timeout: f64,
    /// Print each frame as it goes over the wire
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}

impl HostOpts {
    /// Fold the three mutually-exclusive payload flags into the typed
    /// payload variant.
    pub fn payload(&self) -> anyhow::Result<Payload> {
        match (self.query, &self.num, &self.text) {
            (true, None, None) => Ok(Payload::Absent),
            (false, Some(v), None) => Ok(Payload::Integer(*v)),
            (false, None, Some(s)) => Ok(Payload::Text(s.clone())),
            _ => bail!("pass exactly one of --num, --text, --query"),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct DeviceOpts {
    #[command(flatten)]
    pub ser: SerialOpts,
    /// Echo each ingested byte back out (serial console style)
    #[arg(long, default_value_t = false)]
    pub echo: bool,
    /// Ingest single bytes instead of LF-terminated lines
    #[arg(long, default_value_t = false)]
    pub byte_mode: bool,
    /// Delay between step-sequence steps in milliseconds
    #[arg(long, default_value_t = 30)]
    pub step_delay_ms: u64,
    /// Idle polling cadence in milliseconds
    #[arg(long, default_value_t = 100)]
    pub poll_ms: u64,
    /// Inbound ring buffer capacity in bytes
    #[arg(long, default_value_t = 1024)]
    pub buffer_size: usize,
    /// Print state transitions and coil levels
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}
