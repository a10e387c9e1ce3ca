use std::time::{Duration, Instant};

use crate::link::Connection;
use crate::proto::STATUS_OPCODE;
use crate::proto::error::ProtoError;
use crate::proto::frame::{Command, Payload, Response, decode_response};

/// Poll cadences and budgets for one dispatch. The busy budget is the
/// caller's per-dispatch argument; the read budget is fixed and much
/// shorter, since a ready device answers within one turnaround.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub busy_poll: Duration,
    pub response_poll: Duration,
    pub read_budget: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            busy_poll: Duration::from_millis(200),
            response_poll: Duration::from_millis(100),
            read_budget: Duration::from_secs(1),
        }
    }
}

/// Synchronous command dispatcher: busy-wait, write, bounded read,
/// classify. One in-flight command at a time; timeouts are cooperative,
/// checked between poll iterations.
pub struct Dispatcher {
    conn: Connection,
    timing: Timing,
    pub debug: bool,
}

impl Dispatcher {
    pub fn new(conn: Connection) -> Self {
        Self::with_timing(conn, Timing::default())
    }

    pub fn with_timing(conn: Connection, timing: Timing) -> Self {
        Self {
            conn,
            timing,
            debug: false,
        }
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Send one command and return its decoded, validated response.
    /// The command frame is only written once the device reports
    /// not-busy within `busy_timeout`.
    pub fn dispatch(&self, cmd: &Command, busy_timeout: Duration) -> Result<Response, ProtoError> {
        self.wait_ready(busy_timeout)?;
        let resp = classify(self.exchange(cmd)?)?;
        let sent = cmd.opcode.to_ascii_uppercase();
        if resp.opcode != sent {
            return Err(ProtoError::Desync {
                sent,
                got: resp.opcode,
            });
        }
        Ok(resp)
    }

    /// One status query; the device answers 1 while it cannot accept a
    /// new command.
    fn check_busy(&self) -> Result<bool, ProtoError> {
        let resp = classify(self.exchange(&Command::query(STATUS_OPCODE))?)?;
        Ok(resp.payload == Payload::Integer(1))
    }

    fn wait_ready(&self, budget: Duration) -> Result<(), ProtoError> {
        let start = Instant::now();
        loop {
            if !self.check_busy()? {
                return Ok(());
            }
            if start.elapsed() > budget {
                return Err(ProtoError::BusyTimeout(budget));
            }
            std::thread::sleep(self.timing.busy_poll);
        }
    }

    /// Write one frame, poll for the response within the read budget,
    /// read and decode it. Residual input is cleared by `read_line`.
    fn exchange(&self, cmd: &Command) -> Result<Response, ProtoError> {
        let frame = cmd.encode();
        if self.debug {
            eprintln!("[host] -> {}", frame.trim_end());
        }
        self.conn.write_frame(&frame)?;

        let start = Instant::now();
        while !self.conn.available()? {
            if start.elapsed() > self.timing.read_budget {
                return Err(ProtoError::NoResponse);
            }
            std::thread::sleep(self.timing.response_poll);
        }

        let line = self.conn.read_line()?;
        if self.debug {
            eprintln!("[host] <- {}", line.trim_end());
        }
        decode_response(&line)
    }
}

/// Map device-reported error responses onto the typed taxonomy. Payload
/// 0 means the opcode was not recognized, 1 means it was understood but
/// refused.
pub fn classify(resp: Response) -> Result<Response, ProtoError> {
    if !resp.is_error() {
        return Ok(resp);
    }
    match resp.payload {
        Payload::Integer(0) => Err(ProtoError::InvalidCommand),
        Payload::Integer(1) => Err(ProtoError::CannotExecute),
        _ => Err(ProtoError::MalformedResponse(format!("{resp:?}"))),
    }
}
