use serialport::{ClearBuffer, SerialPort};
use std::io::{self, Read, Write};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::cli::SerialOpts;
use crate::port::{last_enumerated_port, open_port};
use crate::proto::error::ProtoError;

/// Settle delay after opening the link and after each frame write,
/// matching the device's command turnaround.
const SETTLE: Duration = Duration::from_millis(100);

/// What the host needs from a transport: byte I/O plus visibility and
/// control over the inbound buffer. Implemented for real serial ports
/// and by in-memory fakes in the dispatcher tests.
pub trait WirePort: Read + Write + Send {
    fn bytes_to_read(&mut self) -> io::Result<u32>;
    fn clear_input(&mut self) -> io::Result<()>;
}

struct SerialWire(Box<dyn SerialPort>);

impl Read for SerialWire {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for SerialWire {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl WirePort for SerialWire {
    fn bytes_to_read(&mut self) -> io::Result<u32> {
        self.0.bytes_to_read().map_err(io::Error::other)
    }
    fn clear_input(&mut self) -> io::Result<()> {
        self.0.clear(ClearBuffer::Input).map_err(io::Error::other)
    }
}

/// The host end of the link. One exclusive lock guards the transport so
/// the write of one frame and the read of its response can never
/// interleave with another logical command.
pub struct Connection {
    wire: Option<Mutex<Box<dyn WirePort>>>,
    port_name: Option<String>,
    settle: Duration,
}

impl Connection {
    /// `settle` is the post-open and post-write delay; tests pass zero,
    /// real links want [`Default::default`].
    pub fn new(settle: Duration) -> Self {
        Self {
            wire: None,
            port_name: None,
            settle,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.wire.is_some()
    }

    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    /// Open the serial link. Falls back to the most recently enumerated
    /// port when `--dev` was not given. Connecting twice is a warning,
    /// not an error.
    pub fn connect(&mut self, opts: &SerialOpts) -> Result<(), ProtoError> {
        if self.is_connected() {
            eprintln!("[link] warning: already connected, ignoring connect");
            return Ok(());
        }
        let dev = match &opts.dev {
            Some(d) => d.clone(),
            None => last_enumerated_port().map_err(|e| ProtoError::Connection(e.to_string()))?,
        };
        let port = open_port(&dev, opts).map_err(|e| ProtoError::Connection(e.to_string()))?;
        self.port_name = Some(dev);
        self.wire = Some(Mutex::new(Box::new(SerialWire(port))));
        // Let the device finish any reset chatter, then drop it.
        std::thread::sleep(self.settle);
        self.reset_buffer()?;
        Ok(())
    }

    /// Wire in a non-serial transport (in-memory fakes, pipes).
    pub fn attach(&mut self, wire: Box<dyn WirePort>) {
        if self.is_connected() {
            eprintln!("[link] warning: already connected, ignoring attach");
            return;
        }
        self.wire = Some(Mutex::new(wire));
    }

    pub fn disconnect(&mut self) {
        if self.wire.take().is_none() {
            eprintln!("[link] warning: not connected, nothing to disconnect");
        }
        self.port_name = None;
    }

    fn lock(&self) -> Result<MutexGuard<'_, Box<dyn WirePort>>, ProtoError> {
        let wire = self.wire.as_ref().ok_or(ProtoError::NotConnected)?;
        wire.lock()
            .map_err(|_| ProtoError::Connection("link lock poisoned".into()))
    }

    /// Discard any stale inbound bytes.
    pub fn reset_buffer(&self) -> Result<(), ProtoError> {
        self.lock()?.clear_input()?;
        Ok(())
    }

    /// Write one encoded frame, then give the device its turnaround
    /// time before anything else touches the wire.
    pub fn write_frame(&self, frame: &str) -> Result<(), ProtoError> {
        {
            let mut wire = self.lock()?;
            wire.write_all(frame.as_bytes())?;
            wire.flush()?;
        }
        std::thread::sleep(self.settle);
        Ok(())
    }

    pub fn available(&self) -> Result<bool, ProtoError> {
        Ok(self.lock()?.bytes_to_read()? > 0)
    }

    /// Read one LF-terminated line, then clear whatever trailed it so a
    /// stale partial frame cannot corrupt the next parse.
    pub fn read_line(&self) -> Result<String, ProtoError> {
        let mut wire = self.lock()?;
        let mut line = String::new();
        let mut byte = [0u8; 1];
        loop {
            match wire.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    line.push(byte[0] as char);
                    if byte[0] == b'\n' {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        wire.clear_input()?;
        Ok(line)
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new(SETTLE)
    }
}
