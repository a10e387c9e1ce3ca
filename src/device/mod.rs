use anyhow::{Context, Result};
use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::cli::DeviceOpts;
use crate::port::{last_enumerated_port, open_port};

pub mod buffer;
pub mod stirrer;

use buffer::{Consumer, Producer, RingBuffer};
use stirrer::{ActuationState, ConsoleCoils, Stirrer};

/// Receiver task: blocks for one byte at a time and appends it to the
/// ring buffer. Runs until the input source ends or `stop` is observed
/// at an iteration boundary; termination is cooperative, a blocking
/// read in flight must first return (the transport timeout bounds
/// that).
pub fn run_ingest(mut source: impl Read, mut producer: Producer<'_>, stop: &AtomicBool, echo: bool) {
    let mut byte = [0u8; 1];
    loop {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        match source.read(&mut byte) {
            Ok(0) => break, // input source closed
            Ok(_) => {
                producer.put(byte[0]);
                if echo {
                    eprint!("{}", byte[0] as char);
                }
            }
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::Interrupted => {
                continue;
            }
            Err(e) => {
                eprintln!("[rx] ingest error: {e}");
                break;
            }
        }
    }
}

/// Byte ingestion mode: no line framing, each byte handled as it
/// arrives. The off token ends the run.
fn run_byte_loop(input: &mut Consumer<'_>, poll: Duration) {
    loop {
        if input.is_empty() {
            std::thread::sleep(poll);
            continue;
        }
        match input.next_byte() {
            Some(b'1') => eprintln!("[dev] one"),
            Some(b'0') => {
                eprintln!("[dev] zero");
                break;
            }
            Some(other) => eprintln!("[dev] received byte {other:#04x}"),
            None => {}
        }
    }
}

pub fn run(opts: DeviceOpts) -> Result<()> {
    let dev = match &opts.ser.dev {
        Some(d) => d.clone(),
        None => last_enumerated_port()?,
    };
    let port = open_port(&dev, &opts.ser).with_context(|| format!("opening device side on {dev}"))?;
    eprintln!("[dev] listening on {} at {} baud", dev, opts.ser.baud);

    let ring = RingBuffer::new(opts.buffer_size);
    let (producer, mut consumer) = ring.split();
    let stop = AtomicBool::new(false);
    let poll = Duration::from_millis(opts.poll_ms);
    let step_delay = Duration::from_millis(opts.step_delay_ms);

    std::thread::scope(|s| {
        s.spawn(|| run_ingest(port, producer, &stop, opts.echo));

        if opts.byte_mode {
            run_byte_loop(&mut consumer, poll);
            stop.store(true, Ordering::Relaxed);
        } else {
            let mut stirrer = Stirrer::new(ConsoleCoils { debug: opts.debug }, step_delay);
            eprintln!("[dev] ready");
            loop {
                stirrer.service(&mut consumer);
                if stirrer.state() != ActuationState::Stirring {
                    std::thread::sleep(poll);
                }
            }
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn ingest_fills_buffer_until_source_ends() {
        let ring = RingBuffer::new(64);
        let (producer, mut consumer) = ring.split();
        let stop = AtomicBool::new(false);
        run_ingest(Cursor::new(b"1\n0\n".to_vec()), producer, &stop, false);
        assert_eq!(consumer.next_line().as_deref(), Some("1"));
        assert_eq!(consumer.next_line().as_deref(), Some("0"));
        assert!(consumer.is_empty());
    }

    #[test]
    fn ingest_observes_stop_flag() {
        let ring = RingBuffer::new(64);
        let (producer, consumer) = ring.split();
        let stop = AtomicBool::new(true);
        run_ingest(Cursor::new(b"data".to_vec()), producer, &stop, false);
        assert!(consumer.is_empty());
    }

    /// Timeouts from the transport must not end the task; only EOF,
    /// errors or the stop flag do.
    #[test]
    fn ingest_rides_through_timeouts() {
        struct Stutter {
            bytes: Vec<u8>,
            pos: usize,
            timeouts: usize,
        }
        impl Read for Stutter {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if self.timeouts > 0 {
                    self.timeouts -= 1;
                    return Err(std::io::Error::from(ErrorKind::TimedOut));
                }
                if self.pos == self.bytes.len() {
                    return Ok(0);
                }
                buf[0] = self.bytes[self.pos];
                self.pos += 1;
                self.timeouts = 2;
                Ok(1)
            }
        }

        let ring = RingBuffer::new(64);
        let (producer, mut consumer) = ring.split();
        let stop = AtomicBool::new(false);
        let source = Stutter {
            bytes: b"0\n".to_vec(),
            pos: 0,
            timeouts: 3,
        };
        run_ingest(source, producer, &stop, false);
        assert_eq!(consumer.next_line().as_deref(), Some("0"));
    }
}
