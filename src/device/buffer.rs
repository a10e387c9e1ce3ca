use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Fixed-capacity circular byte store shared between the ingest task
/// and the actuation loop. `next_in == next_out` means empty; full is
/// indistinguishable from empty, and an overrunning producer silently
/// overwrites (size the capacity for the consumer's cadence).
///
/// No lock: the producer half alone advances `next_in`, the consumer
/// half alone advances `next_out`. Index words are atomics so the two
/// halves may live on different threads. Strictly single-producer /
/// single-consumer; call `split` once.
pub struct RingBuffer {
    store: Box<[AtomicU8]>,
    next_in: AtomicUsize,
    next_out: AtomicUsize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 2, "ring buffer needs at least two slots");
        Self {
            store: (0..capacity).map(|_| AtomicU8::new(0)).collect(),
            next_in: AtomicUsize::new(0),
            next_out: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.store.len()
    }

    pub fn split(&self) -> (Producer<'_>, Consumer<'_>) {
        (Producer { rb: self }, Consumer { rb: self })
    }
}

/// Write half: owned by the ingest task.
pub struct Producer<'a> {
    rb: &'a RingBuffer,
}

impl Producer<'_> {
    pub fn put(&mut self, byte: u8) {
        let rb = self.rb;
        let i = rb.next_in.load(Ordering::Relaxed);
        rb.store[i].store(byte, Ordering::Relaxed);
        rb.next_in
            .store((i + 1) % rb.capacity(), Ordering::Release);
    }
}

/// Read half: owned by the actuation loop.
pub struct Consumer<'a> {
    rb: &'a RingBuffer,
}

impl Consumer<'_> {
    pub fn is_empty(&self) -> bool {
        self.rb.next_out.load(Ordering::Relaxed) == self.rb.next_in.load(Ordering::Acquire)
    }

    /// Pop a single byte. Only used in byte ingestion mode.
    pub fn next_byte(&mut self) -> Option<u8> {
        let rb = self.rb;
        let out = rb.next_out.load(Ordering::Relaxed);
        if out == rb.next_in.load(Ordering::Acquire) {
            return None;
        }
        let byte = rb.store[out].load(Ordering::Relaxed);
        rb.next_out
            .store((out + 1) % rb.capacity(), Ordering::Release);
        Some(byte)
    }

    /// Extract one complete LF-terminated line, CR and LF stripped.
    ///
    /// Two passes: first scan for the LF without consuming, so a
    /// partial line leaves `next_out` untouched and the call is safe to
    /// repeat; only once a terminator is known to exist are the bytes
    /// consumed.
    pub fn next_line(&mut self) -> Option<String> {
        let rb = self.rb;
        let cap = rb.capacity();
        let next_in = rb.next_in.load(Ordering::Acquire);
        let mut out = rb.next_out.load(Ordering::Relaxed);
        if out == next_in {
            return None;
        }

        let mut n = out;
        while n != next_in {
            if rb.store[n].load(Ordering::Relaxed) == b'\n' {
                break;
            }
            n = (n + 1) % cap;
        }
        if n == next_in {
            // Partial line; wait for more bytes.
            return None;
        }

        let stop = (n + 1) % cap;
        let mut line = Vec::new();
        while out != stop {
            let byte = rb.store[out].load(Ordering::Relaxed);
            out = (out + 1) % cap;
            if byte != b'\r' && byte != b'\n' {
                line.push(byte);
            }
        }
        rb.next_out.store(out, Ordering::Release);
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(producer: &mut Producer<'_>, bytes: &[u8]) {
        for &b in bytes {
            producer.put(b);
        }
    }

    #[test]
    fn fifo_order_preserved() {
        let rb = RingBuffer::new(64);
        let (mut p, mut c) = rb.split();
        let input: Vec<u8> = (0..40).collect();
        fill(&mut p, &input);
        let output: Vec<u8> = std::iter::from_fn(|| c.next_byte()).collect();
        assert_eq!(output, input);
        assert!(c.is_empty());
    }

    #[test]
    fn indices_wrap_around() {
        let rb = RingBuffer::new(8);
        let (mut p, mut c) = rb.split();
        // Push the indices past the wrap point a few times.
        for round in 0u8..4 {
            fill(&mut p, &[round, round + 10, b'\n']);
            assert_eq!(c.next_line().unwrap().len(), 2);
        }
    }

    #[test]
    fn line_extraction_leaves_trailing_bytes() {
        let rb = RingBuffer::new(64);
        let (mut p, mut c) = rb.split();
        fill(&mut p, b"OFF\r\nNEXT");
        assert_eq!(c.next_line().as_deref(), Some("OFF"));
        // "NEXT" has no terminator yet.
        assert_eq!(c.next_line(), None);
        p.put(b'\n');
        assert_eq!(c.next_line().as_deref(), Some("NEXT"));
    }

    #[test]
    fn partial_line_not_consumed() {
        let rb = RingBuffer::new(64);
        let (mut p, mut c) = rb.split();
        fill(&mut p, b"PART");
        assert_eq!(c.next_line(), None);
        assert_eq!(c.next_line(), None);
        assert!(!c.is_empty());
        // All four bytes still there once the terminator lands.
        fill(&mut p, b"IAL\n");
        assert_eq!(c.next_line().as_deref(), Some("PARTIAL"));
    }

    #[test]
    fn crlf_and_bare_lf_both_stripped() {
        let rb = RingBuffer::new(64);
        let (mut p, mut c) = rb.split();
        fill(&mut p, b"1\r\n0\n");
        assert_eq!(c.next_line().as_deref(), Some("1"));
        assert_eq!(c.next_line().as_deref(), Some("0"));
        assert!(c.is_empty());
    }

    #[test]
    fn empty_line_is_empty_string() {
        let rb = RingBuffer::new(16);
        let (mut p, mut c) = rb.split();
        fill(&mut p, b"\r\n");
        assert_eq!(c.next_line().as_deref(), Some(""));
    }

    #[test]
    fn concurrent_producer_consumer() {
        let rb = RingBuffer::new(4096);
        let (mut p, mut c) = rb.split();
        std::thread::scope(|s| {
            s.spawn(move || {
                for i in 0..100u32 {
                    for b in format!("{i}\n").bytes() {
                        p.put(b);
                    }
                }
            });
            let mut seen = 0u32;
            while seen < 100 {
                if let Some(line) = c.next_line() {
                    assert_eq!(line, seen.to_string());
                    seen += 1;
                }
            }
        });
    }
}
