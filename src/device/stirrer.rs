use std::time::Duration;

use crate::device::buffer::Consumer;

pub const ON_TOKEN: &str = "1";
pub const OFF_TOKEN: &str = "0";

pub const COIL_COUNT: usize = 4;

/// One full rotation of the stir bar: eight steps of per-coil duty
/// fractions (1 = on, 0.7 = partial, 0 = off).
pub const STEP_SEQUENCE: [[f64; COIL_COUNT]; 8] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.7, 0.0, 0.7, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.7, 0.7, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.7, 0.0, 0.7],
    [0.0, 0.0, 0.0, 1.0],
    [0.7, 0.0, 0.0, 0.7],
];

/// Output stage driving the four electromagnet coils.
pub trait CoilBank {
    fn drive(&mut self, levels: [f64; COIL_COUNT]);

    fn all_off(&mut self) {
        self.drive([0.0; COIL_COUNT]);
    }
}

/// Coil "driver" for running the device loop on a plain host: just
/// logs the levels when asked to.
pub struct ConsoleCoils {
    pub debug: bool,
}

impl CoilBank for ConsoleCoils {
    fn drive(&mut self, levels: [f64; COIL_COUNT]) {
        if self.debug {
            eprintln!("[dev] coils {levels:?}");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuationState {
    Ready,
    Stirring,
    Off,
    Error,
}

/// The actuation side of the device: consumes extracted lines and runs
/// the step sequence. While stirring, the inbound buffer is checked
/// only between full cycles, so reaction to the off token is bounded by
/// one cycle; checking more often would jitter the step timing.
pub struct Stirrer<B> {
    coils: B,
    state: ActuationState,
    step_delay: Duration,
}

impl<B: CoilBank> Stirrer<B> {
    pub fn new(coils: B, step_delay: Duration) -> Self {
        Self {
            coils,
            state: ActuationState::Ready,
            step_delay,
        }
    }

    pub fn state(&self) -> ActuationState {
        self.state
    }

    fn run_cycle(&mut self) {
        for step in STEP_SEQUENCE {
            self.coils.drive(step);
            if !self.step_delay.is_zero() {
                std::thread::sleep(self.step_delay);
            }
        }
    }

    fn stop(&mut self) {
        self.coils.all_off();
        self.state = ActuationState::Off;
        eprintln!("[dev] off");
    }

    /// React to one extracted line while idle. Anything that is not the
    /// on or off token is an error state, displayed and left for an
    /// operator; the device has no channel to report it upstream.
    pub fn feed(&mut self, line: &str) {
        match line {
            ON_TOKEN => {
                self.state = ActuationState::Stirring;
                eprintln!("[dev] stirring in progress");
            }
            OFF_TOKEN => self.stop(),
            other => {
                self.state = ActuationState::Error;
                eprintln!("[dev] error: unrecognized token {other:?}");
            }
        }
    }

    /// One iteration of the actuation loop: while stirring, run a full
    /// step cycle and only then look for the off token; otherwise
    /// consume at most one pending line.
    pub fn service(&mut self, input: &mut Consumer<'_>) {
        if self.state == ActuationState::Stirring {
            self.run_cycle();
            if let Some(line) = input.next_line()
                && line == OFF_TOKEN
            {
                self.stop();
            }
        } else if let Some(line) = input.next_line() {
            self.feed(&line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::buffer::RingBuffer;

    #[derive(Default)]
    struct RecordingCoils {
        frames: Vec<[f64; COIL_COUNT]>,
    }

    impl CoilBank for RecordingCoils {
        fn drive(&mut self, levels: [f64; COIL_COUNT]) {
            self.frames.push(levels);
        }
    }

    fn stirrer() -> Stirrer<RecordingCoils> {
        Stirrer::new(RecordingCoils::default(), Duration::ZERO)
    }

    #[test]
    fn on_token_starts_cycling() {
        let rb = RingBuffer::new(64);
        let (mut p, mut c) = rb.split();
        for b in b"1\n" {
            p.put(*b);
        }
        let mut s = stirrer();
        s.service(&mut c);
        assert_eq!(s.state(), ActuationState::Stirring);
        // Next service runs one full cycle before looking at the buffer.
        s.service(&mut c);
        assert_eq!(s.coils.frames, STEP_SEQUENCE.to_vec());
        assert_eq!(s.state(), ActuationState::Stirring);
    }

    #[test]
    fn off_during_stirring_zeroes_outputs() {
        let rb = RingBuffer::new(64);
        let (mut p, mut c) = rb.split();
        for b in b"1\n" {
            p.put(*b);
        }
        let mut s = stirrer();
        s.service(&mut c);
        for b in b"0\n" {
            p.put(*b);
        }
        s.service(&mut c);
        assert_eq!(s.state(), ActuationState::Off);
        assert_eq!(s.coils.frames.len(), STEP_SEQUENCE.len() + 1);
        assert_eq!(s.coils.frames.last(), Some(&[0.0; COIL_COUNT]));
    }

    #[test]
    fn off_only_observed_at_cycle_boundary() {
        let rb = RingBuffer::new(64);
        let (mut p, mut c) = rb.split();
        for b in b"1\n0\n" {
            p.put(*b);
        }
        let mut s = stirrer();
        s.service(&mut c); // enters Stirring, no cycle yet
        s.service(&mut c); // full cycle, then the off token lands
        assert_eq!(s.state(), ActuationState::Off);
        assert_eq!(s.coils.frames.len(), STEP_SEQUENCE.len() + 1);
    }

    #[test]
    fn non_off_lines_ignored_while_stirring() {
        let rb = RingBuffer::new(64);
        let (mut p, mut c) = rb.split();
        for b in b"1\nX\n" {
            p.put(*b);
        }
        let mut s = stirrer();
        s.service(&mut c);
        s.service(&mut c);
        assert_eq!(s.state(), ActuationState::Stirring);
    }

    #[test]
    fn off_while_idle() {
        let rb = RingBuffer::new(64);
        let (mut p, mut c) = rb.split();
        for b in b"0\n" {
            p.put(*b);
        }
        let mut s = stirrer();
        s.service(&mut c);
        assert_eq!(s.state(), ActuationState::Off);
        assert_eq!(s.coils.frames, vec![[0.0; COIL_COUNT]]);
    }

    #[test]
    fn unknown_token_is_error_state() {
        let rb = RingBuffer::new(64);
        let (mut p, mut c) = rb.split();
        for b in b"X\n" {
            p.put(*b);
        }
        let mut s = stirrer();
        s.service(&mut c);
        assert_eq!(s.state(), ActuationState::Error);
        // Display-only: no coil activity.
        assert!(s.coils.frames.is_empty());
    }

    #[test]
    fn empty_buffer_keeps_state() {
        let rb = RingBuffer::new(16);
        let (_p, mut c) = rb.split();
        let mut s = stirrer();
        s.service(&mut c);
        assert_eq!(s.state(), ActuationState::Ready);
    }
}
