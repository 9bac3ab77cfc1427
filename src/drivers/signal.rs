//! Signal drivers: turn a [`DshotFrame`] into a timed waveform on one line.
//!
//! Two strategies share the [`SignalDriver`] trait:
//! - [`BitBangDriver`] busy-waits every pulse on the CPU.
//! - [`WaveformDriver`] hands padded words to a hardware waveform generator.

use embedded_hal::digital::OutputPin;

use crate::drivers::dshot::{DshotFrame, DshotSpeed};
use crate::error::{Error, Result};

pub trait SignalDriver {
    /// Emits all 16 bits back-to-back.
    fn send_frame(&mut self, frame: DshotFrame) -> Result<()>;
}

// ── Busy-wait strategy ────────────────────────────────────────────────────────

/// Tick-accurate busy waiting.
pub trait TickDelay {
    fn delay_ticks(&mut self, ticks: u32);

    /// Runs a whole frame without being preempted. The default does no
    /// masking; target implementations disable interrupts on their core.
    fn without_preemption<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        f(self)
    }
}

/// High/low hold times of a single bit, in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitTiming {
    pub t1h: u32,
    pub t1l: u32,
    pub t0h: u32,
    pub t0l: u32,
}

impl BitTiming {
    /// A one is high for 3/4 of the bit, a zero for 3/8. The period is
    /// rounded up so both bit values last exactly the same number of ticks.
    pub const fn for_speed(speed: DshotSpeed, tick_hz: u32) -> Self {
        let rate = speed.bit_rate() as u64;
        let tick_hz = tick_hz as u64;
        let period = (tick_hz + rate - 1) / rate;
        let t1h = (tick_hz * 3 + rate * 2) / (rate * 4);
        let t0h = (tick_hz * 3 + rate * 4) / (rate * 8);
        Self {
            t1h: t1h as u32,
            t1l: (period - t1h) as u32,
            t0h: t0h as u32,
            t0l: (period - t0h) as u32,
        }
    }

    pub const fn period(&self) -> u32 {
        self.t1h + self.t1l
    }

    /// High-time boundary between a zero and a one.
    pub const fn decode_threshold(&self) -> u32 {
        (self.t0h + self.t1h) / 2
    }

    /// Distance from the threshold to the closer of the two high times.
    /// Zero when a one is not longer than a zero.
    pub const fn margin(&self) -> u32 {
        if self.t0h >= self.t1h {
            return 0;
        }
        let threshold = self.decode_threshold();
        let below = threshold - self.t0h;
        let above = self.t1h - threshold;
        if below < above {
            below
        } else {
            above
        }
    }

    pub const fn tolerates(&self, jitter_ticks: u32) -> bool {
        self.t0h + self.t0l == self.t1h + self.t1l
            && self.t0h < self.t1h
            && self.margin() >= jitter_ticks
    }

    /// Reads a bit back from a measured high time.
    pub const fn classify(&self, high_ticks: u32) -> bool {
        high_ticks > self.decode_threshold()
    }
}

/// Cycle-counted delay on the running Cortex-M core. Masking only affects
/// the local core, so the other core keeps running its own loop.
#[cfg(feature = "rp2040")]
pub struct CortexMTicks;

#[cfg(feature = "rp2040")]
impl TickDelay for CortexMTicks {
    fn delay_ticks(&mut self, ticks: u32) {
        cortex_m::asm::delay(ticks);
    }

    fn without_preemption<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        cortex_m::interrupt::free(|_| f(self))
    }
}

pub struct BitBangDriver<P, C> {
    pin: P,
    clock: C,
    timing: BitTiming,
}

impl<P: OutputPin, C: TickDelay> BitBangDriver<P, C> {
    pub fn new(mut pin: P, clock: C, timing: BitTiming) -> Self {
        let _ = pin.set_low();
        Self { pin, clock, timing }
    }

    pub fn timing(&self) -> BitTiming {
        self.timing
    }
}

impl<P: OutputPin, C: TickDelay> SignalDriver for BitBangDriver<P, C> {
    fn send_frame(&mut self, frame: DshotFrame) -> Result<()> {
        let timing = self.timing;
        let pin = &mut self.pin;
        self.clock.without_preemption(|clock| -> Result<()> {
            for i in 0..16 {
                let (high, low) = if frame.bit(i) {
                    (timing.t1h, timing.t1l)
                } else {
                    (timing.t0h, timing.t0l)
                };

                pin.set_high().map_err(|_| Error::Pin)?;
                clock.delay_ticks(high);
                pin.set_low().map_err(|_| Error::Pin)?;
                clock.delay_ticks(low);
            }
            Ok(())
        })
    }
}

// ── Hardware waveform strategy ────────────────────────────────────────────────

/// Input queue of a hardware waveform generator.
pub trait WaveformFifo {
    fn push_word(&mut self, word: u32) -> Result<()>;
}

pub struct WaveformDriver<F> {
    fifo: F,
}

impl<F: WaveformFifo> WaveformDriver<F> {
    pub fn new(fifo: F) -> Self {
        Self { fifo }
    }
}

impl<F: WaveformFifo> SignalDriver for WaveformDriver<F> {
    fn send_frame(&mut self, frame: DshotFrame) -> Result<()> {
        // The generator shifts left and autopulls after 16 bits, so the frame
        // sits in the upper half of the word.
        self.fifo.push_word((frame.raw() as u32) << 16)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use core::convert::Infallible;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::vec::Vec;

    use super::*;

    /// Virtual tick counter shared by the pin and the delay.
    #[derive(Clone, Default)]
    pub struct Trace {
        now: Rc<RefCell<u64>>,
        edges: Rc<RefCell<Vec<(u64, bool)>>>,
        /// Extra ticks added to every delay, alternating sign.
        jitter: Rc<RefCell<i64>>,
        masked: Rc<RefCell<u32>>,
    }

    impl Trace {
        pub fn with_jitter(jitter: i64) -> Self {
            let trace = Self::default();
            *trace.jitter.borrow_mut() = jitter;
            trace
        }

        pub fn pin(&self) -> TracePin {
            TracePin(self.clone())
        }

        pub fn clock(&self) -> TraceClock {
            TraceClock(self.clone())
        }

        pub fn masked_frames(&self) -> u32 {
            *self.masked.borrow()
        }

        /// High-pulse widths in ticks, in order.
        pub fn high_pulses(&self) -> Vec<u32> {
            let edges = self.edges.borrow();
            let mut pulses = Vec::new();
            let mut rose_at = None;
            for &(at, level) in edges.iter() {
                match (level, rose_at) {
                    (true, None) => rose_at = Some(at),
                    (false, Some(start)) => {
                        pulses.push((at - start) as u32);
                        rose_at = None;
                    }
                    _ => {}
                }
            }
            pulses
        }

        /// Tick of every rising edge.
        pub fn rising_edges(&self) -> Vec<u64> {
            self.edges
                .borrow()
                .iter()
                .filter(|(_, level)| *level)
                .map(|(at, _)| *at)
                .collect()
        }

        pub fn level(&self) -> Option<bool> {
            self.edges.borrow().last().map(|(_, level)| *level)
        }
    }

    pub struct TracePin(Trace);

    impl embedded_hal::digital::ErrorType for TracePin {
        type Error = Infallible;
    }

    impl OutputPin for TracePin {
        fn set_low(&mut self) -> core::result::Result<(), Infallible> {
            let now = *self.0.now.borrow();
            self.0.edges.borrow_mut().push((now, false));
            Ok(())
        }

        fn set_high(&mut self) -> core::result::Result<(), Infallible> {
            let now = *self.0.now.borrow();
            self.0.edges.borrow_mut().push((now, true));
            Ok(())
        }
    }

    pub struct TraceClock(Trace);

    impl TickDelay for TraceClock {
        fn delay_ticks(&mut self, ticks: u32) {
            let mut jitter = self.0.jitter.borrow_mut();
            let actual = (ticks as i64 + *jitter).max(0) as u64;
            *jitter = -*jitter;
            *self.0.now.borrow_mut() += actual;
        }

        fn without_preemption<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
            *self.0.masked.borrow_mut() += 1;
            f(self)
        }
    }

    /// FIFO with a fixed depth that records every accepted word.
    pub struct RecordingFifo {
        pub words: Rc<RefCell<Vec<u32>>>,
        pub depth: usize,
    }

    impl RecordingFifo {
        pub fn new(depth: usize) -> Self {
            Self { words: Rc::new(RefCell::new(Vec::new())), depth }
        }
    }

    impl WaveformFifo for RecordingFifo {
        fn push_word(&mut self, word: u32) -> Result<()> {
            let mut words = self.words.borrow_mut();
            if words.len() >= self.depth {
                return Err(Error::FifoFull);
            }
            words.push(word);
            Ok(())
        }
    }
}
