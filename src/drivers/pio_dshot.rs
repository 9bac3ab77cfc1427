//! DShot waveform generator on one RP2040 PIO state machine.
//!
//! Every bit takes 8 PIO cycles: high for 6 on a one, 3 on a zero. The state
//! machine autopulls 16 bits at a time, shifting left, so callers push the
//! frame in the upper half of the word.

use embassy_rp::clocks::clk_sys_freq;
use embassy_rp::pio::{
    Common, Config, Direction, FifoJoin, Instance, LoadedProgram, PioPin, ShiftConfig,
    ShiftDirection, StateMachine,
};
use fixed::types::U24F8;

use crate::drivers::dshot::DshotSpeed;
use crate::drivers::signal::WaveformFifo;
use crate::error::{Error, Result};

/// The program, loaded once and shared by every motor on the block.
pub struct DshotProgram<'d, P: Instance> {
    prg: LoadedProgram<'d, P>,
}

impl<'d, P: Instance> DshotProgram<'d, P> {
    pub fn load(common: &mut Common<'d, P>) -> Self {
        let prg = pio_proc::pio_asm!(
            r#"
            .side_set 1
            .wrap_target
            start:
                out x, 1        side 0 [1]
                jmp !x zero     side 1 [2]
                jmp start       side 1 [2]
            zero:
                jmp start       side 0 [2]
            .wrap
            "#
        );

        Self { prg: common.load_program(&prg.program) }
    }
}

pub struct PioDshot<'d, P: Instance, const SM: usize> {
    sm: StateMachine<'d, P, SM>,
}

impl<'d, P: Instance, const SM: usize> PioDshot<'d, P, SM> {
    pub fn new(
        common: &mut Common<'d, P>,
        mut sm: StateMachine<'d, P, SM>,
        program: &DshotProgram<'d, P>,
        pin: impl PioPin,
        speed: DshotSpeed,
    ) -> Self {
        let pin = common.make_pio_pin(pin);
        sm.set_pin_dirs(Direction::Out, &[&pin]);

        let mut cfg = Config::default();
        cfg.use_program(&program.prg, &[&pin]);
        cfg.clock_divider = clock_divider(clk_sys_freq(), speed);
        cfg.shift_out = ShiftConfig {
            threshold: 16,
            direction: ShiftDirection::Left,
            auto_fill: true,
        };
        cfg.fifo_join = FifoJoin::TxOnly;

        sm.set_config(&cfg);
        sm.set_enable(true);

        log_info!(
            "PIO DShot SM{} at {} Hz, {} ns per frame",
            SM,
            speed.pio_clock_hz(),
            speed.frame_time_ns()
        );
        Self { sm }
    }
}

impl<'d, P: Instance, const SM: usize> WaveformFifo for PioDshot<'d, P, SM> {
    fn push_word(&mut self, word: u32) -> Result<()> {
        if self.sm.tx().try_push(word) {
            Ok(())
        } else {
            Err(Error::FifoFull)
        }
    }
}

/// sys_clk / (bit rate × 8) in 24.8 fixed point.
fn clock_divider(sys_hz: u32, speed: DshotSpeed) -> U24F8 {
    let bits = ((sys_hz as u64) << 8) / speed.pio_clock_hz() as u64;
    U24F8::from_bits(bits as u32)
}
