#![no_std]
#![no_main]

use embassy_executor::{Executor, Spawner};
use embassy_rp::gpio::{Level, Output, Pull};
use embassy_rp::i2c::{self, I2c};
use embassy_rp::multicore::{spawn_core1, Stack};
use embassy_rp::peripherals::{I2C0, PIO0};
use embassy_rp::pio;
use embassy_rp::pwm::{InputMode, Pwm};
use embassy_rp::bind_interrupts;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Timer};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use twin_dshot_controller::board::{self, Board};
use twin_dshot_controller::config::DSHOT_SPEED;
use twin_dshot_controller::control::receiver::{ReceiverSampler, ReceiverVector};
use twin_dshot_controller::drivers::h3lis331dl::H3lis331dl;
use twin_dshot_controller::drivers::pwm_capture::{capture_config, PwmCapture};
use twin_dshot_controller::tasks::control_loop::{control_task, receiver_task};
use twin_dshot_controller::tasks::transmit_loop::{transmit_task, Transmitter};
use twin_dshot_controller::{log_error, log_info};

#[cfg(feature = "bitbang")]
use twin_dshot_controller::config::BIT_TIMING;
#[cfg(feature = "bitbang")]
use twin_dshot_controller::drivers::signal::{BitBangDriver, CortexMTicks};
#[cfg(not(feature = "bitbang"))]
use twin_dshot_controller::drivers::pio_dshot::{DshotProgram, PioDshot};
#[cfg(not(feature = "bitbang"))]
use twin_dshot_controller::drivers::signal::WaveformDriver;

// ── Core 1 ────────────────────────────────────────────────────────────────────
static mut CORE1_STACK: Stack<8192> = Stack::new();
static EXECUTOR1: StaticCell<Executor> = StaticCell::new();

// ── Inter-task channels ───────────────────────────────────────────────────────
//  Cap=1: the control loop only wants the latest receiver vector.
static RECEIVER_CHAN: Channel<CriticalSectionRawMutex, ReceiverVector, 1> = Channel::new();

// ── Interrupt bindings ────────────────────────────────────────────────────────
bind_interrupts!(struct Irqs {
    PIO0_IRQ_0 => pio::InterruptHandler<PIO0>;
    I2C0_IRQ   => i2c::InterruptHandler<I2C0>;
});

// ── Main (core 0) ─────────────────────────────────────────────────────────────
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // 1. Board init (125 MHz)
    let board = Board::init();
    let p = board.p;
    log_info!("twin DShot controller, {:?}", DSHOT_SPEED);

    // 2. Accelerometer on I2C0 @ 400 kHz (SDA=GPIO8, SCL=GPIO9), ready before
    //    either loop starts
    let i2c = I2c::new_async(p.I2C0, p.PIN_9, p.PIN_8, Irqs, board::i2c_config());
    let mut accel = H3lis331dl::new(i2c);
    while let Err(e) = accel.init().await {
        log_error!("accelerometer init failed: {:?}, retrying", e);
        Timer::after(Duration::from_millis(500)).await;
    }
    log_info!("accelerometer ready");

    // 3. Motor signal lines (M1=GPIO0, M2=GPIO1). `common` lives as long as
    //    main, which never returns.
    #[cfg(not(feature = "bitbang"))]
    let pio::Pio { mut common, sm0, sm1, .. } = pio::Pio::new(p.PIO0, Irqs);
    #[cfg(not(feature = "bitbang"))]
    let (m1, m2) = {
        let program = DshotProgram::load(&mut common);
        let m1 = PioDshot::new(&mut common, sm0, &program, p.PIN_0, DSHOT_SPEED);
        let m2 = PioDshot::new(&mut common, sm1, &program, p.PIN_1, DSHOT_SPEED);
        (WaveformDriver::new(m1), WaveformDriver::new(m2))
    };
    #[cfg(feature = "bitbang")]
    let (m1, m2) = (
        BitBangDriver::new(Output::new(p.PIN_0, Level::Low), CortexMTicks, BIT_TIMING),
        BitBangDriver::new(Output::new(p.PIN_1, Level::Low), CortexMTicks, BIT_TIMING),
    );

    // 4. Transmission loop on core 1; it starts arming straight away
    let transmitter = Transmitter::new(m1, m2);
    spawn_core1(
        p.CORE1,
        unsafe { &mut *core::ptr::addr_of_mut!(CORE1_STACK) },
        move || {
            let executor1 = EXECUTOR1.init(Executor::new());
            executor1.run(|spawner| spawner.spawn(transmit_task(transmitter)).unwrap());
        },
    );

    // 5. Receiver capture on the PWM B pins
    let capture = PwmCapture::new(
        Pwm::new_input(p.PWM_SLICE1, p.PIN_3, Pull::None, InputMode::Level, capture_config()),
        Pwm::new_input(p.PWM_SLICE2, p.PIN_5, Pull::None, InputMode::Level, capture_config()),
        Pwm::new_input(p.PWM_SLICE5, p.PIN_11, Pull::None, InputMode::Level, capture_config()),
        Pwm::new_input(p.PWM_SLICE6, p.PIN_13, Pull::None, InputMode::Level, capture_config()),
    );

    // 6. Control and receiver tasks on core 0
    spawner.spawn(control_task(accel, RECEIVER_CHAN.receiver())).unwrap();
    spawner
        .spawn(receiver_task(ReceiverSampler::new(capture), RECEIVER_CHAN.sender()))
        .unwrap();

    // 7. Main task: LED heartbeat @ 1 Hz
    let mut led = Output::new(p.PIN_25, Level::Low);
    loop {
        led.toggle();
        Timer::after(Duration::from_millis(500)).await;
    }
}
