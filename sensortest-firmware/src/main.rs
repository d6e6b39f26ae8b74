//! Sensortest - Sensor Bench Firmware
//!
//! Main firmware binary for STM32H723-based sensor test jigs. A host PC
//! sends framed commands over UART4; the firmware exercises the attached
//! I2C sensors against host-provided specs and answers with structured
//! reports.
//!
//! Everything runs in one cooperative control loop: answer the host link,
//! advance an asynchronous test run by at most one sensor, pet the
//! watchdog, yield. No step ever waits on the host.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_stm32::i2c::{self, I2c};
use embassy_stm32::usart::{self, BufferedUart};
use embassy_stm32::wdg::IndependentWatchdog;
use embassy_stm32::{bind_interrupts, peripherals};
use embassy_time::{Delay, Duration, Ticker};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use sensortest_core::{
    BenchConfig, DispatchContext, ProtocolEngine, SensorDriver, SensorRegistry, TestRunner,
};
use sensortest_drivers::{Mlx90640, Mlx90640I2c, Vl53l0x, Vl53l0xI2c};
use sensortest_hal::uart::LineConfig;
use sensortest_hal::Watchdog;
use sensortest_hal_stm32h7::{i2c::frequency, uart, BlockingI2c, IwdgWatchdog, UptimeClock};

/// Constants generated from bench.toml
mod bench {
    include!(concat!(env!("OUT_DIR"), "/bench_consts.rs"));
}

/// Postcard-encoded `BenchConfig` generated from bench.toml
static BENCH_CONFIG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/bench_config.bin"));

bind_interrupts!(struct Irqs {
    UART4 => usart::BufferedInterruptHandler<peripherals::UART4>;
});

const UART_BUF_SIZE: usize = 256;

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; UART_BUF_SIZE]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; UART_BUF_SIZE]> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    info!("Sensortest firmware starting...");

    let p = embassy_stm32::init(Default::default());
    info!("Peripherals initialized");

    let config = load_config();
    info!(
        "Firmware {}.{}.{}",
        config.version.major, config.version.minor, config.version.patch
    );

    // Host link: UART4 on PD0 (RX) / PD1 (TX)
    let line = LineConfig::new_8n1(bench::UART_BAUDRATE);
    let serial = unwrap!(BufferedUart::new(
        p.UART4,
        p.PD0,
        p.PD1,
        TX_BUF.init([0; UART_BUF_SIZE]),
        RX_BUF.init([0; UART_BUF_SIZE]),
        Irqs,
        uart::usart_config(&line),
    ));
    let (rx, tx) = uart::split(serial);
    info!(
        "UART4 ready at {} baud, TX buffer drains in {} us",
        line.baudrate,
        line.transfer_time_us(UART_BUF_SIZE)
    );

    // Sensor buses: I2C1 (VL53L0X) on PB8/PB9, I2C4 (MLX90640) on PF14/PF15
    let scl = frequency(bench::I2C_SPEED);
    let i2c1 = I2c::new_blocking(p.I2C1, p.PB8, p.PB9, scl, i2c::Config::default());
    let i2c4 = I2c::new_blocking(p.I2C4, p.PF14, p.PF15, scl, i2c::Config::default());

    let mut ranger = Vl53l0x::new(Vl53l0xI2c::new(BlockingI2c::new(i2c1), Delay));
    let mut camera = Mlx90640::new(Mlx90640I2c::new(BlockingI2c::new(i2c4), Delay));

    let mut sensors = SensorRegistry::new();
    for driver in [
        &mut camera as &mut dyn SensorDriver,
        &mut ranger as &mut dyn SensorDriver,
    ] {
        prepare_sensor(driver, &config);
        if let Err(e) = sensors.register(driver) {
            error!("Sensor registration failed: {}", e);
        }
    }

    let mut engine = ProtocolEngine::new(rx, tx, config.uart_tx_timeout_ms);
    let mut runner = TestRunner::new();
    let clock = UptimeClock;

    // Started last so bring-up cannot trip it
    let mut watchdog = IwdgWatchdog::start(IndependentWatchdog::new(
        p.IWDG1,
        bench::WATCHDOG_TIMEOUT_MS * 1_000,
    ));

    let mut ticker = Ticker::every(Duration::from_millis(bench::LOOP_PERIOD_MS));
    info!("Entering control loop with {} sensors", sensors.len());

    loop {
        let stats = engine.process(&mut DispatchContext {
            runner: &mut runner,
            sensors: &mut sensors,
            clock: &clock,
            config: &config,
        });
        if !stats.is_quiet() {
            debug!("Link: {}", stats);
        }

        runner.process_async(&mut sensors);
        watchdog.feed();
        ticker.next().await;
    }
}

/// Decode the embedded configuration, falling back to defaults
fn load_config() -> BenchConfig {
    match BenchConfig::from_bytes(BENCH_CONFIG) {
        Ok(config) => config,
        Err(e) => {
            warn!("Embedded bench config unreadable ({}), using defaults", e);
            BenchConfig::default()
        }
    }
}

/// Apply the boot-time spec and report whether the sensor answers
fn prepare_sensor(driver: &mut dyn SensorDriver, config: &BenchConfig) {
    let name = driver.name();

    match config.default_spec(driver.id()) {
        Some(spec) => match driver.set_spec(spec) {
            Ok(()) => info!("{=str}: default spec {}", name, spec),
            Err(e) => warn!("{=str}: default spec rejected: {}", name, e),
        },
        None => info!("{=str}: no default spec, waiting for host", name),
    }

    if !driver.is_present() {
        warn!("{=str}: no response on I2C", name);
    }
}
