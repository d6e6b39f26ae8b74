//! Build script for sensortest-firmware
//!
//! - Emits linker arguments for cortex-m-rt and defmt
//! - Validates bench.toml at compile time
//! - Generates board constants and a postcard-encoded `BenchConfig`
//!   into OUT_DIR

use std::env;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use sensortest_core::config::{BenchConfig, FirmwareVersion, MAX_CONFIG_SIZE};
use sensortest_core::SensorSpec;
use sensortest_hal::i2c::BusSpeed;

fn main() {
    setup_linker();
    let bench = load_bench();
    generate(&bench);
}

/// Linker scripts: memory.x comes from embassy-stm32's `memory-x` feature
fn setup_linker() {
    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validated contents of bench.toml
struct Bench {
    version: FirmwareVersion,
    baudrate: u32,
    tx_timeout_ms: u32,
    i2c_speed: BusSpeed,
    watchdog_timeout_ms: u32,
    loop_period_ms: u32,
    thermal: Option<SensorSpec>,
    ranging: Option<SensorSpec>,
}

fn load_bench() -> Bench {
    println!("cargo:rerun-if-changed=bench.toml");

    let path = Path::new("bench.toml");
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => fail(
            "Failed to read bench.toml",
            &[format!("{} (expected next to Cargo.toml)", e)],
        ),
    };

    let config: toml::Value = match toml::from_str(&content) {
        Ok(value) => value,
        Err(e) => fail(
            "Invalid TOML syntax in bench.toml",
            &e.to_string().lines().map(str::to_string).collect::<Vec<_>>(),
        ),
    };

    let mut errors = Vec::new();

    let firmware = section(&config, "firmware", &mut errors);
    let uart = section(&config, "uart", &mut errors);
    let i2c = section(&config, "i2c", &mut errors);
    let watchdog = section(&config, "watchdog", &mut errors);
    let control = section(&config, "control", &mut errors);

    let version = firmware.and_then(|t| parse_version(t, &mut errors));
    let baudrate = uart.and_then(|t| integer(t, "uart", "baudrate", 1_200..=4_000_000, &mut errors));
    let tx_timeout_ms =
        uart.and_then(|t| integer(t, "uart", "tx_timeout_ms", 1..=60_000, &mut errors));
    let i2c_speed = i2c
        .and_then(|t| integer(t, "i2c", "frequency_hz", 0..=1_000_000, &mut errors))
        .and_then(|hz| {
            let speed = BusSpeed::from_hz(hz as u32);
            if speed.is_none() {
                errors.push("[i2c] frequency_hz must be 100000, 400000 or 1000000".to_string());
            }
            speed
        });
    // IWDG tops out just under 32 s at the slowest prescaler
    let watchdog_timeout_ms =
        watchdog.and_then(|t| integer(t, "watchdog", "timeout_ms", 100..=30_000, &mut errors));
    let loop_period_ms =
        control.and_then(|t| integer(t, "control", "loop_period_ms", 1..=100, &mut errors));

    let sensors = config.get("sensor").and_then(|s| s.as_table());
    let thermal = sensors
        .and_then(|s| s.get("mlx90640"))
        .and_then(|t| parse_thermal(t, &mut errors));
    let ranging = sensors
        .and_then(|s| s.get("vl53l0x"))
        .and_then(|t| parse_ranging(t, &mut errors));

    if let Some(sensors) = sensors {
        for name in sensors.keys() {
            if name != "mlx90640" && name != "vl53l0x" {
                errors.push(format!("[sensor.{}] is not a sensor on this bench", name));
            }
        }
    }

    if !errors.is_empty() {
        fail("Invalid bench configuration", &errors);
    }

    // Every field was checked above; a None here means an error was pushed
    match (
        version,
        baudrate,
        tx_timeout_ms,
        i2c_speed,
        watchdog_timeout_ms,
        loop_period_ms,
    ) {
        (
            Some(version),
            Some(baudrate),
            Some(tx_timeout_ms),
            Some(i2c_speed),
            Some(watchdog_timeout_ms),
            Some(loop_period_ms),
        ) => {
            println!("cargo:warning=bench.toml validated successfully");
            Bench {
                version,
                baudrate: baudrate as u32,
                tx_timeout_ms: tx_timeout_ms as u32,
                i2c_speed,
                watchdog_timeout_ms: watchdog_timeout_ms as u32,
                loop_period_ms: loop_period_ms as u32,
                thermal,
                ranging,
            }
        }
        _ => fail("Invalid bench configuration", &["incomplete configuration".to_string()]),
    }
}

fn section<'a>(
    config: &'a toml::Value,
    name: &str,
    errors: &mut Vec<String>,
) -> Option<&'a toml::Table> {
    match config.get(name) {
        Some(toml::Value::Table(t)) => Some(t),
        Some(_) => {
            errors.push(format!("[{}] must be a table", name));
            None
        }
        None => {
            errors.push(format!("Missing [{}] section", name));
            None
        }
    }
}

fn integer(
    table: &toml::Table,
    section: &str,
    key: &str,
    range: RangeInclusive<i64>,
    errors: &mut Vec<String>,
) -> Option<i64> {
    match table.get(key) {
        Some(toml::Value::Integer(value)) if range.contains(value) => Some(*value),
        Some(toml::Value::Integer(_)) => {
            errors.push(format!(
                "[{}] {} must be {}-{}",
                section,
                key,
                range.start(),
                range.end()
            ));
            None
        }
        Some(_) => {
            errors.push(format!("[{}] {} must be an integer", section, key));
            None
        }
        None => {
            errors.push(format!("[{}] missing '{}'", section, key));
            None
        }
    }
}

fn parse_version(firmware: &toml::Table, errors: &mut Vec<String>) -> Option<FirmwareVersion> {
    let Some(toml::Value::String(text)) = firmware.get("version") else {
        errors.push("[firmware] missing 'version' string".to_string());
        return None;
    };

    let parts: Vec<Option<u8>> = text.split('.').map(|p| p.parse().ok()).collect();
    match parts.as_slice() {
        [Some(major), Some(minor), Some(patch)] => {
            Some(FirmwareVersion::new(*major, *minor, *patch))
        }
        _ => {
            errors.push(format!(
                "[firmware] version '{}' must be MAJOR.MINOR.PATCH, each 0-255",
                text
            ));
            None
        }
    }
}

fn parse_thermal(value: &toml::Value, errors: &mut Vec<String>) -> Option<SensorSpec> {
    let Some(table) = value.as_table() else {
        errors.push("[sensor.mlx90640] must be a table".to_string());
        return None;
    };
    let section = "sensor.mlx90640";
    let target = integer(table, section, "target_temp_x100", -4_000..=30_000, errors);
    let tolerance = integer(table, section, "tolerance_x100", 0..=i64::from(u16::MAX), errors);

    Some(SensorSpec::Thermal {
        target_temp: target? as i16,
        tolerance: tolerance? as u16,
    })
}

fn parse_ranging(value: &toml::Value, errors: &mut Vec<String>) -> Option<SensorSpec> {
    let Some(table) = value.as_table() else {
        errors.push("[sensor.vl53l0x] must be a table".to_string());
        return None;
    };
    let section = "sensor.vl53l0x";
    let target = integer(table, section, "target_dist_mm", 0..=2_000, errors);
    let tolerance = integer(table, section, "tolerance_mm", 0..=i64::from(u16::MAX), errors);

    Some(SensorSpec::Ranging {
        target_dist: target? as u16,
        tolerance: tolerance? as u16,
    })
}

/// Write the generated constants and config blob
fn generate(bench: &Bench) {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let config = BenchConfig {
        version: bench.version,
        uart_tx_timeout_ms: bench.tx_timeout_ms,
        thermal_spec: bench.thermal,
        ranging_spec: bench.ranging,
    };
    let mut buffer = [0u8; MAX_CONFIG_SIZE];
    let blob = match config.to_bytes(&mut buffer) {
        Ok(blob) => blob,
        Err(e) => fail(
            "Bench configuration does not encode",
            &[format!("{:?}", e)],
        ),
    };
    fs::write(out_dir.join("bench_config.bin"), blob).unwrap();

    let consts = format!(
        "// Generated from bench.toml by build.rs\n\
         pub const UART_BAUDRATE: u32 = {};\n\
         pub const I2C_SPEED: sensortest_hal::i2c::BusSpeed = sensortest_hal::i2c::BusSpeed::{:?};\n\
         pub const WATCHDOG_TIMEOUT_MS: u32 = {};\n\
         pub const LOOP_PERIOD_MS: u64 = {};\n",
        bench.baudrate, bench.i2c_speed, bench.watchdog_timeout_ms, bench.loop_period_ms,
    );
    fs::write(out_dir.join("bench_consts.rs"), consts).unwrap();
}

/// Abort the build with a boxed error listing
fn fail(title: &str, lines: &[String]) -> ! {
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<56} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title,
        lines
            .iter()
            .map(|line| {
                let line = if line.chars().count() > 62 {
                    format!("{}...", line.chars().take(59).collect::<String>())
                } else {
                    line.clone()
                };
                format!("║  • {:<62} ║", line)
            })
            .collect::<Vec<_>>()
            .join("\n")
    );
}
