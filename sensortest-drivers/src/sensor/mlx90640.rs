//! MLX90640 32x24 thermal array
//!
//! A test reads both subpages of a frame, takes the hottest pixel and
//! compares it against a [`SensorSpec::Thermal`] spec (°C × 100).
//!
//! The MLX90640 uses 16-bit register addresses and 16-bit big-endian data
//! words. The I2C back-end configures refresh rate and ADC resolution in
//! control register 1, waits for the "new data" flag in the status
//! register and scans the pixel RAM. It does not apply the per-pixel
//! EEPROM calibration: the hottest raw pixel is mapped to a temperature
//! through a linear [`PixelScale`], which is an estimate only.

use embedded_hal::delay::DelayNs;
use sensortest_core::sensor::write_bytes;
use sensortest_core::{
    SensorDriver, SensorFault, SensorId, SensorResult, SensorSpec, TestOutcome, TestStatus,
};
use sensortest_hal::I2cBus;

use super::{init_status, measure_status};

/// Factory 7-bit bus address
pub const DEFAULT_ADDRESS: u8 = 0x33;

pub const COLUMNS: usize = 32;
pub const ROWS: usize = 24;
pub const PIXEL_COUNT: usize = COLUMNS * ROWS;

/// MLX90640 register addresses
pub mod reg {
    /// Pixel RAM, one word per pixel
    pub const RAM_START: u16 = 0x0400;
    pub const STATUS: u16 = 0x8000;
    pub const CONTROL_1: u16 = 0x800D;
}

/// Status register: a new subpage is in RAM
const STATUS_NEW_DATA: u16 = 1 << 3;

const REFRESH_SHIFT: u16 = 7;
const REFRESH_MASK: u16 = 0b111 << REFRESH_SHIFT;
/// 4 Hz subpage rate
const REFRESH_4HZ: u16 = 0b011;

const RESOLUTION_SHIFT: u16 = 10;
const RESOLUTION_MASK: u16 = 0b11 << RESOLUTION_SHIFT;
/// 19-bit ADC
const RESOLUTION_19BIT: u16 = 0b11;

const SUBPAGES: usize = 2;
/// Pixel words fetched per bus transfer
const CHUNK_WORDS: usize = 32;

const POLL_INTERVAL_US: u32 = 5_000;
/// 600 ms, more than two subpage periods at 4 Hz
const MAX_POLLS: u16 = 120;

/// Register-level access to a thermal camera
pub trait ThermalCamera {
    /// Whether the device acknowledges its address
    fn probe(&mut self) -> bool;

    /// Apply refresh rate and resolution
    fn configure(&mut self) -> Result<(), SensorFault>;

    /// Hottest point of one full frame, °C × 100
    fn max_temp_x100(&mut self) -> Result<i16, SensorFault>;
}

/// Linear mapping from a raw pixel value to °C × 100
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PixelScale {
    /// Temperature reported for a raw value of zero
    pub offset_x100: i32,
    /// Raw counts per degree
    pub counts_per_degree: i32,
}

impl Default for PixelScale {
    fn default() -> Self {
        Self {
            offset_x100: 2500,
            counts_per_degree: 50,
        }
    }
}

impl PixelScale {
    pub fn to_centi_celsius(&self, raw: i16) -> i16 {
        let counts = self.counts_per_degree.max(1);
        let temp = self.offset_x100 + i32::from(raw) * 100 / counts;
        temp.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
    }
}

/// MLX90640 back-end on an [`I2cBus`]
pub struct Mlx90640I2c<B, D> {
    bus: B,
    delay: D,
    address: u8,
    scale: PixelScale,
}

impl<B: I2cBus, D: DelayNs> Mlx90640I2c<B, D> {
    pub fn new(bus: B, delay: D) -> Self {
        Self {
            bus,
            delay,
            address: DEFAULT_ADDRESS,
            scale: PixelScale::default(),
        }
    }

    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    pub fn with_scale(mut self, scale: PixelScale) -> Self {
        self.scale = scale;
        self
    }

    /// Give the bus and delay back
    pub fn release(self) -> (B, D) {
        (self.bus, self.delay)
    }

    fn read_words(&mut self, register: u16, words: &mut [u16]) -> Result<(), SensorFault> {
        let mut bytes = [0u8; CHUNK_WORDS * 2];
        let bytes = bytes
            .get_mut(..words.len() * 2)
            .ok_or(SensorFault::Bus)?;
        self.bus
            .write_read(self.address, &register.to_be_bytes(), bytes)
            .map_err(|_| SensorFault::Bus)?;

        for (word, pair) in words.iter_mut().zip(bytes.chunks_exact(2)) {
            *word = u16::from_be_bytes([pair[0], pair[1]]);
        }
        Ok(())
    }

    fn read_word(&mut self, register: u16) -> Result<u16, SensorFault> {
        let mut word = [0u16; 1];
        self.read_words(register, &mut word)?;
        Ok(word[0])
    }

    fn write_word(&mut self, register: u16, value: u16) -> Result<(), SensorFault> {
        let [a0, a1] = register.to_be_bytes();
        let [d0, d1] = value.to_be_bytes();
        self.bus
            .write(self.address, &[a0, a1, d0, d1])
            .map_err(|_| SensorFault::Bus)
    }

    fn wait_new_data(&mut self) -> Result<(), SensorFault> {
        let mut polls = 0;
        while self.read_word(reg::STATUS)? & STATUS_NEW_DATA == 0 {
            polls += 1;
            if polls >= MAX_POLLS {
                return Err(SensorFault::Timeout);
            }
            self.delay.delay_us(POLL_INTERVAL_US);
        }
        Ok(())
    }

    fn clear_new_data(&mut self) -> Result<(), SensorFault> {
        let status = self.read_word(reg::STATUS)?;
        self.write_word(reg::STATUS, status & !STATUS_NEW_DATA)
    }

    fn hottest_pixel(&mut self) -> Result<i16, SensorFault> {
        let mut hottest = i16::MIN;
        let mut chunk = [0u16; CHUNK_WORDS];

        for offset in (0..PIXEL_COUNT).step_by(CHUNK_WORDS) {
            self.read_words(reg::RAM_START + offset as u16, &mut chunk)?;
            for &word in &chunk {
                hottest = hottest.max(word as i16);
            }
        }
        Ok(hottest)
    }
}

impl<B: I2cBus, D: DelayNs> ThermalCamera for Mlx90640I2c<B, D> {
    fn probe(&mut self) -> bool {
        self.bus.is_device_ready(self.address)
    }

    fn configure(&mut self) -> Result<(), SensorFault> {
        let control = self.read_word(reg::CONTROL_1)?;
        let wanted = (control & !(REFRESH_MASK | RESOLUTION_MASK))
            | (REFRESH_4HZ << REFRESH_SHIFT)
            | (RESOLUTION_19BIT << RESOLUTION_SHIFT);
        self.write_word(reg::CONTROL_1, wanted)?;

        let readback = self.read_word(reg::CONTROL_1)?;
        if readback != wanted {
            warn!(
                "MLX90640: control register reads {=u16:#x}, wrote {=u16:#x}",
                readback,
                wanted
            );
            return Err(SensorFault::InitFailed);
        }
        Ok(())
    }

    fn max_temp_x100(&mut self) -> Result<i16, SensorFault> {
        let mut hottest = i16::MIN;
        for _ in 0..SUBPAGES {
            self.wait_new_data()?;
            hottest = hottest.max(self.hottest_pixel()?);
            self.clear_new_data()?;
        }
        Ok(self.scale.to_centi_celsius(hottest))
    }
}

/// MLX90640 bench driver
pub struct Mlx90640<C> {
    camera: C,
    spec: Option<SensorSpec>,
    initialized: bool,
}

impl<C: ThermalCamera> Mlx90640<C> {
    pub fn new(camera: C) -> Self {
        Self {
            camera,
            spec: None,
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn camera_mut(&mut self) -> &mut C {
        &mut self.camera
    }
}

impl<C: ThermalCamera> SensorDriver for Mlx90640<C> {
    fn id(&self) -> SensorId {
        SensorId::Mlx90640
    }

    fn name(&self) -> &'static str {
        "MLX90640"
    }

    fn initialize(&mut self) -> Result<(), SensorFault> {
        if self.initialized {
            return Ok(());
        }
        if !self.camera.probe() {
            return Err(SensorFault::NoAck);
        }
        self.camera.configure()?;

        self.initialized = true;
        debug!("MLX90640 initialized");
        Ok(())
    }

    fn deinitialize(&mut self) {
        self.initialized = false;
    }

    fn is_present(&mut self) -> bool {
        self.camera.probe()
    }

    fn supports_spec(&self) -> bool {
        true
    }

    fn set_spec(&mut self, spec: SensorSpec) -> Result<(), SensorFault> {
        match spec {
            SensorSpec::Thermal { .. } => {
                self.spec = Some(spec);
                Ok(())
            }
            SensorSpec::Ranging { .. } => Err(SensorFault::InvalidSpec),
        }
    }

    fn get_spec(&self) -> Option<SensorSpec> {
        self.spec
    }

    fn run_test(&mut self) -> Option<TestOutcome> {
        let Some(SensorSpec::Thermal {
            target_temp,
            tolerance,
        }) = self.spec
        else {
            return Some(TestOutcome::status_only(TestStatus::FailNoSpec));
        };

        if let Err(fault) = self.initialize() {
            return Some(TestOutcome::status_only(init_status(fault)));
        }

        let outcome = match self.camera.max_temp_x100() {
            Ok(max_temp) => {
                let (status, result) = SensorResult::thermal(max_temp, target_temp, tolerance);
                TestOutcome::new(status, result)
            }
            Err(fault) => {
                warn!("MLX90640 frame read failed: {}", fault);
                self.initialized = false;
                TestOutcome::status_only(measure_status(fault))
            }
        };
        Some(outcome)
    }

    fn serialize_spec(&self, spec: &SensorSpec, out: &mut [u8]) -> Option<usize> {
        match spec {
            SensorSpec::Thermal { .. } => write_bytes(&spec.to_bytes(), out),
            SensorSpec::Ranging { .. } => None,
        }
    }

    fn parse_spec(&self, bytes: &[u8]) -> Result<SensorSpec, SensorFault> {
        SensorSpec::thermal_from_bytes(bytes)
    }

    fn serialize_result(&self, result: &SensorResult, out: &mut [u8]) -> Option<usize> {
        match result {
            SensorResult::Thermal { .. } => write_bytes(&result.raw_bytes(), out),
            _ => None,
        }
    }
}
