//! VL53L0X time-of-flight ranging sensor
//!
//! Each test is one single-shot ranging measurement compared against a
//! [`SensorSpec::Ranging`] spec.
//!
//! # Register access
//!
//! The I2C back-end drives the sensor at register level and skips the
//! vendor SPAD and reference calibration, which is good enough for a
//! go/no-go distance check:
//!
//! 1. Check `IDENTIFICATION_MODEL_ID` reads `0xEE`
//! 2. Write `SYSRANGE_START = 0x01` to trigger a single shot
//! 3. Poll `RESULT_INTERRUPT_STATUS & 0x07` until non-zero
//! 4. Read the 16-bit range (mm) at `RESULT_RANGE_STATUS + 10`
//! 5. Write `SYSTEM_INTERRUPT_CLEAR = 0x01`

use embedded_hal::delay::DelayNs;
use sensortest_core::sensor::write_bytes;
use sensortest_core::{
    SensorDriver, SensorFault, SensorId, SensorResult, SensorSpec, TestOutcome, TestStatus,
};
use sensortest_hal::I2cBus;

use super::{init_status, measure_status};

/// Factory 7-bit bus address
pub const DEFAULT_ADDRESS: u8 = 0x29;

/// Expected value of [`reg::IDENTIFICATION_MODEL_ID`]
pub const MODEL_ID: u8 = 0xEE;

/// VL53L0X register addresses
pub mod reg {
    pub const SYSRANGE_START: u8 = 0x00;
    pub const SYSTEM_INTERRUPT_CONFIG_GPIO: u8 = 0x0A;
    pub const SYSTEM_INTERRUPT_CLEAR: u8 = 0x0B;
    pub const RESULT_INTERRUPT_STATUS: u8 = 0x13;
    /// Range in mm, big-endian
    pub const RESULT_RANGE_MM: u8 = 0x1E;
    pub const I2C_MODE: u8 = 0x88;
    pub const IDENTIFICATION_MODEL_ID: u8 = 0xC0;
}

/// Interrupt on new sample ready
const GPIO_NEW_SAMPLE_READY: u8 = 0x04;
const INTERRUPT_STATUS_MASK: u8 = 0x07;

const POLL_INTERVAL_US: u32 = 1_000;
/// Comfortably above the 33 ms default timing budget
const MAX_POLLS: u16 = 100;

/// Register-level access to a ranging sensor
pub trait RangingDevice {
    /// Whether the device acknowledges its address
    fn probe(&mut self) -> bool;

    /// Identify the device and configure single-shot ranging
    fn init(&mut self) -> Result<(), SensorFault>;

    /// Take one measurement, in millimetres
    fn measure_mm(&mut self) -> Result<u16, SensorFault>;
}

/// VL53L0X back-end on an [`I2cBus`]
pub struct Vl53l0xI2c<B, D> {
    bus: B,
    delay: D,
    address: u8,
}

impl<B: I2cBus, D: DelayNs> Vl53l0xI2c<B, D> {
    pub fn new(bus: B, delay: D) -> Self {
        Self::with_address(bus, delay, DEFAULT_ADDRESS)
    }

    pub fn with_address(bus: B, delay: D, address: u8) -> Self {
        Self {
            bus,
            delay,
            address,
        }
    }

    /// Give the bus and delay back
    pub fn release(self) -> (B, D) {
        (self.bus, self.delay)
    }

    fn read_u8(&mut self, register: u8) -> Result<u8, SensorFault> {
        let mut buf = [0u8; 1];
        self.bus
            .write_read(self.address, &[register], &mut buf)
            .map_err(|_| SensorFault::Bus)?;
        Ok(buf[0])
    }

    fn read_u16(&mut self, register: u8) -> Result<u16, SensorFault> {
        let mut buf = [0u8; 2];
        self.bus
            .write_read(self.address, &[register], &mut buf)
            .map_err(|_| SensorFault::Bus)?;
        Ok(u16::from_be_bytes(buf))
    }

    fn write_u8(&mut self, register: u8, value: u8) -> Result<(), SensorFault> {
        self.bus
            .write(self.address, &[register, value])
            .map_err(|_| SensorFault::Bus)
    }
}

impl<B: I2cBus, D: DelayNs> RangingDevice for Vl53l0xI2c<B, D> {
    fn probe(&mut self) -> bool {
        self.bus.is_device_ready(self.address)
    }

    fn init(&mut self) -> Result<(), SensorFault> {
        let model = self.read_u8(reg::IDENTIFICATION_MODEL_ID)?;
        if model != MODEL_ID {
            warn!("VL53L0X: unexpected model id {=u8:#x}", model);
            return Err(SensorFault::InitFailed);
        }

        self.write_u8(reg::I2C_MODE, 0x00)?;
        self.write_u8(reg::SYSTEM_INTERRUPT_CONFIG_GPIO, GPIO_NEW_SAMPLE_READY)?;
        self.write_u8(reg::SYSTEM_INTERRUPT_CLEAR, 0x01)
    }

    fn measure_mm(&mut self) -> Result<u16, SensorFault> {
        self.write_u8(reg::SYSRANGE_START, 0x01)?;

        let mut polls = 0;
        while self.read_u8(reg::RESULT_INTERRUPT_STATUS)? & INTERRUPT_STATUS_MASK == 0 {
            polls += 1;
            if polls >= MAX_POLLS {
                return Err(SensorFault::Timeout);
            }
            self.delay.delay_us(POLL_INTERVAL_US);
        }

        let range = self.read_u16(reg::RESULT_RANGE_MM)?;
        self.write_u8(reg::SYSTEM_INTERRUPT_CLEAR, 0x01)?;
        Ok(range)
    }
}

/// VL53L0X bench driver
pub struct Vl53l0x<D> {
    device: D,
    spec: Option<SensorSpec>,
    initialized: bool,
}

impl<D: RangingDevice> Vl53l0x<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            spec: None,
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
}

impl<D: RangingDevice> SensorDriver for Vl53l0x<D> {
    fn id(&self) -> SensorId {
        SensorId::Vl53l0x
    }

    fn name(&self) -> &'static str {
        "VL53L0X"
    }

    fn initialize(&mut self) -> Result<(), SensorFault> {
        if self.initialized {
            return Ok(());
        }
        if !self.device.probe() {
            return Err(SensorFault::NoAck);
        }
        self.device.init()?;

        self.initialized = true;
        debug!("VL53L0X initialized");
        Ok(())
    }

    fn deinitialize(&mut self) {
        self.initialized = false;
    }

    fn is_present(&mut self) -> bool {
        self.device.probe()
    }

    fn supports_spec(&self) -> bool {
        true
    }

    fn set_spec(&mut self, spec: SensorSpec) -> Result<(), SensorFault> {
        match spec {
            SensorSpec::Ranging { .. } => {
                self.spec = Some(spec);
                Ok(())
            }
            SensorSpec::Thermal { .. } => Err(SensorFault::InvalidSpec),
        }
    }

    fn get_spec(&self) -> Option<SensorSpec> {
        self.spec
    }

    fn run_test(&mut self) -> Option<TestOutcome> {
        let Some(SensorSpec::Ranging {
            target_dist,
            tolerance,
        }) = self.spec
        else {
            return Some(TestOutcome::status_only(TestStatus::FailNoSpec));
        };

        if let Err(fault) = self.initialize() {
            return Some(TestOutcome::status_only(init_status(fault)));
        }

        let outcome = match self.device.measure_mm() {
            Ok(measured) => {
                let (status, result) = SensorResult::ranging(measured, target_dist, tolerance);
                TestOutcome::new(status, result)
            }
            Err(fault) => {
                warn!("VL53L0X measurement failed: {}", fault);
                // Force a fresh bring-up next time
                self.initialized = false;
                TestOutcome::status_only(measure_status(fault))
            }
        };
        Some(outcome)
    }

    fn serialize_spec(&self, spec: &SensorSpec, out: &mut [u8]) -> Option<usize> {
        match spec {
            SensorSpec::Ranging { .. } => write_bytes(&spec.to_bytes(), out),
            SensorSpec::Thermal { .. } => None,
        }
    }

    fn parse_spec(&self, bytes: &[u8]) -> Result<SensorSpec, SensorFault> {
        SensorSpec::ranging_from_bytes(bytes)
    }

    fn serialize_result(&self, result: &SensorResult, out: &mut [u8]) -> Option<usize> {
        match result {
            SensorResult::Ranging { .. } => write_bytes(&result.raw_bytes(), out),
            _ => None,
        }
    }
}
