//! Sensor driver implementations
//!
//! This crate provides the concrete [`SensorDriver`] implementations for
//! the sensors fitted to the bench:
//!
//! - VL53L0X time-of-flight ranging sensor
//! - MLX90640 32x24 thermal array
//!
//! Each driver keeps the bench-facing logic (spec caching, tolerance
//! checks, fault to status mapping) and delegates register access to a
//! narrow back-end trait, so the logic is host testable and the register
//! code is swappable.
//!
//! [`SensorDriver`]: sensortest_core::SensorDriver

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

mod fmt;

pub mod sensor;

pub use sensor::mlx90640::{Mlx90640, Mlx90640I2c, ThermalCamera};
pub use sensor::vl53l0x::{RangingDevice, Vl53l0x, Vl53l0xI2c};
