//! STM32H7 HAL for the sensortest firmware
//!
//! Implements the `sensortest-hal` traits on top of `embassy-stm32`:
//!
//! - [`uart::SerialRx`] / [`uart::SerialTx`] - halves of an interrupt-driven
//!   buffered UART
//! - [`i2c::BlockingI2c`] - any blocking `embedded-hal` I2C master
//! - [`system::UptimeClock`] - `embassy-time` uptime
//! - [`system::IwdgWatchdog`] - independent watchdog
//!
//! # Features
//!
//! - `stm32h723zg` - STM32H723ZG (NUCLEO-H723ZG bench board)
//! - `stm32h743zi` - STM32H743ZI
//! - `defmt` - Enable debug formatting support

#![no_std]
#![deny(unsafe_code)]

pub mod i2c;
pub mod system;
pub mod uart;

pub use i2c::{BlockingI2c, I2cBusError};
pub use system::{IwdgWatchdog, UptimeClock};
pub use uart::{SerialRx, SerialTx, UartBusError};
