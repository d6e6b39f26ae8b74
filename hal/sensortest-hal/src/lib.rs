//! Sensortest Hardware Abstraction Layer
//!
//! This crate defines the narrow hardware interfaces the protocol engine,
//! test runner and sensor drivers are written against. Chip-specific HALs
//! (currently STM32H7) implement them; host tests implement them with
//! in-memory mocks.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  sensortest-core / sensortest-drivers        │
//! └──────────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌──────────────────────────────────────────────┐
//! │  sensortest-hal (this crate - traits)        │
//! └──────────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ sensortest-   │       │  host mocks   │
//! │  hal-stm32h7  │       │  (tests)      │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`uart::UartTx`], [`uart::UartRx`] - Serial byte transport
//! - [`i2c::I2cBus`] - I2C bus operations
//! - [`system::Clock`] - Millisecond uptime
//! - [`system::Watchdog`] - Watchdog refresh

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod i2c;
pub mod system;
pub mod uart;

// Re-export key traits at crate root for convenience
pub use i2c::I2cBus;
pub use system::{Clock, Watchdog};
pub use uart::{UartRx, UartTx};
