//! Board-agnostic core logic for the sensor bench firmware
//!
//! This crate contains everything between the serial link and the sensor
//! drivers that does not depend on specific hardware:
//!
//! - Sensor capability trait and registry
//! - Test runner (blocking and tick-driven async runs)
//! - Report serialization
//! - Command dispatcher
//! - Protocol engine (receive buffering, framing, transmit)
//! - Configuration type definitions
//!
//! Data flow for one control loop tick:
//!
//! ```text
//! UART ──► ProtocolEngine ──parse──► dispatcher ──► TestRunner ──► SensorDriver
//!               ▲                        │
//!               └──────── response ◄─────┘
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// This must go first so the logging macros are visible to every module
mod fmt;

pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod registry;
pub mod report;
pub mod runner;
pub mod sensor;

pub use config::{BenchConfig, FirmwareVersion};
pub use dispatcher::DispatchContext;
pub use engine::{EngineStats, ProtocolEngine};
pub use registry::{SensorRegistry, MAX_SENSORS};
pub use report::{SensorTestResult, TestReport};
pub use runner::{RunMode, RunnerState, TestRunner};
pub use sensor::{SensorDriver, SensorFault, SensorId, SensorResult, SensorSpec, TestOutcome, TestStatus};
