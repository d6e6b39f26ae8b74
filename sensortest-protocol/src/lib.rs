//! Sensor Bench Serial Protocol
//!
//! This crate defines the UART-based protocol between a test host and the
//! sensor bench firmware. The host sends one request at a time; the bench
//! answers each with exactly one response frame.
//!
//! # Protocol Overview
//!
//! All messages use a simple binary frame format:
//! ```text
//! ┌───────┬────────┬─────────┬─────────────┬───────┬─────┐
//! │ START │ LENGTH │ COMMAND │ PAYLOAD     │ CHECK │ END │
//! │ 0x02  │ 1B     │ 1B      │ 0–64B       │ CRC-8 │ 0x03│
//! └───────┴────────┴─────────┴─────────────┴───────┴─────┘
//! ```
//!
//! Multi-byte payload fields are big-endian. The check byte is CRC-8
//! (polynomial 0x07, initial value 0) over LENGTH, COMMAND and PAYLOAD.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

pub mod commands;
pub mod frame;

pub use commands::{Command, ErrorCode, Response};
pub use frame::{
    build, crc8, parse, CapacityError, Frame, FrameError, ParseOutcome, ParseResult,
    FRAME_END, FRAME_OVERHEAD, FRAME_START, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE,
};
