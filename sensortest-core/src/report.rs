//! Test reports and their wire layout
//!
//! ```text
//! ┌──────────────┬────────────┬────────────┬───────────────┬─────────────┐
//! │ sensor_count │ pass_count │ fail_count │ timestamp     │ entries...  │
//! │ 1B           │ 1B         │ 1B         │ 4B big-endian │             │
//! └──────────────┴────────────┴────────────┴───────────────┴─────────────┘
//! entry: sensor_id(1) | status(1) | result (sensor-defined, 8B fallback)
//! ```

use heapless::Vec;
use sensortest_protocol::{CapacityError, Frame};

use crate::registry::{SensorRegistry, MAX_SENSORS};
use crate::sensor::{SensorId, SensorResult, TestStatus};

/// Bytes before the first entry
pub const REPORT_HEADER_SIZE: usize = 7;

/// Largest result record a driver may serialize
pub const MAX_RESULT_SIZE: usize = 16;

/// One report entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorTestResult {
    pub sensor_id: SensorId,
    pub status: TestStatus,
    pub result: SensorResult,
}

impl SensorTestResult {
    pub fn new(sensor_id: SensorId, status: TestStatus, result: SensorResult) -> Self {
        Self {
            sensor_id,
            status,
            result,
        }
    }
}

/// Results of one test run
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TestReport {
    pub sensor_count: u8,
    pub pass_count: u8,
    pub fail_count: u8,
    /// Milliseconds since boot when the run started
    pub timestamp: u32,
    pub results: Vec<SensorTestResult, MAX_SENSORS>,
}

impl TestReport {
    pub fn new(sensor_count: u8, timestamp: u32) -> Self {
        Self {
            sensor_count,
            pass_count: 0,
            fail_count: 0,
            timestamp,
            results: Vec::new(),
        }
    }

    /// Append an entry and update the tallies
    pub fn record(&mut self, entry: SensorTestResult) -> Result<(), CapacityError> {
        self.results.push(entry).map_err(|_| CapacityError)?;
        if entry.status.is_pass() {
            self.pass_count += 1;
        } else if entry.status.is_fail() {
            self.fail_count += 1;
        }
        Ok(())
    }

    /// Entries recorded so far
    pub fn tested(&self) -> usize {
        self.results.len()
    }

    /// Write the report into `frame`'s payload
    ///
    /// Result records are encoded by the owning driver's serializer when
    /// it has one, otherwise the raw 8-byte record is copied.
    pub fn serialize_into(
        &self,
        sensors: &SensorRegistry<'_>,
        frame: &mut Frame,
    ) -> Result<(), CapacityError> {
        frame.push_u8(self.sensor_count)?;
        frame.push_u8(self.pass_count)?;
        frame.push_u8(self.fail_count)?;
        frame.push_bytes(&self.timestamp.to_be_bytes())?;

        for entry in &self.results {
            frame.push_u8(entry.sensor_id.to_byte())?;
            frame.push_u8(entry.status.to_byte())?;

            let mut record = [0u8; MAX_RESULT_SIZE];
            let serialized = sensors
                .by_id(entry.sensor_id)
                .and_then(|driver| driver.serialize_result(&entry.result, &mut record));

            match serialized {
                Some(len) => frame.push_bytes(&record[..len])?,
                None => frame.push_bytes(&entry.result.raw_bytes())?,
            }
        }

        Ok(())
    }
}
