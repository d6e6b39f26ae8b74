//! Test orchestration
//!
//! Sensors can be tested in one blocking call ([`TestRunner::run_all`],
//! [`TestRunner::run_single`]) or incrementally, one sensor per control
//! loop tick ([`TestRunner::start_all_async`] + [`TestRunner::process_async`]).
//!
//! Async lifecycle:
//! ```text
//! Idle ──start──► Running ──last sensor──► Complete ──take_report──► Idle
//!                    │
//!                    └──────cancel──────► Idle
//! ```

use core::mem;

use sensortest_hal::Clock;

use crate::registry::SensorRegistry;
use crate::report::{SensorTestResult, TestReport};
use crate::sensor::{SensorDriver, SensorId, SensorResult, TestOutcome, TestStatus};

/// Coarse runner state as reported to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunnerState {
    Idle,
    Running,
    Complete,
}

impl RunnerState {
    pub fn to_byte(self) -> u8 {
        match self {
            RunnerState::Idle => 0,
            RunnerState::Running => 1,
            RunnerState::Complete => 2,
        }
    }
}

/// Which sensors the current async run covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunMode {
    None,
    All,
    Single,
}

impl RunMode {
    pub fn to_byte(self) -> u8 {
        match self {
            RunMode::None => 0,
            RunMode::All => 1,
            RunMode::Single => 2,
        }
    }
}

/// Runner request failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunnerError {
    /// An async run is in progress
    Busy,
    /// Sensor is not registered
    UnknownSensor,
    /// No completed report is waiting
    NoReport,
}

#[derive(Debug)]
enum AsyncState {
    Idle,
    RunningAll { index: usize, report: TestReport },
    RunningSingle { target: SensorId, report: TestReport },
    Complete { mode: RunMode, report: TestReport },
}

/// Owner of the async test context
#[derive(Debug)]
pub struct TestRunner {
    state: AsyncState,
}

impl TestRunner {
    pub const fn new() -> Self {
        Self {
            state: AsyncState::Idle,
        }
    }

    pub fn state(&self) -> RunnerState {
        match self.state {
            AsyncState::Idle => RunnerState::Idle,
            AsyncState::RunningAll { .. } | AsyncState::RunningSingle { .. } => {
                RunnerState::Running
            }
            AsyncState::Complete { .. } => RunnerState::Complete,
        }
    }

    pub fn mode(&self) -> RunMode {
        match self.state {
            AsyncState::Idle => RunMode::None,
            AsyncState::RunningAll { .. } => RunMode::All,
            AsyncState::RunningSingle { .. } => RunMode::Single,
            AsyncState::Complete { mode, .. } => mode,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.state() == RunnerState::Running
    }

    pub fn is_complete(&self) -> bool {
        self.state() == RunnerState::Complete
    }

    /// Sensors tested so far in the current or completed run
    pub fn progress(&self) -> usize {
        match &self.state {
            AsyncState::Idle => 0,
            AsyncState::RunningAll { report, .. }
            | AsyncState::RunningSingle { report, .. }
            | AsyncState::Complete { report, .. } => report.tested(),
        }
    }

    /// Test every registered sensor in one blocking call
    pub fn run_all<C: Clock + ?Sized>(
        &mut self,
        sensors: &mut SensorRegistry<'_>,
        clock: &C,
    ) -> Result<TestReport, RunnerError> {
        if self.is_busy() {
            return Err(RunnerError::Busy);
        }

        let mut report = TestReport::new(sensors.len() as u8, clock.now_ms());
        for index in 0..sensors.len() {
            if let Some(driver) = sensors.get_mut(index) {
                record(&mut report, test_sensor(driver));
            }
        }

        info!(
            "Test run complete: {} pass, {} fail",
            report.pass_count, report.fail_count
        );
        Ok(report)
    }

    /// Test one sensor in a blocking call
    ///
    /// An unregistered id yields a single `NotTested` entry.
    pub fn run_single<C: Clock + ?Sized>(
        &mut self,
        target: SensorId,
        sensors: &mut SensorRegistry<'_>,
        clock: &C,
    ) -> Result<TestReport, RunnerError> {
        if self.is_busy() {
            return Err(RunnerError::Busy);
        }

        let mut report = TestReport::new(1, clock.now_ms());
        let entry = match sensors.by_id_mut(target) {
            Some(driver) => test_sensor(driver),
            None => {
                warn!("Sensor {} not registered", target);
                SensorTestResult::new(target, TestStatus::NotTested, SensorResult::default())
            }
        };
        record(&mut report, entry);
        Ok(report)
    }

    /// Begin testing every registered sensor, one per [`process_async`] call
    ///
    /// With no sensors registered the run completes immediately.
    ///
    /// [`process_async`]: TestRunner::process_async
    pub fn start_all_async<C: Clock + ?Sized>(
        &mut self,
        sensors: &SensorRegistry<'_>,
        clock: &C,
    ) -> Result<(), RunnerError> {
        if self.is_busy() {
            return Err(RunnerError::Busy);
        }

        let report = TestReport::new(sensors.len() as u8, clock.now_ms());
        self.state = if sensors.is_empty() {
            AsyncState::Complete {
                mode: RunMode::All,
                report,
            }
        } else {
            AsyncState::RunningAll { index: 0, report }
        };

        info!("Async run started for {} sensors", sensors.len());
        Ok(())
    }

    /// Begin testing one sensor on the next [`process_async`] call
    ///
    /// [`process_async`]: TestRunner::process_async
    pub fn start_single_async<C: Clock + ?Sized>(
        &mut self,
        target: SensorId,
        sensors: &SensorRegistry<'_>,
        clock: &C,
    ) -> Result<(), RunnerError> {
        if self.is_busy() {
            return Err(RunnerError::Busy);
        }
        if !sensors.contains(target) {
            return Err(RunnerError::UnknownSensor);
        }

        self.state = AsyncState::RunningSingle {
            target,
            report: TestReport::new(1, clock.now_ms()),
        };

        info!("Async run started for sensor {}", target);
        Ok(())
    }

    /// Advance an async run by at most one sensor
    ///
    /// Call once per control loop tick. Does nothing unless running.
    pub fn process_async(&mut self, sensors: &mut SensorRegistry<'_>) -> RunnerState {
        self.state = match mem::replace(&mut self.state, AsyncState::Idle) {
            AsyncState::RunningAll { index, mut report } => {
                if let Some(driver) = sensors.get_mut(index) {
                    record(&mut report, test_sensor(driver));
                }

                let next = index + 1;
                if next >= sensors.len() {
                    info!(
                        "Async run complete: {} pass, {} fail",
                        report.pass_count, report.fail_count
                    );
                    AsyncState::Complete {
                        mode: RunMode::All,
                        report,
                    }
                } else {
                    AsyncState::RunningAll {
                        index: next,
                        report,
                    }
                }
            }
            AsyncState::RunningSingle { target, mut report } => {
                let entry = match sensors.by_id_mut(target) {
                    Some(driver) => test_sensor(driver),
                    None => SensorTestResult::new(
                        target,
                        TestStatus::NotTested,
                        SensorResult::default(),
                    ),
                };
                record(&mut report, entry);
                AsyncState::Complete {
                    mode: RunMode::Single,
                    report,
                }
            }
            other => other,
        };

        self.state()
    }

    /// Hand out the completed report and return to idle
    ///
    /// Succeeds once per completed run.
    pub fn take_report(&mut self) -> Result<TestReport, RunnerError> {
        match mem::replace(&mut self.state, AsyncState::Idle) {
            AsyncState::Complete { report, .. } => Ok(report),
            other => {
                self.state = other;
                Err(RunnerError::NoReport)
            }
        }
    }

    /// Abandon any async run, discarding partial results
    ///
    /// Returns whether a run was in progress.
    pub fn cancel(&mut self) -> bool {
        let was_running = self.is_busy();
        if was_running {
            info!("Async run cancelled after {} sensors", self.progress());
        }
        self.state = AsyncState::Idle;
        was_running
    }
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::new()
    }
}

fn record(report: &mut TestReport, entry: SensorTestResult) {
    if report.record(entry).is_err() {
        warn!("Report full, dropping result for {}", entry.sensor_id);
    }
}

/// Bring one sensor up and test it
fn test_sensor(driver: &mut dyn SensorDriver) -> SensorTestResult {
    let id = driver.id();
    let outcome = evaluate(driver);
    debug!("Sensor {} -> {}", id, outcome.status);
    SensorTestResult::new(id, outcome.status, outcome.result)
}

fn evaluate(driver: &mut dyn SensorDriver) -> TestOutcome {
    if driver.initialize().is_err() {
        let status = if driver.is_present() {
            TestStatus::FailInit
        } else {
            TestStatus::FailNoAck
        };
        return TestOutcome::status_only(status);
    }

    if driver.supports_spec() && !driver.has_spec() {
        return TestOutcome::status_only(TestStatus::FailNoSpec);
    }

    driver
        .run_test()
        .unwrap_or(TestOutcome::status_only(TestStatus::NotTested))
}
