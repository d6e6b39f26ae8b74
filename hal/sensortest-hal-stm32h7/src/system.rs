//! Uptime clock and independent watchdog

use embassy_stm32::wdg::{IndependentWatchdog, Instance};
use embassy_time::Instant;
use sensortest_hal::{Clock, Watchdog};

/// Milliseconds since boot from the embassy time driver
#[derive(Debug, Clone, Copy, Default)]
pub struct UptimeClock;

impl Clock for UptimeClock {
    fn now_ms(&self) -> u32 {
        // Wraps after ~49.7 days
        Instant::now().as_millis() as u32
    }
}

/// IWDG, started on construction
pub struct IwdgWatchdog<'d, T: Instance> {
    inner: IndependentWatchdog<'d, T>,
}

impl<'d, T: Instance> IwdgWatchdog<'d, T> {
    /// Start the watchdog; it cannot be stopped afterwards
    pub fn start(mut inner: IndependentWatchdog<'d, T>) -> Self {
        inner.unleash();
        Self { inner }
    }
}

impl<T: Instance> Watchdog for IwdgWatchdog<'_, T> {
    fn feed(&mut self) {
        self.inner.pet();
    }
}
