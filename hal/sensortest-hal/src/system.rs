//! System services: uptime clock and watchdog

/// Monotonic millisecond clock
pub trait Clock {
    /// Milliseconds since boot
    ///
    /// Wraps after ~49.7 days; consumers only use it for report timestamps.
    fn now_ms(&self) -> u32;
}

/// Independent watchdog
pub trait Watchdog {
    /// Refresh the watchdog counter
    fn feed(&mut self);
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}
