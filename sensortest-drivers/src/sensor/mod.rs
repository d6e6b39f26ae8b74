//! Bench sensor drivers

use sensortest_core::{SensorFault, TestStatus};

pub mod mlx90640;
pub mod vl53l0x;

/// Status for a failed bring-up
fn init_status(fault: SensorFault) -> TestStatus {
    match fault {
        SensorFault::NoAck => TestStatus::FailNoAck,
        _ => TestStatus::FailInit,
    }
}

/// Status for a failed measurement on an initialized device
fn measure_status(fault: SensorFault) -> TestStatus {
    match fault {
        SensorFault::NoAck => TestStatus::FailNoAck,
        _ => TestStatus::FailTimeout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_mapping() {
        assert_eq!(init_status(SensorFault::NoAck), TestStatus::FailNoAck);
        assert_eq!(init_status(SensorFault::Bus), TestStatus::FailInit);
        assert_eq!(init_status(SensorFault::InitFailed), TestStatus::FailInit);
        assert_eq!(measure_status(SensorFault::Timeout), TestStatus::FailTimeout);
        assert_eq!(measure_status(SensorFault::Bus), TestStatus::FailTimeout);
        assert_eq!(measure_status(SensorFault::NoAck), TestStatus::FailNoAck);
    }
}
