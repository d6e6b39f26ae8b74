//! Sensor capability model
//!
//! Every sensor on the bench is driven through [`SensorDriver`]. The trait
//! is a capability set: apart from `id` and `name`, every method has a
//! default meaning "this driver does not have that capability", so a
//! driver only implements what its hardware supports.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Wire size of a serialized [`SensorSpec`]
pub const SPEC_SIZE: usize = 4;

/// Size of the fallback result record copied when a driver has no
/// result serializer
pub const RAW_RESULT_SIZE: usize = 8;

/// Physical sensor channels fitted to the bench
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SensorId {
    /// 32x24 thermal array
    Mlx90640,
    /// Time-of-flight ranging sensor
    Vl53l0x,
}

impl SensorId {
    pub const ALL: [SensorId; 2] = [SensorId::Mlx90640, SensorId::Vl53l0x];

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(SensorId::Mlx90640),
            0x02 => Some(SensorId::Vl53l0x),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            SensorId::Mlx90640 => 0x01,
            SensorId::Vl53l0x => 0x02,
        }
    }
}

/// Outcome of testing one sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TestStatus {
    Pass,
    /// Device answered but could not be brought up
    FailInit,
    /// Device did not answer on the bus
    FailNoAck,
    /// Measurement did not complete in time
    FailTimeout,
    /// No spec was set before testing
    FailNoSpec,
    /// Measurement outside the spec tolerance
    FailInvalid,
    /// No test capability; counts as neither pass nor fail
    NotTested,
}

impl TestStatus {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(TestStatus::Pass),
            0x01 => Some(TestStatus::FailInit),
            0x02 => Some(TestStatus::FailNoAck),
            0x03 => Some(TestStatus::FailTimeout),
            0x04 => Some(TestStatus::FailNoSpec),
            0x05 => Some(TestStatus::FailInvalid),
            0x06 => Some(TestStatus::NotTested),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            TestStatus::Pass => 0x00,
            TestStatus::FailInit => 0x01,
            TestStatus::FailNoAck => 0x02,
            TestStatus::FailTimeout => 0x03,
            TestStatus::FailNoSpec => 0x04,
            TestStatus::FailInvalid => 0x05,
            TestStatus::NotTested => 0x06,
        }
    }

    pub fn is_pass(self) -> bool {
        self == TestStatus::Pass
    }

    /// Counts toward the report's fail tally
    pub fn is_fail(self) -> bool {
        !matches!(self, TestStatus::Pass | TestStatus::NotTested)
    }
}

/// Acceptance criteria for one sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SensorSpec {
    /// Hottest pixel must be within `tolerance` of `target_temp` (°C × 100)
    Thermal { target_temp: i16, tolerance: u16 },
    /// Measured distance must be within `tolerance` of `target_dist` (mm)
    Ranging { target_dist: u16, tolerance: u16 },
}

impl SensorSpec {
    /// Big-endian wire form: `[target_hi, target_lo, tolerance_hi, tolerance_lo]`
    pub fn to_bytes(&self) -> [u8; SPEC_SIZE] {
        let (target, tolerance) = match *self {
            SensorSpec::Thermal {
                target_temp,
                tolerance,
            } => (target_temp.to_be_bytes(), tolerance),
            SensorSpec::Ranging {
                target_dist,
                tolerance,
            } => (target_dist.to_be_bytes(), tolerance),
        };
        let tolerance = tolerance.to_be_bytes();
        [target[0], target[1], tolerance[0], tolerance[1]]
    }

    /// Parse a thermal spec, requiring exactly [`SPEC_SIZE`] bytes
    pub fn thermal_from_bytes(bytes: &[u8]) -> Result<Self, SensorFault> {
        let [t0, t1, l0, l1] = spec_bytes(bytes)?;
        Ok(SensorSpec::Thermal {
            target_temp: i16::from_be_bytes([t0, t1]),
            tolerance: u16::from_be_bytes([l0, l1]),
        })
    }

    /// Parse a ranging spec, requiring exactly [`SPEC_SIZE`] bytes
    pub fn ranging_from_bytes(bytes: &[u8]) -> Result<Self, SensorFault> {
        let [t0, t1, l0, l1] = spec_bytes(bytes)?;
        Ok(SensorSpec::Ranging {
            target_dist: u16::from_be_bytes([t0, t1]),
            tolerance: u16::from_be_bytes([l0, l1]),
        })
    }
}

fn spec_bytes(bytes: &[u8]) -> Result<[u8; SPEC_SIZE], SensorFault> {
    bytes.try_into().map_err(|_| SensorFault::InvalidSpec)
}

/// Measurement record attached to each report entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorResult {
    Thermal {
        max_temp: i16,
        target: i16,
        tolerance: u16,
        diff: u16,
    },
    Ranging {
        measured: u16,
        target: u16,
        tolerance: u16,
        diff: u16,
    },
    /// Opaque record for drivers without a structured result
    Raw([u8; RAW_RESULT_SIZE]),
}

impl Default for SensorResult {
    fn default() -> Self {
        SensorResult::Raw([0; RAW_RESULT_SIZE])
    }
}

impl SensorResult {
    /// Compare a thermal reading against its spec
    pub fn thermal(max_temp: i16, target: i16, tolerance: u16) -> (TestStatus, Self) {
        let diff = max_temp.abs_diff(target);
        let status = within_tolerance(diff, tolerance);
        (
            status,
            SensorResult::Thermal {
                max_temp,
                target,
                tolerance,
                diff,
            },
        )
    }

    /// Compare a distance reading against its spec
    pub fn ranging(measured: u16, target: u16, tolerance: u16) -> (TestStatus, Self) {
        let diff = measured.abs_diff(target);
        let status = within_tolerance(diff, tolerance);
        (
            status,
            SensorResult::Ranging {
                measured,
                target,
                tolerance,
                diff,
            },
        )
    }

    /// The in-memory 8-byte record, four big-endian 16-bit fields
    pub fn raw_bytes(&self) -> [u8; RAW_RESULT_SIZE] {
        let words = match *self {
            SensorResult::Thermal {
                max_temp,
                target,
                tolerance,
                diff,
            } => [max_temp as u16, target as u16, tolerance, diff],
            SensorResult::Ranging {
                measured,
                target,
                tolerance,
                diff,
            } => [measured, target, tolerance, diff],
            SensorResult::Raw(bytes) => return bytes,
        };

        let mut out = [0u8; RAW_RESULT_SIZE];
        for (chunk, word) in out.chunks_exact_mut(2).zip(words) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        out
    }
}

fn within_tolerance(diff: u16, tolerance: u16) -> TestStatus {
    if diff <= tolerance {
        TestStatus::Pass
    } else {
        TestStatus::FailInvalid
    }
}

/// Status and measurement produced by one `run_test` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TestOutcome {
    pub status: TestStatus,
    pub result: SensorResult,
}

impl TestOutcome {
    pub fn new(status: TestStatus, result: SensorResult) -> Self {
        Self { status, result }
    }

    /// An outcome with no measurement attached
    pub fn status_only(status: TestStatus) -> Self {
        Self {
            status,
            result: SensorResult::default(),
        }
    }
}

/// Driver-level failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorFault {
    /// No acknowledge on the bus
    NoAck,
    /// Device present but setup failed
    InitFailed,
    /// Measurement never became ready
    Timeout,
    /// Bus transfer error
    Bus,
    /// Spec bytes malformed or wrong spec kind for this sensor
    InvalidSpec,
    /// Driver lacks this capability
    Unsupported,
}

/// Capability set implemented once per sensor variant
pub trait SensorDriver {
    /// Channel this driver serves
    fn id(&self) -> SensorId;

    /// Short human-readable name reported in the sensor list
    fn name(&self) -> &'static str;

    /// Bring the device up; called before every test
    fn initialize(&mut self) -> Result<(), SensorFault> {
        Ok(())
    }

    /// Power down or release the device
    fn deinitialize(&mut self) {}

    /// Whether the device acknowledges on its bus
    fn is_present(&mut self) -> bool {
        true
    }

    /// Whether this driver accepts a spec at all
    fn supports_spec(&self) -> bool {
        false
    }

    fn set_spec(&mut self, _spec: SensorSpec) -> Result<(), SensorFault> {
        Err(SensorFault::Unsupported)
    }

    fn get_spec(&self) -> Option<SensorSpec> {
        None
    }

    fn has_spec(&self) -> bool {
        self.get_spec().is_some()
    }

    /// Run one measurement; `None` means the driver cannot test
    fn run_test(&mut self) -> Option<TestOutcome> {
        None
    }

    /// Write `spec` into `out`, returning the byte count
    fn serialize_spec(&self, _spec: &SensorSpec, _out: &mut [u8]) -> Option<usize> {
        None
    }

    fn parse_spec(&self, _bytes: &[u8]) -> Result<SensorSpec, SensorFault> {
        Err(SensorFault::Unsupported)
    }

    /// Write `result` into `out`, returning the byte count
    ///
    /// `None` makes the report fall back to the raw 8-byte record.
    fn serialize_result(&self, _result: &SensorResult, _out: &mut [u8]) -> Option<usize> {
        None
    }
}

/// Copy `bytes` into the front of `out` if it fits
pub fn write_bytes(bytes: &[u8], out: &mut [u8]) -> Option<usize> {
    let dest = out.get_mut(..bytes.len())?;
    dest.copy_from_slice(bytes);
    Some(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare;

    impl SensorDriver for Bare {
        fn id(&self) -> SensorId {
            SensorId::Vl53l0x
        }

        fn name(&self) -> &'static str {
            "bare"
        }
    }

    #[test]
    fn test_sensor_id_bytes() {
        for id in SensorId::ALL {
            assert_eq!(SensorId::from_byte(id.to_byte()), Some(id));
        }
        assert_eq!(SensorId::Mlx90640.to_byte(), 0x01);
        assert_eq!(SensorId::from_byte(0x00), None);
        assert_eq!(SensorId::from_byte(0x03), None);
    }

    #[test]
    fn test_status_tally_classes() {
        assert!(TestStatus::Pass.is_pass());
        assert!(!TestStatus::Pass.is_fail());
        assert!(!TestStatus::NotTested.is_pass());
        assert!(!TestStatus::NotTested.is_fail());
        assert!(TestStatus::FailNoSpec.is_fail());
        assert!(TestStatus::FailTimeout.is_fail());
    }

    #[test]
    fn test_status_bytes() {
        for byte in 0x00..=0x06 {
            assert_eq!(TestStatus::from_byte(byte).unwrap().to_byte(), byte);
        }
        assert_eq!(TestStatus::from_byte(0x07), None);
    }

    #[test]
    fn test_spec_wire_form() {
        let spec = SensorSpec::Thermal {
            target_temp: -500,
            tolerance: 250,
        };
        let bytes = spec.to_bytes();
        assert_eq!(bytes, [0xFE, 0x0C, 0x00, 0xFA]);
        assert_eq!(SensorSpec::thermal_from_bytes(&bytes), Ok(spec));

        let spec = SensorSpec::Ranging {
            target_dist: 500,
            tolerance: 2000,
        };
        assert_eq!(spec.to_bytes(), [0x01, 0xF4, 0x07, 0xD0]);
    }

    #[test]
    fn test_spec_wrong_length() {
        assert_eq!(
            SensorSpec::ranging_from_bytes(&[1, 2, 3]),
            Err(SensorFault::InvalidSpec)
        );
        assert_eq!(
            SensorSpec::thermal_from_bytes(&[1, 2, 3, 4, 5]),
            Err(SensorFault::InvalidSpec)
        );
    }

    #[test]
    fn test_tolerance_boundary() {
        let (status, result) = SensorResult::ranging(520, 500, 20);
        assert_eq!(status, TestStatus::Pass);
        assert_eq!(
            result,
            SensorResult::Ranging {
                measured: 520,
                target: 500,
                tolerance: 20,
                diff: 20
            }
        );

        let (status, _) = SensorResult::ranging(479, 500, 20);
        assert_eq!(status, TestStatus::FailInvalid);
    }

    #[test]
    fn test_thermal_diff_is_absolute() {
        let (status, result) = SensorResult::thermal(-1000, 2500, 5000);
        assert_eq!(status, TestStatus::Pass);
        assert!(matches!(result, SensorResult::Thermal { diff: 3500, .. }));

        // Full i16 span does not overflow the diff
        let (status, result) = SensorResult::thermal(i16::MIN, i16::MAX, 0);
        assert_eq!(status, TestStatus::FailInvalid);
        assert!(matches!(result, SensorResult::Thermal { diff: u16::MAX, .. }));
    }

    #[test]
    fn test_raw_bytes_layout() {
        let (_, result) = SensorResult::thermal(3012, 2500, 5000);
        assert_eq!(
            result.raw_bytes(),
            [0x0B, 0xC4, 0x09, 0xC4, 0x13, 0x88, 0x02, 0x00]
        );

        let raw = SensorResult::Raw([1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(raw.raw_bytes(), [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_default_capabilities_are_absent() {
        let mut bare = Bare;
        assert_eq!(bare.initialize(), Ok(()));
        assert!(bare.is_present());
        assert!(!bare.supports_spec());
        assert!(!bare.has_spec());
        assert_eq!(bare.run_test(), None);
        assert_eq!(
            bare.set_spec(SensorSpec::Ranging {
                target_dist: 1,
                tolerance: 1
            }),
            Err(SensorFault::Unsupported)
        );
        assert_eq!(bare.parse_spec(&[0; 4]), Err(SensorFault::Unsupported));
        let mut out = [0u8; 8];
        assert_eq!(bare.serialize_result(&SensorResult::default(), &mut out), None);
    }

    #[test]
    fn test_write_bytes_bounds() {
        let mut out = [0u8; 3];
        assert_eq!(write_bytes(&[1, 2], &mut out), Some(2));
        assert_eq!(out, [1, 2, 0]);
        assert_eq!(write_bytes(&[1, 2, 3, 4], &mut out), None);
    }
}
