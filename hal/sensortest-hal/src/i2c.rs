//! I2C master interface used by the sensor back-ends

/// Blocking I2C master addressing 7-bit devices
///
/// The sensor back-ends need three transaction shapes: a plain write
/// (register address followed by data), a plain read, and a register read
/// that writes the register address and reads back after a repeated start.
pub trait I2cBus {
    type Error;

    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error>;

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Write `register`, then fill `buf` after a repeated start
    fn write_read(
        &mut self,
        address: u8,
        register: &[u8],
        buf: &mut [u8],
    ) -> Result<(), Self::Error>;

    /// Whether a device acknowledges `address`
    ///
    /// Probes with a one-byte read, which both bench sensors tolerate.
    fn is_device_ready(&mut self, address: u8) -> bool {
        let mut probe = [0u8; 1];
        self.read(address, &mut probe).is_ok()
    }
}

/// SCL clock rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusSpeed {
    /// 100 kHz
    Standard,
    /// 400 kHz, what both bench sensors are run at
    #[default]
    Fast,
    /// 1 MHz
    FastPlus,
}

impl BusSpeed {
    pub fn from_hz(hz: u32) -> Option<Self> {
        match hz {
            100_000 => Some(BusSpeed::Standard),
            400_000 => Some(BusSpeed::Fast),
            1_000_000 => Some(BusSpeed::FastPlus),
            _ => None,
        }
    }

    pub fn hz(self) -> u32 {
        match self {
            BusSpeed::Standard => 100_000,
            BusSpeed::Fast => 400_000,
            BusSpeed::FastPlus => 1_000_000,
        }
    }
}
