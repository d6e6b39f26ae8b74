//! I2C bus adapter
//!
//! The sensor back-ends are written against [`sensortest_hal::I2cBus`];
//! this adapts any blocking `embedded-hal` 1.0 master (such as
//! `embassy_stm32::i2c::I2c<'_, Blocking>`) to it.

use embassy_stm32::i2c::Error as I2cError;
use embassy_stm32::time::Hertz;
use embedded_hal::i2c::I2c;
use sensortest_hal::i2c::BusSpeed;
use sensortest_hal::I2cBus;

/// Error from I2C operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cBusError {
    /// Bus error
    Bus,
    /// Arbitration lost
    ArbitrationLost,
    /// NACK received
    Nack,
    /// Timeout
    Timeout,
    /// CRC error
    Crc,
    /// Overrun
    Overrun,
    /// Other error
    Other,
}

impl From<I2cError> for I2cBusError {
    fn from(e: I2cError) -> Self {
        match e {
            I2cError::Bus => I2cBusError::Bus,
            I2cError::Arbitration => I2cBusError::ArbitrationLost,
            I2cError::Nack => I2cBusError::Nack,
            I2cError::Timeout => I2cBusError::Timeout,
            I2cError::Crc => I2cBusError::Crc,
            I2cError::Overrun => I2cBusError::Overrun,
            _ => I2cBusError::Other,
        }
    }
}

/// SCL frequency for a [`BusSpeed`]
pub fn frequency(speed: BusSpeed) -> Hertz {
    Hertz(speed.hz())
}

/// [`I2cBus`] over a blocking `embedded-hal` master
pub struct BlockingI2c<T> {
    inner: T,
}

impl<T> BlockingI2c<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> I2cBus for BlockingI2c<T>
where
    T: I2c,
    I2cBusError: From<T::Error>,
{
    type Error = I2cBusError;

    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error> {
        Ok(self.inner.write(address, data)?)
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        Ok(self.inner.read(address, buf)?)
    }

    fn write_read(
        &mut self,
        address: u8,
        register: &[u8],
        buf: &mut [u8],
    ) -> Result<(), Self::Error> {
        Ok(self.inner.write_read(address, register, buf)?)
    }
}
