//! UART serial communication abstractions
//!
//! The byte transport is treated as an opaque stream: framing bytes have no
//! meaning at this level.

/// UART transmitter
pub trait UartTx {
    /// Error type for transmit operations
    type Error;

    /// Write all of `data` to the UART
    ///
    /// Blocks until every byte has been queued or `timeout_ms` has elapsed.
    /// Implementations that cannot time out may ignore the bound, but must
    /// not block indefinitely.
    fn write_blocking(&mut self, data: &[u8], timeout_ms: u32) -> Result<(), Self::Error>;

    /// Flush any buffered data
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// UART receiver
///
/// Reception is expected to be interrupt driven: the implementation keeps
/// its own ring buffer filled from interrupt context and hands out whatever
/// has accumulated when asked.
pub trait UartRx {
    /// Error type for receive operations
    type Error;

    /// Copy already-received bytes into `buf` without blocking
    ///
    /// Returns the number of bytes copied, `0` when nothing is pending.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Speed and character format of a serial line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineConfig {
    pub baudrate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl LineConfig {
    /// 8 data bits, no parity, one stop bit
    pub const fn new_8n1(baudrate: u32) -> Self {
        Self {
            baudrate,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }

    /// Bits on the wire per character, start bit included
    pub fn bits_per_char(&self) -> u32 {
        let data = match self.data_bits {
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        };
        let parity = match self.parity {
            Parity::None => 0,
            Parity::Even | Parity::Odd => 1,
        };
        let stop = match self.stop_bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        };
        1 + data + parity + stop
    }

    /// Time to shift out `bytes` characters, in microseconds, rounded up
    pub fn transfer_time_us(&self, bytes: usize) -> u32 {
        if self.baudrate == 0 {
            return u32::MAX;
        }
        let bits = bytes as u64 * u64::from(self.bits_per_char());
        let us = (bits * 1_000_000).div_ceil(u64::from(self.baudrate));
        u32::try_from(us).unwrap_or(u32::MAX)
    }
}

impl Default for LineConfig {
    fn default() -> Self {
        Self::new_8n1(115_200)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataBits {
    Seven,
    Eight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    None,
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    One,
    Two,
}
