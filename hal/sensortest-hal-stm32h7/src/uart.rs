//! UART transport for the host link
//!
//! Wraps the two halves of embassy-stm32's `BufferedUart`. Reception runs
//! from the USART interrupt into the driver's ring buffer, so
//! [`SerialRx`] only ever copies out what has already arrived.

use embassy_stm32::usart::{self, BufferedUart, BufferedUartRx, BufferedUartTx};
use embassy_time::{Duration, Instant};
use embedded_io::{Read, ReadReady, Write};
use sensortest_hal::uart::{DataBits, LineConfig, Parity, StopBits};
use sensortest_hal::{UartRx, UartTx};

/// Error from UART operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UartBusError {
    /// Framing error
    Framing,
    /// Noise error
    Noise,
    /// Overrun error
    Overrun,
    /// Parity error
    Parity,
    /// Buffer too small
    BufferTooSmall,
    /// Transmit did not finish within its timeout
    Timeout,
    /// Other error
    Other,
}

impl From<usart::Error> for UartBusError {
    fn from(e: usart::Error) -> Self {
        match e {
            usart::Error::Framing => UartBusError::Framing,
            usart::Error::Noise => UartBusError::Noise,
            usart::Error::Overrun => UartBusError::Overrun,
            usart::Error::Parity => UartBusError::Parity,
            usart::Error::BufferTooLong => UartBusError::BufferTooSmall,
            _ => UartBusError::Other,
        }
    }
}

/// Translate the board-agnostic line settings into an embassy config
pub fn usart_config(config: &LineConfig) -> usart::Config {
    let mut out = usart::Config::default();
    out.baudrate = config.baudrate;
    out.data_bits = match config.data_bits {
        DataBits::Seven => usart::DataBits::DataBits7,
        DataBits::Eight => usart::DataBits::DataBits8,
    };
    out.parity = match config.parity {
        Parity::None => usart::Parity::ParityNone,
        Parity::Even => usart::Parity::ParityEven,
        Parity::Odd => usart::Parity::ParityOdd,
    };
    out.stop_bits = match config.stop_bits {
        StopBits::One => usart::StopBits::STOP1,
        StopBits::Two => usart::StopBits::STOP2,
    };
    out
}

/// Split a buffered UART into protocol receive and transmit halves
pub fn split<'d>(uart: BufferedUart<'d>) -> (SerialRx<'d>, SerialTx<'d>) {
    let (tx, rx) = uart.split();
    (SerialRx { rx }, SerialTx { tx })
}

/// Receive half
pub struct SerialRx<'d> {
    rx: BufferedUartRx<'d>,
}

impl UartRx for SerialRx<'_> {
    type Error = UartBusError;

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() || !self.rx.read_ready()? {
            return Ok(0);
        }
        // Data is pending, so this returns without waiting
        Ok(self.rx.read(buf)?)
    }
}

/// Transmit half
pub struct SerialTx<'d> {
    tx: BufferedUartTx<'d>,
}

impl UartTx for SerialTx<'_> {
    type Error = UartBusError;

    fn write_blocking(&mut self, data: &[u8], timeout_ms: u32) -> Result<(), Self::Error> {
        let deadline = Instant::now() + Duration::from_millis(u64::from(timeout_ms));
        let mut sent = 0;

        while sent < data.len() {
            if Instant::now() > deadline {
                return Err(UartBusError::Timeout);
            }
            sent += self.tx.write(&data[sent..])?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(self.tx.flush()?)
    }
}
