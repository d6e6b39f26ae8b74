//! Command, response and error code registries
//!
//! Requests flow host → bench, responses bench → host. Every request is
//! answered by exactly one response frame; failures are answered with
//! [`Response::Nak`] carrying a single [`ErrorCode`] byte.

// Request codes: host → bench
pub const CMD_PING: u8 = 0x01;
pub const CMD_GET_SENSOR_LIST: u8 = 0x02;
pub const CMD_TEST_ALL: u8 = 0x10;
pub const CMD_TEST_SINGLE: u8 = 0x11;
pub const CMD_START_ALL_ASYNC: u8 = 0x12;
pub const CMD_START_SINGLE_ASYNC: u8 = 0x13;
pub const CMD_GET_STATUS: u8 = 0x14;
pub const CMD_GET_REPORT: u8 = 0x15;
pub const CMD_CANCEL: u8 = 0x16;
pub const CMD_SET_SPEC: u8 = 0x20;
pub const CMD_GET_SPEC: u8 = 0x21;

// Response codes: bench → host
pub const RSP_PONG: u8 = 0x81;
pub const RSP_SENSOR_LIST: u8 = 0x82;
pub const RSP_TEST_RESULT: u8 = 0x90;
pub const RSP_STATUS: u8 = 0x94;
pub const RSP_SPEC_DATA: u8 = 0xA1;
pub const RSP_ACK: u8 = 0xF0;
pub const RSP_NAK: u8 = 0xFF;

/// Requests understood by the bench
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    Ping,
    GetSensorList,
    TestAll,
    TestSingle,
    StartAllAsync,
    StartSingleAsync,
    GetStatus,
    GetReport,
    Cancel,
    SetSpec,
    GetSpec,
}

impl Command {
    /// All requests, in code order
    pub const ALL: [Command; 11] = [
        Command::Ping,
        Command::GetSensorList,
        Command::TestAll,
        Command::TestSingle,
        Command::StartAllAsync,
        Command::StartSingleAsync,
        Command::GetStatus,
        Command::GetReport,
        Command::Cancel,
        Command::SetSpec,
        Command::GetSpec,
    ];

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            CMD_PING => Some(Command::Ping),
            CMD_GET_SENSOR_LIST => Some(Command::GetSensorList),
            CMD_TEST_ALL => Some(Command::TestAll),
            CMD_TEST_SINGLE => Some(Command::TestSingle),
            CMD_START_ALL_ASYNC => Some(Command::StartAllAsync),
            CMD_START_SINGLE_ASYNC => Some(Command::StartSingleAsync),
            CMD_GET_STATUS => Some(Command::GetStatus),
            CMD_GET_REPORT => Some(Command::GetReport),
            CMD_CANCEL => Some(Command::Cancel),
            CMD_SET_SPEC => Some(Command::SetSpec),
            CMD_GET_SPEC => Some(Command::GetSpec),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Command::Ping => CMD_PING,
            Command::GetSensorList => CMD_GET_SENSOR_LIST,
            Command::TestAll => CMD_TEST_ALL,
            Command::TestSingle => CMD_TEST_SINGLE,
            Command::StartAllAsync => CMD_START_ALL_ASYNC,
            Command::StartSingleAsync => CMD_START_SINGLE_ASYNC,
            Command::GetStatus => CMD_GET_STATUS,
            Command::GetReport => CMD_GET_REPORT,
            Command::Cancel => CMD_CANCEL,
            Command::SetSpec => CMD_SET_SPEC,
            Command::GetSpec => CMD_GET_SPEC,
        }
    }
}

/// Responses sent by the bench
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response {
    Pong,
    SensorList,
    TestResult,
    Status,
    SpecData,
    Ack,
    Nak,
}

impl Response {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            RSP_PONG => Some(Response::Pong),
            RSP_SENSOR_LIST => Some(Response::SensorList),
            RSP_TEST_RESULT => Some(Response::TestResult),
            RSP_STATUS => Some(Response::Status),
            RSP_SPEC_DATA => Some(Response::SpecData),
            RSP_ACK => Some(Response::Ack),
            RSP_NAK => Some(Response::Nak),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Response::Pong => RSP_PONG,
            Response::SensorList => RSP_SENSOR_LIST,
            Response::TestResult => RSP_TEST_RESULT,
            Response::Status => RSP_STATUS,
            Response::SpecData => RSP_SPEC_DATA,
            Response::Ack => RSP_ACK,
            Response::Nak => RSP_NAK,
        }
    }
}

/// Error codes carried in a NAK payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorCode {
    /// Request code is not in the handler table
    UnknownCommand,
    /// Payload too short, too long, or not parsable
    InvalidPayload,
    /// Sensor id unknown or not fitted on this bench
    InvalidSensorId,
    /// Received frame failed its check byte
    CrcFail,
    /// An async run is in progress
    Busy,
    /// No completed report to hand out
    NoReport,
    /// Serialized report does not fit one frame
    ReportTooLarge,
    /// Sensor lacks the capability the request needs
    NotSupported,
    /// Sensor has never been given a spec
    NoSpec,
}

impl ErrorCode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(ErrorCode::UnknownCommand),
            0x02 => Some(ErrorCode::InvalidPayload),
            0x03 => Some(ErrorCode::InvalidSensorId),
            0x04 => Some(ErrorCode::CrcFail),
            0x05 => Some(ErrorCode::Busy),
            0x06 => Some(ErrorCode::NoReport),
            0x07 => Some(ErrorCode::ReportTooLarge),
            0x08 => Some(ErrorCode::NotSupported),
            0x09 => Some(ErrorCode::NoSpec),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            ErrorCode::UnknownCommand => 0x01,
            ErrorCode::InvalidPayload => 0x02,
            ErrorCode::InvalidSensorId => 0x03,
            ErrorCode::CrcFail => 0x04,
            ErrorCode::Busy => 0x05,
            ErrorCode::NoReport => 0x06,
            ErrorCode::ReportTooLarge => 0x07,
            ErrorCode::NotSupported => 0x08,
            ErrorCode::NoSpec => 0x09,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_codes_roundtrip() {
        for cmd in Command::ALL {
            assert_eq!(Command::from_byte(cmd.to_byte()), Some(cmd));
        }
    }

    #[test]
    fn test_command_codes_are_unique() {
        for (i, a) in Command::ALL.iter().enumerate() {
            for b in &Command::ALL[i + 1..] {
                assert_ne!(a.to_byte(), b.to_byte());
            }
        }
    }

    #[test]
    fn test_responses_do_not_collide_with_requests() {
        for byte in 0..=u8::MAX {
            assert!(
                !(Command::from_byte(byte).is_some() && Response::from_byte(byte).is_some()),
                "code {:#04x} is both request and response",
                byte
            );
        }
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(Command::from_byte(0x00), None);
        assert_eq!(Command::from_byte(0x7F), None);
        assert_eq!(Command::from_byte(RSP_PONG), None);
    }

    #[test]
    fn test_error_code_bytes() {
        assert_eq!(ErrorCode::UnknownCommand.to_byte(), 0x01);
        assert_eq!(ErrorCode::CrcFail.to_byte(), 0x04);
        assert_eq!(ErrorCode::NotSupported.to_byte(), 0x08);
        for byte in 0x01..=0x09 {
            let code = ErrorCode::from_byte(byte).unwrap();
            assert_eq!(code.to_byte(), byte);
        }
        assert_eq!(ErrorCode::from_byte(0x00), None);
        assert_eq!(ErrorCode::from_byte(0x0A), None);
    }

    #[test]
    fn test_response_codes() {
        assert_eq!(Response::from_byte(0x81), Some(Response::Pong));
        assert_eq!(Response::Nak.to_byte(), 0xFF);
        assert_eq!(Response::from_byte(0x01), None);
    }
}
