//! Frame encoding and decoding for the sensor bench protocol.
//!
//! Frame format:
//! - START (1 byte): 0x02 synchronization byte
//! - LENGTH (1 byte): payload length (0-64), command byte not counted
//! - COMMAND (1 byte): request or response code
//! - PAYLOAD (0-64 bytes): command-specific data
//! - CHECK (1 byte): CRC-8 over LENGTH, COMMAND and all PAYLOAD bytes
//! - END (1 byte): 0x03 terminator
//!
//! Parsing is a pure function over an accumulation buffer owned by the
//! caller. It never discards the bytes of a frame that is still arriving,
//! and always reports how many leading bytes the caller may drop.

use heapless::Vec;

/// Frame synchronization byte
pub const FRAME_START: u8 = 0x02;

/// Frame terminator byte
pub const FRAME_END: u8 = 0x03;

/// Maximum payload size in bytes
pub const MAX_PAYLOAD_SIZE: usize = 64;

/// Bytes in a frame besides the payload (START + LENGTH + COMMAND + CHECK + END)
pub const FRAME_OVERHEAD: usize = 5;

/// Maximum complete frame size
pub const MAX_FRAME_SIZE: usize = MAX_PAYLOAD_SIZE + FRAME_OVERHEAD;

/// CRC-8 generator polynomial (x^8 + x^2 + x + 1)
pub const CRC8_POLY: u8 = 0x07;

const CRC8_TABLE: [u8; 256] = build_crc8_table();

const fn build_crc8_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ CRC8_POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// CRC-8 (poly 0x07, init 0x00, no reflection, no final XOR)
///
/// This is part of the wire contract: the host computes the same value
/// over `LENGTH ‖ COMMAND ‖ PAYLOAD`.
pub fn crc8(data: &[u8]) -> u8 {
    data.iter()
        .fold(0u8, |crc, &byte| CRC8_TABLE[(crc ^ byte) as usize])
}

/// Errors that can occur during frame construction or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Payload exceeds maximum allowed size
    PayloadTooLarge,
    /// Buffer too small for encoding
    BufferTooSmall,
}

/// Appending to a payload would exceed [`MAX_PAYLOAD_SIZE`]
///
/// The payload is left unchanged when this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CapacityError;

/// A parsed or constructed frame
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    /// Command (request) or response code
    pub command: u8,
    /// Payload data
    pub payload: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl Frame {
    /// Create a new frame with the given command and payload
    pub fn new(command: u8, payload: &[u8]) -> Result<Self, FrameError> {
        let mut payload_vec = Vec::new();
        payload_vec
            .extend_from_slice(payload)
            .map_err(|_| FrameError::PayloadTooLarge)?;

        Ok(Self {
            command,
            payload: payload_vec,
        })
    }

    /// Create a frame with no payload
    pub fn empty(command: u8) -> Self {
        Self {
            command,
            payload: Vec::new(),
        }
    }

    /// Number of valid payload bytes
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Total encoded size of this frame
    pub fn encoded_len(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }

    /// Append one byte to the payload
    pub fn push_u8(&mut self, byte: u8) -> Result<(), CapacityError> {
        self.payload.push(byte).map_err(|_| CapacityError)
    }

    /// Append a big-endian unsigned 16-bit value to the payload
    pub fn push_u16(&mut self, value: u16) -> Result<(), CapacityError> {
        self.push_bytes(&value.to_be_bytes())
    }

    /// Append a big-endian signed 16-bit value to the payload
    pub fn push_i16(&mut self, value: i16) -> Result<(), CapacityError> {
        self.push_bytes(&value.to_be_bytes())
    }

    /// Append a run of raw bytes to the payload
    ///
    /// Either all of `data` is appended or nothing is.
    pub fn push_bytes(&mut self, data: &[u8]) -> Result<(), CapacityError> {
        self.payload.extend_from_slice(data).map_err(|_| CapacityError)
    }

    /// Encode this frame into a byte buffer
    ///
    /// Returns the number of bytes written
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        let frame_len = self.encoded_len();
        if buffer.len() < frame_len {
            return Err(FrameError::BufferTooSmall);
        }

        let payload_end = 3 + self.payload.len();

        buffer[0] = FRAME_START;
        buffer[1] = self.payload.len() as u8;
        buffer[2] = self.command;
        buffer[3..payload_end].copy_from_slice(&self.payload);
        buffer[payload_end] = crc8(&buffer[1..payload_end]);
        buffer[payload_end + 1] = FRAME_END;

        Ok(frame_len)
    }

    /// Encode this frame into a heapless Vec
    pub fn encode_to_vec(&self) -> Vec<u8, MAX_FRAME_SIZE> {
        let mut buffer = [0u8; MAX_FRAME_SIZE];
        // A payload is never larger than MAX_PAYLOAD_SIZE, so this cannot fail
        let len = self.encode(&mut buffer).unwrap_or(0);
        let mut vec = Vec::new();
        let _ = vec.extend_from_slice(&buffer[..len]);
        vec
    }
}

/// Result classification of a single [`parse`] call
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseOutcome {
    /// A complete, verified frame
    Ok(Frame),
    /// Need more bytes
    Incomplete,
    /// Frame boundaries look right but the check byte does not match
    ChecksumError,
    /// Malformed: declared length too large or terminator missing
    FormatError,
}

/// Outcome of [`parse`] plus the number of leading bytes the caller must drop
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ParseResult {
    /// What was found
    pub outcome: ParseOutcome,
    /// Bytes at the front of the buffer that have been dealt with
    pub consumed: usize,
}

impl ParseResult {
    fn new(outcome: ParseOutcome, consumed: usize) -> Self {
        Self { outcome, consumed }
    }
}

/// Extract at most one frame from the front of `buffer`
///
/// Resynchronization rules:
/// - bytes before the first START are always consumed
/// - a bad LENGTH or END consumes only through that START, so a START
///   hidden inside the rejected bytes is found on the next call
/// - a checksum mismatch consumes the whole apparent frame
/// - an incomplete frame is never consumed
pub fn parse(buffer: &[u8]) -> ParseResult {
    let Some(start) = buffer.iter().position(|&b| b == FRAME_START) else {
        return ParseResult::new(ParseOutcome::Incomplete, buffer.len());
    };

    let frame = &buffer[start..];
    if frame.len() < 2 {
        return ParseResult::new(ParseOutcome::Incomplete, start);
    }

    let payload_len = frame[1] as usize;
    if payload_len > MAX_PAYLOAD_SIZE {
        return ParseResult::new(ParseOutcome::FormatError, start + 1);
    }

    let expected_size = FRAME_OVERHEAD + payload_len;
    if frame.len() < expected_size {
        return ParseResult::new(ParseOutcome::Incomplete, start);
    }

    if frame[expected_size - 1] != FRAME_END {
        return ParseResult::new(ParseOutcome::FormatError, start + 1);
    }

    let payload_end = 3 + payload_len;
    if crc8(&frame[1..payload_end]) != frame[payload_end] {
        return ParseResult::new(ParseOutcome::ChecksumError, start + expected_size);
    }

    let mut payload = Vec::new();
    // Length was checked against MAX_PAYLOAD_SIZE above
    let _ = payload.extend_from_slice(&frame[3..payload_end]);

    ParseResult::new(
        ParseOutcome::Ok(Frame {
            command: frame[2],
            payload,
        }),
        start + expected_size,
    )
}

/// Serialize `frame` into `buffer`, returning the number of bytes written
///
/// A buffer of [`MAX_FRAME_SIZE`] bytes always suffices.
pub fn build(frame: &Frame, buffer: &mut [u8]) -> Result<usize, FrameError> {
    frame.encode(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ping_bytes() -> [u8; 5] {
        [FRAME_START, 0x00, 0x01, crc8(&[0x00, 0x01]), FRAME_END]
    }

    #[test]
    fn test_crc8_reference_values() {
        assert_eq!(crc8(&[]), 0x00);
        assert_eq!(crc8(&[0x00]), 0x00);
        assert_eq!(crc8(&[0x01]), 0x07);
        assert_eq!(crc8(&[0xFF]), 0xF3);
        // CRC-8/SMBUS check value
        assert_eq!(crc8(b"123456789"), 0xF4);
    }

    #[test]
    fn test_frame_encode_empty_payload() {
        let frame = Frame::empty(0x01);
        let mut buffer = [0u8; 10];
        let len = frame.encode(&mut buffer).unwrap();

        assert_eq!(len, 5);
        assert_eq!(&buffer[..5], &ping_bytes());
    }

    #[test]
    fn test_frame_encode_with_payload() {
        let frame = Frame::new(0x11, &[0x01]).unwrap();
        let mut buffer = [0u8; 10];
        let len = frame.encode(&mut buffer).unwrap();

        assert_eq!(len, 6);
        assert_eq!(buffer[0], FRAME_START);
        assert_eq!(buffer[1], 1); // length
        assert_eq!(buffer[2], 0x11); // command
        assert_eq!(buffer[3], 0x01); // sensor id
        assert_eq!(buffer[4], crc8(&[0x01, 0x11, 0x01]));
        assert_eq!(buffer[5], FRAME_END);
    }

    #[test]
    fn test_encode_buffer_too_small() {
        let frame = Frame::new(0x20, &[1, 2, 3]).unwrap();
        let mut buffer = [0u8; 7];
        assert_eq!(frame.encode(&mut buffer), Err(FrameError::BufferTooSmall));
    }

    #[test]
    fn test_payload_too_large() {
        let large_payload = [0u8; MAX_PAYLOAD_SIZE + 1];
        let result = Frame::new(0x20, &large_payload);
        assert_eq!(result, Err(FrameError::PayloadTooLarge));
    }

    #[test]
    fn test_push_helpers_big_endian() {
        let mut frame = Frame::empty(0x90);
        frame.push_u8(0xAB).unwrap();
        frame.push_u16(0x1234).unwrap();
        frame.push_i16(-2).unwrap();
        frame.push_bytes(&[9, 8]).unwrap();

        assert_eq!(&frame.payload[..], &[0xAB, 0x12, 0x34, 0xFF, 0xFE, 9, 8]);
    }

    #[test]
    fn test_push_helpers_refuse_overflow() {
        let mut frame = Frame::new(0x90, &[0u8; MAX_PAYLOAD_SIZE - 1]).unwrap();

        assert_eq!(frame.push_u16(0xFFFF), Err(CapacityError));
        assert_eq!(frame.push_bytes(&[1, 2]), Err(CapacityError));
        assert_eq!(frame.payload_len(), MAX_PAYLOAD_SIZE - 1);

        frame.push_u8(0x55).unwrap();
        assert_eq!(frame.push_u8(0x56), Err(CapacityError));
        assert_eq!(frame.payload_len(), MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn test_parse_zero_length_frame() {
        let result = parse(&ping_bytes());
        assert_eq!(result.consumed, 5);
        match result.outcome {
            ParseOutcome::Ok(frame) => {
                assert_eq!(frame.command, 0x01);
                assert_eq!(frame.payload_len(), 0);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_parse_empty_buffer() {
        assert_eq!(parse(&[]), ParseResult::new(ParseOutcome::Incomplete, 0));
    }

    #[test]
    fn test_parse_garbage_only_is_consumed() {
        let result = parse(&[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(result, ParseResult::new(ParseOutcome::Incomplete, 4));
    }

    #[test]
    fn test_parse_start_only() {
        let result = parse(&[0xAA, FRAME_START]);
        assert_eq!(result, ParseResult::new(ParseOutcome::Incomplete, 1));
    }

    #[test]
    fn test_parse_length_too_large() {
        let result = parse(&[0x55, 0x66, FRAME_START, 100]);
        assert_eq!(result, ParseResult::new(ParseOutcome::FormatError, 3));
    }

    #[test]
    fn test_parse_missing_terminator() {
        let mut bytes = ping_bytes();
        bytes[4] = 0xFF;
        let result = parse(&bytes);
        assert_eq!(result, ParseResult::new(ParseOutcome::FormatError, 1));
    }

    #[test]
    fn test_parse_checksum_error_consumes_frame() {
        let bytes = [0x00, FRAME_START, 0x00, 0x01, 0xFF, FRAME_END];
        let result = parse(&bytes);
        assert_eq!(result, ParseResult::new(ParseOutcome::ChecksumError, 6));
    }

    #[test]
    fn test_parse_partial_frame_keeps_bytes() {
        let frame = Frame::new(0x20, &[0x01, 0x0E, 0x74, 0x00, 0xC8]).unwrap();
        let encoded = frame.encode_to_vec();

        let mut data = Vec::<u8, 32>::new();
        data.extend_from_slice(&[0x11, 0x22]).unwrap();
        data.extend_from_slice(&encoded[..6]).unwrap();

        let result = parse(&data);
        assert_eq!(result, ParseResult::new(ParseOutcome::Incomplete, 2));
    }

    #[test]
    fn test_parse_bad_end_finds_embedded_start() {
        // A truncated frame whose tail contains a complete valid frame
        let inner = ping_bytes();
        let mut data = Vec::<u8, 32>::new();
        data.extend_from_slice(&[FRAME_START, 0x01, 0x10]).unwrap();
        data.extend_from_slice(&inner).unwrap();

        let first = parse(&data);
        assert_eq!(first.outcome, ParseOutcome::FormatError);
        assert_eq!(first.consumed, 1);

        let second = parse(&data[first.consumed..]);
        assert_eq!(second.consumed, 2 + inner.len());
        assert!(matches!(second.outcome, ParseOutcome::Ok(ref f) if f.command == 0x01));
    }

    #[test]
    fn test_parse_two_frames_back_to_back() {
        let mut data = Vec::<u8, 16>::new();
        data.extend_from_slice(&ping_bytes()).unwrap();
        data.extend_from_slice(&ping_bytes()).unwrap();

        let first = parse(&data);
        assert_eq!(first.consumed, 5);
        let second = parse(&data[first.consumed..]);
        assert_eq!(second.consumed, 5);
        assert!(matches!(second.outcome, ParseOutcome::Ok(_)));
    }

    fn payload_strategy() -> impl Strategy<Value = std::vec::Vec<u8>> {
        proptest::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD_SIZE)
    }

    proptest! {
        #[test]
        fn prop_roundtrip(command in any::<u8>(), payload in payload_strategy()) {
            let frame = Frame::new(command, &payload).unwrap();
            let mut buffer = [0u8; MAX_FRAME_SIZE];
            let len = build(&frame, &mut buffer).unwrap();

            let result = parse(&buffer[..len]);
            prop_assert_eq!(result.consumed, len);
            prop_assert_eq!(result.outcome, ParseOutcome::Ok(frame));
        }

        #[test]
        fn prop_resync_after_garbage(
            garbage in proptest::collection::vec(
                any::<u8>().prop_filter("no start byte", |b| *b != FRAME_START),
                0..48,
            ),
            command in any::<u8>(),
            payload in payload_strategy(),
        ) {
            let frame = Frame::new(command, &payload).unwrap();
            let encoded = frame.encode_to_vec();

            let mut stream = garbage.clone();
            stream.extend_from_slice(&encoded);

            let mut offset = 0;
            let mut found = None;
            while offset < stream.len() {
                let result = parse(&stream[offset..]);
                offset += result.consumed;
                match result.outcome {
                    ParseOutcome::Ok(f) => {
                        found = Some(f);
                        break;
                    }
                    ParseOutcome::Incomplete => break,
                    _ => {}
                }
            }

            prop_assert!(offset <= garbage.len() + encoded.len());
            prop_assert_eq!(found, Some(frame));
        }

        #[test]
        fn prop_single_bit_flip_is_checksum_error(
            command in any::<u8>(),
            payload in proptest::collection::vec(any::<u8>(), 1..=MAX_PAYLOAD_SIZE),
            index in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let frame = Frame::new(command, &payload).unwrap();
            let mut encoded = frame.encode_to_vec();
            let target = 3 + index.index(payload.len());
            encoded[target] ^= 1 << bit;

            let result = parse(&encoded);
            prop_assert_eq!(result.outcome, ParseOutcome::ChecksumError);
            prop_assert_eq!(result.consumed, encoded.len());
        }

        #[test]
        fn prop_length_bit_flip_never_yields_original(
            command in any::<u8>(),
            payload in payload_strategy(),
            bit in 0u8..8,
        ) {
            let frame = Frame::new(command, &payload).unwrap();
            let mut encoded = frame.encode_to_vec();
            encoded[1] ^= 1 << bit;

            let result = parse(&encoded);
            prop_assert_ne!(result.outcome, ParseOutcome::Ok(frame));
        }

        #[test]
        fn prop_byte_at_a_time_is_incomplete_until_last(
            command in any::<u8>(),
            payload in payload_strategy(),
        ) {
            let frame = Frame::new(command, &payload).unwrap();
            let encoded = frame.encode_to_vec();

            for end in 0..encoded.len() {
                let result = parse(&encoded[..end]);
                prop_assert_eq!(result, ParseResult::new(ParseOutcome::Incomplete, 0));
            }

            let result = parse(&encoded);
            prop_assert_eq!(result.outcome, ParseOutcome::Ok(frame));
        }
    }
}
