//! Frame encoding and decoding.
//!
//! Outbound frame (7 bytes):
//! ```text
//! ┌───────┬──────┬───────┬─────────┬──────┬─────┬──────────┐
//! │ 0xFD  │ left │ right │ flipper │ mode │ arg │ checksum │
//! └───────┴──────┴───────┴─────────┴──────┴─────┴──────────┘
//! ```
//! Inbound frame (5 bytes):
//! ```text
//! ┌──────┬────┬──────────┬──────────┬─────────┐
//! │ echo │ id │ value hi │ value lo │ trailer │
//! └──────┴────┴──────────┴──────────┴─────────┘
//! ```
//! The inbound trailer is carried through untouched; it is never validated.

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::debug;

use crate::constants::*;
use crate::error::RoverError;
use crate::types::{Frame, MotorState, Param};

/// Encoded outbound frame
pub type OutboundFrame = [u8; OUTBOUND_FRAME_LEN];

/// Calculate checksum for a frame payload: `255 - (sum mod 255)`
pub fn checksum(payload: &[u8]) -> u8 {
    let sum: u32 = payload.iter().map(|&b| b as u32).sum();
    (255 - sum % 255) as u8
}

fn encode(motors: MotorState, mode: u8, arg: u8) -> OutboundFrame {
    let payload = [motors.left, motors.right, motors.flipper, mode, arg];
    [
        START_BYTE,
        payload[0],
        payload[1],
        payload[2],
        payload[3],
        payload[4],
        checksum(&payload),
    ]
}

/// Plain motor command
pub fn encode_command(motors: MotorState) -> OutboundFrame {
    encode(motors, MODE_NONE, 0)
}

/// Parameter request. Still carries the current motion bytes.
pub fn encode_request(motors: MotorState, param: Param) -> OutboundFrame {
    encode(motors, REQUEST_FLAG, param.id())
}

/// Low speed mode toggle
pub fn encode_speed_mode(motors: MotorState, slow: bool) -> OutboundFrame {
    encode(motors, LOW_SPEED_MODE_FLAG, u8::from(slow))
}

/// Decode one inbound frame. The value is big-endian.
pub fn decode(bytes: &[u8; INBOUND_FRAME_LEN]) -> Frame {
    Frame {
        id: bytes[1],
        value: u16::from_be_bytes([bytes[2], bytes[3]]),
        trailer: bytes[4],
    }
}

/// Space separated hex dump for trace output
pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Slices the inbound byte stream into fixed-size response frames.
///
/// Partial trailing bytes stay buffered until the rest of the frame arrives. At end of
/// stream they can never complete, so they are dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct InboundCodec;

impl Decoder for InboundCodec {
    type Item = Frame;
    type Error = RoverError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, RoverError> {
        if src.len() < INBOUND_FRAME_LEN {
            src.reserve(INBOUND_FRAME_LEN - src.len());
            return Ok(None);
        }

        let chunk = src.split_to(INBOUND_FRAME_LEN);
        let mut raw = [0u8; INBOUND_FRAME_LEN];
        raw.copy_from_slice(&chunk);
        Ok(Some(decode(&raw)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, RoverError> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if !src.is_empty() {
            debug!(rx = %hex(src), "dropping partial frame at end of stream");
            src.clear();
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_sum(frame: &OutboundFrame) -> u32 {
        frame[1..6].iter().map(|&b| b as u32).sum()
    }

    #[test]
    fn test_command_checksum_for_all_throttles() {
        for left in 0..=255u8 {
            for right in (0..=255u8).step_by(17) {
                let frame = encode_command(MotorState::new(left, right));
                assert_eq!(frame[0], START_BYTE);
                assert_eq!(frame[6] as u32, 255 - payload_sum(&frame) % 255);
            }
        }
    }

    #[test]
    fn test_command_layout() {
        let frame = encode_command(MotorState::default());
        // 125 + 125 + 125 = 375, 375 % 255 = 120
        assert_eq!(frame, [0xFD, 125, 125, 125, 0, 0, 135]);
    }

    #[test]
    fn test_request_carries_flag_and_id() {
        for param in Param::ALL {
            for (left, right) in [(0, 0), (125, 125), (250, 3), (255, 255)] {
                let frame = encode_request(MotorState::new(left, right), param);
                assert_eq!(frame[1], left);
                assert_eq!(frame[2], right);
                assert_eq!(frame[4], REQUEST_FLAG);
                assert_eq!(frame[5], param.id());
                assert_eq!(frame[6], checksum(&frame[1..6]));
            }
        }
    }

    #[test]
    fn test_speed_mode_argument() {
        let motors = MotorState::new(140, 110);
        let slow = encode_speed_mode(motors, true);
        let normal = encode_speed_mode(motors, false);
        assert_eq!(slow[4], LOW_SPEED_MODE_FLAG);
        assert_eq!(slow[5], 1);
        assert_eq!(normal[5], 0);
        assert_eq!(&slow[1..3], &[140, 110]);
    }

    #[test]
    fn test_checksum_wraps_at_255() {
        assert_eq!(checksum(&[0, 0, 0, 0, 0]), 255);
        assert_eq!(checksum(&[255, 0, 0, 0, 0]), 255);
        assert_eq!(checksum(&[254, 0, 0, 0, 0]), 1);
        assert_eq!(checksum(&[255, 255, 255, 255, 255]), 255);
    }

    #[test]
    fn test_decode_big_endian_value() {
        let frame = decode(&[0xFD, 24, 0x01, 0x2C, 0x99]);
        assert_eq!(frame.id, 24);
        assert_eq!(frame.value, 300);
        assert_eq!(frame.trailer, 0x99);
        assert_eq!(frame.param(), Some(Param::BatteryVoltageA));
    }

    #[test]
    fn test_codec_waits_for_full_frame() {
        let mut codec = InboundCodec;
        let mut buf = BytesMut::from(&[0xFD, 40, 0x00][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 3);

        buf.extend_from_slice(&[0x07, 0x00, 0xFD]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.id, 40);
        assert_eq!(frame.value, 7);
        assert_eq!(&buf[..], &[0xFD]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_codec_splits_back_to_back_frames() {
        let mut codec = InboundCodec;
        let mut buf = BytesMut::from(&[0xFD, 2, 0, 1, 0, 0xFD, 4, 0, 2, 0][..]);
        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!((first.id, first.value), (2, 1));
        assert_eq!((second.id, second.value), (4, 2));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_codec_drops_partial_frame_at_eof() {
        let mut codec = InboundCodec;
        let mut buf = BytesMut::from(&[0xFD, 6, 0, 9, 0, 0xFD, 8][..]);

        let frame = codec.decode_eof(&mut buf).unwrap().unwrap();
        assert_eq!((frame.id, frame.value), (6, 9));
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_hex_dump() {
        assert_eq!(hex(&[0xFD, 0x0A, 0x00]), "FD 0A 00");
    }
}
