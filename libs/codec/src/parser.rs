//! # Sensor Frame Parser
//!
//! ## Purpose
//!
//! Stateless decoding of the two frame kinds sensors publish:
//! - **Audio frames**: 4-byte big-endian sequence number followed by raw PCM
//! - **Presence frames**: the literal text `online` or `offline`
//!
//! ## Ownership
//!
//! `decode_packet` copies the PCM out of the input slice. The MQTT client reuses or
//! drops its receive buffer as soon as the dispatch callback returns, and the packet
//! may sit in a sensor queue long after that.

use crate::error::{CodecError, CodecResult};
use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use types::{Packet, PresenceEvent, PresenceStatus, SEQUENCE_HEADER_LEN};

use crate::topics::sensor_id_from_topic;

/// Decode one audio frame into a [`Packet`]
///
/// Frames shorter than the sequence header are rejected. A frame of exactly the header
/// length decodes to a packet with an empty payload.
pub fn decode_packet(data: &[u8]) -> CodecResult<Packet> {
    if data.len() < SEQUENCE_HEADER_LEN {
        return Err(CodecError::message_too_small(
            SEQUENCE_HEADER_LEN,
            data.len(),
            "audio frame sequence header",
        ));
    }

    let sequence = BigEndian::read_u32(&data[..SEQUENCE_HEADER_LEN]);
    let payload = Bytes::copy_from_slice(&data[SEQUENCE_HEADER_LEN..]);

    Ok(Packet { sequence, payload })
}

/// Frame PCM bytes with a sequence header, the inverse of [`decode_packet`]
pub fn encode_packet(sequence: u32, pcm: &[u8]) -> Vec<u8> {
    let mut frame = vec![0u8; SEQUENCE_HEADER_LEN + pcm.len()];
    BigEndian::write_u32(&mut frame[..SEQUENCE_HEADER_LEN], sequence);
    frame[SEQUENCE_HEADER_LEN..].copy_from_slice(pcm);
    frame
}

/// Decode a presence frame
///
/// The sensor id is the final segment of the topic; the payload must be exactly
/// `online` or `offline`.
pub fn decode_presence(topic: &str, payload: &[u8]) -> CodecResult<PresenceEvent> {
    let sensor = sensor_id_from_topic(topic).map_err(|e| CodecError::invalid_value(topic, e))?;

    let text = std::str::from_utf8(payload).map_err(|_| CodecError::NonUtf8Presence {
        topic: topic.to_string(),
        len: payload.len(),
    })?;

    let status = text
        .parse::<PresenceStatus>()
        .map_err(|e| CodecError::invalid_value(topic, e))?;

    Ok(PresenceEvent { sensor, status })
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::SensorId;

    #[test]
    fn test_decode_sequence_and_payload() {
        let frame = [0x00, 0x00, 0x01, 0x02, 0xAA, 0xBB, 0xCC];
        let packet = decode_packet(&frame).unwrap();
        assert_eq!(packet.sequence, 258);
        assert_eq!(packet.payload.as_ref(), &[0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_decode_header_only_frame() {
        let packet = decode_packet(&[0xFF, 0xFF, 0xFF, 0xFF]).unwrap();
        assert_eq!(packet.sequence, u32::MAX);
        assert!(packet.is_empty());
    }

    #[test]
    fn test_decode_rejects_undersized_frame() {
        for len in 0..SEQUENCE_HEADER_LEN {
            let frame = vec![0u8; len];
            match decode_packet(&frame) {
                Err(CodecError::MessageTooSmall { need, got, .. }) => {
                    assert_eq!(need, 4);
                    assert_eq!(got, len);
                }
                other => panic!("expected MessageTooSmall, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_payload_is_copied_not_aliased() {
        let mut frame = encode_packet(9, &[1, 2, 3, 4]);
        let packet = decode_packet(&frame).unwrap();

        // Transport reuses its buffer after dispatch
        frame.iter_mut().for_each(|b| *b = 0);

        assert_eq!(packet.sequence, 9);
        assert_eq!(packet.payload.as_ref(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_encode_layout() {
        let frame = encode_packet(0x01020304, &[0x10, 0x20]);
        assert_eq!(frame, vec![0x01, 0x02, 0x03, 0x04, 0x10, 0x20]);
    }

    #[test]
    fn test_decode_presence() {
        let event = decode_presence("sensors/status/7", b"online").unwrap();
        assert_eq!(event.sensor, SensorId::new(7));
        assert_eq!(event.status, PresenceStatus::Online);

        let event = decode_presence("sensors/status/7", b"offline").unwrap();
        assert_eq!(event.status, PresenceStatus::Offline);
    }

    #[test]
    fn test_decode_presence_rejects_bad_input() {
        assert!(matches!(
            decode_presence("sensors/status/7", b"sleeping"),
            Err(CodecError::InvalidValue { .. })
        ));
        assert!(matches!(
            decode_presence("sensors/status/abc", b"online"),
            Err(CodecError::InvalidValue { .. })
        ));
        assert!(matches!(
            decode_presence("sensors/status/", b"online"),
            Err(CodecError::InvalidValue { .. })
        ));
        assert!(matches!(
            decode_presence("sensors/status/3", &[0xFF, 0xFE]),
            Err(CodecError::NonUtf8Presence { len: 2, .. })
        ));
    }
}
