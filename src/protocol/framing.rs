//! Length-prefixed message framing for the chat wire protocol.
//!
//! Every message travels as a single frame: a 4-byte big-endian byte count
//! followed by exactly that many bytes of UTF-8 JSON. There is no delimiter
//! between frames; the prefix is the only framing mechanism.
//!
//! # Wire Format
//!
//! ```text
//! +----------------+---------------------------+
//! | length (u32 BE)| payload (length bytes)    |
//! +----------------+---------------------------+
//! ```
//!
//! The prefix value `0xFFFF_FFFF` marks a null byte array and decodes as an
//! empty payload.
//!
//! Incoming bytes are accumulated in a [`FrameBuffer`]. A decode attempt
//! either consumes one whole frame or leaves the buffer untouched, so a frame
//! split across any number of socket reads is reassembled transparently.

use bytes::{Buf, Bytes, BytesMut};
use serde::Serialize;
use thiserror::Error;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Prefix value used for a null byte array.
const NULL_LENGTH: u32 = u32::MAX;

/// Default cap on a single frame's payload (16MB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Initial receive buffer capacity.
const INITIAL_CAPACITY: usize = 8 * 1024;

/// Framing errors.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The peer declared a payload larger than this client accepts.
    #[error("Frame of {declared} bytes exceeds maximum {max} bytes")]
    Oversized {
        /// Declared payload length from the prefix.
        declared: usize,
        /// Configured limit.
        max: usize,
    },

    /// The payload cannot be described by a 32-bit prefix.
    #[error("Payload of {0} bytes cannot be framed")]
    PayloadTooLarge(usize),

    /// Outbound value could not be serialized.
    #[error("Failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Frame a raw payload by prepending its length.
///
/// # Errors
///
/// Returns [`FrameError::PayloadTooLarge`] if the payload length collides with
/// the null marker or does not fit in a `u32`.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len != NULL_LENGTH)
        .ok_or(FrameError::PayloadTooLarge(payload.len()))?;

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Serialize `value` as compact JSON and frame it.
///
/// # Example
///
/// ```ignore
/// let frame = encode_json(&OutboundMessage::Login { username: "alice".into() })?;
/// stream.write_all(&frame).await?;
/// ```
pub fn encode_json<T: Serialize>(value: &T) -> Result<Vec<u8>, FrameError> {
    let payload = serde_json::to_vec(value)?;
    encode_frame(&payload)
}

/// Accumulates bytes from the transport and yields complete frame payloads.
#[derive(Debug)]
pub struct FrameBuffer {
    buffer: BytesMut,
    max_frame_size: usize,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    /// Create an empty buffer with the default frame size limit.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create an empty buffer with a custom frame size limit.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
            max_frame_size,
        }
    }

    /// Append bytes delivered by the transport.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to take the next complete frame off the front of the buffer.
    ///
    /// Returns:
    /// - `Ok(Some(payload))` when a whole frame was present and consumed
    /// - `Ok(None)` when more bytes are needed; the buffer is unchanged
    /// - `Err(FrameError::Oversized)` when the declared length exceeds the
    ///   limit; the buffer is unchanged
    pub fn try_decode_next(&mut self) -> Result<Option<Bytes>, FrameError> {
        if self.buffer.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        // Peek at the prefix without consuming it
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        prefix.copy_from_slice(&self.buffer[..LENGTH_PREFIX_SIZE]);
        let declared = u32::from_be_bytes(prefix);

        if declared == NULL_LENGTH {
            self.buffer.advance(LENGTH_PREFIX_SIZE);
            return Ok(Some(Bytes::new()));
        }

        let declared = declared as usize;
        if declared > self.max_frame_size {
            return Err(FrameError::Oversized {
                declared,
                max: self.max_frame_size,
            });
        }

        if self.buffer.len() - LENGTH_PREFIX_SIZE < declared {
            return Ok(None);
        }

        self.buffer.advance(LENGTH_PREFIX_SIZE);
        Ok(Some(self.buffer.split_to(declared).freeze()))
    }

    /// Number of buffered, not yet consumed bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discard everything buffered, including any partial frame.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frame(json: &str) -> Vec<u8> {
        encode_frame(json.as_bytes()).expect("frame should encode")
    }

    fn drain(buffer: &mut FrameBuffer) -> Vec<Bytes> {
        let mut frames = Vec::new();
        while let Some(payload) = buffer.try_decode_next().expect("decode should not fail") {
            frames.push(payload);
        }
        frames
    }

    #[test]
    fn test_encode_prefixes_big_endian_length() {
        let encoded = frame(r#"{"type":"login"}"#);

        assert_eq!(&encoded[..4], &[0, 0, 0, 16]);
        assert_eq!(&encoded[4..], br#"{"type":"login"}"#);
    }

    #[test]
    fn test_encode_json_is_compact() {
        let value = serde_json::json!({"type": "message", "text": "hi"});
        let encoded = encode_json(&value).unwrap();

        let body = std::str::from_utf8(&encoded[LENGTH_PREFIX_SIZE..]).unwrap();
        assert!(!body.contains(' '), "Expected compact JSON, got: {}", body);
        assert_eq!(encoded.len(), LENGTH_PREFIX_SIZE + body.len());
    }

    #[test]
    fn test_incomplete_prefix_leaves_buffer_untouched() {
        let mut buffer = FrameBuffer::new();
        buffer.extend(&[0, 0]);

        assert!(buffer.try_decode_next().unwrap().is_none());
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_incomplete_payload_leaves_buffer_untouched() {
        let encoded = frame(r#"{"type":"newuser","username":"bob"}"#);
        let (head, last) = encoded.split_at(encoded.len() - 1);

        let mut buffer = FrameBuffer::new();
        buffer.extend(head);
        assert!(buffer.try_decode_next().unwrap().is_none());
        assert_eq!(buffer.len(), head.len());

        buffer.extend(last);
        let frames = drain(&mut buffer);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], br#"{"type":"newuser","username":"bob"}"#);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_delivery() {
        let mut stream = frame(r#"{"a":1}"#);
        stream.extend(frame(r#"{"b":2}"#));
        stream.extend(frame(r#"{"c":3}"#));

        let mut buffer = FrameBuffer::new();
        buffer.extend(&stream);
        let frames = drain(&mut buffer);

        assert_eq!(frames.len(), 3);
        assert_eq!(&frames[2][..], br#"{"c":3}"#);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_trailing_fragment_is_kept_for_next_delivery() {
        let mut stream = frame(r#"{"a":1}"#);
        let second = frame(r#"{"b":2}"#);
        stream.extend_from_slice(&second[..3]);

        let mut buffer = FrameBuffer::new();
        buffer.extend(&stream);
        assert_eq!(drain(&mut buffer).len(), 1);
        assert_eq!(buffer.len(), 3);

        buffer.extend(&second[3..]);
        let frames = drain(&mut buffer);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], br#"{"b":2}"#);
    }

    #[test]
    fn test_fragmentation_invariance_at_every_split_point() {
        let mut stream = frame(r#"{"type":"login","success":true}"#);
        stream.extend(frame(""));
        stream.extend(frame(r#"{"type":"message","sender":"bob","text":"hi"}"#));

        let mut whole = FrameBuffer::new();
        whole.extend(&stream);
        let expected = drain(&mut whole);
        assert_eq!(expected.len(), 3);

        for split in 0..=stream.len() {
            let mut buffer = FrameBuffer::new();
            let mut frames = Vec::new();
            buffer.extend(&stream[..split]);
            frames.extend(drain(&mut buffer));
            buffer.extend(&stream[split..]);
            frames.extend(drain(&mut buffer));

            assert_eq!(frames, expected, "split at byte {}", split);
        }
    }

    #[test]
    fn test_byte_at_a_time_delivery() {
        let mut stream = frame(r#"{"x":"first"}"#);
        stream.extend(frame(r#"{"x":"second"}"#));

        let mut buffer = FrameBuffer::new();
        let mut frames = Vec::new();
        for byte in &stream {
            buffer.extend(std::slice::from_ref(byte));
            frames.extend(drain(&mut buffer));
        }

        assert_eq!(frames.len(), 2);
        assert_eq!(&frames[0][..], br#"{"x":"first"}"#);
        assert_eq!(&frames[1][..], br#"{"x":"second"}"#);
    }

    #[test]
    fn test_null_marker_decodes_as_empty_payload() {
        let mut buffer = FrameBuffer::new();
        buffer.extend(&[0xFF, 0xFF, 0xFF, 0xFF]);
        buffer.extend(&frame(r#"{"a":1}"#));

        let frames = drain(&mut buffer);
        assert_eq!(frames.len(), 2);
        assert!(frames[0].is_empty());
    }

    #[test]
    fn test_oversized_frame_is_rejected_without_consuming() {
        let mut buffer = FrameBuffer::with_max_frame_size(8);
        buffer.extend(&frame(r#"{"too":"long"}"#));
        let before = buffer.len();

        let err = buffer.try_decode_next().unwrap_err();
        assert!(
            err.to_string().contains("exceeds maximum"),
            "Expected size error, got: {}",
            err
        );
        assert_eq!(buffer.len(), before);
    }

    #[test]
    fn test_clear_discards_partial_frame() {
        let encoded = frame(r#"{"a":1}"#);
        let mut buffer = FrameBuffer::new();
        buffer.extend(&encoded[..6]);

        buffer.clear();
        buffer.extend(&encoded);

        assert_eq!(drain(&mut buffer).len(), 1);
        assert!(buffer.is_empty());
    }
}
