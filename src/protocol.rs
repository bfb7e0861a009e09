//! Chat wire protocol: framing and message schema.
//!
//! # Protocol
//!
//! Each message is one frame, a 4-byte big-endian length followed by a
//! compact UTF-8 JSON object tagged by its `type` field:
//!
//! ```text
//! 00 00 00 23 {"type":"login","username":"alice"}
//! ```
//!
//! | direction | type               | fields                                |
//! |-----------|--------------------|---------------------------------------|
//! | out       | `login`            | `username`                            |
//! | out       | `message`          | `text`                                |
//! | in        | `login`            | `success`, `reason` (when failed)     |
//! | in        | `message`          | `sender`, `text`                      |
//! | in        | `newuser`          | `username`                            |
//! | in        | `userdisconnected` | `username`                            |

pub mod framing;
pub mod message;

pub use framing::{encode_frame, encode_json, FrameBuffer, FrameError, DEFAULT_MAX_FRAME_SIZE};
pub use message::{parse, InboundMessage, LoginAck, OutboundMessage, Rejection};
