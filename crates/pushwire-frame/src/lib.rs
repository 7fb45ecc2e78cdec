//! Length-prefixed framing for the pushwire device protocol.
//!
//! Every message travels as one frame:
//! - A 2-byte big-endian payload length
//! - The payload itself (a compact JSON message)
//!
//! The 16-bit prefix makes 65535 bytes a hard ceiling on a frame payload.
//! Messages that may grow beyond it are split upstream before framing.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

#[cfg(feature = "async")]
pub use async_codec::PushCodec;
pub use codec::{decode_frame, encode_frame, Frame, FrameConfig, HEADER_SIZE, MAX_FRAME_PAYLOAD};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
