//! `tokio_util` codec for embedding the frame format in async services.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_frame, Frame, FrameConfig};
use crate::error::FrameError;

/// Frame codec for `tokio_util::codec::Framed`.
#[derive(Debug, Clone, Default)]
pub struct PushCodec {
    config: FrameConfig,
}

impl PushCodec {
    /// Create a codec with explicit configuration.
    pub fn new(config: FrameConfig) -> Self {
        Self { config }
    }
}

impl Decoder for PushCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        decode_frame(src, self.config.max_payload_size)
    }
}

impl Encoder<Bytes> for PushCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), FrameError> {
        if item.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: item.len(),
                max: self.config.max_payload_size,
            });
        }
        encode_frame(&item, dst)
    }
}
