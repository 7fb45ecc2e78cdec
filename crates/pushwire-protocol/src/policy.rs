//! Frame size budgets used by the splitter.

use std::io;

use serde::Serialize;
use serde_json::value::RawValue;

use crate::error::{ProtocolError, Result};
use crate::messages::Notification;

/// Hard ceiling on a serialized message: the most a 16-bit length prefix
/// can describe.
pub const MAX_FRAME_SIZE: usize = pushwire_frame::MAX_FRAME_PAYLOAD;

/// Budget for the elements packed into one frame. The gap to
/// [`MAX_FRAME_SIZE`] absorbs the fixed JSON around the element list.
pub const MAX_PAYLOAD_SIZE: usize = 62 * 1024;

/// Allowance for the field names and punctuation around one notification.
pub const NOTIFICATION_OVERHEAD: usize = 128;

/// Size budgets applied when splitting messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePolicy {
    /// Largest serialized message allowed in one frame.
    pub max_frame_size: usize,
    /// Accumulation budget for the elements of one frame.
    pub max_payload_size: usize,
    /// Per-notification overhead added to its field lengths.
    pub notification_overhead: usize,
}

impl Default for FramePolicy {
    fn default() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
            max_payload_size: MAX_PAYLOAD_SIZE,
            notification_overhead: NOTIFICATION_OVERHEAD,
        }
    }
}

impl FramePolicy {
    /// Default policy with a different accumulation budget.
    pub fn with_payload_budget(max_payload_size: usize) -> Result<Self> {
        let policy = Self {
            max_payload_size,
            ..Self::default()
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Check the budgets are usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_frame_size > MAX_FRAME_SIZE {
            return Err(ProtocolError::InvalidPolicy(
                "frame size exceeds the 16-bit length prefix",
            ));
        }
        if self.max_payload_size == 0 {
            return Err(ProtocolError::InvalidPolicy("payload budget must be positive"));
        }
        if self.max_payload_size >= self.max_frame_size {
            return Err(ProtocolError::InvalidPolicy(
                "payload budget must leave room below the frame size",
            ));
        }
        Ok(())
    }

    /// Fail if a serialized message of `size` bytes cannot be one frame.
    pub fn check_frame(&self, size: usize) -> Result<usize> {
        if size > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size,
                max: self.max_frame_size,
            });
        }
        Ok(size)
    }

    /// Element budget for one frame whose JSON without any elements is
    /// `envelope` bytes long.
    pub fn round_budget(&self, envelope: usize) -> usize {
        self.max_payload_size
            .min(self.max_frame_size.saturating_sub(envelope))
    }

    /// Budget cost of one broadcast payload, separator included.
    ///
    /// Payloads are written verbatim, so their length is exact.
    pub fn payload_cost(&self, payload: &RawValue) -> usize {
        payload.get().len() + 1
    }

    /// Budget cost of one notification, separator included.
    ///
    /// The field lengths plus the configured overhead, or the encoded size
    /// when escaping makes that larger.
    pub fn notification_cost(&self, notification: &Notification) -> Result<usize> {
        let fields = notification.payload.get().len()
            + notification.app_id.len()
            + notification.msg_id.len()
            + self.notification_overhead;
        Ok(fields.max(encoded_len(notification)? + 1))
    }
}

/// Length of the compact JSON encoding of `value`, without buffering it.
pub fn encoded_len<T: Serialize + ?Sized>(value: &T) -> Result<usize> {
    let mut counter = ByteCounter(0);
    serde_json::to_writer(&mut counter, value)?;
    Ok(counter.0)
}

struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
