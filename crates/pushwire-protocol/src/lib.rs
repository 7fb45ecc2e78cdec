//! Push notification wire messages and message splitting.
//!
//! This is the core of pushwire. It defines the closed set of messages a
//! server and a device exchange, and the splitter that carves an oversized
//! broadcast or notification batch into frames that fit the 16-bit length
//! prefix, without breaking delivery order or the broadcast level counter.

pub mod control;
pub mod error;
pub mod messages;
pub mod policy;
pub mod session;
mod split;

pub use control::{OnewayMsg, Splittable};
pub use error::{ProtocolError, Result};
pub use messages::{
    extract_payloads, AckMsg, BroadcastMsg, ConnAckMsg, ConnAckParams, ConnBrokenMsg,
    ConnWarnMsg, ConnectMsg, Message, Notification, NotificationsMsg, Payload, PingPongMsg,
    SetParamsMsg, BROKEN_HOST_MISMATCH, WARN_UNAUTHORIZED,
};
pub use policy::{encoded_len, FramePolicy, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, NOTIFICATION_OVERHEAD};
pub use session::{deliver, read_message, send_message, Session};
