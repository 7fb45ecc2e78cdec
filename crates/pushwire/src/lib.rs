//! Push notification framing and message splitting.
//!
//! pushwire carries server-to-device push traffic over a persistent
//! connection: compact JSON messages in 2-byte length-prefixed frames, with
//! oversized broadcasts and notification batches split across frames.
//!
//! # Crate Structure
//!
//! - [`transport`]: device connection listener with per-session isolation
//! - [`frame`]: length-prefixed framing over blocking streams
//! - [`protocol`]: wire messages, size policy, splitter and session helpers

/// Re-export transport types.
pub mod transport {
    pub use pushwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use pushwire_frame::*;
}

/// Re-export protocol types.
pub mod protocol {
    pub use pushwire_protocol::*;
}
