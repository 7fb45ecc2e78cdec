//! Device connection listener.
//!
//! Accepts long-lived device connections and hands each one to a session
//! handler running on its own thread:
//! - Temporary accept failures are retried after a fixed delay
//! - A panicking session terminates only its own connection
//!
//! This is the lowest layer of pushwire. Transport security is not handled
//! here; plug a TLS-wrapping [`Acceptor`] in front of the raw listener.

pub mod error;
pub mod listener;
pub mod panic;
pub mod traits;

pub use error::{Result, TransportError};
pub use listener::{is_temporary, DeviceListener, ListenerConfig, DEFAULT_RETRY_DELAY};
pub use panic::{format_panic, PanicMessage};
pub use traits::Acceptor;
