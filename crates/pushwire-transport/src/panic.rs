//! Helpers for reporting panics caught inside device sessions.

use std::any::Any;
use std::fmt;

/// Formats a panic payload for logging.
///
/// The payload is downcast to `String` or `&'static str` when possible and
/// falls back to `Debug` formatting otherwise.
#[derive(Debug)]
pub struct PanicMessage(Box<dyn Any + Send>);

impl fmt::Display for PanicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.0.downcast_ref::<String>() {
            f.write_str(s)
        } else if let Some(s) = self.0.downcast_ref::<&'static str>() {
            f.write_str(s)
        } else {
            write!(f, "{:?}", self.0)
        }
    }
}

/// Wrap a caught panic payload.
pub fn format_panic(panic: Box<dyn Any + Send>) -> PanicMessage {
    PanicMessage(panic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_string_payloads() {
        assert_eq!(format_panic(Box::new("boom")).to_string(), "boom");
        assert_eq!(
            format_panic(Box::new(String::from("kaboom"))).to_string(),
            "kaboom"
        );
    }

    #[test]
    fn falls_back_to_debug() {
        assert!(format_panic(Box::new(5_u32)).to_string().contains("Any"));
    }
}
