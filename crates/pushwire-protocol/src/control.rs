use crate::error::Result;
use crate::policy::FramePolicy;

/// A message the session layer hands to the splitter before sending.
///
/// `split` returns `Ok(true)` once the current state of the message is the
/// last frame to send, and `Ok(false)` when the caller must send the
/// current state and call `split` again.
pub trait Splittable {
    /// Split against explicit budgets.
    fn split_with(&mut self, policy: &FramePolicy) -> Result<bool>;

    /// Split against the default budgets.
    fn split(&mut self) -> Result<bool> {
        self.split_with(&FramePolicy::default())
    }
}

/// A message exchanged without a per-message acknowledgement.
pub trait OnewayMsg: Splittable {
    /// Whether the session keeps processing after this message.
    fn oneway_continue(&self) -> bool;
}
