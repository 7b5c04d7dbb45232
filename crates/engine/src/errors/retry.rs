/// Classification for retry policy.
///
/// Used by the backoff policy to decide whether a failed fetch is worth
/// another attempt within the same invocation.
///
/// # Behavior Summary
///
/// | Class | Retry in this invocation? | Next scheduled tick runs? |
/// |-------|---------------------------|---------------------------|
/// | `Never` | No | Yes |
/// | `WithBackoff` | Yes, after an exponential delay | Yes |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Never retry - bad credential, bad configuration, malformed payload,
    /// or the invocation was canceled.
    /// Re-fetching immediately would return the same failure.
    Never,

    /// Retry with exponential backoff.
    ///
    /// Used for transient failures: network errors, rate limiting, and
    /// external process or command failures.
    WithBackoff,
}

impl RetryClass {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::WithBackoff)
    }
}
