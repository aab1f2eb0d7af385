//! Cooperative cancellation for in-flight turns
//!
//! One [`AbortHandle`] exists per in-flight turn. The wrapped token is shared
//! with the network layer, which stops delivering chunks once it fires; the
//! orchestrator additionally checks it at every loop iteration boundary.
//! Handles are discarded after settlement, never reused.

use tokio_util::sync::CancellationToken;

/// Marker appended to a turn's content on user cancellation
pub const CANCELLATION_MARKER: &str = "[Cancelled]";

/// Append the cancellation marker to content, exactly once.
pub fn append_cancellation_marker(content: &str) -> String {
    if content.ends_with(CANCELLATION_MARKER) {
        return content.to_string();
    }
    if content.is_empty() {
        CANCELLATION_MARKER.to_string()
    } else {
        format!("{content}\n\n{CANCELLATION_MARKER}")
    }
}

/// Cancellation handle owned by one in-flight turn
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    token: CancellationToken,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Request cancellation of the turn
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token consumed by the network layer
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}
