//! Build progress callbacks and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Receives per-item progress while a batch is being connected.
///
/// `current` is the 0-based position of the item just inserted within the batch.
pub trait ProgressReporter {
    fn progress(&self, current: usize, total: usize);
}

/// Cancellation flag shared between a builder and whoever may stop it.
///
/// Checked once per item, before the item is connected. A cancelled build leaves the
/// graph unusable; it cannot be resumed.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
