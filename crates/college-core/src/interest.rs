//! Caller interest in a running flow.
//!
//! Flows hold an [`Interest`] and check it after every remote call. Once the
//! caller withdraws (view closed, wallet switched), the flow stops applying
//! side effects. Transactions already handed to the wallet are not recalled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use college_transport::TxHash;

#[derive(Debug, Clone)]
pub struct Interest {
    active: Arc<AtomicBool>,
}

impl Interest {
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// An interest nobody can withdraw.
    pub fn detached() -> Self {
        Self::new()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Withdraw interest. Every clone observes it.
    pub fn withdraw(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl Default for Interest {
    fn default() -> Self {
        Self::new()
    }
}

/// How a flow that submitted (or tried to submit) a transaction ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Ran to a terminal state; inspect the run for which one.
    Completed,
    /// The transaction was sent but not confirmed within the wait window.
    Pending(TxHash),
    /// The caller withdrew interest; later side effects were skipped.
    Abandoned,
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_withdraw_visible_to_clones() {
        let interest = Interest::new();
        let view = interest.clone();
        assert!(view.is_active());
        interest.withdraw();
        assert!(!view.is_active());
        assert!(Interest::detached().is_active());
    }
}
