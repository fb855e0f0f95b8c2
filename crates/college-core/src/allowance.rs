//! Shared view of the course registry's spending allowance.
//!
//! One [`AllowanceState`] is shared by the approval and purchase flows of a
//! wallet. It is only ever overwritten by a fresh chain read; right after an
//! approve transaction is sent it is marked loading until that read lands or
//! the receipt wait gives up.

use std::sync::Arc;

use parking_lot::RwLock;

use college_types::Amount;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllowanceSnapshot {
    pub amount: Amount,
    pub is_loading: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AllowanceState {
    inner: Arc<RwLock<AllowanceSnapshot>>,
}

impl AllowanceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> AllowanceSnapshot {
        *self.inner.read()
    }

    pub fn mark_loading(&self) {
        self.inner.write().is_loading = true;
    }

    /// Drop the loading flag and keep the last read amount.
    pub fn clear_loading(&self) {
        self.inner.write().is_loading = false;
    }

    /// Record a value read from chain.
    pub fn set(&self, amount: Amount) {
        *self.inner.write() = AllowanceSnapshot {
            amount,
            is_loading: false,
        };
    }

    /// Whether the last read covers `price`. A loading allowance covers nothing.
    pub fn covers(&self, price: Amount) -> bool {
        let snap = self.snapshot();
        !snap.is_loading && snap.amount >= price
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loading_blocks_cover() {
        let state = AllowanceState::new();
        state.set(100);
        assert!(state.covers(99));

        let shared = state.clone();
        shared.mark_loading();
        assert!(!state.covers(99));
        assert_eq!(state.snapshot().amount, 100);

        state.set(50);
        assert!(!shared.covers(99));
        assert!(shared.covers(50));
    }

    #[test]
    fn test_clear_loading_keeps_amount() {
        let state = AllowanceState::new();
        state.set(100);
        state.mark_loading();
        state.clear_loading();
        assert_eq!(
            state.snapshot(),
            AllowanceSnapshot {
                amount: 100,
                is_loading: false
            }
        );
        assert!(state.covers(100));
    }
}
