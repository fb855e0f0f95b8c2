//! College Core
//!
//! The storefront flows that change chain state.
//!
//! # Flows
//!
//! - [`purchase`]: the [`PurchaseCoordinator`] state machine (check, approve, simulate, buy)
//! - [`approve`]: standalone allowance approval with input validation
//! - [`mint`]: completion certificate claims
//! - [`token_sale`]: buying YD with ETH
//!
//! # Support
//!
//! - [`errors`]: validation, revert and transaction failure taxonomy
//! - [`tx`]: receipt waits with a timeout that leaves flows pending
//! - [`interest`]: caller-held cancellation tokens and flow outcomes
//! - [`notify`]: user-facing notices
//! - [`progress`]: locally persisted video progress
//!
//! # Example
//!
//! ```ignore
//! use college_core::{Interest, PurchaseCoordinator, PurchaseRequest};
//!
//! let run = coordinator
//!     .run(PurchaseRequest::new(wallet, course_id, price).approving(price), &Interest::new())
//!     .await;
//! println!("{:?} -> {:?}", run.trail, run.error);
//! ```

#![allow(clippy::too_many_arguments)]

pub mod allowance;
pub mod approve;
pub mod errors;
pub mod interest;
pub mod mint;
pub mod notify;
pub mod progress;
pub mod purchase;
pub mod token_sale;
pub mod tx;

pub use allowance::{AllowanceSnapshot, AllowanceState};
pub use approve::{
    max_approval, parse_approval_input, validate_approval, ApprovalError, ApprovalFlow,
};
pub use errors::{RevertReason, TxFailure, ValidationError};
pub use interest::{Interest, Outcome};
pub use mint::{MintError, MintFlow, MintRun, MintState, NftCollection, COMPLETE_PROGRESS};
pub use notify::{LogNotifier, Notice, NoticeLevel, Notifier, RecordingNotifier};
pub use progress::{default_storage_dir, ProgressStore};
pub use purchase::{
    PurchaseCoordinator, PurchaseError, PurchaseRequest, PurchaseRun, PurchaseState,
};
pub use token_sale::{
    expected_tokens, parse_eth_input, SaleError, TokenSale, EXCHANGE_RATE, MIN_PURCHASE_WEI,
};
pub use tx::{confirm, receipt_timeout_from_env, Confirmation, DEFAULT_RECEIPT_TIMEOUT};
