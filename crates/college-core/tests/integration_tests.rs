//! Integration tests for college-core.
//!
//! These drive the full purchase and claim flows against the in-memory chain.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use college_core::{
    Interest, MintError, MintFlow, MintState, NoticeLevel, Outcome, ProgressStore,
    PurchaseCoordinator, PurchaseError, PurchaseRequest, PurchaseState, RecordingNotifier,
    RevertReason, TxFailure,
};
use college_fetcher::{NftReader, ReadCache, RetryPolicy};
use college_transport::{
    course_fn, nft_fn, AbiValue, CallKind, ChainClient, ChainError, ContractCall, ContractSet,
    DecodedEvent, EventAbi, Log, LogFilter, MockChain, Receipt, TxHash,
};
use college_types::Address;

const WALLET: Address = Address::from_low_u8(0x42);

struct Harness {
    chain: Arc<MockChain>,
    notifier: Arc<RecordingNotifier>,
    coordinator: PurchaseCoordinator,
}

fn harness() -> Harness {
    let chain = Arc::new(MockChain::new(ContractSet::sepolia()));
    harness_with(chain.clone(), chain)
}

fn harness_with(chain: Arc<MockChain>, client: Arc<dyn ChainClient>) -> Harness {
    let notifier = Arc::new(RecordingNotifier::new());
    let coordinator = PurchaseCoordinator::new(
        client,
        chain.contracts(),
        Arc::new(ReadCache::new()),
        RetryPolicy::default(),
        notifier.clone(),
        Duration::from_secs(60),
    );
    Harness {
        chain,
        notifier,
        coordinator,
    }
}

// =============================================================================
// Purchase flow
// =============================================================================

#[tokio::test]
async fn test_purchase_happy_path_with_approval() {
    let h = harness();
    h.chain.fund(WALLET, 500);
    let course = h.chain.add_course("Intro", 99, true);

    let req = PurchaseRequest::new(WALLET, course, 99)
        .titled("Intro")
        .approving(99);
    let run = h.coordinator.run(req, &Interest::detached()).await;

    assert_eq!(
        run.trail,
        vec![
            PurchaseState::Idle,
            PurchaseState::Checking,
            PurchaseState::NeedsApproval,
            PurchaseState::Approving,
            PurchaseState::Approved,
            PurchaseState::Simulating,
            PurchaseState::Purchasing,
            PurchaseState::Purchased,
        ]
    );
    assert!(run.error.is_none());
    assert_eq!(run.outcome, Outcome::Completed);
    assert!(run.event_confirmed);
    assert_eq!(run.balance, Some(401));

    let history = run.history.expect("history refreshed");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].purchase.course_id, course);
    assert_eq!(history[0].purchase.price, 99);
    assert_eq!(history[0].course.name, "Intro");

    assert_eq!(h.chain.balance_of(WALLET), 401);
    assert_eq!(h.chain.allowance_of(WALLET, h.chain.contracts().course), 0);
    assert_eq!(
        h.notifier.messages(NoticeLevel::Success).last().unwrap(),
        "Successfully purchased course \"Intro\" for 99 YD"
    );
}

#[tokio::test]
async fn test_already_purchased_sends_nothing() {
    let h = harness();
    h.chain.fund(WALLET, 500);
    let course = h.chain.add_course("Intro", 99, true);

    let first = h
        .coordinator
        .run(
            PurchaseRequest::new(WALLET, course, 99).approving(99),
            &Interest::detached(),
        )
        .await;
    let history = first.history.unwrap();
    h.chain.reset_call_log();

    let second = h
        .coordinator
        .run(
            PurchaseRequest::new(WALLET, course, 99)
                .with_history(history)
                .approving(99),
            &Interest::detached(),
        )
        .await;

    assert_eq!(second.state(), PurchaseState::AlreadyOwned);
    assert_eq!(h.chain.total_calls(CallKind::Simulate), 0);
    assert_eq!(h.chain.total_calls(CallKind::Write), 0);
    assert_eq!(h.chain.purchase_count(WALLET), 1);
    assert_eq!(
        h.notifier.messages(NoticeLevel::Warning),
        vec!["You already own this course"]
    );
}

#[tokio::test]
async fn test_stale_history_is_caught_by_simulation() {
    let h = harness();
    h.chain.fund(WALLET, 500);
    let course = h.chain.add_course("Intro", 99, true);
    h.coordinator
        .run(
            PurchaseRequest::new(WALLET, course, 99).approving(99),
            &Interest::detached(),
        )
        .await;

    h.chain.set_allowance(WALLET, h.chain.contracts().course, 99);
    let run = h
        .coordinator
        .run(PurchaseRequest::new(WALLET, course, 99), &Interest::detached())
        .await;

    assert_eq!(
        &run.trail[run.trail.len() - 2..],
        &[PurchaseState::Simulating, PurchaseState::AlreadyOwned]
    );
    assert_eq!(h.chain.purchase_count(WALLET), 1);
}

#[tokio::test]
async fn test_insufficient_balance_stops_at_checking() {
    let h = harness();
    h.chain.fund(WALLET, 50);
    let course = h.chain.add_course("Intro", 99, true);

    let run = h
        .coordinator
        .run(
            PurchaseRequest::new(WALLET, course, 99).approving(99),
            &Interest::detached(),
        )
        .await;

    assert_eq!(
        run.trail,
        vec![
            PurchaseState::Idle,
            PurchaseState::Checking,
            PurchaseState::Error
        ]
    );
    assert_eq!(
        run.error,
        Some(PurchaseError::InsufficientBalance {
            required: 99,
            actual: 50
        })
    );
    assert_eq!(h.chain.total_calls(CallKind::Write), 0);
    assert_eq!(
        h.notifier.messages(NoticeLevel::Error),
        vec!["Insufficient balance"]
    );
}

#[tokio::test]
async fn test_short_allowance_needs_approval() {
    let h = harness();
    h.chain.fund(WALLET, 500);
    let course = h.chain.add_course("Intro", 99, true);
    h.chain.set_allowance(WALLET, h.chain.contracts().course, 50);

    let run = h
        .coordinator
        .run(PurchaseRequest::new(WALLET, course, 99), &Interest::detached())
        .await;

    assert_eq!(run.state(), PurchaseState::NeedsApproval);
    assert_eq!(h.coordinator.allowance().snapshot().amount, 50);
    assert!(!h.coordinator.allowance().covers(99));
    assert_eq!(h.chain.total_calls(CallKind::Write), 0);
}

#[tokio::test]
async fn test_inactive_course_revert_names_course() {
    let h = harness();
    h.chain.fund(WALLET, 500);
    for i in 1..7 {
        h.chain.add_course(&format!("Filler {}", i), 10, true);
    }
    let course = h.chain.add_course("Intro", 99, false);
    assert_eq!(course, 7);
    h.chain.set_allowance(WALLET, h.chain.contracts().course, 99);

    let run = h
        .coordinator
        .run(PurchaseRequest::new(WALLET, course, 99), &Interest::detached())
        .await;

    assert_eq!(run.state(), PurchaseState::Error);
    assert_eq!(
        run.error,
        Some(PurchaseError::Simulation(RevertReason::CourseNotActive {
            course_id: 7,
            name: "Intro".to_string()
        }))
    );
    let message = h.notifier.last().unwrap().message;
    assert!(message.contains('7'));
    assert!(message.contains("Intro"));
    assert_eq!(h.chain.total_calls(CallKind::Write), 0);
}

#[tokio::test]
async fn test_text_only_revert_is_still_decoded() {
    let h = harness();
    h.chain.fund(WALLET, 500);
    let course = h.chain.add_course("Intro", 99, false);
    h.chain.set_allowance(WALLET, h.chain.contracts().course, 99);
    h.chain.text_only_reverts(true);

    let run = h
        .coordinator
        .run(PurchaseRequest::new(WALLET, course, 99), &Interest::detached())
        .await;

    assert_eq!(
        run.error,
        Some(PurchaseError::Simulation(RevertReason::CourseNotActive {
            course_id: course,
            name: "Intro".to_string()
        }))
    );
}

#[tokio::test]
async fn test_unknown_simulation_revert_keeps_raw_text() {
    let h = harness();
    h.chain.fund(WALLET, 500);
    let course = h.chain.add_course("Intro", 99, true);
    h.chain.set_allowance(WALLET, h.chain.contracts().course, 99);
    h.chain
        .revert_next_simulation(ChainError::revert_text("something odd happened"));

    let run = h
        .coordinator
        .run(PurchaseRequest::new(WALLET, course, 99), &Interest::detached())
        .await;

    assert_eq!(run.state(), PurchaseState::Error);
    let message = h.notifier.last().unwrap().message;
    assert!(message.starts_with("Purchase simulation failed:"));
    assert!(message.contains("something odd happened"));
}

#[tokio::test]
async fn test_wallet_rejection_has_distinct_message() {
    let h = harness();
    h.chain.fund(WALLET, 500);
    let course = h.chain.add_course("Intro", 99, true);
    h.chain.set_allowance(WALLET, h.chain.contracts().course, 99);
    h.chain
        .fail_next_write(ChainError::UserRejected("User denied signature".into()));

    let run = h
        .coordinator
        .run(PurchaseRequest::new(WALLET, course, 99), &Interest::detached())
        .await;

    assert_eq!(
        &run.trail[run.trail.len() - 2..],
        &[PurchaseState::Purchasing, PurchaseState::Error]
    );
    assert_eq!(
        run.error,
        Some(PurchaseError::Transaction(TxFailure::UserRejected))
    );
    assert_eq!(
        h.notifier.last().unwrap().message,
        "Transaction was rejected by user"
    );
}

#[tokio::test]
async fn test_receipt_timeout_leaves_purchase_pending() {
    let h = harness();
    h.chain.fund(WALLET, 500);
    let course = h.chain.add_course("Intro", 99, true);
    h.chain.set_allowance(WALLET, h.chain.contracts().course, 99);
    h.chain.time_out_next_receipts(1);

    let run = h
        .coordinator
        .run(PurchaseRequest::new(WALLET, course, 99), &Interest::detached())
        .await;

    assert_eq!(run.state(), PurchaseState::Purchasing);
    assert!(run.error.is_none());
    assert!(matches!(run.outcome, Outcome::Pending(_)));
    assert_eq!(run.outcome, Outcome::Pending(run.tx.clone().unwrap()));
    assert_eq!(
        h.notifier.messages(NoticeLevel::Warning),
        vec!["Transaction taking longer than expected. Please check your wallet."]
    );
}

#[tokio::test]
async fn test_pending_purchase_resumes_with_full_effects() {
    let h = harness();
    h.chain.fund(WALLET, 500);
    let course = h.chain.add_course("Intro", 99, true);
    h.chain.set_allowance(WALLET, h.chain.contracts().course, 99);
    h.chain.time_out_next_receipts(1);

    let req = PurchaseRequest::new(WALLET, course, 99).titled("Intro");
    let run = h.coordinator.run(req.clone(), &Interest::detached()).await;
    let Outcome::Pending(tx) = run.outcome else {
        panic!("expected pending purchase, got {:?}", run.outcome);
    };
    assert!(h.notifier.messages(NoticeLevel::Success).is_empty());

    let resumed = h.coordinator.resume(req, tx, &Interest::detached()).await;
    assert_eq!(
        resumed.trail,
        vec![
            PurchaseState::Idle,
            PurchaseState::Purchasing,
            PurchaseState::Purchased
        ]
    );
    assert_eq!(resumed.outcome, Outcome::Completed);
    assert!(resumed.event_confirmed);
    assert_eq!(resumed.balance, Some(401));
    assert_eq!(resumed.history.map(|h| h.len()), Some(1));
    assert_eq!(h.chain.purchase_count(WALLET), 1);
    assert_eq!(h.chain.total_calls(CallKind::Write), 1);
    assert_eq!(
        h.notifier.messages(NoticeLevel::Success),
        vec!["Successfully purchased course \"Intro\" for 99 YD"]
    );
}

#[tokio::test]
async fn test_missing_purchase_event_is_warning() {
    let h = harness();
    h.chain.fund(WALLET, 500);
    let course = h.chain.add_course("Intro", 99, true);
    h.chain.set_allowance(WALLET, h.chain.contracts().course, 99);
    h.chain.suppress_events(true);

    let run = h
        .coordinator
        .run(PurchaseRequest::new(WALLET, course, 99), &Interest::detached())
        .await;

    assert_eq!(run.state(), PurchaseState::Purchased);
    assert!(!run.event_confirmed);
    assert_eq!(
        h.notifier.messages(NoticeLevel::Warning),
        vec!["Failed to confirm purchase"]
    );
    assert!(h.notifier.messages(NoticeLevel::Success).is_empty());
}

/// Delegates to the mock chain and withdraws interest as soon as a
/// transaction has been submitted.
struct WithdrawOnWrite {
    inner: Arc<MockChain>,
    interest: Interest,
}

#[async_trait]
impl ChainClient for WithdrawOnWrite {
    async fn read(&self, call: &ContractCall) -> Result<AbiValue, ChainError> {
        self.inner.read(call).await
    }

    async fn simulate(&self, call: &ContractCall, caller: Address) -> Result<(), ChainError> {
        self.inner.simulate(call, caller).await
    }

    async fn write(&self, call: &ContractCall, caller: Address) -> Result<TxHash, ChainError> {
        let tx = self.inner.write(call, caller).await;
        if call.function == course_fn::PURCHASE_COURSE {
            self.interest.withdraw();
        }
        tx
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: &TxHash,
        timeout: Duration,
    ) -> Result<Receipt, ChainError> {
        self.inner.wait_for_receipt(tx_hash, timeout).await
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>, ChainError> {
        self.inner.get_logs(filter).await
    }

    fn decode_event_log(&self, event: &EventAbi, log: &Log) -> Result<DecodedEvent, ChainError> {
        self.inner.decode_event_log(event, log)
    }
}

#[tokio::test]
async fn test_withdrawn_interest_skips_side_effects() {
    let chain = Arc::new(MockChain::new(ContractSet::sepolia()));
    let interest = Interest::new();
    let client = Arc::new(WithdrawOnWrite {
        inner: chain.clone(),
        interest: interest.clone(),
    });
    let h = harness_with(chain, client);
    h.chain.fund(WALLET, 500);
    let course = h.chain.add_course("Intro", 99, true);
    h.chain.set_allowance(WALLET, h.chain.contracts().course, 99);

    let run = h
        .coordinator
        .run(PurchaseRequest::new(WALLET, course, 99), &interest)
        .await;

    // The write went out and is not undone.
    assert_eq!(h.chain.purchase_count(WALLET), 1);
    assert!(run.tx.is_some());
    assert_eq!(run.outcome, Outcome::Abandoned);
    assert_eq!(run.state(), PurchaseState::Purchasing);
    assert!(run.history.is_none());
    assert!(h.notifier.notices().is_empty());
}

/// Delegates to the mock chain and reports `earlier` ahead of the chain's
/// own logs, as if another transaction landed first in the same block.
struct ForeignLogFirst {
    inner: Arc<MockChain>,
    earlier: Vec<Log>,
}

#[async_trait]
impl ChainClient for ForeignLogFirst {
    async fn read(&self, call: &ContractCall) -> Result<AbiValue, ChainError> {
        self.inner.read(call).await
    }

    async fn simulate(&self, call: &ContractCall, caller: Address) -> Result<(), ChainError> {
        self.inner.simulate(call, caller).await
    }

    async fn write(&self, call: &ContractCall, caller: Address) -> Result<TxHash, ChainError> {
        self.inner.write(call, caller).await
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: &TxHash,
        timeout: Duration,
    ) -> Result<Receipt, ChainError> {
        self.inner.wait_for_receipt(tx_hash, timeout).await
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>, ChainError> {
        let mut logs = self.earlier.clone();
        logs.extend(self.inner.get_logs(filter).await?);
        Ok(logs)
    }

    fn decode_event_log(&self, event: &EventAbi, log: &Log) -> Result<DecodedEvent, ChainError> {
        self.inner.decode_event_log(event, log)
    }
}

#[tokio::test]
async fn test_purchase_event_found_behind_other_buyers() {
    let chain = Arc::new(MockChain::new(ContractSet::sepolia()));
    let course = chain.add_course("Intro", 99, true);
    let registry = chain.contracts().course;

    let other = Address::from_low_u8(0x77);
    chain.fund(other, 99);
    chain.set_allowance(other, registry, 99);
    let call = ContractCall::new(registry, course_fn::PURCHASE_COURSE).arg(course);
    let other_tx = chain.write(&call, other).await.unwrap();
    let earlier = chain
        .wait_for_receipt(&other_tx, Duration::from_secs(1))
        .await
        .unwrap()
        .logs;
    assert_eq!(earlier.len(), 1);

    let client = Arc::new(ForeignLogFirst {
        inner: chain.clone(),
        earlier,
    });
    let h = harness_with(chain, client);
    h.chain.fund(WALLET, 500);
    h.chain.set_allowance(WALLET, registry, 99);

    let run = h
        .coordinator
        .run(
            PurchaseRequest::new(WALLET, course, 99).titled("Intro"),
            &Interest::detached(),
        )
        .await;
    assert_eq!(run.state(), PurchaseState::Purchased);
    assert!(run.event_confirmed);
    assert!(h.notifier.messages(NoticeLevel::Warning).is_empty());
    assert_eq!(
        h.notifier.messages(NoticeLevel::Success),
        vec!["Successfully purchased course \"Intro\" for 99 YD"]
    );
}

// =============================================================================
// Certificate claim
// =============================================================================

fn mint_flow(chain: &Arc<MockChain>, notifier: &Arc<RecordingNotifier>) -> MintFlow {
    let nfts = NftReader::new(
        chain.clone(),
        chain.contracts(),
        Arc::new(ReadCache::new()),
        RetryPolicy::default(),
    );
    MintFlow::new(
        chain.clone(),
        chain.contracts(),
        nfts,
        notifier.clone(),
        Duration::from_secs(60),
    )
}

#[tokio::test]
async fn test_watch_then_claim() {
    let chain = Arc::new(MockChain::new(ContractSet::sepolia()));
    let notifier = Arc::new(RecordingNotifier::new());
    let flow = mint_flow(&chain, &notifier);
    let progress = ProgressStore::in_memory();
    let course = chain.add_course("Intro", 99, true);

    progress.record_playback(course, 50.0, 100.0);
    let early = flow
        .claim(Some(WALLET), course, progress.progress(course), &Interest::detached())
        .await;
    assert_eq!(early.error, Some(MintError::IncompleteProgress { progress: 50 }));
    assert_eq!(chain.call_count(CallKind::Write, nft_fn::MINT_NFT), 0);

    progress.record_playback(course, 100.0, 100.0);
    assert!(progress.is_complete(course));
    let run = flow
        .claim(Some(WALLET), course, progress.progress(course), &Interest::detached())
        .await;
    assert_eq!(run.state(), MintState::Minted);
    assert_eq!(run.minted.as_ref().map(|n| n.course_id), Some(course));
    assert_eq!(run.claimed, Some(true));
    assert_eq!(run.collection.unwrap().count(), 1);
}

#[tokio::test]
async fn test_claim_status_is_cached_between_checks() {
    let chain = Arc::new(MockChain::new(ContractSet::sepolia()));
    let notifier = Arc::new(RecordingNotifier::new());
    let flow = mint_flow(&chain, &notifier);

    flow.claim(Some(WALLET), 1, 10, &Interest::detached()).await;
    flow.claim(Some(WALLET), 1, 20, &Interest::detached()).await;
    assert_eq!(chain.call_count(CallKind::Read, nft_fn::HAS_CLAIMED_NFT), 1);
    assert_eq!(chain.call_count(CallKind::Read, nft_fn::PAUSED), 1);
}

#[tokio::test]
async fn test_contract_progress_rule_is_mapped() {
    let chain = Arc::new(MockChain::new(ContractSet::sepolia()));
    let notifier = Arc::new(RecordingNotifier::new());
    let flow = mint_flow(&chain, &notifier);
    chain.fail_next_write(ChainError::revert_text(
        "The contract function \"mintNFT\" reverted with the following reason:\nvalue must be greater than 100",
    ));

    let run = flow.claim(Some(WALLET), 1, 100, &Interest::detached()).await;
    assert_eq!(run.error, Some(MintError::ProgressRejected));
    assert_eq!(
        notifier.last().unwrap().message,
        "Video progress must be 100% to claim NFT"
    );
}

#[tokio::test]
async fn test_claim_timeout_is_pending() {
    let chain = Arc::new(MockChain::new(ContractSet::sepolia()));
    let notifier = Arc::new(RecordingNotifier::new());
    let flow = mint_flow(&chain, &notifier);
    chain.time_out_next_receipts(1);

    let run = flow.claim(Some(WALLET), 1, 100, &Interest::detached()).await;
    assert_eq!(run.state(), MintState::Confirming);
    assert!(matches!(run.outcome, Outcome::Pending(_)));
    assert_eq!(
        notifier.messages(NoticeLevel::Warning),
        vec!["Transaction taking longer than expected. Please check your wallet."]
    );
}

#[tokio::test]
async fn test_contract_claim_rejection_overrides_cached_status() {
    let chain = Arc::new(MockChain::new(ContractSet::sepolia()));
    let notifier = Arc::new(RecordingNotifier::new());
    let flow = mint_flow(&chain, &notifier);

    // Cached as unclaimed, then claimed elsewhere.
    assert!(!flow.reader().has_claimed(Some(WALLET), 1).await.unwrap());
    chain.set_claimed(WALLET, 1);

    let first = flow.claim(Some(WALLET), 1, 100, &Interest::detached()).await;
    assert_eq!(first.error, Some(MintError::AlreadyClaimed));
    assert_eq!(chain.call_count(CallKind::Write, nft_fn::MINT_NFT), 1);

    let second = flow.claim(Some(WALLET), 1, 100, &Interest::detached()).await;
    assert_eq!(second.error, Some(MintError::AlreadyClaimed));
    assert_eq!(chain.call_count(CallKind::Write, nft_fn::MINT_NFT), 1);
    assert!(flow.reader().has_claimed(Some(WALLET), 1).await.unwrap());
}

#[tokio::test]
async fn test_pending_claim_resumes() {
    let chain = Arc::new(MockChain::new(ContractSet::sepolia()));
    let notifier = Arc::new(RecordingNotifier::new());
    let flow = mint_flow(&chain, &notifier);
    chain.time_out_next_receipts(1);

    let run = flow.claim(Some(WALLET), 1, 100, &Interest::detached()).await;
    let Outcome::Pending(tx) = run.outcome else {
        panic!("expected pending claim, got {:?}", run.outcome);
    };
    // The stale "unclaimed" entry is gone, so a retry sees the chain.
    let retry = flow.claim(Some(WALLET), 1, 100, &Interest::detached()).await;
    assert_eq!(retry.error, Some(MintError::AlreadyClaimed));

    let resumed = flow.resume(WALLET, 1, tx, &Interest::detached()).await;
    assert_eq!(
        resumed.trail,
        vec![MintState::Checking, MintState::Confirming, MintState::Minted]
    );
    assert_eq!(resumed.claimed, Some(true));
    assert_eq!(resumed.collection.map(|c| c.count()), Some(1));
    assert_eq!(chain.call_count(CallKind::Write, nft_fn::MINT_NFT), 1);
    assert_eq!(
        notifier.messages(NoticeLevel::Success),
        vec!["Successfully claimed your NFT!"]
    );
}
