//! Course purchase state machine.
//!
//! A run walks
//!
//! ```text
//! Idle -> Checking -> [NeedsApproval -> Approving -> Approved ->] Simulating -> Purchasing -> Purchased
//! ```
//!
//! and can stop early in `AlreadyOwned` (from `Checking` or `Simulating`) or
//! `Error` (from any non-terminal state). Every transition is recorded in
//! [`PurchaseRun::trail`].
//!
//! Only one run per (wallet, course) may be in flight at a time.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use college_fetcher::{CourseReader, NftReader, ReadCache, RetryPolicy, TokenReader};
use college_transport::{
    course_fn, find_events, ChainClient, ChainError, ContractCall, ContractSet, LogFilter, Receipt,
    TxHash, COURSE_PURCHASED,
};
use college_types::{has_purchased, Address, Amount, CourseId, PurchaseWithCourse};

use crate::allowance::AllowanceState;
use crate::approve::{ApprovalError, ApprovalFlow};
use crate::errors::{RevertReason, TxFailure};
use crate::interest::{Interest, Outcome};
use crate::notify::Notifier;
use crate::tx::{confirm, Confirmation, RECEIPT_TIMEOUT_WARNING};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PurchaseState {
    Idle,
    Checking,
    NeedsApproval,
    Approving,
    Approved,
    Simulating,
    Purchasing,
    Purchased,
    AlreadyOwned,
    Error,
}

impl PurchaseState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PurchaseState::Purchased | PurchaseState::AlreadyOwned | PurchaseState::Error
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseError {
    /// Another run for the same wallet and course has not finished.
    AlreadyInFlight { course_id: CourseId },
    /// Wallet balance below the course price. Nothing was sent.
    InsufficientBalance { required: Amount, actual: Amount },
    /// Balance or allowance could not be read.
    Read(String),
    Approval(ApprovalError),
    /// The dry run reverted.
    Simulation(RevertReason),
    /// The purchase transaction failed.
    Transaction(TxFailure),
}

impl fmt::Display for PurchaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PurchaseError::AlreadyInFlight { course_id } => {
                write!(f, "A purchase of course #{} is already in progress", course_id)
            }
            PurchaseError::InsufficientBalance { .. } => write!(f, "Insufficient balance"),
            PurchaseError::Read(msg) => write!(f, "Failed to check purchase status: {}", msg),
            PurchaseError::Approval(e) => write!(f, "{}", e),
            PurchaseError::Simulation(RevertReason::Unknown(raw)) => {
                write!(f, "Purchase simulation failed: {}", raw)
            }
            PurchaseError::Simulation(reason) => write!(f, "{}", reason),
            PurchaseError::Transaction(TxFailure::Other(msg)) => {
                write!(f, "Purchase failed: {}", msg)
            }
            PurchaseError::Transaction(failure) => write!(f, "{}", failure),
        }
    }
}

impl std::error::Error for PurchaseError {}

/// What the caller wants to buy.
#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    pub wallet: Address,
    pub course_id: CourseId,
    /// Course title used in notices.
    pub title: String,
    pub price: Amount,
    /// Purchase history already loaded for this wallet.
    pub history: Vec<PurchaseWithCourse>,
    /// Allowance to grant if the current one does not cover the price.
    /// Without it a run stops at `NeedsApproval`.
    pub approve_amount: Option<Amount>,
}

impl PurchaseRequest {
    pub fn new(wallet: Address, course_id: CourseId, price: Amount) -> Self {
        Self {
            wallet,
            course_id,
            title: format!("#{}", course_id),
            price,
            history: Vec::new(),
            approve_amount: None,
        }
    }

    pub fn titled(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_history(mut self, history: Vec<PurchaseWithCourse>) -> Self {
        self.history = history;
        self
    }

    pub fn approving(mut self, amount: Amount) -> Self {
        self.approve_amount = Some(amount);
        self
    }
}

/// Record of one purchase attempt.
#[derive(Debug, Clone)]
pub struct PurchaseRun {
    pub wallet: Address,
    pub course_id: CourseId,
    pub trail: Vec<PurchaseState>,
    pub outcome: Outcome,
    pub error: Option<PurchaseError>,
    /// Purchase transaction, once submitted.
    pub tx: Option<TxHash>,
    /// `CoursePurchased` was found in the receipt block.
    pub event_confirmed: bool,
    /// Balance re-read after a completed purchase.
    pub balance: Option<Amount>,
    /// History re-read after a completed purchase.
    pub history: Option<Vec<PurchaseWithCourse>>,
}

impl PurchaseRun {
    fn new(wallet: Address, course_id: CourseId) -> Self {
        Self {
            wallet,
            course_id,
            trail: vec![PurchaseState::Idle],
            outcome: Outcome::Completed,
            error: None,
            tx: None,
            event_confirmed: false,
            balance: None,
            history: None,
        }
    }

    pub fn state(&self) -> PurchaseState {
        self.trail.last().copied().unwrap_or(PurchaseState::Idle)
    }

    fn enter(&mut self, state: PurchaseState) {
        tracing::debug!(
            wallet = %self.wallet,
            course_id = self.course_id,
            from = ?self.state(),
            to = ?state,
            "purchase transition"
        );
        self.trail.push(state);
    }

    fn fail(mut self, error: PurchaseError) -> Self {
        self.enter(PurchaseState::Error);
        self.error = Some(error);
        self
    }

    fn abandon(mut self) -> Self {
        tracing::debug!(
            wallet = %self.wallet,
            course_id = self.course_id,
            at = ?self.state(),
            "interest withdrawn, skipping remaining purchase effects"
        );
        self.outcome = Outcome::Abandoned;
        self
    }
}

type InFlightSet = Arc<Mutex<HashSet<(Address, CourseId)>>>;

/// Holds a (wallet, course) slot until dropped.
pub(crate) struct InFlightGuard {
    set: InFlightSet,
    key: (Address, CourseId),
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.lock().remove(&self.key);
    }
}

pub struct PurchaseCoordinator {
    client: Arc<dyn ChainClient>,
    contracts: ContractSet,
    tokens: TokenReader,
    courses: CourseReader,
    nfts: NftReader,
    approval: ApprovalFlow,
    notifier: Arc<dyn Notifier>,
    receipt_timeout: Duration,
    in_flight: InFlightSet,
}

impl PurchaseCoordinator {
    pub fn new(
        client: Arc<dyn ChainClient>,
        contracts: ContractSet,
        cache: Arc<ReadCache>,
        policy: RetryPolicy,
        notifier: Arc<dyn Notifier>,
        receipt_timeout: Duration,
    ) -> Self {
        let allowance = AllowanceState::new();
        Self {
            tokens: TokenReader::new(client.clone(), contracts),
            courses: CourseReader::new(client.clone(), contracts),
            nfts: NftReader::new(client.clone(), contracts, cache, policy),
            approval: ApprovalFlow::new(
                client.clone(),
                contracts,
                allowance,
                notifier.clone(),
                receipt_timeout,
            ),
            client,
            contracts,
            notifier,
            receipt_timeout,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn allowance(&self) -> &AllowanceState {
        self.approval.allowance()
    }

    pub fn approval(&self) -> &ApprovalFlow {
        &self.approval
    }

    pub(crate) fn begin(&self, wallet: Address, course_id: CourseId) -> Option<InFlightGuard> {
        let key = (wallet, course_id);
        if !self.in_flight.lock().insert(key) {
            return None;
        }
        Some(InFlightGuard {
            set: self.in_flight.clone(),
            key,
        })
    }

    /// Drive one purchase attempt as far as it can go.
    pub async fn run(&self, req: PurchaseRequest, interest: &Interest) -> PurchaseRun {
        let run = PurchaseRun::new(req.wallet, req.course_id);
        let Some(_guard) = self.begin(req.wallet, req.course_id) else {
            let err = PurchaseError::AlreadyInFlight {
                course_id: req.course_id,
            };
            self.notifier.warning(&err.to_string());
            return run.fail(err);
        };
        self.drive(run, &req, interest).await
    }

    async fn drive(
        &self,
        mut run: PurchaseRun,
        req: &PurchaseRequest,
        interest: &Interest,
    ) -> PurchaseRun {
        let wallet = req.wallet;
        run.enter(PurchaseState::Checking);

        if has_purchased(&req.history, req.course_id) {
            self.notifier.warning("You already own this course");
            run.enter(PurchaseState::AlreadyOwned);
            return run;
        }

        let reads = futures::try_join!(
            self.tokens.balance_of(wallet),
            self.tokens.course_allowance(wallet)
        );
        if !interest.is_active() {
            return run.abandon();
        }
        let (balance, allowance) = match reads {
            Ok(v) => v,
            Err(e) => {
                let err = PurchaseError::Read(format!("{:#}", e));
                self.notifier.error(&err.to_string());
                return run.fail(err);
            }
        };
        self.allowance().set(allowance);

        if balance < req.price {
            let err = PurchaseError::InsufficientBalance {
                required: req.price,
                actual: balance,
            };
            self.notifier.error(&err.to_string());
            return run.fail(err);
        }

        if allowance < req.price {
            run.enter(PurchaseState::NeedsApproval);
            let Some(amount) = req.approve_amount else {
                self.notifier
                    .info("Insufficient allowance. Please approve first.");
                return run;
            };

            run.enter(PurchaseState::Approving);
            match self
                .approval
                .approve(wallet, amount, req.price, balance, interest)
                .await
            {
                Ok(Outcome::Completed) => run.enter(PurchaseState::Approved),
                Ok(Outcome::Pending(tx)) => {
                    run.outcome = Outcome::Pending(tx);
                    return run;
                }
                Ok(Outcome::Abandoned) => return run.abandon(),
                Err(e) => return run.fail(PurchaseError::Approval(e)),
            }
        }

        run.enter(PurchaseState::Simulating);
        let call = ContractCall::new(self.contracts.course, course_fn::PURCHASE_COURSE)
            .arg(req.course_id);
        let simulated = self.client.simulate(&call, wallet).await;
        if !interest.is_active() {
            return run.abandon();
        }
        if let Err(e) = simulated {
            return self.simulation_failed(run, &e);
        }

        run.enter(PurchaseState::Purchasing);
        let tx = match self.client.write(&call, wallet).await {
            Ok(tx) => tx,
            Err(e) => return self.transaction_failed(run, &e),
        };
        run.tx = Some(tx.clone());
        if !interest.is_active() {
            return run.abandon();
        }
        self.settle(run, req, &tx, interest).await
    }

    /// Pick up a purchase whose receipt was still pending.
    ///
    /// Waits on `tx` again and, once it is mined, applies the same effects as
    /// an uninterrupted run. The returned trail is `Idle -> Purchasing -> ...`.
    /// An approval left pending is resumed through [`ApprovalFlow::resume`]
    /// instead, after which the purchase is run again.
    pub async fn resume(
        &self,
        req: PurchaseRequest,
        tx: TxHash,
        interest: &Interest,
    ) -> PurchaseRun {
        let mut run = PurchaseRun::new(req.wallet, req.course_id);
        let Some(_guard) = self.begin(req.wallet, req.course_id) else {
            let err = PurchaseError::AlreadyInFlight {
                course_id: req.course_id,
            };
            self.notifier.warning(&err.to_string());
            return run.fail(err);
        };
        tracing::debug!(tx = %tx, course_id = req.course_id, "resuming purchase");
        run.enter(PurchaseState::Purchasing);
        run.tx = Some(tx.clone());
        self.settle(run, &req, &tx, interest).await
    }

    async fn settle(
        &self,
        mut run: PurchaseRun,
        req: &PurchaseRequest,
        tx: &TxHash,
        interest: &Interest,
    ) -> PurchaseRun {
        let receipt = match confirm(self.client.as_ref(), tx, self.receipt_timeout).await {
            Ok(Confirmation::Confirmed(receipt)) => receipt,
            Ok(Confirmation::Pending(tx)) => {
                if interest.is_active() {
                    self.notifier.warning(RECEIPT_TIMEOUT_WARNING);
                    run.outcome = Outcome::Pending(tx);
                    return run;
                }
                return run.abandon();
            }
            Err(e) => {
                if !interest.is_active() {
                    return run.abandon();
                }
                return self.transaction_failed(run, &e);
            }
        };
        if !interest.is_active() {
            return run.abandon();
        }

        run.enter(PurchaseState::Purchased);
        self.after_purchase(run, req, &receipt, interest).await
    }

    fn simulation_failed(&self, run: PurchaseRun, err: &ChainError) -> PurchaseRun {
        let reason = RevertReason::from_chain_error(err)
            .unwrap_or_else(|| RevertReason::Unknown(err.to_string()));
        tracing::warn!(course_id = run.course_id, reason = %reason, "purchase simulation reverted");

        if let RevertReason::CourseAlreadyPurchased { .. } = reason {
            self.notifier.warning(&reason.to_string());
            let mut run = run;
            run.enter(PurchaseState::AlreadyOwned);
            return run;
        }
        let err = PurchaseError::Simulation(reason);
        self.notifier.error(&err.to_string());
        run.fail(err)
    }

    fn transaction_failed(&self, run: PurchaseRun, err: &ChainError) -> PurchaseRun {
        let err = PurchaseError::Transaction(TxFailure::from_chain_error(err));
        tracing::warn!(course_id = run.course_id, error = %err, "purchase transaction failed");
        self.notifier.error(&err.to_string());
        run.fail(err)
    }

    /// Post-confirmation effects: cache invalidation, fresh balance and
    /// history, event check and the success notice.
    async fn after_purchase(
        &self,
        mut run: PurchaseRun,
        req: &PurchaseRequest,
        receipt: &Receipt,
        interest: &Interest,
    ) -> PurchaseRun {
        let wallet = req.wallet;
        self.nfts.invalidate_claim(&wallet, req.course_id);

        let balance = self.tokens.balance_of(wallet).await;
        if !interest.is_active() {
            return run.abandon();
        }
        match balance {
            Ok(b) => run.balance = Some(b),
            Err(e) => tracing::warn!(error = %e, "balance refresh after purchase failed"),
        }

        let history = self.courses.purchase_history(wallet).await;
        if !interest.is_active() {
            return run.abandon();
        }
        match history {
            Ok(h) => run.history = Some(h),
            Err(e) => tracing::warn!(error = %e, "history refresh after purchase failed"),
        }

        let filter = LogFilter::in_block(self.contracts.course, COURSE_PURCHASED, receipt.block_number);
        let logs = self.client.get_logs(&filter).await;
        if !interest.is_active() {
            return run.abandon();
        }
        run.event_confirmed = match logs {
            Ok(logs) => find_events(self.client.as_ref(), &COURSE_PURCHASED, &logs)
                .iter()
                .any(|event| {
                    let buyer = event.arg("buyer").and_then(|v| v.as_address()).ok();
                    let course = event.arg("courseId").and_then(|v| v.as_u64()).ok();
                    buyer == Some(wallet) && course == Some(req.course_id)
                }),
            Err(e) => {
                tracing::warn!(error = %e, "log query after purchase failed");
                false
            }
        };

        if run.event_confirmed {
            self.notifier.success(&format!(
                "Successfully purchased course \"{}\" for {} YD",
                req.title, req.price
            ));
        } else {
            tracing::warn!(tx = ?run.tx, "no CoursePurchased event in receipt block");
            self.notifier.warning("Failed to confirm purchase");
        }
        run
    }
}
