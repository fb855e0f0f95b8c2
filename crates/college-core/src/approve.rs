//! Granting the course registry an allowance on the YD token.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use college_fetcher::TokenReader;
use college_transport::{token_fn, ChainClient, ContractCall, ContractSet, TxHash};
use college_types::{Address, Amount};

use crate::allowance::AllowanceState;
use crate::errors::{TxFailure, ValidationError};
use crate::interest::{Interest, Outcome};
use crate::notify::Notifier;
use crate::tx::{confirm, Confirmation, RECEIPT_TIMEOUT_WARNING};

/// Parse a typed approval amount. Only positive whole token amounts pass.
pub fn parse_approval_input(input: &str) -> Result<Amount, ValidationError> {
    match input.trim().parse::<Amount>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ValidationError::InvalidAmount),
    }
}

/// Check `amount` against the wallet balance and the course price.
pub fn validate_approval(
    amount: Amount,
    price: Amount,
    balance: Amount,
) -> Result<(), ValidationError> {
    if amount == 0 {
        return Err(ValidationError::InvalidAmount);
    }
    if amount > balance {
        return Err(ValidationError::ExceedsBalance { balance });
    }
    if amount < price {
        return Err(ValidationError::BelowPrice { price });
    }
    Ok(())
}

/// The amount the "max" shortcut fills in: exactly the price.
pub fn max_approval(price: Amount, balance: Amount) -> Amount {
    price.max(balance.min(price))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalError {
    Validation(ValidationError),
    Failed(TxFailure),
}

impl fmt::Display for ApprovalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalError::Validation(e) => write!(f, "{}", e),
            ApprovalError::Failed(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ApprovalError {}

impl From<ValidationError> for ApprovalError {
    fn from(e: ValidationError) -> Self {
        ApprovalError::Validation(e)
    }
}

#[derive(Clone)]
pub struct ApprovalFlow {
    client: Arc<dyn ChainClient>,
    contracts: ContractSet,
    tokens: TokenReader,
    allowance: AllowanceState,
    notifier: Arc<dyn Notifier>,
    receipt_timeout: Duration,
}

impl ApprovalFlow {
    pub fn new(
        client: Arc<dyn ChainClient>,
        contracts: ContractSet,
        allowance: AllowanceState,
        notifier: Arc<dyn Notifier>,
        receipt_timeout: Duration,
    ) -> Self {
        Self {
            tokens: TokenReader::new(client.clone(), contracts),
            client,
            contracts,
            allowance,
            notifier,
            receipt_timeout,
        }
    }

    pub fn allowance(&self) -> &AllowanceState {
        &self.allowance
    }

    /// Re-read the allowance from chain into the shared state.
    pub async fn refresh(&self, wallet: Address) -> anyhow::Result<Amount> {
        let amount = self.tokens.course_allowance(wallet).await?;
        self.allowance.set(amount);
        Ok(amount)
    }

    /// Validate, submit `approve(course, amount)` and wait for it.
    ///
    /// On confirmation the allowance is re-read from chain.
    pub async fn approve(
        &self,
        wallet: Address,
        amount: Amount,
        price: Amount,
        balance: Amount,
        interest: &Interest,
    ) -> Result<Outcome, ApprovalError> {
        if let Err(e) = validate_approval(amount, price, balance) {
            self.notifier.error(&e.to_string());
            return Err(e.into());
        }

        let call = ContractCall::new(self.contracts.token, token_fn::APPROVE)
            .arg(self.contracts.course)
            .arg(amount);
        tracing::info!(wallet = %wallet, amount = %amount, "submitting approval");
        let tx = match self.client.write(&call, wallet).await {
            Ok(tx) => tx,
            Err(e) => return Err(self.fail(&e)),
        };
        if !interest.is_active() {
            tracing::debug!(tx = %tx, "approval submitted after interest was withdrawn");
            return Ok(Outcome::Abandoned);
        }
        self.settle(wallet, &tx, interest).await
    }

    /// Pick up an approval whose receipt was still pending.
    ///
    /// Waits on `tx` again and re-reads the allowance once it is mined.
    pub async fn resume(
        &self,
        wallet: Address,
        tx: &TxHash,
        interest: &Interest,
    ) -> Result<Outcome, ApprovalError> {
        tracing::debug!(tx = %tx, "resuming approval");
        self.settle(wallet, tx, interest).await
    }

    async fn settle(
        &self,
        wallet: Address,
        tx: &TxHash,
        interest: &Interest,
    ) -> Result<Outcome, ApprovalError> {
        self.allowance.mark_loading();
        let confirmation = confirm(self.client.as_ref(), tx, self.receipt_timeout).await;
        if !interest.is_active() {
            tracing::debug!(tx = %tx, "skipping allowance refresh, interest withdrawn");
            return Ok(Outcome::Abandoned);
        }
        match confirmation {
            Ok(Confirmation::Confirmed(_)) => {}
            Ok(Confirmation::Pending(tx)) => {
                self.allowance.clear_loading();
                self.notifier.warning(RECEIPT_TIMEOUT_WARNING);
                return Ok(Outcome::Pending(tx));
            }
            Err(e) => {
                self.allowance.clear_loading();
                return Err(self.fail(&e));
            }
        }

        let refreshed = self.refresh(wallet).await;
        if !interest.is_active() {
            return Ok(Outcome::Abandoned);
        }
        match refreshed {
            Ok(now) => {
                self.notifier
                    .success(&format!("Approval confirmed. Allowance: {} YD", now));
                Ok(Outcome::Completed)
            }
            Err(e) => {
                self.allowance.clear_loading();
                let failure = TxFailure::Other(format!("Failed to refresh allowance: {:#}", e));
                self.notifier.error(&failure.to_string());
                Err(ApprovalError::Failed(failure))
            }
        }
    }

    fn fail(&self, err: &college_transport::ChainError) -> ApprovalError {
        let failure = TxFailure::from_chain_error(err);
        tracing::warn!(error = %err, "approval failed");
        self.notifier.error(&failure.to_string());
        ApprovalError::Failed(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{NoticeLevel, RecordingNotifier};
    use college_transport::{CallKind, ChainError, MockChain};

    #[test]
    fn test_validation_order() {
        assert_eq!(parse_approval_input(""), Err(ValidationError::InvalidAmount));
        assert_eq!(parse_approval_input("abc"), Err(ValidationError::InvalidAmount));
        assert_eq!(parse_approval_input("0"), Err(ValidationError::InvalidAmount));
        assert_eq!(parse_approval_input(" 120 "), Ok(120));

        assert_eq!(
            validate_approval(600, 99, 500),
            Err(ValidationError::ExceedsBalance { balance: 500 })
        );
        assert_eq!(
            validate_approval(50, 99, 500),
            Err(ValidationError::BelowPrice { price: 99 })
        );
        assert!(validate_approval(99, 99, 500).is_ok());
        assert_eq!(max_approval(99, 500), 99);
        assert_eq!(max_approval(99, 10), 99);
    }

    fn flow(chain: &Arc<MockChain>, notifier: &Arc<RecordingNotifier>) -> ApprovalFlow {
        ApprovalFlow::new(
            chain.clone(),
            chain.contracts(),
            AllowanceState::new(),
            notifier.clone(),
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn test_approve_refreshes_allowance() {
        let chain = Arc::new(MockChain::new(ContractSet::sepolia()));
        let notifier = Arc::new(RecordingNotifier::new());
        let wallet = Address::from_low_u8(1);
        let flow = flow(&chain, &notifier);

        let outcome = flow
            .approve(wallet, 99, 99, 500, &Interest::detached())
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(flow.allowance().snapshot().amount, 99);
        assert!(!flow.allowance().snapshot().is_loading);
        assert_eq!(chain.allowance_of(wallet, chain.contracts().course), 99);
        assert_eq!(notifier.messages(NoticeLevel::Success).len(), 1);
    }

    #[tokio::test]
    async fn test_pending_approval_resumes() {
        let chain = Arc::new(MockChain::new(ContractSet::sepolia()));
        let notifier = Arc::new(RecordingNotifier::new());
        let wallet = Address::from_low_u8(1);
        let flow = flow(&chain, &notifier);
        chain.time_out_next_receipts(1);

        let outcome = flow
            .approve(wallet, 99, 99, 500, &Interest::detached())
            .await
            .unwrap();
        let Outcome::Pending(tx) = outcome else {
            panic!("expected a pending approval, got {:?}", outcome);
        };
        // Not stuck loading while the receipt is outstanding.
        assert!(!flow.allowance().snapshot().is_loading);
        assert!(!flow.allowance().covers(99));

        let resumed = flow.resume(wallet, &tx, &Interest::detached()).await.unwrap();
        assert_eq!(resumed, Outcome::Completed);
        assert!(flow.allowance().covers(99));
        assert_eq!(chain.total_calls(CallKind::Write), 1);
        assert_eq!(
            notifier.messages(NoticeLevel::Success),
            vec!["Approval confirmed. Allowance: 99 YD"]
        );
    }

    #[tokio::test]
    async fn test_invalid_amount_sends_nothing() {
        let chain = Arc::new(MockChain::new(ContractSet::sepolia()));
        let notifier = Arc::new(RecordingNotifier::new());
        let flow = flow(&chain, &notifier);

        let err = flow
            .approve(Address::from_low_u8(1), 600, 99, 500, &Interest::detached())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Insufficient wallet balance. Max available: 500 YD"
        );
        assert_eq!(chain.total_calls(CallKind::Write), 0);
    }

    #[tokio::test]
    async fn test_rejected_approval() {
        let chain = Arc::new(MockChain::new(ContractSet::sepolia()));
        let notifier = Arc::new(RecordingNotifier::new());
        chain.fail_next_write(ChainError::UserRejected("denied".into()));
        let flow = flow(&chain, &notifier);

        let err = flow
            .approve(Address::from_low_u8(1), 99, 99, 500, &Interest::detached())
            .await
            .unwrap_err();
        assert_eq!(err, ApprovalError::Failed(TxFailure::UserRejected));
        assert_eq!(
            notifier.last().unwrap().message,
            "Transaction was rejected by user"
        );
    }
}
