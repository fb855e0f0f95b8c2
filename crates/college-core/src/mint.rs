//! Certificate claim flow.
//!
//! `Checking -> Minting -> Confirming -> Minted`, or `Error` from any of the
//! first three. The completion gate is local and advisory; the contract
//! enforces its own rule on the value passed to `mintNFT`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use college_fetcher::{NftReader, WALLET_NOT_CONNECTED};
use college_transport::{
    find_events, nft_fn, ChainClient, ChainError, ContractCall, ContractSet, Receipt, TxHash,
    NFT_MINTED,
};
use college_types::{format_nft_count, Address, Amount, CourseId, NftRecord};

use crate::interest::{Interest, Outcome};
use crate::notify::Notifier;
use crate::tx::{confirm, Confirmation, RECEIPT_TIMEOUT_WARNING};

/// Completion percentage required before a claim is attempted.
pub const COMPLETE_PROGRESS: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MintState {
    Checking,
    Minting,
    Confirming,
    Minted,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MintError {
    WalletNotConnected,
    AlreadyClaimed,
    Paused,
    /// Local completion below 100%.
    IncompleteProgress { progress: u8 },
    /// The contract refused the progress value.
    ProgressRejected,
    Rejected,
    InsufficientFunds,
    /// Mined with a failed status.
    ReceiptReverted,
    /// Claim or pause status could not be read.
    Read(String),
    Failed(String),
}

impl MintError {
    pub fn from_chain_error(err: &ChainError) -> Self {
        let raw = match err {
            ChainError::Revert { message, .. } => message.clone(),
            other => other.to_string(),
        };
        let lower = raw.to_lowercase();
        if lower.contains("value must be greater than 100") {
            MintError::ProgressRejected
        } else if err.is_user_rejection() || lower.contains("user rejected") {
            MintError::Rejected
        } else if matches!(err, ChainError::InsufficientFunds(_))
            || lower.contains("insufficient funds")
        {
            MintError::InsufficientFunds
        } else if raw.contains("Already claimed NFT") {
            MintError::AlreadyClaimed
        } else {
            MintError::Failed(raw)
        }
    }
}

impl fmt::Display for MintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MintError::WalletNotConnected => write!(f, "{}", WALLET_NOT_CONNECTED),
            MintError::AlreadyClaimed => write!(f, "You have already claimed this NFT"),
            MintError::Paused => write!(f, "NFT minting is currently paused"),
            MintError::IncompleteProgress { .. } => write!(f, "Please complete the video first"),
            MintError::ProgressRejected => write!(f, "Video progress must be 100% to claim NFT"),
            MintError::Rejected => write!(f, "Transaction was rejected"),
            MintError::InsufficientFunds => write!(f, "Insufficient funds for transaction"),
            MintError::ReceiptReverted => write!(f, "Transaction failed"),
            MintError::Read(msg) => write!(f, "Failed to check NFT status: {}", msg),
            MintError::Failed(raw) => write!(f, "{}", raw),
        }
    }
}

impl std::error::Error for MintError {}

/// A wallet's certificates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NftCollection {
    pub nfts: Vec<NftRecord>,
}

impl NftCollection {
    pub fn count(&self) -> usize {
        self.nfts.len()
    }

    /// "1 NFT", "3 NFTs".
    pub fn label(&self) -> String {
        format_nft_count(self.nfts.len())
    }

    pub fn for_course(&self, course_id: CourseId) -> Option<&NftRecord> {
        self.nfts.iter().find(|n| n.course_id == course_id)
    }
}

#[derive(Debug, Clone)]
pub struct MintRun {
    pub course_id: CourseId,
    pub trail: Vec<MintState>,
    pub outcome: Outcome,
    pub error: Option<MintError>,
    pub tx: Option<TxHash>,
    /// Decoded from the `NFTMinted` log, when one was found.
    pub minted: Option<NftRecord>,
    /// Claim status re-read after confirmation.
    pub claimed: Option<bool>,
    /// Collection reloaded after confirmation.
    pub collection: Option<NftCollection>,
}

impl MintRun {
    fn new(course_id: CourseId) -> Self {
        Self {
            course_id,
            trail: vec![MintState::Checking],
            outcome: Outcome::Completed,
            error: None,
            tx: None,
            minted: None,
            claimed: None,
            collection: None,
        }
    }

    pub fn state(&self) -> MintState {
        self.trail.last().copied().unwrap_or(MintState::Checking)
    }

    fn enter(&mut self, state: MintState) {
        tracing::debug!(course_id = self.course_id, from = ?self.state(), to = ?state, "mint transition");
        self.trail.push(state);
    }

    fn fail(mut self, error: MintError) -> Self {
        self.enter(MintState::Error);
        self.error = Some(error);
        self
    }

    fn abandon(mut self) -> Self {
        tracing::debug!(course_id = self.course_id, at = ?self.state(), "interest withdrawn, skipping mint effects");
        self.outcome = Outcome::Abandoned;
        self
    }
}

pub struct MintFlow {
    client: Arc<dyn ChainClient>,
    contracts: ContractSet,
    nfts: NftReader,
    notifier: Arc<dyn Notifier>,
    receipt_timeout: Duration,
}

impl MintFlow {
    pub fn new(
        client: Arc<dyn ChainClient>,
        contracts: ContractSet,
        nfts: NftReader,
        notifier: Arc<dyn Notifier>,
        receipt_timeout: Duration,
    ) -> Self {
        Self {
            client,
            contracts,
            nfts,
            notifier,
            receipt_timeout,
        }
    }

    pub fn reader(&self) -> &NftReader {
        &self.nfts
    }

    pub async fn collection(&self, owner: Option<Address>) -> anyhow::Result<NftCollection> {
        let nfts = self.nfts.user_nfts(owner).await?;
        Ok(NftCollection { nfts })
    }

    /// Claim the completion certificate for `course_id`.
    ///
    /// `progress` is the locally tracked completion percentage.
    pub async fn claim(
        &self,
        wallet: Option<Address>,
        course_id: CourseId,
        progress: u8,
        interest: &Interest,
    ) -> MintRun {
        let run = MintRun::new(course_id);
        let Some(wallet) = wallet else {
            return self.reject(run, MintError::WalletNotConnected);
        };

        let status = futures::try_join!(
            self.nfts.has_claimed(Some(wallet), course_id),
            self.nfts.is_paused()
        );
        if !interest.is_active() {
            return run.abandon();
        }
        let (claimed, paused) = match status {
            Ok(v) => v,
            Err(e) => return self.reject(run, MintError::Read(format!("{:#}", e))),
        };
        if claimed {
            return self.reject(run, MintError::AlreadyClaimed);
        }
        if paused {
            return self.reject(run, MintError::Paused);
        }
        if progress < COMPLETE_PROGRESS {
            return self.reject(run, MintError::IncompleteProgress { progress });
        }

        self.mint(run, wallet, progress, interest).await
    }

    async fn mint(
        &self,
        mut run: MintRun,
        wallet: Address,
        progress: u8,
        interest: &Interest,
    ) -> MintRun {
        let course_id = run.course_id;
        run.enter(MintState::Minting);
        self.notifier
            .info("Please confirm the transaction in your wallet...");

        // Strictly greater than 100 on chain.
        let call = ContractCall::new(self.contracts.nft, nft_fn::MINT_NFT)
            .arg(course_id)
            .arg(progress as Amount + 1);
        tracing::info!(wallet = %wallet, course_id, "submitting certificate mint");
        let tx = match self.client.write(&call, wallet).await {
            Ok(tx) => tx,
            Err(e) => {
                tracing::warn!(error = %e, "mint submission failed");
                return self.chain_rejected(run, wallet, &e);
            }
        };
        if !interest.is_active() {
            run.tx = Some(tx);
            return run.abandon();
        }
        self.settle(run, wallet, tx, interest).await
    }

    /// Pick up a claim whose receipt was still pending.
    ///
    /// Waits on `tx` again and, once it is mined, applies the same effects as
    /// an uninterrupted claim. The returned trail starts at `Checking` and
    /// goes straight to `Confirming`.
    pub async fn resume(
        &self,
        wallet: Address,
        course_id: CourseId,
        tx: TxHash,
        interest: &Interest,
    ) -> MintRun {
        tracing::debug!(tx = %tx, course_id, "resuming certificate claim");
        self.settle(MintRun::new(course_id), wallet, tx, interest).await
    }

    async fn settle(
        &self,
        mut run: MintRun,
        wallet: Address,
        tx: TxHash,
        interest: &Interest,
    ) -> MintRun {
        let course_id = run.course_id;
        run.tx = Some(tx.clone());
        run.enter(MintState::Confirming);
        let confirmation = confirm(self.client.as_ref(), &tx, self.receipt_timeout).await;
        if !interest.is_active() {
            return run.abandon();
        }
        let receipt = match confirmation {
            Ok(Confirmation::Confirmed(receipt)) => receipt,
            Ok(Confirmation::Pending(tx)) => {
                // The claim may land at any moment.
                self.nfts.invalidate_claim(&wallet, course_id);
                self.notifier.warning(RECEIPT_TIMEOUT_WARNING);
                run.outcome = Outcome::Pending(tx);
                return run;
            }
            Err(ChainError::Revert { .. }) => return self.reject(run, MintError::ReceiptReverted),
            Err(e) => return self.chain_rejected(run, wallet, &e),
        };

        run.enter(MintState::Minted);
        run.minted = self.minted_record(&receipt, wallet, course_id);
        match &run.minted {
            Some(nft) => {
                tracing::info!(token_id = nft.token_id, course_id, "certificate minted");
                self.notifier.success("Successfully claimed your NFT!");
            }
            None => {
                tracing::warn!(tx = %tx, "receipt has no NFTMinted log");
                self.notifier.warning("No NFT minted event found");
            }
        }

        self.nfts.invalidate_claim(&wallet, course_id);
        self.nfts.invalidate_wallet(&wallet);
        self.nfts.invalidate_mint_stats(course_id);

        let claimed = self.nfts.has_claimed(Some(wallet), course_id).await;
        if !interest.is_active() {
            return run.abandon();
        }
        match claimed {
            Ok(c) => run.claimed = Some(c),
            Err(e) => {
                tracing::warn!(error = %e, "claim status re-check failed");
                self.notifier.warning("Unable to verify NFT claim status");
            }
        }

        let collection = self.collection(Some(wallet)).await;
        if !interest.is_active() {
            return run.abandon();
        }
        match collection {
            Ok(c) => run.collection = Some(c),
            Err(e) => tracing::warn!(error = %e, "collection reload failed"),
        }
        run
    }

    /// Map a chain error. A contract that says the certificate is already
    /// claimed overrides whatever claim status is cached.
    fn chain_rejected(&self, run: MintRun, wallet: Address, err: &ChainError) -> MintRun {
        let error = MintError::from_chain_error(err);
        if error == MintError::AlreadyClaimed {
            self.nfts.invalidate_claim(&wallet, run.course_id);
            self.nfts.invalidate_wallet(&wallet);
        }
        self.reject(run, error)
    }

    fn minted_record(&self, receipt: &Receipt, wallet: Address, course_id: CourseId) -> Option<NftRecord> {
        find_events(self.client.as_ref(), &NFT_MINTED, &receipt.logs)
            .into_iter()
            .find_map(|event| {
                let user = event.arg("user").and_then(|v| v.as_address()).ok()?;
                let course = event.arg("courseId").and_then(|v| v.as_u64()).ok()?;
                if user != wallet || course != course_id {
                    return None;
                }
                Some(NftRecord {
                    token_id: event.arg("tokenId").and_then(|v| v.as_u64()).ok()?,
                    course_id: course,
                    token_uri: event
                        .arg("tokenURI")
                        .and_then(|v| v.as_str().map(str::to_string))
                        .unwrap_or_default(),
                })
            })
    }

    fn reject(&self, run: MintRun, error: MintError) -> MintRun {
        self.notifier.error(&error.to_string());
        run.fail(error)
    }
}
