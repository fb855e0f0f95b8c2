//! Web3 College client core
//!
//! Cached contract reads plus the flows that move value on chain:
//!
//! - **Reads**: token balances, the course registry and certificate status,
//!   with certificate facts memoized for five minutes
//! - **Purchases**: balance and allowance checks, approval, dry run, purchase
//! - **Certificates**: progress-gated NFT claims
//! - **Token sale**: ETH for YD at a fixed rate
//!
//! [`College`] wires one chain client, one read cache and one notifier into
//! all of them. The workspace crates can also be used on their own:
//!
//! - [`college_types`]: shared records and units
//! - [`college_transport`]: the [`ChainClient`] seam and contract descriptors
//! - [`college_cache`]: the TTL read-through cache
//! - [`college_fetcher`]: retrying, cached reads
//! - [`college_core`]: the state machines
//!
//! # Example
//!
//! ```ignore
//! use web3_college::{College, CollegeConfig, Interest, LogNotifier};
//!
//! let college = College::new(CollegeConfig::from_env()?, client, Arc::new(LogNotifier))?;
//! let run = college
//!     .purchase_course(wallet, course_id, Some(price), &Interest::new())
//!     .await?;
//! ```

pub mod config;

use std::sync::Arc;

use anyhow::{Context, Result};

use college_cache::MetricsSnapshot;
use college_fetcher::{CourseReader, NftReader, ReadCache, TokenReader};
use college_transport::MetadataGateway;
use college_types::{has_purchased, Address, Amount, CourseId, CourseStats};

pub use college_cache;
pub use college_core;
pub use college_fetcher;
pub use college_transport;
pub use college_types;

pub use college_core::{
    Interest, LogNotifier, MintFlow, MintRun, NftCollection, Notifier, Outcome, ProgressStore,
    PurchaseCoordinator, PurchaseRequest, PurchaseRun, RecordingNotifier, TokenSale,
};
pub use college_transport::{ChainClient, ContractSet};
pub use config::CollegeConfig;

/// One wallet's view of the storefront.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub balance: Amount,
    pub symbol: String,
    pub decimals: u32,
    pub stats: CourseStats,
    pub nfts: NftCollection,
}

pub struct College {
    config: CollegeConfig,
    client: Arc<dyn ChainClient>,
    cache: Arc<ReadCache>,
    tokens: TokenReader,
    courses: CourseReader,
    nfts: NftReader,
    purchases: PurchaseCoordinator,
    mint: MintFlow,
    sale: TokenSale,
    progress: ProgressStore,
    gateway: MetadataGateway,
}

impl College {
    pub fn new(
        config: CollegeConfig,
        client: Arc<dyn ChainClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let contracts = config.contracts;
        let cache = Arc::new(ReadCache::with_ttl(config.cache_ttl));
        let nfts = NftReader::new(client.clone(), contracts, cache.clone(), config.retry);
        let progress = match &config.storage_dir {
            Some(dir) => ProgressStore::open(dir).context("failed to open progress store")?,
            None => ProgressStore::in_memory(),
        };
        let gateway = MetadataGateway::with_timeout(
            &config.ipfs_gateway,
            college_types::env_duration_secs_or(
                "COLLEGE_GATEWAY_TIMEOUT_SECS",
                std::time::Duration::from_secs(30),
            ),
        );

        tracing::info!(
            rpc = %config.rpc_url,
            course = %contracts.course,
            ttl_secs = config.cache_ttl.as_secs(),
            "college client ready"
        );

        Ok(Self {
            tokens: TokenReader::new(client.clone(), contracts),
            courses: CourseReader::new(client.clone(), contracts),
            purchases: PurchaseCoordinator::new(
                client.clone(),
                contracts,
                cache.clone(),
                config.retry,
                notifier.clone(),
                config.receipt_timeout,
            ),
            mint: MintFlow::new(
                client.clone(),
                contracts,
                nfts.clone(),
                notifier.clone(),
                config.receipt_timeout,
            ),
            sale: TokenSale::new(client.clone(), contracts, notifier, config.receipt_timeout),
            nfts,
            progress,
            gateway,
            cache,
            client,
            config,
        })
    }

    pub fn config(&self) -> &CollegeConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    pub fn cache(&self) -> &Arc<ReadCache> {
        &self.cache
    }

    pub fn tokens(&self) -> &TokenReader {
        &self.tokens
    }

    pub fn courses(&self) -> &CourseReader {
        &self.courses
    }

    pub fn nfts(&self) -> &NftReader {
        &self.nfts
    }

    pub fn purchases(&self) -> &PurchaseCoordinator {
        &self.purchases
    }

    pub fn mint(&self) -> &MintFlow {
        &self.mint
    }

    pub fn token_sale(&self) -> &TokenSale {
        &self.sale
    }

    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    pub fn gateway(&self) -> &MetadataGateway {
        &self.gateway
    }

    pub fn cache_metrics(&self) -> MetricsSnapshot {
        self.cache.metrics().snapshot()
    }

    /// Load the course and the wallet's history, then run a purchase.
    ///
    /// `approve_amount` is used only if the current allowance is short.
    pub async fn purchase_course(
        &self,
        wallet: Address,
        course_id: CourseId,
        approve_amount: Option<Amount>,
        interest: &Interest,
    ) -> Result<PurchaseRun> {
        let course = self.courses.course(course_id).await?;
        let history = self.courses.purchase_history(wallet).await?;
        tracing::debug!(
            course_id,
            owned = has_purchased(&history, course_id),
            "starting purchase"
        );

        let mut req = PurchaseRequest::new(wallet, course_id, course.price)
            .titled(&course.name)
            .with_history(history);
        req.approve_amount = approve_amount;
        Ok(self.purchases.run(req, interest).await)
    }

    /// Claim the certificate for `course_id` using locally tracked progress.
    pub async fn claim_certificate(
        &self,
        wallet: Option<Address>,
        course_id: CourseId,
        interest: &Interest,
    ) -> MintRun {
        let progress = self.progress.progress(course_id);
        self.mint.claim(wallet, course_id, progress, interest).await
    }

    pub async fn dashboard(&self, wallet: Address) -> Result<Dashboard> {
        let balance = self.tokens.balance_of(wallet).await?;
        let symbol = self.tokens.symbol().await;
        let decimals = self.tokens.decimals().await;
        let stats = self.courses.course_stats(wallet).await?;
        let nfts = self.mint.collection(Some(wallet)).await?;
        Ok(Dashboard {
            balance,
            symbol,
            decimals,
            stats,
            nfts,
        })
    }
}
