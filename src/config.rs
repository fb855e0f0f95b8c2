//! Client configuration.
//!
//! Everything is optional. `CollegeConfig::from_env` reads:
//!
//! | Variable | Default |
//! |----------|---------|
//! | `COLLEGE_TOKEN_ADDRESS`, `COLLEGE_COURSE_ADDRESS`, `COLLEGE_NFT_ADDRESS` | Sepolia deployment |
//! | `COLLEGE_RPC_URL` | Sepolia Infura with `COLLEGE_RPC_API_KEY` |
//! | `COLLEGE_CACHE_TTL_SECS` | 300 |
//! | `COLLEGE_RECEIPT_TIMEOUT_SECS` | 60 |
//! | `COLLEGE_RETRY_ATTEMPTS` / `COLLEGE_RETRY_BASE_MS` | 3 / 1000 |
//! | `COLLEGE_STORAGE_DIR` | `~/.web3-college` |
//! | `COLLEGE_IPFS_GATEWAY` | Filebase |
//! | `COLLEGE_RETRY_TRANSIENT_ONLY` | off |

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use college_cache::DEFAULT_TTL;
use college_core::{default_storage_dir, receipt_timeout_from_env, DEFAULT_RECEIPT_TIMEOUT};
use college_fetcher::RetryPolicy;
use college_transport::{resolve_rpc_endpoint, ContractSet, DEFAULT_IPFS_GATEWAY};

#[derive(Debug, Clone)]
pub struct CollegeConfig {
    pub contracts: ContractSet,
    /// Endpoint the caller's chain client should talk to.
    pub rpc_url: String,
    pub cache_ttl: Duration,
    pub receipt_timeout: Duration,
    pub retry: RetryPolicy,
    /// Where progress is persisted. `None` keeps it in memory.
    pub storage_dir: Option<PathBuf>,
    pub ipfs_gateway: String,
}

impl Default for CollegeConfig {
    fn default() -> Self {
        Self {
            contracts: ContractSet::sepolia(),
            rpc_url: resolve_rpc_endpoint(),
            cache_ttl: DEFAULT_TTL,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
            retry: RetryPolicy::default(),
            storage_dir: None,
            ipfs_gateway: DEFAULT_IPFS_GATEWAY.to_string(),
        }
    }
}

impl CollegeConfig {
    pub fn from_env() -> Result<Self> {
        let mut retry = RetryPolicy::from_env();
        if college_types::env_bool("COLLEGE_RETRY_TRANSIENT_ONLY") {
            retry = retry.transient_only();
        }
        Ok(Self {
            contracts: ContractSet::from_env()?,
            rpc_url: resolve_rpc_endpoint(),
            cache_ttl: college_types::env_duration_secs_or("COLLEGE_CACHE_TTL_SECS", DEFAULT_TTL),
            receipt_timeout: receipt_timeout_from_env(),
            retry,
            storage_dir: Some(default_storage_dir()),
            ipfs_gateway: college_types::env_string_or("COLLEGE_IPFS_GATEWAY", DEFAULT_IPFS_GATEWAY),
        })
    }

    pub fn with_contracts(mut self, contracts: ContractSet) -> Self {
        self.contracts = contracts;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }

    pub fn in_memory_storage(mut self) -> Self {
        self.storage_dir = None;
        self
    }
}
