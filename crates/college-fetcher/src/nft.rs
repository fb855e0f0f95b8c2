//! Certificate contract reads, all served through the read cache.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use futures::future::try_join_all;

use college_cache::keys;
use college_transport::{nft_fn, AbiValue, ChainClient, ContractCall, ContractSet};
use college_types::{Address, Amount, CourseId, CourseNftInfo, NftRecord};

use crate::cached::{cached_read, ReadCache};
use crate::retry::RetryPolicy;

pub const WALLET_NOT_CONNECTED: &str = "Wallet not connected";

#[derive(Clone)]
pub struct NftReader {
    client: Arc<dyn ChainClient>,
    contracts: ContractSet,
    cache: Arc<ReadCache>,
    policy: RetryPolicy,
}

fn require_wallet(owner: Option<Address>) -> Result<Address> {
    owner.ok_or_else(|| anyhow!(WALLET_NOT_CONNECTED))
}

impl NftReader {
    pub fn new(
        client: Arc<dyn ChainClient>,
        contracts: ContractSet,
        cache: Arc<ReadCache>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            contracts,
            cache,
            policy,
        }
    }

    pub fn cache(&self) -> &Arc<ReadCache> {
        &self.cache
    }

    async fn read(&self, call: ContractCall) -> Result<AbiValue> {
        Ok(self.client.read(&call).await?)
    }

    fn call(&self, function: &str) -> ContractCall {
        ContractCall::new(self.contracts.nft, function)
    }

    pub async fn has_claimed(&self, owner: Option<Address>, course_id: CourseId) -> Result<bool> {
        let owner = require_wallet(owner)?;
        let key = keys::has_claimed_nft(&owner, course_id);
        cached_read(&self.cache, &self.policy, &key, || {
            self.fetch_claimed(owner, course_id)
        })
        .await
    }

    async fn fetch_claimed(&self, owner: Address, course_id: CourseId) -> Result<bool> {
        let value = self
            .read(self.call(nft_fn::HAS_CLAIMED_NFT).arg(owner).arg(course_id))
            .await?;
        Ok(value.as_bool()?)
    }

    pub async fn is_paused(&self) -> Result<bool> {
        cached_read(&self.cache, &self.policy, &keys::is_paused(), || self.fetch_paused()).await
    }

    async fn fetch_paused(&self) -> Result<bool> {
        Ok(self.read(self.call(nft_fn::PAUSED)).await?.as_bool()?)
    }

    /// Every certificate `owner` holds, with its course and token URI.
    pub async fn user_nfts(&self, owner: Option<Address>) -> Result<Vec<NftRecord>> {
        let owner = require_wallet(owner)?;
        let key = keys::user_nfts(&owner);
        cached_read(&self.cache, &self.policy, &key, || self.fetch_user_nfts(owner)).await
    }

    async fn fetch_user_nfts(&self, owner: Address) -> Result<Vec<NftRecord>> {
        let ids = self
            .read(self.call(nft_fn::GET_TOKENS_BY_OWNER).arg(owner))
            .await?;
        let token_ids = ids
            .as_array()?
            .iter()
            .map(|v| v.as_u64())
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(owner = %owner, count = token_ids.len(), "loading certificates");
        try_join_all(token_ids.into_iter().map(|id| self.fetch_record(id))).await
    }

    async fn fetch_record(&self, token_id: u64) -> Result<NftRecord> {
        let (uri, course) = futures::try_join!(
            self.read(self.call(nft_fn::TOKEN_URI).arg(token_id)),
            self.read(self.call(nft_fn::TOKEN_COURSES).arg(token_id)),
        )?;
        Ok(NftRecord {
            token_id,
            course_id: course.as_u64()?,
            token_uri: uri.as_str()?.to_string(),
        })
    }

    pub async fn total_supply(&self) -> Result<Amount> {
        cached_read(&self.cache, &self.policy, &keys::total_supply(), || {
            self.fetch_uint(self.call(nft_fn::TOTAL_SUPPLY))
        })
        .await
    }

    /// IPFS CID of the certificate artwork for `course_id`.
    pub async fn course_cid(&self, course_id: CourseId) -> Result<String> {
        cached_read(&self.cache, &self.policy, &keys::course_cid(course_id), || {
            self.fetch_cid(course_id)
        })
        .await
    }

    async fn fetch_cid(&self, course_id: CourseId) -> Result<String> {
        let value = self.read(self.call(nft_fn::COURSE_CIDS).arg(course_id)).await?;
        Ok(value.as_str()?.to_string())
    }

    pub async fn course_nft_info(&self, course_id: CourseId) -> Result<CourseNftInfo> {
        let key = keys::course_nft_info(course_id);
        cached_read(&self.cache, &self.policy, &key, || self.fetch_nft_info(course_id)).await
    }

    /// `getCourseNFTInfo` returns `(cid, totalMinted, exists)`.
    async fn fetch_nft_info(&self, course_id: CourseId) -> Result<CourseNftInfo> {
        let value = self
            .read(self.call(nft_fn::GET_COURSE_NFT_INFO).arg(course_id))
            .await?;
        let fields = value.as_tuple(3)?;
        Ok(CourseNftInfo {
            cid: fields[0].as_str()?.to_string(),
            total_minted: fields[1].as_uint()?,
            exists: fields[2].as_bool()?,
        })
    }

    pub async fn course_nft_count(&self, course_id: CourseId) -> Result<Amount> {
        let key = keys::course_nft_count(course_id);
        cached_read(&self.cache, &self.policy, &key, || {
            self.fetch_uint(self.call(nft_fn::COURSE_NFT_COUNT).arg(course_id))
        })
        .await
    }

    async fn fetch_uint(&self, call: ContractCall) -> Result<Amount> {
        Ok(self.read(call).await?.as_uint()?)
    }

    /// Drop the cached claim status for one course.
    pub fn invalidate_claim(&self, owner: &Address, course_id: CourseId) {
        self.cache.invalidate(&keys::has_claimed_nft(owner, course_id));
    }

    /// Drop every cached fact about `owner`.
    pub fn invalidate_wallet(&self, owner: &Address) {
        for prefix in keys::wallet_prefixes(owner) {
            self.cache.invalidate_prefix(&prefix);
        }
    }

    /// Mint-related counters change with every mint.
    pub fn invalidate_mint_stats(&self, course_id: CourseId) {
        self.cache.invalidate(&keys::total_supply());
        self.cache.invalidate(&keys::course_nft_info(course_id));
        self.cache.invalidate(&keys::course_nft_count(course_id));
    }
}
