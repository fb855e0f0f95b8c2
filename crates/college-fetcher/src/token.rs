//! YD token reads. Never cached: balances must be live.

use std::sync::Arc;

use anyhow::Result;
use college_transport::{token_fn, ChainClient, ContractCall, ContractSet};
use college_types::{format_units, Address, Amount};

pub const DEFAULT_DECIMALS: u32 = 18;
pub const DEFAULT_SYMBOL: &str = "YD";

#[derive(Clone)]
pub struct TokenReader {
    client: Arc<dyn ChainClient>,
    contracts: ContractSet,
}

impl TokenReader {
    pub fn new(client: Arc<dyn ChainClient>, contracts: ContractSet) -> Self {
        Self { client, contracts }
    }

    fn call(&self, function: &str) -> ContractCall {
        ContractCall::new(self.contracts.token, function)
    }

    pub async fn balance_of(&self, owner: Address) -> Result<Amount> {
        let value = self
            .client
            .read(&self.call(token_fn::BALANCE_OF).arg(owner))
            .await?;
        Ok(value.as_uint()?)
    }

    /// How much `spender` may move on behalf of `owner`.
    pub async fn allowance(&self, owner: Address, spender: Address) -> Result<Amount> {
        let value = self
            .client
            .read(&self.call(token_fn::ALLOWANCE).arg(owner).arg(spender))
            .await?;
        Ok(value.as_uint()?)
    }

    /// Allowance granted to the course registry.
    pub async fn course_allowance(&self, owner: Address) -> Result<Amount> {
        self.allowance(owner, self.contracts.course).await
    }

    /// Token decimals, or 18 if the read fails.
    pub async fn decimals(&self) -> u32 {
        match self.client.read(&self.call(token_fn::DECIMALS)).await {
            Ok(v) => v
                .as_uint()
                .ok()
                .and_then(|d| u32::try_from(d).ok())
                .unwrap_or(DEFAULT_DECIMALS),
            Err(e) => {
                tracing::debug!(error = %e, "decimals unavailable, assuming 18");
                DEFAULT_DECIMALS
            }
        }
    }

    /// Token symbol, or "YD" if the read fails.
    pub async fn symbol(&self) -> String {
        match self.client.read(&self.call(token_fn::SYMBOL)).await {
            Ok(v) => v
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|_| DEFAULT_SYMBOL.to_string()),
            Err(_) => DEFAULT_SYMBOL.to_string(),
        }
    }
}

pub fn format_balance(raw: Amount, decimals: u32) -> String {
    format_units(raw, decimals)
}
