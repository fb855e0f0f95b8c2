//! Buying YD with ETH through the token contract's payable `buyTokens`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use college_transport::{token_fn, ChainClient, ContractCall, ContractSet};
use college_types::{format_units, parse_units, Address, Amount, ETH_DECIMALS};

use crate::errors::{TxFailure, ValidationError};
use crate::interest::{Interest, Outcome};
use crate::notify::Notifier;
use crate::tx::{confirm, Confirmation, RECEIPT_TIMEOUT_WARNING};

/// YD received per whole ETH.
pub const EXCHANGE_RATE: Amount = 1000;

/// Smallest accepted spend, 0.001 ETH in wei.
pub const MIN_PURCHASE_WEI: Amount = 1_000_000_000_000_000;

const WEI_PER_ETH: Amount = 1_000_000_000_000_000_000;

/// Parse an ETH amount typed by the user into wei.
pub fn parse_eth_input(input: &str) -> Result<Amount, ValidationError> {
    let wei = parse_units(input, ETH_DECIMALS).map_err(|_| ValidationError::InvalidAmount)?;
    if wei == 0 {
        return Err(ValidationError::InvalidAmount);
    }
    if wei < MIN_PURCHASE_WEI {
        return Err(ValidationError::BelowMinimum {
            minimum: format_units(MIN_PURCHASE_WEI, ETH_DECIMALS),
            unit: "ETH",
        });
    }
    expected_tokens(wei)?;
    Ok(wei)
}

/// YD minted for `wei` at [`EXCHANGE_RATE`], rounded down.
///
/// Amounts too large to convert are invalid.
pub fn expected_tokens(wei: Amount) -> Result<Amount, ValidationError> {
    wei.checked_mul(EXCHANGE_RATE)
        .map(|scaled| scaled / WEI_PER_ETH)
        .ok_or(ValidationError::InvalidAmount)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaleError {
    Validation(ValidationError),
    /// The dry run reverted. Nothing was sent.
    SimulationFailed,
    Failed(TxFailure),
}

impl fmt::Display for SaleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaleError::Validation(e) => write!(f, "{}", e),
            SaleError::SimulationFailed => write!(
                f,
                "Transaction would fail. Please check your input and try again."
            ),
            SaleError::Failed(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SaleError {}

impl From<ValidationError> for SaleError {
    fn from(e: ValidationError) -> Self {
        SaleError::Validation(e)
    }
}

pub struct TokenSale {
    client: Arc<dyn ChainClient>,
    contracts: ContractSet,
    notifier: Arc<dyn Notifier>,
    receipt_timeout: Duration,
}

impl TokenSale {
    pub fn new(
        client: Arc<dyn ChainClient>,
        contracts: ContractSet,
        notifier: Arc<dyn Notifier>,
        receipt_timeout: Duration,
    ) -> Self {
        Self {
            client,
            contracts,
            notifier,
            receipt_timeout,
        }
    }

    /// Spend `eth_input` ETH on YD.
    pub async fn buy(
        &self,
        wallet: Address,
        eth_input: &str,
        interest: &Interest,
    ) -> Result<Outcome, SaleError> {
        let (wei, tokens) = match parse_eth_input(eth_input)
            .and_then(|wei| expected_tokens(wei).map(|tokens| (wei, tokens)))
        {
            Ok(parsed) => parsed,
            Err(e) => {
                self.notifier.error(&e.to_string());
                return Err(e.into());
            }
        };
        let call = ContractCall::new(self.contracts.token, token_fn::BUY_TOKENS).with_value(wei);

        let simulated = self.client.simulate(&call, wallet).await;
        if !interest.is_active() {
            return Ok(Outcome::Abandoned);
        }
        if let Err(e) = simulated {
            tracing::warn!(error = %e, wei = %wei, "token purchase simulation failed");
            let err = SaleError::SimulationFailed;
            self.notifier.error(&err.to_string());
            return Err(err);
        }

        tracing::info!(wallet = %wallet, wei = %wei, tokens = %tokens, "buying tokens");
        let tx = match self.client.write(&call, wallet).await {
            Ok(tx) => tx,
            Err(e) => return Err(self.fail(&e)),
        };
        if !interest.is_active() {
            tracing::debug!(tx = %tx, "token purchase sent after interest was withdrawn");
            return Ok(Outcome::Abandoned);
        }

        let confirmation = confirm(self.client.as_ref(), &tx, self.receipt_timeout).await;
        if !interest.is_active() {
            return Ok(Outcome::Abandoned);
        }
        match confirmation {
            Ok(Confirmation::Confirmed(_)) => {
                self.notifier
                    .success(&format!("Successfully purchased {} YD", tokens));
                Ok(Outcome::Completed)
            }
            Ok(Confirmation::Pending(tx)) => {
                self.notifier.warning(RECEIPT_TIMEOUT_WARNING);
                Ok(Outcome::Pending(tx))
            }
            Err(e) => Err(self.fail(&e)),
        }
    }

    fn fail(&self, err: &college_transport::ChainError) -> SaleError {
        let failure = TxFailure::from_chain_error(err);
        tracing::warn!(error = %err, "token purchase failed");
        self.notifier.error(&failure.to_string());
        SaleError::Failed(failure)
    }
}
