//! The chain client seam.
//!
//! Everything the college flows need from the network goes through
//! [`ChainClient`]: contract reads, dry-run simulations, transaction
//! submission, receipt waits and log queries. JSON-RPC, ABI encoding and
//! signing live behind the trait.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use college_types::{Address, Amount};

use crate::abi::AbiValue;
use crate::events::EventAbi;

/// A single contract function invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub contract: Address,
    pub function: String,
    pub args: Vec<AbiValue>,
    /// Native value attached to payable calls, in wei.
    pub value: Amount,
}

impl ContractCall {
    pub fn new(contract: Address, function: &str) -> Self {
        Self {
            contract,
            function: function.to_string(),
            args: Vec::new(),
            value: 0,
        }
    }

    pub fn arg(mut self, arg: impl Into<AbiValue>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_value(mut self, wei: Amount) -> Self {
        self.value = wei;
        self
    }
}

/// Transaction hash as returned by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Success,
    Reverted,
}

/// An emitted event log.
///
/// `topics[0]` identifies the event; `data` is the encoded payload the
/// client knows how to decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<String>,
    pub data: Vec<u8>,
    pub block_number: u64,
    pub tx_hash: TxHash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub status: TxStatus,
    pub block_number: u64,
    pub logs: Vec<Log>,
}

impl Receipt {
    pub fn is_success(&self) -> bool {
        self.status == TxStatus::Success
    }
}

/// Log query. `None` fields match anything.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub address: Option<Address>,
    pub event: Option<EventAbi>,
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
}

impl LogFilter {
    /// Logs of `event` emitted by `address` in exactly one block.
    pub fn in_block(address: Address, event: EventAbi, block: u64) -> Self {
        Self {
            address: Some(address),
            event: Some(event),
            from_block: Some(block),
            to_block: Some(block),
        }
    }
}

/// An event log decoded against an [`EventAbi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    pub name: String,
    pub args: BTreeMap<String, AbiValue>,
}

impl DecodedEvent {
    pub fn arg(&self, name: &str) -> Result<&AbiValue, ChainError> {
        self.args
            .get(name)
            .ok_or_else(|| ChainError::Decode(format!("event {} has no arg {}", self.name, name)))
    }
}

/// Errors surfaced by a chain client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// Execution reverted. `name`/`args` are present when the client could
    /// decode the custom error against the contract ABI; `message` always
    /// holds the raw text.
    Revert {
        name: Option<String>,
        args: Vec<AbiValue>,
        message: String,
    },
    /// The wallet refused to sign.
    UserRejected(String),
    /// Not enough native balance to pay for gas.
    InsufficientFunds(String),
    /// No receipt within the wait window. The transaction may still land.
    ReceiptTimeout { tx_hash: TxHash },
    /// Network or RPC transport failure.
    Transport(String),
    /// A value did not have the expected shape.
    Decode(String),
}

impl ChainError {
    /// A revert carrying only raw text.
    pub fn revert_text(message: impl Into<String>) -> Self {
        ChainError::Revert {
            name: None,
            args: Vec::new(),
            message: message.into(),
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        matches!(self, ChainError::UserRejected(_))
    }
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::Revert { message, .. } => write!(f, "execution reverted: {}", message),
            ChainError::UserRejected(msg) => write!(f, "user rejected transaction: {}", msg),
            ChainError::InsufficientFunds(msg) => {
                write!(f, "insufficient funds for gas: {}", msg)
            }
            ChainError::ReceiptTimeout { tx_hash } => {
                write!(f, "timed out waiting for receipt of {}", tx_hash)
            }
            ChainError::Transport(msg) => write!(f, "transport error: {}", msg),
            ChainError::Decode(msg) => write!(f, "decode error: {}", msg),
        }
    }
}

impl std::error::Error for ChainError {}

/// Read/write access to the college contracts.
///
/// Implementations must be usable from several concurrent flows.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Call a view function.
    async fn read(&self, call: &ContractCall) -> Result<AbiValue, ChainError>;

    /// Dry-run a state-changing call as `caller`. Nothing is committed.
    async fn simulate(&self, call: &ContractCall, caller: Address) -> Result<(), ChainError>;

    /// Sign and submit a transaction from `caller`.
    async fn write(&self, call: &ContractCall, caller: Address) -> Result<TxHash, ChainError>;

    /// Wait until `tx_hash` is mined, or fail with [`ChainError::ReceiptTimeout`].
    async fn wait_for_receipt(
        &self,
        tx_hash: &TxHash,
        timeout: Duration,
    ) -> Result<Receipt, ChainError>;

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>, ChainError>;

    /// Decode `log` as `event`. Fails if the log is a different event.
    fn decode_event_log(&self, event: &EventAbi, log: &Log) -> Result<DecodedEvent, ChainError>;
}
