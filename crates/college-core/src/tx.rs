//! Submitting transactions and waiting for their receipts.

use std::time::Duration;

use college_transport::{ChainClient, ChainError, Receipt, TxHash};

pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(60);

pub const RECEIPT_TIMEOUT_WARNING: &str =
    "Transaction taking longer than expected. Please check your wallet.";

/// Result of waiting on a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed(Receipt),
    /// Still unconfirmed when the wait window closed.
    Pending(TxHash),
}

/// Receipt wait timeout from `COLLEGE_RECEIPT_TIMEOUT_SECS`, default 60s.
pub fn receipt_timeout_from_env() -> Duration {
    college_types::env_duration_secs_or("COLLEGE_RECEIPT_TIMEOUT_SECS", DEFAULT_RECEIPT_TIMEOUT)
}

/// Wait up to `timeout` for `tx_hash` to be mined.
///
/// A timeout is not an error: the transaction may still land. A mined but
/// reverted transaction is.
pub async fn confirm(
    client: &dyn ChainClient,
    tx_hash: &TxHash,
    timeout: Duration,
) -> Result<Confirmation, ChainError> {
    let waited = tokio::time::timeout(timeout, client.wait_for_receipt(tx_hash, timeout)).await;
    match waited {
        Err(_) | Ok(Err(ChainError::ReceiptTimeout { .. })) => {
            tracing::warn!(tx = %tx_hash, timeout_secs = timeout.as_secs(), "receipt wait timed out");
            Ok(Confirmation::Pending(tx_hash.clone()))
        }
        Ok(Err(e)) => Err(e),
        Ok(Ok(receipt)) if receipt.is_success() => {
            tracing::debug!(tx = %tx_hash, block = receipt.block_number, "transaction confirmed");
            Ok(Confirmation::Confirmed(receipt))
        }
        Ok(Ok(_)) => Err(ChainError::revert_text(format!(
            "transaction {} reverted on chain",
            tx_hash
        ))),
    }
}
