//! Error taxonomy for the storefront flows.
//!
//! Three layers, matching where a failure is detected:
//!
//! - [`ValidationError`]: bad user input, caught before anything is sent
//! - [`RevertReason`]: a contract refused the call (custom error or require string)
//! - [`TxFailure`]: the wallet, node or network refused or lost the transaction
//!
//! Every variant renders as the English message shown to the user.

use std::fmt;

use regex::Regex;

use college_transport::{AbiValue, ChainError};
use college_types::{Address, Amount, CourseId};

/// Input rejected before reaching the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Empty, non-numeric or non-positive amount.
    InvalidAmount,
    /// Amount exceeds what the wallet holds.
    ExceedsBalance { balance: Amount },
    /// Approval smaller than the course price.
    BelowPrice { price: Amount },
    /// Token sale input below the minimum spend.
    BelowMinimum { minimum: String, unit: &'static str },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidAmount => write!(f, "Please enter a valid amount"),
            ValidationError::ExceedsBalance { balance } => write!(
                f,
                "Insufficient wallet balance. Max available: {} YD",
                balance
            ),
            ValidationError::BelowPrice { price } => {
                write!(f, "Approved amount must be at least {} YD", price)
            }
            ValidationError::BelowMinimum { minimum, unit } => {
                write!(f, "Minimum purchase amount is {} {}", minimum, unit)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Why a contract call reverted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertReason {
    UnauthorizedAccess {
        caller: Address,
        owner: Address,
    },
    InvalidCourseId {
        course_id: CourseId,
        max_course_id: CourseId,
    },
    CourseNotActive {
        course_id: CourseId,
        name: String,
    },
    CourseAlreadyPurchased {
        course_id: CourseId,
        buyer: Address,
    },
    TokenTransferFailed {
        from: Address,
        to: Address,
        amount: Amount,
    },
    InvalidPrice {
        price: Amount,
    },
    InvalidName {
        name: String,
    },
    InsufficientAllowance {
        required: Amount,
        actual: Amount,
    },
    InsufficientBalance {
        account: Address,
        required: Amount,
        actual: Amount,
    },
    /// Anything not recognized, with the raw revert text.
    Unknown(String),
}

lazy_static::lazy_static! {
    /// Custom errors as rendered in revert text: the error signature followed
    /// by its values, e.g. `CourseNotActive(uint256 courseId, string name) (7, "Intro")`.
    static ref REVERT_PATTERNS: Vec<(&'static str, Regex)> = [
        (
            "UnauthorizedAccess",
            r"UnauthorizedAccess\(address caller, address owner\)\s*\((0x[a-fA-F0-9]+), (0x[a-fA-F0-9]+)\)",
        ),
        (
            "InvalidCourseId",
            r"InvalidCourseId\(uint256 courseId, uint256 maxCourseId\)\s*\((\d+), (\d+)\)",
        ),
        (
            "CourseNotActive",
            r#"CourseNotActive\(uint256 courseId, string name\)\s*\((\d+), "([^"]*)"\)"#,
        ),
        (
            "CourseAlreadyPurchased",
            r"CourseAlreadyPurchased\(uint256 courseId, address buyer\)\s*\((\d+), (0x[a-fA-F0-9]+)\)",
        ),
        (
            "TokenTransferFailed",
            r"TokenTransferFailed\(address from, address to, uint256 amount\)\s*\((0x[a-fA-F0-9]+), (0x[a-fA-F0-9]+), (\d+)\)",
        ),
        ("InvalidPrice", r"InvalidPrice\(uint256 price\)\s*\((\d+)\)"),
        ("InvalidName", r#"InvalidName\(string name\)\s*\("([^"]*)"\)"#),
        (
            "InsufficientAllowance",
            r"InsufficientAllowance\(uint256 required, uint256 actual\)\s*\((\d+), (\d+)\)",
        ),
        (
            "InsufficientBalance",
            r"InsufficientBalance\(address account, uint256 required, uint256 actual\)\s*\((0x[a-fA-F0-9]+), (\d+), (\d+)\)",
        ),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("invalid revert pattern")))
    .collect();
}

/// One decoded custom-error argument, from either source.
enum Arg<'a> {
    Abi(&'a AbiValue),
    Text(&'a str),
}

impl Arg<'_> {
    fn uint(&self) -> Option<Amount> {
        match self {
            Arg::Abi(v) => v.as_uint().ok(),
            Arg::Text(s) => s.parse().ok(),
        }
    }

    fn id(&self) -> Option<CourseId> {
        self.uint().and_then(|n| CourseId::try_from(n).ok())
    }

    fn address(&self) -> Option<Address> {
        match self {
            Arg::Abi(v) => v.as_address().ok(),
            Arg::Text(s) => Address::parse(s).ok(),
        }
    }

    fn string(&self) -> Option<String> {
        match self {
            Arg::Abi(v) => v.as_str().ok().map(str::to_string),
            Arg::Text(s) => Some(s.to_string()),
        }
    }
}

fn build(name: &str, args: &[Arg<'_>]) -> Option<RevertReason> {
    let arg = |i: usize| args.get(i);
    Some(match name {
        "UnauthorizedAccess" => RevertReason::UnauthorizedAccess {
            caller: arg(0)?.address()?,
            owner: arg(1)?.address()?,
        },
        "InvalidCourseId" => RevertReason::InvalidCourseId {
            course_id: arg(0)?.id()?,
            max_course_id: arg(1)?.id()?,
        },
        "CourseNotActive" => RevertReason::CourseNotActive {
            course_id: arg(0)?.id()?,
            name: arg(1)?.string()?,
        },
        "CourseAlreadyPurchased" => RevertReason::CourseAlreadyPurchased {
            course_id: arg(0)?.id()?,
            buyer: arg(1)?.address()?,
        },
        "TokenTransferFailed" => RevertReason::TokenTransferFailed {
            from: arg(0)?.address()?,
            to: arg(1)?.address()?,
            amount: arg(2)?.uint()?,
        },
        "InvalidPrice" => RevertReason::InvalidPrice {
            price: arg(0)?.uint()?,
        },
        "InvalidName" => RevertReason::InvalidName {
            name: arg(0)?.string()?,
        },
        "InsufficientAllowance" => RevertReason::InsufficientAllowance {
            required: arg(0)?.uint()?,
            actual: arg(1)?.uint()?,
        },
        "InsufficientBalance" => RevertReason::InsufficientBalance {
            account: arg(0)?.address()?,
            required: arg(1)?.uint()?,
            actual: arg(2)?.uint()?,
        },
        _ => return None,
    })
}

impl RevertReason {
    /// Decode a revert from its structured form (error name plus ABI values).
    pub fn from_structured(name: &str, args: &[AbiValue]) -> Option<Self> {
        let args: Vec<Arg<'_>> = args.iter().map(Arg::Abi).collect();
        build(name, &args)
    }

    /// Decode a revert from raw text. Unrecognized text becomes [`RevertReason::Unknown`].
    pub fn from_text(message: &str) -> Self {
        for (name, re) in REVERT_PATTERNS.iter() {
            if let Some(caps) = re.captures(message) {
                let args: Vec<Arg<'_>> = caps
                    .iter()
                    .skip(1)
                    .flatten()
                    .map(|m| Arg::Text(m.as_str()))
                    .collect();
                if let Some(reason) = build(name, &args) {
                    return reason;
                }
            }
        }
        RevertReason::Unknown(message.to_string())
    }

    /// Decode the revert carried by `err`, preferring the structured payload.
    ///
    /// Returns `None` when `err` is not a revert.
    pub fn from_chain_error(err: &ChainError) -> Option<Self> {
        match err {
            ChainError::Revert {
                name: Some(name),
                args,
                message,
            } => Some(
                Self::from_structured(name, args).unwrap_or_else(|| Self::from_text(message)),
            ),
            ChainError::Revert { message, .. } => Some(Self::from_text(message)),
            _ => None,
        }
    }

    /// Error name as declared in the contract.
    pub fn name(&self) -> &str {
        match self {
            RevertReason::UnauthorizedAccess { .. } => "UnauthorizedAccess",
            RevertReason::InvalidCourseId { .. } => "InvalidCourseId",
            RevertReason::CourseNotActive { .. } => "CourseNotActive",
            RevertReason::CourseAlreadyPurchased { .. } => "CourseAlreadyPurchased",
            RevertReason::TokenTransferFailed { .. } => "TokenTransferFailed",
            RevertReason::InvalidPrice { .. } => "InvalidPrice",
            RevertReason::InvalidName { .. } => "InvalidName",
            RevertReason::InsufficientAllowance { .. } => "InsufficientAllowance",
            RevertReason::InsufficientBalance { .. } => "InsufficientBalance",
            RevertReason::Unknown(_) => "Unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, RevertReason::Unknown(_))
    }
}

impl fmt::Display for RevertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevertReason::UnauthorizedAccess { caller, owner } => write!(
                f,
                "Address {} is not authorized. Only the contract owner ({}) can perform this action",
                caller, owner
            ),
            RevertReason::InvalidCourseId {
                course_id,
                max_course_id,
            } => write!(f, "Invalid course ID {} (max: {})", course_id, max_course_id),
            RevertReason::CourseNotActive { course_id, name } => {
                write!(f, "Course #{} ({}) is not currently active", course_id, name)
            }
            RevertReason::CourseAlreadyPurchased { course_id, .. } => {
                write!(f, "You have already purchased course #{}", course_id)
            }
            RevertReason::TokenTransferFailed { amount, .. } => {
                write!(f, "Token transfer failed. Amount: {} YD", amount)
            }
            RevertReason::InvalidPrice { price } => {
                write!(f, "Invalid price ({}). Price must be greater than 0", price)
            }
            RevertReason::InvalidName { .. } => {
                write!(f, "Invalid course name. Name cannot be empty")
            }
            RevertReason::InsufficientAllowance { required, actual } => write!(
                f,
                "Insufficient allowance. Required: {} YD, Current: {} YD",
                required, actual
            ),
            RevertReason::InsufficientBalance {
                required, actual, ..
            } => write!(
                f,
                "Insufficient balance. Required: {} YD, Current: {} YD",
                required, actual
            ),
            RevertReason::Unknown(raw) => write!(f, "Transaction failed: {}", raw),
        }
    }
}

/// Why a transaction did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxFailure {
    UserRejected,
    InsufficientGas,
    NetworkDisconnected,
    NonceTooLow,
    Reverted(RevertReason),
    Other(String),
}

impl TxFailure {
    /// Classify a client error. Wallet and node failures are also recognized
    /// from their message text, since many wallets only report strings.
    pub fn from_chain_error(err: &ChainError) -> Self {
        if let Some(reason) = RevertReason::from_chain_error(err) {
            return TxFailure::Reverted(reason);
        }
        match err {
            ChainError::UserRejected(_) => return TxFailure::UserRejected,
            ChainError::InsufficientFunds(_) => return TxFailure::InsufficientGas,
            _ => {}
        }
        let text = err.to_string();
        let lower = text.to_ascii_lowercase();
        if lower.contains("user rejected transaction") {
            TxFailure::UserRejected
        } else if lower.contains("insufficient funds for gas") {
            TxFailure::InsufficientGas
        } else if lower.contains("network disconnected") {
            TxFailure::NetworkDisconnected
        } else if lower.contains("nonce too low") {
            TxFailure::NonceTooLow
        } else {
            TxFailure::Other(text)
        }
    }
}

impl fmt::Display for TxFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxFailure::UserRejected => write!(f, "Transaction was rejected by user"),
            TxFailure::InsufficientGas => {
                write!(f, "Insufficient ETH balance to pay for gas")
            }
            TxFailure::NetworkDisconnected => {
                write!(f, "Network disconnected. Please check your connection")
            }
            TxFailure::NonceTooLow => {
                write!(f, "Invalid transaction nonce. Please refresh and try again")
            }
            TxFailure::Reverted(reason) => write!(f, "{}", reason),
            TxFailure::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for TxFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEM_STYLE: &str = "The contract function \"purchaseCourse\" reverted.\n\n\
        Error: CourseNotActive(uint256 courseId, string name)\n                       (7, \"Intro\")";

    #[test]
    fn test_course_not_active_from_text() {
        let reason = RevertReason::from_text(VIEM_STYLE);
        assert_eq!(
            reason,
            RevertReason::CourseNotActive {
                course_id: 7,
                name: "Intro".into()
            }
        );
        let msg = reason.to_string();
        assert!(msg.contains('7'));
        assert!(msg.contains("Intro"));
    }

    #[test]
    fn test_structured_wins_over_text() {
        let err = ChainError::Revert {
            name: Some("InsufficientAllowance".into()),
            args: vec![AbiValue::Uint(99), AbiValue::Uint(10)],
            message: "garbled".into(),
        };
        assert_eq!(
            RevertReason::from_chain_error(&err),
            Some(RevertReason::InsufficientAllowance {
                required: 99,
                actual: 10
            })
        );
    }

    #[test]
    fn test_structured_with_bad_args_falls_back_to_text() {
        let err = ChainError::Revert {
            name: Some("InvalidCourseId".into()),
            args: vec![],
            message: "InvalidCourseId(uint256 courseId, uint256 maxCourseId) (9, 4)".into(),
        };
        let reason = RevertReason::from_chain_error(&err).unwrap();
        assert_eq!(reason.to_string(), "Invalid course ID 9 (max: 4)");
    }

    #[test]
    fn test_text_addresses_and_amounts() {
        let text = "InsufficientBalance(address account, uint256 required, uint256 actual) \
                    (0x00000000000000000000000000000000000000aa, 99, 5)";
        match RevertReason::from_text(text) {
            RevertReason::InsufficientBalance {
                account,
                required,
                actual,
            } => {
                assert_eq!(account, Address::from_low_u8(0xaa));
                assert_eq!((required, actual), (99, 5));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_keeps_raw_text() {
        let reason = RevertReason::from_text("execution reverted: something odd");
        assert!(!reason.is_known());
        assert_eq!(
            reason.to_string(),
            "Transaction failed: execution reverted: something odd"
        );
    }

    #[test]
    fn test_non_revert_is_not_a_reason() {
        assert!(RevertReason::from_chain_error(&ChainError::Transport("x".into())).is_none());
    }

    #[test]
    fn test_tx_failure_classification() {
        assert_eq!(
            TxFailure::from_chain_error(&ChainError::UserRejected("denied".into())),
            TxFailure::UserRejected
        );
        assert_eq!(
            TxFailure::from_chain_error(&ChainError::InsufficientFunds("x".into())),
            TxFailure::InsufficientGas
        );
        assert_eq!(
            TxFailure::from_chain_error(&ChainError::Transport("nonce too low".into())),
            TxFailure::NonceTooLow
        );
        assert_eq!(
            TxFailure::from_chain_error(&ChainError::Transport("network disconnected".into())),
            TxFailure::NetworkDisconnected
        );
        assert!(matches!(
            TxFailure::from_chain_error(&ChainError::Transport("boom".into())),
            TxFailure::Other(_)
        ));
        assert_eq!(
            TxFailure::UserRejected.to_string(),
            "Transaction was rejected by user"
        );
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            ValidationError::ExceedsBalance { balance: 500 }.to_string(),
            "Insufficient wallet balance. Max available: 500 YD"
        );
        assert_eq!(
            ValidationError::BelowPrice { price: 99 }.to_string(),
            "Approved amount must be at least 99 YD"
        );
    }
}
