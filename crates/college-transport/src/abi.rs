//! Decoded contract values.
//!
//! The chain client owns ABI encoding. Everything above it speaks in
//! [`AbiValue`], a small tree that covers the types the college contracts
//! use: `bool`, `uint256` (as `u128`), `address`, `string`, dynamic arrays
//! and tuples/structs.

use std::fmt;

use serde::{Deserialize, Serialize};

use college_types::{Address, Amount};

use crate::client::ChainError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbiValue {
    Bool(bool),
    Uint(Amount),
    Address(Address),
    String(String),
    Array(Vec<AbiValue>),
    Tuple(Vec<AbiValue>),
}

impl AbiValue {
    fn kind(&self) -> &'static str {
        match self {
            AbiValue::Bool(_) => "bool",
            AbiValue::Uint(_) => "uint256",
            AbiValue::Address(_) => "address",
            AbiValue::String(_) => "string",
            AbiValue::Array(_) => "array",
            AbiValue::Tuple(_) => "tuple",
        }
    }

    fn mismatch(&self, expected: &str) -> ChainError {
        ChainError::Decode(format!("expected {}, got {}", expected, self.kind()))
    }

    pub fn as_bool(&self) -> Result<bool, ChainError> {
        match self {
            AbiValue::Bool(b) => Ok(*b),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn as_uint(&self) -> Result<Amount, ChainError> {
        match self {
            AbiValue::Uint(n) => Ok(*n),
            other => Err(other.mismatch("uint256")),
        }
    }

    /// Read a uint that must fit in 64 bits (ids, timestamps).
    pub fn as_u64(&self) -> Result<u64, ChainError> {
        let n = self.as_uint()?;
        u64::try_from(n).map_err(|_| ChainError::Decode(format!("uint {} does not fit in u64", n)))
    }

    pub fn as_address(&self) -> Result<Address, ChainError> {
        match self {
            AbiValue::Address(a) => Ok(*a),
            other => Err(other.mismatch("address")),
        }
    }

    pub fn as_str(&self) -> Result<&str, ChainError> {
        match self {
            AbiValue::String(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn as_array(&self) -> Result<&[AbiValue], ChainError> {
        match self {
            AbiValue::Array(items) => Ok(items),
            other => Err(other.mismatch("array")),
        }
    }

    /// Fields of a tuple, checked for an exact arity.
    pub fn as_tuple(&self, arity: usize) -> Result<&[AbiValue], ChainError> {
        match self {
            AbiValue::Tuple(fields) if fields.len() == arity => Ok(fields),
            AbiValue::Tuple(fields) => Err(ChainError::Decode(format!(
                "expected tuple of {}, got {} fields",
                arity,
                fields.len()
            ))),
            other => Err(other.mismatch("tuple")),
        }
    }
}

impl fmt::Display for AbiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiValue::Bool(b) => write!(f, "{}", b),
            AbiValue::Uint(n) => write!(f, "{}", n),
            AbiValue::Address(a) => write!(f, "{}", a),
            AbiValue::String(s) => write!(f, "\"{}\"", s),
            AbiValue::Array(items) | AbiValue::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<bool> for AbiValue {
    fn from(b: bool) -> Self {
        AbiValue::Bool(b)
    }
}

impl From<u64> for AbiValue {
    fn from(n: u64) -> Self {
        AbiValue::Uint(n as Amount)
    }
}

impl From<u128> for AbiValue {
    fn from(n: u128) -> Self {
        AbiValue::Uint(n)
    }
}

impl From<Address> for AbiValue {
    fn from(a: Address) -> Self {
        AbiValue::Address(a)
    }
}

impl From<&str> for AbiValue {
    fn from(s: &str) -> Self {
        AbiValue::String(s.to_string())
    }
}

impl From<String> for AbiValue {
    fn from(s: String) -> Self {
        AbiValue::String(s)
    }
}
