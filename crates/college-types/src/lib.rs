//! Shared types for the web3-college workspace.
//!
//! This crate provides foundational types used across the other crates in
//! the workspace, so the transport, cache, fetcher and core crates agree on
//! one vocabulary:
//!
//! - [`Address`] - 20-byte wallet/contract address
//! - [`Course`], [`Purchase`], [`PurchaseWithCourse`] - course registry records
//! - [`NftRecord`], [`CourseNftInfo`], [`NftMetadata`] - certificate records
//! - [`Amount`] and decimal conversion in [`units`]
//! - [`RetryConfig`] - retry settings shared by every remote read

pub mod address;
pub mod course;
pub mod env_utils;
pub mod nft;
pub mod units;

pub use address::Address;
pub use course::{has_purchased, Course, CourseId, CourseStats, Purchase, PurchaseWithCourse};
pub use env_utils::{
    env_bool, env_duration_ms_or, env_duration_secs_or, env_string_or, env_var, env_var_or,
};
pub use nft::{format_nft_count, CourseNftInfo, NftAttribute, NftMetadata, NftRecord};
pub use units::{format_units, parse_units, Amount, ETH_DECIMALS};

use std::time::Duration;

/// Configuration for retry behavior on remote reads.
///
/// The delay before retry `n` (counting from 1) is `base_delay * 2^n`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: usize,
    /// Base of the exponential backoff.
    pub base_delay: Duration,
}

impl RetryConfig {
    pub fn new(max_attempts: usize, base_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(base_delay_ms),
        }
    }

    /// Read `COLLEGE_RETRY_ATTEMPTS` and `COLLEGE_RETRY_BASE_MS`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: env_var_or("COLLEGE_RETRY_ATTEMPTS", defaults.max_attempts),
            base_delay: env_duration_ms_or("COLLEGE_RETRY_BASE_MS", defaults.base_delay),
        }
    }

    /// Delay before the retry that follows failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}
