//! Contract reads for the college storefront.
//!
//! This crate provides:
//! - [`with_retry`]: exponential-backoff retry for any fallible async operation
//! - [`cached_read`]: cache-then-retry reads over a [`ReadCache`]
//! - [`TokenReader`], [`CourseReader`]: live (uncached) token and registry reads
//! - [`NftReader`]: certificate reads served through the cache
//!
//! # Example
//!
//! ```ignore
//! use college_fetcher::{NftReader, ReadCache, RetryPolicy};
//!
//! let nfts = NftReader::new(client, contracts, Arc::new(ReadCache::new()), RetryPolicy::from_env());
//! let claimed = nfts.has_claimed(Some(wallet), course_id).await?;
//! ```

pub mod cached;
pub mod course;
pub mod nft;
pub mod retry;
pub mod token;

pub use cached::{cached_read, CachedValue, ReadCache};
pub use course::CourseReader;
pub use nft::{NftReader, WALLET_NOT_CONNECTED};
pub use retry::{is_transient_error, with_retry, ErrorClassification, RetryPolicy};
pub use token::{format_balance, TokenReader, DEFAULT_DECIMALS, DEFAULT_SYMBOL};
