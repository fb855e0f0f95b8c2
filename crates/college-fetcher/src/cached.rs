//! Cache-then-retry reads.

use std::future::Future;

use college_cache::ReadThroughCache;
use college_types::{Amount, CourseNftInfo, NftRecord};

use crate::retry::{with_retry, RetryPolicy};

/// Any value a cached read can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue {
    Flag(bool),
    Amount(Amount),
    Text(String),
    Nfts(Vec<NftRecord>),
    NftInfo(CourseNftInfo),
}

pub type ReadCache = ReadThroughCache<CachedValue>;

macro_rules! cached_variant {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for CachedValue {
            fn from(v: $ty) -> Self {
                CachedValue::$variant(v)
            }
        }

        impl TryFrom<CachedValue> for $ty {
            type Error = CachedValue;

            fn try_from(v: CachedValue) -> Result<Self, Self::Error> {
                match v {
                    CachedValue::$variant(inner) => Ok(inner),
                    other => Err(other),
                }
            }
        }
    };
}

cached_variant!(bool, Flag);
cached_variant!(Amount, Amount);
cached_variant!(String, Text);
cached_variant!(Vec<NftRecord>, Nfts);
cached_variant!(CourseNftInfo, NftInfo);

/// Return the cached value for `key`, or run `op` under retry and cache
/// its result.
///
/// A hit skips the network entirely. Failures are not cached, so the next
/// call tries again.
pub async fn cached_read<T, F, Fut>(
    cache: &ReadCache,
    policy: &RetryPolicy,
    key: &str,
    op: F,
) -> anyhow::Result<T>
where
    T: Clone + Into<CachedValue> + TryFrom<CachedValue>,
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    if let Some(hit) = cache.get(key) {
        match T::try_from(hit) {
            Ok(value) => return Ok(value),
            Err(_) => tracing::warn!(key, "cached value has unexpected type, refetching"),
        }
    }

    let value = with_retry(policy, key, op).await?;
    cache.set(key, value.clone().into());
    Ok(value)
}
