//! Content-addressed metadata access.
//!
//! Token URIs point at `ipfs://<cid>` documents. Browsers and HTTP clients
//! cannot dereference that scheme, so URIs are rewritten onto an HTTP
//! gateway before fetching.

use std::time::Duration;

use anyhow::{anyhow, Result};
use college_types::NftMetadata;

pub const DEFAULT_IPFS_GATEWAY: &str = "https://ipfs.filebase.io/ipfs/";
const IPFS_SCHEME: &str = "ipfs://";

/// Rewrite `uri` onto `gateway`. Non-IPFS URIs are returned unchanged and an
/// empty URI stays empty.
pub fn ipfs_to_http(uri: &str, gateway: &str) -> String {
    if uri.is_empty() {
        return String::new();
    }
    match uri.strip_prefix(IPFS_SCHEME) {
        Some(cid) => format!("{}{}", gateway, cid),
        None => uri.to_string(),
    }
}

/// Blocking HTTP client for certificate metadata.
pub struct MetadataGateway {
    base: String,
    agent: ureq::Agent,
}

impl MetadataGateway {
    /// Gateway from `COLLEGE_IPFS_GATEWAY`, defaulting to Filebase.
    pub fn from_env() -> Self {
        let base = college_types::env_string_or("COLLEGE_IPFS_GATEWAY", DEFAULT_IPFS_GATEWAY);
        let timeout = college_types::env_duration_secs_or(
            "COLLEGE_GATEWAY_TIMEOUT_SECS",
            Duration::from_secs(30),
        );
        Self::with_timeout(&base, timeout)
    }

    pub fn with_timeout(base: &str, timeout: Duration) -> Self {
        let base = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{}/", base)
        };
        Self {
            base,
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn to_http(&self, uri: &str) -> String {
        ipfs_to_http(uri, &self.base)
    }

    /// Fetch and parse the metadata document behind `token_uri`.
    pub fn fetch_metadata(&self, token_uri: &str) -> Result<NftMetadata> {
        let url = self.to_http(token_uri);
        if url.is_empty() {
            return Err(anyhow!("empty token URI"));
        }
        tracing::debug!(%url, "fetching certificate metadata");
        self.agent
            .get(&url)
            .call()
            .map_err(|e| anyhow!("Failed to fetch metadata from {}: {}", url, e))?
            .into_json::<NftMetadata>()
            .map_err(|e| anyhow!("Failed to parse metadata from {}: {}", url, e))
    }
}

impl Default for MetadataGateway {
    fn default() -> Self {
        Self::from_env()
    }
}
