//! RPC endpoint selection.

use std::fmt;

const MAINNET_RPC: &str = "https://eth.llamarpc.com";
const SEPOLIA_RPC_BASE: &str = "https://sepolia.infura.io/v3/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Sepolia,
}

impl Network {
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Mainnet => 1,
            Network::Sepolia => 11_155_111,
        }
    }

    pub fn from_chain_id(id: u64) -> Option<Self> {
        match id {
            1 => Some(Network::Mainnet),
            11_155_111 => Some(Network::Sepolia),
            _ => None,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Sepolia => write!(f, "sepolia"),
        }
    }
}

pub fn infer_network_from_url(url: &str) -> Option<Network> {
    let lower = url.to_lowercase();
    if lower.contains("sepolia") {
        Some(Network::Sepolia)
    } else if lower.contains("mainnet") || lower.contains("eth.llamarpc") {
        Some(Network::Mainnet)
    } else {
        None
    }
}

/// Default endpoint for a network. Sepolia needs an API key appended.
pub fn default_rpc_endpoint(network: Network, api_key: &str) -> String {
    match network {
        Network::Mainnet => MAINNET_RPC.to_string(),
        Network::Sepolia => format!("{}{}", SEPOLIA_RPC_BASE, api_key),
    }
}

/// Resolve the RPC endpoint.
///
/// `COLLEGE_RPC_URL` wins when set; otherwise Sepolia with
/// `COLLEGE_RPC_API_KEY` (possibly empty).
pub fn resolve_rpc_endpoint() -> String {
    if let Ok(value) = std::env::var("COLLEGE_RPC_URL") {
        if !value.trim().is_empty() {
            return value;
        }
    }
    let api_key = std::env::var("COLLEGE_RPC_API_KEY").unwrap_or_default();
    default_rpc_endpoint(Network::Sepolia, &api_key)
}
