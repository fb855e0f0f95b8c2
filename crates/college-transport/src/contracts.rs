//! Deployed contract addresses and function names.
//!
//! Configuration via environment variables:
//!
//! - `COLLEGE_TOKEN_ADDRESS` - YD token (ERC-20 with `buyTokens`)
//! - `COLLEGE_COURSE_ADDRESS` - course registry
//! - `COLLEGE_NFT_ADDRESS` - completion certificate minter
//!
//! Unset variables fall back to the Sepolia deployment.

use anyhow::{Context, Result};
use college_types::Address;

pub const DEFAULT_TOKEN_ADDRESS: &str = "0x8FeC745D6fa25355642BC22716fC37EDcC4a85d5";
pub const DEFAULT_COURSE_ADDRESS: &str = "0xFE2EF4fEb0AD28c0550B710E7bc34D623c217cD1";
pub const DEFAULT_NFT_ADDRESS: &str = "0x6a976939a0a034EFdF58797168DA9A08e0BcE07C";

/// YD token functions.
pub mod token_fn {
    pub const BALANCE_OF: &str = "balanceOf";
    pub const ALLOWANCE: &str = "allowance";
    pub const APPROVE: &str = "approve";
    pub const DECIMALS: &str = "decimals";
    pub const SYMBOL: &str = "symbol";
    pub const BUY_TOKENS: &str = "buyTokens";
}

/// Course registry functions.
pub mod course_fn {
    pub const COURSE_COUNT: &str = "courseCount";
    pub const GET_COURSE: &str = "getCourse";
    pub const GET_USER_PURCHASES: &str = "getUserPurchases";
    pub const PURCHASE_COURSE: &str = "purchaseCourse";
}

/// Certificate contract functions.
pub mod nft_fn {
    pub const HAS_CLAIMED_NFT: &str = "hasClaimedNFT";
    pub const PAUSED: &str = "paused";
    pub const GET_TOKENS_BY_OWNER: &str = "getTokensByOwner";
    pub const TOKEN_URI: &str = "tokenURI";
    pub const TOKEN_COURSES: &str = "tokenCourses";
    pub const TOTAL_SUPPLY: &str = "totalSupply";
    pub const COURSE_CIDS: &str = "courseCIDs";
    pub const GET_COURSE_NFT_INFO: &str = "getCourseNFTInfo";
    pub const COURSE_NFT_COUNT: &str = "courseNFTCount";
    pub const MINT_NFT: &str = "mintNFT";
}

/// Addresses of the three contracts the storefront talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractSet {
    pub token: Address,
    pub course: Address,
    pub nft: Address,
}

impl ContractSet {
    pub fn new(token: Address, course: Address, nft: Address) -> Self {
        Self { token, course, nft }
    }

    /// The Sepolia deployment.
    pub fn sepolia() -> Self {
        Self::from_strs(DEFAULT_TOKEN_ADDRESS, DEFAULT_COURSE_ADDRESS, DEFAULT_NFT_ADDRESS)
            .unwrap_or(Self::new(Address::ZERO, Address::ZERO, Address::ZERO))
    }

    fn from_strs(token: &str, course: &str, nft: &str) -> Result<Self> {
        Ok(Self {
            token: Address::parse(token).context("token contract address")?,
            course: Address::parse(course).context("course contract address")?,
            nft: Address::parse(nft).context("nft contract address")?,
        })
    }

    /// Read overrides from the environment. A malformed override is an error,
    /// not a silent fallback.
    pub fn from_env() -> Result<Self> {
        let token = college_types::env_string_or("COLLEGE_TOKEN_ADDRESS", DEFAULT_TOKEN_ADDRESS);
        let course = college_types::env_string_or("COLLEGE_COURSE_ADDRESS", DEFAULT_COURSE_ADDRESS);
        let nft = college_types::env_string_or("COLLEGE_NFT_ADDRESS", DEFAULT_NFT_ADDRESS);
        Self::from_strs(&token, &course, &nft)
    }
}

impl Default for ContractSet {
    fn default() -> Self {
        Self::sepolia()
    }
}
