//! Completion certificate (NFT) records.

use serde::{Deserialize, Serialize};

use crate::{Amount, CourseId};

/// A certificate owned by a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftRecord {
    /// Assigned by the mint contract, unique and immutable.
    pub token_id: u64,
    /// Course this certificate attests completion of.
    pub course_id: CourseId,
    /// Pointer to off-chain metadata. Usually `ipfs://<cid>`.
    #[serde(rename = "tokenURI")]
    pub token_uri: String,
}

/// Result of `getCourseNFTInfo(courseId)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseNftInfo {
    pub cid: String,
    pub total_minted: Amount,
    pub exists: bool,
}

/// Off-chain metadata document referenced by a token URI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub attributes: Vec<NftAttribute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftAttribute {
    pub trait_type: String,
    pub value: String,
}

/// Human label for a certificate count: "1 NFT", "3 NFTs".
pub fn format_nft_count(count: usize) -> String {
    if count == 1 {
        "1 NFT".to_string()
    } else {
        format!("{count} NFTs")
    }
}
