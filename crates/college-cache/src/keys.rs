//! Canonical cache keys.
//!
//! A key is the read name followed by its arguments, joined with `-`, so
//! two reads with different arguments never share an entry.

use college_types::{Address, CourseId};

pub fn has_claimed_nft(owner: &Address, course_id: CourseId) -> String {
    format!("hasClaimedNFT-{}-{}", owner, course_id)
}

pub fn is_paused() -> String {
    "isPaused".to_string()
}

pub fn user_nfts(owner: &Address) -> String {
    format!("getUserNFTs-{}", owner)
}

pub fn total_supply() -> String {
    "getTotalSupply".to_string()
}

pub fn course_cid(course_id: CourseId) -> String {
    format!("getCourseCID-{}", course_id)
}

pub fn course_nft_info(course_id: CourseId) -> String {
    format!("getCourseNFTInfo-{}", course_id)
}

pub fn course_nft_count(course_id: CourseId) -> String {
    format!("getCourseNFTCount-{}", course_id)
}

/// Prefixes covering every cached fact about `owner`.
pub fn wallet_prefixes(owner: &Address) -> Vec<String> {
    vec![format!("hasClaimedNFT-{}-", owner), user_nfts(owner)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_include_arguments() {
        let a = Address::from_low_u8(1);
        let b = Address::from_low_u8(2);
        assert_ne!(has_claimed_nft(&a, 1), has_claimed_nft(&b, 1));
        assert_ne!(has_claimed_nft(&a, 1), has_claimed_nft(&a, 2));
        assert_ne!(course_cid(1), course_nft_info(1));
        assert_eq!(course_nft_count(3), "getCourseNFTCount-3");
    }

    #[test]
    fn test_wallet_prefixes_cover_wallet_keys() {
        let a = Address::from_low_u8(1);
        let prefixes = wallet_prefixes(&a);
        for key in [has_claimed_nft(&a, 4), user_nfts(&a)] {
            assert!(prefixes.iter().any(|p| key.starts_with(p.as_str())));
        }
        assert!(!prefixes.iter().any(|p| total_supply().starts_with(p.as_str())));
    }
}
