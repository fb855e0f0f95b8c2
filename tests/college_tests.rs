//! End-to-end tests through the `College` facade.

mod common;

use std::time::Duration;

use college_core::{MintState, NoticeLevel, PurchaseState};
use college_transport::{nft_fn, CallKind};
use college_types::Address;
use web3_college::{CollegeConfig, Interest, Outcome};

const STUDENT: Address = Address::from_low_u8(0x51);

#[tokio::test]
async fn test_student_journey() {
    let t = common::college();
    let course = t.chain.add_course("Solidity Basics", 99, true);

    // Buy tokens, purchase the course, watch it, claim the certificate.
    let bought = t
        .college
        .token_sale()
        .buy(STUDENT, "0.5", &Interest::detached())
        .await
        .unwrap();
    assert_eq!(bought, Outcome::Completed);
    assert_eq!(t.chain.balance_of(STUDENT), 500);

    let run = t
        .college
        .purchase_course(STUDENT, course, Some(99), &Interest::detached())
        .await
        .unwrap();
    assert_eq!(run.state(), PurchaseState::Purchased);
    assert!(run.trail.contains(&PurchaseState::Approved));

    let progress = t.college.progress();
    progress.record_playback(course, 300.0, 600.0);
    assert_eq!(progress.progress(course), 50);
    progress.mark_complete(course);

    let claim = t
        .college
        .claim_certificate(Some(STUDENT), course, &Interest::detached())
        .await;
    assert_eq!(claim.state(), MintState::Minted);

    let dashboard = t.college.dashboard(STUDENT).await.unwrap();
    assert_eq!(dashboard.balance, 401);
    assert_eq!(dashboard.symbol, "YD");
    assert_eq!(dashboard.stats.total_courses, 1);
    assert_eq!(dashboard.stats.purchased_courses, 1);
    assert_eq!(dashboard.nfts.label(), "1 NFT");
    assert_eq!(
        dashboard.nfts.for_course(course).map(|n| n.token_uri.as_str()),
        Some("ipfs://course-1")
    );
    assert_eq!(
        t.college
            .gateway()
            .to_http(&dashboard.nfts.nfts[0].token_uri),
        "https://ipfs.filebase.io/ipfs/course-1"
    );
}

#[tokio::test]
async fn test_second_purchase_uses_loaded_history() {
    let t = common::college();
    t.chain.fund(STUDENT, 500);
    let course = t.chain.add_course("Intro", 99, true);

    t.college
        .purchase_course(STUDENT, course, Some(99), &Interest::detached())
        .await
        .unwrap();
    t.chain.reset_call_log();

    let again = t
        .college
        .purchase_course(STUDENT, course, Some(99), &Interest::detached())
        .await
        .unwrap();
    assert_eq!(again.state(), PurchaseState::AlreadyOwned);
    assert_eq!(t.chain.total_calls(CallKind::Write), 0);
    assert_eq!(t.chain.total_calls(CallKind::Simulate), 0);
}

#[tokio::test]
async fn test_unknown_course_is_error() {
    let t = common::college();
    t.chain.fund(STUDENT, 500);

    let err = t
        .college
        .purchase_course(STUDENT, 42, Some(99), &Interest::detached())
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("failed to load course 42"));
    assert_eq!(t.chain.total_calls(CallKind::Write), 0);
}

#[tokio::test]
async fn test_claim_reads_share_the_cache() {
    let t = common::college();
    let nfts = t.college.nfts();

    assert!(!nfts.has_claimed(Some(STUDENT), 1).await.unwrap());
    assert!(!nfts.has_claimed(Some(STUDENT), 1).await.unwrap());
    assert_eq!(t.chain.call_count(CallKind::Read, nft_fn::HAS_CLAIMED_NFT), 1);

    let metrics = t.college.cache_metrics();
    assert_eq!(metrics.hits, 1);
    assert_eq!(metrics.misses, 1);

    // A different course is a different key.
    assert!(!nfts.has_claimed(Some(STUDENT), 2).await.unwrap());
    assert_eq!(t.chain.call_count(CallKind::Read, nft_fn::HAS_CLAIMED_NFT), 2);
}

#[tokio::test]
async fn test_zero_ttl_disables_memoization() {
    let t = common::college_with(CollegeConfig::default().with_cache_ttl(Duration::ZERO));

    t.college.nfts().is_paused().await.unwrap();
    t.college.nfts().is_paused().await.unwrap();
    assert_eq!(t.chain.call_count(CallKind::Read, nft_fn::PAUSED), 2);
}

#[tokio::test]
async fn test_claim_without_progress_is_blocked() {
    let t = common::college();
    let course = t.chain.add_course("Intro", 99, true);

    let run = t
        .college
        .claim_certificate(Some(STUDENT), course, &Interest::detached())
        .await;
    assert_eq!(run.state(), MintState::Error);
    assert_eq!(
        t.notifier.messages(NoticeLevel::Error),
        vec!["Please complete the video first"]
    );
}

#[tokio::test]
async fn test_progress_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let course;
    {
        let t = common::college_with(CollegeConfig::default().with_storage_dir(dir.path()));
        course = t.chain.add_course("Intro", 99, true);
        t.college.progress().record_playback(course, 80.0, 100.0);
    }

    let t = common::college_with(CollegeConfig::default().with_storage_dir(dir.path()));
    assert_eq!(t.college.progress().progress(course), 80);
    assert_eq!(t.college.progress().position(course), 80.0);
}
