//! Test setup helpers for common initialization patterns.

use std::sync::Arc;
use std::time::Duration;

use college_transport::{ContractSet, MockChain};
use web3_college::{College, CollegeConfig, RecordingNotifier};

pub struct TestCollege {
    pub chain: Arc<MockChain>,
    pub notifier: Arc<RecordingNotifier>,
    pub college: College,
}

/// A college client over a fresh mock chain, with in-memory progress.
pub fn college() -> TestCollege {
    college_with(CollegeConfig::default())
}

/// Same as [`college`] but with a caller-supplied config. The contract set is
/// always taken from the mock chain.
pub fn college_with(config: CollegeConfig) -> TestCollege {
    let chain = Arc::new(MockChain::new(ContractSet::sepolia()));
    let notifier = Arc::new(RecordingNotifier::new());
    let config = config
        .with_contracts(chain.contracts())
        .with_receipt_timeout(Duration::from_secs(60));
    let college =
        College::new(config, chain.clone(), notifier.clone()).expect("college should build");
    TestCollege {
        chain,
        notifier,
        college,
    }
}
