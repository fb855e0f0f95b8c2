//! Events emitted by the college contracts.

use crate::client::{ChainClient, DecodedEvent, Log};

/// Identity of a contract event: its name and canonical signature.
///
/// The signature string is what the client hashes into `topics[0]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventAbi {
    pub name: &'static str,
    pub signature: &'static str,
}

/// Emitted by the course registry on every successful purchase.
pub const COURSE_PURCHASED: EventAbi = EventAbi {
    name: "CoursePurchased",
    signature: "CoursePurchased(address indexed buyer, uint256 indexed courseId, uint256 price)",
};

/// Emitted by the certificate contract on every mint.
pub const NFT_MINTED: EventAbi = EventAbi {
    name: "NFTMinted",
    signature:
        "NFTMinted(address indexed user, uint256 indexed courseId, uint256 tokenId, string tokenURI)",
};

/// Every log in `logs` that decodes as `event`, in log order.
///
/// Logs of other events are skipped silently. A block can hold the same
/// event from several transactions, so callers looking for their own
/// emission filter on the event's arguments.
pub fn find_events(client: &dyn ChainClient, event: &EventAbi, logs: &[Log]) -> Vec<DecodedEvent> {
    logs.iter()
        .filter_map(|log| client.decode_event_log(event, log).ok())
        .filter(|decoded| decoded.name == event.name)
        .collect()
}
