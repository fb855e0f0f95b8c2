//! Course registry records.
//!
//! These mirror what the course contract returns. The client never owns
//! authoritative course state; everything here is a snapshot.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::Amount;

/// Course identifier assigned by the registry. Ids run `1..=courseCount`.
pub type CourseId = u64;

/// A course as returned by `getCourse(id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub name: String,
    pub description: String,
    /// Cost in token units.
    pub price: Amount,
    /// Inactive courses reject new purchases. Past purchases stay valid.
    pub is_active: bool,
}

/// One entry of `getUserPurchases(owner)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub course_id: CourseId,
    /// Unix seconds, set by the contract at commit time.
    pub timestamp: u64,
    /// Amount paid. Fixed at purchase time even if the course price changes later.
    pub price: Amount,
}

impl Purchase {
    /// Commit time as a UTC datetime. Out-of-range timestamps map to the epoch.
    pub fn purchased_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.timestamp as i64, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

/// A purchase joined with the live course record it refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseWithCourse {
    #[serde(flatten)]
    pub purchase: Purchase,
    pub course: Course,
}

/// Aggregate view over the registry for one wallet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseStats {
    pub total_courses: u64,
    pub purchased_courses: u64,
    pub all_courses: Vec<Course>,
}

/// Whether `history` already contains a purchase of `course_id`.
pub fn has_purchased(history: &[PurchaseWithCourse], course_id: CourseId) -> bool {
    history.iter().any(|p| p.purchase.course_id == course_id)
}
