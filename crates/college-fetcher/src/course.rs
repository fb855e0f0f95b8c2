//! Course registry reads.
//!
//! These are always live: prices, activity flags and purchase history
//! change with every purchase, so nothing here goes through the cache.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::try_join_all;

use college_transport::{course_fn, AbiValue, ChainClient, ContractCall, ContractSet};
use college_types::{Address, Course, CourseId, CourseStats, Purchase, PurchaseWithCourse};

#[derive(Clone)]
pub struct CourseReader {
    client: Arc<dyn ChainClient>,
    contracts: ContractSet,
}

impl CourseReader {
    pub fn new(client: Arc<dyn ChainClient>, contracts: ContractSet) -> Self {
        Self { client, contracts }
    }

    async fn read(&self, call: ContractCall) -> Result<AbiValue> {
        Ok(self.client.read(&call).await?)
    }

    fn call(&self, function: &str) -> ContractCall {
        ContractCall::new(self.contracts.course, function)
    }

    pub async fn course_count(&self) -> Result<u64> {
        Ok(self.read(self.call(course_fn::COURSE_COUNT)).await?.as_u64()?)
    }

    /// Fetch course `id`. Ids start at 1.
    pub async fn course(&self, id: CourseId) -> Result<Course> {
        let value = self
            .read(self.call(course_fn::GET_COURSE).arg(id))
            .await
            .with_context(|| format!("failed to load course {}", id))?;
        decode_course(&value)
    }

    /// Every registered course, in id order.
    pub async fn all_courses(&self) -> Result<Vec<Course>> {
        let count = self.course_count().await?;
        try_join_all((1..=count).map(|id| self.course(id))).await
    }

    /// Raw purchase records for `owner`.
    pub async fn purchases(&self, owner: Address) -> Result<Vec<Purchase>> {
        let value = self
            .read(self.call(course_fn::GET_USER_PURCHASES).arg(owner))
            .await?;
        value.as_array()?.iter().map(decode_purchase).collect()
    }

    /// Purchase records joined with the course each one refers to.
    pub async fn purchase_history(&self, owner: Address) -> Result<Vec<PurchaseWithCourse>> {
        let purchases = self.purchases(owner).await?;
        let courses = try_join_all(purchases.iter().map(|p| self.course(p.course_id))).await?;
        Ok(purchases
            .into_iter()
            .zip(courses)
            .map(|(purchase, course)| PurchaseWithCourse { purchase, course })
            .collect())
    }

    pub async fn course_stats(&self, owner: Address) -> Result<CourseStats> {
        let (all_courses, purchases) =
            futures::try_join!(self.all_courses(), self.purchases(owner))?;
        Ok(CourseStats {
            total_courses: all_courses.len() as u64,
            purchased_courses: purchases.len() as u64,
            all_courses,
        })
    }
}

/// `getCourse` returns `(name, price, isActive, description)`.
fn decode_course(value: &AbiValue) -> Result<Course> {
    let fields = value.as_tuple(4)?;
    Ok(Course {
        name: fields[0].as_str()?.to_string(),
        price: fields[1].as_uint()?,
        is_active: fields[2].as_bool()?,
        description: fields[3].as_str()?.to_string(),
    })
}

/// `getUserPurchases` items are `(courseId, timestamp, price)`.
fn decode_purchase(value: &AbiValue) -> Result<Purchase> {
    let fields = value.as_tuple(3)?;
    Ok(Purchase {
        course_id: fields[0].as_u64()?,
        timestamp: fields[1].as_u64()?,
        price: fields[2].as_uint()?,
    })
}
