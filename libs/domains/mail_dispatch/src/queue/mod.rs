//! Upstream queue boundary.
//!
//! The pipeline that produces records and consumes routed batches is
//! reached only through [`RecordQueue`]. [`BatchFetcher`] applies the batch
//! size bound on top of it.

mod inmemory;

pub use inmemory::InMemoryQueue;

use crate::error::QueueResult;
use crate::models::{Batch, Record, Relationship};
use async_trait::async_trait;

/// Queue that hands out records and takes them back once routed.
///
/// `fetch` is an atomic claim: records it returns are not handed to any
/// other caller until they are routed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordQueue: Send + Sync {
    /// Claim up to `max` records, oldest first. May return nothing.
    async fn fetch(&self, max: usize) -> QueueResult<Vec<Record>>;

    /// Hand claimed records to `relationship`.
    async fn route(&self, records: Vec<Record>, relationship: Relationship) -> QueueResult<()>;
}

/// Pulls one bounded batch per dispatch attempt.
#[derive(Debug, Clone, Copy)]
pub struct BatchFetcher {
    max_records: usize,
}

impl BatchFetcher {
    pub fn new(max_records: usize) -> Self {
        Self {
            max_records: max_records.max(1),
        }
    }

    pub fn max_records(&self) -> usize {
        self.max_records
    }

    /// Fetch one batch, or `None` when the queue has nothing to offer.
    pub async fn fetch<Q>(&self, queue: &Q) -> QueueResult<Option<Batch>>
    where
        Q: RecordQueue + ?Sized,
    {
        let records = queue.fetch(self.max_records).await?;
        debug_assert!(records.len() <= self.max_records);
        Ok(Batch::new(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_respects_max_records() {
        let mut queue = MockRecordQueue::new();
        queue
            .expect_fetch()
            .withf(|max| *max == 3)
            .times(1)
            .returning(|max| Ok((0..max as u64).map(Record::new).collect()));

        let batch = BatchFetcher::new(3).fetch(&queue).await.unwrap().unwrap();
        assert_eq!(batch.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_fetch_is_none() {
        let mut queue = MockRecordQueue::new();
        queue.expect_fetch().times(1).returning(|_| Ok(Vec::new()));
        queue.expect_route().never();

        assert!(BatchFetcher::new(10).fetch(&queue).await.unwrap().is_none());
    }

    #[test]
    fn test_zero_is_clamped() {
        assert_eq!(BatchFetcher::new(0).max_records(), 1);
    }
}
