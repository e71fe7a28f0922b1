use super::RecordQueue;
use crate::error::QueueResult;
use crate::models::{Record, Relationship};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

/// An in-memory queue for tests or local usage.
///
/// Pending records are claimed under a lock, so concurrent fetches never
/// see the same record. Routed records are kept per relationship until
/// [`take_routed`](Self::take_routed) drains them; a long-running owner must
/// drain them or memory grows with every routed batch.
#[derive(Clone, Default)]
pub struct InMemoryQueue {
    pending: Arc<Mutex<VecDeque<Record>>>,
    routed: Arc<Mutex<HashMap<Relationship, Vec<Record>>>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append records to the pending queue.
    pub async fn enqueue(&self, records: impl IntoIterator<Item = Record>) {
        self.pending.lock().await.extend(records);
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Records routed to `relationship` so far, in routing order.
    pub async fn routed(&self, relationship: Relationship) -> Vec<Record> {
        self.routed
            .lock()
            .await
            .get(&relationship)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn routed_count(&self, relationship: Relationship) -> usize {
        self.routed
            .lock()
            .await
            .get(&relationship)
            .map_or(0, Vec::len)
    }

    /// Remove and return the records routed to `relationship` so far.
    pub async fn take_routed(&self, relationship: Relationship) -> Vec<Record> {
        self.routed
            .lock()
            .await
            .remove(&relationship)
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecordQueue for InMemoryQueue {
    async fn fetch(&self, max: usize) -> QueueResult<Vec<Record>> {
        let mut pending = self.pending.lock().await;
        let take = max.min(pending.len());
        Ok(pending.drain(..take).collect())
    }

    async fn route(&self, records: Vec<Record>, relationship: Relationship) -> QueueResult<()> {
        self.routed
            .lock()
            .await
            .entry(relationship)
            .or_default()
            .extend(records);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_claims_in_order() {
        let queue = InMemoryQueue::new();
        queue.enqueue((1..=5).map(Record::new)).await;

        let first = queue.fetch(2).await.unwrap();
        let second = queue.fetch(10).await.unwrap();

        assert_eq!(first.iter().map(Record::size).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(second.iter().map(Record::size).collect::<Vec<_>>(), vec![3, 4, 5]);
        assert!(queue.fetch(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_route_keeps_relationships_apart() {
        let queue = InMemoryQueue::new();
        queue
            .route(vec![Record::new(1), Record::new(2)], Relationship::Success)
            .await
            .unwrap();
        queue.route(vec![Record::new(3)], Relationship::Failure).await.unwrap();

        assert_eq!(queue.routed_count(Relationship::Success).await, 2);
        assert_eq!(queue.routed(Relationship::Failure).await[0].size(), 3);
    }

    #[tokio::test]
    async fn test_take_routed_drains_one_relationship() {
        let queue = InMemoryQueue::new();
        queue.route(vec![Record::new(1)], Relationship::Success).await.unwrap();
        queue.route(vec![Record::new(2)], Relationship::Success).await.unwrap();
        queue.route(vec![Record::new(3)], Relationship::Failure).await.unwrap();

        let taken = queue.take_routed(Relationship::Success).await;

        assert_eq!(taken.iter().map(Record::size).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(queue.routed_count(Relationship::Success).await, 0);
        assert!(queue.take_routed(Relationship::Success).await.is_empty());
        assert_eq!(queue.routed_count(Relationship::Failure).await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_do_not_overlap() {
        let queue = InMemoryQueue::new();
        queue.enqueue((0..100).map(Record::new)).await;

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move { queue.fetch(30).await.unwrap() })
            })
            .collect();

        let mut sizes = Vec::new();
        for handle in handles {
            sizes.extend(handle.await.unwrap().into_iter().map(|r| r.size()));
        }
        sizes.sort_unstable();
        assert_eq!(sizes, (0..100).collect::<Vec<_>>());
    }
}
