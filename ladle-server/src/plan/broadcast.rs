//! Change broadcast fan-out
//!
//! One broadcast channel per household topic, created lazily. Every
//! session subscribed to a household receives every event published for
//! it, including the session that originated the mutation. Slow
//! subscribers are lagged out by the channel and must refetch.

use dashmap::DashMap;
use shared::PlanEvent;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Fan-out hub for plan events, owned by the server composition root
#[derive(Clone)]
pub struct PlanBroadcaster {
    capacity: usize,
    topics: Arc<DashMap<String, broadcast::Sender<PlanEvent>>>,
}

impl PlanBroadcaster {
    /// Create a broadcaster whose per-topic channels hold `capacity` events
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            topics: Arc::new(DashMap::new()),
        }
    }

    /// Get the sender for a household topic, creating the channel on first use
    ///
    /// Handing the sender itself across a boundary is how the in-process
    /// client wires its feed without linking this crate.
    pub fn sender_for(&self, household: &str) -> broadcast::Sender<PlanEvent> {
        self.topics
            .entry(household.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Subscribe to a household topic
    pub fn subscribe(&self, household: &str) -> broadcast::Receiver<PlanEvent> {
        self.sender_for(household).subscribe()
    }

    /// Publish an event to its household topic
    ///
    /// Returns the number of sessions that received it; 0 when nobody is
    /// listening (not an error, the store is already committed).
    pub fn publish(&self, event: &PlanEvent) -> usize {
        let receivers = self
            .sender_for(&event.household)
            .send(event.clone())
            .unwrap_or(0);
        tracing::debug!(
            household = %event.household,
            event_type = %event.event_type,
            receivers,
            "plan event published"
        );
        receivers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{PlanEventPayload, PlanEventType};

    fn failed_event(household: &str, entry_id: &str) -> PlanEvent {
        PlanEvent::new(
            household,
            "alice",
            PlanEventPayload::UpdateFailed {
                entry_id: entry_id.to_string(),
                reason: "test".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_fine() {
        let hub = PlanBroadcaster::new(8);
        assert_eq!(hub.publish(&failed_event("home", "e1")), 0);
    }

    #[tokio::test]
    async fn test_all_subscribers_receive_including_originator() {
        let hub = PlanBroadcaster::new(8);
        let mut rx_a = hub.subscribe("home");
        let mut rx_b = hub.subscribe("home");

        assert_eq!(hub.publish(&failed_event("home", "e1")), 2);

        let got_a = rx_a.recv().await.unwrap();
        let got_b = rx_b.recv().await.unwrap();
        assert_eq!(got_a.event_type, PlanEventType::UpdateFailed);
        assert_eq!(got_a.event_id, got_b.event_id);
    }

    #[tokio::test]
    async fn test_topics_are_isolated_per_household() {
        let hub = PlanBroadcaster::new(8);
        let mut rx_home = hub.subscribe("home");
        let mut rx_other = hub.subscribe("other");

        hub.publish(&failed_event("home", "e1"));

        assert!(rx_home.recv().await.is_ok());
        assert!(matches!(
            rx_other.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
