use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use super::domain::{CaseId, CaseStatus, PipelineStage};
use super::engine::CaseOutcome;

/// Handle identifying one subscription for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Event delivered to per-case subscribers: incremental stage updates while
/// the run progresses, then exactly one terminal outcome.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CaseEvent {
    StageCompleted {
        case_id: CaseId,
        stage: PipelineStage,
        status: CaseStatus,
        message: String,
    },
    CaseProcessed {
        #[serde(flatten)]
        outcome: CaseOutcome,
    },
}

struct CaseSubscriber {
    id: SubscriptionId,
    sink: UnboundedSender<CaseEvent>,
}

/// Per-case subscriber registry. The lock guards registry lookups and list
/// mutation only; delivery happens on cloned senders after the lock is
/// released. A sink whose receiver has gone away is dropped without
/// affecting other subscribers or the pipeline.
#[derive(Clone, Default)]
pub struct EventPublisher {
    subscribers: Arc<Mutex<HashMap<CaseId, Vec<CaseSubscriber>>>>,
    next_id: Arc<AtomicU64>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, case_id: CaseId) -> (SubscriptionId, UnboundedReceiver<CaseEvent>) {
        let (sink, events) = mpsc::unbounded_channel();
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let mut registry = self.subscribers.lock().expect("subscriber mutex poisoned");
        registry
            .entry(case_id)
            .or_default()
            .push(CaseSubscriber { id, sink });

        (id, events)
    }

    pub fn unsubscribe(&self, case_id: CaseId, subscription: SubscriptionId) {
        let mut registry = self.subscribers.lock().expect("subscriber mutex poisoned");
        if let Some(subscribers) = registry.get_mut(&case_id) {
            subscribers.retain(|subscriber| subscriber.id != subscription);
            if subscribers.is_empty() {
                registry.remove(&case_id);
            }
        }
    }

    /// Deliver `event` to every subscriber currently registered for the
    /// case. Best-effort: dead sinks are pruned, delivery to the rest
    /// proceeds. Returns the number of successful deliveries.
    pub fn publish(&self, case_id: CaseId, event: &CaseEvent) -> usize {
        let sinks: Vec<(SubscriptionId, UnboundedSender<CaseEvent>)> = {
            let registry = self.subscribers.lock().expect("subscriber mutex poisoned");
            match registry.get(&case_id) {
                Some(subscribers) => subscribers
                    .iter()
                    .map(|subscriber| (subscriber.id, subscriber.sink.clone()))
                    .collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, sink) in sinks {
            if sink.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(id);
            }
        }

        if !dead.is_empty() {
            debug!(%case_id, dropped = dead.len(), "pruning closed subscriber sinks");
            let mut registry = self.subscribers.lock().expect("subscriber mutex poisoned");
            if let Some(subscribers) = registry.get_mut(&case_id) {
                subscribers.retain(|subscriber| !dead.contains(&subscriber.id));
                if subscribers.is_empty() {
                    registry.remove(&case_id);
                }
            }
        }

        delivered
    }

    pub fn subscriber_count(&self, case_id: CaseId) -> usize {
        let registry = self.subscribers.lock().expect("subscriber mutex poisoned");
        registry
            .get(&case_id)
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage_event(case_id: CaseId) -> CaseEvent {
        CaseEvent::StageCompleted {
            case_id,
            stage: PipelineStage::Triage,
            status: CaseStatus::Triaged,
            message: "Triage completed".to_string(),
        }
    }

    #[tokio::test]
    async fn publish_reaches_every_subscriber_for_the_case() {
        let publisher = EventPublisher::new();
        let case_id = CaseId(7);
        let (_first_id, mut first) = publisher.subscribe(case_id);
        let (_second_id, mut second) = publisher.subscribe(case_id);
        let (_other_id, mut other) = publisher.subscribe(CaseId(8));

        let delivered = publisher.publish(case_id, &stage_event(case_id));

        assert_eq!(delivered, 2);
        assert!(first.try_recv().is_ok());
        assert!(second.try_recv().is_ok());
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn dead_sink_is_pruned_without_breaking_delivery() {
        let publisher = EventPublisher::new();
        let case_id = CaseId(3);
        let (_gone_id, gone) = publisher.subscribe(case_id);
        let (_live_id, mut live) = publisher.subscribe(case_id);
        drop(gone);

        let delivered = publisher.publish(case_id, &stage_event(case_id));

        assert_eq!(delivered, 1);
        assert!(live.try_recv().is_ok());
        assert_eq!(publisher.subscriber_count(case_id), 1);
    }

    #[tokio::test]
    async fn unsubscribe_removes_only_the_named_subscription() {
        let publisher = EventPublisher::new();
        let case_id = CaseId(11);
        let (first_id, mut first) = publisher.subscribe(case_id);
        let (_second_id, mut second) = publisher.subscribe(case_id);

        publisher.unsubscribe(case_id, first_id);
        publisher.publish(case_id, &stage_event(case_id));

        assert!(first.try_recv().is_err());
        assert!(second.try_recv().is_ok());
    }

    #[tokio::test]
    async fn last_unsubscribe_tears_down_the_case_entry() {
        let publisher = EventPublisher::new();
        let case_id = CaseId(21);
        let (id, _events) = publisher.subscribe(case_id);

        publisher.unsubscribe(case_id, id);

        assert_eq!(publisher.subscriber_count(case_id), 0);
        assert_eq!(publisher.publish(case_id, &stage_event(case_id)), 0);
    }
}
