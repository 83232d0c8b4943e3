//! Committed-mutation events.
//!
//! Services publish an event after a write has been committed. Subscribers
//! registered on the bus run in registration order before `publish` returns,
//! so a response is never sent while a cache still holds the old state.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentEvent {
    PaymentsCalculated {
        period: String,
    },
    PaymentUpdated {
        payment_id: Uuid,
        period: String,
    },
    PaymentApproved {
        payment_id: Uuid,
        period: String,
    },
    PaymentPaid {
        payment_id: Uuid,
        period: String,
    },
    NotificationFailed {
        payment_id: Uuid,
        period: String,
    },
    RatesUpdated {
        teacher_id: Uuid,
    },
    TeacherCreated {
        teacher_id: Uuid,
    },
    SessionRecorded {
        teacher_id: Uuid,
    },
    SubmittedToAccounting {
        period: String,
        tracking_id: String,
    },
}

impl PaymentEvent {
    /// Billing period whose payments this event touched, if any.
    pub fn period(&self) -> Option<&str> {
        match self {
            PaymentEvent::PaymentsCalculated { period }
            | PaymentEvent::PaymentUpdated { period, .. }
            | PaymentEvent::PaymentApproved { period, .. }
            | PaymentEvent::PaymentPaid { period, .. }
            | PaymentEvent::NotificationFailed { period, .. }
            | PaymentEvent::SubmittedToAccounting { period, .. } => Some(period),
            PaymentEvent::RatesUpdated { .. }
            | PaymentEvent::TeacherCreated { .. }
            | PaymentEvent::SessionRecorded { .. } => None,
        }
    }
}

#[async_trait]
pub trait MutationSubscriber: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_event(&self, event: &PaymentEvent);
}

#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Arc<dyn MutationSubscriber>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, subscriber: Arc<dyn MutationSubscriber>) {
        log::debug!("Registering mutation subscriber {}", subscriber.name());
        self.subscribers.write().await.push(subscriber);
    }

    pub async fn publish(&self, event: PaymentEvent) {
        log::debug!("Publishing {:?}", event);

        let subscribers = self.subscribers.read().await.clone();
        for subscriber in subscribers {
            subscriber.on_event(&event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::sync::Mutex;

    struct Recorder {
        seen: Mutex<Vec<PaymentEvent>>,
    }

    #[async_trait]
    impl MutationSubscriber for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn on_event(&self, event: &PaymentEvent) {
            self.seen.lock().await.push(event.clone());
        }
    }

    #[actix_rt::test]
    async fn subscribers_see_events_before_publish_returns() {
        let bus = EventBus::new();
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        bus.subscribe(recorder.clone()).await;

        let event = PaymentEvent::PaymentsCalculated {
            period: "2026-09".to_string(),
        };
        bus.publish(event.clone()).await;

        assert_eq!(*recorder.seen.lock().await, vec![event]);
    }

    #[test]
    fn teacher_events_carry_no_period() {
        let event = PaymentEvent::RatesUpdated {
            teacher_id: Uuid::new_v4(),
        };
        assert_eq!(event.period(), None);
        assert_eq!(
            PaymentEvent::PaymentPaid {
                payment_id: Uuid::new_v4(),
                period: "2026-09".to_string()
            }
            .period(),
            Some("2026-09")
        );
    }
}
