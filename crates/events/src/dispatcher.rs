//! Drains an aggregate's pending domain events and publishes them.
//!
//! Call this only after the write that produced the events succeeded. The
//! order is:
//!
//! ```text
//! repository write ok → envelope every pending event → publish each → clear pending
//! ```
//!
//! Events are cleared only once every publish succeeded. If serialization or a
//! publish fails, the events stay pending on the aggregate and the error is
//! returned; a retry republishes the whole batch (at-least-once).

use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use repokit_core::AggregateRoot;

use crate::bus::EventBus;
use crate::envelope::EventEnvelope;
use crate::event::DomainEvent;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to serialize {event_type}: {source}")]
    Serialize {
        event_type: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("event bus rejected {event_type}: {message}")]
    Bus {
        event_type: String,
        message: String,
    },
}

/// Publishes drained domain events as JSON envelopes on an [`EventBus`].
#[derive(Debug, Clone)]
pub struct DomainEventDispatcher<B> {
    bus: B,
}

impl<B> DomainEventDispatcher<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn into_inner(self) -> B {
        self.bus
    }
}

impl<B> DomainEventDispatcher<B>
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Publish every pending event of `aggregate`, then clear them.
    ///
    /// Returns the published envelopes in recording order.
    pub fn dispatch<A>(&self, aggregate: &mut A) -> Result<Vec<EventEnvelope<JsonValue>>, PublishError>
    where
        A: AggregateRoot,
        A::Event: DomainEvent + Serialize,
    {
        if !aggregate.has_pending_events() {
            return Ok(vec![]);
        }

        let aggregate_id = aggregate.id().to_string();
        let aggregate_type = A::aggregate_type();
        let version = aggregate.version();

        let envelopes = aggregate
            .pending_events()
            .iter()
            .enumerate()
            .map(|(position, event)| {
                EventEnvelope::from_typed(
                    aggregate_id.clone(),
                    aggregate_type,
                    version,
                    position as u32,
                    event,
                )
                .map_err(|source| PublishError::Serialize {
                    event_type: event.event_type(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for envelope in &envelopes {
            self.bus.publish(envelope.clone()).map_err(|err| {
                tracing::warn!(
                    aggregate_type,
                    aggregate_id = %aggregate_id,
                    event_type = envelope.event_type(),
                    error = %err,
                    "domain event publish failed; events left pending"
                );
                PublishError::Bus {
                    event_type: envelope.event_type().to_string(),
                    message: err.to_string(),
                }
            })?;
        }

        aggregate.clear_events();
        tracing::debug!(
            aggregate_type,
            aggregate_id = %aggregate_id,
            version,
            count = envelopes.len(),
            "dispatched domain events"
        );

        Ok(envelopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory_bus::InMemoryEventBus;
    use crate::recorder::EventRecorder;
    use crate::bus::Subscription;
    use chrono::{DateTime, Utc};
    use repokit_core::{Entity, EntityId, HasDomainEvents};
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum CustomerEvent {
        Registered { name: String, at: DateTime<Utc> },
        Relocated { zip_code: String, at: DateTime<Utc> },
    }

    impl DomainEvent for CustomerEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CustomerEvent::Registered { .. } => "customer.registered",
                CustomerEvent::Relocated { .. } => "customer.relocated",
            }
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            match self {
                CustomerEvent::Registered { at, .. } | CustomerEvent::Relocated { at, .. } => *at,
            }
        }
    }

    #[derive(Debug)]
    struct Customer {
        id: EntityId,
        version: u64,
        events: EventRecorder<CustomerEvent>,
    }

    impl Entity for Customer {
        type Id = EntityId;

        fn id(&self) -> &EntityId {
            &self.id
        }
    }

    impl HasDomainEvents for Customer {
        type Event = CustomerEvent;

        fn pending_events(&self) -> &[CustomerEvent] {
            self.events.pending()
        }

        fn take_events(&mut self) -> Vec<CustomerEvent> {
            self.events.drain()
        }
    }

    impl AggregateRoot for Customer {
        fn version(&self) -> u64 {
            self.version
        }

        fn set_version(&mut self, version: u64) {
            self.version = version;
        }

        fn aggregate_type() -> &'static str {
            "customer"
        }
    }

    fn customer_with_events() -> Customer {
        let mut customer = Customer {
            id: EntityId::new(),
            version: 3,
            events: EventRecorder::new(),
        };
        customer.events.record(CustomerEvent::Registered {
            name: "Ada".into(),
            at: Utc::now(),
        });
        customer.events.record(CustomerEvent::Relocated {
            zip_code: "30062".into(),
            at: Utc::now(),
        });
        customer
    }

    #[test]
    fn publishes_in_order_and_clears() {
        let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());
        let sub: Subscription<_> = bus.subscribe();
        let dispatcher = DomainEventDispatcher::new(bus);

        let mut customer = customer_with_events();
        let published = dispatcher.dispatch(&mut customer).unwrap();

        assert_eq!(published.len(), 2);
        assert!(!customer.has_pending_events());

        let received = sub.drain();
        assert_eq!(received, published);
        assert_eq!(received[0].event_type(), "customer.registered");
        assert_eq!(received[1].event_type(), "customer.relocated");
        assert_eq!(received[1].position(), 1);
        assert_eq!(received[0].aggregate_version(), 3);
        assert_eq!(received[0].aggregate_type(), "customer");
        assert_eq!(received[0].aggregate_id(), customer.id.to_string());

        let decoded: CustomerEvent = received[1].decode().unwrap();
        assert!(matches!(decoded, CustomerEvent::Relocated { ref zip_code, .. } if zip_code == "30062"));
    }

    #[test]
    fn nothing_pending_publishes_nothing() {
        let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());
        let sub = bus.subscribe();
        let dispatcher = DomainEventDispatcher::new(bus);

        let mut customer = customer_with_events();
        customer.clear_events();
        assert!(dispatcher.dispatch(&mut customer).unwrap().is_empty());
        assert!(sub.drain().is_empty());
    }

    struct RejectingBus;

    impl EventBus<EventEnvelope<JsonValue>> for RejectingBus {
        type Error = String;

        fn publish(&self, _message: EventEnvelope<JsonValue>) -> Result<(), Self::Error> {
            Err("broker unavailable".to_string())
        }

        fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>> {
            let (_tx, rx) = std::sync::mpsc::channel();
            Subscription::new(rx)
        }
    }

    #[test]
    fn failed_publish_keeps_events_pending() {
        let dispatcher = DomainEventDispatcher::new(RejectingBus);
        let mut customer = customer_with_events();

        let err = dispatcher.dispatch(&mut customer).unwrap_err();
        assert!(matches!(err, PublishError::Bus { ref message, .. } if message == "broker unavailable"));
        assert_eq!(customer.pending_events().len(), 2);
    }
}
