//! Owned, ordered domain-event buffer for entities.

/// Pending domain events of one entity, oldest first.
///
/// Entities embed a recorder and forward `HasDomainEvents` to it. The buffer
/// is not part of the persisted state: mark the field `#[serde(skip)]`. It
/// compares as equal regardless of content, so two entities with the same
/// state but different pending events are still equal.
#[derive(Debug, Clone)]
pub struct EventRecorder<E> {
    pending: Vec<E>,
}

impl<E> EventRecorder<E> {
    pub fn new() -> Self {
        Self { pending: Vec::new() }
    }

    pub fn record(&mut self, event: E) {
        self.pending.push(event);
    }

    pub fn pending(&self) -> &[E] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn drain(&mut self) -> Vec<E> {
        std::mem::take(&mut self.pending)
    }
}

impl<E> Default for EventRecorder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> PartialEq for EventRecorder<E> {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl<E> Eq for EventRecorder<E> {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[test]
    fn drain_returns_events_in_order_and_empties() {
        let mut recorder = EventRecorder::new();
        recorder.record("created");
        recorder.record("renamed");
        assert_eq!(recorder.len(), 2);

        assert_eq!(recorder.drain(), vec!["created", "renamed"]);
        assert!(recorder.is_empty());
        assert!(recorder.drain().is_empty());
    }

    #[test]
    fn pending_events_are_not_serialized() {
        #[derive(Serialize, Deserialize)]
        struct Holder {
            name: String,
            #[serde(skip)]
            events: EventRecorder<String>,
        }

        let mut holder = Holder {
            name: "Ada".into(),
            events: EventRecorder::new(),
        };
        holder.events.record("created".into());

        let json = serde_json::to_value(&holder).unwrap();
        let back: Holder = serde_json::from_value(json).unwrap();
        assert_eq!(back.name, "Ada");
        assert!(back.events.is_empty());
    }
}
