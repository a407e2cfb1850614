use chrono::{DateTime, Utc};

/// Something that happened to an entity.
///
/// Domain events are:
/// - **immutable** (treat them as facts)
/// - **versioned** (schema evolution)
/// - **owned** by the entity that recorded them until a dispatcher drains them
pub trait DomainEvent: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "customer.relocated").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32 {
        1
    }

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
