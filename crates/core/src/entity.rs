//! Entity capabilities: identity, audit fields, owned domain events.
//!
//! Capabilities are separate traits composed per type rather than a chain of
//! base types. An entity picks the set it needs:
//!
//! - [`Entity`]: has-identity
//! - [`Auditable`]: has-audit-fields
//! - [`HasDomainEvents`]: has-domain-events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::UserId;

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + Ord + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// Creation / modification stamps carried by audited entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditInfo {
    pub created_at: DateTime<Utc>,
    pub created_by: Option<UserId>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<UserId>,
}

impl AuditInfo {
    pub fn created(by: Option<UserId>, at: DateTime<Utc>) -> Self {
        Self {
            created_at: at,
            created_by: by,
            modified_at: None,
            modified_by: None,
        }
    }

    /// Record a modification. `at` earlier than the creation stamp is clamped to it.
    pub fn touch(&mut self, by: Option<UserId>, at: DateTime<Utc>) {
        self.modified_at = Some(at.max(self.created_at));
        self.modified_by = by;
    }

    /// Most recent write (modification, or creation if never modified).
    pub fn last_changed_at(&self) -> DateTime<Utc> {
        self.modified_at.unwrap_or(self.created_at)
    }
}

/// Entities that carry audit fields.
pub trait Auditable {
    fn audit(&self) -> &AuditInfo;

    fn audit_mut(&mut self) -> &mut AuditInfo;
}

/// Entities that record domain events during their lifetime.
///
/// The entity owns its pending events until a dispatcher drains them after a
/// successful write. Draining empties the collection; events are never
/// replayed from here.
pub trait HasDomainEvents {
    type Event: Clone + core::fmt::Debug;

    /// Events recorded since the last drain, oldest first.
    fn pending_events(&self) -> &[Self::Event];

    /// Drain pending events, leaving the collection empty.
    fn take_events(&mut self) -> Vec<Self::Event>;

    fn clear_events(&mut self) {
        let _ = self.take_events();
    }

    fn has_pending_events(&self) -> bool {
        !self.pending_events().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn touch_records_modifier_and_time() {
        let t0 = Utc::now();
        let user = UserId::new();
        let mut audit = AuditInfo::created(None, t0);
        assert_eq!(audit.last_changed_at(), t0);

        let t1 = t0 + Duration::seconds(5);
        audit.touch(Some(user), t1);
        assert_eq!(audit.modified_at, Some(t1));
        assert_eq!(audit.modified_by, Some(user));
        assert_eq!(audit.last_changed_at(), t1);
    }

    #[test]
    fn touch_never_precedes_creation() {
        let t0 = Utc::now();
        let mut audit = AuditInfo::created(None, t0);
        audit.touch(None, t0 - Duration::hours(1));
        assert_eq!(audit.modified_at, Some(t0));
    }
}
