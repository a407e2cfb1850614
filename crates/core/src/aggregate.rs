//! Aggregate root trait: the unit repositories load and store.

use crate::entity::{Entity, HasDomainEvents};
use crate::error::{DomainError, DomainResult};

/// Aggregate root: an entity with owned domain events and a write version.
///
/// Repositories persist whole aggregates. The version is bumped by the
/// repository on every successful write and is what optimistic concurrency
/// checks compare against.
pub trait AggregateRoot: Entity + HasDomainEvents {
    /// Version of the last persisted state (0 = never persisted).
    fn version(&self) -> u64;

    /// Called by repositories after a successful write.
    fn set_version(&mut self, version: u64);

    /// Stable type name, used for event envelopes and document collections.
    fn aggregate_type() -> &'static str
    where
        Self: Sized;
}

/// Optimistic concurrency expectation for an aggregate.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (useful for idempotent writes, migrations, etc.).
    Any,
    /// Require the stored aggregate to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_matches_every_version() {
        assert!(ExpectedVersion::Any.matches(0));
        assert!(ExpectedVersion::Any.matches(42));
    }

    #[test]
    fn exact_mismatch_is_a_conflict() {
        assert!(ExpectedVersion::Exact(3).check(3).is_ok());
        match ExpectedVersion::Exact(3).check(4) {
            Err(DomainError::Conflict(msg)) => assert!(msg.contains("actual: 4")),
            other => panic!("expected conflict, got {other:?}"),
        }
    }
}
