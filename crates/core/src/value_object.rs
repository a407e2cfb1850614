//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity; two instances with the same attributes are
/// equal. They are immutable: "changing" one means building a new value.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct ZipCode(String);
///
/// impl ValueObject for ZipCode {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
