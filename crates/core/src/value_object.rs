//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity and are compared by their attribute values
/// (`Price`, `Quantity`). They are immutable: "changing" one means building a
/// new one, which is what keeps them safe to copy between request tasks.
///
/// ```ignore
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// struct Price(u64);
///
/// impl ValueObject for Price {}
///
/// assert_eq!(Price(1250), Price(1250));
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
