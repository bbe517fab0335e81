//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have **no identity**: two with the same attribute values are
/// equal. Line items inside a document and computed totals are value objects;
/// quotes and invoices are aggregates.
///
/// To "modify" a value object, build a new one. Documents capture value objects
/// by copy, which is what keeps an invoice independent of the quote it was
/// converted from.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
