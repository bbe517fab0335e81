use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::line_item::ItemKind;

/// Identifier of a product or service in an owner's catalog.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogEntryId(Uuid);

impl CatalogEntryId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CatalogEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for CatalogEntryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A product or service as currently listed in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: CatalogEntryId,
    pub kind: ItemKind,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub unit_price: Decimal,
    pub active: bool,
}

/// Snapshot of one owner's catalog, used while editing line items.
///
/// Only active entries can be newly selected. Documents that already reference
/// an entry that was later deactivated keep their copied values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Find a selectable entry of `kind`.
    pub fn resolve(&self, kind: ItemKind, id: CatalogEntryId) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|e| e.id == id && e.kind == kind && e.active)
    }

    /// Entries a user may pick for a row of `kind`, in catalog order.
    pub fn selectable(&self, kind: ItemKind) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter().filter(move |e| e.kind == kind && e.active)
    }

    /// Every entry, active or not.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(kind: ItemKind, active: bool) -> CatalogEntry {
        CatalogEntry {
            id: CatalogEntryId::new(),
            kind,
            name: "Entry".to_string(),
            description: String::new(),
            unit_price: dec!(10),
            active,
        }
    }

    #[test]
    fn resolve_requires_matching_kind() {
        let product = entry(ItemKind::Product, true);
        let catalog = Catalog::new(vec![product.clone()]);

        assert!(catalog.resolve(ItemKind::Product, product.id).is_some());
        assert!(catalog.resolve(ItemKind::Service, product.id).is_none());
    }

    #[test]
    fn inactive_entries_are_not_selectable() {
        let retired = entry(ItemKind::Service, false);
        let current = entry(ItemKind::Service, true);
        let catalog = Catalog::new(vec![retired.clone(), current.clone()]);

        assert!(catalog.resolve(ItemKind::Service, retired.id).is_none());
        let ids: Vec<_> = catalog.selectable(ItemKind::Service).map(|e| e.id).collect();
        assert_eq!(ids, vec![current.id]);
    }
}
