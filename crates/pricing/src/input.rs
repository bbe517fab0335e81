//! Submitted line items and their server-side resolution.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use lumenr_core::{DomainError, DomainResult};

use crate::catalog::{Catalog, CatalogEntryId};
use crate::line_item::{ItemKind, LineItem, LineItemId};

/// A line item as submitted by a caller.
///
/// Only the editable fields are read. Anything derived (`line_total`, document
/// totals) that a caller sends along is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemInput {
    #[serde(default)]
    pub id: Option<LineItemId>,
    #[serde(default = "default_kind")]
    pub kind: ItemKind,
    #[serde(default)]
    pub catalog_ref: Option<CatalogEntryId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
}

fn default_kind() -> ItemKind {
    ItemKind::Product
}

fn default_quantity() -> u32 {
    1
}

impl LineItemInput {
    pub fn custom(kind: ItemKind, name: impl Into<String>, quantity: u32, unit_price: Decimal) -> Self {
        Self {
            id: None,
            kind,
            catalog_ref: None,
            name: Some(name.into()),
            description: None,
            quantity,
            unit_price: Some(unit_price),
        }
    }

    pub fn from_catalog(kind: ItemKind, catalog_ref: CatalogEntryId, quantity: u32) -> Self {
        Self {
            id: None,
            kind,
            catalog_ref: Some(catalog_ref),
            name: None,
            description: None,
            quantity,
            unit_price: None,
        }
    }
}

/// Turn submitted items into validated line items.
///
/// A `catalog_ref` is resolved against the active entries of `catalog`; the
/// entry supplies name, description and price unless the input overrides them.
/// A reference that no longer resolves is still accepted when `existing`
/// already carries it (the entry was retired after it was picked). Any other
/// unknown reference is not found.
pub fn resolve_items(
    inputs: &[LineItemInput],
    catalog: &Catalog,
    existing: &[LineItem],
) -> DomainResult<Vec<LineItem>> {
    inputs
        .iter()
        .map(|input| resolve_item(input, catalog, existing))
        .collect()
}

fn resolve_item(
    input: &LineItemInput,
    catalog: &Catalog,
    existing: &[LineItem],
) -> DomainResult<LineItem> {
    let id = input.id.unwrap_or_default();

    let (name, description, unit_price) = match input.catalog_ref {
        Some(entry_id) => {
            if let Some(entry) = catalog.resolve(input.kind, entry_id) {
                (
                    entry.name.clone(),
                    entry.description.clone(),
                    entry.unit_price,
                )
            } else if let Some(previous) = existing
                .iter()
                .find(|i| i.catalog_ref() == Some(entry_id) && i.kind() == input.kind)
            {
                (
                    previous.name().to_string(),
                    previous.description().to_string(),
                    previous.unit_price(),
                )
            } else {
                return Err(DomainError::not_found());
            }
        }
        None => (String::new(), String::new(), Decimal::ZERO),
    };

    LineItem::priced(
        id,
        input.kind,
        input.catalog_ref,
        input.name.clone().unwrap_or(name),
        input.description.clone().unwrap_or(description),
        input.quantity,
        input.unit_price.unwrap_or(unit_price),
    )
}
