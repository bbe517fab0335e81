//! Editable line-item collection.
//!
//! This is the state a quote form works on before submission: rows are added,
//! removed and edited one field at a time, and each edit reapplies the
//! derived-field rules so the list is always consistent.

use rust_decimal::Decimal;

use lumenr_core::DomainResult;

use crate::catalog::{Catalog, CatalogEntryId};
use crate::line_item::{ItemKind, LineItem, LineItemId};
use crate::tax::TaxRate;
use crate::totals::{Totals, compute_aggregates};

/// A single-field edit applied to one line item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemField {
    Kind(ItemKind),
    CatalogRef(CatalogEntryId),
    Name(String),
    Description(String),
    Quantity(u32),
    UnitPrice(Decimal),
}

/// Ordered collection of line items under edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineItemEditor {
    items: Vec<LineItem>,
}

impl LineItemEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<LineItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<LineItem> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append a blank product row and return its id.
    pub fn add_item(&mut self) -> LineItemId {
        let item = LineItem::blank();
        let id = item.id();
        self.items.push(item);
        id
    }

    /// Remove the row with `id`. Unknown ids are ignored.
    pub fn remove_item(&mut self, id: LineItemId) {
        self.items.retain(|item| item.id() != id);
    }

    /// Apply one field edit to the row with `id`.
    ///
    /// - A kind change clears the catalog selection and the price.
    /// - A catalog selection is resolved against the active entries of the
    ///   row's current kind; an unresolvable reference leaves the row as it was.
    /// - Quantity, price and catalog edits recompute the line total.
    ///
    /// Invalid values (quantity 0, negative price) are rejected and the row is
    /// left untouched. Unknown ids are ignored.
    pub fn update_item(
        &mut self,
        id: LineItemId,
        field: ItemField,
        catalog: &Catalog,
    ) -> DomainResult<()> {
        let Some(item) = self.items.iter_mut().find(|item| item.id() == id) else {
            return Ok(());
        };

        match field {
            ItemField::Kind(kind) => item.set_kind(kind),
            ItemField::CatalogRef(entry_id) => {
                if let Some(entry) = catalog.resolve(item.kind(), entry_id) {
                    item.select(entry)?;
                }
            }
            ItemField::Name(name) => item.set_name(name),
            ItemField::Description(description) => item.set_description(description),
            ItemField::Quantity(quantity) => item.set_quantity(quantity)?,
            ItemField::UnitPrice(price) => item.set_unit_price(price)?,
        }

        Ok(())
    }

    /// Totals for the current rows.
    pub fn totals(&self, tax_rate: TaxRate) -> Totals {
        compute_aggregates(&self.items, tax_rate)
    }
}
