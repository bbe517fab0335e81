//! Line-item pricing engine.
//!
//! Pure, synchronous domain logic: line items with derived totals, the editing
//! rules applied while a user builds a quote, and subtotal/tax/total
//! aggregation. No IO; catalog entries and tax rates are handed in by callers.

pub mod catalog;
pub mod editor;
pub mod input;
pub mod line_item;
pub mod tax;
pub mod totals;

pub use catalog::{Catalog, CatalogEntry, CatalogEntryId};
pub use editor::{ItemField, LineItemEditor};
pub use input::{LineItemInput, resolve_items};
pub use line_item::{
    ItemKind, LineItem, LineItemId, MAX_LINE_TOTAL, parse_quantity, parse_unit_price,
};
pub use tax::{ProvincialTaxTable, TaxRate, TaxRateLookup};
pub use totals::{Totals, compute_aggregates, round_money};
