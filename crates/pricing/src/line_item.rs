use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lumenr_core::{DomainError, DomainResult, ValueObject};

use crate::catalog::{CatalogEntry, CatalogEntryId};

/// Largest accepted line total (one quadrillion).
///
/// Unit prices and `quantity * unit_price` are capped here so that summing
/// line totals and applying a tax rate of at most 100 % stays far inside
/// `Decimal`'s range.
pub const MAX_LINE_TOTAL: Decimal = Decimal::from_parts(2_764_472_320, 232_830, 0, false, 0);

/// Identifier of a line item, unique within its parent document.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineItemId(Uuid);

impl LineItemId {
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

impl Default for LineItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for LineItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Which catalog a line item is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Product,
    Service,
}

impl core::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ItemKind::Product => f.write_str("product"),
            ItemKind::Service => f.write_str("service"),
        }
    }
}

impl FromStr for ItemKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "product" => Ok(ItemKind::Product),
            "service" => Ok(ItemKind::Service),
            other => Err(DomainError::validation(format!(
                "kind must be 'product' or 'service' (got '{other}')"
            ))),
        }
    }
}

/// One priced entry of a quote or invoice.
///
/// `line_total` is derived and has no setter: every write that touches
/// `quantity`, `unit_price` or `catalog_ref` recomputes it in the same call.
/// Deserialization goes through [`LineItemRecord`], so a stored or submitted
/// `line_total` is never trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LineItemRecord")]
pub struct LineItem {
    id: LineItemId,
    kind: ItemKind,
    catalog_ref: Option<CatalogEntryId>,
    name: String,
    description: String,
    quantity: u32,
    unit_price: Decimal,
    line_total: Decimal,
}

impl ValueObject for LineItem {}

impl LineItem {
    /// A blank product row: no catalog selection, quantity 1, price 0.
    pub fn blank() -> Self {
        Self {
            id: LineItemId::new(),
            kind: ItemKind::Product,
            catalog_ref: None,
            name: String::new(),
            description: String::new(),
            quantity: 1,
            unit_price: Decimal::ZERO,
            line_total: Decimal::ZERO,
        }
    }

    /// Build a fully specified item, validating quantity and price.
    pub fn priced(
        id: LineItemId,
        kind: ItemKind,
        catalog_ref: Option<CatalogEntryId>,
        name: impl Into<String>,
        description: impl Into<String>,
        quantity: u32,
        unit_price: Decimal,
    ) -> DomainResult<Self> {
        validate_quantity(quantity)?;
        validate_unit_price(unit_price)?;
        let line_total = line_total_for(quantity, unit_price)?;

        Ok(Self {
            id,
            kind,
            catalog_ref,
            name: name.into(),
            description: description.into(),
            quantity,
            unit_price,
            line_total,
        })
    }

    pub fn id(&self) -> LineItemId {
        self.id
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn catalog_ref(&self) -> Option<CatalogEntryId> {
        self.catalog_ref
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    pub fn line_total(&self) -> Decimal {
        self.line_total
    }

    /// Switch kind. Any prior catalog selection and its price are discarded
    /// so a product price never leaks onto a service row.
    pub fn set_kind(&mut self, kind: ItemKind) {
        self.kind = kind;
        self.catalog_ref = None;
        self.name.clear();
        self.description.clear();
        self.unit_price = Decimal::ZERO;
        self.line_total = Decimal::ZERO;
    }

    pub fn set_quantity(&mut self, quantity: u32) -> DomainResult<()> {
        validate_quantity(quantity)?;
        self.line_total = line_total_for(quantity, self.unit_price)?;
        self.quantity = quantity;
        Ok(())
    }

    pub fn set_unit_price(&mut self, unit_price: Decimal) -> DomainResult<()> {
        validate_unit_price(unit_price)?;
        self.line_total = line_total_for(self.quantity, unit_price)?;
        self.unit_price = unit_price;
        Ok(())
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Take over a catalog entry's current name, description and price.
    ///
    /// The entry must match this item's kind.
    pub fn select(&mut self, entry: &CatalogEntry) -> DomainResult<()> {
        if entry.kind != self.kind {
            return Err(DomainError::validation(format!(
                "cannot select a {} for a {} line",
                entry.kind, self.kind
            )));
        }
        validate_unit_price(entry.unit_price)?;
        let line_total = line_total_for(self.quantity, entry.unit_price)?;

        self.catalog_ref = Some(entry.id);
        self.name = entry.name.clone();
        self.description = entry.description.clone();
        self.unit_price = entry.unit_price;
        self.line_total = line_total;
        Ok(())
    }
}

fn line_total_for(quantity: u32, unit_price: Decimal) -> DomainResult<Decimal> {
    Decimal::from(quantity)
        .checked_mul(unit_price)
        .filter(|total| *total <= MAX_LINE_TOTAL)
        .ok_or_else(|| DomainError::validation("amount too large"))
}

fn validate_quantity(quantity: u32) -> DomainResult<()> {
    if quantity == 0 {
        return Err(DomainError::validation("quantity must be at least 1"));
    }
    Ok(())
}

fn validate_unit_price(unit_price: Decimal) -> DomainResult<()> {
    if unit_price < Decimal::ZERO {
        return Err(DomainError::validation("unit_price must not be negative"));
    }
    if unit_price > MAX_LINE_TOTAL {
        return Err(DomainError::validation("amount too large"));
    }
    Ok(())
}

/// Parse a quantity typed into an editor field.
///
/// Editing is forgiving: anything non-numeric or below 1 becomes 1.
pub fn parse_quantity(input: &str) -> u32 {
    match input.trim().parse::<i64>() {
        Ok(n) if n >= 1 => u32::try_from(n).unwrap_or(u32::MAX),
        _ => 1,
    }
}

/// Parse a unit price typed into an editor field; negatives are rejected.
pub fn parse_unit_price(input: &str) -> DomainResult<Decimal> {
    let price = Decimal::from_str(input.trim())
        .map_err(|e| DomainError::validation(format!("unit_price is not a number: {e}")))?;
    validate_unit_price(price)?;
    Ok(price)
}

/// Wire/storage shape of a line item.
///
/// `line_total` is accepted for compatibility but discarded.
#[derive(Debug, Clone, Deserialize)]
struct LineItemRecord {
    #[serde(default)]
    id: Option<LineItemId>,
    kind: ItemKind,
    #[serde(default)]
    catalog_ref: Option<CatalogEntryId>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    quantity: u32,
    unit_price: Decimal,
    #[serde(default, rename = "line_total")]
    #[allow(dead_code)]
    _line_total: Option<Decimal>,
}

impl TryFrom<LineItemRecord> for LineItem {
    type Error = DomainError;

    fn try_from(record: LineItemRecord) -> Result<Self, Self::Error> {
        LineItem::priced(
            record.id.unwrap_or_default(),
            record.kind,
            record.catalog_ref,
            record.name,
            record.description,
            record.quantity,
            record.unit_price,
        )
    }
}
