//! Server-side pricing of submitted line items.
//!
//! Resolves catalog references, the applicable tax rate and the totals for a
//! document before it is handed to an aggregate. Totals a caller submits are
//! never consulted.

use std::sync::Arc;

use rust_decimal::Decimal;

use lumenr_core::{ClientId, DomainError, UserId};
use lumenr_pricing::{
    Catalog, CatalogEntry, LineItem, LineItemInput, MAX_LINE_TOTAL, TaxRate, TaxRateLookup,
    Totals, compute_aggregates, resolve_items,
};

use crate::catalog::CatalogSource;
use crate::clients::{ClientDirectory, ClientProfile};
use crate::command_dispatcher::DispatchError;

/// Line items with the tax rate and totals that apply to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedItems {
    pub items: Vec<LineItem>,
    pub tax_rate: TaxRate,
    pub totals: Totals,
}

pub struct PricingService {
    catalog: Arc<dyn CatalogSource>,
    clients: Arc<dyn ClientDirectory>,
    tax_rates: Arc<dyn TaxRateLookup>,
}

impl PricingService {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        clients: Arc<dyn ClientDirectory>,
        tax_rates: Arc<dyn TaxRateLookup>,
    ) -> Self {
        Self {
            catalog,
            clients,
            tax_rates,
        }
    }

    pub fn clients(&self) -> &Arc<dyn ClientDirectory> {
        &self.clients
    }

    pub async fn catalog(&self, owner_id: UserId) -> Result<Catalog, DispatchError> {
        Ok(self.catalog.load(owner_id).await?)
    }

    /// Add or replace an entry in the owner's catalog.
    ///
    /// Documents that already copied the entry keep their values.
    pub async fn save_catalog_entry(
        &self,
        owner_id: UserId,
        entry: CatalogEntry,
    ) -> Result<(), DispatchError> {
        if entry.name.trim().is_empty() {
            return Err(DomainError::validation("catalog entry name is required").into());
        }
        if entry.unit_price < Decimal::ZERO {
            return Err(DomainError::validation("unit price must not be negative").into());
        }
        if entry.unit_price > MAX_LINE_TOTAL {
            return Err(DomainError::validation("amount too large").into());
        }
        Ok(self.catalog.save(owner_id, entry).await?)
    }

    /// The owner's client, or not-found.
    pub async fn client(
        &self,
        owner_id: UserId,
        client_id: ClientId,
    ) -> Result<ClientProfile, DispatchError> {
        self.clients
            .find(owner_id, client_id)
            .await?
            .ok_or(DispatchError::NotFound)
    }

    /// Tax rate for a client: the explicit rate when given, otherwise the
    /// regional rate of the client's location, otherwise zero.
    pub fn tax_rate_for(&self, client: &ClientProfile, explicit: Option<TaxRate>) -> TaxRate {
        explicit
            .or_else(|| {
                self.tax_rates
                    .rate_for(&client.country, client.province.as_deref())
            })
            .unwrap_or(TaxRate::ZERO)
    }

    /// Price items for a document addressed to `client_id`.
    ///
    /// `existing` are the items the document already carries; they keep
    /// references to catalog entries that were retired since.
    pub async fn price_for_client(
        &self,
        owner_id: UserId,
        client_id: ClientId,
        inputs: &[LineItemInput],
        explicit_rate: Option<TaxRate>,
        existing: &[LineItem],
    ) -> Result<PricedItems, DispatchError> {
        let client = self.client(owner_id, client_id).await?;
        let tax_rate = self.tax_rate_for(&client, explicit_rate);
        self.price(owner_id, inputs, tax_rate, existing).await
    }

    /// Totals for an unsaved item list.
    ///
    /// With a client the rate resolves as for a saved document; without one
    /// only the explicit rate applies.
    pub async fn preview(
        &self,
        owner_id: UserId,
        client_id: Option<ClientId>,
        inputs: &[LineItemInput],
        explicit_rate: Option<TaxRate>,
    ) -> Result<PricedItems, DispatchError> {
        match client_id {
            Some(client_id) => {
                self.price_for_client(owner_id, client_id, inputs, explicit_rate, &[])
                    .await
            }
            None => {
                self.price(owner_id, inputs, explicit_rate.unwrap_or(TaxRate::ZERO), &[])
                    .await
            }
        }
    }

    async fn price(
        &self,
        owner_id: UserId,
        inputs: &[LineItemInput],
        tax_rate: TaxRate,
        existing: &[LineItem],
    ) -> Result<PricedItems, DispatchError> {
        let catalog = self.catalog.load(owner_id).await?;
        let items = resolve_items(inputs, &catalog, existing).map_err(DispatchError::from)?;
        let totals = compute_aggregates(&items, tax_rate);

        Ok(PricedItems {
            items,
            tax_rate,
            totals,
        })
    }
}

/// Reject an empty item list with a validation error.
pub(crate) fn require_items(inputs: &[LineItemInput], document: &str) -> Result<(), DispatchError> {
    if inputs.is_empty() {
        return Err(DomainError::validation(format!("{document} needs at least one line item")).into());
    }
    Ok(())
}
