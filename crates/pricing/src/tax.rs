//! Tax rates and regional rate lookup.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use lumenr_core::{DomainError, DomainResult};

/// A tax rate expressed as a percentage (13 means 13 %).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct TaxRate(Decimal);

impl TaxRate {
    pub const ZERO: TaxRate = TaxRate(Decimal::ZERO);

    pub fn new(percent: Decimal) -> DomainResult<Self> {
        if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
            return Err(DomainError::validation(format!(
                "tax rate must be between 0 and 100 percent (got {percent})"
            )));
        }
        Ok(Self(percent.normalize()))
    }

    pub fn percent(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for TaxRate {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        TaxRate::new(value)
    }
}

impl From<TaxRate> for Decimal {
    fn from(value: TaxRate) -> Self {
        value.0
    }
}

impl core::fmt::Display for TaxRate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Resolve the applicable sales tax for a client's location.
///
/// `None` means no rate is known for that region.
pub trait TaxRateLookup: Send + Sync {
    fn rate_for(&self, country: &str, province: Option<&str>) -> Option<TaxRate>;
}

impl<T> TaxRateLookup for std::sync::Arc<T>
where
    T: TaxRateLookup + ?Sized,
{
    fn rate_for(&self, country: &str, province: Option<&str>) -> Option<TaxRate> {
        (**self).rate_for(country, province)
    }
}

/// Combined GST/HST/PST/QST rates for Canadian provinces and territories.
///
/// Only Canada is covered; any other country resolves to `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProvincialTaxTable;

/// (code, full name, rate in thousandths of a percent)
const CANADIAN_RATES: &[(&str, &str, i64)] = &[
    ("AB", "alberta", 5_000),
    ("BC", "british columbia", 12_000),
    ("MB", "manitoba", 12_000),
    ("NB", "new brunswick", 15_000),
    ("NL", "newfoundland and labrador", 15_000),
    ("NS", "nova scotia", 14_000),
    ("NT", "northwest territories", 5_000),
    ("NU", "nunavut", 5_000),
    ("ON", "ontario", 13_000),
    ("PE", "prince edward island", 15_000),
    ("QC", "quebec", 14_975),
    ("SK", "saskatchewan", 11_000),
    ("YT", "yukon", 5_000),
];

impl ProvincialTaxTable {
    fn is_canada(country: &str) -> bool {
        matches!(
            country.trim().to_ascii_lowercase().as_str(),
            "ca" | "can" | "canada"
        )
    }
}

impl TaxRateLookup for ProvincialTaxTable {
    fn rate_for(&self, country: &str, province: Option<&str>) -> Option<TaxRate> {
        if !Self::is_canada(country) {
            return None;
        }
        let province = province?.trim().to_ascii_lowercase();

        CANADIAN_RATES
            .iter()
            .find(|(code, name, _)| code.eq_ignore_ascii_case(&province) || *name == province)
            .map(|(_, _, milli)| TaxRate(Decimal::new(*milli, 3).normalize()))
    }
}
