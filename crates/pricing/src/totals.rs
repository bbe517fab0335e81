use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use lumenr_core::ValueObject;

use crate::line_item::LineItem;
use crate::tax::TaxRate;

/// Money is stored with two decimal places once rounded.
pub const MONEY_SCALE: u32 = 2;

/// Derived document aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl ValueObject for Totals {}

impl Totals {
    /// Check that these totals are exactly what `items` and `tax_rate` produce.
    pub fn matches(&self, items: &[LineItem], tax_rate: TaxRate) -> bool {
        *self == compute_aggregates(items, tax_rate)
    }
}

/// Round half-up (away from zero at the midpoint) to cents.
///
/// The result always carries exactly two decimal places, so `32.5` becomes
/// `32.50`.
pub fn round_money(amount: Decimal) -> Decimal {
    let mut rounded =
        amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}

/// Compute subtotal, tax and total for a list of items.
///
/// Line totals are summed unrounded; rounding happens once, when the tax is
/// computed. Every line total is at most
/// [`MAX_LINE_TOTAL`](crate::line_item::MAX_LINE_TOTAL) and the rate at
/// most 100 %, so none of the sums can leave `Decimal`'s range.
pub fn compute_aggregates(items: &[LineItem], tax_rate: TaxRate) -> Totals {
    let subtotal: Decimal = items.iter().map(LineItem::line_total).sum();
    let tax = round_money(subtotal * tax_rate.percent() / Decimal::ONE_HUNDRED);

    Totals {
        subtotal,
        tax,
        total: subtotal + tax,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line_item::{ItemKind, LineItemId};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn item(quantity: u32, unit_price: Decimal) -> LineItem {
        LineItem::priced(
            LineItemId::new(),
            ItemKind::Product,
            None,
            "Item",
            "",
            quantity,
            unit_price,
        )
        .unwrap()
    }

    fn rate(percent: Decimal) -> TaxRate {
        TaxRate::new(percent).unwrap()
    }

    #[test]
    fn ontario_example() {
        let items = vec![item(2, dec!(100.00)), item(1, dec!(50.00))];

        let totals = compute_aggregates(&items, rate(dec!(13)));

        assert_eq!(totals.subtotal, dec!(250.00));
        assert_eq!(totals.tax, dec!(32.50));
        assert_eq!(totals.total, dec!(282.50));
    }

    #[test]
    fn empty_list_is_all_zero() {
        let totals = compute_aggregates(&[], rate(dec!(13)));
        assert_eq!(totals, Totals::default());
    }

    #[test]
    fn tax_rounds_half_up() {
        // 0.125 * 100 / 100 = 0.125 -> 0.13
        let totals = compute_aggregates(&[item(1, dec!(0.125))], rate(dec!(100)));
        assert_eq!(totals.tax, dec!(0.13));

        // 10.05 * 5% = 0.5025 -> 0.50
        let totals = compute_aggregates(&[item(1, dec!(10.05))], rate(dec!(5)));
        assert_eq!(totals.tax, dec!(0.50));
    }

    #[test]
    fn rounded_money_always_shows_cents() {
        assert_eq!(round_money(dec!(32.5)).to_string(), "32.50");
        assert_eq!(round_money(dec!(4.998)).to_string(), "5.00");
        assert_eq!(round_money(Decimal::ZERO).to_string(), "0.00");
    }

    #[test]
    fn fractional_rate_is_supported() {
        // Quebec: 14.975% of 100 = 14.975 -> 14.98
        let totals = compute_aggregates(&[item(1, dec!(100))], rate(dec!(14.975)));
        assert_eq!(totals.tax, dec!(14.98));
        assert_eq!(totals.total, dec!(114.98));
    }

    #[test]
    fn line_totals_are_not_rounded_before_summing() {
        // 3 x 0.005 = 0.015 each; rounding per line would give 0.02 + 0.02.
        let items = vec![item(3, dec!(0.005)), item(3, dec!(0.005))];
        let totals = compute_aggregates(&items, TaxRate::ZERO);
        assert_eq!(totals.subtotal, dec!(0.030));
    }

    #[test]
    fn largest_lines_at_full_rate_stay_in_range() {
        let line = item(1, crate::line_item::MAX_LINE_TOTAL);
        let items = vec![line; 1_000];

        let totals = compute_aggregates(&items, rate(dec!(100)));

        assert_eq!(totals.subtotal, dec!(1_000_000_000_000_000_000));
        assert_eq!(totals.total, dec!(2_000_000_000_000_000_000));
    }

    #[test]
    fn matches_detects_tampered_totals() {
        let items = vec![item(2, dec!(100))];
        let mut totals = compute_aggregates(&items, rate(dec!(13)));
        assert!(totals.matches(&items, rate(dec!(13))));

        totals.total = dec!(1);
        assert!(!totals.matches(&items, rate(dec!(13))));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 500,
            ..ProptestConfig::default()
        })]

        /// Property: subtotal is the sum of line totals and total = subtotal + tax.
        #[test]
        fn aggregate_invariant_holds(
            lines in prop::collection::vec((1u32..1_000, 0i64..10_000_000), 0..20),
            rate_bp in 0i64..10_000,
        ) {
            let items: Vec<_> = lines
                .iter()
                .map(|(q, cents)| item(*q, Decimal::new(*cents, 2)))
                .collect();
            let rate = TaxRate::new(Decimal::new(rate_bp, 2)).unwrap();

            let totals = compute_aggregates(&items, rate);

            let expected_subtotal: Decimal = items.iter().map(|i| i.line_total()).sum();
            prop_assert_eq!(totals.subtotal, expected_subtotal);
            prop_assert_eq!(totals.total, totals.subtotal + totals.tax);
            prop_assert!(totals.tax.scale() <= MONEY_SCALE);
        }

        /// Property: recomputing an unchanged list yields identical totals.
        #[test]
        fn recompute_is_idempotent(
            lines in prop::collection::vec((1u32..100, 0i64..1_000_000), 0..10),
            rate_bp in 0i64..3_000,
        ) {
            let items: Vec<_> = lines
                .iter()
                .map(|(q, cents)| item(*q, Decimal::new(*cents, 2)))
                .collect();
            let rate = TaxRate::new(Decimal::new(rate_bp, 2)).unwrap();

            prop_assert_eq!(compute_aggregates(&items, rate), compute_aggregates(&items, rate));
        }
    }
}
