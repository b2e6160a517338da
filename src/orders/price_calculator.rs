use rust_decimal::Decimal;

use crate::freight::FreightTariff;
use crate::money::Money;
use crate::orders::{LineItem, Totals};

/// Service for calculating line totals, weights, freight and order totals
///
/// Every function is pure; an order draft calls them after each mutation.
/// Results are `None` when an intermediate amount does not fit in a Decimal.
pub struct PriceCalculator;

impl PriceCalculator {
    /// Calculate the total for one line item
    ///
    /// # Arguments
    /// * `unit_price` - Price per unit
    /// * `quantity` - Units ordered
    ///
    /// # Returns
    /// `unit_price × quantity`, rounded to cents
    pub fn line_total(unit_price: Money, quantity: Decimal) -> Option<Money> {
        unit_price.multiply(quantity)
    }

    /// Sum of line totals; zero for no items
    pub fn subtotal(items: &[LineItem]) -> Option<Money> {
        items.iter().try_fold(Money::ZERO, |sum, item| {
            sum.checked_add(Self::line_total(item.unit_price, item.quantity)?)
        })
    }

    /// Sum of unit weight × quantity over all items
    pub fn total_weight(items: &[LineItem]) -> Option<Decimal> {
        items
            .iter()
            .try_fold(Decimal::ZERO, |sum, item| sum.checked_add(item.weight()?))
    }

    /// Freight for the order; zero when the customer has no tariff
    pub fn freight(tariff: Option<&FreightTariff>, total_weight: Decimal) -> Option<Money> {
        match tariff {
            Some(tariff) => tariff.price(total_weight),
            None => Some(Money::ZERO),
        }
    }

    /// Discount taken off the subtotal for a percentage in 0..=100
    pub fn discount_amount(subtotal: Money, discount_percent: Decimal) -> Option<Money> {
        subtotal.multiply(discount_percent.checked_div(Decimal::ONE_HUNDRED)?)
    }

    /// Calculate the amount due
    ///
    /// # Arguments
    /// * `items` - Line items of the order
    /// * `discount_percent` - Order-level discount, 0..=100
    /// * `freight` - Freight already computed for the order
    ///
    /// # Returns
    /// `subtotal - discount + freight`, never below zero
    pub fn grand_total(
        items: &[LineItem],
        discount_percent: Decimal,
        freight: Money,
    ) -> Option<Money> {
        let subtotal = Self::subtotal(items)?;
        Self::compose(subtotal, Self::discount_amount(subtotal, discount_percent)?, freight)
    }

    /// Full breakdown of an order's derived figures
    pub fn totals(
        items: &[LineItem],
        discount_percent: Decimal,
        tariff: Option<&FreightTariff>,
    ) -> Option<Totals> {
        let subtotal = Self::subtotal(items)?;
        let total_weight = Self::total_weight(items)?;
        let freight = Self::freight(tariff, total_weight)?;
        let discount_amount = Self::discount_amount(subtotal, discount_percent)?;

        Some(Totals {
            subtotal,
            discount_amount,
            total_weight,
            freight,
            grand_total: Self::compose(subtotal, discount_amount, freight)?,
        })
    }

    fn compose(subtotal: Money, discount_amount: Money, freight: Money) -> Option<Money> {
        let due = subtotal.checked_sub(discount_amount)?.checked_add(freight)?;
        Some(due.max(Money::ZERO))
    }
}
