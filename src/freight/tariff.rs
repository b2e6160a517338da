// Freight tariff
//
// A customer's shipping rule: a base value plus an optional surcharge per
// weight bracket, optionally charged only on the weight above a minimum.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::freight::error::TariffError;
use crate::money::Money;

/// Shipping policy copied into an order draft when its customer is selected
///
/// Absence of both bracket fields means flat-rate shipping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_tariff_shape"))]
pub struct FreightTariff {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub base_value: Money,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub bracket_weight: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bracket_value: Option<Money>,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub minimum_weight: Option<Decimal>,
}

/// Usable banding rule: surcharge `value` per started bracket of `weight`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Banding {
    pub weight: Decimal,
    pub value: Money,
}

impl FreightTariff {
    /// Flat-rate tariff
    pub fn flat(base_value: Money) -> Self {
        Self {
            description: None,
            base_value,
            bracket_weight: None,
            bracket_value: None,
            minimum_weight: None,
        }
    }

    /// Weight-banded tariff, charged on gross weight until a minimum is set
    pub fn banded(
        base_value: Money,
        bracket_weight: Decimal,
        bracket_value: Money,
    ) -> Result<Self, TariffError> {
        let tariff = Self {
            bracket_weight: Some(bracket_weight),
            bracket_value: Some(bracket_value),
            ..Self::flat(base_value)
        };
        tariff.check()?;
        Ok(tariff)
    }

    /// Only charge brackets on the weight exceeding `minimum_weight`
    pub fn with_minimum_weight(mut self, minimum_weight: Decimal) -> Result<Self, TariffError> {
        self.minimum_weight = Some(minimum_weight);
        self.check()?;
        Ok(self)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Check the structural invariants of the tariff
    pub fn check(&self) -> Result<(), TariffError> {
        if self.base_value < Money::ZERO {
            return Err(TariffError::NegativeAmount { field: "base_value" });
        }

        match (self.bracket_weight, self.bracket_value) {
            (Some(weight), Some(value)) => {
                if weight <= Decimal::ZERO {
                    return Err(TariffError::NonPositiveBracketWeight(weight));
                }
                if value < Money::ZERO {
                    return Err(TariffError::NegativeAmount { field: "bracket_value" });
                }
            }
            (None, None) => {}
            _ => return Err(TariffError::IncompleteBanding),
        }

        if let Some(minimum) = self.minimum_weight {
            if minimum < Decimal::ZERO {
                return Err(TariffError::NegativeMinimumWeight(minimum));
            }
        }

        Ok(())
    }

    /// The banding rule, if this tariff has a usable one
    ///
    /// A missing field or a non-positive bracket weight means no banding.
    pub fn banding(&self) -> Option<Banding> {
        match (self.bracket_weight, self.bracket_value) {
            (Some(weight), Some(value)) if weight > Decimal::ZERO => Some(Banding { weight, value }),
            _ => None,
        }
    }

    /// Weight the bracket surcharge is charged on
    ///
    /// - minimum set and exceeded: the weight above the minimum
    /// - no minimum: the gross weight
    /// - minimum set but not exceeded: zero
    ///
    /// `None` on overflow, which only an unchecked negative minimum can cause.
    pub fn billable_weight(&self, total_weight: Decimal) -> Option<Decimal> {
        let billable = match self.minimum_weight {
            Some(minimum) if total_weight > minimum => total_weight.checked_sub(minimum)?,
            Some(_) => Decimal::ZERO,
            None => total_weight,
        };
        Some(billable.max(Decimal::ZERO))
    }

    /// Number of brackets charged; any started bracket counts as a full one
    ///
    /// `None` when the count does not fit in a Decimal (a tiny bracket weight
    /// against a large shipment).
    pub fn bracket_count(&self, total_weight: Decimal) -> Option<Decimal> {
        match self.banding() {
            Some(banding) => self
                .billable_weight(total_weight)?
                .checked_div(banding.weight)
                .map(|brackets| brackets.ceil()),
            None => Some(Decimal::ZERO),
        }
    }

    /// Freight for a shipment of `total_weight`, `None` on overflow
    pub fn price(&self, total_weight: Decimal) -> Option<Money> {
        let surcharge = match self.banding() {
            Some(banding) => banding.value.multiply(self.bracket_count(total_weight)?)?,
            None => Money::ZERO,
        };
        self.base_value.checked_add(surcharge)
    }
}

fn validate_tariff_shape(tariff: &FreightTariff) -> Result<(), ValidationError> {
    tariff.check().map_err(|err| {
        let mut error = ValidationError::new(err.code());
        error.message = Some(err.to_string().into());
        error
    })
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    /// Freight never decreases as weight grows
    #[test]
    fn prop_freight_is_monotonic_in_weight() {
        proptest!(|(
            base_cents in 0i64..=100_000,
            bracket_weight in 1i64..=5_000,
            bracket_cents in 0i64..=10_000,
            minimum in prop::option::of(0i64..=10_000),
            weight in 0i64..=100_000,
            extra in 0i64..=10_000
        )| {
            let mut tariff = FreightTariff::banded(
                Money::from_cents(base_cents),
                Decimal::from(bracket_weight),
                Money::from_cents(bracket_cents),
            ).unwrap();
            if let Some(minimum) = minimum {
                tariff = tariff.with_minimum_weight(Decimal::from(minimum)).unwrap();
            }

            let lighter = tariff.price(Decimal::from(weight)).unwrap();
            let heavier = tariff.price(Decimal::from(weight + extra)).unwrap();
            prop_assert!(heavier >= lighter);
            prop_assert!(lighter >= tariff.base_value);
        });
    }

    /// Surcharge equals ceil(billable / bracket) brackets
    #[test]
    fn prop_bracket_count_covers_billable_weight() {
        proptest!(|(bracket_weight in 1i64..=5_000, weight in 0i64..=100_000)| {
            let tariff = FreightTariff::banded(
                Money::ZERO,
                Decimal::from(bracket_weight),
                Money::from_cents(1),
            ).unwrap();
            let count = tariff.bracket_count(Decimal::from(weight)).unwrap();
            let bracket = Decimal::from(bracket_weight);
            prop_assert!(count * bracket >= Decimal::from(weight));
            prop_assert!((count - Decimal::ONE) * bracket < Decimal::from(weight) || count.is_zero());
        });
    }
}
