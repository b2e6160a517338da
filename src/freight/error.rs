// Error types for freight tariffs

use rust_decimal::Decimal;
use thiserror::Error;

/// Invalid freight tariff definition
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TariffError {
    /// Only one of bracket weight / bracket value was supplied
    #[error("Bracket weight and bracket value must be set together")]
    IncompleteBanding,

    #[error("Bracket weight must be positive, got {0}")]
    NonPositiveBracketWeight(Decimal),

    #[error("Minimum weight must be non-negative, got {0}")]
    NegativeMinimumWeight(Decimal),

    /// A monetary field (base value, bracket value) is below zero
    #[error("{field} must be non-negative")]
    NegativeAmount { field: &'static str },
}

impl TariffError {
    /// Stable machine-readable code, used for validator error reports
    pub fn code(&self) -> &'static str {
        match self {
            TariffError::IncompleteBanding => "incomplete_banding",
            TariffError::NonPositiveBracketWeight(_) => "non_positive_bracket_weight",
            TariffError::NegativeMinimumWeight(_) => "negative_minimum_weight",
            TariffError::NegativeAmount { .. } => "negative_amount",
        }
    }
}
