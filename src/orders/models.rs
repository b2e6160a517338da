use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;
use crate::orders::{DraftError, PriceCalculator};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Customer identifier assigned by the customer directory
    CustomerId
);
id_type!(
    /// Product identifier assigned by the catalog
    ProductId
);
id_type!(
    /// Order identifier assigned by order storage
    OrderId
);

/// Customer selected for a draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRef {
    pub id: CustomerId,
    pub name: String,
}

/// One product selection within an order draft
///
/// Identity is the product: a draft never holds two lines for the same product.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_weight: Decimal,
    line_total: Money,
}

impl LineItem {
    /// Fails with `AmountOverflow` when price × quantity does not fit
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        unit_price: Money,
        quantity: Decimal,
        unit_weight: Decimal,
    ) -> Result<Self, DraftError> {
        let mut item = Self {
            product_id,
            product_name: product_name.into(),
            unit_price,
            quantity,
            unit_weight,
            line_total: Money::ZERO,
        };
        item.refresh_total()?;
        Ok(item)
    }

    /// unit price × quantity, as of the last recompute
    pub fn line_total(&self) -> Money {
        self.line_total
    }

    /// unit weight × quantity, `None` on overflow
    pub fn weight(&self) -> Option<Decimal> {
        self.unit_weight.checked_mul(self.quantity)
    }

    pub(crate) fn refresh_total(&mut self) -> Result<(), DraftError> {
        self.line_total = PriceCalculator::line_total(self.unit_price, self.quantity)
            .ok_or(DraftError::AmountOverflow)?;
        Ok(())
    }
}

/// Derived figures of a draft, recomputed from scratch on every mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub subtotal: Money,
    pub discount_amount: Money,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_weight: Decimal,
    pub freight: Money,
    pub grand_total: Money,
}

/// Totals rendered for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayTotals {
    pub subtotal: String,
    pub discount_amount: String,
    pub freight: String,
    pub grand_total: String,
}

/// Order as handed to order storage on create/update
///
/// Monetary fields are plain numbers on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    pub customer_id: CustomerId,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_percent: Decimal,
    pub freight_value: Money,
    pub grand_total: Money,
    pub note: String,
    pub items: Vec<OrderPayloadItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayloadItem {
    pub product_id: ProductId,
    pub unit_price: Money,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    /// Per-line discount; always zero, the order-level percentage applies
    #[serde(with = "rust_decimal::serde::float")]
    pub discount: Decimal,
    /// Always zero, order storage derives weights itself
    #[serde(with = "rust_decimal::serde::float")]
    pub weight: Decimal,
}

/// Unit price as persisted: a number, or text already formatted for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriceValue {
    Amount(Money),
    Text(String),
}

impl PriceValue {
    pub fn to_money(&self) -> Money {
        match self {
            PriceValue::Amount(amount) => *amount,
            PriceValue::Text(text) => Money::parse(text),
        }
    }
}

/// Order as fetched from order storage, used to hydrate a draft in edit mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredOrder {
    pub id: OrderId,
    pub customer_id: CustomerId,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub discount_percent: Decimal,
    #[serde(default)]
    pub freight_value: Money,
    #[serde(default)]
    pub grand_total: Money,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub order_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled: bool,
    pub items: Vec<StoredOrderItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredOrderItem {
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: String,
    pub unit_price: PriceValue,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub weight: Decimal,
}

impl TryFrom<&StoredOrderItem> for LineItem {
    type Error = DraftError;

    fn try_from(item: &StoredOrderItem) -> Result<Self, Self::Error> {
        LineItem::new(
            item.product_id,
            item.product_name.clone(),
            item.unit_price.to_money(),
            item.quantity,
            item.weight,
        )
    }
}
