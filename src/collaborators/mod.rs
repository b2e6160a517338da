// External collaborators
//
// Contracts the order engine consumes but does not implement: customer and
// product lookups, freight tariffs, order storage and document export. The
// session talks to them only through these traits.

pub mod memory;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::{Validate, ValidationError};

use crate::freight::FreightTariff;
use crate::money::Money;
use crate::orders::{CustomerId, OrderId, OrderPayload, ProductId, StoredOrder};

/// Failure of a read-only lookup (customer, product, tariff)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LookupError {
    #[error("Lookup service unavailable: {0}")]
    Unavailable(String),

    #[error("Customer not found: {0}")]
    CustomerNotFound(CustomerId),

    #[error("Invalid lookup response: {0}")]
    InvalidResponse(String),
}

/// Failure reported by order storage, surfaced verbatim to the caller
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    #[error("Order storage unreachable: {0}")]
    Unreachable(String),

    #[error("Order not found: {0}")]
    NotFound(OrderId),

    #[error("Order rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExportError {
    #[error("Document export failed: {0}")]
    Failed(String),
}

/// Customer as returned by the customer directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    #[validate(length(min = 1, message = "Customer name must not be empty"))]
    pub name: String,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    #[validate(custom = "validate_discount_percent")]
    pub discount_percent: Option<Decimal>,
}

/// Product as returned by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    #[validate(length(min = 1, message = "Product name must not be empty"))]
    pub name: String,
    pub unit_price: Money,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub unit_weight: Decimal,
    pub active: bool,
}

pub fn validate_discount_percent(percent: &Decimal) -> Result<(), ValidationError> {
    if *percent < Decimal::ZERO || *percent > Decimal::ONE_HUNDRED {
        Err(ValidationError::new("discount_out_of_range"))
    } else {
        Ok(())
    }
}

#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn find_customer(&self, id: CustomerId) -> Result<Customer, LookupError>;

    /// Customers whose name starts with `prefix`, in directory order
    async fn search_customers(&self, prefix: &str) -> Result<Vec<Customer>, LookupError>;
}

#[async_trait]
pub trait FreightTariffLookup: Send + Sync {
    /// The customer's tariff, or `None` when the customer has no tariff
    async fn tariff_for(&self, customer_id: CustomerId) -> Result<Option<FreightTariff>, LookupError>;
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Products whose name starts with `prefix`, active or not
    async fn search_products(&self, prefix: &str) -> Result<Vec<Product>, LookupError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create(&self, payload: &OrderPayload) -> Result<OrderId, StorageError>;

    async fn update(&self, id: OrderId, payload: &OrderPayload) -> Result<(), StorageError>;

    async fn fetch(&self, id: OrderId) -> Result<StoredOrder, StorageError>;
}

#[async_trait]
pub trait DocumentExporter: Send + Sync {
    async fn generate_pdf(&self, order_id: OrderId) -> Result<Vec<u8>, ExportError>;
}
