use rust_decimal::Decimal;

use crate::collaborators::{ExportError, LookupError, StorageError};
use crate::orders::ProductId;

/// Error types for edits and submission checks on an order draft
///
/// A rejected edit leaves the draft exactly as it was.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DraftError {
    #[error("Discount must be between 0 and 100, got {0}")]
    InvalidDiscount(Decimal),

    #[error("Quantity must not be negative, got {0}")]
    NegativeQuantity(Decimal),

    #[error("No line item at position {0}")]
    ItemIndexOutOfRange(usize),

    #[error("Product {0} is not in the order")]
    ProductNotInOrder(ProductId),

    #[error("Product {0} is inactive")]
    InactiveProduct(ProductId),

    #[error("A customer must be selected")]
    MissingCustomer,

    #[error("Order must contain at least one item")]
    EmptyOrder,

    #[error("Quantity must be positive for product {product_id}, got {quantity}")]
    NonPositiveQuantity { product_id: ProductId, quantity: Decimal },

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("Amount too large to compute")]
    AmountOverflow,
}

impl DraftError {
    /// Whether this is a submission check failure rather than a bad edit
    pub fn is_submission_error(&self) -> bool {
        matches!(
            self,
            DraftError::MissingCustomer | DraftError::EmptyOrder | DraftError::NonPositiveQuantity { .. }
        )
    }
}

/// Error types for order session operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Draft(#[from] DraftError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("Order has not been saved yet")]
    NotSaved,
}

pub type SessionResult<T> = Result<T, SessionError>;
