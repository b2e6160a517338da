pub mod error;
pub mod tariff;

pub use error::*;
pub use tariff::*;
