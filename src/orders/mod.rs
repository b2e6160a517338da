pub mod draft;
pub mod error;
pub mod models;
pub mod price_calculator;
pub mod service;
pub mod status_machine;

pub use draft::*;
pub use error::*;
pub use models::*;
pub use price_calculator::*;
pub use service::*;
pub use status_machine::*;

#[cfg(test)]
mod tests;
