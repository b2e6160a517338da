//! Order pricing and freight computation
//!
//! Money arithmetic, weight-banded freight tariffs, an order draft that
//! recomputes its totals on every edit, and an order session that wires the
//! draft to customer, product, tariff and order-storage services.

pub mod collaborators;
pub mod config;
pub mod freight;
pub mod money;
pub mod orders;
pub mod search;
pub mod telemetry;

pub use config::{ConfigError, EngineConfig};
pub use freight::{FreightTariff, TariffError};
pub use money::{CurrencyFormat, Money};
pub use orders::{OrderDraft, OrderSession, PriceCalculator, SessionError, SessionResult, Totals};
