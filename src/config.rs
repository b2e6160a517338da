// Engine configuration
//
// Read from the environment (and a `.env` file when present). Every setting
// has a default; a value that is set but malformed is an error.

use std::time::Duration;
use thiserror::Error;

use crate::money::CurrencyFormat;
use crate::search::{MIN_DEBOUNCE, MIN_QUERY_CHARS};

pub const DEBOUNCE_VAR: &str = "ORDER_SEARCH_DEBOUNCE_MS";
pub const MIN_CHARS_VAR: &str = "ORDER_SEARCH_MIN_CHARS";
pub const CURRENCY_SYMBOL_VAR: &str = "ORDER_CURRENCY_SYMBOL";
pub const THOUSANDS_SEPARATOR_VAR: &str = "ORDER_CURRENCY_THOUSANDS_SEPARATOR";
pub const DECIMAL_SEPARATOR_VAR: &str = "ORDER_CURRENCY_DECIMAL_SEPARATOR";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var} must be a whole number, got {value:?}")]
    NotANumber { var: &'static str, value: String },

    #[error("{var} must be at least {minimum}, got {value}")]
    BelowMinimum {
        var: &'static str,
        minimum: u64,
        value: u64,
    },

    #[error("{var} must be a single character, got {value:?}")]
    NotASeparator { var: &'static str, value: String },

    #[error("{var} must not be empty")]
    Empty { var: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub search_debounce: Duration,
    pub search_min_chars: usize,
    pub currency: CurrencyFormat,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            search_debounce: MIN_DEBOUNCE,
            search_min_chars: MIN_QUERY_CHARS,
            currency: CurrencyFormat::default(),
        }
    }
}

impl EngineConfig {
    /// Load from the process environment, reading `.env` first
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let debounce_ms = match lookup(DEBOUNCE_VAR) {
            Some(value) => parse_at_least(DEBOUNCE_VAR, &value, MIN_DEBOUNCE.as_millis() as u64)?,
            None => defaults.search_debounce.as_millis() as u64,
        };

        let min_chars = match lookup(MIN_CHARS_VAR) {
            Some(value) => parse_at_least(MIN_CHARS_VAR, &value, MIN_QUERY_CHARS as u64)? as usize,
            None => defaults.search_min_chars,
        };

        let mut currency = defaults.currency;
        if let Some(symbol) = lookup(CURRENCY_SYMBOL_VAR) {
            let symbol = symbol.trim();
            if symbol.is_empty() {
                return Err(ConfigError::Empty {
                    var: CURRENCY_SYMBOL_VAR,
                });
            }
            currency.symbol = symbol.to_string();
        }
        if let Some(value) = lookup(THOUSANDS_SEPARATOR_VAR) {
            currency.thousands_separator = parse_separator(THOUSANDS_SEPARATOR_VAR, &value)?;
        }
        if let Some(value) = lookup(DECIMAL_SEPARATOR_VAR) {
            currency.decimal_separator = parse_separator(DECIMAL_SEPARATOR_VAR, &value)?;
        }

        Ok(Self {
            search_debounce: Duration::from_millis(debounce_ms),
            search_min_chars: min_chars,
            currency,
        })
    }
}

fn parse_at_least(var: &'static str, value: &str, minimum: u64) -> Result<u64, ConfigError> {
    let parsed: u64 = value.trim().parse().map_err(|_| ConfigError::NotANumber {
        var,
        value: value.to_string(),
    })?;
    if parsed < minimum {
        return Err(ConfigError::BelowMinimum {
            var,
            minimum,
            value: parsed,
        });
    }
    Ok(parsed)
}

fn parse_separator(var: &'static str, value: &str) -> Result<char, ConfigError> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(separator), None) => Ok(separator),
        _ => Err(ConfigError::NotASeparator {
            var,
            value: value.to_string(),
        }),
    }
}
