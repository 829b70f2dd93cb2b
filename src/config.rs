//! Injected configuration store.
//!
//! Bonus rates, flat amounts and the privileged upline role are looked
//! up by key at operation time. The store is passed into the engines
//! explicitly; tests swap in a pre-seeded [`InMemoryConfig`]. Absence
//! of a required key is a hard error for the calling operation.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::Coins;
use crate::engine::ConfigError;
use crate::model::Role;

/// Keys consumed by this crate.
pub mod keys {
    /// Flat signup bonus credited to a newly enrolled account.
    pub const JOINING_BONUS: &str = "JOINING_BONUS";
    /// Flat amount locked on the upline when a referred account enrolls.
    pub const LOCKED_REFERRAL_BONUS: &str = "LOCKED_REFERRAL_BONUS";
    /// Percent of the sale amount paid as the first-degree bonus when
    /// the caller does not supply one.
    pub const CONVERSION_RATE: &str = "CONVERSION_RATE";
    /// How the second-degree bonus is computed.
    pub const SECOND_DEGREE_VALUATION: &str = "SECOND_DEGREE_VALUATION";
    /// Role an upline must hold to receive the second-degree bonus.
    pub const SECOND_DEGREE_ROLE: &str = "SECOND_DEGREE_ROLE";
}

/// How a second-degree bonus is derived from a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Valuation {
    /// `sale × value / 100`.
    Percentage(u64),
    /// Flat amount per conversion.
    Fixed(Coins),
}

impl Valuation {
    pub fn apply(self, sale: Coins) -> Coins {
        match self {
            Valuation::Percentage(pct) => sale.percent(pct),
            Valuation::Fixed(amount) => amount,
        }
    }
}

/// A typed configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigValue {
    Amount(Coins),
    Rate(u64),
    Valuation(Valuation),
    Role(Role),
}

/// Named-value lookup contract consumed by the engines.
pub trait ConfigStore: Send + Sync {
    fn get(&self, key: &str) -> Option<ConfigValue>;
    fn set(&self, key: &str, value: ConfigValue);
    fn invalidate(&self, key: &str);

    fn amount(&self, key: &'static str) -> Result<Coins, ConfigError> {
        match self.get(key) {
            Some(ConfigValue::Amount(amount)) => Ok(amount),
            Some(_) => Err(ConfigError::TypeMismatch(key)),
            None => Err(ConfigError::Missing(key)),
        }
    }

    fn rate(&self, key: &'static str) -> Result<u64, ConfigError> {
        match self.get(key) {
            Some(ConfigValue::Rate(rate)) => Ok(rate),
            Some(_) => Err(ConfigError::TypeMismatch(key)),
            None => Err(ConfigError::Missing(key)),
        }
    }

    fn valuation(&self, key: &'static str) -> Result<Valuation, ConfigError> {
        match self.get(key) {
            Some(ConfigValue::Valuation(valuation)) => Ok(valuation),
            Some(_) => Err(ConfigError::TypeMismatch(key)),
            None => Err(ConfigError::Missing(key)),
        }
    }

    fn role(&self, key: &'static str) -> Result<Role, ConfigError> {
        match self.get(key) {
            Some(ConfigValue::Role(role)) => Ok(role),
            Some(_) => Err(ConfigError::TypeMismatch(key)),
            None => Err(ConfigError::Missing(key)),
        }
    }
}

/// In-memory configuration store.
#[derive(Default)]
pub struct InMemoryConfig {
    entries: RwLock<HashMap<String, ConfigValue>>,
}

impl InMemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for InMemoryConfig {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.entries.read().expect("config lock poisoned").get(key).copied()
    }

    fn set(&self, key: &str, value: ConfigValue) {
        self.entries
            .write()
            .expect("config lock poisoned")
            .insert(key.to_string(), value);
    }

    fn invalidate(&self, key: &str) {
        self.entries.write().expect("config lock poisoned").remove(key);
    }
}
