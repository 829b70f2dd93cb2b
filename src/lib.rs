pub mod coins;
pub mod config;
pub mod csv;
pub mod directory;
pub mod driver;
pub mod engine;
pub mod model;
pub mod referral;
pub mod schedule;

pub use coins::Coins;
pub use config::{ConfigStore, ConfigValue, InMemoryConfig, Valuation};
pub use directory::Directory;
pub use engine::{Ledger, WalletError};
pub use model::{AccountId, LeadId, Role, Transaction, TxId, TxKind, TxStatus};
pub use referral::{BonusEngine, Conversion, ConversionInput};
pub use schedule::{SweepReport, release_date, spawn_monthly_sweep};
