//! Error types for ledger operations.

use thiserror::Error;

use crate::Coins;
use crate::model::{AccountId, LeadId, TxId};

/// Top-level error returned by [`Ledger`](super::Ledger) operations and
/// the bonus propagation flow.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("credit failed: {0}")]
    Credit(#[from] CreditError),

    #[error("debit failed: {0}")]
    Debit(#[from] DebitError),

    #[error("withdrawal failed: {0}")]
    Withdrawal(#[from] WithdrawalError),

    #[error("lock failed: {0}")]
    Grant(#[from] GrantError),

    #[error("conversion failed: {0}")]
    Convert(#[from] ConvertError),

    #[error("{0}")]
    Directory(#[from] crate::directory::DirectoryError),

    #[error("{0}")]
    Config(#[from] ConfigError),
}

/// Error during a credit-class posting.
#[derive(Debug, Error)]
pub enum CreditError {
    #[error("amount must be positive")]
    ZeroAmount,
}

/// Error during a debit.
#[derive(Debug, Error)]
pub enum DebitError {
    #[error("amount must be positive")]
    ZeroAmount,

    #[error("insufficient balance for account {account}: available {available}, requested {requested}")]
    InsufficientBalance {
        account: AccountId,
        available: Coins,
        requested: Coins,
    },
}

/// Error during the withdrawal-request lifecycle.
#[derive(Debug, Error)]
pub enum WithdrawalError {
    #[error("amount must be positive")]
    ZeroAmount,

    #[error("transaction {0} not found")]
    TxNotFound(TxId),

    #[error("transaction {0} is not a withdrawal request")]
    NotAWithdrawal(TxId),

    #[error("transaction {0} is not pending")]
    NotPending(TxId),

    #[error("account {0} has no pending withdrawal request")]
    NoPendingRequest(AccountId),

    #[error("insufficient balance for account {account}: available {available}, requested {requested}")]
    InsufficientBalance {
        account: AccountId,
        available: Coins,
        requested: Coins,
    },
}

/// Error while locking a referral grant. Unlocking never errors: the
/// no-grant case is reported as `None`.
#[derive(Debug, Error)]
pub enum GrantError {
    #[error("amount must be positive")]
    ZeroAmount,

    #[error("account {upline} already holds a locked grant for referred account {referred}")]
    AlreadyLocked {
        upline: AccountId,
        referred: AccountId,
    },
}

/// Error raised by the lead-conversion flow. These are hard failures:
/// no money moves when one is returned from the resolution steps.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("lead {0} not found")]
    LeadNotFound(LeadId),

    #[error("lead {0} is already converted")]
    AlreadyConverted(LeadId),

    #[error("lead {0} already exists")]
    DuplicateLead(LeadId),

    #[error("referrer account {0} not found")]
    ReferrerNotFound(AccountId),

    #[error("{0}")]
    Config(#[from] ConfigError),
}

/// Error looking up an injected configuration value.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration for key \"{0}\" not found")]
    Missing(&'static str),

    #[error("configuration for key \"{0}\" has the wrong type")]
    TypeMismatch(&'static str),
}
