//! Stream-driven operation loop.
//!
//! The driver wires the ledger, directory, configuration and bonus
//! engine together and applies a stream of replay operations. Any
//! failed operation is logged and skipped; the stream keeps going.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::Coins;
use crate::config::{ConfigStore, ConfigValue, InMemoryConfig};
use crate::directory::Directory;
use crate::engine::{Ledger, WalletError, WalletSnapshot, WithdrawalError};
use crate::model::{AccountId, LeadId, ProductId, Role, Transaction};
use crate::referral::{BonusEngine, ConversionInput};

/// One replayable ledger operation.
#[derive(Debug, Clone)]
pub enum Op {
    Config {
        key: String,
        value: ConfigValue,
    },
    Enroll {
        account: AccountId,
        upline: Option<AccountId>,
    },
    Role {
        account: AccountId,
        role: Role,
    },
    Credit {
        account: AccountId,
        amount: Coins,
    },
    Debit {
        account: AccountId,
        amount: Coins,
    },
    Withdraw {
        account: AccountId,
        amount: Coins,
    },
    /// Approve the account's oldest pending withdrawal, optionally
    /// settling a different final amount.
    Approve {
        account: AccountId,
        amount: Option<Coins>,
    },
    /// Reject the account's oldest pending withdrawal.
    Reject {
        account: AccountId,
    },
    Lead {
        lead: LeadId,
        referrer: AccountId,
    },
    Convert {
        lead: LeadId,
        product: ProductId,
        sale_amount: Coins,
        immediate: bool,
    },
    Sweep {
        date: NaiveDate,
    },
}

impl Op {
    fn name(&self) -> &'static str {
        match self {
            Op::Config { .. } => "config",
            Op::Enroll { .. } => "enroll",
            Op::Role { .. } => "role",
            Op::Credit { .. } => "credit",
            Op::Debit { .. } => "debit",
            Op::Withdraw { .. } => "withdraw",
            Op::Approve { .. } => "approve",
            Op::Reject { .. } => "reject",
            Op::Lead { .. } => "lead",
            Op::Convert { .. } => "convert",
            Op::Sweep { .. } => "sweep",
        }
    }
}

/// Applies replay operations against a freshly wired engine stack.
pub struct Driver {
    config: Arc<InMemoryConfig>,
    engine: BonusEngine,
}

impl Driver {
    pub fn new() -> Self {
        let ledger = Arc::new(Ledger::new());
        let directory = Arc::new(Directory::new());
        let config = Arc::new(InMemoryConfig::new());
        let engine = BonusEngine::new(ledger, directory, config.clone());
        Self { config, engine }
    }

    pub fn engine(&self) -> &BonusEngine {
        &self.engine
    }

    /// Run the driver over the given operation stream
    pub async fn run(&self, mut stream: impl Stream<Item = Op> + Unpin) {
        while let Some(op) = stream.next().await {
            // a failed operation should not stop the replay
            let _ = self.apply(op).await;
        }
    }

    /// Apply a single operation, logging the outcome.
    pub async fn apply(&self, op: Op) -> Result<(), WalletError> {
        let name = op.name();
        let result = self.dispatch(op).await;
        match &result {
            Ok(()) => info!("{name} applied"),
            Err(reason) => info!(%reason, "{name} skipped"),
        }
        result
    }

    async fn dispatch(&self, op: Op) -> Result<(), WalletError> {
        match op {
            Op::Config { key, value } => {
                self.config.set(&key, value);
                Ok(())
            }
            Op::Enroll { account, upline } => {
                self.engine.enroll(account, upline).await.map(drop)
            }
            Op::Role { account, role } => {
                self.engine.directory().grant_role(account, role)?;
                Ok(())
            }
            Op::Credit { account, amount } => self
                .engine
                .ledger()
                .credit(account, crate::model::TxKind::Credit, amount, "Credit", None)
                .await
                .map(drop),
            Op::Debit { account, amount } => self
                .engine
                .ledger()
                .debit(account, amount, "Debit")
                .await
                .map(drop),
            Op::Withdraw { account, amount } => self
                .engine
                .ledger()
                .withdrawal_request(account, amount)
                .await
                .map(drop),
            Op::Approve { account, amount } => {
                let request = self.pending_request(account).await?;
                self.engine
                    .ledger()
                    .approve_withdrawal(request.id, amount)
                    .await
                    .map(drop)
            }
            Op::Reject { account } => {
                let request = self.pending_request(account).await?;
                self.engine
                    .ledger()
                    .reject_withdrawal(request.id)
                    .await
                    .map(drop)
            }
            Op::Lead { lead, referrer } => {
                self.engine.create_lead(lead, referrer).await.map(drop)
            }
            Op::Convert {
                lead,
                product,
                sale_amount,
                immediate,
            } => self
                .engine
                .convert(ConversionInput {
                    lead,
                    product,
                    sale_amount,
                    first_degree_bonus: None,
                    immediate_credit: immediate,
                })
                .await
                .map(drop),
            Op::Sweep { date } => {
                self.engine.ledger().run_sweep(date).await;
                Ok(())
            }
        }
    }

    async fn pending_request(&self, account: AccountId) -> Result<Transaction, WalletError> {
        self.engine
            .ledger()
            .withdrawal_requests()
            .await
            .into_iter()
            .find(|r| r.account == account)
            .map(|r| r.tx)
            .ok_or_else(|| WithdrawalError::NoPendingRequest(account).into())
    }

    /// Final balances of every wallet, ordered by account.
    pub async fn snapshot(&self) -> Vec<WalletSnapshot> {
        self.engine.ledger().snapshot().await
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}
