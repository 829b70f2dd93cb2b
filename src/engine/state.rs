use chrono::Utc;

use crate::Coins;
use crate::engine::error::GrantError;
use crate::model::{AccountId, LockedGrant, TxId};

/// The balance-holding record for one participant: spendable balance,
/// locked-bonus balance, locked grants and the ordered transaction log.
///
/// Invariants: `balance` never goes negative (debits are guarded by the
/// callers in [`Ledger`](super::Ledger)); `locked` always equals the sum
/// of currently locked grants; at most one locked grant exists per
/// referred account.
#[derive(Debug)]
pub struct Wallet {
    account: AccountId,
    balance: Coins,
    locked: Coins,
    grants: Vec<LockedGrant>,
    /// Insertion order is chronological order.
    txs: Vec<TxId>,
}

impl Wallet {
    pub fn new(account: AccountId) -> Self {
        Self {
            account,
            balance: Coins::ZERO,
            locked: Coins::ZERO,
            grants: Vec::new(),
            txs: Vec::new(),
        }
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn balance(&self) -> Coins {
        self.balance
    }

    pub fn locked(&self) -> Coins {
        self.locked
    }

    pub fn total(&self) -> Coins {
        self.balance + self.locked
    }

    pub fn grants(&self) -> &[LockedGrant] {
        &self.grants
    }

    pub fn txs(&self) -> &[TxId] {
        &self.txs
    }

    pub(crate) fn credit(&mut self, amount: Coins) {
        self.balance += amount;
    }

    /// Caller must have validated `balance >= amount`.
    pub(crate) fn debit(&mut self, amount: Coins) {
        self.balance -= amount;
    }

    pub(crate) fn record(&mut self, tx: TxId) {
        self.txs.push(tx);
    }

    /// Append a locked grant for `referred` and move `amount` into the
    /// locked bucket. Rejected while a locked grant for the same
    /// referred account exists.
    pub(crate) fn lock(&mut self, referred: AccountId, amount: Coins) -> Result<(), GrantError> {
        if self.grants.iter().any(|g| g.locked && g.referred == referred) {
            return Err(GrantError::AlreadyLocked {
                upline: self.account,
                referred,
            });
        }
        self.grants.push(LockedGrant::new(referred, amount));
        self.locked += amount;
        Ok(())
    }

    /// Release the most recent locked grant for `referred`, moving its
    /// amount from locked to spendable. Returns the released amount, or
    /// `None` when nothing is locked for that account.
    pub(crate) fn unlock(&mut self, referred: AccountId) -> Option<Coins> {
        let grant = self
            .grants
            .iter_mut()
            .rev()
            .find(|g| g.locked && g.referred == referred)?;

        grant.locked = false;
        grant.unlocked_at = Some(Utc::now());
        let amount = grant.amount;

        self.locked -= amount;
        self.balance += amount;
        Some(amount)
    }
}
