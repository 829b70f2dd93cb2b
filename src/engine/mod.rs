//! Wallet ledger engine.
//!
//! The ledger keeps one wallet per account and an append-only log of
//! transactions. It applies credits, debits and the withdrawal-request
//! lifecycle, and tracks locked referral grants. Wallets are created
//! lazily on the first financial event.
//!
//! Every balance-affecting operation serializes on the owning wallet's
//! lock; transaction status transitions happen only while that lock is
//! held, so a withdrawal approval can never race a concurrent credit or
//! the delayed-credit sweep on the same account.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{NaiveDate, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::Coins;
use crate::model::{AccountId, Transaction, TxId, TxKind, TxStatus};

mod state;
pub use state::Wallet;

mod error;
pub use error::{
    ConfigError, ConvertError, CreditError, DebitError, GrantError, WalletError, WithdrawalError,
};

/// How a transaction is recorded against a wallet. Balance mutation is
/// the caller's side of the bargain; `append` only writes the log.
pub(crate) struct Posting {
    pub kind: TxKind,
    pub amount: Coins,
    pub description: String,
    pub reference: Option<String>,
    pub status: TxStatus,
    pub realized: bool,
    pub scheduled_release: Option<NaiveDate>,
}

/// A pending withdrawal joined with its owning account, for the
/// administrative listing.
#[derive(Debug, Clone)]
pub struct WithdrawalRequest {
    pub account: AccountId,
    pub balance: Coins,
    pub tx: Transaction,
}

/// Point-in-time view of one wallet's balances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletSnapshot {
    pub account: AccountId,
    pub balance: Coins,
    pub locked: Coins,
    pub total: Coins,
}

/// The wallet ledger: per-account balance records plus the global
/// transaction log.
pub struct Ledger {
    pub(crate) wallets: RwLock<HashMap<AccountId, Arc<Mutex<Wallet>>>>,
    pub(crate) txs: RwLock<HashMap<TxId, Transaction>>,
    refs: RwLock<HashMap<String, TxId>>,
    next_tx: AtomicU64,
}

/// Public API
impl Ledger {
    pub fn new() -> Self {
        Self {
            wallets: RwLock::new(HashMap::new()),
            txs: RwLock::new(HashMap::new()),
            refs: RwLock::new(HashMap::new()),
            next_tx: AtomicU64::new(1),
        }
    }

    /// Apply a realized credit-class transaction to spendable balance.
    ///
    /// A `reference` seen before returns the original transaction
    /// without applying anything again.
    pub async fn credit(
        &self,
        account: AccountId,
        kind: TxKind,
        amount: Coins,
        description: impl Into<String>,
        reference: Option<String>,
    ) -> Result<Transaction, WalletError> {
        debug_assert!(kind.is_credit());
        if amount.is_zero() {
            return Err(CreditError::ZeroAmount.into());
        }

        let handle = self.wallet(account).await;
        let mut wallet = handle.lock().await;

        if let Some(reference) = &reference {
            if let Some(existing) = self.find_by_reference(reference).await {
                info!(account, reference = %reference, tx = existing.id, "credit already applied");
                return Ok(existing);
            }
        }

        wallet.credit(amount);
        let tx = self
            .append(
                &mut wallet,
                Posting {
                    kind,
                    amount,
                    description: description.into(),
                    reference,
                    status: TxStatus::Approved,
                    realized: true,
                    scheduled_release: None,
                },
            )
            .await;

        info!(account, tx = tx.id, amount = %amount, kind = ?kind, "credit applied");
        Ok(tx)
    }

    /// Debit spendable balance. Fails without side effects when the
    /// balance cannot cover the amount.
    pub async fn debit(
        &self,
        account: AccountId,
        amount: Coins,
        description: impl Into<String>,
    ) -> Result<Transaction, WalletError> {
        if amount.is_zero() {
            return Err(DebitError::ZeroAmount.into());
        }

        let handle = self.wallet(account).await;
        let mut wallet = handle.lock().await;

        if wallet.balance() < amount {
            return Err(DebitError::InsufficientBalance {
                account,
                available: wallet.balance(),
                requested: amount,
            }
            .into());
        }

        wallet.debit(amount);
        let tx = self
            .append(
                &mut wallet,
                Posting {
                    kind: TxKind::Debit,
                    amount,
                    description: description.into(),
                    reference: None,
                    status: TxStatus::Approved,
                    realized: true,
                    scheduled_release: None,
                },
            )
            .await;

        info!(account, tx = tx.id, amount = %amount, "debit applied");
        Ok(tx)
    }

    /// Record a user-initiated payout ask: a pending, unrealized debit.
    /// The balance is not pre-deducted; approval performs the actual
    /// check-and-apply.
    pub async fn withdrawal_request(
        &self,
        account: AccountId,
        amount: Coins,
    ) -> Result<Transaction, WalletError> {
        if amount.is_zero() {
            return Err(WithdrawalError::ZeroAmount.into());
        }

        let handle = self.wallet(account).await;
        let mut wallet = handle.lock().await;

        let tx = self
            .append(
                &mut wallet,
                Posting {
                    kind: TxKind::Debit,
                    amount,
                    description: "Withdrawal request from the user".to_string(),
                    reference: None,
                    status: TxStatus::Pending,
                    realized: false,
                    scheduled_release: None,
                },
            )
            .await;

        info!(account, tx = tx.id, amount = %amount, "withdrawal requested");
        Ok(tx)
    }

    /// Approve a pending withdrawal, deducting `final_amount` (the
    /// requested amount when `None`). On insufficient balance the
    /// request stays pending for retry or rejection.
    pub async fn approve_withdrawal(
        &self,
        tx_id: TxId,
        final_amount: Option<Coins>,
    ) -> Result<Transaction, WalletError> {
        let account = self.withdrawal_account(tx_id).await?;

        let handle = self.wallet(account).await;
        let mut wallet = handle.lock().await;
        let mut txs = self.txs.write().await;

        let tx = txs
            .get_mut(&tx_id)
            .ok_or(WithdrawalError::TxNotFound(tx_id))?;
        // re-check under the wallet lock: a concurrent approve/reject
        // may have transitioned it since the lookup above
        if tx.status != TxStatus::Pending {
            return Err(WithdrawalError::NotPending(tx_id).into());
        }

        let amount = final_amount.unwrap_or(tx.amount);
        if wallet.balance() < amount {
            return Err(WithdrawalError::InsufficientBalance {
                account,
                available: wallet.balance(),
                requested: amount,
            }
            .into());
        }

        wallet.debit(amount);
        tx.status = TxStatus::Approved;
        tx.realized = true;

        info!(account, tx = tx_id, amount = %amount, "withdrawal approved");
        Ok(tx.clone())
    }

    /// Reject a pending withdrawal. Terminal; no balance effect.
    pub async fn reject_withdrawal(&self, tx_id: TxId) -> Result<Transaction, WalletError> {
        let account = self.withdrawal_account(tx_id).await?;

        let handle = self.wallet(account).await;
        let _wallet = handle.lock().await;
        let mut txs = self.txs.write().await;

        let tx = txs
            .get_mut(&tx_id)
            .ok_or(WithdrawalError::TxNotFound(tx_id))?;
        if tx.status != TxStatus::Pending {
            return Err(WithdrawalError::NotPending(tx_id).into());
        }

        tx.status = TxStatus::Rejected;

        info!(account, tx = tx_id, "withdrawal rejected");
        Ok(tx.clone())
    }

    /// All pending withdrawal requests joined with the owning account's
    /// current balance.
    pub async fn withdrawal_requests(&self) -> Vec<WithdrawalRequest> {
        let pending: Vec<Transaction> = {
            let txs = self.txs.read().await;
            let mut pending: Vec<_> = txs
                .values()
                .filter(|t| t.is_withdrawal_request())
                .cloned()
                .collect();
            pending.sort_by_key(|t| t.id);
            pending
        };

        let mut requests = Vec::with_capacity(pending.len());
        for tx in pending {
            let balance = self.balance(tx.account).await;
            requests.push(WithdrawalRequest {
                account: tx.account,
                balance,
                tx,
            });
        }
        requests
    }

    /// Hold `amount` on the upline's wallet until `referred`'s first
    /// conversion releases it. Appends an unrealized audit transaction.
    pub async fn lock(
        &self,
        upline: AccountId,
        referred: AccountId,
        amount: Coins,
        note: impl Into<String>,
    ) -> Result<Transaction, WalletError> {
        if amount.is_zero() {
            return Err(GrantError::ZeroAmount.into());
        }

        let handle = self.wallet(upline).await;
        let mut wallet = handle.lock().await;

        wallet.lock(referred, amount)?;
        let tx = self
            .append(
                &mut wallet,
                Posting {
                    kind: TxKind::LockedReferralBonus,
                    amount,
                    description: note.into(),
                    reference: None,
                    status: TxStatus::Approved,
                    realized: false,
                    scheduled_release: None,
                },
            )
            .await;

        info!(upline, referred, amount = %amount, tx = tx.id, "referral bonus locked");
        Ok(tx)
    }

    /// Release the grant locked for `referred`, if any, moving its
    /// amount from locked to spendable balance. The no-grant case is an
    /// expected outcome, not an error.
    pub async fn unlock(&self, upline: AccountId, referred: AccountId) -> Option<Transaction> {
        let handle = self.existing_wallet(upline).await?;
        let mut wallet = handle.lock().await;

        let amount = wallet.unlock(referred)?;
        let tx = self
            .append(
                &mut wallet,
                Posting {
                    kind: TxKind::UnlockReferralBonus,
                    amount,
                    description: format!(
                        "Referral bonus unlocked for referred account {referred}"
                    ),
                    reference: None,
                    status: TxStatus::Approved,
                    realized: true,
                    scheduled_release: None,
                },
            )
            .await;

        info!(upline, referred, amount = %amount, tx = tx.id, "referral bonus unlocked");
        Some(tx)
    }

    /// Aggregate of currently locked grants for an account.
    pub async fn locked_total(&self, account: AccountId) -> Coins {
        match self.existing_wallet(account).await {
            Some(handle) => handle.lock().await.locked(),
            None => Coins::ZERO,
        }
    }

    pub async fn balance(&self, account: AccountId) -> Coins {
        match self.existing_wallet(account).await {
            Some(handle) => handle.lock().await.balance(),
            None => Coins::ZERO,
        }
    }

    /// One transaction by id.
    pub async fn transaction(&self, tx_id: TxId) -> Option<Transaction> {
        self.txs.read().await.get(&tx_id).cloned()
    }

    /// An account's transaction log in chronological order.
    pub async fn transactions(&self, account: AccountId) -> Vec<Transaction> {
        let Some(handle) = self.existing_wallet(account).await else {
            return Vec::new();
        };
        let ids: Vec<TxId> = handle.lock().await.txs().to_vec();
        let txs = self.txs.read().await;
        ids.iter().filter_map(|id| txs.get(id).cloned()).collect()
    }

    /// Balances of every wallet, ordered by account id.
    pub async fn snapshot(&self) -> Vec<WalletSnapshot> {
        let handles: Vec<Arc<Mutex<Wallet>>> =
            self.wallets.read().await.values().cloned().collect();

        let mut rows = Vec::with_capacity(handles.len());
        for handle in handles {
            let wallet = handle.lock().await;
            rows.push(WalletSnapshot {
                account: wallet.account(),
                balance: wallet.balance(),
                locked: wallet.locked(),
                total: wallet.total(),
            });
        }
        rows.sort_by_key(|r| r.account);
        rows
    }
}

/// Private API
impl Ledger {
    /// Wallet handle for `account`, created lazily on first use.
    pub(crate) async fn wallet(&self, account: AccountId) -> Arc<Mutex<Wallet>> {
        if let Some(handle) = self.wallets.read().await.get(&account) {
            return handle.clone();
        }
        let mut wallets = self.wallets.write().await;
        wallets
            .entry(account)
            .or_insert_with(|| Arc::new(Mutex::new(Wallet::new(account))))
            .clone()
    }

    async fn existing_wallet(&self, account: AccountId) -> Option<Arc<Mutex<Wallet>>> {
        self.wallets.read().await.get(&account).cloned()
    }

    async fn find_by_reference(&self, reference: &str) -> Option<Transaction> {
        let id = *self.refs.read().await.get(reference)?;
        self.txs.read().await.get(&id).cloned()
    }

    async fn withdrawal_account(&self, tx_id: TxId) -> Result<AccountId, WithdrawalError> {
        let txs = self.txs.read().await;
        let tx = txs.get(&tx_id).ok_or(WithdrawalError::TxNotFound(tx_id))?;
        if tx.kind != TxKind::Debit {
            return Err(WithdrawalError::NotAWithdrawal(tx_id));
        }
        Ok(tx.account)
    }

    /// Build a transaction and append it to the global log and the
    /// wallet's ordered reference list. Called with the wallet lock
    /// held, atomically with any balance mutation.
    pub(crate) async fn append(&self, wallet: &mut Wallet, posting: Posting) -> Transaction {
        let id = self.next_tx.fetch_add(1, Ordering::Relaxed);
        let tx = Transaction {
            id,
            account: wallet.account(),
            kind: posting.kind,
            amount: posting.amount,
            status: posting.status,
            realized: posting.realized,
            scheduled_release: posting.scheduled_release,
            description: posting.description,
            reference: posting.reference.clone(),
            created_at: Utc::now(),
        };

        if let Some(reference) = posting.reference {
            self.refs.write().await.insert(reference, id);
        }
        self.txs.write().await.insert(id, tx.clone());
        wallet.record(id);
        tx
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn credit(ledger: &Ledger, account: AccountId, amount: u64) -> Transaction {
        ledger
            .credit(account, TxKind::Credit, Coins::new(amount), "Credit", None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn credit_creates_wallet_and_increases_balance() {
        let ledger = Ledger::new();
        let tx = credit(&ledger, 1, 100).await;

        assert_eq!(ledger.balance(1).await, Coins::new(100));
        assert_eq!(tx.status, TxStatus::Approved);
        assert!(tx.realized);
    }

    #[tokio::test]
    async fn credit_accumulates_balance() {
        let ledger = Ledger::new();
        credit(&ledger, 1, 100).await;
        credit(&ledger, 1, 50).await;
        assert_eq!(ledger.balance(1).await, Coins::new(150));
    }

    #[tokio::test]
    async fn zero_credit_fails() {
        let ledger = Ledger::new();
        let result = ledger
            .credit(1, TxKind::Credit, Coins::ZERO, "Credit", None)
            .await;
        assert!(matches!(
            result,
            Err(WalletError::Credit(CreditError::ZeroAmount))
        ));
    }

    #[tokio::test]
    async fn credit_with_seen_reference_is_not_reapplied() {
        let ledger = Ledger::new();
        let first = ledger
            .credit(
                1,
                TxKind::Credit,
                Coins::new(100),
                "Credit",
                Some("pay-1".to_string()),
            )
            .await
            .unwrap();
        let second = ledger
            .credit(
                1,
                TxKind::Credit,
                Coins::new(100),
                "Credit",
                Some("pay-1".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(ledger.balance(1).await, Coins::new(100));
    }

    #[tokio::test]
    async fn debit_decreases_balance() {
        let ledger = Ledger::new();
        credit(&ledger, 1, 100).await;
        ledger.debit(1, Coins::new(30), "Debit").await.unwrap();
        assert_eq!(ledger.balance(1).await, Coins::new(70));
    }

    #[tokio::test]
    async fn debit_exact_amount_succeeds() {
        let ledger = Ledger::new();
        credit(&ledger, 1, 100).await;
        ledger.debit(1, Coins::new(100), "Debit").await.unwrap();
        assert_eq!(ledger.balance(1).await, Coins::ZERO);
    }

    #[tokio::test]
    async fn debit_insufficient_balance_fails_unchanged() {
        let ledger = Ledger::new();
        credit(&ledger, 1, 100).await;

        let result = ledger.debit(1, Coins::new(101), "Debit").await;
        assert!(matches!(
            result,
            Err(WalletError::Debit(DebitError::InsufficientBalance {
                account: 1,
                ..
            }))
        ));
        assert_eq!(ledger.balance(1).await, Coins::new(100));
        // the failed debit left no log entry
        assert_eq!(ledger.transactions(1).await.len(), 1);
    }

    #[tokio::test]
    async fn debit_from_unknown_account_fails() {
        let ledger = Ledger::new();
        let result = ledger.debit(1, Coins::new(50), "Debit").await;
        assert!(matches!(
            result,
            Err(WalletError::Debit(DebitError::InsufficientBalance { .. }))
        ));
    }

    #[tokio::test]
    async fn withdrawal_request_does_not_touch_balance() {
        let ledger = Ledger::new();
        credit(&ledger, 1, 300).await;

        let tx = ledger
            .withdrawal_request(1, Coins::new(500))
            .await
            .unwrap();
        assert_eq!(tx.status, TxStatus::Pending);
        assert!(!tx.realized);
        assert_eq!(ledger.balance(1).await, Coins::new(300));
    }

    #[tokio::test]
    async fn withdrawal_lifecycle_insufficient_then_approved() {
        let ledger = Ledger::new();
        credit(&ledger, 1, 300).await;
        let request = ledger
            .withdrawal_request(1, Coins::new(500))
            .await
            .unwrap();

        // approval fails while the balance cannot cover the ask
        let result = ledger.approve_withdrawal(request.id, None).await;
        assert!(matches!(
            result,
            Err(WalletError::Withdrawal(
                WithdrawalError::InsufficientBalance { .. }
            ))
        ));

        // the request stays pending and visible
        let tx = ledger.transaction(request.id).await.unwrap();
        assert_eq!(tx.status, TxStatus::Pending);
        assert_eq!(ledger.withdrawal_requests().await.len(), 1);

        // after a top-up the same request approves
        credit(&ledger, 1, 300).await;
        let approved = ledger.approve_withdrawal(request.id, None).await.unwrap();
        assert_eq!(approved.status, TxStatus::Approved);
        assert!(approved.realized);
        assert_eq!(ledger.balance(1).await, Coins::new(100));
    }

    #[tokio::test]
    async fn approve_with_final_amount_deducts_that_figure() {
        let ledger = Ledger::new();
        credit(&ledger, 1, 300).await;
        let request = ledger
            .withdrawal_request(1, Coins::new(500))
            .await
            .unwrap();

        ledger
            .approve_withdrawal(request.id, Some(Coins::new(200)))
            .await
            .unwrap();
        assert_eq!(ledger.balance(1).await, Coins::new(100));
    }

    #[tokio::test]
    async fn reject_is_terminal() {
        let ledger = Ledger::new();
        credit(&ledger, 1, 300).await;
        let request = ledger
            .withdrawal_request(1, Coins::new(100))
            .await
            .unwrap();

        let rejected = ledger.reject_withdrawal(request.id).await.unwrap();
        assert_eq!(rejected.status, TxStatus::Rejected);
        assert_eq!(ledger.balance(1).await, Coins::new(300));

        let result = ledger.approve_withdrawal(request.id, None).await;
        assert!(matches!(
            result,
            Err(WalletError::Withdrawal(WithdrawalError::NotPending(_)))
        ));
    }

    #[tokio::test]
    async fn approve_non_debit_fails() {
        let ledger = Ledger::new();
        let tx = credit(&ledger, 1, 100).await;

        let result = ledger.approve_withdrawal(tx.id, None).await;
        assert!(matches!(
            result,
            Err(WalletError::Withdrawal(WithdrawalError::NotAWithdrawal(_)))
        ));
    }

    #[tokio::test]
    async fn withdrawal_listing_joins_account_and_balance() {
        let ledger = Ledger::new();
        credit(&ledger, 1, 300).await;
        credit(&ledger, 2, 700).await;
        ledger.withdrawal_request(1, Coins::new(100)).await.unwrap();
        ledger.withdrawal_request(2, Coins::new(200)).await.unwrap();

        let requests = ledger.withdrawal_requests().await;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].account, 1);
        assert_eq!(requests[0].balance, Coins::new(300));
        assert_eq!(requests[1].account, 2);
        assert_eq!(requests[1].tx.amount, Coins::new(200));
    }

    #[tokio::test]
    async fn lock_holds_amount_outside_spendable_balance() {
        let ledger = Ledger::new();
        let tx = ledger
            .lock(1, 2, Coins::new(50), "Referral bonus locked")
            .await
            .unwrap();

        assert_eq!(tx.kind, TxKind::LockedReferralBonus);
        assert!(!tx.realized);
        assert_eq!(ledger.balance(1).await, Coins::ZERO);
        assert_eq!(ledger.locked_total(1).await, Coins::new(50));
    }

    #[tokio::test]
    async fn unlock_moves_exactly_the_grant_amount() {
        let ledger = Ledger::new();
        ledger
            .lock(1, 2, Coins::new(50), "Referral bonus locked")
            .await
            .unwrap();

        let tx = ledger.unlock(1, 2).await.unwrap();
        assert_eq!(tx.kind, TxKind::UnlockReferralBonus);
        assert!(tx.realized);
        assert_eq!(ledger.balance(1).await, Coins::new(50));
        assert_eq!(ledger.locked_total(1).await, Coins::ZERO);
    }

    #[tokio::test]
    async fn unlock_without_grant_is_a_noop() {
        let ledger = Ledger::new();
        assert!(ledger.unlock(1, 2).await.is_none());

        // also a no-op when the wallet exists but holds nothing locked
        credit(&ledger, 1, 100).await;
        assert!(ledger.unlock(1, 2).await.is_none());
        assert_eq!(ledger.balance(1).await, Coins::new(100));
    }

    #[tokio::test]
    async fn unlock_twice_is_a_noop_the_second_time() {
        let ledger = Ledger::new();
        ledger
            .lock(1, 2, Coins::new(50), "Referral bonus locked")
            .await
            .unwrap();

        assert!(ledger.unlock(1, 2).await.is_some());
        assert!(ledger.unlock(1, 2).await.is_none());
        assert_eq!(ledger.balance(1).await, Coins::new(50));
    }

    #[tokio::test]
    async fn double_lock_for_same_pair_is_rejected() {
        let ledger = Ledger::new();
        ledger
            .lock(1, 2, Coins::new(50), "Referral bonus locked")
            .await
            .unwrap();

        let result = ledger.lock(1, 2, Coins::new(25), "again").await;
        assert!(matches!(
            result,
            Err(WalletError::Grant(GrantError::AlreadyLocked { .. }))
        ));
        assert_eq!(ledger.locked_total(1).await, Coins::new(50));
    }

    #[tokio::test]
    async fn transactions_are_chronological() {
        let ledger = Ledger::new();
        credit(&ledger, 1, 100).await;
        ledger.debit(1, Coins::new(30), "Debit").await.unwrap();
        ledger.withdrawal_request(1, Coins::new(10)).await.unwrap();

        let log = ledger.transactions(1).await;
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].kind, TxKind::Credit);
        assert_eq!(log[1].kind, TxKind::Debit);
        assert!(log[2].is_withdrawal_request());
        assert!(log.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[tokio::test]
    async fn snapshot_orders_by_account() {
        let ledger = Ledger::new();
        credit(&ledger, 2, 200).await;
        credit(&ledger, 1, 100).await;
        ledger.lock(1, 9, Coins::new(5), "lock").await.unwrap();

        let rows = ledger.snapshot().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].account, 1);
        assert_eq!(rows[0].total, Coins::new(105));
        assert_eq!(rows[1].account, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_credits_serialize_on_the_wallet() {
        let ledger = Arc::new(Ledger::new());

        let mut handles = Vec::new();
        for _ in 0..50 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .credit(1, TxKind::Credit, Coins::new(10), "Credit", None)
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(ledger.balance(1).await, Coins::new(500));
        assert_eq!(ledger.transactions(1).await.len(), 50);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_debits_never_overdraw() {
        let ledger = Arc::new(Ledger::new());
        ledger
            .credit(1, TxKind::Credit, Coins::new(100), "Credit", None)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.debit(1, Coins::new(30), "Debit").await.is_ok()
            }));
        }

        let mut applied = 0;
        for handle in handles {
            if handle.await.unwrap() {
                applied += 1;
            }
        }

        // only three 30-coin debits fit into 100
        assert_eq!(applied, 3);
        assert_eq!(ledger.balance(1).await, Coins::new(10));
    }
}
