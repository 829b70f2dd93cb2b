//! Delayed-credit scheduling and the periodic sweep.
//!
//! Bonuses earned in the current period are not paid out immediately:
//! they are recorded as pending transactions released on the 7th of the
//! following month. The sweep realizes every due transaction and is
//! idempotent — an already-realized transaction is never reprocessed.
//!
//! The date math is pure and the sweep takes `today` as a parameter, so
//! both are testable without any timer; the monthly task is a thin
//! tokio loop over the same calls and doubles as the manual trigger's
//! documentation.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::Coins;
use crate::engine::{CreditError, Ledger, Posting, WalletError};
use crate::model::{AccountId, Transaction, TxId, TxKind, TxStatus};

/// Day of month the sweep runs and delayed credits release.
pub const SWEEP_DAY_OF_MONTH: u32 = 7;

/// The release date for a bonus earned on `today`: always the 7th of
/// the following month; December rolls into January of the next year.
pub fn release_date(today: NaiveDate) -> NaiveDate {
    let (year, month) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, SWEEP_DAY_OF_MONTH).expect("day 7 exists in every month")
}

/// The next sweep date strictly determined by `today`: this month's
/// `day` if still ahead, otherwise the same day next month.
pub fn next_run_date(today: NaiveDate, day: u32) -> NaiveDate {
    if today.day() < day {
        NaiveDate::from_ymd_opt(today.year(), today.month(), day)
            .expect("sweep day exists in every month")
    } else {
        let (year, month) = if today.month() == 12 {
            (today.year() + 1, 1)
        } else {
            (today.year(), today.month() + 1)
        };
        NaiveDate::from_ymd_opt(year, month, day).expect("sweep day exists in every month")
    }
}

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Transactions realized into spendable balance.
    pub processed: usize,
    /// Due transactions that were no longer eligible when reached.
    pub skipped: usize,
}

impl Ledger {
    /// Record a deferred credit: a pending, unrealized transaction
    /// whose amount reaches spendable balance only when the sweep runs
    /// on or after its release date.
    pub async fn schedule_credit(
        &self,
        account: AccountId,
        kind: TxKind,
        amount: Coins,
        description: impl Into<String>,
    ) -> Result<Transaction, WalletError> {
        debug_assert!(kind.is_credit());
        if amount.is_zero() {
            return Err(CreditError::ZeroAmount.into());
        }

        let release = release_date(Utc::now().date_naive());
        let handle = self.wallet(account).await;
        let mut wallet = handle.lock().await;

        let tx = self
            .append(
                &mut wallet,
                Posting {
                    kind,
                    amount,
                    description: description.into(),
                    reference: None,
                    status: TxStatus::Pending,
                    realized: false,
                    scheduled_release: Some(release),
                },
            )
            .await;

        info!(account, tx = tx.id, amount = %amount, release = %release, "delayed credit scheduled");
        Ok(tx)
    }

    /// An account's deferred credits still awaiting release, earliest
    /// release first.
    pub async fn pending_delayed(&self, account: AccountId) -> Vec<Transaction> {
        let txs = self.txs.read().await;
        let mut pending: Vec<_> = txs
            .values()
            .filter(|t| {
                t.account == account
                    && t.status == TxStatus::Pending
                    && !t.realized
                    && t.scheduled_release.is_some()
            })
            .cloned()
            .collect();
        pending.sort_by_key(|t| (t.scheduled_release, t.id));
        pending
    }

    /// Realize every pending deferred credit whose release date is on
    /// or before `today`. Items are processed independently: one that
    /// turns out ineligible is skipped, never fatal to the pass.
    pub async fn run_sweep(&self, today: NaiveDate) -> SweepReport {
        let due: Vec<(TxId, AccountId)> = {
            let txs = self.txs.read().await;
            let mut due: Vec<_> = txs
                .values()
                .filter(|t| t.is_due(today))
                .map(|t| (t.id, t.account))
                .collect();
            due.sort_unstable();
            due
        };

        info!(count = due.len(), date = %today, "sweep started");

        let mut report = SweepReport::default();
        for (id, account) in due {
            let handle = self.wallet(account).await;
            let mut wallet = handle.lock().await;
            let mut txs = self.txs.write().await;

            let Some(tx) = txs.get_mut(&id) else {
                warn!(tx = id, "due transaction disappeared, skipping");
                report.skipped += 1;
                continue;
            };
            // re-check under the wallet lock: a concurrent pass may
            // have realized it since the collection above
            if !tx.is_due(today) {
                warn!(tx = id, "due transaction no longer eligible, skipping");
                report.skipped += 1;
                continue;
            }

            wallet.credit(tx.amount);
            tx.realized = true;
            tx.status = TxStatus::Approved;

            info!(account, tx = id, amount = %tx.amount, "delayed credit realized");
            report.processed += 1;
        }

        info!(
            processed = report.processed,
            skipped = report.skipped,
            "sweep finished"
        );
        report
    }
}

/// Run the sweep at midnight UTC on `day` of every month until the
/// returned handle is aborted. Manual recovery is a direct
/// [`Ledger::run_sweep`] call with the same semantics.
pub fn spawn_monthly_sweep(ledger: Arc<Ledger>, day: u32) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let next = next_run_date(now.date_naive(), day);
            let wake = next
                .and_hms_opt(0, 0, 0)
                .expect("midnight exists")
                .and_utc();
            let wait = (wake - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            ledger.run_sweep(Utc::now().date_naive()).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn release_date_is_the_seventh_of_next_month() {
        assert_eq!(release_date(date(2025, 3, 15)), date(2025, 4, 7));
        assert_eq!(release_date(date(2025, 1, 1)), date(2025, 2, 7));
        assert_eq!(release_date(date(2025, 1, 31)), date(2025, 2, 7));
        // earning on a release day still defers to the following month
        assert_eq!(release_date(date(2025, 6, 7)), date(2025, 7, 7));
    }

    #[test]
    fn release_date_december_rolls_to_next_year() {
        assert_eq!(release_date(date(2025, 12, 1)), date(2026, 1, 7));
        assert_eq!(release_date(date(2025, 12, 31)), date(2026, 1, 7));
    }

    #[test]
    fn next_run_is_this_month_before_the_day() {
        assert_eq!(next_run_date(date(2025, 3, 3), 7), date(2025, 3, 7));
    }

    #[test]
    fn next_run_rolls_over_on_or_after_the_day() {
        assert_eq!(next_run_date(date(2025, 3, 7), 7), date(2025, 4, 7));
        assert_eq!(next_run_date(date(2025, 3, 20), 7), date(2025, 4, 7));
        assert_eq!(next_run_date(date(2025, 12, 8), 7), date(2026, 1, 7));
    }

    #[tokio::test]
    async fn schedule_credit_is_pending_with_a_release_date() {
        let ledger = Ledger::new();
        let tx = ledger
            .schedule_credit(1, TxKind::ReferralBonus, Coins::new(100), "Referral bonus")
            .await
            .unwrap();

        assert_eq!(tx.status, TxStatus::Pending);
        assert!(!tx.realized);
        assert_eq!(
            tx.scheduled_release,
            Some(release_date(Utc::now().date_naive()))
        );
        assert_eq!(ledger.balance(1).await, Coins::ZERO);
        assert_eq!(ledger.pending_delayed(1).await.len(), 1);
    }

    #[tokio::test]
    async fn zero_delayed_credit_fails() {
        let ledger = Ledger::new();
        let result = ledger
            .schedule_credit(1, TxKind::ReferralBonus, Coins::ZERO, "Referral bonus")
            .await;
        assert!(matches!(
            result,
            Err(WalletError::Credit(CreditError::ZeroAmount))
        ));
    }

    #[tokio::test]
    async fn sweep_realizes_due_credits_exactly_once() {
        let ledger = Ledger::new();
        let tx = ledger
            .schedule_credit(1, TxKind::ReferralBonus, Coins::new(100), "Referral bonus")
            .await
            .unwrap();
        let release = tx.scheduled_release.unwrap();

        let report = ledger.run_sweep(release).await;
        assert_eq!(report.processed, 1);
        assert_eq!(ledger.balance(1).await, Coins::new(100));

        let realized = ledger.transaction(tx.id).await.unwrap();
        assert_eq!(realized.status, TxStatus::Approved);
        assert!(realized.realized);

        // running the sweep again on the same date is a no-op
        let again = ledger.run_sweep(release).await;
        assert_eq!(again.processed, 0);
        assert_eq!(ledger.balance(1).await, Coins::new(100));
    }

    #[tokio::test]
    async fn sweep_before_release_date_does_nothing() {
        let ledger = Ledger::new();
        let tx = ledger
            .schedule_credit(1, TxKind::ReferralBonus, Coins::new(100), "Referral bonus")
            .await
            .unwrap();
        let early = tx.scheduled_release.unwrap().pred_opt().unwrap();

        let report = ledger.run_sweep(early).await;
        assert_eq!(report.processed, 0);
        assert_eq!(ledger.balance(1).await, Coins::ZERO);
        assert_eq!(ledger.pending_delayed(1).await.len(), 1);
    }

    #[tokio::test]
    async fn sweep_ignores_pending_withdrawals() {
        let ledger = Ledger::new();
        ledger
            .credit(1, TxKind::Credit, Coins::new(300), "Credit", None)
            .await
            .unwrap();
        ledger.withdrawal_request(1, Coins::new(100)).await.unwrap();

        let report = ledger.run_sweep(Utc::now().date_naive()).await;
        assert_eq!(report.processed, 0);
        assert_eq!(ledger.balance(1).await, Coins::new(300));
        assert_eq!(ledger.withdrawal_requests().await.len(), 1);
    }

    #[tokio::test]
    async fn sweep_processes_each_account_independently() {
        let ledger = Ledger::new();
        let a = ledger
            .schedule_credit(1, TxKind::ReferralBonus, Coins::new(100), "Referral bonus")
            .await
            .unwrap();
        ledger
            .schedule_credit(2, TxKind::ConversionBonus, Coins::new(40), "Conversion bonus")
            .await
            .unwrap();

        let report = ledger.run_sweep(a.scheduled_release.unwrap()).await;
        assert_eq!(report.processed, 2);
        assert_eq!(ledger.balance(1).await, Coins::new(100));
        assert_eq!(ledger.balance(2).await, Coins::new(40));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_sweeps_never_double_credit() {
        let ledger = Arc::new(Ledger::new());
        let tx = ledger
            .schedule_credit(1, TxKind::ReferralBonus, Coins::new(100), "Referral bonus")
            .await
            .unwrap();
        let release = tx.scheduled_release.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move { ledger.run_sweep(release).await }));
        }

        let mut processed = 0;
        for handle in handles {
            processed += handle.await.unwrap().processed;
        }

        assert_eq!(processed, 1);
        assert_eq!(ledger.balance(1).await, Coins::new(100));
    }
}
