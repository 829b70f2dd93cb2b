//! Core domain types for the wallet ledger.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::Coins;

/// Participant identifier (user, affiliate or ambassador).
pub type AccountId = u64;

/// Transaction identifier.
pub type TxId = u64;

/// Lead identifier.
pub type LeadId = u64;

/// Product identifier.
pub type ProductId = u64;

/// The kind of monetary event recorded against a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxKind {
    /// Plain credit to spendable balance.
    Credit,
    /// Plain debit from spendable balance (withdrawals included).
    Debit,
    /// Flat signup bonus for a newly enrolled account.
    JoiningBonus,
    /// First-degree commission for a converted lead.
    ReferralBonus,
    /// Second-degree commission paid to a privileged upline.
    ConversionBonus,
    /// Audit record for a grant held outside spendable balance.
    LockedReferralBonus,
    /// Release of a previously locked grant into spendable balance.
    UnlockReferralBonus,
}

impl TxKind {
    /// Whether this kind increases a balance when realized.
    pub fn is_credit(self) -> bool {
        !matches!(self, TxKind::Debit)
    }
}

/// Transaction lifecycle status. Transitions are forward-only:
/// Pending -> Approved or Pending -> Rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    #[default]
    Approved,
    Rejected,
}

/// An immutable monetary event. Amount and kind never change after
/// creation; only `status` and `realized` transition forward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxId,
    /// The account whose wallet owns this event.
    pub account: AccountId,
    pub kind: TxKind,
    pub amount: Coins,
    pub status: TxStatus,
    /// Whether the amount has actually been applied to spendable balance.
    pub realized: bool,
    /// Set only for deferred credits awaiting the sweep.
    pub scheduled_release: Option<NaiveDate>,
    pub description: String,
    /// Caller-supplied idempotency key, if any.
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// A pending debit awaiting administrative approval.
    pub fn is_withdrawal_request(&self) -> bool {
        self.kind == TxKind::Debit && self.status == TxStatus::Pending
    }

    /// Eligible for the delayed-credit sweep on `today`.
    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.status == TxStatus::Pending
            && !self.realized
            && self.scheduled_release.is_some_and(|d| d <= today)
    }
}

/// A bonus amount held on an upline's wallet until the referred
/// account's first conversion unlocks it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockedGrant {
    /// The downstream account whose conversion releases this grant.
    pub referred: AccountId,
    pub amount: Coins,
    pub locked: bool,
    pub locked_at: DateTime<Utc>,
    pub unlocked_at: Option<DateTime<Utc>>,
}

impl LockedGrant {
    pub fn new(referred: AccountId, amount: Coins) -> Self {
        Self {
            referred,
            amount,
            locked: true,
            locked_at: Utc::now(),
            unlocked_at: None,
        }
    }
}

/// Role held by an account. Second-degree commission eligibility is
/// gated on the role named by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Affiliate,
    Ambassador,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "affiliate" => Ok(Role::Affiliate),
            "ambassador" => Ok(Role::Ambassador),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Lead lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LeadStatus {
    #[default]
    Pending,
    Converted,
    Rejected,
}

/// A prospect referred by an account. Converting a lead triggers the
/// bonus propagation flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub referrer: AccountId,
    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    pub fn new(id: LeadId, referrer: AccountId) -> Self {
        Self {
            id,
            referrer,
            status: LeadStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

/// Durable evidence of a lead's conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub lead: LeadId,
    pub product: ProductId,
    pub amount: Coins,
    pub referrer: AccountId,
    /// First-degree bonus routed for this sale.
    pub bonus: Coins,
    pub created_at: DateTime<Utc>,
}
