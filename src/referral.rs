//! Bonus propagation across the two-level referral chain.
//!
//! One conversion event fans out into up to three wallet effects: the
//! first-degree referral bonus (immediate or deferred by product
//! policy), the unconditional unlock of any grant held on the upline
//! for the referrer's own signup, and the role-gated second-degree
//! bonus. Each wallet mutation is individually atomic; the flow as a
//! whole tolerates partial completion — a committed first-degree
//! payment is never rolled back when a later step fails.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::Coins;
use crate::config::{ConfigStore, keys};
use crate::directory::Directory;
use crate::engine::{ConvertError, Ledger, WalletError};
use crate::model::{AccountId, Lead, LeadId, LeadStatus, ProductId, Sale, Transaction, TxKind};

/// A conversion event as supplied by the lead/sale collaborator.
#[derive(Debug, Clone)]
pub struct ConversionInput {
    pub lead: LeadId,
    pub product: ProductId,
    pub sale_amount: Coins,
    /// First-degree bonus; derived from the configured conversion rate
    /// when not supplied.
    pub first_degree_bonus: Option<Coins>,
    /// Product settlement policy: pay the referrer now, or defer to
    /// the monthly release.
    pub immediate_credit: bool,
}

/// Everything a conversion produced, for audit display.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub lead: Lead,
    pub sale: Sale,
    pub transactions: Vec<Transaction>,
}

/// Routes signup and conversion bonuses through the referral chain.
pub struct BonusEngine {
    ledger: Arc<Ledger>,
    directory: Arc<Directory>,
    config: Arc<dyn ConfigStore>,
    leads: RwLock<HashMap<LeadId, Lead>>,
    sales: RwLock<Vec<Sale>>,
}

impl BonusEngine {
    pub fn new(ledger: Arc<Ledger>, directory: Arc<Directory>, config: Arc<dyn ConfigStore>) -> Self {
        Self {
            ledger,
            directory,
            config,
            leads: RwLock::new(HashMap::new()),
            sales: RwLock::new(Vec::new()),
        }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn directory(&self) -> &Arc<Directory> {
        &self.directory
    }

    /// Register an account, pay its joining bonus and, when it signed
    /// up under an upline, lock the upline's referral bonus against
    /// this account's first conversion.
    pub async fn enroll(
        &self,
        account: AccountId,
        upline: Option<AccountId>,
    ) -> Result<Vec<Transaction>, WalletError> {
        // resolve both configured amounts before touching any state
        let joining = self.config.amount(keys::JOINING_BONUS)?;
        let locked = match upline {
            Some(_) => Some(self.config.amount(keys::LOCKED_REFERRAL_BONUS)?),
            None => None,
        };

        self.directory.register(account, upline)?;

        let mut transactions = Vec::new();
        if !joining.is_zero() {
            let tx = self
                .ledger
                .credit(
                    account,
                    TxKind::JoiningBonus,
                    joining,
                    "Joining bonus",
                    None,
                )
                .await?;
            transactions.push(tx);
        }

        if let (Some(upline), Some(locked)) = (upline, locked) {
            if !locked.is_zero() {
                let tx = self
                    .ledger
                    .lock(
                        upline,
                        account,
                        locked,
                        format!("Referral bonus locked for signup of account {account}"),
                    )
                    .await?;
                transactions.push(tx);
            }
        }

        info!(account, ?upline, "account enrolled");
        Ok(transactions)
    }

    /// Record a lead referred by `referrer`. The referrer is resolved
    /// at conversion time, not here — leads arrive from an external
    /// collaborator.
    pub async fn create_lead(&self, id: LeadId, referrer: AccountId) -> Result<Lead, WalletError> {
        let mut leads = self.leads.write().await;
        if leads.contains_key(&id) {
            return Err(ConvertError::DuplicateLead(id).into());
        }
        let lead = Lead::new(id, referrer);
        leads.insert(id, lead.clone());
        Ok(lead)
    }

    pub async fn lead(&self, id: LeadId) -> Option<Lead> {
        self.leads.read().await.get(&id).cloned()
    }

    pub async fn sales(&self) -> Vec<Sale> {
        self.sales.read().await.clone()
    }

    /// Settle a lead's conversion into a sale.
    ///
    /// Referrer resolution failures are hard errors — no money moves
    /// without a payable party. Once the first-degree payment commits,
    /// later failures only cost the second-degree bonus.
    pub async fn convert(&self, input: ConversionInput) -> Result<Conversion, WalletError> {
        // resolve everything that can fail before mutating any state
        let lead = {
            let leads = self.leads.read().await;
            leads
                .get(&input.lead)
                .cloned()
                .ok_or(ConvertError::LeadNotFound(input.lead))?
        };
        if lead.status == LeadStatus::Converted {
            return Err(ConvertError::AlreadyConverted(lead.id).into());
        }

        let referrer = self
            .directory
            .get(lead.referrer)
            .ok_or(ConvertError::ReferrerNotFound(lead.referrer))?;

        let bonus = match input.first_degree_bonus {
            Some(bonus) => bonus,
            None => {
                let rate = self
                    .config
                    .rate(keys::CONVERSION_RATE)
                    .map_err(ConvertError::Config)?;
                input.sale_amount.percent(rate)
            }
        };
        if bonus.is_zero() {
            return Err(crate::engine::CreditError::ZeroAmount.into());
        }

        let lead = self.mark_converted(lead.id).await?;
        let sale = Sale {
            lead: lead.id,
            product: input.product,
            amount: input.sale_amount,
            referrer: referrer.id,
            bonus,
            created_at: Utc::now(),
        };
        self.sales.write().await.push(sale.clone());

        let mut transactions = Vec::new();

        // first degree: settle per product policy
        let description = format!("Referral bonus for converted lead {}", lead.id);
        let first = if input.immediate_credit {
            self.ledger
                .credit(referrer.id, TxKind::ReferralBonus, bonus, description, None)
                .await?
        } else {
            self.ledger
                .schedule_credit(referrer.id, TxKind::ReferralBonus, bonus, description)
                .await?
        };
        transactions.push(first);

        // second degree: unlock unconditionally, then pay only a
        // privileged upline
        if let Some(upline) = referrer.upline() {
            if let Some(unlocked) = self.ledger.unlock(upline, referrer.id).await {
                transactions.push(unlocked);
            }

            match self.second_degree(upline, input.sale_amount, lead.id).await {
                Ok(Some(tx)) => transactions.push(tx),
                Ok(None) => {}
                // the first-degree payment is committed; losing the
                // second-degree bonus is preferred over retrying the
                // whole sale
                Err(error) => {
                    warn!(upline, lead = lead.id, %error, "second-degree bonus skipped");
                }
            }
        }

        info!(
            lead = lead.id,
            referrer = referrer.id,
            sale = %sale.amount,
            transactions = transactions.len(),
            "lead converted"
        );
        Ok(Conversion {
            lead,
            sale,
            transactions,
        })
    }

    async fn mark_converted(&self, id: LeadId) -> Result<Lead, WalletError> {
        let mut leads = self.leads.write().await;
        let lead = leads.get_mut(&id).ok_or(ConvertError::LeadNotFound(id))?;
        if lead.status == LeadStatus::Converted {
            return Err(ConvertError::AlreadyConverted(id).into());
        }
        lead.status = LeadStatus::Converted;
        Ok(lead.clone())
    }

    /// Compute and pay the second-degree bonus if the upline currently
    /// holds the privileged role. `Ok(None)` means the gate failed —
    /// not an error, and never a reason to reverse the unlock.
    async fn second_degree(
        &self,
        upline: AccountId,
        sale_amount: Coins,
        lead: LeadId,
    ) -> Result<Option<Transaction>, WalletError> {
        let privileged = self.config.role(keys::SECOND_DEGREE_ROLE)?;
        let Some(account) = self.directory.get(upline) else {
            return Ok(None);
        };
        if !account.has_role(privileged) {
            return Ok(None);
        }

        let valuation = self.config.valuation(keys::SECOND_DEGREE_VALUATION)?;
        let bonus = valuation.apply(sale_amount);
        if bonus.is_zero() {
            return Ok(None);
        }

        let tx = self
            .ledger
            .credit(
                upline,
                TxKind::ConversionBonus,
                bonus,
                format!("Second-degree conversion bonus for lead {lead}"),
                None,
            )
            .await?;
        Ok(Some(tx))
    }
}
