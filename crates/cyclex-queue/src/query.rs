use chrono::{DateTime, Utc};
use cyclex_core::amount::Frequency;
use cyclex_core::error::CyclexError;
use cyclex_core::license::{LicenseInformation, LicenseRequest};
use cyclex_core::queue::{FrequencyHistoryRecord, QueuePosition, RewardHistoryRecord, RewardQueueEntry};
use cyclex_core::types::{AccountId, QueueEntryId, Share, Timestamp};
use cyclex_state::StateDb;
use serde::Serialize;

use crate::schedule::{estimate_payouts, PayoutEstimate};

/// An amount of cycles tied to the frequency it will convert at.
/// Free cycles carry no lock (`Frequency::NONE`).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CycleAgreement {
    pub cycles: Share,
    pub frequency_lock: Frequency,
}

/// Where every outstanding cycle currently sits.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SupplyAudit {
    pub free: Share,
    pub licensed: Share,
    pub queued: Share,
    /// Issued minus converted, from the global counters.
    pub outstanding: Share,
}

impl SupplyAudit {
    pub fn is_balanced(&self) -> bool {
        self.free + self.licensed + self.queued == self.outstanding
    }
}

/// Read-only queries over cycle balances, licenses and the reward queue.
pub struct CycleQuery<'a> {
    db: &'a StateDb,
}

impl<'a> CycleQuery<'a> {
    pub fn new(db: &'a StateDb) -> Self {
        Self { db }
    }

    // ── Balances ─────────────────────────────────────────────────────────────

    /// Free cycles of `account`, or `None` if the account does not exist.
    pub fn free_cycle_balance(&self, account: &AccountId) -> Result<Option<Share>, CyclexError> {
        if !self.db.account_exists(account) {
            return Ok(None);
        }
        Ok(Some(
            self.db
                .get_cycle_balance(account)?
                .map(|cb| cb.balance)
                .unwrap_or(0),
        ))
    }

    /// Free balance first, then every queued entry with its frequency.
    pub fn all_cycle_balances(&self, account: &AccountId) -> Result<Vec<CycleAgreement>, CyclexError> {
        let Some(free) = self.free_cycle_balance(account)? else {
            return Ok(Vec::new());
        };
        let mut out = vec![CycleAgreement {
            cycles: free,
            frequency_lock: Frequency::NONE,
        }];
        for id in self.db.queue_ids_for_account(account)? {
            if let Some(e) = self.db.get_queue_entry(id)? {
                out.push(CycleAgreement {
                    cycles: e.amount,
                    frequency_lock: e.frequency,
                });
            }
        }
        Ok(out)
    }

    pub fn dascoin_balance(&self, account: &AccountId) -> Result<Option<Share>, CyclexError> {
        Ok(self.db.get_account(account)?.map(|a| a.balance))
    }

    pub fn license_information(&self, account: &AccountId) -> Result<Option<LicenseInformation>, CyclexError> {
        Ok(self
            .db
            .get_account(account)?
            .and_then(|a| a.license_information))
    }

    /// Pending license requests, oldest first; only `account`'s when given.
    pub fn license_requests(&self, account: Option<&AccountId>) -> Result<Vec<LicenseRequest>, CyclexError> {
        let mut requests = self.db.license_requests()?;
        if let Some(account) = account {
            requests.retain(|r| &r.account == account);
        }
        Ok(requests)
    }

    // ── Queue ────────────────────────────────────────────────────────────────

    /// Entries in payout order (oldest first), at most `limit`.
    pub fn queue(&self, limit: usize) -> Result<Vec<RewardQueueEntry>, CyclexError> {
        self.db.queue_iter().take(limit).collect()
    }

    pub fn queue_size(&self) -> usize {
        self.db.queue_len()
    }

    /// `account`'s entries, each with its zero-based position in the queue.
    pub fn queue_submissions_with_pos(&self, account: &AccountId) -> Result<Vec<QueuePosition>, CyclexError> {
        let mut per_account = self.queue_submissions_with_pos_for_accounts(std::slice::from_ref(account))?;
        Ok(per_account.pop().map(|(_, v)| v).unwrap_or_default())
    }

    /// Same as `queue_submissions_with_pos`, for several accounts in one pass.
    /// The result follows the order of `accounts`.
    pub fn queue_submissions_with_pos_for_accounts(
        &self,
        accounts: &[AccountId],
    ) -> Result<Vec<(AccountId, Vec<QueuePosition>)>, CyclexError> {
        let mut out: Vec<(AccountId, Vec<QueuePosition>)> =
            accounts.iter().map(|a| (a.clone(), Vec::new())).collect();
        for (pos, item) in self.db.queue_iter().enumerate() {
            let entry = item?;
            if let Some((_, list)) = out.iter_mut().find(|(a, _)| *a == entry.account) {
                list.push(QueuePosition {
                    position: pos as u64,
                    entry,
                });
            }
        }
        Ok(out)
    }

    /// Payout estimate for every queued entry, head first.
    pub fn payout_estimates(&self) -> Result<Vec<PayoutEstimate>, CyclexError> {
        let params = self.db.parameters()?;
        let dynamic = self.db.dynamic_state()?;
        let queue = self.queue(usize::MAX)?;
        estimate_payouts(
            &queue,
            dynamic.frequency,
            params.dascoin_reward_amount,
            dynamic.next_reward_time,
            params.reward_interval_time_seconds,
        )
    }

    // ── Frequency / history ──────────────────────────────────────────────────

    pub fn frequency(&self) -> Result<Frequency, CyclexError> {
        Ok(self.db.dynamic_state()?.frequency)
    }

    pub fn frequency_history(&self) -> Result<Vec<FrequencyHistoryRecord>, CyclexError> {
        self.db.frequency_history()
    }

    pub fn reward_history(&self, account: &AccountId) -> Result<Vec<RewardHistoryRecord>, CyclexError> {
        self.db.reward_history_for(account)
    }

    // ── Audit ────────────────────────────────────────────────────────────────

    /// Sum free, licensed and queued cycles and compare with the counters.
    pub fn supply_audit(&self) -> Result<SupplyAudit, CyclexError> {
        let free = self.db.iter_cycle_balances()?.iter().map(|cb| cb.balance).sum();
        let licensed = self
            .db
            .iter_accounts()?
            .iter()
            .filter_map(|a| a.license_information.as_ref())
            .map(|info| info.upgradeable_total())
            .sum();
        let queued = self
            .db
            .queue_iter()
            .map(|e| e.map(|e| e.amount))
            .sum::<Result<Share, CyclexError>>()?;
        Ok(SupplyAudit {
            free,
            licensed,
            queued,
            outstanding: self.db.dynamic_state()?.cycles_outstanding(),
        })
    }

    // ── Describe ─────────────────────────────────────────────────────────────

    /// Human-readable summary of a queue entry.
    pub fn describe(&self, id: QueueEntryId, now: Timestamp) -> Result<String, CyclexError> {
        let e = self
            .db
            .get_queue_entry(id)?
            .ok_or_else(|| CyclexError::InvalidParameter(format!("no queue entry {id}")))?;
        let submitted = DateTime::<Utc>::from_timestamp(e.time, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| e.time.to_string());
        let waiting_days = (now - e.time).max(0) / 86_400;
        Ok(format!(
            "{} | {} cycles @ {} | account: {} | origin: {} | submitted {} ({} days ago)",
            id, e.amount, e.frequency, e.account, e.origin, submitted, waiting_days
        ))
    }
}
