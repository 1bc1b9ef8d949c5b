use serde::{Deserialize, Serialize};

use crate::amount::Frequency;
use crate::types::{AccountId, HistoryId, LicenseTypeId, QueueEntryId, Share, Timestamp};

// ── RewardQueueEntry ──────────────────────────────────────────────────────────

/// A pending cycle submission awaiting conversion to coin.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RewardQueueEntry {
    pub id: QueueEntryId,
    /// Where the cycles came from: `reserve_cycles`, `user_submit`, a license
    /// type name, or an issuer-supplied tag.
    pub origin: String,
    pub license: Option<LicenseTypeId>,
    pub account: AccountId,
    /// Cycles still waiting. Decremented by partial fills.
    pub amount: Share,
    /// Frequency the entry was submitted at. Payouts use the global frequency.
    pub frequency: Frequency,
    pub time: Timestamp,
    pub comment: String,
}

/// A queue entry paired with its zero-based position in the global FIFO.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct QueuePosition {
    pub position: u64,
    pub entry: RewardQueueEntry,
}

// ── History logs ──────────────────────────────────────────────────────────────

/// One payout made by the queue processor.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RewardHistoryRecord {
    pub id: HistoryId,
    pub entry: QueueEntryId,
    pub account: AccountId,
    pub amount_cycles: Share,
    pub amount_dascoin: Share,
    pub frequency: Frequency,
    pub time: Timestamp,
    /// True when the entry stayed in the queue with a reduced amount.
    pub partial: bool,
}

/// Immutable record of a global frequency change.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FrequencyHistoryRecord {
    pub id: HistoryId,
    pub authority: AccountId,
    pub frequency: Frequency,
    pub time: Timestamp,
    pub comment: String,
}

/// Audit row written when cycles are issued to a chartered or promo license.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CharterIssuanceRecord {
    pub id: HistoryId,
    pub authority: AccountId,
    pub account: AccountId,
    pub license: LicenseTypeId,
    pub amount: Share,
    pub frequency_lock: Frequency,
    pub time: Timestamp,
}

// ── QueueReport ───────────────────────────────────────────────────────────────

/// Outcome of one reward interval.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct QueueReport {
    /// False when the interval was skipped (not due, or queue disabled).
    pub processed: bool,
    pub entries_paid: u64,
    pub entries_removed: u64,
    pub cycles_converted: Share,
    pub dascoin_minted: Share,
    pub budget_left: Share,
    pub next_reward_time: Timestamp,
}
