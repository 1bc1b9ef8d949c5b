//! Payout estimates for queued entries.
//!
//! Replays the queue processor over the current queue, assuming no new
//! submissions and unchanged parameters, to find the reward interval in
//! which each entry is fully paid. Intervals spent entirely on one entry
//! are skipped in closed form, so the cost is linear in the queue length.

use cyclex_core::amount::{cycles_to_dascoin, dascoin_to_cycles, max_exact_cycles, Frequency};
use cyclex_core::error::CyclexError;
use cyclex_core::queue::RewardQueueEntry;
use cyclex_core::types::{QueueEntryId, Share, Timestamp};
use serde::Serialize;

/// When one queue entry is expected to be fully paid.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PayoutEstimate {
    pub entry: QueueEntryId,
    pub position: u64,
    /// Coin the entry is owed at the current global frequency; `None` when
    /// its cycles do not convert exactly at that frequency.
    pub owed: Option<Share>,
    /// 1-based interval in which the last cycle is paid; `None` if the
    /// queue stalls before reaching this entry.
    pub intervals: Option<u64>,
    pub paid_by: Option<Timestamp>,
}

/// Estimate payouts for `queue` (head first) at `frequency`.
pub fn estimate_payouts(
    queue: &[RewardQueueEntry],
    frequency: Frequency,
    reward_amount: Share,
    next_reward_time: Timestamp,
    interval_secs: u32,
) -> Result<Vec<PayoutEstimate>, CyclexError> {
    if reward_amount <= 0 {
        return Err(CyclexError::InvalidParameter(
            "reward amount must be greater than zero".into(),
        ));
    }
    if !frequency.is_set() {
        return Err(CyclexError::InvalidParameter(
            "frequency must be greater than zero".into(),
        ));
    }
    // Cycles a fresh interval pays in full, and the largest exact partial.
    let fits = dascoin_to_cycles(reward_amount, frequency)?;
    let per_interval = max_exact_cycles(reward_amount, frequency, Share::MAX)?;

    let mut out = Vec::with_capacity(queue.len());
    let mut interval: u64 = 1;
    let mut budget = reward_amount;
    let mut stalled = false;

    for (pos, e) in queue.iter().enumerate() {
        let owed = cycles_to_dascoin(e.amount, frequency).ok();
        if owed.is_none() {
            // The processor aborts the interval on this entry.
            stalled = true;
        }
        if !stalled {
            stalled = !advance(e.amount, frequency, reward_amount, fits, per_interval, &mut interval, &mut budget)?;
        }

        let intervals = (!stalled).then_some(interval);
        out.push(PayoutEstimate {
            entry: e.id,
            position: pos as u64,
            owed,
            intervals,
            paid_by: intervals
                .map(|k| next_reward_time + (k as Timestamp - 1) * interval_secs as Timestamp),
        });
    }
    Ok(out)
}

/// Pay one entry of `amount` cycles starting at (`interval`, `budget`).
/// Returns false when no exact step fits into a fresh interval.
fn advance(
    amount: Share,
    frequency: Frequency,
    reward_amount: Share,
    fits: Share,
    per_interval: Share,
    interval: &mut u64,
    budget: &mut Share,
) -> Result<bool, CyclexError> {
    let mut remaining = amount;
    let due = cycles_to_dascoin(remaining, frequency)?;
    if *budget > 0 && due <= *budget {
        *budget -= due;
        return Ok(true);
    }

    let partial = if *budget > 0 {
        max_exact_cycles(*budget, frequency, remaining)?
    } else {
        0
    };
    if partial == 0 && *budget == reward_amount {
        return Ok(false);
    }
    remaining -= partial;
    *interval += 1;
    *budget = reward_amount;

    if remaining > fits {
        if per_interval == 0 {
            return Ok(false);
        }
        let full = (remaining - fits + per_interval - 1) / per_interval;
        remaining -= full * per_interval;
        *interval += full as u64;
    }
    *budget -= cycles_to_dascoin(remaining, frequency)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyclex_core::amount::Frequency;
    use cyclex_core::types::AccountId;

    fn entry(id: u64, amount: Share, f: Share) -> RewardQueueEntry {
        RewardQueueEntry {
            id: QueueEntryId(id),
            origin: "reserve_cycles".into(),
            license: None,
            account: AccountId::from_name("v"),
            amount,
            frequency: Frequency(f),
            time: 0,
            comment: String::new(),
        }
    }

    #[test]
    fn matches_processor_walkthrough() {
        let queue = [entry(0, 200, 200), entry(1, 400, 200), entry(2, 200, 200), entry(3, 600, 200)];
        let est = estimate_payouts(&queue, Frequency(200), 5_000_000, 1_000, 600).unwrap();
        let intervals: Vec<_> = est.iter().map(|e| e.intervals).collect();
        assert_eq!(intervals, vec![Some(1), Some(1), Some(1), Some(2)]);
        assert_eq!(est[3].paid_by, Some(1_600));
        assert_eq!(est[3].owed, Some(3_000_000));
        assert_eq!(est[2].position, 2);
    }

    #[test]
    fn long_entry_spans_several_intervals() {
        // 1_000 cycles at 20.0 owe 5_000_000: five intervals of 1_000_000.
        let queue = [entry(0, 1_000, 200), entry(1, 200, 200)];
        let est = estimate_payouts(&queue, Frequency(200), 1_000_000, 0, 600).unwrap();
        assert_eq!(est[0].intervals, Some(5));
        assert_eq!(est[1].intervals, Some(6));
    }

    #[test]
    fn budget_below_one_step_stalls() {
        let queue = [entry(0, 9, 300), entry(1, 300, 300)];
        let est = estimate_payouts(&queue, Frequency(300), 5_000, 0, 600).unwrap();
        assert_eq!(est[0].intervals, None);
        assert_eq!(est[1].paid_by, None);
    }

    #[test]
    fn huge_entry_with_tiny_budget_is_computed_directly() {
        // One cycle per interval: the last of 200_000_000 lands in interval 200_000_000.
        let queue = [entry(0, 200_000_000, 200), entry(1, 1, 200)];
        let est = estimate_payouts(&queue, Frequency(200), 5_000, 0, 600).unwrap();
        assert_eq!(est[0].intervals, Some(200_000_000));
        assert_eq!(est[0].owed, Some(1_000_000_000_000));
        assert_eq!(est[1].intervals, Some(200_000_001));
        assert_eq!(est[1].paid_by, Some(200_000_000 * 600));
    }

    #[test]
    fn estimates_use_the_global_frequency() {
        // Submitted at 20.0, paid at 10.0: 200 cycles now owe 2_000_000.
        let queue = [entry(0, 200, 200), entry(1, 300, 200)];
        let est = estimate_payouts(&queue, Frequency(100), 2_500_000, 0, 600).unwrap();
        assert_eq!(est[0].owed, Some(2_000_000));
        assert_eq!(est[0].intervals, Some(1));
        assert_eq!(est[1].intervals, Some(2));

        // An entry that is inexact at the new frequency halts the queue there.
        let est = estimate_payouts(&queue, Frequency(300), 5_000_000, 0, 600).unwrap();
        assert_eq!(est[0].owed, None);
        assert!(est.iter().all(|e| e.intervals.is_none()));
    }
}
