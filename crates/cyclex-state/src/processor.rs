//! Periodic conversion of queued cycles into coin.

use cyclex_core::amount::{add_shares, cycles_to_dascoin, max_exact_cycles, sub_shares, Frequency};
use cyclex_core::error::CyclexError;
use cyclex_core::queue::{QueueReport, RewardHistoryRecord, RewardQueueEntry};
use cyclex_core::types::{Share, Timestamp};
use tracing::{debug, info, warn};

use crate::engine::StateEngine;
use crate::staged::Staged;

impl StateEngine {
    /// Block hook. Runs one reward interval when `now` has reached the
    /// scheduled reward time; otherwise does nothing. Every entry is paid at
    /// the global frequency current at that moment.
    ///
    /// An error leaves the store untouched, including the schedule, so the
    /// next block retries the same interval.
    pub fn on_block(&self, now: Timestamp) -> Result<QueueReport, CyclexError> {
        let mut st = Staged::new(&self.db)?;
        if now < st.dynamic.next_reward_time {
            return Ok(QueueReport {
                next_reward_time: st.dynamic.next_reward_time,
                ..Default::default()
            });
        }
        st.dynamic.next_reward_time = now + st.params.reward_interval_time_seconds as Timestamp;

        let report = if st.params.enable_dascoin_queue {
            process_reward_queue(self, &mut st, now).map_err(|e| {
                warn!(error = %e, now, "reward interval aborted");
                e
            })?
        } else {
            debug!(now, "reward queue disabled, interval skipped");
            QueueReport {
                budget_left: st.params.dascoin_reward_amount,
                ..Default::default()
            }
        };
        let report = QueueReport {
            next_reward_time: st.dynamic.next_reward_time,
            ..report
        };
        st.commit()?;
        Ok(report)
    }
}

fn pay(
    st: &mut Staged<'_>,
    entry: &RewardQueueEntry,
    cycles: Share,
    dascoin: Share,
    frequency: Frequency,
    partial: bool,
    now: Timestamp,
) -> Result<(), CyclexError> {
    let mut acc = st.account(&entry.account)?;
    acc.adjust_balance(dascoin)?;
    st.put_account(acc);

    let d = &mut st.dynamic;
    d.total_cycles_converted = add_shares(d.total_cycles_converted, cycles)?;
    d.queued_cycles = sub_shares(d.queued_cycles, cycles)?;
    d.total_dascoin_minted = add_shares(d.total_dascoin_minted, dascoin)?;
    let id = d.take_history_id();
    st.record_reward(RewardHistoryRecord {
        id,
        entry: entry.id,
        account: entry.account.clone(),
        amount_cycles: cycles,
        amount_dascoin: dascoin,
        frequency,
        time: now,
        partial,
    });
    debug!(entry = %entry.id, account = %entry.account, cycles, dascoin, partial, "paid queue entry");
    Ok(())
}

/// Walk the queue from the head, paying whole entries while the interval
/// budget lasts and partially filling the first entry that does not fit.
fn process_reward_queue(
    engine: &StateEngine,
    st: &mut Staged<'_>,
    now: Timestamp,
) -> Result<QueueReport, CyclexError> {
    let frequency = st.dynamic.frequency;
    let mut budget = st.params.dascoin_reward_amount;
    let mut report = QueueReport {
        processed: true,
        ..Default::default()
    };

    for item in engine.db.queue_iter() {
        if budget == 0 {
            break;
        }
        let mut entry = item?;
        let owed = cycles_to_dascoin(entry.amount, frequency)?;
        if owed <= budget {
            pay(st, &entry, entry.amount, owed, frequency, false, now)?;
            st.remove_queue_entry(&entry);
            budget -= owed;
            report.entries_paid += 1;
            report.entries_removed += 1;
            report.cycles_converted += entry.amount;
            report.dascoin_minted += owed;
            continue;
        }

        let cycles = max_exact_cycles(budget, frequency, entry.amount)?;
        if cycles > 0 {
            let dascoin = cycles_to_dascoin(cycles, frequency)?;
            pay(st, &entry, cycles, dascoin, frequency, true, now)?;
            entry.amount -= cycles;
            st.put_queue_entry(entry);
            budget -= dascoin;
            report.entries_paid += 1;
            report.cycles_converted += cycles;
            report.dascoin_minted += dascoin;
        }
        break;
    }

    report.budget_left = budget;
    info!(
        now,
        frequency = %frequency,
        paid = report.entries_paid,
        removed = report.entries_removed,
        cycles = report.cycles_converted,
        dascoin = report.dascoin_minted,
        budget_left = budget,
        "reward interval processed"
    );
    Ok(report)
}
