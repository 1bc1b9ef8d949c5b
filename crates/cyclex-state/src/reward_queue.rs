//! Pushing submissions onto the reward queue.

use cyclex_core::account::{Account, AccountKind};
use cyclex_core::amount::{add_shares, cycles_to_dascoin, Frequency};
use cyclex_core::constants::{MAX_COMMENT_BYTES, ORIGIN_RESERVE_CYCLES, ORIGIN_USER_SUBMIT};
use cyclex_core::error::CyclexError;
use cyclex_core::queue::RewardQueueEntry;
use cyclex_core::types::{AccountId, LicenseTypeId, QueueEntryId, Share, Timestamp};
use tracing::debug;

use crate::cycles::reserve_free_cycles;
use crate::staged::Staged;

pub(crate) fn check_comment(comment: &str) -> Result<(), CyclexError> {
    if comment.len() > MAX_COMMENT_BYTES {
        return Err(CyclexError::InvalidParameter(format!(
            "comment longer than {MAX_COMMENT_BYTES} bytes"
        )));
    }
    Ok(())
}

/// Append a submission to the tail of the queue.
///
/// When `license` is set, `frequency` must match the lock of the first
/// record for that license in the account's history (an unlocked record
/// follows the current global frequency).
#[allow(clippy::too_many_arguments)]
pub(crate) fn push_queue_submission(
    st: &mut Staged<'_>,
    origin: &str,
    license: Option<LicenseTypeId>,
    account: &Account,
    amount: Share,
    frequency: Frequency,
    comment: &str,
    now: Timestamp,
) -> Result<QueueEntryId, CyclexError> {
    if amount <= 0 {
        return Err(CyclexError::zero_amount());
    }
    if !frequency.is_set() {
        return Err(CyclexError::InvalidParameter(
            "queue frequency must be greater than zero".into(),
        ));
    }
    check_comment(comment)?;
    if let Some(license) = license {
        let record = account
            .license_information
            .as_ref()
            .and_then(|info| info.find(license))
            .ok_or_else(|| CyclexError::LicenseNotFound(license.to_string()))?;
        let lock = record.frequency_lock.or(st.dynamic.frequency);
        if lock != frequency {
            return Err(CyclexError::FrequencyMismatch {
                expected: lock.value(),
                got: frequency.value(),
            });
        }
    }
    // Reject submissions the processor could never pay out exactly.
    cycles_to_dascoin(amount, frequency)?;

    let id = QueueEntryId(st.dynamic.next_queue_id);
    st.dynamic.next_queue_id += 1;
    st.dynamic.queued_cycles = add_shares(st.dynamic.queued_cycles, amount)?;
    st.put_queue_entry(RewardQueueEntry {
        id,
        origin: origin.to_string(),
        license,
        account: account.account_id.clone(),
        amount,
        frequency,
        time: now,
        comment: comment.to_string(),
    });
    debug!(entry = %id, account = %account.account_id, amount, frequency = %frequency, origin, "queued cycles");
    Ok(id)
}

/// Newly issued cycles placed straight into the queue.
pub(crate) fn submit_reserve_cycles(
    st: &mut Staged<'_>,
    account: &AccountId,
    amount: Share,
    frequency_lock: Frequency,
    comment: &str,
    now: Timestamp,
) -> Result<QueueEntryId, CyclexError> {
    if !st.params.enable_cycle_issuing {
        return Err(CyclexError::FeatureNotActive("cycle issuing".into()));
    }
    let acc = st.account(account)?;
    acc.require_kind(AccountKind::Vault)?;
    let id = push_queue_submission(st, ORIGIN_RESERVE_CYCLES, None, &acc, amount, frequency_lock, comment, now)?;
    st.dynamic.total_cycles_issued = add_shares(st.dynamic.total_cycles_issued, amount)?;
    Ok(id)
}

/// The signer moves free cycles into the queue at the current frequency.
pub(crate) fn submit_cycles(
    st: &mut Staged<'_>,
    signer: &AccountId,
    amount: Share,
    frequency: Frequency,
    comment: &str,
    now: Timestamp,
) -> Result<QueueEntryId, CyclexError> {
    let acc = st.account(signer)?;
    acc.require_kind(AccountKind::Vault)?;
    if amount <= 0 {
        return Err(CyclexError::zero_amount());
    }
    if frequency != st.dynamic.frequency {
        return Err(CyclexError::FrequencyMismatch {
            expected: st.dynamic.frequency.value(),
            got: frequency.value(),
        });
    }
    reserve_free_cycles(st, signer, amount, now)?;
    push_queue_submission(st, ORIGIN_USER_SUBMIT, None, &acc, amount, frequency, comment, now)
}

/// The signer moves cycles held by one of its licenses into the queue.
pub(crate) fn submit_cycles_by_license(
    st: &mut Staged<'_>,
    signer: &AccountId,
    license: LicenseTypeId,
    amount: Share,
    frequency_lock: Frequency,
    comment: &str,
    now: Timestamp,
) -> Result<QueueEntryId, CyclexError> {
    let mut acc = st.account(signer)?;
    acc.require_kind(AccountKind::Vault)?;
    if amount <= 0 {
        return Err(CyclexError::zero_amount());
    }
    let lt = st.license_type(license)?;
    let info = acc
        .license_information
        .as_mut()
        .ok_or_else(|| CyclexError::LicenseNotFound(license.to_string()))?;
    info.subtract_cycles(license, amount)?;
    let id = push_queue_submission(st, &lt.name, Some(license), &acc, amount, frequency_lock, comment, now)?;
    st.put_account(acc);
    Ok(id)
}
