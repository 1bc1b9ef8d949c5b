//! Free cycle balances: credits, debits, spend limits and purchases.

use cyclex_core::account::{AccountKind, CycleBalance};
use cyclex_core::amount::{add_shares, Frequency};
use cyclex_core::constants::CONVERSION_SCALE;
use cyclex_core::error::CyclexError;
use cyclex_core::types::{AccountId, Share, Timestamp};
use tracing::debug;

use crate::staged::Staged;

/// Apply `delta` to the free balance of `account`, creating the balance
/// record on first credit. `upgrades`, when given, must be positive and is
/// added to the pending upgrade count.
pub(crate) fn adjust_cycle_balance(
    st: &mut Staged<'_>,
    account: &AccountId,
    delta: Share,
    upgrades: Option<u8>,
) -> Result<(), CyclexError> {
    if delta == 0 && upgrades.is_none() {
        return Ok(());
    }
    let mut cb = match st.cycle_balance(account)? {
        Some(cb) => cb,
        None if delta < 0 => {
            return Err(CyclexError::InsufficientBalance {
                asset: "cycles",
                need: -delta,
                have: 0,
            })
        }
        None => CycleBalance::new(account.clone()),
    };
    cb.adjust(delta, upgrades)?;
    st.put_cycle_balance(cb);
    Ok(())
}

pub(crate) fn issue_free_cycles(
    st: &mut Staged<'_>,
    account: &AccountId,
    amount: Share,
    origin: &str,
    comment: &str,
) -> Result<(), CyclexError> {
    if amount <= 0 {
        return Err(CyclexError::zero_amount());
    }
    st.account(account)?.require_kind(AccountKind::Vault)?;
    adjust_cycle_balance(st, account, amount, None)?;
    st.dynamic.total_cycles_issued = add_shares(st.dynamic.total_cycles_issued, amount)?;
    debug!(account = %account, amount, origin, comment, "issued free cycles");
    Ok(())
}

/// Take `amount` out of the free balance for a queue submission, honouring
/// the daily spend limit.
pub(crate) fn reserve_free_cycles(
    st: &mut Staged<'_>,
    account: &AccountId,
    amount: Share,
    now: Timestamp,
) -> Result<(), CyclexError> {
    let mut cb = st.cycle_balance(account)?.ok_or(CyclexError::InsufficientBalance {
        asset: "cycles",
        need: amount,
        have: 0,
    })?;
    cb.limit.check(amount, now)?;
    cb.adjust(-amount, None)?;
    cb.limit.spend(amount, now)?;
    st.put_cycle_balance(cb);
    Ok(())
}

/// Set the daily cap. Cycles already spent in the current window stay spent.
pub(crate) fn update_cycle_limit(
    st: &mut Staged<'_>,
    account: &AccountId,
    max: Share,
) -> Result<(), CyclexError> {
    if max < 0 {
        return Err(CyclexError::InvalidParameter(
            "cycle limit cannot be negative".into(),
        ));
    }
    st.account(account)?;
    let mut cb = st
        .cycle_balance(account)?
        .unwrap_or_else(|| CycleBalance::new(account.clone()));
    cb.limit.max = max;
    st.put_cycle_balance(cb);
    Ok(())
}

/// Convert wallet coin into free cycles at the current frequency. Returns
/// the cycles credited.
pub(crate) fn purchase_cycles(
    st: &mut Staged<'_>,
    wallet: &AccountId,
    amount: Share,
    frequency: Frequency,
    expected_cycles: Share,
) -> Result<Share, CyclexError> {
    let mut acc = st.account(wallet)?;
    acc.require_kind(AccountKind::Wallet)?;
    if amount <= 0 || expected_cycles <= 0 || !frequency.is_set() {
        return Err(CyclexError::InvalidParameter(
            "amount, frequency and expected cycles must be positive".into(),
        ));
    }
    if frequency != st.dynamic.frequency {
        return Err(CyclexError::FrequencyMismatch {
            expected: st.dynamic.frequency.value(),
            got: frequency.value(),
        });
    }
    let scaled = amount
        .checked_mul(frequency.value())
        .ok_or_else(|| CyclexError::ArithmeticError("overflow in purchase".into()))?;
    if scaled % CONVERSION_SCALE != 0 {
        return Err(CyclexError::InvalidParameter(format!(
            "{amount} does not buy a whole number of cycles at frequency {frequency}"
        )));
    }
    let cycles = scaled / CONVERSION_SCALE;
    if cycles != expected_cycles {
        return Err(CyclexError::InvalidParameter(format!(
            "expected {expected_cycles} cycles, conversion gives {cycles}"
        )));
    }
    acc.adjust_balance(-amount)?;
    st.put_account(acc);
    adjust_cycle_balance(st, wallet, cycles, None)?;
    st.dynamic.total_cycles_issued = add_shares(st.dynamic.total_cycles_issued, cycles)?;
    Ok(cycles)
}
