//! License catalog and per-account license history.

use cyclex_core::account::AccountKind;
use cyclex_core::amount::{add_shares, apply_bonus, Frequency};
use cyclex_core::error::CyclexError;
use cyclex_core::license::{
    validate_license_name, LicenseInformation, LicenseKind, LicenseRecord, LicenseRequest, LicenseType,
};
use cyclex_core::queue::CharterIssuanceRecord;
use cyclex_core::types::{AccountId, LicenseRequestId, LicenseTypeId, QueueEntryId, Share, Timestamp};
use tracing::{debug, info};

use crate::cycles::adjust_cycle_balance;
use crate::reward_queue::{check_comment, push_queue_submission};
use crate::staged::Staged;

// ── Catalog ───────────────────────────────────────────────────────────────────

pub(crate) struct NewLicenseType<'a> {
    pub name: &'a str,
    pub amount: Share,
    pub kind: LicenseKind,
    pub balance_multipliers: &'a [u32],
    pub requeue_multipliers: &'a [u32],
    pub return_multipliers: &'a [u32],
    pub upgrades: u8,
}

pub(crate) fn create_license_type(
    st: &mut Staged<'_>,
    new: NewLicenseType<'_>,
) -> Result<LicenseTypeId, CyclexError> {
    validate_license_name(new.name)?;
    if st.license_type_by_name(new.name)?.is_some() {
        return Err(CyclexError::LicenseTypeExists(new.name.to_string()));
    }
    let id = LicenseTypeId(st.dynamic.next_license_type_id);
    let lt = LicenseType {
        id,
        name: new.name.to_string(),
        amount: new.amount,
        kind: new.kind,
        balance_multipliers: new.balance_multipliers.to_vec(),
        requeue_multipliers: new.requeue_multipliers.to_vec(),
        return_multipliers: new.return_multipliers.to_vec(),
        upgrades: new.upgrades,
    };
    lt.validate()?;
    st.dynamic.next_license_type_id += 1;
    info!(license = %id, name = %lt.name, amount = lt.amount, kind = %lt.kind, "created license type");
    st.put_license_type(lt);
    Ok(id)
}

pub(crate) fn edit_license_type(
    st: &mut Staged<'_>,
    license: LicenseTypeId,
    name: Option<&str>,
    amount: Option<Share>,
    kind: Option<LicenseKind>,
) -> Result<(), CyclexError> {
    let mut lt = st.license_type(license)?;
    if let Some(name) = name {
        if name != lt.name {
            if st.license_type_by_name(name)?.is_some() {
                return Err(CyclexError::LicenseTypeExists(name.to_string()));
            }
            lt.name = name.to_string();
        }
    }
    if let Some(amount) = amount {
        lt.amount = amount;
    }
    if let Some(kind) = kind {
        lt.kind = kind;
    }
    lt.validate()?;
    st.put_license_type(lt);
    Ok(())
}

/// Remove a catalog entry. Issued records keep their id back-reference.
pub(crate) fn delete_license_type(st: &mut Staged<'_>, license: LicenseTypeId) -> Result<(), CyclexError> {
    st.license_type(license)?;
    st.delete_license_type(license);
    Ok(())
}

// ── Issuance ──────────────────────────────────────────────────────────────────

/// Highest rank among the regular-kind licenses already held. Records whose
/// catalog entry was deleted rank by their base amount.
fn held_regular_rank(st: &Staged<'_>, info: &LicenseInformation) -> Result<Option<Share>, CyclexError> {
    let mut best = None;
    for rec in &info.history {
        let rank = match st.license_type(rec.license) {
            Ok(lt) if lt.kind.queues_cycles() => continue,
            Ok(lt) => lt.amount,
            Err(CyclexError::LicenseTypeNotFound(_)) => rec.base_amount,
            Err(e) => return Err(e),
        };
        best = Some(best.map_or(rank, |b: Share| b.max(rank)));
    }
    Ok(best)
}

fn check_issue_inputs(lt: &LicenseType, bonus_percentage: Share, frequency_lock: Frequency) -> Result<(), CyclexError> {
    if bonus_percentage < 0 {
        return Err(CyclexError::InvalidParameter(
            "bonus percentage cannot be negative".into(),
        ));
    }
    if frequency_lock.value() < 0 {
        return Err(CyclexError::InvalidParameter(
            "frequency lock cannot be negative".into(),
        ));
    }
    if lt.kind.requires_frequency_lock() && !frequency_lock.is_set() {
        return Err(CyclexError::InvalidParameter(format!(
            "{} licenses require a frequency lock",
            lt.kind
        )));
    }
    Ok(())
}

pub(crate) struct IssuedLicense {
    pub amount: Share,
    pub queue_entry: Option<QueueEntryId>,
}

pub(crate) fn issue_license(
    st: &mut Staged<'_>,
    account: &AccountId,
    license: LicenseTypeId,
    bonus_percentage: Share,
    frequency_lock: Frequency,
    activation_time: Option<Timestamp>,
    now: Timestamp,
) -> Result<IssuedLicense, CyclexError> {
    let mut acc = st.account(account)?;
    acc.require_kind(AccountKind::Vault)?;
    let lt = st.license_type(license)?;
    check_issue_inputs(&lt, bonus_percentage, frequency_lock)?;

    let mut info = acc.license_information.take().unwrap_or_default();
    match lt.kind {
        LicenseKind::Regular | LicenseKind::LockedFrequency => {
            if let Some(held) = held_regular_rank(st, &info)? {
                if lt.amount <= held {
                    return Err(CyclexError::LicenseAlreadyIssued(lt.name.clone()));
                }
            }
        }
        LicenseKind::Chartered | LicenseKind::Promo => {
            if info.holds(license) {
                return Err(CyclexError::LicenseAlreadyIssued(lt.name.clone()));
            }
        }
    }

    let amount = apply_bonus(lt.amount, bonus_percentage)?;
    info.add_license(
        LicenseRecord {
            license,
            amount,
            base_amount: lt.amount,
            non_upgradeable_amount: 0,
            frequency_lock,
            activation_time: activation_time.unwrap_or(now),
        },
        &lt,
    );
    st.dynamic.total_cycles_issued = add_shares(st.dynamic.total_cycles_issued, amount)?;
    if lt.upgrades > 0 {
        adjust_cycle_balance(st, account, 0, Some(lt.upgrades))?;
    }

    let mut queue_entry = None;
    if lt.kind.queues_cycles() {
        let frequency = frequency_lock.or(st.dynamic.frequency);
        info.subtract_cycles(license, amount)?;
        acc.license_information = Some(info);
        queue_entry = Some(push_queue_submission(
            st, &lt.name, Some(license), &acc, amount, frequency, "", now,
        )?);
    } else {
        acc.license_information = Some(info);
    }
    st.put_account(acc);

    info!(
        account = %account,
        license = %license,
        kind = %lt.kind,
        amount,
        frequency_lock = %frequency_lock,
        "issued license"
    );
    Ok(IssuedLicense { amount, queue_entry })
}

// ── Requests ──────────────────────────────────────────────────────────────────

/// Park an issuance until the issuer approves or denies it. The rank policy
/// is checked on approval, against the holdings at that time.
pub(crate) fn request_license(
    st: &mut Staged<'_>,
    account: &AccountId,
    license: LicenseTypeId,
    bonus_percentage: Share,
    frequency_lock: Frequency,
    now: Timestamp,
) -> Result<LicenseRequestId, CyclexError> {
    st.account(account)?.require_kind(AccountKind::Vault)?;
    let lt = st.license_type(license)?;
    check_issue_inputs(&lt, bonus_percentage, frequency_lock)?;
    if let Some(pending) = st.pending_request_for(account)? {
        return Err(CyclexError::LicenseRequestPending(pending.id.to_string()));
    }

    let id = LicenseRequestId(st.dynamic.next_license_request_id);
    st.dynamic.next_license_request_id += 1;
    st.put_license_request(LicenseRequest {
        id,
        account: account.clone(),
        license,
        bonus_percentage,
        frequency_lock,
        time: now,
    });
    info!(request = %id, account = %account, license = %license, "license requested");
    Ok(id)
}

/// Issue the requested license, activated at `now`, and drop the request.
pub(crate) fn approve_license_request(
    st: &mut Staged<'_>,
    request: LicenseRequestId,
    now: Timestamp,
) -> Result<IssuedLicense, CyclexError> {
    let req = st.license_request(request)?;
    st.remove_license_request(request);
    let issued = issue_license(
        st,
        &req.account,
        req.license,
        req.bonus_percentage,
        req.frequency_lock,
        None,
        now,
    )?;
    info!(request = %request, account = %req.account, "license request approved");
    Ok(issued)
}

pub(crate) fn deny_license(st: &mut Staged<'_>, request: LicenseRequestId) -> Result<(), CyclexError> {
    let req = st.license_request(request)?;
    st.remove_license_request(request);
    info!(request = %request, account = %req.account, license = %req.license, "license request denied");
    Ok(())
}

/// Issue extra cycles against a license the account already holds. The
/// first history record for `license` receives them.
#[allow(clippy::too_many_arguments)]
pub(crate) fn issue_cycles_to_license(
    st: &mut Staged<'_>,
    authority: &AccountId,
    account: &AccountId,
    license: LicenseTypeId,
    amount: Share,
    origin: &str,
    comment: &str,
    now: Timestamp,
) -> Result<Option<QueueEntryId>, CyclexError> {
    let mut acc = st.account(account)?;
    acc.require_kind(AccountKind::Vault)?;
    if amount <= 0 {
        return Err(CyclexError::zero_amount());
    }
    check_comment(comment)?;
    let record = acc
        .license_information
        .as_ref()
        .and_then(|info| info.find(license))
        .cloned()
        .ok_or_else(|| CyclexError::LicenseNotFound(license.to_string()))?;
    let lt = st.license_type(license)?;

    let mut queue_entry = None;
    match lt.kind {
        LicenseKind::Regular | LicenseKind::LockedFrequency => {
            adjust_cycle_balance(st, account, amount, None)?;
        }
        LicenseKind::Chartered | LicenseKind::Promo => {
            let frequency = record.frequency_lock.or(st.dynamic.frequency);
            let origin = if origin.is_empty() { lt.name.as_str() } else { origin };
            queue_entry = Some(push_queue_submission(
                st, origin, Some(license), &acc, amount, frequency, comment, now,
            )?);
            let id = st.dynamic.take_history_id();
            st.record_charter(CharterIssuanceRecord {
                id,
                authority: authority.clone(),
                account: account.clone(),
                license,
                amount,
                frequency_lock: frequency,
                time: now,
            });
        }
    }

    if let Some(info) = acc.license_information.as_mut() {
        info.add_non_upgradeable_cycles(license, amount)?;
    }
    st.put_account(acc);
    st.dynamic.total_cycles_issued = add_shares(st.dynamic.total_cycles_issued, amount)?;
    debug!(account = %account, license = %license, amount, origin, "issued cycles to license");
    Ok(queue_entry)
}

/// Multiply the active license's upgradeable cycles. Returns the cycles added.
pub(crate) fn apply_upgrade(st: &mut Staged<'_>, account: &AccountId) -> Result<Share, CyclexError> {
    let mut acc = st.account(account)?;
    let mut cb = st
        .cycle_balance(account)?
        .filter(|cb| cb.remaining_upgrades > 0)
        .ok_or_else(|| CyclexError::InvalidParameter("no upgrades remaining".into()))?;
    let info = acc
        .license_information
        .as_mut()
        .ok_or_else(|| CyclexError::LicenseNotFound("no license issued".into()))?;
    let added = info.apply_balance_upgrade()?;
    cb.remaining_upgrades -= 1;
    st.put_cycle_balance(cb);
    st.put_account(acc);
    st.dynamic.total_cycles_issued = add_shares(st.dynamic.total_cycles_issued, added)?;
    info!(account = %account, added, "applied balance upgrade");
    Ok(added)
}
