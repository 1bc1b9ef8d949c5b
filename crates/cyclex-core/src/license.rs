use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::amount::{add_shares, Frequency};
use crate::constants::MAX_LICENSE_NAME_BYTES;
use crate::error::CyclexError;
use crate::types::{AccountId, LicenseRequestId, LicenseTypeId, Share, Timestamp};

// ── LicenseKind ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LicenseKind {
    /// Cycles accrue to the license and the free balance.
    Regular,
    /// Like `Regular`, but the license must carry a frequency lock.
    LockedFrequency,
    /// Cycles go straight to the reward queue at the locked frequency.
    Chartered,
    /// Promotional grant, queued like `Chartered`.
    Promo,
}

impl LicenseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseKind::Regular => "regular",
            LicenseKind::LockedFrequency => "locked_frequency",
            LicenseKind::Chartered => "chartered",
            LicenseKind::Promo => "promo",
        }
    }

    /// True for kinds whose cycles bypass the free balance and enter the queue.
    pub fn queues_cycles(&self) -> bool {
        match self {
            LicenseKind::Regular | LicenseKind::LockedFrequency => false,
            LicenseKind::Chartered | LicenseKind::Promo => true,
        }
    }

    pub fn requires_frequency_lock(&self) -> bool {
        match self {
            LicenseKind::LockedFrequency | LicenseKind::Chartered => true,
            LicenseKind::Regular | LicenseKind::Promo => false,
        }
    }
}

impl fmt::Display for LicenseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LicenseKind {
    type Err = CyclexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regular" => Ok(LicenseKind::Regular),
            "locked_frequency" => Ok(LicenseKind::LockedFrequency),
            "chartered" => Ok(LicenseKind::Chartered),
            "promo" => Ok(LicenseKind::Promo),
            other => Err(CyclexError::InvalidParameter(format!(
                "unknown license kind: {other}"
            ))),
        }
    }
}

// ── UpgradeType ───────────────────────────────────────────────────────────────

/// Multiplier list plus a usage counter. Each application consumes the next
/// multiplier; the upgrade is exhausted once every multiplier has been used.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct UpgradeType {
    pub multipliers: Vec<u32>,
    pub used: u8,
}

impl UpgradeType {
    pub fn new(multipliers: Vec<u32>) -> Self {
        Self { multipliers, used: 0 }
    }

    pub fn is_exhausted(&self) -> bool {
        self.used as usize >= self.multipliers.len()
    }

    pub fn next_multiplier(&self) -> Option<u32> {
        self.multipliers.get(self.used as usize).copied()
    }

    /// Multiply `amount` by the next multiplier and mark it used.
    /// Returns `None` when exhausted.
    pub fn apply(&mut self, amount: Share) -> Result<Option<Share>, CyclexError> {
        let Some(m) = self.next_multiplier() else {
            return Ok(None);
        };
        let upgraded = amount
            .checked_mul(m as Share)
            .ok_or_else(|| CyclexError::ArithmeticError("overflow in upgrade".into()))?;
        self.used += 1;
        Ok(Some(upgraded))
    }
}

// ── LicenseType ───────────────────────────────────────────────────────────────

/// Catalog entry. Ranked by `amount`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LicenseType {
    pub id: LicenseTypeId,
    pub name: String,
    /// Base cycles granted by the license.
    pub amount: Share,
    pub kind: LicenseKind,
    pub balance_multipliers: Vec<u32>,
    pub requeue_multipliers: Vec<u32>,
    pub return_multipliers: Vec<u32>,
    /// Upgrade applications granted to the holder on issuance.
    #[serde(default)]
    pub upgrades: u8,
}

impl LicenseType {
    pub fn validate(&self) -> Result<(), CyclexError> {
        validate_license_name(&self.name)?;
        if self.amount <= 0 {
            return Err(CyclexError::InvalidParameter(
                "license amount must be greater than zero".into(),
            ));
        }
        let lists = [
            &self.balance_multipliers,
            &self.requeue_multipliers,
            &self.return_multipliers,
        ];
        if lists.iter().any(|l| l.iter().any(|m| *m == 0)) {
            return Err(CyclexError::InvalidParameter(
                "upgrade multipliers must be positive".into(),
            ));
        }
        Ok(())
    }

    /// True if `self` ranks strictly above `other`.
    pub fn outranks(&self, other: &LicenseType) -> bool {
        self.amount > other.amount
    }
}

pub fn validate_license_name(name: &str) -> Result<(), CyclexError> {
    if name.is_empty() || name.len() > MAX_LICENSE_NAME_BYTES {
        return Err(CyclexError::InvalidParameter(format!(
            "license name must be 1..={MAX_LICENSE_NAME_BYTES} bytes"
        )));
    }
    Ok(())
}

// ── LicenseRecord ─────────────────────────────────────────────────────────────

/// One issued license in an account's history.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LicenseRecord {
    pub license: LicenseTypeId,
    /// Upgradeable cycles currently held by the license.
    pub amount: Share,
    /// Cycles granted before the issuance bonus.
    pub base_amount: Share,
    /// Cycles issued to the license later on; never multiplied by upgrades.
    pub non_upgradeable_amount: Share,
    pub frequency_lock: Frequency,
    pub activation_time: Timestamp,
}

impl LicenseRecord {
    pub fn total_cycles(&self) -> Share {
        self.amount + self.non_upgradeable_amount
    }
}

// ── LicenseRequest ────────────────────────────────────────────────────────────

/// A license issuance waiting for approval. Approval replays it as an
/// ordinary issuance; denial drops it. An account has at most one pending.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LicenseRequest {
    pub id: LicenseRequestId,
    pub account: AccountId,
    pub license: LicenseTypeId,
    pub bonus_percentage: Share,
    pub frequency_lock: Frequency,
    pub time: Timestamp,
}

// ── LicenseInformation ────────────────────────────────────────────────────────

/// Per-account license history. Append-only; insertion order is activation
/// order.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct LicenseInformation {
    pub history: Vec<LicenseRecord>,
    pub max_license: Option<LicenseTypeId>,
    pub frequency_lock: Frequency,
    pub balance_upgrade: UpgradeType,
    pub requeue_upgrade: UpgradeType,
    pub return_upgrade: UpgradeType,
}

impl LicenseInformation {
    /// Append a record and make it the active license.
    pub fn add_license(&mut self, record: LicenseRecord, license_type: &LicenseType) {
        self.max_license = Some(record.license);
        self.frequency_lock = record.frequency_lock;
        self.balance_upgrade = UpgradeType::new(license_type.balance_multipliers.clone());
        self.requeue_upgrade = UpgradeType::new(license_type.requeue_multipliers.clone());
        self.return_upgrade = UpgradeType::new(license_type.return_multipliers.clone());
        self.history.push(record);
    }

    /// First record issued for `license`, scanning from the oldest.
    pub fn find(&self, license: LicenseTypeId) -> Option<&LicenseRecord> {
        self.history.iter().find(|r| r.license == license)
    }

    fn find_mut(&mut self, license: LicenseTypeId) -> Result<&mut LicenseRecord, CyclexError> {
        self.history
            .iter_mut()
            .find(|r| r.license == license)
            .ok_or_else(|| CyclexError::LicenseNotFound(license.to_string()))
    }

    pub fn holds(&self, license: LicenseTypeId) -> bool {
        self.find(license).is_some()
    }

    pub fn add_non_upgradeable_cycles(
        &mut self,
        license: LicenseTypeId,
        amount: Share,
    ) -> Result<(), CyclexError> {
        let rec = self.find_mut(license)?;
        rec.non_upgradeable_amount = add_shares(rec.non_upgradeable_amount, amount)?;
        Ok(())
    }

    /// Draw `amount` upgradeable cycles from the record for `license`.
    pub fn subtract_cycles(&mut self, license: LicenseTypeId, amount: Share) -> Result<(), CyclexError> {
        let rec = self.find_mut(license)?;
        if amount > rec.amount {
            return Err(CyclexError::InsufficientBalance {
                asset: "license cycles",
                need: amount,
                have: rec.amount,
            });
        }
        rec.amount -= amount;
        Ok(())
    }

    /// Multiply the active license's upgradeable cycles by the next balance
    /// multiplier. Returns the number of cycles added.
    pub fn apply_balance_upgrade(&mut self) -> Result<Share, CyclexError> {
        let rec = self
            .history
            .last_mut()
            .ok_or_else(|| CyclexError::LicenseNotFound("no license issued".into()))?;
        let upgraded = self.balance_upgrade.apply(rec.amount)?.ok_or_else(|| {
            CyclexError::InvalidParameter("balance upgrade exhausted".into())
        })?;
        let added = upgraded - rec.amount;
        rec.amount = upgraded;
        Ok(added)
    }

    /// Sum of upgradeable cycles still held across the whole history.
    pub fn upgradeable_total(&self) -> Share {
        self.history.iter().map(|r| r.amount).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lt(id: u64, amount: Share, kind: LicenseKind) -> LicenseType {
        LicenseType {
            id: LicenseTypeId(id),
            name: format!("lt{id}"),
            amount,
            kind,
            balance_multipliers: vec![2, 3],
            requeue_multipliers: vec![],
            return_multipliers: vec![],
            upgrades: 1,
        }
    }

    fn record(id: u64, amount: Share, lock: Share) -> LicenseRecord {
        LicenseRecord {
            license: LicenseTypeId(id),
            amount,
            base_amount: amount,
            non_upgradeable_amount: 0,
            frequency_lock: Frequency(lock),
            activation_time: 0,
        }
    }

    #[test]
    fn kind_parses_and_dispatches() {
        assert_eq!("chartered".parse::<LicenseKind>().unwrap(), LicenseKind::Chartered);
        assert!("gold".parse::<LicenseKind>().is_err());
        assert!(LicenseKind::Promo.queues_cycles());
        assert!(!LicenseKind::LockedFrequency.queues_cycles());
    }

    #[test]
    fn first_match_wins() {
        let t = lt(1, 100, LicenseKind::Regular);
        let mut info = LicenseInformation::default();
        info.add_license(record(1, 100, 200), &t);
        info.add_license(record(1, 500, 300), &t);
        assert_eq!(info.find(LicenseTypeId(1)).unwrap().frequency_lock, Frequency(200));
        info.subtract_cycles(LicenseTypeId(1), 40).unwrap();
        assert_eq!(info.history[0].amount, 60);
        assert_eq!(info.history[1].amount, 500);
        assert_eq!(info.frequency_lock, Frequency(300));
    }

    #[test]
    fn subtract_beyond_amount_fails() {
        let t = lt(1, 100, LicenseKind::Regular);
        let mut info = LicenseInformation::default();
        info.add_license(record(1, 100, 200), &t);
        info.add_non_upgradeable_cycles(LicenseTypeId(1), 50).unwrap();
        let err = info.subtract_cycles(LicenseTypeId(1), 101).unwrap_err();
        assert!(matches!(err, CyclexError::InsufficientBalance { .. }));
        assert_eq!(info.history[0].total_cycles(), 150);
        assert!(matches!(
            info.subtract_cycles(LicenseTypeId(9), 1),
            Err(CyclexError::LicenseNotFound(_))
        ));
    }

    #[test]
    fn balance_upgrade_leaves_non_upgradeable_alone() {
        let t = lt(1, 100, LicenseKind::Regular);
        let mut info = LicenseInformation::default();
        info.add_license(record(1, 100, 200), &t);
        info.add_non_upgradeable_cycles(LicenseTypeId(1), 30).unwrap();
        assert_eq!(info.apply_balance_upgrade().unwrap(), 100);
        assert_eq!(info.apply_balance_upgrade().unwrap(), 400);
        assert_eq!(info.history[0].amount, 600);
        assert_eq!(info.history[0].non_upgradeable_amount, 30);
        assert!(info.apply_balance_upgrade().is_err());
    }

    #[test]
    fn ranking_by_amount() {
        let small = lt(1, 100, LicenseKind::Regular);
        let big = lt(2, 1000, LicenseKind::Regular);
        assert!(big.outranks(&small));
        assert!(!small.outranks(&small));
    }
}
