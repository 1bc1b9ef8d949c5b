use serde::{Deserialize, Serialize};

use crate::amount::Frequency;
use crate::constants::*;
use crate::error::CyclexError;
use crate::types::{AccountId, HistoryId, Share, Timestamp};

// ── ChainParameters ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChainParameters {
    pub block_interval: u32,
    pub enable_dascoin_queue: bool,
    pub enable_cycle_issuing: bool,
    /// Always a non-zero multiple of `block_interval`.
    pub reward_interval_time_seconds: u32,
    /// Coin budget minted per reward interval.
    pub dascoin_reward_amount: Share,
}

impl Default for ChainParameters {
    fn default() -> Self {
        Self {
            block_interval: DEFAULT_BLOCK_INTERVAL_SECS,
            enable_dascoin_queue: true,
            enable_cycle_issuing: true,
            reward_interval_time_seconds: DEFAULT_REWARD_INTERVAL_SECS,
            dascoin_reward_amount: DEFAULT_DASCOIN_REWARD_AMOUNT,
        }
    }
}

impl ChainParameters {
    pub fn validate(&self) -> Result<(), CyclexError> {
        if self.block_interval == 0 {
            return Err(CyclexError::InvalidParameter(
                "block_interval must be non-zero".into(),
            ));
        }
        validate_reward_interval(self.reward_interval_time_seconds, self.block_interval)?;
        if self.dascoin_reward_amount <= 0 {
            return Err(CyclexError::InvalidParameter(
                "dascoin_reward_amount must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

pub fn validate_reward_interval(interval: u32, block_interval: u32) -> Result<(), CyclexError> {
    if interval == 0 || block_interval == 0 || interval % block_interval != 0 {
        return Err(CyclexError::InvalidParameter(format!(
            "reward interval {interval}s must be a non-zero multiple of the block interval {block_interval}s"
        )));
    }
    Ok(())
}

/// Reward amounts submitted before the precision cutover were expressed with
/// one decimal fewer. Identity once the cutover has passed.
pub fn migrate_reward_amount(amount: Share, now: Timestamp) -> Result<Share, CyclexError> {
    if now < PRECISION_MIGRATION_CUTOVER {
        amount
            .checked_mul(PRECISION_MIGRATION_FACTOR)
            .ok_or_else(|| CyclexError::ArithmeticError("overflow in reward migration".into()))
    } else {
        Ok(amount)
    }
}

// ── ChainAuthorities ──────────────────────────────────────────────────────────

/// Accounts allowed to sign privileged operations.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChainAuthorities {
    pub license_administrator: AccountId,
    pub license_issuer: AccountId,
    pub cycle_issuer: AccountId,
}

/// Privileged roles, used for authority checks and error messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Authority {
    LicenseAdministrator,
    LicenseIssuer,
    CycleIssuer,
}

impl Authority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Authority::LicenseAdministrator => "license_administrator",
            Authority::LicenseIssuer => "license_issuer",
            Authority::CycleIssuer => "cycle_issuer",
        }
    }
}

impl ChainAuthorities {
    pub fn account(&self, role: Authority) -> &AccountId {
        match role {
            Authority::LicenseAdministrator => &self.license_administrator,
            Authority::LicenseIssuer => &self.license_issuer,
            Authority::CycleIssuer => &self.cycle_issuer,
        }
    }

    pub fn require(&self, role: Authority, signer: &AccountId) -> Result<(), CyclexError> {
        let required = self.account(role);
        if required != signer {
            return Err(CyclexError::NotAuthorized {
                role: role.as_str(),
                required: required.to_string(),
                signer: signer.to_string(),
            });
        }
        Ok(())
    }
}

// ── DynamicState ──────────────────────────────────────────────────────────────

/// Mutable global counters and the current network frequency.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct DynamicState {
    pub frequency: Frequency,
    pub next_reward_time: Timestamp,
    pub next_queue_id: u64,
    pub next_license_type_id: u64,
    pub next_license_request_id: u64,
    pub next_history_id: HistoryId,
    /// Cycles that entered circulation (free, license or queue).
    pub total_cycles_issued: Share,
    /// Cycles that left circulation through the queue processor.
    pub total_cycles_converted: Share,
    /// Cycles currently sitting in the reward queue.
    pub queued_cycles: Share,
    pub total_dascoin_minted: Share,
}

impl DynamicState {
    /// Cycles that should be held somewhere (free balances, licenses, queue).
    pub fn cycles_outstanding(&self) -> Share {
        self.total_cycles_issued - self.total_cycles_converted
    }

    pub fn take_history_id(&mut self) -> HistoryId {
        let id = self.next_history_id;
        self.next_history_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_applies_only_before_cutover() {
        assert_eq!(migrate_reward_amount(1_000, PRECISION_MIGRATION_CUTOVER - 1).unwrap(), 10_000);
        assert_eq!(migrate_reward_amount(1_000, PRECISION_MIGRATION_CUTOVER).unwrap(), 1_000);
        assert!(migrate_reward_amount(i64::MAX, 0).is_err());
    }

    #[test]
    fn reward_interval_must_be_block_multiple() {
        assert!(validate_reward_interval(600, 5).is_ok());
        assert!(validate_reward_interval(602, 5).is_err());
        assert!(validate_reward_interval(0, 5).is_err());
        assert!(ChainParameters::default().validate().is_ok());
    }

    #[test]
    fn authority_check() {
        let auth = ChainAuthorities {
            license_administrator: AccountId::from_name("admin"),
            license_issuer: AccountId::from_name("issuer"),
            cycle_issuer: AccountId::from_name("cycles"),
        };
        assert!(auth.require(Authority::LicenseIssuer, &AccountId::from_name("issuer")).is_ok());
        let err = auth
            .require(Authority::CycleIssuer, &AccountId::from_name("issuer"))
            .unwrap_err();
        assert!(matches!(err, CyclexError::NotAuthorized { role: "cycle_issuer", .. }));
    }
}
