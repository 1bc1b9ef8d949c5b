use serde::{Deserialize, Serialize};

use crate::constants::SPEND_LIMIT_WINDOW_SECS;
use crate::error::CyclexError;
use crate::license::LicenseInformation;
use crate::types::{AccountId, Share, Timestamp};

// ── AccountKind ───────────────────────────────────────────────────────────────

/// Vaults hold licenses and submit cycles; wallets hold spendable coin and
/// purchase cycles.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Vault,
    Wallet,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Vault => "vault",
            AccountKind::Wallet => "wallet",
        }
    }
}

// ── Account ───────────────────────────────────────────────────────────────────

/// Account state as stored in the state DB.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub account_id: AccountId,
    pub name: String,
    pub kind: AccountKind,
    /// Coin balance in shares.
    pub balance: Share,
    /// Present once the first license has been issued.
    #[serde(default)]
    pub license_information: Option<LicenseInformation>,
}

impl Account {
    pub fn new(name: &str, kind: AccountKind) -> Self {
        Self {
            account_id: AccountId::from_name(name),
            name: name.to_string(),
            kind,
            balance: 0,
            license_information: None,
        }
    }

    pub fn is_vault(&self) -> bool {
        self.kind == AccountKind::Vault
    }

    pub fn is_wallet(&self) -> bool {
        self.kind == AccountKind::Wallet
    }

    /// Fails with `InvalidAccountClass` unless the account is of `kind`.
    pub fn require_kind(&self, kind: AccountKind) -> Result<(), CyclexError> {
        if self.kind != kind {
            return Err(CyclexError::InvalidAccountClass {
                account: self.name.clone(),
                expected: kind.as_str(),
            });
        }
        Ok(())
    }

    /// Apply a signed delta to the coin balance.
    pub fn adjust_balance(&mut self, delta: Share) -> Result<(), CyclexError> {
        let next = self
            .balance
            .checked_add(delta)
            .ok_or_else(|| CyclexError::ArithmeticError("coin balance overflow".into()))?;
        if next < 0 {
            return Err(CyclexError::InsufficientBalance {
                asset: "coin",
                need: -delta,
                have: self.balance,
            });
        }
        self.balance = next;
        Ok(())
    }
}

// ── SpendLimit ────────────────────────────────────────────────────────────────

/// Daily cap on cycles a user may move out of the free balance.
/// `max == 0` disables the limit.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SpendLimit {
    pub max: Share,
    pub spent: Share,
    pub last_reset: Timestamp,
}

impl SpendLimit {
    fn rolled(&self, now: Timestamp) -> Share {
        if now - self.last_reset >= SPEND_LIMIT_WINDOW_SECS {
            0
        } else {
            self.spent
        }
    }

    /// Check that `amount` fits into the window containing `now`.
    pub fn check(&self, amount: Share, now: Timestamp) -> Result<(), CyclexError> {
        if self.max == 0 {
            return Ok(());
        }
        let spent = self.rolled(now);
        let total = spent
            .checked_add(amount)
            .ok_or_else(|| CyclexError::ArithmeticError("spend limit overflow".into()))?;
        if total > self.max {
            return Err(CyclexError::DailyLimitExceeded {
                max: self.max,
                spent,
                requested: amount,
            });
        }
        Ok(())
    }

    /// Record `amount` as spent, opening a new window when the old one expired.
    pub fn spend(&mut self, amount: Share, now: Timestamp) -> Result<(), CyclexError> {
        if now - self.last_reset >= SPEND_LIMIT_WINDOW_SECS {
            self.spent = 0;
            self.last_reset = now;
        }
        self.spent = self
            .spent
            .checked_add(amount)
            .ok_or_else(|| CyclexError::ArithmeticError("spend limit overflow".into()))?;
        Ok(())
    }
}

// ── CycleBalance ──────────────────────────────────────────────────────────────

/// Free (un-queued) cycles of one account.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CycleBalance {
    pub owner: AccountId,
    pub balance: Share,
    pub remaining_upgrades: u8,
    #[serde(default)]
    pub limit: SpendLimit,
}

impl CycleBalance {
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            balance: 0,
            remaining_upgrades: 0,
            limit: SpendLimit::default(),
        }
    }

    /// Apply `delta` to the free balance and add `upgrades` to the pending
    /// upgrade count. The balance never goes negative.
    pub fn adjust(&mut self, delta: Share, upgrades: Option<u8>) -> Result<(), CyclexError> {
        let remaining_upgrades = match upgrades {
            Some(0) => {
                return Err(CyclexError::InvalidParameter(
                    "upgrades must be increased by a positive amount".into(),
                ))
            }
            Some(u) => self.remaining_upgrades.checked_add(u).ok_or_else(|| {
                CyclexError::InvalidParameter(format!(
                    "upgrade count overflow: {} pending, {u} more",
                    self.remaining_upgrades
                ))
            })?,
            None => self.remaining_upgrades,
        };
        let next = self
            .balance
            .checked_add(delta)
            .ok_or_else(|| CyclexError::ArithmeticError("cycle balance overflow".into()))?;
        if next < 0 {
            return Err(CyclexError::InsufficientBalance {
                asset: "cycles",
                need: -delta,
                have: self.balance,
            });
        }
        self.balance = next;
        self.remaining_upgrades = remaining_upgrades;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_balance_never_negative() {
        let mut cb = CycleBalance::new(AccountId::from_name("v"));
        cb.adjust(100, None).unwrap();
        let err = cb.adjust(-101, None).unwrap_err();
        assert!(matches!(err, CyclexError::InsufficientBalance { need: 101, have: 100, .. }));
        assert_eq!(cb.balance, 100);
        cb.adjust(-100, None).unwrap();
        assert_eq!(cb.balance, 0);
    }

    #[test]
    fn zero_upgrades_rejected() {
        let mut cb = CycleBalance::new(AccountId::from_name("v"));
        assert!(cb.adjust(10, Some(0)).is_err());
        cb.adjust(10, Some(2)).unwrap();
        assert_eq!(cb.remaining_upgrades, 2);
    }

    #[test]
    fn spend_limit_resets_after_window() {
        let mut l = SpendLimit { max: 100, spent: 0, last_reset: 0 };
        l.check(60, 10).unwrap();
        l.spend(60, 10).unwrap();
        assert!(l.check(50, 20).is_err());
        l.check(50, 10 + SPEND_LIMIT_WINDOW_SECS).unwrap();
        l.spend(50, 10 + SPEND_LIMIT_WINDOW_SECS).unwrap();
        assert_eq!(l.spent, 50);
    }

    #[test]
    fn overflowing_counters_are_errors() {
        let mut l = SpendLimit { max: i64::MAX, spent: i64::MAX - 1, last_reset: 0 };
        assert!(matches!(l.check(10, 5), Err(CyclexError::ArithmeticError(_))));
        assert!(matches!(l.spend(10, 5), Err(CyclexError::ArithmeticError(_))));

        let mut cb = CycleBalance::new(AccountId::from_name("v"));
        cb.adjust(0, Some(250)).unwrap();
        let err = cb.adjust(5, Some(10)).unwrap_err();
        assert!(matches!(err, CyclexError::InvalidParameter(_)));
        assert_eq!(cb.remaining_upgrades, 250);
        assert_eq!(cb.balance, 0);
    }

    #[test]
    fn unlimited_when_max_is_zero() {
        let l = SpendLimit::default();
        l.check(i64::MAX / 2, 0).unwrap();
    }
}
