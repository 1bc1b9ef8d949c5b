use thiserror::Error;

use crate::types::Share;

#[derive(Debug, Error, PartialEq)]
pub enum CyclexError {
    // ── Authority / accounts ─────────────────────────────────────────────────
    #[error("not authorized: {role} requires {required}, signed by {signer}")]
    NotAuthorized {
        role: &'static str,
        required: String,
        signer: String,
    },

    #[error("account {account} must be a {expected} account")]
    InvalidAccountClass {
        account: String,
        expected: &'static str,
    },

    #[error("unknown account: {0}")]
    UnknownAccount(String),

    // ── Balances ─────────────────────────────────────────────────────────────
    #[error("insufficient {asset} balance: need {need}, have {have}")]
    InsufficientBalance {
        asset: &'static str,
        need: Share,
        have: Share,
    },

    #[error("daily limit exceeded: {spent} of {max} already spent, {requested} requested")]
    DailyLimitExceeded {
        max: Share,
        spent: Share,
        requested: Share,
    },

    // ── Licenses ─────────────────────────────────────────────────────────────
    #[error("license not found: {0}")]
    LicenseNotFound(String),

    #[error("license already issued: {0}")]
    LicenseAlreadyIssued(String),

    #[error("license type not found: {0}")]
    LicenseTypeNotFound(String),

    #[error("license type already exists: {0}")]
    LicenseTypeExists(String),

    #[error("license request not found: {0}")]
    LicenseRequestNotFound(String),

    #[error("license request already pending: {0}")]
    LicenseRequestPending(String),

    // ── Queue / frequency ────────────────────────────────────────────────────
    #[error("frequency mismatch: expected {expected}, got {got}")]
    FrequencyMismatch { expected: Share, got: Share },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("arithmetic error: {0}")]
    ArithmeticError(String),

    #[error("feature not active: {0}")]
    FeatureNotActive(String),

    // ── Serialization / storage ──────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl CyclexError {
    pub fn zero_amount() -> Self {
        CyclexError::InvalidParameter("amount must be greater than zero".into())
    }
}
