use serde::{Deserialize, Serialize};

use crate::amount::Frequency;
use crate::error::CyclexError;
use crate::license::LicenseKind;
use crate::types::{AccountId, LicenseRequestId, LicenseTypeId, QueueEntryId, Share, Timestamp};

// ── Action ────────────────────────────────────────────────────────────────────

/// Every state-changing operation on the cycle ledger is one of these variants.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum Action {
    // ── License catalog (license administrator) ───────────────────────────────

    CreateLicenseType {
        name: String,
        amount: Share,
        kind: LicenseKind,
        balance_multipliers: Vec<u32>,
        requeue_multipliers: Vec<u32>,
        return_multipliers: Vec<u32>,
        #[serde(default)]
        upgrades: u8,
    },

    /// Sparse update: `None` fields keep their value.
    EditLicenseType {
        license: LicenseTypeId,
        name: Option<String>,
        amount: Option<Share>,
        kind: Option<LicenseKind>,
    },

    DeleteLicenseType {
        license: LicenseTypeId,
    },

    // ── Licenses (license issuer) ─────────────────────────────────────────────

    IssueLicense {
        account: AccountId,
        license: LicenseTypeId,
        bonus_percentage: Share,
        frequency_lock: Frequency,
        /// Defaults to the operation time.
        activation_time: Option<Timestamp>,
    },

    /// Record a license issuance for later approval or denial.
    RequestLicense {
        account: AccountId,
        license: LicenseTypeId,
        bonus_percentage: Share,
        frequency_lock: Frequency,
    },

    /// Issue the license of a pending request, activated now.
    ApproveLicenseRequest {
        request: LicenseRequestId,
    },

    /// Drop a pending request without issuing anything.
    DenyLicense {
        request: LicenseRequestId,
    },

    /// Multiply the active license's cycles by the next balance multiplier.
    ApplyUpgrade {
        account: AccountId,
    },

    UpdateCycleLimit {
        account: AccountId,
        max: Share,
    },

    // ── Cycle issuing (cycle issuer) ──────────────────────────────────────────

    IssueFreeCycles {
        account: AccountId,
        amount: Share,
        origin: String,
        comment: String,
    },

    IssueCyclesToLicense {
        account: AccountId,
        license: LicenseTypeId,
        amount: Share,
        origin: String,
        comment: String,
    },

    /// Put freshly issued cycles straight into the reward queue.
    SubmitReserveCycles {
        account: AccountId,
        amount: Share,
        frequency_lock: Frequency,
        comment: String,
    },

    // ── Account-signed ────────────────────────────────────────────────────────

    /// Move free cycles of the signer into the queue at the current frequency.
    SubmitCycles {
        amount: Share,
        frequency: Frequency,
        comment: String,
    },

    /// Move cycles held by one of the signer's licenses into the queue.
    SubmitCyclesByLicense {
        license: LicenseTypeId,
        amount: Share,
        frequency_lock: Frequency,
        comment: String,
    },

    /// Spend wallet coin on free cycles at the current frequency.
    PurchaseCycles {
        amount: Share,
        frequency: Frequency,
        expected_cycles: Share,
    },

    // ── Global parameters (license issuer) ────────────────────────────────────

    UpdateQueueParameters {
        enable_dascoin_queue: Option<bool>,
        enable_cycle_issuing: Option<bool>,
        reward_interval_time_seconds: Option<u32>,
        dascoin_reward_amount: Option<Share>,
    },

    UpdateGlobalFrequency {
        frequency: Frequency,
        comment: String,
    },
}

impl Action {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Action::CreateLicenseType { .. } => "create_license_type",
            Action::EditLicenseType { .. } => "edit_license_type",
            Action::DeleteLicenseType { .. } => "delete_license_type",
            Action::IssueLicense { .. } => "issue_license",
            Action::RequestLicense { .. } => "request_license",
            Action::ApproveLicenseRequest { .. } => "approve_license_request",
            Action::DenyLicense { .. } => "deny_license",
            Action::ApplyUpgrade { .. } => "apply_upgrade",
            Action::UpdateCycleLimit { .. } => "update_cycle_limit",
            Action::IssueFreeCycles { .. } => "issue_free_cycles",
            Action::IssueCyclesToLicense { .. } => "issue_cycles_to_license",
            Action::SubmitReserveCycles { .. } => "submit_reserve_cycles",
            Action::SubmitCycles { .. } => "submit_cycles",
            Action::SubmitCyclesByLicense { .. } => "submit_cycles_by_license",
            Action::PurchaseCycles { .. } => "purchase_cycles",
            Action::UpdateQueueParameters { .. } => "update_queue_parameters",
            Action::UpdateGlobalFrequency { .. } => "update_global_frequency",
        }
    }
}

// ── Operation ─────────────────────────────────────────────────────────────────

/// A batch of actions authorized by one signer. Applied atomically: either
/// every action commits or none does.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Operation {
    pub signer: AccountId,
    pub actions: Vec<Action>,
}

impl Operation {
    pub fn new(signer: AccountId, action: Action) -> Self {
        Self {
            signer,
            actions: vec![action],
        }
    }

    /// BLAKE3 of the canonical bincode encoding, hex encoded.
    pub fn op_id(&self) -> Result<String, CyclexError> {
        let bytes =
            bincode::serialize(self).map_err(|e| CyclexError::Serialization(e.to_string()))?;
        Ok(hex::encode(blake3::hash(&bytes).as_bytes()))
    }
}

/// What an applied operation created.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct OperationReceipt {
    pub op_id: String,
    pub queue_entries: Vec<QueueEntryId>,
    pub license_types: Vec<LicenseTypeId>,
    pub license_requests: Vec<LicenseRequestId>,
}
