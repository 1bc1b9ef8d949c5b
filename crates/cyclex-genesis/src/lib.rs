//! cyclex-genesis
//!
//! Builds the initial ledger state, writing directly into a `StateDb`
//! without going through the operation engine: chain authorities, the
//! license catalog, initial accounts, queue parameters and the starting
//! frequency.

pub mod params;

pub use params::{default_license_types, GenesisAccount, GenesisAuthorities, GenesisLicenseType, GenesisParams};

use std::collections::BTreeSet;

use cyclex_core::account::{Account, AccountKind};
use cyclex_core::error::CyclexError;
use cyclex_core::license::LicenseType;
use cyclex_core::params::{ChainAuthorities, DynamicState};
use cyclex_core::queue::FrequencyHistoryRecord;
use cyclex_core::types::{AccountId, LicenseTypeId};
use cyclex_state::StateDb;
use tracing::info;

/// What genesis created.
#[derive(Debug, Clone)]
pub struct GenesisSummary {
    pub authorities: ChainAuthorities,
    pub license_types: Vec<LicenseTypeId>,
    pub accounts: usize,
}

/// Apply the genesis state to an empty `StateDb`. Fails if genesis was
/// already applied.
pub fn apply_genesis(db: &StateDb, params: &GenesisParams) -> Result<GenesisSummary, CyclexError> {
    if db.is_initialized() {
        return Err(CyclexError::InvalidParameter("genesis already applied".into()));
    }
    params.parameters.validate()?;
    if !params.frequency.is_set() {
        return Err(CyclexError::InvalidParameter(
            "genesis frequency must be greater than zero".into(),
        ));
    }
    info!(genesis_time = params.genesis_time, "applying cyclex genesis state");

    // ── 1. Accounts ──────────────────────────────────────────────────────────
    let mut names = BTreeSet::new();
    for acc in &params.accounts {
        if !names.insert(acc.name.as_str()) {
            return Err(CyclexError::InvalidParameter(format!(
                "duplicate genesis account {}",
                acc.name
            )));
        }
        if acc.balance < 0 {
            return Err(CyclexError::InvalidParameter(format!(
                "negative balance for {}",
                acc.name
            )));
        }
        let mut account = Account::new(&acc.name, acc.kind);
        account.balance = acc.balance;
        db.put_account(&account)?;
    }

    let auth = &params.authorities;
    for name in [&auth.license_administrator, &auth.license_issuer, &auth.cycle_issuer] {
        if names.insert(name.as_str()) {
            db.put_account(&Account::new(name, AccountKind::Wallet))?;
        }
    }
    let authorities = ChainAuthorities {
        license_administrator: AccountId::from_name(&auth.license_administrator),
        license_issuer: AccountId::from_name(&auth.license_issuer),
        cycle_issuer: AccountId::from_name(&auth.cycle_issuer),
    };
    db.put_authorities(&authorities)?;
    info!(accounts = names.len(), "genesis: accounts created");

    // ── 2. License catalog ───────────────────────────────────────────────────
    let mut license_types = Vec::with_capacity(params.license_types.len());
    for (i, t) in params.license_types.iter().enumerate() {
        if db.get_license_type_by_name(&t.name)?.is_some() {
            return Err(CyclexError::LicenseTypeExists(t.name.clone()));
        }
        let lt = LicenseType {
            id: LicenseTypeId(i as u64),
            name: t.name.clone(),
            amount: t.amount,
            kind: t.kind,
            balance_multipliers: t.balance_multipliers.clone(),
            requeue_multipliers: t.requeue_multipliers.clone(),
            return_multipliers: t.return_multipliers.clone(),
            upgrades: t.upgrades,
        };
        lt.validate()?;
        db.put_license_type(&lt)?;
        license_types.push(lt.id);
    }
    info!(license_types = license_types.len(), "genesis: license catalog created");

    // ── 3. Parameters, frequency, counters ───────────────────────────────────
    db.put_parameters(&params.parameters)?;
    db.put_frequency_record(&FrequencyHistoryRecord {
        id: 0,
        authority: authorities.license_issuer.clone(),
        frequency: params.frequency,
        time: params.genesis_time,
        comment: "genesis".into(),
    })?;
    db.put_dynamic_state(&DynamicState {
        frequency: params.frequency,
        next_reward_time: params.genesis_time,
        next_license_type_id: license_types.len() as u64,
        next_history_id: 1,
        ..Default::default()
    })?;
    info!(
        frequency = %params.frequency,
        reward_interval = params.parameters.reward_interval_time_seconds,
        reward_amount = params.parameters.dascoin_reward_amount,
        "genesis: parameters set"
    );

    db.flush()?;
    info!("genesis state committed to disk");

    Ok(GenesisSummary {
        authorities,
        license_types,
        accounts: names.len(),
    })
}
