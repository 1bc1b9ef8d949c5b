use std::sync::Arc;

use cyclex_core::amount::Frequency;
use cyclex_core::error::CyclexError;
use cyclex_core::params::{migrate_reward_amount, validate_reward_interval, Authority};
use cyclex_core::queue::FrequencyHistoryRecord;
use cyclex_core::transaction::{Action, Operation, OperationReceipt};
use cyclex_core::types::{AccountId, Share, Timestamp};
use tracing::{debug, info};

use crate::cycles;
use crate::db::StateDb;
use crate::ledger::{self, NewLicenseType};
use crate::reward_queue::{self, check_comment};
use crate::staged::Staged;

// ── StateEngine ───────────────────────────────────────────────────────────────

/// The state transition engine.
///
/// Validates and applies operations to the persistent state database.
/// Each `apply` call is atomic: either all actions succeed or none do.
pub struct StateEngine {
    pub db: Arc<StateDb>,
}

impl StateEngine {
    pub fn new(db: Arc<StateDb>) -> Self {
        Self { db }
    }

    /// Validate and apply an operation.
    pub fn apply(&self, op: &Operation, now: Timestamp) -> Result<OperationReceipt, CyclexError> {
        if op.actions.is_empty() {
            return Err(CyclexError::InvalidParameter("operation has no actions".into()));
        }
        let mut staged = Staged::new(&self.db)?;
        let mut receipt = OperationReceipt {
            op_id: op.op_id()?,
            ..Default::default()
        };

        for action in &op.actions {
            self.apply_action(action, &op.signer, &mut staged, now, &mut receipt)?;
            debug!(op_id = %receipt.op_id, action = action.name(), "action staged");
        }

        // ── Commit ────────────────────────────────────────────────────────────
        staged.commit()?;

        info!(
            op_id = %receipt.op_id,
            signer = %op.signer,
            actions = op.actions.len(),
            "applied operation"
        );
        Ok(receipt)
    }

    fn require(staged: &Staged<'_>, role: Authority, signer: &AccountId) -> Result<(), CyclexError> {
        staged.authorities.require(role, signer)
    }

    // ── Action dispatch ───────────────────────────────────────────────────────

    fn apply_action(
        &self,
        action: &Action,
        signer: &AccountId,
        st: &mut Staged<'_>,
        now: Timestamp,
        receipt: &mut OperationReceipt,
    ) -> Result<(), CyclexError> {
        match action {
            // ── License catalog ──────────────────────────────────────────────
            Action::CreateLicenseType {
                name,
                amount,
                kind,
                balance_multipliers,
                requeue_multipliers,
                return_multipliers,
                upgrades,
            } => {
                Self::require(st, Authority::LicenseAdministrator, signer)?;
                let id = ledger::create_license_type(
                    st,
                    NewLicenseType {
                        name,
                        amount: *amount,
                        kind: *kind,
                        balance_multipliers,
                        requeue_multipliers,
                        return_multipliers,
                        upgrades: *upgrades,
                    },
                )?;
                receipt.license_types.push(id);
            }

            Action::EditLicenseType { license, name, amount, kind } => {
                Self::require(st, Authority::LicenseAdministrator, signer)?;
                ledger::edit_license_type(st, *license, name.as_deref(), *amount, *kind)?;
            }

            Action::DeleteLicenseType { license } => {
                Self::require(st, Authority::LicenseAdministrator, signer)?;
                ledger::delete_license_type(st, *license)?;
            }

            // ── Licenses ─────────────────────────────────────────────────────
            Action::IssueLicense {
                account,
                license,
                bonus_percentage,
                frequency_lock,
                activation_time,
            } => {
                Self::require(st, Authority::LicenseIssuer, signer)?;
                let issued = ledger::issue_license(
                    st,
                    account,
                    *license,
                    *bonus_percentage,
                    *frequency_lock,
                    *activation_time,
                    now,
                )?;
                debug!(account = %account, license = %license, cycles = issued.amount, "license staged");
                receipt.queue_entries.extend(issued.queue_entry);
            }

            Action::RequestLicense { account, license, bonus_percentage, frequency_lock } => {
                Self::require(st, Authority::LicenseIssuer, signer)?;
                let id = ledger::request_license(
                    st, account, *license, *bonus_percentage, *frequency_lock, now,
                )?;
                receipt.license_requests.push(id);
            }

            Action::ApproveLicenseRequest { request } => {
                Self::require(st, Authority::LicenseIssuer, signer)?;
                let issued = ledger::approve_license_request(st, *request, now)?;
                receipt.queue_entries.extend(issued.queue_entry);
            }

            Action::DenyLicense { request } => {
                Self::require(st, Authority::LicenseIssuer, signer)?;
                ledger::deny_license(st, *request)?;
            }

            Action::ApplyUpgrade { account } => {
                Self::require(st, Authority::LicenseIssuer, signer)?;
                ledger::apply_upgrade(st, account)?;
            }

            Action::UpdateCycleLimit { account, max } => {
                Self::require(st, Authority::LicenseIssuer, signer)?;
                cycles::update_cycle_limit(st, account, *max)?;
            }

            // ── Cycle issuing ────────────────────────────────────────────────
            Action::IssueFreeCycles { account, amount, origin, comment } => {
                Self::require(st, Authority::CycleIssuer, signer)?;
                check_comment(comment)?;
                cycles::issue_free_cycles(st, account, *amount, origin, comment)?;
            }

            Action::IssueCyclesToLicense { account, license, amount, origin, comment } => {
                Self::require(st, Authority::CycleIssuer, signer)?;
                let entry = ledger::issue_cycles_to_license(
                    st, signer, account, *license, *amount, origin, comment, now,
                )?;
                receipt.queue_entries.extend(entry);
            }

            Action::SubmitReserveCycles { account, amount, frequency_lock, comment } => {
                Self::require(st, Authority::CycleIssuer, signer)?;
                let id = reward_queue::submit_reserve_cycles(
                    st, account, *amount, *frequency_lock, comment, now,
                )?;
                receipt.queue_entries.push(id);
            }

            // ── Account-signed ───────────────────────────────────────────────
            Action::SubmitCycles { amount, frequency, comment } => {
                let id = reward_queue::submit_cycles(st, signer, *amount, *frequency, comment, now)?;
                receipt.queue_entries.push(id);
            }

            Action::SubmitCyclesByLicense { license, amount, frequency_lock, comment } => {
                let id = reward_queue::submit_cycles_by_license(
                    st, signer, *license, *amount, *frequency_lock, comment, now,
                )?;
                receipt.queue_entries.push(id);
            }

            Action::PurchaseCycles { amount, frequency, expected_cycles } => {
                cycles::purchase_cycles(st, signer, *amount, *frequency, *expected_cycles)?;
            }

            // ── Global parameters ────────────────────────────────────────────
            Action::UpdateQueueParameters {
                enable_dascoin_queue,
                enable_cycle_issuing,
                reward_interval_time_seconds,
                dascoin_reward_amount,
            } => {
                Self::require(st, Authority::LicenseIssuer, signer)?;
                update_queue_parameters(
                    st,
                    *enable_dascoin_queue,
                    *enable_cycle_issuing,
                    *reward_interval_time_seconds,
                    *dascoin_reward_amount,
                    now,
                )?;
            }

            Action::UpdateGlobalFrequency { frequency, comment } => {
                Self::require(st, Authority::LicenseIssuer, signer)?;
                update_global_frequency(st, signer, *frequency, comment, now)?;
            }
        }
        Ok(())
    }
}

// ── Global parameters & frequency ─────────────────────────────────────────────

fn update_queue_parameters(
    st: &mut Staged<'_>,
    enable_dascoin_queue: Option<bool>,
    enable_cycle_issuing: Option<bool>,
    reward_interval_time_seconds: Option<u32>,
    dascoin_reward_amount: Option<Share>,
    now: Timestamp,
) -> Result<(), CyclexError> {
    if let Some(interval) = reward_interval_time_seconds {
        validate_reward_interval(interval, st.params.block_interval)?;
    }
    let reward = match dascoin_reward_amount {
        Some(amount) if amount <= 0 => {
            return Err(CyclexError::InvalidParameter(
                "dascoin_reward_amount must be greater than zero".into(),
            ))
        }
        Some(amount) => Some(migrate_reward_amount(amount, now)?),
        None => None,
    };

    let params = st.params_mut();
    if let Some(v) = enable_dascoin_queue {
        params.enable_dascoin_queue = v;
    }
    if let Some(v) = enable_cycle_issuing {
        params.enable_cycle_issuing = v;
    }
    if let Some(v) = reward_interval_time_seconds {
        params.reward_interval_time_seconds = v;
    }
    if let Some(v) = reward {
        params.dascoin_reward_amount = v;
    }
    info!(
        enable_dascoin_queue = params.enable_dascoin_queue,
        enable_cycle_issuing = params.enable_cycle_issuing,
        reward_interval = params.reward_interval_time_seconds,
        reward_amount = params.dascoin_reward_amount,
        "queue parameters updated"
    );
    Ok(())
}

fn update_global_frequency(
    st: &mut Staged<'_>,
    authority: &AccountId,
    frequency: Frequency,
    comment: &str,
    now: Timestamp,
) -> Result<(), CyclexError> {
    if !frequency.is_set() {
        return Err(CyclexError::InvalidParameter(
            "frequency must be greater than zero".into(),
        ));
    }
    check_comment(comment)?;
    let previous = st.dynamic.frequency;
    st.dynamic.frequency = frequency;
    let id = st.dynamic.take_history_id();
    st.record_frequency(FrequencyHistoryRecord {
        id,
        authority: authority.clone(),
        frequency,
        time: now,
        comment: comment.to_string(),
    });
    info!(from = %previous, to = %frequency, "global frequency changed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyclex_core::account::{Account, AccountKind};
    use cyclex_core::license::LicenseKind;
    use cyclex_core::params::{ChainAuthorities, ChainParameters, DynamicState};
    use cyclex_core::types::{LicenseTypeId, QueueEntryId};

    const NOW: i64 = 1_700_000_000;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn id(name: &str) -> AccountId {
        AccountId::from_name(name)
    }

    fn temp_db(name: &str) -> StateDb {
        let dir = std::env::temp_dir().join(format!("cyclex_engine_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        StateDb::open(&dir).expect("open temp db")
    }

    fn setup(name: &str) -> StateEngine {
        let db = temp_db(name);
        db.put_parameters(&ChainParameters::default()).unwrap();
        db.put_authorities(&ChainAuthorities {
            license_administrator: id("admin"),
            license_issuer: id("issuer"),
            cycle_issuer: id("cycles"),
        })
        .unwrap();
        db.put_dynamic_state(&DynamicState {
            frequency: Frequency(200),
            ..Default::default()
        })
        .unwrap();
        for (n, kind) in [("vault", AccountKind::Vault), ("wallet", AccountKind::Wallet)] {
            db.put_account(&Account::new(n, kind)).unwrap();
        }
        StateEngine::new(Arc::new(db))
    }

    fn run(engine: &StateEngine, signer: &str, action: Action) -> Result<OperationReceipt, CyclexError> {
        engine.apply(&Operation::new(id(signer), action), NOW)
    }

    fn create_type(engine: &StateEngine, name: &str, amount: Share, kind: LicenseKind) -> LicenseTypeId {
        let receipt = run(
            engine,
            "admin",
            Action::CreateLicenseType {
                name: name.into(),
                amount,
                kind,
                balance_multipliers: vec![2],
                requeue_multipliers: vec![],
                return_multipliers: vec![],
                upgrades: 1,
            },
        )
        .unwrap();
        receipt.license_types[0]
    }

    fn issue(engine: &StateEngine, license: LicenseTypeId, bonus: Share, lock: Share) -> Result<OperationReceipt, CyclexError> {
        run(
            engine,
            "issuer",
            Action::IssueLicense {
                account: id("vault"),
                license,
                bonus_percentage: bonus,
                frequency_lock: Frequency(lock),
                activation_time: None,
            },
        )
    }

    fn free_cycles(engine: &StateEngine, name: &str) -> Share {
        engine
            .db
            .get_cycle_balance(&id(name))
            .unwrap()
            .map(|cb| cb.balance)
            .unwrap_or(0)
    }

    // ── Tests ─────────────────────────────────────────────────────────────────

    #[test]
    fn only_authorities_manage_the_catalog() {
        let engine = setup("catalog_auth");
        let err = run(
            &engine,
            "issuer",
            Action::DeleteLicenseType { license: LicenseTypeId(0) },
        )
        .unwrap_err();
        assert!(matches!(err, CyclexError::NotAuthorized { role: "license_administrator", .. }));

        let lt = create_type(&engine, "standard", 1_100, LicenseKind::Regular);
        let dup = run(
            &engine,
            "admin",
            Action::CreateLicenseType {
                name: "standard".into(),
                amount: 5,
                kind: LicenseKind::Regular,
                balance_multipliers: vec![],
                requeue_multipliers: vec![],
                return_multipliers: vec![],
                upgrades: 0,
            },
        );
        assert!(matches!(dup, Err(CyclexError::LicenseTypeExists(_))));

        run(
            &engine,
            "admin",
            Action::EditLicenseType { license: lt, name: Some("basic".into()), amount: Some(1_000), kind: None },
        )
        .unwrap();
        let stored = engine.db.get_license_type_by_name("basic").unwrap().unwrap();
        assert_eq!(stored.amount, 1_000);
        run(&engine, "admin", Action::DeleteLicenseType { license: lt }).unwrap();
        assert!(engine.db.get_license_type(lt).unwrap().is_none());
    }

    #[test]
    fn issue_license_applies_bonus_and_rank() {
        let engine = setup("issue_rank");
        let standard = create_type(&engine, "standard", 1_100, LicenseKind::Regular);
        let pro = create_type(&engine, "pro", 11_000, LicenseKind::Regular);

        issue(&engine, pro, 50, 0).unwrap();
        let acc = engine.db.get_account(&id("vault")).unwrap().unwrap();
        let info = acc.license_information.unwrap();
        assert_eq!(info.history[0].amount, 16_500);
        assert_eq!(info.history[0].base_amount, 11_000);
        assert_eq!(info.max_license, Some(pro));
        assert_eq!(engine.db.get_cycle_balance(&id("vault")).unwrap().unwrap().remaining_upgrades, 1);

        let lower = issue(&engine, standard, 0, 0);
        assert!(matches!(lower, Err(CyclexError::LicenseAlreadyIssued(_))));
        let same = issue(&engine, pro, 0, 0);
        assert!(matches!(same, Err(CyclexError::LicenseAlreadyIssued(_))));
        assert!(matches!(issue(&engine, pro, -1, 0), Err(CyclexError::InvalidParameter(_))));
    }

    #[test]
    fn issue_license_rejects_wallets_and_missing_locks() {
        let engine = setup("issue_checks");
        let locked = create_type(&engine, "locked", 1_100, LicenseKind::LockedFrequency);
        let err = run(
            &engine,
            "issuer",
            Action::IssueLicense {
                account: id("wallet"),
                license: locked,
                bonus_percentage: 0,
                frequency_lock: Frequency(200),
                activation_time: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, CyclexError::InvalidAccountClass { expected: "vault", .. }));
        assert!(matches!(issue(&engine, locked, 0, 0), Err(CyclexError::InvalidParameter(_))));
        issue(&engine, locked, 0, 150).unwrap();
    }

    #[test]
    fn chartered_license_goes_straight_to_the_queue() {
        let engine = setup("chartered");
        let charter = create_type(&engine, "charter", 1_100, LicenseKind::Chartered);
        let receipt = issue(&engine, charter, 50, 250).unwrap();
        let entry = engine.db.get_queue_entry(receipt.queue_entries[0]).unwrap().unwrap();
        assert_eq!(entry.amount, 1_650);
        assert_eq!(entry.frequency, Frequency(250));
        assert_eq!(entry.origin, "charter");
        assert_eq!(entry.license, Some(charter));

        let acc = engine.db.get_account(&id("vault")).unwrap().unwrap();
        assert_eq!(acc.license_information.unwrap().history[0].amount, 0);
        assert!(matches!(issue(&engine, charter, 0, 250), Err(CyclexError::LicenseAlreadyIssued(_))));
    }

    #[test]
    fn issue_cycles_to_license_dispatches_on_kind() {
        let engine = setup("cycles_to_license");
        let standard = create_type(&engine, "standard", 1_100, LicenseKind::Regular);
        let promo = create_type(&engine, "promo", 500, LicenseKind::Promo);
        issue(&engine, standard, 0, 0).unwrap();
        issue(&engine, promo, 0, 0).unwrap();

        run(
            &engine,
            "cycles",
            Action::IssueCyclesToLicense {
                account: id("vault"),
                license: standard,
                amount: 300,
                origin: "bonus".into(),
                comment: String::new(),
            },
        )
        .unwrap();
        assert_eq!(free_cycles(&engine, "vault"), 300);

        let receipt = run(
            &engine,
            "cycles",
            Action::IssueCyclesToLicense {
                account: id("vault"),
                license: promo,
                amount: 400,
                origin: String::new(),
                comment: "promo top-up".into(),
            },
        )
        .unwrap();
        let entry = engine.db.get_queue_entry(receipt.queue_entries[0]).unwrap().unwrap();
        assert_eq!(entry.frequency, Frequency(200));
        assert_eq!(entry.origin, "promo");
        assert_eq!(engine.db.charter_records().unwrap().len(), 1);

        let acc = engine.db.get_account(&id("vault")).unwrap().unwrap();
        let info = acc.license_information.unwrap();
        assert_eq!(info.find(standard).unwrap().non_upgradeable_amount, 300);
        assert_eq!(info.find(promo).unwrap().non_upgradeable_amount, 400);

        let missing = run(
            &engine,
            "cycles",
            Action::IssueCyclesToLicense {
                account: id("vault"),
                license: LicenseTypeId(77),
                amount: 1,
                origin: String::new(),
                comment: String::new(),
            },
        );
        assert!(matches!(missing, Err(CyclexError::LicenseNotFound(_))));
    }

    #[test]
    fn submit_cycles_checks_frequency_balance_and_limit() {
        let engine = setup("submit_cycles");
        run(
            &engine,
            "cycles",
            Action::IssueFreeCycles { account: id("vault"), amount: 1_000, origin: "test".into(), comment: String::new() },
        )
        .unwrap();
        let wrong = run(&engine, "vault", Action::SubmitCycles { amount: 200, frequency: Frequency(210), comment: String::new() });
        assert!(matches!(wrong, Err(CyclexError::FrequencyMismatch { expected: 200, got: 210 })));
        let too_much = run(&engine, "vault", Action::SubmitCycles { amount: 1_200, frequency: Frequency(200), comment: String::new() });
        assert!(matches!(too_much, Err(CyclexError::InsufficientBalance { .. })));

        run(&engine, "issuer", Action::UpdateCycleLimit { account: id("vault"), max: 500 }).unwrap();
        run(&engine, "vault", Action::SubmitCycles { amount: 400, frequency: Frequency(200), comment: String::new() }).unwrap();
        let over = run(&engine, "vault", Action::SubmitCycles { amount: 200, frequency: Frequency(200), comment: String::new() });
        assert!(matches!(over, Err(CyclexError::DailyLimitExceeded { max: 500, spent: 400, requested: 200 })));
        assert_eq!(free_cycles(&engine, "vault"), 600);
        assert_eq!(engine.db.queue_len(), 1);
    }

    #[test]
    fn submit_by_license_requires_matching_lock() {
        let engine = setup("submit_by_license");
        let locked = create_type(&engine, "locked", 1_100, LicenseKind::LockedFrequency);
        issue(&engine, locked, 0, 250).unwrap();

        let wrong = run(
            &engine,
            "vault",
            Action::SubmitCyclesByLicense { license: locked, amount: 100, frequency_lock: Frequency(200), comment: String::new() },
        );
        assert!(matches!(wrong, Err(CyclexError::FrequencyMismatch { expected: 250, got: 200 })));

        let receipt = run(
            &engine,
            "vault",
            Action::SubmitCyclesByLicense { license: locked, amount: 100, frequency_lock: Frequency(250), comment: String::new() },
        )
        .unwrap();
        assert_eq!(receipt.queue_entries, vec![QueueEntryId(0)]);
        let acc = engine.db.get_account(&id("vault")).unwrap().unwrap();
        assert_eq!(acc.license_information.unwrap().history[0].amount, 1_000);

        let too_much = run(
            &engine,
            "vault",
            Action::SubmitCyclesByLicense { license: locked, amount: 1_001, frequency_lock: Frequency(250), comment: String::new() },
        );
        assert!(matches!(too_much, Err(CyclexError::InsufficientBalance { .. })));
    }

    #[test]
    fn reserve_cycles_need_issuing_enabled() {
        let engine = setup("reserve");
        let submit = |engine: &StateEngine| {
            run(
                engine,
                "cycles",
                Action::SubmitReserveCycles { account: id("vault"), amount: 600, frequency_lock: Frequency(200), comment: String::new() },
            )
        };
        submit(&engine).unwrap();
        run(
            &engine,
            "issuer",
            Action::UpdateQueueParameters {
                enable_dascoin_queue: None,
                enable_cycle_issuing: Some(false),
                reward_interval_time_seconds: None,
                dascoin_reward_amount: None,
            },
        )
        .unwrap();
        assert!(matches!(submit(&engine), Err(CyclexError::FeatureNotActive(_))));
        let state = engine.db.dynamic_state().unwrap();
        assert_eq!(state.queued_cycles, 600);
        assert_eq!(state.total_cycles_issued, 600);
        assert_eq!(free_cycles(&engine, "vault"), 0);
    }

    #[test]
    fn purchase_cycles_converts_wallet_coin() {
        let engine = setup("purchase");
        let mut wallet = engine.db.get_account(&id("wallet")).unwrap().unwrap();
        wallet.balance = 10_000_000;
        engine.db.put_account(&wallet).unwrap();

        let buy = |amount, expected| {
            run(&engine, "wallet", Action::PurchaseCycles { amount, frequency: Frequency(200), expected_cycles: expected })
        };
        assert!(matches!(buy(1_000_000, 199), Err(CyclexError::InvalidParameter(_))));
        assert!(matches!(buy(1_000_001, 200), Err(CyclexError::InvalidParameter(_))));
        assert!(matches!(buy(20_000_000, 4_000), Err(CyclexError::InsufficientBalance { .. })));
        buy(1_000_000, 200).unwrap();
        assert_eq!(free_cycles(&engine, "wallet"), 200);
        assert_eq!(engine.db.get_account(&id("wallet")).unwrap().unwrap().balance, 9_000_000);

        let vault = run(&engine, "vault", Action::PurchaseCycles { amount: 1_000_000, frequency: Frequency(200), expected_cycles: 200 });
        assert!(matches!(vault, Err(CyclexError::InvalidAccountClass { .. })));
    }

    #[test]
    fn upgrade_multiplies_active_license() {
        let engine = setup("upgrade");
        let standard = create_type(&engine, "standard", 1_100, LicenseKind::Regular);
        issue(&engine, standard, 0, 0).unwrap();
        run(&engine, "issuer", Action::ApplyUpgrade { account: id("vault") }).unwrap();
        let acc = engine.db.get_account(&id("vault")).unwrap().unwrap();
        assert_eq!(acc.license_information.unwrap().history[0].amount, 2_200);
        let again = run(&engine, "issuer", Action::ApplyUpgrade { account: id("vault") });
        assert!(matches!(again, Err(CyclexError::InvalidParameter(_))));
        assert_eq!(engine.db.dynamic_state().unwrap().total_cycles_issued, 2_200);
    }

    #[test]
    fn queue_parameters_validate_and_migrate() {
        let engine = setup("params");
        let update = |interval, amount, now| {
            engine.apply(
                &Operation::new(
                    id("issuer"),
                    Action::UpdateQueueParameters {
                        enable_dascoin_queue: Some(false),
                        enable_cycle_issuing: None,
                        reward_interval_time_seconds: interval,
                        dascoin_reward_amount: amount,
                    },
                ),
                now,
            )
        };
        assert!(matches!(update(Some(601), None, NOW), Err(CyclexError::InvalidParameter(_))));
        assert!(engine.db.parameters().unwrap().enable_dascoin_queue);

        update(Some(1_200), Some(1_000), 1_500_000_000).unwrap();
        let params = engine.db.parameters().unwrap();
        assert_eq!(params.dascoin_reward_amount, 10_000);
        assert_eq!(params.reward_interval_time_seconds, 1_200);
        assert!(!params.enable_dascoin_queue);

        update(None, Some(1_000), NOW).unwrap();
        assert_eq!(engine.db.parameters().unwrap().dascoin_reward_amount, 1_000);
    }

    #[test]
    fn frequency_update_is_recorded() {
        let engine = setup("frequency");
        let denied = run(&engine, "admin", Action::UpdateGlobalFrequency { frequency: Frequency(300), comment: String::new() });
        assert!(matches!(denied, Err(CyclexError::NotAuthorized { .. })));
        run(&engine, "issuer", Action::UpdateGlobalFrequency { frequency: Frequency(300), comment: "raise".into() }).unwrap();
        assert_eq!(engine.db.dynamic_state().unwrap().frequency, Frequency(300));
        let history = engine.db.frequency_history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].comment, "raise");
        assert_eq!(history[0].authority, id("issuer"));
        assert!(run(&engine, "issuer", Action::UpdateGlobalFrequency { frequency: Frequency(0), comment: String::new() }).is_err());
    }

    #[test]
    fn failed_operation_commits_nothing() {
        let engine = setup("atomic");
        let op = Operation {
            signer: id("cycles"),
            actions: vec![
                Action::IssueFreeCycles { account: id("vault"), amount: 500, origin: "a".into(), comment: String::new() },
                Action::IssueFreeCycles { account: id("wallet"), amount: 500, origin: "b".into(), comment: String::new() },
            ],
        };
        assert!(matches!(engine.apply(&op, NOW), Err(CyclexError::InvalidAccountClass { .. })));
        assert_eq!(free_cycles(&engine, "vault"), 0);
        assert_eq!(engine.db.dynamic_state().unwrap().total_cycles_issued, 0);
    }

    #[test]
    fn renamed_type_frees_its_name_in_the_same_operation() {
        let engine = setup("rename_reuse");
        let old = create_type(&engine, "standard", 1_100, LicenseKind::Regular);
        let op = Operation {
            signer: id("admin"),
            actions: vec![
                Action::EditLicenseType { license: old, name: Some("basic".into()), amount: None, kind: None },
                Action::CreateLicenseType {
                    name: "standard".into(),
                    amount: 2_000,
                    kind: LicenseKind::Regular,
                    balance_multipliers: vec![],
                    requeue_multipliers: vec![],
                    return_multipliers: vec![],
                    upgrades: 0,
                },
            ],
        };
        let new = engine.apply(&op, NOW).unwrap().license_types[0];
        assert_eq!(engine.db.get_license_type_by_name("basic").unwrap().unwrap().id, old);
        assert_eq!(engine.db.get_license_type_by_name("standard").unwrap().unwrap().id, new);
    }

    fn request(engine: &StateEngine, who: &str, license: LicenseTypeId, bonus: Share, lock: Share) -> Result<OperationReceipt, CyclexError> {
        run(
            engine,
            "issuer",
            Action::RequestLicense {
                account: id(who),
                license,
                bonus_percentage: bonus,
                frequency_lock: Frequency(lock),
            },
        )
    }

    #[test]
    fn approved_request_issues_the_license() {
        let engine = setup("request_approve");
        let pro = create_type(&engine, "pro", 11_000, LicenseKind::Regular);

        let denied = run(
            &engine,
            "admin",
            Action::RequestLicense { account: id("vault"), license: pro, bonus_percentage: 0, frequency_lock: Frequency::NONE },
        );
        assert!(matches!(denied, Err(CyclexError::NotAuthorized { .. })));
        assert!(matches!(request(&engine, "wallet", pro, 0, 0), Err(CyclexError::InvalidAccountClass { .. })));
        assert!(matches!(request(&engine, "vault", pro, -1, 0), Err(CyclexError::InvalidParameter(_))));

        let req = request(&engine, "vault", pro, 50, 0).unwrap().license_requests[0];
        assert!(matches!(request(&engine, "vault", pro, 0, 0), Err(CyclexError::LicenseRequestPending(_))));
        let pending = engine.db.license_requests().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].time, NOW);
        assert!(engine.db.get_account(&id("vault")).unwrap().unwrap().license_information.is_none());

        run(&engine, "issuer", Action::ApproveLicenseRequest { request: req }).unwrap();
        let info = engine.db.get_account(&id("vault")).unwrap().unwrap().license_information.unwrap();
        assert_eq!(info.history[0].amount, 16_500);
        assert_eq!(info.history[0].activation_time, NOW);
        assert!(engine.db.license_requests().unwrap().is_empty());

        let again = run(&engine, "issuer", Action::ApproveLicenseRequest { request: req });
        assert!(matches!(again, Err(CyclexError::LicenseRequestNotFound(_))));
    }

    #[test]
    fn denied_request_issues_nothing() {
        let engine = setup("request_deny");
        let standard = create_type(&engine, "standard", 1_100, LicenseKind::Regular);
        let req = request(&engine, "vault", standard, 0, 0).unwrap().license_requests[0];

        run(&engine, "issuer", Action::DenyLicense { request: req }).unwrap();
        assert!(engine.db.license_requests().unwrap().is_empty());
        assert!(engine.db.get_account(&id("vault")).unwrap().unwrap().license_information.is_none());
        assert_eq!(engine.db.dynamic_state().unwrap().total_cycles_issued, 0);

        let unknown = run(&engine, "issuer", Action::DenyLicense { request: req });
        assert!(matches!(unknown, Err(CyclexError::LicenseRequestNotFound(_))));
        let next = request(&engine, "vault", standard, 0, 0).unwrap().license_requests[0];
        assert_ne!(next, req);
    }

    #[test]
    fn approval_checks_rank_against_current_holdings() {
        let engine = setup("request_rank");
        let standard = create_type(&engine, "standard", 1_100, LicenseKind::Regular);
        let pro = create_type(&engine, "pro", 11_000, LicenseKind::Regular);
        let charter = create_type(&engine, "charter", 1_000, LicenseKind::Chartered);

        let req = request(&engine, "vault", standard, 0, 0).unwrap().license_requests[0];
        issue(&engine, pro, 0, 0).unwrap();
        let refused = run(&engine, "issuer", Action::ApproveLicenseRequest { request: req });
        assert!(matches!(refused, Err(CyclexError::LicenseAlreadyIssued(_))));
        // The failed approval left the request pending.
        assert_eq!(engine.db.license_requests().unwrap()[0].id, req);
        run(&engine, "issuer", Action::DenyLicense { request: req }).unwrap();

        assert!(matches!(request(&engine, "vault", charter, 0, 0), Err(CyclexError::InvalidParameter(_))));
        let req = request(&engine, "vault", charter, 0, 250).unwrap().license_requests[0];
        let receipt = run(&engine, "issuer", Action::ApproveLicenseRequest { request: req }).unwrap();
        let entry = engine.db.get_queue_entry(receipt.queue_entries[0]).unwrap().unwrap();
        assert_eq!(entry.amount, 1_000);
        assert_eq!(entry.frequency, Frequency(250));
    }
}
