use std::collections::BTreeMap;

use cyclex_core::account::{Account, CycleBalance};
use cyclex_core::error::CyclexError;
use cyclex_core::license::{LicenseRequest, LicenseType};
use cyclex_core::params::{ChainAuthorities, ChainParameters, DynamicState};
use cyclex_core::queue::{
    CharterIssuanceRecord, FrequencyHistoryRecord, RewardHistoryRecord, RewardQueueEntry,
};
use cyclex_core::types::{AccountId, LicenseRequestId, LicenseTypeId, QueueEntryId};

use crate::db::{StateDb, WriteSet};

enum QueueChange {
    Put(RewardQueueEntry),
    Remove(AccountId),
}

/// Copy-on-write view over the state DB.
///
/// Reads see earlier staged writes; nothing reaches the DB until `commit`,
/// which applies everything in one transaction. Dropping a `Staged`
/// discards every change.
pub(crate) struct Staged<'a> {
    db: &'a StateDb,
    pub params: ChainParameters,
    pub authorities: ChainAuthorities,
    pub dynamic: DynamicState,
    params_dirty: bool,
    accounts: BTreeMap<AccountId, Account>,
    cycle_balances: BTreeMap<AccountId, CycleBalance>,
    license_types: BTreeMap<LicenseTypeId, Option<LicenseType>>,
    license_requests: BTreeMap<LicenseRequestId, Option<LicenseRequest>>,
    queue: BTreeMap<QueueEntryId, QueueChange>,
    reward_records: Vec<RewardHistoryRecord>,
    frequency_records: Vec<FrequencyHistoryRecord>,
    charter_records: Vec<CharterIssuanceRecord>,
}

impl<'a> Staged<'a> {
    pub fn new(db: &'a StateDb) -> Result<Self, CyclexError> {
        Ok(Self {
            params: db.parameters()?,
            authorities: db.authorities()?,
            dynamic: db.dynamic_state()?,
            db,
            params_dirty: false,
            accounts: BTreeMap::new(),
            cycle_balances: BTreeMap::new(),
            license_types: BTreeMap::new(),
            license_requests: BTreeMap::new(),
            queue: BTreeMap::new(),
            reward_records: Vec::new(),
            frequency_records: Vec::new(),
            charter_records: Vec::new(),
        })
    }

    // ── Accounts ─────────────────────────────────────────────────────────────

    pub fn account(&self, id: &AccountId) -> Result<Account, CyclexError> {
        if let Some(acc) = self.accounts.get(id) {
            return Ok(acc.clone());
        }
        self.db
            .get_account(id)?
            .ok_or_else(|| CyclexError::UnknownAccount(id.to_string()))
    }

    pub fn put_account(&mut self, account: Account) {
        self.accounts.insert(account.account_id.clone(), account);
    }

    // ── Cycle balances ───────────────────────────────────────────────────────

    pub fn cycle_balance(&self, id: &AccountId) -> Result<Option<CycleBalance>, CyclexError> {
        if let Some(cb) = self.cycle_balances.get(id) {
            return Ok(Some(cb.clone()));
        }
        self.db.get_cycle_balance(id)
    }

    pub fn put_cycle_balance(&mut self, cb: CycleBalance) {
        self.cycle_balances.insert(cb.owner.clone(), cb);
    }

    // ── License types ────────────────────────────────────────────────────────

    pub fn license_type(&self, id: LicenseTypeId) -> Result<LicenseType, CyclexError> {
        let found = match self.license_types.get(&id) {
            Some(staged) => staged.clone(),
            None => self.db.get_license_type(id)?,
        };
        found.ok_or_else(|| CyclexError::LicenseTypeNotFound(id.to_string()))
    }

    pub fn license_type_by_name(&self, name: &str) -> Result<Option<LicenseType>, CyclexError> {
        let staged = self.license_types.values().flatten().find(|lt| lt.name == name);
        if let Some(lt) = staged {
            return Ok(Some(lt.clone()));
        }
        match self.db.get_license_type_by_name(name)? {
            Some(lt) if !self.license_types.contains_key(&lt.id) => Ok(Some(lt)),
            _ => Ok(None),
        }
    }

    pub fn put_license_type(&mut self, lt: LicenseType) {
        self.license_types.insert(lt.id, Some(lt));
    }

    pub fn delete_license_type(&mut self, id: LicenseTypeId) {
        self.license_types.insert(id, None);
    }

    // ── License requests ─────────────────────────────────────────────────────

    pub fn license_request(&self, id: LicenseRequestId) -> Result<LicenseRequest, CyclexError> {
        let found = match self.license_requests.get(&id) {
            Some(staged) => staged.clone(),
            None => self.db.get_license_request(id)?,
        };
        found.ok_or_else(|| CyclexError::LicenseRequestNotFound(id.to_string()))
    }

    /// The request still pending for `account`, if any.
    pub fn pending_request_for(&self, account: &AccountId) -> Result<Option<LicenseRequest>, CyclexError> {
        let staged = self.license_requests.values().flatten().find(|r| &r.account == account);
        if let Some(req) = staged {
            return Ok(Some(req.clone()));
        }
        Ok(self
            .db
            .license_requests()?
            .into_iter()
            .find(|r| &r.account == account && !self.license_requests.contains_key(&r.id)))
    }

    pub fn put_license_request(&mut self, req: LicenseRequest) {
        self.license_requests.insert(req.id, Some(req));
    }

    pub fn remove_license_request(&mut self, id: LicenseRequestId) {
        self.license_requests.insert(id, None);
    }

    // ── Queue ────────────────────────────────────────────────────────────────

    pub fn put_queue_entry(&mut self, entry: RewardQueueEntry) {
        self.queue.insert(entry.id, QueueChange::Put(entry));
    }

    pub fn remove_queue_entry(&mut self, entry: &RewardQueueEntry) {
        self.queue
            .insert(entry.id, QueueChange::Remove(entry.account.clone()));
    }

    // ── Logs / params ────────────────────────────────────────────────────────

    pub fn record_reward(&mut self, rec: RewardHistoryRecord) {
        self.reward_records.push(rec);
    }

    pub fn record_frequency(&mut self, rec: FrequencyHistoryRecord) {
        self.frequency_records.push(rec);
    }

    pub fn record_charter(&mut self, rec: CharterIssuanceRecord) {
        self.charter_records.push(rec);
    }

    pub fn params_mut(&mut self) -> &mut ChainParameters {
        self.params_dirty = true;
        &mut self.params
    }

    // ── Commit ───────────────────────────────────────────────────────────────

    /// Write every staged change to the DB in one transaction.
    pub fn commit(self) -> Result<(), CyclexError> {
        let mut ws = WriteSet::default();
        for acc in self.accounts.values() {
            ws.put_account(acc)?;
        }
        for cb in self.cycle_balances.values() {
            ws.put_cycle_balance(cb)?;
        }

        // Stale names go first so a name freed in this operation can be reused.
        for (id, lt) in &self.license_types {
            if let Some(old) = self.db.get_license_type(*id)? {
                if lt.as_ref().map_or(true, |lt| lt.name != old.name) {
                    ws.remove_license_name(&old.name);
                }
            }
        }
        for (id, lt) in &self.license_types {
            match lt {
                Some(lt) => ws.put_license_type(lt)?,
                None => ws.delete_license_type(*id),
            }
        }

        for (id, req) in &self.license_requests {
            match req {
                Some(req) => ws.put_license_request(req)?,
                None => ws.remove_license_request(*id),
            }
        }
        for (id, change) in &self.queue {
            match change {
                QueueChange::Put(entry) => ws.put_queue_entry(entry)?,
                QueueChange::Remove(account) => ws.remove_queue_entry(*id, account),
            }
        }
        for rec in &self.reward_records {
            ws.put_reward_record(rec)?;
        }
        for rec in &self.frequency_records {
            ws.put_frequency_record(rec)?;
        }
        for rec in &self.charter_records {
            ws.put_charter_record(rec)?;
        }
        if self.params_dirty {
            ws.put_parameters(&self.params)?;
        }
        ws.put_dynamic_state(&self.dynamic)?;
        self.db.commit(ws)
    }
}
