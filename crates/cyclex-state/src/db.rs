use cyclex_core::account::{Account, CycleBalance};
use cyclex_core::error::CyclexError;
use cyclex_core::license::{LicenseRequest, LicenseType};
use cyclex_core::params::{ChainAuthorities, ChainParameters, DynamicState};
use cyclex_core::queue::{
    CharterIssuanceRecord, FrequencyHistoryRecord, RewardHistoryRecord, RewardQueueEntry,
};
use cyclex_core::types::{AccountId, HistoryId, LicenseRequestId, LicenseTypeId, QueueEntryId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionResult, TransactionError, TransactionalTree};
use sled::{Batch, Transactional};
use std::path::Path;

const META_PARAMS: &str = "chain_parameters";
const META_AUTHORITIES: &str = "chain_authorities";
const META_DYNAMIC: &str = "dynamic_state";

fn storage(e: sled::Error) -> CyclexError {
    CyclexError::Storage(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CyclexError> {
    bincode::serialize(value).map_err(|e| CyclexError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CyclexError> {
    bincode::deserialize(bytes).map_err(|e| CyclexError::Serialization(e.to_string()))
}

fn account_key(account: &AccountId, id: u64) -> [u8; 40] {
    let mut k = [0u8; 40];
    k[..32].copy_from_slice(account.as_bytes());
    k[32..].copy_from_slice(&id.to_be_bytes());
    k
}

/// Persistent state database backed by sled.
///
/// Named trees:
///   accounts           : AccountId bytes        → bincode(Account)
///   cycle_balances     : AccountId bytes        → bincode(CycleBalance)
///   license_types      : LicenseTypeId BE       → bincode(LicenseType)
///   license_type_names : name utf8              → LicenseTypeId BE
///   license_requests   : LicenseRequestId BE    → bincode(LicenseRequest)
///   reward_queue       : QueueEntryId BE        → bincode(RewardQueueEntry)
///   queue_by_account   : AccountId ++ entry BE  → [] (index)
///   reward_history     : AccountId ++ id BE     → bincode(RewardHistoryRecord)
///   frequency_history  : HistoryId BE           → bincode(FrequencyHistoryRecord)
///   charter_issuances  : HistoryId BE           → bincode(CharterIssuanceRecord)
///   meta               : utf8 key               → bincode(params / authorities / dynamic)
pub struct StateDb {
    db: sled::Db,
    accounts: sled::Tree,
    cycle_balances: sled::Tree,
    license_types: sled::Tree,
    license_type_names: sled::Tree,
    license_requests: sled::Tree,
    reward_queue: sled::Tree,
    queue_by_account: sled::Tree,
    reward_history: sled::Tree,
    frequency_history: sled::Tree,
    charter_issuances: sled::Tree,
    meta: sled::Tree,
}

impl StateDb {
    /// Open or create the state database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CyclexError> {
        let db = sled::open(path).map_err(storage)?;
        Self::from_db(db)
    }

    /// In-memory database removed on drop.
    pub fn open_temporary() -> Result<Self, CyclexError> {
        let db = sled::Config::new().temporary(true).open().map_err(storage)?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, CyclexError> {
        let tree = |name: &str| db.open_tree(name).map_err(storage);
        Ok(Self {
            accounts: tree("accounts")?,
            cycle_balances: tree("cycle_balances")?,
            license_types: tree("license_types")?,
            license_type_names: tree("license_type_names")?,
            license_requests: tree("license_requests")?,
            reward_queue: tree("reward_queue")?,
            queue_by_account: tree("queue_by_account")?,
            reward_history: tree("reward_history")?,
            frequency_history: tree("frequency_history")?,
            charter_issuances: tree("charter_issuances")?,
            meta: tree("meta")?,
            db,
        })
    }

    fn get<T: DeserializeOwned>(tree: &sled::Tree, key: &[u8]) -> Result<Option<T>, CyclexError> {
        match tree.get(key).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put<T: Serialize>(tree: &sled::Tree, key: &[u8], value: &T) -> Result<(), CyclexError> {
        tree.insert(key, encode(value)?).map_err(storage)?;
        Ok(())
    }

    fn values<T: DeserializeOwned>(iter: sled::Iter) -> Result<Vec<T>, CyclexError> {
        iter.map(|item| {
            let (_, v) = item.map_err(storage)?;
            decode(&v)
        })
        .collect()
    }

    // ── Accounts ─────────────────────────────────────────────────────────────

    pub fn get_account(&self, id: &AccountId) -> Result<Option<Account>, CyclexError> {
        Self::get(&self.accounts, id.as_bytes())
    }

    pub fn put_account(&self, account: &Account) -> Result<(), CyclexError> {
        Self::put(&self.accounts, account.account_id.as_bytes(), account)
    }

    pub fn account_exists(&self, id: &AccountId) -> bool {
        self.accounts.contains_key(id.as_bytes()).unwrap_or(false)
    }

    pub fn iter_accounts(&self) -> Result<Vec<Account>, CyclexError> {
        Self::values(self.accounts.iter())
    }

    // ── Cycle balances ───────────────────────────────────────────────────────

    pub fn get_cycle_balance(&self, id: &AccountId) -> Result<Option<CycleBalance>, CyclexError> {
        Self::get(&self.cycle_balances, id.as_bytes())
    }

    pub fn iter_cycle_balances(&self) -> Result<Vec<CycleBalance>, CyclexError> {
        Self::values(self.cycle_balances.iter())
    }

    // ── License types ────────────────────────────────────────────────────────

    pub fn get_license_type(&self, id: LicenseTypeId) -> Result<Option<LicenseType>, CyclexError> {
        Self::get(&self.license_types, &id.key())
    }

    pub fn get_license_type_by_name(&self, name: &str) -> Result<Option<LicenseType>, CyclexError> {
        match self.license_type_names.get(name.as_bytes()).map_err(storage)? {
            Some(k) => Self::get(&self.license_types, &k),
            None => Ok(None),
        }
    }

    /// Insert or replace a catalog entry, keeping the name index in sync.
    pub fn put_license_type(&self, lt: &LicenseType) -> Result<(), CyclexError> {
        if let Some(old) = self.get_license_type(lt.id)? {
            if old.name != lt.name {
                self.license_type_names
                    .remove(old.name.as_bytes())
                    .map_err(storage)?;
            }
        }
        Self::put(&self.license_types, &lt.id.key(), lt)?;
        self.license_type_names
            .insert(lt.name.as_bytes(), lt.id.key().as_ref())
            .map_err(storage)?;
        Ok(())
    }

    pub fn iter_license_types(&self) -> Result<Vec<LicenseType>, CyclexError> {
        Self::values(self.license_types.iter())
    }

    // ── License requests ─────────────────────────────────────────────────────

    pub fn get_license_request(&self, id: LicenseRequestId) -> Result<Option<LicenseRequest>, CyclexError> {
        Self::get(&self.license_requests, &id.key())
    }

    /// Pending requests, oldest first.
    pub fn license_requests(&self) -> Result<Vec<LicenseRequest>, CyclexError> {
        Self::values(self.license_requests.iter())
    }

    // ── Reward queue ─────────────────────────────────────────────────────────

    pub fn get_queue_entry(&self, id: QueueEntryId) -> Result<Option<RewardQueueEntry>, CyclexError> {
        Self::get(&self.reward_queue, &id.key())
    }

    /// Queue entries from head to tail.
    pub fn queue_iter(&self) -> impl Iterator<Item = Result<RewardQueueEntry, CyclexError>> + '_ {
        self.reward_queue.iter().map(|item| {
            let (_, v) = item.map_err(storage)?;
            decode(&v)
        })
    }

    pub fn queue_len(&self) -> usize {
        self.reward_queue.len()
    }

    /// Ids of `account`'s queue entries in FIFO order.
    pub fn queue_ids_for_account(&self, account: &AccountId) -> Result<Vec<QueueEntryId>, CyclexError> {
        self.queue_by_account
            .scan_prefix(account.as_bytes())
            .map(|item| {
                let (k, _) = item.map_err(storage)?;
                Ok(QueueEntryId::from_key(&k))
            })
            .collect()
    }

    // ── History logs ─────────────────────────────────────────────────────────

    pub fn reward_history_for(&self, account: &AccountId) -> Result<Vec<RewardHistoryRecord>, CyclexError> {
        Self::values(self.reward_history.scan_prefix(account.as_bytes()))
    }

    pub fn put_frequency_record(&self, rec: &FrequencyHistoryRecord) -> Result<(), CyclexError> {
        Self::put(&self.frequency_history, &rec.id.to_be_bytes(), rec)
    }

    pub fn frequency_history(&self) -> Result<Vec<FrequencyHistoryRecord>, CyclexError> {
        Self::values(self.frequency_history.iter())
    }

    pub fn charter_records(&self) -> Result<Vec<CharterIssuanceRecord>, CyclexError> {
        Self::values(self.charter_issuances.iter())
    }

    pub fn get_charter_record(&self, id: HistoryId) -> Result<Option<CharterIssuanceRecord>, CyclexError> {
        Self::get(&self.charter_issuances, &id.to_be_bytes())
    }

    // ── Global state ─────────────────────────────────────────────────────────

    fn require_meta<T: DeserializeOwned>(&self, key: &str) -> Result<T, CyclexError> {
        Self::get(&self.meta, key.as_bytes())?
            .ok_or_else(|| CyclexError::Storage(format!("{key} missing: genesis not applied")))
    }

    pub fn is_initialized(&self) -> bool {
        self.meta.contains_key(META_DYNAMIC).unwrap_or(false)
    }

    pub fn parameters(&self) -> Result<ChainParameters, CyclexError> {
        self.require_meta(META_PARAMS)
    }

    pub fn put_parameters(&self, params: &ChainParameters) -> Result<(), CyclexError> {
        Self::put(&self.meta, META_PARAMS.as_bytes(), params)
    }

    pub fn authorities(&self) -> Result<ChainAuthorities, CyclexError> {
        self.require_meta(META_AUTHORITIES)
    }

    pub fn put_authorities(&self, auth: &ChainAuthorities) -> Result<(), CyclexError> {
        Self::put(&self.meta, META_AUTHORITIES.as_bytes(), auth)
    }

    pub fn dynamic_state(&self) -> Result<DynamicState, CyclexError> {
        self.require_meta(META_DYNAMIC)
    }

    pub fn put_dynamic_state(&self, state: &DynamicState) -> Result<(), CyclexError> {
        Self::put(&self.meta, META_DYNAMIC.as_bytes(), state)
    }

    // ── Atomic commit ────────────────────────────────────────────────────────

    /// Apply every batch of `ws` in a single transaction over all trees.
    /// Either the whole write set lands or none of it does.
    pub(crate) fn commit(&self, ws: WriteSet) -> Result<(), CyclexError> {
        let trees = [
            &self.accounts,
            &self.cycle_balances,
            &self.license_types,
            &self.license_type_names,
            &self.license_requests,
            &self.reward_queue,
            &self.queue_by_account,
            &self.reward_history,
            &self.frequency_history,
            &self.charter_issuances,
            &self.meta,
        ];
        let batches = [
            &ws.accounts,
            &ws.cycle_balances,
            &ws.license_types,
            &ws.license_type_names,
            &ws.license_requests,
            &ws.reward_queue,
            &ws.queue_by_account,
            &ws.reward_history,
            &ws.frequency_history,
            &ws.charter_issuances,
            &ws.meta,
        ];
        trees[..]
            .transaction(|views: &Vec<TransactionalTree>| -> ConflictableTransactionResult<(), ()> {
                for (view, batch) in views.iter().zip(batches) {
                    view.apply_batch(batch)?;
                }
                Ok(())
            })
            .map_err(|e| match e {
                TransactionError::Abort(()) => CyclexError::Storage("state commit aborted".into()),
                TransactionError::Storage(e) => storage(e),
            })
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), CyclexError> {
        self.db.flush().map_err(storage)?;
        Ok(())
    }
}

// ── WriteSet ──────────────────────────────────────────────────────────────────

/// Encoded writes for every tree, applied together by [`StateDb::commit`].
///
/// Each tree's batch keeps only the last write per key, so stale index
/// entries must be removed before the replacements are inserted.
#[derive(Default)]
pub(crate) struct WriteSet {
    accounts: Batch,
    cycle_balances: Batch,
    license_types: Batch,
    license_type_names: Batch,
    license_requests: Batch,
    reward_queue: Batch,
    queue_by_account: Batch,
    reward_history: Batch,
    frequency_history: Batch,
    charter_issuances: Batch,
    meta: Batch,
}

impl WriteSet {
    pub fn put_account(&mut self, account: &Account) -> Result<(), CyclexError> {
        self.accounts.insert(&account.account_id.as_bytes()[..], encode(account)?);
        Ok(())
    }

    pub fn put_cycle_balance(&mut self, cb: &CycleBalance) -> Result<(), CyclexError> {
        self.cycle_balances.insert(&cb.owner.as_bytes()[..], encode(cb)?);
        Ok(())
    }

    /// Drop the name index entry of a catalog entry that is renamed or deleted.
    pub fn remove_license_name(&mut self, name: &str) {
        self.license_type_names.remove(name.as_bytes());
    }

    pub fn put_license_type(&mut self, lt: &LicenseType) -> Result<(), CyclexError> {
        self.license_types.insert(&lt.id.key()[..], encode(lt)?);
        self.license_type_names.insert(lt.name.as_bytes(), &lt.id.key()[..]);
        Ok(())
    }

    pub fn delete_license_type(&mut self, id: LicenseTypeId) {
        self.license_types.remove(&id.key()[..]);
    }

    pub fn put_license_request(&mut self, req: &LicenseRequest) -> Result<(), CyclexError> {
        self.license_requests.insert(&req.id.key()[..], encode(req)?);
        Ok(())
    }

    pub fn remove_license_request(&mut self, id: LicenseRequestId) {
        self.license_requests.remove(&id.key()[..]);
    }

    pub fn put_queue_entry(&mut self, entry: &RewardQueueEntry) -> Result<(), CyclexError> {
        self.reward_queue.insert(&entry.id.key()[..], encode(entry)?);
        self.queue_by_account
            .insert(&account_key(&entry.account, entry.id.0)[..], &b""[..]);
        Ok(())
    }

    pub fn remove_queue_entry(&mut self, id: QueueEntryId, account: &AccountId) {
        self.reward_queue.remove(&id.key()[..]);
        self.queue_by_account.remove(&account_key(account, id.0)[..]);
    }

    pub fn put_reward_record(&mut self, rec: &RewardHistoryRecord) -> Result<(), CyclexError> {
        self.reward_history
            .insert(&account_key(&rec.account, rec.id)[..], encode(rec)?);
        Ok(())
    }

    pub fn put_frequency_record(&mut self, rec: &FrequencyHistoryRecord) -> Result<(), CyclexError> {
        self.frequency_history.insert(&rec.id.to_be_bytes()[..], encode(rec)?);
        Ok(())
    }

    pub fn put_charter_record(&mut self, rec: &CharterIssuanceRecord) -> Result<(), CyclexError> {
        self.charter_issuances.insert(&rec.id.to_be_bytes()[..], encode(rec)?);
        Ok(())
    }

    pub fn put_parameters(&mut self, params: &ChainParameters) -> Result<(), CyclexError> {
        self.meta.insert(META_PARAMS.as_bytes(), encode(params)?);
        Ok(())
    }

    pub fn put_dynamic_state(&mut self, state: &DynamicState) -> Result<(), CyclexError> {
        self.meta.insert(META_DYNAMIC.as_bytes(), encode(state)?);
        Ok(())
    }
}
