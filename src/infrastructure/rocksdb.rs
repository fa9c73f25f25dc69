use crate::domain::account::{Account, AccountId, AccountNumber, AccountStatus};
use crate::domain::loan::{EmiRecord, Loan, LoanId, LoanPatch, LoanPrecondition};
use crate::domain::money::Balance;
use crate::domain::now;
use crate::domain::ports::{AccountStore, LoanStore, SchemeStore, Stores, TransactionStore};
use crate::domain::scheme::{LoanScheme, SchemeId, SchemeStatus};
use crate::domain::transaction::LedgerEntry;
use crate::error::{BankError, Entity, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Account records keyed by account id.
pub const CF_ACCOUNTS: &str = "accounts";
/// Unique business keys (`n:<number>`, `e:<email>`) pointing at account ids.
pub const CF_ACCOUNT_INDEX: &str = "account_index";
/// Ledger entries keyed by account id followed by the big-endian sequence.
pub const CF_TRANSACTIONS: &str = "transactions";
pub const CF_LOANS: &str = "loans";
/// `user id ++ counter -> loan id`, preserving application order.
pub const CF_USER_LOANS: &str = "user_loans";
/// EMI records keyed by loan id followed by a counter.
pub const CF_EMI_HISTORY: &str = "emi_history";
pub const CF_SCHEMES: &str = "schemes";
pub const CF_META: &str = "meta";

const COUNTER_KEY: &[u8] = b"counter";

const COLUMN_FAMILIES: [&str; 8] = [
    CF_ACCOUNTS,
    CF_ACCOUNT_INDEX,
    CF_TRANSACTIONS,
    CF_LOANS,
    CF_USER_LOANS,
    CF_EMI_HISTORY,
    CF_SCHEMES,
    CF_META,
];

/// A persistent store implementation using RocksDB.
///
/// Implements every storage port over one database, one column family per
/// record kind. Records are JSON encoded. Writes that must check before they
/// write (conditional updates, unique keys) run under a process-wide write
/// lock and commit through a single `WriteBatch`.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
    counter: Arc<AtomicU64>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        let counter = match db.get_cf(cf(&db, CF_META)?, COUNTER_KEY)? {
            Some(bytes) => u64_from(&bytes)?,
            None => 0,
        };

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
            counter: Arc::new(AtomicU64::new(counter)),
        })
    }

    /// Every port backed by this one database.
    pub fn stores(&self) -> Stores {
        Stores {
            accounts: Arc::new(self.clone()),
            transactions: Arc::new(self.clone()),
            loans: Arc::new(self.clone()),
            schemes: Arc::new(self.clone()),
        }
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        cf(&self.db, name)
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| BankError::Internal("RocksDB write lock poisoned".into()))
    }

    fn read<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf_name)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put<T: Serialize>(&self, batch: &mut WriteBatch, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        batch.put_cf(self.cf(cf_name)?, key, serde_json::to_vec(value)?);
        Ok(())
    }

    /// Reserves the next counter value and stages its persistence in `batch`.
    fn next_counter(&self, batch: &mut WriteBatch) -> Result<u64> {
        let value = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        batch.put_cf(self.cf(CF_META)?, COUNTER_KEY, value.to_be_bytes());
        Ok(value)
    }

    fn scan_prefix<T: DeserializeOwned>(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<T>> {
        let iter = self
            .db
            .iterator_cf(self.cf(cf_name)?, IteratorMode::From(&prefix[..], Direction::Forward));
        let mut values = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    fn scan_all<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        self.scan_prefix(cf_name, &[])
    }

    fn index_key(kind: u8, value: &str) -> Vec<u8> {
        let mut key = vec![kind, b':'];
        key.extend_from_slice(value.as_bytes());
        key
    }

    fn number_key(number: &AccountNumber) -> Vec<u8> {
        Self::index_key(b'n', number.as_str())
    }

    fn email_key(email: &str) -> Vec<u8> {
        Self::index_key(b'e', &email.trim().to_lowercase())
    }

    fn account_by_index(&self, key: &[u8]) -> Result<Option<Account>> {
        match self.db.get_cf(self.cf(CF_ACCOUNT_INDEX)?, key)? {
            Some(id) => self.read(CF_ACCOUNTS, &id),
            None => Ok(None),
        }
    }

    fn insert_account(&self, account: &Account) -> Result<()> {
        let _guard = self.lock()?;
        let email_key = Self::email_key(&account.owner.email);
        let number_key = Self::number_key(&account.account_number);
        let index = self.cf(CF_ACCOUNT_INDEX)?;
        if self.db.get_pinned_cf(index, &email_key)?.is_some() {
            return Err(BankError::EmailTaken);
        }
        if self.db.get_pinned_cf(index, &number_key)?.is_some() {
            return Err(BankError::StoreConflict);
        }

        let id = account.id.0.as_bytes();
        let mut batch = WriteBatch::default();
        batch.put_cf(index, email_key, id);
        batch.put_cf(index, number_key, id);
        self.put(&mut batch, CF_ACCOUNTS, id, account)?;
        self.db.write(batch)?;
        Ok(())
    }

    fn cas_balance(&self, id: AccountId, expected: Balance, new: Balance) -> Result<u64> {
        let _guard = self.lock()?;
        let mut account: Account = self
            .read(CF_ACCOUNTS, id.0.as_bytes())?
            .ok_or(BankError::NotFound(Entity::Account))?;
        if account.balance != expected {
            return Err(BankError::StoreConflict);
        }
        account.balance = new;
        account.version += 1;

        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_ACCOUNTS, id.0.as_bytes(), &account)?;
        self.db.write(batch)?;
        Ok(account.version)
    }

    fn write_status(&self, id: AccountId, status: AccountStatus) -> Result<bool> {
        let _guard = self.lock()?;
        let Some(mut account) = self.read::<Account>(CF_ACCOUNTS, id.0.as_bytes())? else {
            return Ok(false);
        };
        account.status = status;
        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_ACCOUNTS, id.0.as_bytes(), &account)?;
        self.db.write(batch)?;
        Ok(true)
    }

    fn append_entry(&self, entry: &LedgerEntry) -> Result<()> {
        let _guard = self.lock()?;
        let key = entry_key(entry.account_id.0, entry.sequence);
        if self.db.get_pinned_cf(self.cf(CF_TRANSACTIONS)?, &key)?.is_some() {
            return Err(BankError::StoreConflict);
        }
        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_TRANSACTIONS, &key, entry)?;
        self.db.write(batch)?;
        Ok(())
    }

    fn read_history(&self, account_id: AccountId, limit: usize, skip: usize) -> Result<Vec<LedgerEntry>> {
        let wanted = skip.saturating_add(limit);
        if limit == 0 {
            return Ok(Vec::new());
        }
        let prefix = account_id.0.as_bytes();
        let upper = entry_key(account_id.0, u64::MAX);
        let iter = self.db.iterator_cf(
            self.cf(CF_TRANSACTIONS)?,
            IteratorMode::From(upper.as_slice(), Direction::Reverse),
        );

        let mut entries = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.push(value);
            if entries.len() == wanted {
                break;
            }
        }
        entries
            .into_iter()
            .skip(skip)
            .map(|bytes| serde_json::from_slice(&bytes).map_err(BankError::from))
            .collect()
    }

    fn insert_loan(&self, loan: &Loan) -> Result<()> {
        let _guard = self.lock()?;
        let mut batch = WriteBatch::default();
        let order = self.next_counter(&mut batch)?;
        batch.put_cf(
            self.cf(CF_USER_LOANS)?,
            entry_key(loan.user_id.0, order),
            loan.id.0.as_bytes(),
        );
        self.put(&mut batch, CF_LOANS, loan.id.0.as_bytes(), loan)?;
        self.db.write(batch)?;
        Ok(())
    }

    fn patch_loan(&self, id: LoanId, expected: LoanPrecondition, patch: &LoanPatch) -> Result<Loan> {
        let _guard = self.lock()?;
        let mut loan: Loan = self
            .read(CF_LOANS, id.0.as_bytes())?
            .ok_or(BankError::NotFound(Entity::Loan))?;
        if !expected.holds_for(&loan) {
            return Err(BankError::StoreConflict);
        }
        patch.apply(&mut loan);
        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_LOANS, id.0.as_bytes(), &loan)?;
        self.db.write(batch)?;
        Ok(loan)
    }

    fn append_record(&self, record: &EmiRecord) -> Result<()> {
        let _guard = self.lock()?;
        let mut batch = WriteBatch::default();
        let n = self.next_counter(&mut batch)?;
        self.put(&mut batch, CF_EMI_HISTORY, &entry_key(record.loan_id.0, n), record)?;
        self.db.write(batch)?;
        Ok(())
    }

    fn loans_of(&self, user_id: AccountId) -> Result<Vec<Loan>> {
        let prefix = user_id.0.as_bytes();
        let iter = self.db.iterator_cf(
            self.cf(CF_USER_LOANS)?,
            IteratorMode::From(&prefix[..], Direction::Forward),
        );
        let mut loans = Vec::new();
        for item in iter {
            let (key, loan_id) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            if let Some(loan) = self.read(CF_LOANS, &loan_id)? {
                loans.push(loan);
            }
        }
        Ok(loans)
    }

    fn insert_scheme(&self, scheme: &LoanScheme) -> Result<()> {
        let _guard = self.lock()?;
        let name_key = Self::index_key(b's', &scheme.name);
        if self.db.get_pinned_cf(self.cf(CF_ACCOUNT_INDEX)?, &name_key)?.is_some() {
            return Err(BankError::SchemeExists);
        }
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_ACCOUNT_INDEX)?, name_key, scheme.id.0.as_bytes());
        self.put(&mut batch, CF_SCHEMES, scheme.id.0.as_bytes(), scheme)?;
        self.db.write(batch)?;
        Ok(())
    }

    fn write_scheme_status(&self, id: SchemeId, status: SchemeStatus) -> Result<Option<LoanScheme>> {
        let _guard = self.lock()?;
        let Some(mut scheme) = self.read::<LoanScheme>(CF_SCHEMES, id.0.as_bytes())? else {
            return Ok(None);
        };
        scheme.status = status;
        scheme.updated_at = Some(now());
        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_SCHEMES, id.0.as_bytes(), &scheme)?;
        self.db.write(batch)?;
        Ok(Some(scheme))
    }
}

fn cf<'a>(db: &'a DB, name: &str) -> Result<&'a ColumnFamily> {
    db.cf_handle(name).ok_or_else(|| {
        BankError::Internal(Box::new(std::io::Error::other(format!(
            "{name} column family not found"
        ))))
    })
}

fn u64_from(bytes: &[u8]) -> Result<u64> {
    let array: [u8; 8] = bytes
        .try_into()
        .map_err(|_| BankError::Internal("corrupt counter value".into()))?;
    Ok(u64::from_be_bytes(array))
}

/// 16-byte id followed by a big-endian counter, so keys sort by id then counter.
fn entry_key(id: Uuid, n: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(24);
    key.extend_from_slice(id.as_bytes());
    key.extend_from_slice(&n.to_be_bytes());
    key
}

#[async_trait]
impl AccountStore for RocksDBStore {
    async fn insert(&self, account: Account) -> Result<()> {
        self.insert_account(&account)
    }

    async fn get(&self, id: AccountId) -> Result<Option<Account>> {
        self.read(CF_ACCOUNTS, id.0.as_bytes())
    }

    async fn get_by_number(&self, number: &AccountNumber) -> Result<Option<Account>> {
        self.account_by_index(&Self::number_key(number))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.account_by_index(&Self::email_key(email))
    }

    async fn conditional_update_balance(
        &self,
        id: AccountId,
        expected: Balance,
        new: Balance,
    ) -> Result<u64> {
        self.cas_balance(id, expected, new)
    }

    async fn set_status(&self, id: AccountId, status: AccountStatus) -> Result<bool> {
        self.write_status(id, status)
    }

    async fn get_all(&self) -> Result<Vec<Account>> {
        let mut accounts: Vec<Account> = self.scan_all(CF_ACCOUNTS)?;
        accounts.sort_by(|a, b| a.account_number.cmp(&b.account_number));
        Ok(accounts)
    }
}

#[async_trait]
impl TransactionStore for RocksDBStore {
    async fn append(&self, entry: LedgerEntry) -> Result<()> {
        self.append_entry(&entry)
    }

    async fn history(
        &self,
        account_id: AccountId,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<LedgerEntry>> {
        self.read_history(account_id, limit, skip)
    }
}

#[async_trait]
impl LoanStore for RocksDBStore {
    async fn insert(&self, loan: Loan) -> Result<()> {
        self.insert_loan(&loan)
    }

    async fn get(&self, id: LoanId) -> Result<Option<Loan>> {
        self.read(CF_LOANS, id.0.as_bytes())
    }

    async fn conditional_update(
        &self,
        id: LoanId,
        expected: LoanPrecondition,
        patch: LoanPatch,
    ) -> Result<Loan> {
        self.patch_loan(id, expected, &patch)
    }

    async fn append_emi_record(&self, record: EmiRecord) -> Result<()> {
        self.append_record(&record)
    }

    async fn emi_records(&self, loan_id: LoanId) -> Result<Vec<EmiRecord>> {
        self.scan_prefix(CF_EMI_HISTORY, loan_id.0.as_bytes())
    }

    async fn by_user(&self, user_id: AccountId) -> Result<Vec<Loan>> {
        self.loans_of(user_id)
    }

    async fn get_all(&self) -> Result<Vec<Loan>> {
        let mut loans: Vec<Loan> = self.scan_all(CF_LOANS)?;
        loans.sort_by_key(|loan| loan.applied_at);
        Ok(loans)
    }
}

#[async_trait]
impl SchemeStore for RocksDBStore {
    async fn insert(&self, scheme: LoanScheme) -> Result<()> {
        self.insert_scheme(&scheme)
    }

    async fn get(&self, id: SchemeId) -> Result<Option<LoanScheme>> {
        self.read(CF_SCHEMES, id.0.as_bytes())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<LoanScheme>> {
        match self
            .db
            .get_cf(self.cf(CF_ACCOUNT_INDEX)?, Self::index_key(b's', name))?
        {
            Some(id) => self.read(CF_SCHEMES, &id),
            None => Ok(None),
        }
    }

    async fn update_status(
        &self,
        id: SchemeId,
        status: SchemeStatus,
    ) -> Result<Option<LoanScheme>> {
        self.write_scheme_status(id, status)
    }

    async fn get_all(&self) -> Result<Vec<LoanScheme>> {
        let mut schemes: Vec<LoanScheme> = self.scan_all(CF_SCHEMES)?;
        schemes.sort_by_key(|scheme| scheme.created_at);
        Ok(schemes)
    }
}
