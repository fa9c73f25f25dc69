use crate::domain::account::{Account, AccountId, AccountNumber, AccountStatus};
use crate::domain::loan::{EmiRecord, Loan, LoanId, LoanPatch, LoanPrecondition};
use crate::domain::money::Balance;
use crate::domain::now;
use crate::domain::ports::{AccountStore, LoanStore, SchemeStore, Stores, TransactionStore};
use crate::domain::scheme::{LoanScheme, SchemeId, SchemeStatus};
use crate::domain::transaction::LedgerEntry;
use crate::error::{BankError, Entity, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Builds a full set of empty in-memory stores.
pub fn in_memory_stores() -> Stores {
    Stores {
        accounts: Arc::new(InMemoryAccountStore::new()),
        transactions: Arc::new(InMemoryTransactionStore::new()),
        loans: Arc::new(InMemoryLoanStore::new()),
        schemes: Arc::new(InMemorySchemeStore::new()),
    }
}

#[derive(Default)]
struct AccountTable {
    by_id: HashMap<AccountId, Account>,
    by_number: HashMap<AccountNumber, AccountId>,
    by_email: HashMap<String, AccountId>,
}

/// A thread-safe in-memory store for accounts.
///
/// Conditional balance writes take the write lock, so the compare and the
/// write cannot interleave with another writer.
#[derive(Default, Clone)]
pub struct InMemoryAccountStore {
    table: Arc<RwLock<AccountTable>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn insert(&self, account: Account) -> Result<()> {
        let mut table = self.table.write().await;
        let email = email_key(&account.owner.email);
        if table.by_email.contains_key(&email) {
            return Err(BankError::EmailTaken);
        }
        if table.by_number.contains_key(&account.account_number) {
            return Err(BankError::StoreConflict);
        }
        table.by_email.insert(email, account.id);
        table
            .by_number
            .insert(account.account_number.clone(), account.id);
        table.by_id.insert(account.id, account);
        Ok(())
    }

    async fn get(&self, id: AccountId) -> Result<Option<Account>> {
        let table = self.table.read().await;
        Ok(table.by_id.get(&id).cloned())
    }

    async fn get_by_number(&self, number: &AccountNumber) -> Result<Option<Account>> {
        let table = self.table.read().await;
        Ok(table
            .by_number
            .get(number)
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Account>> {
        let table = self.table.read().await;
        Ok(table
            .by_email
            .get(&email_key(email))
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    async fn conditional_update_balance(
        &self,
        id: AccountId,
        expected: Balance,
        new: Balance,
    ) -> Result<u64> {
        let mut table = self.table.write().await;
        let account = table
            .by_id
            .get_mut(&id)
            .ok_or(BankError::NotFound(Entity::Account))?;
        if account.balance != expected {
            return Err(BankError::StoreConflict);
        }
        account.balance = new;
        account.version += 1;
        Ok(account.version)
    }

    async fn set_status(&self, id: AccountId, status: AccountStatus) -> Result<bool> {
        let mut table = self.table.write().await;
        match table.by_id.get_mut(&id) {
            Some(account) => {
                account.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_all(&self) -> Result<Vec<Account>> {
        let table = self.table.read().await;
        let mut accounts: Vec<Account> = table.by_id.values().cloned().collect();
        accounts.sort_by(|a, b| a.account_number.cmp(&b.account_number));
        Ok(accounts)
    }
}

/// A thread-safe in-memory ledger keyed by `(account, sequence)`.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    entries: Arc<RwLock<BTreeMap<(AccountId, u64), LedgerEntry>>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn append(&self, entry: LedgerEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        let key = (entry.account_id, entry.sequence);
        if entries.contains_key(&key) {
            return Err(BankError::StoreConflict);
        }
        entries.insert(key, entry);
        Ok(())
    }

    async fn history(
        &self,
        account_id: AccountId,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<LedgerEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .range((account_id, 0)..=(account_id, u64::MAX))
            .rev()
            .skip(skip)
            .take(limit)
            .map(|(_, entry)| entry.clone())
            .collect())
    }
}

#[derive(Default)]
struct LoanTable {
    loans: HashMap<LoanId, Loan>,
    order: Vec<LoanId>,
    emi_history: Vec<EmiRecord>,
}

#[derive(Default, Clone)]
pub struct InMemoryLoanStore {
    table: Arc<RwLock<LoanTable>>,
}

impl InMemoryLoanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LoanStore for InMemoryLoanStore {
    async fn insert(&self, loan: Loan) -> Result<()> {
        let mut table = self.table.write().await;
        table.order.push(loan.id);
        table.loans.insert(loan.id, loan);
        Ok(())
    }

    async fn get(&self, id: LoanId) -> Result<Option<Loan>> {
        let table = self.table.read().await;
        Ok(table.loans.get(&id).cloned())
    }

    async fn conditional_update(
        &self,
        id: LoanId,
        expected: LoanPrecondition,
        patch: LoanPatch,
    ) -> Result<Loan> {
        let mut table = self.table.write().await;
        let loan = table
            .loans
            .get_mut(&id)
            .ok_or(BankError::NotFound(Entity::Loan))?;
        if !expected.holds_for(loan) {
            return Err(BankError::StoreConflict);
        }
        patch.apply(loan);
        Ok(loan.clone())
    }

    async fn append_emi_record(&self, record: EmiRecord) -> Result<()> {
        self.table.write().await.emi_history.push(record);
        Ok(())
    }

    async fn emi_records(&self, loan_id: LoanId) -> Result<Vec<EmiRecord>> {
        let table = self.table.read().await;
        Ok(table
            .emi_history
            .iter()
            .filter(|r| r.loan_id == loan_id)
            .cloned()
            .collect())
    }

    async fn by_user(&self, user_id: AccountId) -> Result<Vec<Loan>> {
        let table = self.table.read().await;
        Ok(table
            .order
            .iter()
            .filter_map(|id| table.loans.get(id))
            .filter(|loan| loan.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_all(&self) -> Result<Vec<Loan>> {
        let table = self.table.read().await;
        Ok(table
            .order
            .iter()
            .filter_map(|id| table.loans.get(id))
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemorySchemeStore {
    schemes: Arc<RwLock<Vec<LoanScheme>>>,
}

impl InMemorySchemeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SchemeStore for InMemorySchemeStore {
    async fn insert(&self, scheme: LoanScheme) -> Result<()> {
        let mut schemes = self.schemes.write().await;
        if schemes.iter().any(|s| s.name == scheme.name) {
            return Err(BankError::SchemeExists);
        }
        schemes.push(scheme);
        Ok(())
    }

    async fn get(&self, id: SchemeId) -> Result<Option<LoanScheme>> {
        let schemes = self.schemes.read().await;
        Ok(schemes.iter().find(|s| s.id == id).cloned())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<LoanScheme>> {
        let schemes = self.schemes.read().await;
        Ok(schemes.iter().find(|s| s.name == name).cloned())
    }

    async fn update_status(
        &self,
        id: SchemeId,
        status: SchemeStatus,
    ) -> Result<Option<LoanScheme>> {
        let mut schemes = self.schemes.write().await;
        Ok(schemes.iter_mut().find(|s| s.id == id).map(|scheme| {
            scheme.status = status;
            scheme.updated_at = Some(now());
            scheme.clone()
        }))
    }

    async fn get_all(&self) -> Result<Vec<LoanScheme>> {
        Ok(self.schemes.read().await.clone())
    }
}
