use super::account::{Account, AccountId, AccountNumber, AccountStatus};
use super::loan::{EmiRecord, Loan, LoanId, LoanPatch, LoanPrecondition};
use super::money::Balance;
use super::scheme::{LoanScheme, SchemeId, SchemeStatus};
use super::transaction::LedgerEntry;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Keyed account storage.
///
/// `conditional_update_balance` is the only way a balance changes after opening.
/// It must be atomic per account: compare the stored balance with `expected`,
/// write `new` and bump the version, or fail with `BankError::StoreConflict`.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Inserts a new account. Fails with `EmailTaken` if the owner's email is
    /// in use and `StoreConflict` if the account number is.
    async fn insert(&self, account: Account) -> Result<()>;
    async fn get(&self, id: AccountId) -> Result<Option<Account>>;
    async fn get_by_number(&self, number: &AccountNumber) -> Result<Option<Account>>;
    async fn get_by_email(&self, email: &str) -> Result<Option<Account>>;
    /// Returns the account version produced by the write.
    async fn conditional_update_balance(
        &self,
        id: AccountId,
        expected: Balance,
        new: Balance,
    ) -> Result<u64>;
    /// Returns `false` when no account has this id.
    async fn set_status(&self, id: AccountId, status: AccountStatus) -> Result<bool>;
    async fn get_all(&self) -> Result<Vec<Account>>;
}

/// Append-only ledger.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn append(&self, entry: LedgerEntry) -> Result<()>;
    /// Entries of one account ordered by sequence, newest first.
    async fn history(&self, account_id: AccountId, limit: usize, skip: usize)
    -> Result<Vec<LedgerEntry>>;
}

#[async_trait]
pub trait LoanStore: Send + Sync {
    async fn insert(&self, loan: Loan) -> Result<()>;
    async fn get(&self, id: LoanId) -> Result<Option<Loan>>;
    /// Applies `patch` only if `expected` still holds, else `StoreConflict`.
    async fn conditional_update(
        &self,
        id: LoanId,
        expected: LoanPrecondition,
        patch: LoanPatch,
    ) -> Result<Loan>;
    async fn append_emi_record(&self, record: EmiRecord) -> Result<()>;
    async fn emi_records(&self, loan_id: LoanId) -> Result<Vec<EmiRecord>>;
    /// Loans of one customer in application order.
    async fn by_user(&self, user_id: AccountId) -> Result<Vec<Loan>>;
    async fn get_all(&self) -> Result<Vec<Loan>>;
}

#[async_trait]
pub trait SchemeStore: Send + Sync {
    /// Fails with `SchemeExists` when the name is taken.
    async fn insert(&self, scheme: LoanScheme) -> Result<()>;
    async fn get(&self, id: SchemeId) -> Result<Option<LoanScheme>>;
    async fn get_by_name(&self, name: &str) -> Result<Option<LoanScheme>>;
    /// Returns the updated scheme, `None` when no scheme has this id.
    async fn update_status(&self, id: SchemeId, status: SchemeStatus)
    -> Result<Option<LoanScheme>>;
    async fn get_all(&self) -> Result<Vec<LoanScheme>>;
}

pub type AccountStoreRef = Arc<dyn AccountStore>;
pub type TransactionStoreRef = Arc<dyn TransactionStore>;
pub type LoanStoreRef = Arc<dyn LoanStore>;
pub type SchemeStoreRef = Arc<dyn SchemeStore>;

/// The set of store handles an engine is constructed with.
#[derive(Clone)]
pub struct Stores {
    pub accounts: AccountStoreRef,
    pub transactions: TransactionStoreRef,
    pub loans: LoanStoreRef,
    pub schemes: SchemeStoreRef,
}
