use super::retry::{bounded, retry_on_conflict};
use crate::config::EngineConfig;
use crate::domain::account::{Account, AccountId, AccountNumber, AccountStatus, AccountType, Customer};
use crate::domain::identity::{Admin, Caller};
use crate::domain::money::Amount;
use crate::domain::ports::{AccountStoreRef, TransactionStoreRef};
use crate::domain::transaction::{EntryType, LedgerEntry};
use crate::error::{BankError, Entity, Result};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct OpenAccount {
    pub full_name: String,
    pub email: String,
    pub account_type: AccountType,
    pub initial_deposit: Decimal,
}

/// Opens, looks up and blocks/unblocks accounts.
pub struct AccountRegistry {
    accounts: AccountStoreRef,
    transactions: TransactionStoreRef,
    config: EngineConfig,
}

impl AccountRegistry {
    pub fn new(
        accounts: AccountStoreRef,
        transactions: TransactionStoreRef,
        config: EngineConfig,
    ) -> Self {
        Self {
            accounts,
            transactions,
            config,
        }
    }

    /// Opens an account with a fresh account number and records the initial
    /// deposit as the account's first ledger entry (sequence 0).
    pub async fn open(&self, request: OpenAccount) -> Result<Account> {
        let initial = Amount::new(request.initial_deposit)?;
        if bounded(
            self.config.store_timeout,
            self.accounts.get_by_email(&request.email),
        )
        .await?
        .is_some()
        {
            return Err(BankError::EmailTaken);
        }

        let owner = Customer {
            full_name: request.full_name,
            email: request.email,
        };
        let account_type = request.account_type;
        let owner = &owner;
        // A number drawn by another opening at the same time surfaces as a conflict.
        let account = retry_on_conflict("open account", self.config.max_attempts, move || async move {
            let number = self.unused_number().await?;
            let account = Account::open(number, account_type, owner.clone(), initial.into());
            bounded(self.config.store_timeout, self.accounts.insert(account.clone())).await?;
            Ok(account)
        })
        .await?;

        let entry = LedgerEntry {
            account_id: account.id,
            sequence: account.version,
            r#type: EntryType::Deposit,
            amount: initial,
            balance_after: account.balance,
            counterparty_account: None,
            timestamp: account.created_at,
        };
        bounded(self.config.store_timeout, self.transactions.append(entry)).await?;

        tracing::info!(
            account = %account.account_number,
            account_type = %account.account_type,
            balance = %account.balance,
            "account opened"
        );
        Ok(account)
    }

    pub async fn view(&self, caller: &Caller) -> Result<Account> {
        self.get(caller.account_id).await
    }

    pub async fn get(&self, id: AccountId) -> Result<Account> {
        bounded(self.config.store_timeout, self.accounts.get(id))
            .await?
            .ok_or(BankError::NotFound(Entity::Account))
    }

    /// Resolves the unique email key, as a login collaborator would.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        bounded(self.config.store_timeout, self.accounts.get_by_email(email)).await
    }

    pub async fn block(&self, admin: &Admin, id: AccountId) -> Result<()> {
        self.set_status(admin, id, AccountStatus::Blocked).await
    }

    pub async fn unblock(&self, admin: &Admin, id: AccountId) -> Result<()> {
        self.set_status(admin, id, AccountStatus::Active).await
    }

    pub async fn list_all(&self, _admin: &Admin) -> Result<Vec<Account>> {
        bounded(self.config.store_timeout, self.accounts.get_all()).await
    }

    async fn set_status(&self, admin: &Admin, id: AccountId, status: AccountStatus) -> Result<()> {
        let found = bounded(self.config.store_timeout, self.accounts.set_status(id, status)).await?;
        if !found {
            return Err(BankError::NotFound(Entity::Account));
        }
        tracing::info!(account_id = %id, %status, admin = %admin, "account status changed");
        Ok(())
    }

    async fn unused_number(&self) -> Result<AccountNumber> {
        loop {
            let candidate = AccountNumber::random();
            if bounded(
                self.config.store_timeout,
                self.accounts.get_by_number(&candidate),
            )
            .await?
            .is_none()
            {
                return Ok(candidate);
            }
        }
    }
}
