use async_trait::async_trait;
use ledgerbank::application::Bank;
use ledgerbank::config::EngineConfig;
use ledgerbank::domain::account::{Account, AccountId, AccountNumber, AccountStatus};
use ledgerbank::domain::money::Balance;
use ledgerbank::domain::ports::{AccountStore, Stores, TransactionStore};
use ledgerbank::domain::transaction::{EntryType, LedgerEntry};
use ledgerbank::error::{BankError, Result};
use ledgerbank::infrastructure::in_memory::{
    InMemoryAccountStore, InMemoryLoanStore, InMemorySchemeStore, InMemoryTransactionStore,
};
use ledgerbank::interfaces::csv::command_reader::{Command, Op};
use ledgerbank::interfaces::script::ScriptRunner;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

mod common;
use common::{balance, open};

/// Account store whose email lookups fail for chosen addresses.
#[derive(Default)]
struct UnreachableEmails {
    inner: InMemoryAccountStore,
    failing: Mutex<HashSet<String>>,
}

#[async_trait]
impl AccountStore for UnreachableEmails {
    async fn insert(&self, account: Account) -> Result<()> {
        self.inner.insert(account).await
    }

    async fn get(&self, id: AccountId) -> Result<Option<Account>> {
        self.inner.get(id).await
    }

    async fn get_by_number(&self, number: &AccountNumber) -> Result<Option<Account>> {
        self.inner.get_by_number(number).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Account>> {
        let unreachable = self.failing.lock().unwrap().contains(email);
        if unreachable {
            return Err(BankError::StoreUnavailable("injected failure".to_string()));
        }
        self.inner.get_by_email(email).await
    }

    async fn conditional_update_balance(
        &self,
        id: AccountId,
        expected: Balance,
        new: Balance,
    ) -> Result<u64> {
        self.inner
            .conditional_update_balance(id, expected, new)
            .await
    }

    async fn set_status(&self, id: AccountId, status: AccountStatus) -> Result<bool> {
        self.inner.set_status(id, status).await
    }

    async fn get_all(&self) -> Result<Vec<Account>> {
        self.inner.get_all().await
    }
}

/// Ledger whose appends fail for chosen accounts.
#[derive(Default)]
struct FlakyLedger {
    inner: InMemoryTransactionStore,
    failing: Mutex<HashSet<AccountId>>,
}

#[async_trait]
impl TransactionStore for FlakyLedger {
    async fn append(&self, entry: LedgerEntry) -> Result<()> {
        let failing = self.failing.lock().unwrap().contains(&entry.account_id);
        if failing {
            return Err(BankError::StoreUnavailable("injected failure".to_string()));
        }
        self.inner.append(entry).await
    }

    async fn history(
        &self,
        account_id: AccountId,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<LedgerEntry>> {
        self.inner.history(account_id, limit, skip).await
    }
}

fn bank_with(accounts: Arc<dyn AccountStore>, transactions: Arc<dyn TransactionStore>) -> Bank {
    let stores = Stores {
        accounts,
        transactions,
        loans: Arc::new(InMemoryLoanStore::new()),
        schemes: Arc::new(InMemorySchemeStore::new()),
    };
    Bank::new(stores, EngineConfig::default())
}

fn transfer(actor: &str, target: &str) -> Command {
    Command {
        op: Op::Transfer,
        actor: actor.to_string(),
        target: Some(target.to_string()),
        amount: Some(dec!(10)),
        months: None,
        rate: None,
        name: None,
    }
}

#[tokio::test]
async fn test_script_transfer_keeps_receiver_lookup_failure() {
    let store = Arc::new(UnreachableEmails::default());
    let bank = bank_with(store.clone(), Arc::new(InMemoryTransactionStore::new()));
    let (_, a) = open(&bank, "a@example.com", dec!(100)).await;
    open(&bank, "b@example.com", dec!(5)).await;
    store
        .failing
        .lock()
        .unwrap()
        .insert("b@example.com".to_string());

    let runner = ScriptRunner::new(&bank);
    let result = runner
        .execute(&transfer("a@example.com", "b@example.com"))
        .await;
    assert!(matches!(result, Err(BankError::StoreUnavailable(_))));

    let result = runner
        .execute(&transfer("a@example.com", "nobody@example.com"))
        .await;
    assert!(matches!(result, Err(BankError::ReceiverNotFound)));
    assert_eq!(balance(&bank, &a).await, dec!(100));
}

#[tokio::test]
async fn test_failed_sender_entry_still_records_receiver_entry() {
    let ledger = Arc::new(FlakyLedger::default());
    let bank = bank_with(Arc::new(InMemoryAccountStore::new()), ledger.clone());
    let (a_account, a) = open(&bank, "a@example.com", dec!(100)).await;
    let (b_account, b) = open(&bank, "b@example.com", dec!(50)).await;
    ledger.failing.lock().unwrap().insert(a_account.id);

    let result = bank
        .money
        .transfer(&a, &b_account.account_number, dec!(30))
        .await;
    assert!(matches!(result, Err(BankError::StoreUnavailable(_))));

    // Both balance writes committed before the ledger was touched.
    assert_eq!(balance(&bank, &a).await, dec!(70));
    assert_eq!(balance(&bank, &b).await, dec!(80));

    let received = bank.money.history(&b, 10, 0).await.unwrap();
    assert_eq!(received.entries.len(), 2);
    assert_eq!(received.entries[0].r#type, EntryType::TransferReceived);
    assert_eq!(received.entries[0].balance_after.value(), dec!(80));
    assert_eq!(bank.money.history(&a, 10, 0).await.unwrap().entries.len(), 1);
}

#[tokio::test]
async fn test_both_entries_failing_are_reported_together() {
    let ledger = Arc::new(FlakyLedger::default());
    let bank = bank_with(Arc::new(InMemoryAccountStore::new()), ledger.clone());
    let (a_account, a) = open(&bank, "a@example.com", dec!(100)).await;
    let (b_account, _) = open(&bank, "b@example.com", dec!(50)).await;
    ledger
        .failing
        .lock()
        .unwrap()
        .extend([a_account.id, b_account.id]);

    let result = bank
        .money
        .transfer(&a, &b_account.account_number, dec!(30))
        .await;
    match result {
        Err(BankError::StoreUnavailable(detail)) => {
            assert!(detail.contains("both transfer entries"), "{detail}");
        }
        other => panic!("expected a combined append failure, got {other:?}"),
    }
}
