use super::retry::{bounded, retry_on_conflict};
use crate::config::EngineConfig;
use crate::domain::account::{Account, AccountId, AccountNumber};
use crate::domain::identity::Caller;
use crate::domain::money::{Amount, Balance};
use crate::domain::now;
use crate::domain::ports::{AccountStoreRef, TransactionStoreRef};
use crate::domain::transaction::{EntryType, HistoryPage, LedgerEntry};
use crate::error::{BankError, Entity, Result};
use rust_decimal::Decimal;

/// A balance write that has committed.
#[derive(Debug, Clone)]
struct Committed {
    account: Account,
    balance_after: Balance,
    sequence: u64,
}

/// Outcome of a deposit or withdrawal.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceUpdate {
    pub account_number: AccountNumber,
    pub new_balance: Balance,
    pub entry: LedgerEntry,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    pub sender_new_balance: Balance,
    pub receiver_new_balance: Balance,
    pub sent: LedgerEntry,
    pub received: LedgerEntry,
}

/// Executes deposits, withdrawals and transfers against the account store.
///
/// Every balance change is a conditional write on the balance just read. A
/// conflicting write by another caller makes the engine reload, re-validate and
/// try again, so concurrent operations never lose an update. Ledger entries are
/// appended only once the balance writes they describe have committed.
pub struct MoneyMovementEngine {
    accounts: AccountStoreRef,
    transactions: TransactionStoreRef,
    config: EngineConfig,
}

impl MoneyMovementEngine {
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

    pub async fn deposit(&self, caller: &Caller, amount: Decimal) -> Result<BalanceUpdate> {
        let amount = Amount::new(amount)?;
        let committed = self.credit(caller.account_id, amount, "deposit").await?;
        let entry = self.entry(&committed, EntryType::Deposit, amount, None);
        self.append(&entry).await?;

        tracing::info!(
            account = %committed.account.account_number,
            %amount,
            balance = %committed.balance_after,
            "deposit committed"
        );
        Ok(BalanceUpdate {
            account_number: committed.account.account_number,
            new_balance: committed.balance_after,
            entry,
        })
    }

    pub async fn withdraw(&self, caller: &Caller, amount: Decimal) -> Result<BalanceUpdate> {
        let amount = Amount::new(amount)?;
        let committed = self.debit(caller.account_id, amount).await?;
        let entry = self.entry(&committed, EntryType::Withdraw, amount, None);
        self.append(&entry).await?;

        tracing::info!(
            account = %committed.account.account_number,
            %amount,
            balance = %committed.balance_after,
            "withdrawal committed"
        );
        Ok(BalanceUpdate {
            account_number: committed.account.account_number,
            new_balance: committed.balance_after,
            entry,
        })
    }

    /// Moves `amount` from the caller to the account numbered `receiver_number`.
    ///
    /// Runs as a two-step saga: debit the sender, then credit the receiver. If
    /// the credit cannot be committed the debit is reversed with a compensating
    /// credit. A reversal that cannot be committed either is reported as
    /// `ReconciliationRequired` and logged at error level.
    pub async fn transfer(
        &self,
        caller: &Caller,
        receiver_number: &AccountNumber,
        amount: Decimal,
    ) -> Result<TransferReceipt> {
        let amount = Amount::new(amount)?;
        let sender = self.load(caller.account_id).await?;
        sender.ensure_active()?;
        if amount.value() > sender.balance.value() {
            return Err(BankError::InsufficientFunds);
        }
        let receiver = bounded(
            self.config.store_timeout,
            self.accounts.get_by_number(receiver_number),
        )
        .await?
        .ok_or(BankError::ReceiverNotFound)?;
        if receiver.id == sender.id {
            return Err(BankError::SelfTransfer);
        }
        receiver.ensure_active()?;

        let debited = self.debit(sender.id, amount).await?;
        let credited = match self.credit(receiver.id, amount, "transfer credit").await {
            Ok(credited) => credited,
            Err(e) => {
                let e = match e {
                    BankError::NotFound(Entity::Account) => BankError::ReceiverNotFound,
                    other => other,
                };
                return Err(self.compensate(&debited, amount, e).await);
            }
        };

        let sent = self.entry(
            &debited,
            EntryType::TransferSent,
            amount,
            Some(receiver.account_number.clone()),
        );
        let received = self.entry(
            &credited,
            EntryType::TransferReceived,
            amount,
            Some(sender.account_number.clone()),
        );
        // Both sides have committed, so both entries are attempted whatever the first outcome.
        let sent_appended = self.append(&sent).await;
        let received_appended = self.append(&received).await;
        match (sent_appended, received_appended) {
            (Ok(()), Ok(())) => {}
            (Err(e), Ok(())) | (Ok(()), Err(e)) => return Err(e),
            (Err(sent_error), Err(received_error)) => {
                return Err(BankError::StoreUnavailable(format!(
                    "ledger append failed for both transfer entries: {sent_error}; {received_error}"
                )));
            }
        }

        tracing::info!(
            from = %sender.account_number,
            to = %receiver.account_number,
            %amount,
            "transfer committed"
        );
        Ok(TransferReceipt {
            sender_new_balance: debited.balance_after,
            receiver_new_balance: credited.balance_after,
            sent,
            received,
        })
    }

    /// One page of the caller's ledger, newest first. Resume with `next_skip`.
    pub async fn history(&self, caller: &Caller, limit: usize, skip: usize) -> Result<HistoryPage> {
        let account = self.load(caller.account_id).await?;
        let limit = limit.max(1);
        let mut entries = bounded(
            self.config.store_timeout,
            self.transactions.history(account.id, limit.saturating_add(1), skip),
        )
        .await?;

        let has_more = entries.len() > limit;
        entries.truncate(limit);
        Ok(HistoryPage {
            account_number: account.account_number,
            entries,
            next_skip: has_more.then_some(skip.saturating_add(limit)),
        })
    }

    async fn load(&self, id: AccountId) -> Result<Account> {
        bounded(self.config.store_timeout, self.accounts.get(id))
            .await?
            .ok_or(BankError::NotFound(Entity::Account))
    }

    async fn write(&self, account: Account, balance_after: Balance) -> Result<Committed> {
        let sequence = bounded(
            self.config.store_timeout,
            self.accounts
                .conditional_update_balance(account.id, account.balance, balance_after),
        )
        .await?;
        Ok(Committed {
            account,
            balance_after,
            sequence,
        })
    }

    async fn credit(
        &self,
        id: AccountId,
        amount: Amount,
        operation: &'static str,
    ) -> Result<Committed> {
        retry_on_conflict(operation, self.config.max_attempts, move || async move {
            let account = self.load(id).await?;
            account.ensure_active()?;
            let balance_after = account.balance.credit(amount)?;
            self.write(account, balance_after).await
        })
        .await
    }

    /// Funds are checked against the balance read on each attempt, never a stale copy.
    async fn debit(&self, id: AccountId, amount: Amount) -> Result<Committed> {
        retry_on_conflict("debit", self.config.max_attempts, move || async move {
            let account = self.load(id).await?;
            account.ensure_active()?;
            let balance_after = account.balance.checked_debit(amount)?;
            self.write(account, balance_after).await
        })
        .await
    }

    /// Reverses a committed debit. Returns the error the caller should see.
    async fn compensate(&self, debited: &Committed, amount: Amount, cause: BankError) -> BankError {
        let sender = &debited.account;
        tracing::warn!(
            account = %sender.account_number,
            %amount,
            error = %cause,
            "transfer credit failed, reversing debit"
        );

        let reversal = retry_on_conflict(
            "transfer reversal",
            self.config.max_compensation_attempts,
            move || async move {
                let account = self.load(sender.id).await?;
                let balance_after = account.balance.credit(amount)?;
                self.write(account, balance_after).await
            },
        )
        .await;

        match reversal {
            Ok(_) => cause,
            Err(reversal_error) => {
                tracing::error!(
                    account = %sender.account_number,
                    %amount,
                    debit_sequence = debited.sequence,
                    cause = %cause,
                    error = %reversal_error,
                    "MANUAL RECONCILIATION REQUIRED: sender debited without matching credit"
                );
                BankError::ReconciliationRequired(format!(
                    "account {} debited {} at sequence {} without matching credit",
                    sender.account_number, amount, debited.sequence
                ))
            }
        }
    }

    fn entry(
        &self,
        committed: &Committed,
        r#type: EntryType,
        amount: Amount,
        counterparty_account: Option<AccountNumber>,
    ) -> LedgerEntry {
        LedgerEntry {
            account_id: committed.account.id,
            sequence: committed.sequence,
            r#type,
            amount,
            balance_after: committed.balance_after,
            counterparty_account,
            timestamp: now(),
        }
    }

    async fn append(&self, entry: &LedgerEntry) -> Result<()> {
        let result = bounded(
            self.config.store_timeout,
            self.transactions.append(entry.clone()),
        )
        .await;
        if let Err(e) = &result {
            tracing::error!(
                account_id = %entry.account_id,
                sequence = entry.sequence,
                error = %e,
                "balance committed but ledger append failed"
            );
        }
        result
    }
}
