use super::Timestamp;
use super::account::{AccountId, AccountNumber};
use super::money::{Amount, Balance};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Deposit,
    Withdraw,
    TransferSent,
    TransferReceived,
}

/// One immutable ledger entry: a single balance-affecting event on one account.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct LedgerEntry {
    pub account_id: AccountId,
    /// Account version produced by the write that caused this entry.
    pub sequence: u64,
    pub r#type: EntryType,
    pub amount: Amount,
    pub balance_after: Balance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty_account: Option<AccountNumber>,
    pub timestamp: Timestamp,
}

/// A page of history, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPage {
    pub account_number: AccountNumber,
    pub entries: Vec<LedgerEntry>,
    /// `skip` value that continues after this page, `None` once exhausted.
    pub next_skip: Option<usize>,
}
