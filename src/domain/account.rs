use super::money::Balance;
use super::{Timestamp, now};
use crate::error::BankError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque identity of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub Uuid);

impl AccountId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Business key of an account: `ACC` followed by six digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountNumber(String);

impl AccountNumber {
    pub const PREFIX: &'static str = "ACC";

    /// Draws a candidate number. Uniqueness is checked against the store by the caller.
    pub fn random() -> Self {
        let digits = rand::thread_rng().gen_range(0..1_000_000u32);
        Self(format!("{}{:06}", Self::PREFIX, digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountNumber {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Savings,
    Current,
    Fixed,
}

impl FromStr for AccountType {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "savings" => Ok(AccountType::Savings),
            "current" => Ok(AccountType::Current),
            "fixed" => Ok(AccountType::Fixed),
            other => Err(BankError::InvalidInput(format!(
                "unknown account type '{other}'"
            ))),
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountType::Savings => f.write_str("savings"),
            AccountType::Current => f.write_str("current"),
            AccountType::Fixed => f.write_str("fixed"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Blocked,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountStatus::Active => f.write_str("active"),
            AccountStatus::Blocked => f.write_str("blocked"),
        }
    }
}

/// Owner profile. Only the email is meaningful to the ledger (it is unique).
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Customer {
    pub full_name: String,
    pub email: String,
}

/// A customer account.
///
/// `balance` and `version` move together: every committed balance write bumps
/// `version` by one, and the ledger entry caused by that write carries the new
/// version as its sequence number.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Account {
    pub id: AccountId,
    pub account_number: AccountNumber,
    pub account_type: AccountType,
    pub balance: Balance,
    pub status: AccountStatus,
    pub owner: Customer,
    pub version: u64,
    pub created_at: Timestamp,
}

impl Account {
    pub fn open(
        account_number: AccountNumber,
        account_type: AccountType,
        owner: Customer,
        initial_balance: Balance,
    ) -> Self {
        Self {
            id: AccountId::generate(),
            account_number,
            account_type,
            balance: initial_balance,
            status: AccountStatus::Active,
            owner,
            version: 0,
            created_at: now(),
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.status == AccountStatus::Blocked
    }

    /// Rejects any money movement on a blocked account.
    pub fn ensure_active(&self) -> Result<(), BankError> {
        if self.is_blocked() {
            Err(BankError::AccountBlocked)
        } else {
            Ok(())
        }
    }
}
