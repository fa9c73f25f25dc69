use crate::domain::account::Account;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct AccountRow<'a> {
    account_number: &'a str,
    email: &'a str,
    #[serde(rename = "type")]
    account_type: String,
    balance: String,
    status: String,
}

impl<'a> From<&'a Account> for AccountRow<'a> {
    fn from(account: &'a Account) -> Self {
        Self {
            account_number: account.account_number.as_str(),
            email: &account.owner.email,
            account_type: account.account_type.to_string(),
            balance: account.balance.to_string(),
            status: account.status.to_string(),
        }
    }
}

/// Writes final account state as CSV.
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes the header followed by one row per account, then flushes.
    pub fn write_accounts(&mut self, accounts: &[Account]) -> Result<()> {
        if accounts.is_empty() {
            self.writer
                .write_record(["account_number", "email", "type", "balance", "status"])?;
        }
        for account in accounts {
            self.writer.serialize(AccountRow::from(account))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
