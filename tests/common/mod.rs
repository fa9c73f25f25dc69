#![allow(dead_code)]

use ledgerbank::application::Bank;
use ledgerbank::application::accounts::OpenAccount;
use ledgerbank::application::schemes::NewScheme;
use ledgerbank::config::EngineConfig;
use ledgerbank::domain::account::{Account, AccountType};
use ledgerbank::domain::identity::{Admin, Caller};
use ledgerbank::domain::scheme::LoanScheme;
use ledgerbank::infrastructure::in_memory::in_memory_stores;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::Error;
use std::path::Path;

pub const HEADER: [&str; 7] = ["op", "actor", "target", "amount", "months", "rate", "name"];

pub fn bank() -> Bank {
    Bank::new(in_memory_stores(), EngineConfig::default())
}

pub fn admin() -> Admin {
    Admin::new("root")
}

pub async fn open(bank: &Bank, email: &str, deposit: Decimal) -> (Account, Caller) {
    let account = bank
        .accounts
        .open(OpenAccount {
            full_name: email.to_string(),
            email: email.to_string(),
            account_type: AccountType::Savings,
            initial_deposit: deposit,
        })
        .await
        .unwrap();
    let caller = Caller::new(account.id);
    (account, caller)
}

pub async fn scheme(bank: &Bank, name: &str, rate: Decimal, max_amount: Decimal) -> LoanScheme {
    bank.schemes
        .launch(
            &admin(),
            NewScheme {
                name: name.to_string(),
                interest_rate: rate,
                max_amount,
                description: None,
            },
        )
        .await
        .unwrap()
}

pub async fn balance(bank: &Bank, caller: &Caller) -> Decimal {
    bank.accounts.view(caller).await.unwrap().balance.value()
}

/// Writes a script opening `accounts` customers, then `rows` deposits of 1.00
/// spread round-robin over them.
pub fn generate_script(path: &Path, accounts: usize, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(HEADER)?;

    for i in 0..accounts {
        let email = format!("user{i}@example.com");
        wtr.write_record(["open", &email, "savings", "1.00", "", "", "User"])?;
    }
    for i in 0..rows {
        let email = format!("user{}@example.com", i % accounts);
        wtr.write_record(["deposit", &email, "", "1.00", "", "", ""])?;
    }

    wtr.flush()?;
    Ok(())
}
