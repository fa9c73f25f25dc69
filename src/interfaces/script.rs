//! Drives a [`Bank`] from command script rows.
//!
//! Scripts address customers by email and loans as `email#n`, the n-th loan
//! (1-based) that customer applied for.

use crate::application::Bank;
use crate::application::accounts::OpenAccount;
use crate::application::schemes::NewScheme;
use crate::domain::account::{Account, AccountType};
use crate::domain::identity::{Admin, Caller};
use crate::domain::loan::LoanId;
use crate::domain::scheme::SchemeStatus;
use crate::error::{BankError, Entity, Result};
use crate::interfaces::csv::command_reader::{Command, Op};
use crate::interfaces::csv::loan_writer::LoanRow;

pub struct ScriptRunner<'a> {
    bank: &'a Bank,
}

impl<'a> ScriptRunner<'a> {
    pub fn new(bank: &'a Bank) -> Self {
        Self { bank }
    }

    pub async fn execute(&self, command: &Command) -> Result<()> {
        let bank = self.bank;
        match command.op {
            Op::Open => {
                bank.accounts
                    .open(OpenAccount {
                        full_name: command.name()?.to_string(),
                        email: command.actor.clone(),
                        account_type: command.target()?.parse::<AccountType>()?,
                        initial_deposit: command.amount()?,
                    })
                    .await?;
            }
            Op::Deposit => {
                let caller = self.caller(&command.actor).await?;
                bank.money.deposit(&caller, command.amount()?).await?;
            }
            Op::Withdraw => {
                let caller = self.caller(&command.actor).await?;
                bank.money.withdraw(&caller, command.amount()?).await?;
            }
            Op::Transfer => {
                let caller = self.caller(&command.actor).await?;
                // An unknown receiver email is reported like an unknown account number.
                let receiver = self
                    .customer(command.target()?)
                    .await
                    .map_err(|e| match e {
                        BankError::NotFound(Entity::Account) => BankError::ReceiverNotFound,
                        other => other,
                    })?;
                bank.money
                    .transfer(&caller, &receiver.account_number, command.amount()?)
                    .await?;
            }
            Op::Block | Op::Unblock => {
                let admin = Admin::new(command.actor.as_str());
                let account = self.customer(command.target()?).await?;
                if command.op == Op::Block {
                    bank.accounts.block(&admin, account.id).await?;
                } else {
                    bank.accounts.unblock(&admin, account.id).await?;
                }
            }
            Op::Scheme => {
                let admin = Admin::new(command.actor.as_str());
                bank.schemes
                    .launch(
                        &admin,
                        NewScheme {
                            name: command.name()?.to_string(),
                            interest_rate: command
                                .rate
                                .ok_or_else(|| BankError::InvalidInput("missing 'rate' column".into()))?,
                            max_amount: command.amount()?,
                            description: command.target.clone().filter(|t| !t.is_empty()),
                        },
                    )
                    .await?;
            }
            Op::SchemeStatus => {
                let admin = Admin::new(command.actor.as_str());
                let scheme = bank.schemes.find_by_name(command.name()?).await?;
                let status = command.target()?.parse::<SchemeStatus>()?;
                bank.schemes.set_status(&admin, scheme.id, status).await?;
            }
            Op::Apply => {
                let caller = self.caller(&command.actor).await?;
                let scheme = bank.schemes.find_by_name(command.name()?).await?;
                bank.loans
                    .apply(&caller, scheme.id, command.amount()?, command.months()?)
                    .await?;
            }
            Op::ApplyCustom => {
                let caller = self.caller(&command.actor).await?;
                bank.loans
                    .apply_custom(
                        &caller,
                        command.name()?,
                        command.amount()?,
                        command.months()?,
                        command.target.clone().filter(|t| !t.is_empty()),
                    )
                    .await?;
            }
            Op::Approve => {
                let admin = Admin::new(command.actor.as_str());
                let loan_id = self.loan(command.target()?).await?;
                bank.loans.approve(&admin, loan_id, command.rate).await?;
            }
            Op::Reject => {
                let admin = Admin::new(command.actor.as_str());
                let loan_id = self.loan(command.target()?).await?;
                bank.loans.reject(&admin, loan_id).await?;
            }
            Op::PayEmi | Op::PayAdvance => {
                let caller = self.caller(&command.actor).await?;
                let loan_id = self.loan(command.target()?).await?;
                if command.op == Op::PayEmi {
                    bank.loans.pay_emi(&caller, loan_id).await?;
                } else {
                    bank.loans.pay_advance(&caller, loan_id).await?;
                }
            }
        }
        Ok(())
    }

    /// Every account, sorted by account number.
    pub async fn accounts(&self, admin: &Admin) -> Result<Vec<Account>> {
        let mut accounts = self.bank.accounts.list_all(admin).await?;
        accounts.sort_by(|a, b| a.account_number.cmp(&b.account_number));
        Ok(accounts)
    }

    /// Every loan, grouped by owner in account-number order.
    pub async fn loans(&self, admin: &Admin) -> Result<Vec<LoanRow>> {
        let mut rows = Vec::new();
        for account in self.accounts(admin).await? {
            let loans = self.bank.loans.list_mine(&Caller::new(account.id)).await?;
            for (n, summary) in loans.iter().enumerate() {
                rows.push(LoanRow::new(
                    format!("{}#{}", account.owner.email, n + 1),
                    summary,
                ));
            }
        }
        Ok(rows)
    }

    async fn customer(&self, email: &str) -> Result<Account> {
        self.bank
            .accounts
            .find_by_email(email)
            .await?
            .ok_or(BankError::NotFound(Entity::Account))
    }

    async fn caller(&self, email: &str) -> Result<Caller> {
        Ok(Caller::new(self.customer(email).await?.id))
    }

    async fn loan(&self, reference: &str) -> Result<LoanId> {
        let (email, n) = reference
            .rsplit_once('#')
            .and_then(|(email, n)| Some((email, n.parse::<usize>().ok()?)))
            .filter(|(_, n)| *n > 0)
            .ok_or_else(|| BankError::InvalidInput(format!("bad loan reference '{reference}'")))?;
        let caller = self.caller(email).await?;
        self.bank
            .loans
            .list_mine(&caller)
            .await?
            .get(n - 1)
            .map(|summary| summary.id)
            .ok_or(BankError::NotFound(Entity::Loan))
    }
}
