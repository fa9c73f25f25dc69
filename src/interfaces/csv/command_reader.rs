use crate::error::{BankError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Open,
    Deposit,
    Withdraw,
    Transfer,
    Block,
    Unblock,
    Scheme,
    SchemeStatus,
    Apply,
    ApplyCustom,
    Approve,
    Reject,
    PayEmi,
    PayAdvance,
}

/// One row of a command script.
///
/// `actor` is a customer email, or an administrator id for admin ops. Which of
/// the remaining columns are required depends on `op`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Command {
    pub op: Op,
    pub actor: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub months: Option<u32>,
    #[serde(default)]
    pub rate: Option<Decimal>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Command {
    pub fn target(&self) -> Result<&str> {
        required(self.target.as_deref(), "target")
    }

    pub fn amount(&self) -> Result<Decimal> {
        self.amount.ok_or_else(|| missing("amount"))
    }

    pub fn months(&self) -> Result<u32> {
        self.months.ok_or_else(|| missing("months"))
    }

    pub fn name(&self) -> Result<&str> {
        required(self.name.as_deref(), "name")
    }
}

fn required<'a>(value: Option<&'a str>, column: &str) -> Result<&'a str> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| missing(column))
}

fn missing(column: &str) -> BankError {
    BankError::InvalidInput(format!("missing '{column}' column"))
}

/// Reads commands from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<Command>`.
/// It handles whitespace trimming and flexible record lengths automatically.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes commands, one per row.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(BankError::from))
    }
}
