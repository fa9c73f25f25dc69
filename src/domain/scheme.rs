use super::money::Amount;
use super::{Timestamp, now};
use crate::error::BankError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemeId(pub Uuid);

impl fmt::Display for SchemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum SchemeStatus {
    Active,
    Inactive,
}

impl FromStr for SchemeStatus {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SchemeStatus::Active),
            "inactive" => Ok(SchemeStatus::Inactive),
            other => Err(BankError::InvalidInput(format!(
                "unknown scheme status '{other}'"
            ))),
        }
    }
}

/// A named loan product.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct LoanScheme {
    pub id: SchemeId,
    pub name: String,
    pub description: Option<String>,
    /// Percent per annum.
    pub interest_rate: Decimal,
    pub max_amount: Amount,
    pub status: SchemeStatus,
    pub created_at: Timestamp,
    pub updated_at: Option<Timestamp>,
}

impl LoanScheme {
    pub fn launch(
        name: impl Into<String>,
        interest_rate: Decimal,
        max_amount: Amount,
        description: Option<String>,
    ) -> Result<Self, BankError> {
        if interest_rate < Decimal::ZERO {
            return Err(BankError::InvalidRate);
        }
        Ok(Self {
            id: SchemeId(Uuid::new_v4()),
            name: name.into(),
            description,
            interest_rate,
            max_amount,
            status: SchemeStatus::Active,
            created_at: now(),
            updated_at: None,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == SchemeStatus::Active
    }
}
