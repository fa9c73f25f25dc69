use crate::error::BankError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::ops::Sub;

/// Number of fractional digits kept for every monetary value.
pub const MINOR_UNITS: u32 = 2;

/// Rounds to the minor currency unit, half away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MINOR_UNITS, RoundingStrategy::MidpointAwayFromZero)
}

/// An account balance, always held at 2 decimal places.
///
/// Balances are never negative; subtraction goes through [`Balance::checked_debit`]
/// so the invariant cannot be broken by arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Balance(Decimal);

/// A strictly positive monetary amount for money movement and loan principals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    /// Rounds to 2 dp first, then rejects anything not above zero.
    pub fn new(value: Decimal) -> Result<Self, BankError> {
        let rounded = round_money(value);
        if rounded > Decimal::ZERO {
            Ok(Self(rounded))
        } else {
            Err(BankError::InvalidAmount)
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = BankError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Builds a balance from a stored or opening value. Negative input is rejected.
    pub fn new(value: Decimal) -> Result<Self, BankError> {
        let rounded = round_money(value);
        if rounded < Decimal::ZERO {
            return Err(BankError::InvalidAmount);
        }
        Ok(Self(rounded))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Fails with `InvalidAmount` when the sum is not representable.
    pub fn credit(self, amount: Amount) -> Result<Self, BankError> {
        self.0
            .checked_add(amount.0)
            .map(|sum| Self(round_money(sum)))
            .ok_or(BankError::InvalidAmount)
    }

    /// Fails with `InsufficientFunds` rather than going below zero.
    pub fn checked_debit(self, amount: Amount) -> Result<Self, BankError> {
        if amount.0 > self.0 {
            return Err(BankError::InsufficientFunds);
        }
        Ok(Self(round_money(self.0 - amount.0)))
    }
}

impl Sub<Amount> for Balance {
    type Output = Result<Self, BankError>;
    fn sub(self, rhs: Amount) -> Self::Output {
        self.checked_debit(rhs)
    }
}

impl std::fmt::Display for Balance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
