//! EMI arithmetic. Pure functions only: nothing here touches a store.

use super::money::round_money;
use crate::error::BankError;
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MONTHS_PER_YEAR_PERCENT: Decimal = Decimal::from_parts(1200, 0, 0, false, 0);

/// How interest on a loan is computed. A loan binds one policy for its whole life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepaymentPolicy {
    /// Interest charged once on the full principal for the full tenure.
    #[default]
    Flat,
    /// Standard amortized EMI on the outstanding principal.
    ReducingBalance,
}

impl FromStr for RepaymentPolicy {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flat" => Ok(RepaymentPolicy::Flat),
            "reducing" | "reducing_balance" => Ok(RepaymentPolicy::ReducingBalance),
            other => Err(BankError::InvalidInput(format!(
                "unknown repayment policy '{other}'"
            ))),
        }
    }
}

impl fmt::Display for RepaymentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepaymentPolicy::Flat => f.write_str("flat"),
            RepaymentPolicy::ReducingBalance => f.write_str("reducing_balance"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmiBreakdown {
    pub emi: Decimal,
    pub total_payable: Decimal,
    pub total_interest: Decimal,
}

impl RepaymentPolicy {
    pub fn compute(
        self,
        principal: Decimal,
        annual_rate_percent: Decimal,
        tenure_months: u32,
    ) -> Result<EmiBreakdown, BankError> {
        match self {
            RepaymentPolicy::Flat => flat_emi(principal, annual_rate_percent, tenure_months),
            RepaymentPolicy::ReducingBalance => {
                reducing_balance_emi(principal, annual_rate_percent, tenure_months)
            }
        }
    }
}

fn validate(annual_rate_percent: Decimal, tenure_months: u32) -> Result<(), BankError> {
    if tenure_months == 0 {
        return Err(BankError::InvalidTenure);
    }
    if annual_rate_percent < Decimal::ZERO {
        return Err(BankError::InvalidRate);
    }
    Ok(())
}

fn overflowed() -> BankError {
    BankError::InvalidInput("EMI computation overflowed".to_string())
}

/// `interest = P * rate * n / 1200`, `emi = round((P + interest) / n, 2)`.
pub fn flat_emi(
    principal: Decimal,
    annual_rate_percent: Decimal,
    tenure_months: u32,
) -> Result<EmiBreakdown, BankError> {
    validate(annual_rate_percent, tenure_months)?;
    let months = Decimal::from(tenure_months);

    let interest = principal
        .checked_mul(annual_rate_percent)
        .and_then(|v| v.checked_mul(months))
        .and_then(|v| v.checked_div(MONTHS_PER_YEAR_PERCENT))
        .ok_or_else(overflowed)?;
    let total_interest = round_money(interest);
    let total_payable = round_money(principal.checked_add(total_interest).ok_or_else(overflowed)?);
    let emi = round_money(total_payable.checked_div(months).ok_or_else(overflowed)?);

    Ok(EmiBreakdown {
        emi,
        total_payable,
        total_interest,
    })
}

/// `emi = round(P * r * (1+r)^n / ((1+r)^n - 1), 2)` with `r = rate / 1200`.
///
/// A rate too small to move `(1+r)^n` away from one amortizes like a zero rate.
pub fn reducing_balance_emi(
    principal: Decimal,
    annual_rate_percent: Decimal,
    tenure_months: u32,
) -> Result<EmiBreakdown, BankError> {
    validate(annual_rate_percent, tenure_months)?;
    let months = Decimal::from(tenure_months);

    let r = annual_rate_percent
        .checked_div(MONTHS_PER_YEAR_PERCENT)
        .ok_or_else(overflowed)?;
    let growth = Decimal::ONE
        .checked_add(r)
        .and_then(|base| base.checked_powu(u64::from(tenure_months)))
        .ok_or_else(overflowed)?;

    let emi = if r.is_zero() || growth == Decimal::ONE {
        principal.checked_div(months)
    } else {
        // Dividing before multiplying keeps long tenures in range.
        growth
            .checked_sub(Decimal::ONE)
            .and_then(|denominator| growth.checked_div(denominator))
            .and_then(|factor| principal.checked_mul(r)?.checked_mul(factor))
    }
    .map(round_money)
    .ok_or_else(overflowed)?;

    let total_payable = round_money(emi.checked_mul(months).ok_or_else(overflowed)?);
    let total_interest = round_money(total_payable.checked_sub(principal).ok_or_else(overflowed)?);
    Ok(EmiBreakdown {
        emi,
        total_payable,
        total_interest,
    })
}
