use super::Timestamp;
use super::account::AccountId;
use super::amortization::RepaymentPolicy;
use super::identity::Admin;
use super::money::{Amount, round_money};
use super::scheme::{LoanScheme, SchemeId};
use crate::error::BankError;
use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Days between an EMI payment and the next due date.
pub const BILLING_CYCLE_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoanId(pub Uuid);

impl LoanId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for LoanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Loan state machine:
/// `pending -> {Approved, Rejected}`, `Approved -> Ongoing -> Completed`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum LoanStatus {
    #[serde(rename = "pending")]
    Pending,
    Approved,
    Rejected,
    Ongoing,
    Completed,
}

impl LoanStatus {
    /// Statuses that accept EMI payments.
    pub fn is_repaying(self) -> bool {
        matches!(self, LoanStatus::Approved | LoanStatus::Ongoing)
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoanStatus::Pending => f.write_str("pending"),
            LoanStatus::Approved => f.write_str("Approved"),
            LoanStatus::Rejected => f.write_str("Rejected"),
            LoanStatus::Ongoing => f.write_str("Ongoing"),
            LoanStatus::Completed => f.write_str("Completed"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum LoanKind {
    Scheme,
    Personalized,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum PaymentType {
    #[serde(rename = "regular")]
    Regular,
    Advance,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Loan {
    pub id: LoanId,
    pub user_id: AccountId,
    pub kind: LoanKind,
    pub scheme_id: Option<SchemeId>,
    pub scheme_name: Option<String>,
    pub loan_name: Option<String>,
    pub description: Option<String>,
    /// Principal, frozen at application.
    pub amount: Amount,
    pub duration_months: u32,
    /// Percent per annum, snapshotted from the scheme. Personalized loans get it at approval.
    pub interest_rate: Option<Decimal>,
    pub policy: RepaymentPolicy,
    pub status: LoanStatus,
    #[serde(default)]
    pub emi_amount: Option<Decimal>,
    #[serde(default)]
    pub total_amount: Option<Decimal>,
    #[serde(default)]
    pub remaining_months: Option<u32>,
    #[serde(default)]
    pub next_due_date: Option<Timestamp>,
    pub applied_at: Timestamp,
    #[serde(default)]
    pub approved_at: Option<Timestamp>,
    #[serde(default)]
    pub rejected_at: Option<Timestamp>,
    #[serde(default)]
    pub decided_by: Option<String>,
}

/// What a conditional loan write expects to find before applying its patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanPrecondition {
    pub status: LoanStatus,
    pub remaining_months: Option<u32>,
}

impl LoanPrecondition {
    pub fn holds_for(&self, loan: &Loan) -> bool {
        loan.status == self.status && loan.remaining_months == self.remaining_months
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoanPatch {
    Approve {
        interest_rate: Decimal,
        emi_amount: Decimal,
        total_amount: Decimal,
        remaining_months: u32,
        next_due_date: Timestamp,
        approved_by: String,
    },
    Reject {
        rejected_at: Timestamp,
        rejected_by: String,
    },
    Installment {
        remaining_months: u32,
        next_due_date: Timestamp,
        status: LoanStatus,
    },
}

impl LoanPatch {
    pub fn apply(&self, loan: &mut Loan) {
        match self {
            LoanPatch::Approve {
                interest_rate,
                emi_amount,
                total_amount,
                remaining_months,
                next_due_date,
                approved_by,
            } => {
                loan.status = LoanStatus::Approved;
                loan.interest_rate = Some(*interest_rate);
                loan.emi_amount = Some(*emi_amount);
                loan.total_amount = Some(*total_amount);
                loan.remaining_months = Some(*remaining_months);
                loan.next_due_date = Some(*next_due_date);
                loan.approved_at = Some(*next_due_date);
                loan.decided_by = Some(approved_by.clone());
            }
            LoanPatch::Reject {
                rejected_at,
                rejected_by,
            } => {
                loan.status = LoanStatus::Rejected;
                loan.rejected_at = Some(*rejected_at);
                loan.decided_by = Some(rejected_by.clone());
            }
            LoanPatch::Installment {
                remaining_months,
                next_due_date,
                status,
            } => {
                loan.remaining_months = Some(*remaining_months);
                loan.next_due_date = Some(*next_due_date);
                loan.status = *status;
            }
        }
    }
}

impl Loan {
    /// A pending application against a scheme. Rate and principal are frozen here.
    pub fn apply_for_scheme(
        user_id: AccountId,
        scheme: &LoanScheme,
        amount: Amount,
        duration_months: u32,
        policy: RepaymentPolicy,
        at: Timestamp,
    ) -> Result<Self, BankError> {
        if !scheme.is_active() {
            return Err(BankError::SchemeInactive);
        }
        if amount > scheme.max_amount {
            return Err(BankError::ExceedsMaxAmount(scheme.max_amount.value()));
        }
        if duration_months == 0 {
            return Err(BankError::InvalidTenure);
        }
        Ok(Self {
            scheme_id: Some(scheme.id),
            scheme_name: Some(scheme.name.clone()),
            interest_rate: Some(scheme.interest_rate),
            ..Self::pending(user_id, LoanKind::Scheme, amount, duration_months, policy, at)
        })
    }

    /// A pending personalized application with no scheme and no rate yet.
    pub fn apply_personalized(
        user_id: AccountId,
        name: impl Into<String>,
        amount: Amount,
        duration_months: u32,
        description: Option<String>,
        policy: RepaymentPolicy,
        at: Timestamp,
    ) -> Result<Self, BankError> {
        if duration_months == 0 {
            return Err(BankError::InvalidTenure);
        }
        Ok(Self {
            loan_name: Some(name.into()),
            description,
            ..Self::pending(
                user_id,
                LoanKind::Personalized,
                amount,
                duration_months,
                policy,
                at,
            )
        })
    }

    fn pending(
        user_id: AccountId,
        kind: LoanKind,
        amount: Amount,
        duration_months: u32,
        policy: RepaymentPolicy,
        at: Timestamp,
    ) -> Self {
        Self {
            id: LoanId::generate(),
            user_id,
            kind,
            scheme_id: None,
            scheme_name: None,
            loan_name: None,
            description: None,
            amount,
            duration_months,
            interest_rate: None,
            policy,
            status: LoanStatus::Pending,
            emi_amount: None,
            total_amount: None,
            remaining_months: None,
            next_due_date: None,
            applied_at: at,
            approved_at: None,
            rejected_at: None,
            decided_by: None,
        }
    }

    pub fn precondition(&self) -> LoanPrecondition {
        LoanPrecondition {
            status: self.status,
            remaining_months: self.remaining_months,
        }
    }

    fn ensure_pending(&self) -> Result<(), BankError> {
        match self.status {
            LoanStatus::Pending => Ok(()),
            LoanStatus::Approved => Err(BankError::AlreadyApproved),
            LoanStatus::Rejected => Err(BankError::AlreadyRejected),
            LoanStatus::Ongoing | LoanStatus::Completed => Err(BankError::NotPending),
        }
    }

    /// Builds the approval patch. `supplied_rate` only matters when the loan has no rate.
    pub fn approval(
        &self,
        admin: &Admin,
        supplied_rate: Option<Decimal>,
        at: Timestamp,
    ) -> Result<LoanPatch, BankError> {
        self.ensure_pending()?;
        let interest_rate = self
            .interest_rate
            .or(supplied_rate)
            .ok_or(BankError::TermsRequired)?;
        let breakdown = self
            .policy
            .compute(self.amount.value(), interest_rate, self.duration_months)?;

        Ok(LoanPatch::Approve {
            interest_rate,
            emi_amount: breakdown.emi,
            total_amount: breakdown.total_payable,
            remaining_months: self.duration_months,
            next_due_date: at,
            approved_by: admin.id.clone(),
        })
    }

    pub fn rejection(&self, admin: &Admin, at: Timestamp) -> Result<LoanPatch, BankError> {
        self.ensure_pending()?;
        Ok(LoanPatch::Reject {
            rejected_at: at,
            rejected_by: admin.id.clone(),
        })
    }

    /// Builds the patch for paying exactly one installment.
    pub fn installment(&self, caller: AccountId, at: Timestamp) -> Result<LoanPatch, BankError> {
        if self.user_id != caller {
            return Err(BankError::Forbidden);
        }
        if !self.status.is_repaying() {
            return Err(BankError::NotActive);
        }
        let remaining = self.remaining_or_tenure();
        if remaining == 0 {
            return Err(BankError::AlreadyPaidOff);
        }

        let remaining_months = remaining - 1;
        Ok(LoanPatch::Installment {
            remaining_months,
            next_due_date: at + Duration::days(BILLING_CYCLE_DAYS),
            status: if remaining_months == 0 {
                LoanStatus::Completed
            } else {
                LoanStatus::Ongoing
            },
        })
    }

    fn remaining_or_tenure(&self) -> u32 {
        self.remaining_months.unwrap_or(self.duration_months)
    }

    /// Installment amount, falling back to an interest-free split for records
    /// approved before EMI figures were stored.
    pub fn emi_or_default(&self) -> Decimal {
        self.emi_amount.unwrap_or_else(|| {
            round_money(self.amount.value() / Decimal::from(self.duration_months.max(1)))
        })
    }

    pub fn summary(&self, at: Timestamp) -> LoanSummary {
        LoanSummary {
            id: self.id,
            name: self
                .scheme_name
                .clone()
                .or_else(|| self.loan_name.clone())
                .unwrap_or_default(),
            kind: self.kind,
            status: self.status,
            amount: self.amount.value(),
            duration_months: self.duration_months,
            interest_rate: self.interest_rate,
            emi_amount: self.emi_or_default(),
            total_amount: self.total_amount.unwrap_or_else(|| self.amount.value()),
            remaining_months: self.remaining_or_tenure(),
            next_due_date: self.next_due_date.unwrap_or(at),
        }
    }
}

/// A loan as presented to its owner, derived fields always filled in.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct LoanSummary {
    pub id: LoanId,
    pub name: String,
    pub kind: LoanKind,
    pub status: LoanStatus,
    pub amount: Decimal,
    pub duration_months: u32,
    pub interest_rate: Option<Decimal>,
    pub emi_amount: Decimal,
    pub total_amount: Decimal,
    pub remaining_months: u32,
    pub next_due_date: Timestamp,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct EmiRecord {
    pub loan_id: LoanId,
    pub user_id: AccountId,
    pub amount_paid: Decimal,
    pub paid_on: Timestamp,
    pub payment_type: PaymentType,
}
