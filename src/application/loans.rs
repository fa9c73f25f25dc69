use super::retry::{bounded, retry_on_conflict};
use crate::config::EngineConfig;
use crate::domain::amortization::EmiBreakdown;
use crate::domain::identity::{Admin, Caller};
use crate::domain::loan::{EmiRecord, Loan, LoanId, LoanPatch, LoanSummary, PaymentType};
use crate::domain::money::Amount;
use crate::domain::now;
use crate::domain::ports::{AccountStoreRef, LoanStoreRef, SchemeStoreRef};
use crate::domain::scheme::{LoanScheme, SchemeId};
use crate::error::{BankError, Entity, Result};
use rust_decimal::Decimal;

/// Outcome of one EMI payment.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentReceipt {
    pub loan: Loan,
    pub record: EmiRecord,
}

/// Owns the loan state machine and the EMI schedule.
///
/// Decisions and payments are conditional writes guarded by the loan's status
/// and remaining months as read just before the write, so two concurrent
/// approvals or payments on one loan cannot both land.
pub struct LoanLifecycleEngine {
    accounts: AccountStoreRef,
    loans: LoanStoreRef,
    schemes: SchemeStoreRef,
    config: EngineConfig,
}

impl LoanLifecycleEngine {
    pub fn new(
        accounts: AccountStoreRef,
        loans: LoanStoreRef,
        schemes: SchemeStoreRef,
        config: EngineConfig,
    ) -> Self {
        Self {
            accounts,
            loans,
            schemes,
            config,
        }
    }

    pub async fn apply(
        &self,
        caller: &Caller,
        scheme_id: SchemeId,
        amount: Decimal,
        duration_months: u32,
    ) -> Result<Loan> {
        let amount = Amount::new(amount)?;
        self.ensure_customer(caller).await?;
        let scheme = self.scheme(scheme_id).await?;

        let loan = Loan::apply_for_scheme(
            caller.account_id,
            &scheme,
            amount,
            duration_months,
            self.config.approval_policy,
            now(),
        )?;
        bounded(self.config.store_timeout, self.loans.insert(loan.clone())).await?;

        tracing::info!(loan = %loan.id, scheme = %scheme.name, %amount, "loan application submitted");
        Ok(loan)
    }

    /// A personalized application: no scheme, terms settled at approval.
    pub async fn apply_custom(
        &self,
        caller: &Caller,
        name: &str,
        amount: Decimal,
        duration_months: u32,
        description: Option<String>,
    ) -> Result<Loan> {
        let amount = Amount::new(amount)?;
        self.ensure_customer(caller).await?;

        let loan = Loan::apply_personalized(
            caller.account_id,
            name,
            amount,
            duration_months,
            description,
            self.config.approval_policy,
            now(),
        )?;
        bounded(self.config.store_timeout, self.loans.insert(loan.clone())).await?;

        tracing::info!(loan = %loan.id, name, %amount, "personalized loan request submitted");
        Ok(loan)
    }

    /// Repayment estimate for a prospective application on `scheme_id`.
    pub async fn estimate(
        &self,
        scheme_id: SchemeId,
        amount: Decimal,
        duration_months: u32,
    ) -> Result<EmiBreakdown> {
        let scheme = self.scheme(scheme_id).await?;
        self.estimate_at_rate(scheme.interest_rate, amount, duration_months)
    }

    /// Repayment estimate for an arbitrary annual `rate`, e.g. a personalized request.
    pub fn estimate_at_rate(
        &self,
        rate: Decimal,
        amount: Decimal,
        duration_months: u32,
    ) -> Result<EmiBreakdown> {
        let amount = Amount::new(amount)?;
        self.config
            .estimate_policy
            .compute(amount.value(), rate, duration_months)
    }

    /// Approves a pending loan. `rate` is only consulted for loans applied
    /// without one; the configured default applies when it is absent.
    pub async fn approve(
        &self,
        admin: &Admin,
        loan_id: LoanId,
        rate: Option<Decimal>,
    ) -> Result<Loan> {
        let rate = rate.or(self.config.custom_loan_rate);
        let loan = self
            .transition("approve", loan_id, move |loan| {
                loan.approval(admin, rate, now())
            })
            .await?;

        tracing::info!(
            loan = %loan.id,
            admin = %admin,
            emi = ?loan.emi_amount,
            total = ?loan.total_amount,
            "loan approved"
        );
        Ok(loan)
    }

    pub async fn reject(&self, admin: &Admin, loan_id: LoanId) -> Result<Loan> {
        let loan = self
            .transition("reject", loan_id, move |loan| loan.rejection(admin, now()))
            .await?;
        tracing::info!(loan = %loan.id, admin = %admin, "loan rejected");
        Ok(loan)
    }

    pub async fn pay_emi(&self, caller: &Caller, loan_id: LoanId) -> Result<PaymentReceipt> {
        self.pay(caller, loan_id, PaymentType::Regular).await
    }

    /// Pays the next installment ahead of its due date. One installment per call.
    pub async fn pay_advance(&self, caller: &Caller, loan_id: LoanId) -> Result<PaymentReceipt> {
        self.pay(caller, loan_id, PaymentType::Advance).await
    }

    pub async fn list_mine(&self, caller: &Caller) -> Result<Vec<LoanSummary>> {
        let at = now();
        Ok(self
            .by_user(caller)
            .await?
            .iter()
            .map(|loan| loan.summary(at))
            .collect())
    }

    /// The caller's loans that are Approved or Ongoing.
    pub async fn list_active(&self, caller: &Caller) -> Result<Vec<LoanSummary>> {
        let at = now();
        Ok(self
            .by_user(caller)
            .await?
            .iter()
            .filter(|loan| loan.status.is_repaying())
            .map(|loan| loan.summary(at))
            .collect())
    }

    pub async fn list_all(&self, _admin: &Admin) -> Result<Vec<Loan>> {
        bounded(self.config.store_timeout, self.loans.get_all()).await
    }

    pub async fn payment_history(&self, caller: &Caller, loan_id: LoanId) -> Result<Vec<EmiRecord>> {
        let loan = self.load(loan_id).await?;
        if loan.user_id != caller.account_id {
            return Err(BankError::Forbidden);
        }
        bounded(self.config.store_timeout, self.loans.emi_records(loan_id)).await
    }

    async fn pay(
        &self,
        caller: &Caller,
        loan_id: LoanId,
        payment_type: PaymentType,
    ) -> Result<PaymentReceipt> {
        let user_id = caller.account_id;
        let loan = self
            .transition("pay installment", loan_id, move |loan| {
                loan.installment(user_id, now())
            })
            .await?;

        let record = EmiRecord {
            loan_id,
            user_id,
            amount_paid: loan.emi_or_default(),
            paid_on: now(),
            payment_type,
        };
        if let Err(e) = bounded(
            self.config.store_timeout,
            self.loans.append_emi_record(record.clone()),
        )
        .await
        {
            tracing::error!(
                loan = %loan_id,
                error = %e,
                "installment committed but EMI record append failed"
            );
            return Err(e);
        }

        tracing::info!(
            loan = %loan_id,
            ?payment_type,
            remaining = ?loan.remaining_months,
            status = %loan.status,
            "EMI paid"
        );
        Ok(PaymentReceipt { loan, record })
    }

    /// Reload, validate, conditionally write; repeat on conflict.
    async fn transition<F>(&self, operation: &'static str, loan_id: LoanId, decide: F) -> Result<Loan>
    where
        F: Fn(&Loan) -> Result<LoanPatch>,
    {
        let decide = &decide;
        retry_on_conflict(operation, self.config.max_attempts, move || async move {
            let loan = self.load(loan_id).await?;
            let patch = decide(&loan)?;
            bounded(
                self.config.store_timeout,
                self.loans
                    .conditional_update(loan_id, loan.precondition(), patch),
            )
            .await
        })
        .await
    }

    async fn load(&self, loan_id: LoanId) -> Result<Loan> {
        bounded(self.config.store_timeout, self.loans.get(loan_id))
            .await?
            .ok_or(BankError::NotFound(Entity::Loan))
    }

    async fn scheme(&self, scheme_id: SchemeId) -> Result<LoanScheme> {
        bounded(self.config.store_timeout, self.schemes.get(scheme_id))
            .await?
            .ok_or(BankError::NotFound(Entity::Scheme))
    }

    async fn ensure_customer(&self, caller: &Caller) -> Result<()> {
        bounded(self.config.store_timeout, self.accounts.get(caller.account_id))
            .await?
            .map(|_| ())
            .ok_or(BankError::NotFound(Entity::Account))
    }

    async fn by_user(&self, caller: &Caller) -> Result<Vec<Loan>> {
        bounded(self.config.store_timeout, self.loans.by_user(caller.account_id)).await
    }
}
