use crate::domain::amortization::RepaymentPolicy;
use rust_decimal::Decimal;
use std::time::Duration;

/// Tunables shared by the engines.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Upper bound on every single store call.
    pub store_timeout: Duration,
    /// Attempts for a conditional write before `StoreConflict` is surfaced.
    pub max_attempts: u32,
    /// Attempts for the compensating credit of a failed transfer.
    pub max_compensation_attempts: u32,
    /// Policy bound to new loans and used at approval.
    pub approval_policy: RepaymentPolicy,
    /// Policy used for application-time estimates.
    pub estimate_policy: RepaymentPolicy,
    /// Rate for personalized loans approved without one. `None` requires the
    /// administrator to supply it.
    pub custom_loan_rate: Option<Decimal>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
            max_attempts: 5,
            max_compensation_attempts: 10,
            approval_policy: RepaymentPolicy::Flat,
            estimate_policy: RepaymentPolicy::ReducingBalance,
            custom_loan_rate: None,
        }
    }
}
