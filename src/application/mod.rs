//! Application layer containing the core business logic orchestration.
//!
//! Each engine is constructed with the store handles it needs and an
//! [`EngineConfig`](crate::config::EngineConfig). [`Bank`] wires all of them over
//! one shared set of stores.

pub mod accounts;
pub mod loans;
pub mod money;
mod retry;
pub mod schemes;

use crate::config::EngineConfig;
use crate::domain::ports::Stores;
use accounts::AccountRegistry;
use loans::LoanLifecycleEngine;
use money::MoneyMovementEngine;
use schemes::SchemeRegistry;

/// All engines over one set of injected stores.
///
/// The stores live as long as the `Bank`; dropping it releases them.
pub struct Bank {
    pub accounts: AccountRegistry,
    pub money: MoneyMovementEngine,
    pub loans: LoanLifecycleEngine,
    pub schemes: SchemeRegistry,
}

impl Bank {
    pub fn new(stores: Stores, config: EngineConfig) -> Self {
        Self {
            accounts: AccountRegistry::new(
                stores.accounts.clone(),
                stores.transactions.clone(),
                config.clone(),
            ),
            money: MoneyMovementEngine::new(
                stores.accounts.clone(),
                stores.transactions.clone(),
                config.clone(),
            ),
            loans: LoanLifecycleEngine::new(
                stores.accounts,
                stores.loans,
                stores.schemes.clone(),
                config.clone(),
            ),
            schemes: SchemeRegistry::new(stores.schemes, config),
        }
    }
}
