use super::retry::bounded;
use crate::config::EngineConfig;
use crate::domain::identity::Admin;
use crate::domain::money::Amount;
use crate::domain::ports::SchemeStoreRef;
use crate::domain::scheme::{LoanScheme, SchemeId, SchemeStatus};
use crate::error::{BankError, Entity, Result};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct NewScheme {
    pub name: String,
    pub interest_rate: Decimal,
    pub max_amount: Decimal,
    pub description: Option<String>,
}

/// Administrative CRUD over loan products.
pub struct SchemeRegistry {
    schemes: SchemeStoreRef,
    config: EngineConfig,
}

impl SchemeRegistry {
    pub fn new(schemes: SchemeStoreRef, config: EngineConfig) -> Self {
        Self { schemes, config }
    }

    pub async fn launch(&self, admin: &Admin, request: NewScheme) -> Result<LoanScheme> {
        let scheme = LoanScheme::launch(
            request.name,
            request.interest_rate,
            Amount::new(request.max_amount)?,
            request.description,
        )?;
        bounded(self.config.store_timeout, self.schemes.insert(scheme.clone())).await?;
        tracing::info!(scheme = %scheme.name, rate = %scheme.interest_rate, admin = %admin, "loan scheme launched");
        Ok(scheme)
    }

    pub async fn set_status(
        &self,
        admin: &Admin,
        id: SchemeId,
        status: SchemeStatus,
    ) -> Result<LoanScheme> {
        let scheme = bounded(self.config.store_timeout, self.schemes.update_status(id, status))
            .await?
            .ok_or(BankError::NotFound(Entity::Scheme))?;
        tracing::info!(scheme = %scheme.name, ?status, admin = %admin, "loan scheme status updated");
        Ok(scheme)
    }

    pub async fn find_by_name(&self, name: &str) -> Result<LoanScheme> {
        bounded(self.config.store_timeout, self.schemes.get_by_name(name))
            .await?
            .ok_or(BankError::NotFound(Entity::Scheme))
    }

    pub async fn list_all(&self) -> Result<Vec<LoanScheme>> {
        bounded(self.config.store_timeout, self.schemes.get_all()).await
    }

    /// Schemes customers may currently apply for.
    pub async fn list_active(&self) -> Result<Vec<LoanScheme>> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(LoanScheme::is_active)
            .collect())
    }
}
