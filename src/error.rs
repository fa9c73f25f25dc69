use thiserror::Error;

/// The entity a lookup failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Account,
    Loan,
    Scheme,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entity::Account => f.write_str("account"),
            Entity::Loan => f.write_str("loan"),
            Entity::Scheme => f.write_str("loan scheme"),
        }
    }
}

#[derive(Error, Debug)]
pub enum BankError {
    #[error("amount must be positive")]
    InvalidAmount,
    #[error("insufficient balance")]
    InsufficientFunds,
    #[error("receiver account not found")]
    ReceiverNotFound,
    #[error("cannot transfer money to your own account")]
    SelfTransfer,
    #[error("{0} not found")]
    NotFound(Entity),
    #[error("account is blocked")]
    AccountBlocked,
    #[error("email already registered")]
    EmailTaken,
    #[error("loan scheme already exists")]
    SchemeExists,
    #[error("this loan scheme is not active")]
    SchemeInactive,
    #[error("requested amount exceeds scheme limit ({0})")]
    ExceedsMaxAmount(rust_decimal::Decimal),
    #[error("loan already approved")]
    AlreadyApproved,
    #[error("loan has been rejected previously")]
    AlreadyRejected,
    #[error("loan is no longer awaiting a decision")]
    NotPending,
    #[error("personalized loan needs an interest rate before approval")]
    TermsRequired,
    #[error("loan is not active for EMI payment")]
    NotActive,
    #[error("loan already paid off")]
    AlreadyPaidOff,
    #[error("access denied")]
    Forbidden,
    #[error("tenure must be at least one month")]
    InvalidTenure,
    #[error("interest rate must not be negative")]
    InvalidRate,
    #[error("concurrent update conflict")]
    StoreConflict,
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("transfer left unreconciled: {0}")]
    ReconciliationRequired(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("storage error: {0}")]
    Storage(#[from] rocksdb::Error),
    #[error("internal error: {0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl BankError {
    /// Stable status the presentation layer reports for this kind.
    pub fn status_code(&self) -> u16 {
        match self {
            BankError::Forbidden => 403,
            BankError::NotFound(_) | BankError::ReceiverNotFound => 404,
            BankError::StoreConflict => 409,
            BankError::StoreUnavailable(_) => 503,
            BankError::ReconciliationRequired(_)
            | BankError::Io(_)
            | BankError::Serialization(_)
            | BankError::Internal(_) => 500,
            #[cfg(feature = "storage-rocksdb")]
            BankError::Storage(_) => 500,
            _ => 400,
        }
    }

    /// Whether the engine may reload state and try the write again.
    pub fn is_conflict(&self) -> bool {
        matches!(self, BankError::StoreConflict)
    }
}

pub type Result<T> = std::result::Result<T, BankError>;
