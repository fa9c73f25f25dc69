use super::account::AccountId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An authenticated customer. How the identity was established is not the core's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Caller {
    pub account_id: AccountId,
}

impl Caller {
    pub fn new(account_id: AccountId) -> Self {
        Self { account_id }
    }
}

/// An authenticated administrator, recorded on loan decisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Admin {
    pub id: String,
}

impl Admin {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl fmt::Display for Admin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
