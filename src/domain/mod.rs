//! Domain layer: typed records, pure business rules, and the storage ports the
//! application layer depends on.

pub mod account;
pub mod amortization;
pub mod identity;
pub mod loan;
pub mod money;
pub mod ports;
pub mod scheme;
pub mod transaction;

use chrono::{DateTime, SubsecRound, Utc};

pub type Timestamp = DateTime<Utc>;

/// Current time at whole-second precision, the resolution exchanged with callers.
pub fn now() -> Timestamp {
    Utc::now().trunc_subsecs(0)
}
