//! Point ledger with time-based decay
//!
//! Every punishment is appended to the ledger as a [`PointGrant`]. An actor's
//! standing is never stored: [`Ledger::current_total`] sums the grants still
//! inside the retention window each time it is asked.
//!
//! All read-modify-write sequences on one [`ActorKey`] (record, prune,
//! deduct, advisory increment) run under a per-key async lock, so concurrent
//! reports against the same actor are applied one after another.

mod service;
mod types;

pub use service::{GrantReceipt, Ledger, DEFAULT_RETENTION_DAYS};
pub use types::{
    ActorKey, AdvisoryWarning, GrantAdjustment, GrantFilter, PointGrant, WarningTally,
    ADVISORY_CONVERSION_REASON,
};
