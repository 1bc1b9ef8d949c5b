//! cyclex-queue
//!
//! Read-only query layer over the cycle ledger: queue positions, cycle
//! balances per frequency, license and frequency history, plus payout
//! estimates for queued entries. All state changes go through
//! cyclex-state's StateEngine.

pub mod query;
pub mod schedule;

pub use query::{CycleAgreement, CycleQuery, SupplyAudit};
pub use schedule::{estimate_payouts, PayoutEstimate};
