//! Durable copies of the planner state.
//!  - [snapshot] keeps the local state file every process works against.
//!  - [backup] is the exchange format used for manual backups and remote snapshots.

pub mod backup;
pub mod snapshot;
