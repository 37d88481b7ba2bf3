//! Subcommand implementations.

pub mod compare;
pub mod crosswalk;
pub mod extract;
pub mod fingerprint;
pub mod migrate;
pub mod reconcile;
