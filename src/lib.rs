//! Nestegg - household investment valuation & analytics engine
//!
//! Turns raw investment and transaction records into point-in-time
//! valuations, monthly snapshots, aggregated net worth, XIRR figures and
//! capital gains summaries. Deterministic and idempotent: every snapshot is
//! a projection that recomputation simply overwrites.

pub mod analytics;
pub mod cli;
pub mod db;
pub mod error;
pub mod snapshots;
pub mod utils;
pub mod valuation;
