//! Error handling for the valuation engine
//!
//! Domain computation failures (XIRR that cannot converge, overselling in
//! gains matching) are expected outcomes of valid-but-degenerate input and
//! get their own typed errors. Infrastructure failures propagate through
//! anyhow with context chaining.

use thiserror::Error;

/// Failures of the XIRR solver. Never folded into a default rate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum XirrError {
    #[error("undefined rate: need at least one inflow and one outflow")]
    Undefined,

    #[error("no convergent rate within solver bounds")]
    NoConvergence,
}

/// Failures of the capital gains engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GainsError {
    #[error(
        "oversell on {sell_date}: selling {requested} units of investment {investment_id} but only {available} held in open lots"
    )]
    Oversell {
        investment_id: i64,
        sell_date: chrono::NaiveDate,
        requested: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    },
}

/// Top-level error taxonomy for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("xirr failure: {0}")]
    Xirr(#[from] XirrError),

    #[error("capital gains failure: {0}")]
    Gains(#[from] GainsError),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// Result type alias for engine operations
pub type Result<T> = anyhow::Result<T>;
