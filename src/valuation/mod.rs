//! Valuation Calculator
//!
//! Pure, side-effect-free valuation of one investment at a point in time.
//! Each investment type gets its own valuation rule, selected by an
//! exhaustive match so a new type cannot be added without a rule.
//!
//! Money stays in integer minor units at the boundary; compounding and
//! unit arithmetic run on Decimal and are rounded half-even exactly once.

use chrono::NaiveDate;
use rust_decimal::{Decimal, MathematicalOps};
use rusqlite::Connection;

use crate::db::{self, Investment, InvestmentType, Transaction, TransactionKind};
use crate::utils::round_minor;

const DAYS_PER_YEAR: i64 = 365;

/// Spot price lookup, supplied by the pricing collaborator.
/// Returns a per-unit price in minor units, or None when unavailable.
pub trait PriceSource {
    fn price_on_or_before(&self, symbol: &str, as_of: NaiveDate) -> Option<i64>;
}

/// Price source backed by the local prices table.
pub struct DbPriceSource<'a> {
    conn: &'a Connection,
}

impl<'a> DbPriceSource<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl PriceSource for DbPriceSource<'_> {
    fn price_on_or_before(&self, symbol: &str, as_of: NaiveDate) -> Option<i64> {
        db::get_price_on_or_before(self.conn, symbol, as_of)
            .ok()
            .flatten()
    }
}

/// Price source with no data; forces the cost-basis fallback.
pub struct NoPrices;

impl PriceSource for NoPrices {
    fn price_on_or_before(&self, _symbol: &str, _as_of: NaiveDate) -> Option<i64> {
        None
    }
}

/// Value of `investment` as of `as_of`, in minor units.
///
/// Transactions dated after `as_of` are ignored, so callers may pass the
/// full ledger slice. Never fails for a well-formed investment: missing
/// market data degrades to the most recent transaction price, then to the
/// remaining cost basis.
pub fn value_at(
    investment: &Investment,
    transactions: &[Transaction],
    as_of: NaiveDate,
    prices: &dyn PriceSource,
) -> i64 {
    let txns: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| t.txn_date <= as_of)
        .collect();

    match investment.investment_type {
        InvestmentType::FixedDeposit | InvestmentType::RecurringDeposit => {
            compounded_value(&txns, investment.interest_rate, as_of)
        }
        InvestmentType::EquityFund
        | InvestmentType::HybridFund
        | InvestmentType::DebtFund
        | InvestmentType::Shares
        | InvestmentType::Gold => unit_value(investment, &txns, as_of, prices),
        InvestmentType::Loan => loan_outstanding(&txns),
        InvestmentType::FixedAsset | InvestmentType::Pension => {
            match investment.appreciation_rate {
                Some(rate) => compounded_value(&txns, Some(rate), as_of),
                None => running_balance(&txns),
            }
        }
        InvestmentType::SavingsAccount | InvestmentType::ExpectedExpense => {
            running_balance(&txns)
        }
    }
}

/// Annual compounding factor for a holding period in days.
fn growth_factor(annual_rate_pct: Decimal, days: i64) -> Decimal {
    if days <= 0 {
        return Decimal::ONE;
    }
    let base = Decimal::ONE + annual_rate_pct / Decimal::from(100);
    let exponent = Decimal::from(days) / Decimal::from(DAYS_PER_YEAR);
    base.powd(exponent)
}

/// Deposit-style valuation: every contribution compounds independently from
/// its own date; withdrawals and maturity payouts compound symmetrically so
/// a full payout drives the value to zero. Clamped at zero.
fn compounded_value(
    transactions: &[&Transaction],
    annual_rate_pct: Option<Decimal>,
    as_of: NaiveDate,
) -> i64 {
    let rate = annual_rate_pct.unwrap_or(Decimal::ZERO);
    let mut value = Decimal::ZERO;

    for tx in transactions {
        let days = (as_of - tx.txn_date).num_days();
        let amount = Decimal::from(tx.amount_minor.abs());
        let grown = amount * growth_factor(rate, days);

        if tx.kind.is_outflow() {
            value += grown;
        } else if matches!(
            tx.kind,
            TransactionKind::Withdrawal | TransactionKind::Maturity
        ) {
            value -= grown;
        }
        // Interest/dividend postings are already captured by compounding.
    }

    round_minor(value.max(Decimal::ZERO))
}

/// Running unit position with remaining cost basis, at average cost.
struct UnitPosition {
    units: Decimal,
    cost_minor: Decimal,
    last_unit_price_minor: Option<i64>,
}

fn unit_position(transactions: &[&Transaction]) -> UnitPosition {
    let mut units = Decimal::ZERO;
    let mut cost = Decimal::ZERO;
    let mut last_price = None;

    for tx in transactions {
        let qty = tx.units.unwrap_or(Decimal::ZERO);
        match tx.kind {
            TransactionKind::Buy => {
                units += qty;
                cost += Decimal::from(tx.amount_minor.abs());
            }
            TransactionKind::Sell => {
                // Remove sold units at average cost; the remainder keeps its basis
                let avg = if units > Decimal::ZERO {
                    cost / units
                } else {
                    Decimal::ZERO
                };
                cost = (cost - avg * qty).max(Decimal::ZERO);
                units -= qty;
            }
            // Free units: quantity rises, basis is unchanged
            TransactionKind::Split | TransactionKind::Bonus => units += qty,
            _ => {}
        }
        if tx.unit_price_minor.is_some() {
            last_price = tx.unit_price_minor;
        }
    }

    UnitPosition {
        units,
        cost_minor: cost,
        last_unit_price_minor: last_price,
    }
}

/// Fund / share / commodity valuation: units held times price, with the
/// fallback chain price source -> last transaction price -> cost basis.
fn unit_value(
    investment: &Investment,
    transactions: &[&Transaction],
    as_of: NaiveDate,
    prices: &dyn PriceSource,
) -> i64 {
    let position = unit_position(transactions);
    if position.units <= Decimal::ZERO {
        return 0;
    }

    let spot = investment
        .symbol
        .as_deref()
        .and_then(|symbol| prices.price_on_or_before(symbol, as_of));

    match spot.or(position.last_unit_price_minor) {
        Some(price) => round_minor(position.units * Decimal::from(price)),
        None => round_minor(position.cost_minor),
    }
}

/// Outstanding loan balance: disbursements and capitalized interest minus
/// repayments, never negative. Reported positive; the snapshot builder
/// stores it negated.
fn loan_outstanding(transactions: &[&Transaction]) -> i64 {
    let mut outstanding: i64 = 0;

    for tx in transactions {
        let amount = tx.amount_minor.abs();
        match tx.kind {
            TransactionKind::Deposit | TransactionKind::Buy | TransactionKind::Interest => {
                outstanding += amount
            }
            TransactionKind::Withdrawal
            | TransactionKind::Contribution
            | TransactionKind::Premium
            | TransactionKind::Maturity => outstanding -= amount,
            _ => {}
        }
    }

    outstanding.max(0)
}

/// Literal running balance: credits in, debits out.
fn running_balance(transactions: &[&Transaction]) -> i64 {
    let mut balance: i64 = 0;

    for tx in transactions {
        let amount = tx.amount_minor.abs();
        if tx.kind.is_outflow()
            || matches!(
                tx.kind,
                TransactionKind::Interest | TransactionKind::Dividend
            )
        {
            balance += amount;
        } else if matches!(
            tx.kind,
            TransactionKind::Withdrawal | TransactionKind::Sell | TransactionKind::Maturity
        ) {
            balance -= amount;
        }
    }

    balance.max(0)
}
