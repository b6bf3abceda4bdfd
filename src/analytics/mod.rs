//! Analytics over the raw ledger: XIRR per investment type and capital
//! gains per fiscal period. Both read transactions directly, bypassing the
//! monthly snapshots.

pub mod gains;
pub mod xirr;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use tracing::info;

use crate::db::{self, InvestmentType, Transaction};
use crate::error::EngineError;
use crate::valuation::{self, DbPriceSource};

pub use gains::{GainsSummary, InvestmentLedger, LotMatcher, RealizedSale, TaxLot, Term};
pub use xirr::CashFlow;

/// Turn one investment's ledger into dated cash flows from the household's
/// point of view: money invested is negative, money returned positive.
/// Unit adjustments (split/bonus) carry no cash and are skipped.
pub fn extract_cash_flows(transactions: &[Transaction]) -> Vec<CashFlow> {
    transactions
        .iter()
        .filter_map(|tx| {
            let amount = tx.amount_minor.abs();
            if tx.kind.is_outflow() {
                Some(CashFlow {
                    date: tx.txn_date,
                    amount_minor: -amount,
                })
            } else if tx.kind.is_inflow() {
                Some(CashFlow {
                    date: tx.txn_date,
                    amount_minor: amount,
                })
            } else {
                None
            }
        })
        .collect()
}

/// Annualized return across all of a user's investments of one type.
///
/// Open positions contribute a terminal synthetic inflow equal to their
/// valuation today; without it a buy-and-hold portfolio would never have an
/// inflow and the rate would always be undefined.
pub fn calculate_type_xirr(
    conn: &Connection,
    user_id: i64,
    investment_type: InvestmentType,
) -> Result<f64> {
    let today = Local::now().date_naive();
    calculate_type_xirr_as_of(conn, user_id, investment_type, today)
}

pub fn calculate_type_xirr_as_of(
    conn: &Connection,
    user_id: i64,
    investment_type: InvestmentType,
    as_of: NaiveDate,
) -> Result<f64> {
    let investments = db::get_user_investments_by_type(conn, user_id, investment_type)?;
    if investments.is_empty() {
        return Err(EngineError::Validation(format!(
            "no {} investments for user {}",
            investment_type.as_str(),
            user_id
        ))
        .into());
    }

    let prices = DbPriceSource::new(conn);
    let mut flows = Vec::new();

    for investment in &investments {
        let Some(investment_id) = investment.id else {
            continue;
        };
        let transactions = db::get_investment_transactions(conn, investment_id, Some(as_of))?;
        flows.extend(extract_cash_flows(&transactions));

        let current_value = valuation::value_at(investment, &transactions, as_of, &prices);
        if current_value > 0 {
            flows.push(CashFlow {
                date: as_of,
                amount_minor: current_value,
            });
        }
    }

    flows.sort_by_key(|cf| cf.date);

    let rate = xirr::xirr(&flows).map_err(EngineError::Xirr)?;
    info!(
        user_id,
        investment_type = investment_type.as_str(),
        rate,
        "Computed type XIRR"
    );
    Ok(rate)
}

/// Realized capital gains for a user across a fiscal period.
pub fn calculate_capital_gains(
    conn: &Connection,
    user_id: i64,
    fy_start: NaiveDate,
    fy_end: NaiveDate,
) -> Result<GainsSummary> {
    if fy_start > fy_end {
        return Err(EngineError::Validation(format!(
            "fiscal period start {} is after end {}",
            fy_start, fy_end
        ))
        .into());
    }

    let investments = db::get_user_investments(conn, user_id)?;
    let mut ledgers_data = Vec::new();
    for investment in &investments {
        if !investment.investment_type.is_unit_based() {
            continue;
        }
        let Some(investment_id) = investment.id else {
            continue;
        };
        let transactions = db::get_investment_transactions(conn, investment_id, Some(fy_end))?;
        ledgers_data.push((investment_id, investment.investment_type, transactions));
    }

    let ledgers: Vec<InvestmentLedger> = ledgers_data
        .iter()
        .map(|(id, investment_type, transactions)| InvestmentLedger {
            investment_id: *id,
            investment_type: *investment_type,
            transactions,
        })
        .collect();

    let summary = gains::calculate_gains(&ledgers, fy_start, fy_end).map_err(EngineError::Gains)?;
    info!(
        user_id,
        short_term = summary.short_term.gain_minor,
        long_term = summary.long_term.gain_minor,
        sales = summary.sales.len(),
        "Computed capital gains"
    );
    Ok(summary)
}
