//! Monthly snapshots and net worth aggregation
//!
//! The Snapshot Builder values every open investment of a user as of the
//! last day of a month and upserts one row per investment. The aggregator
//! then folds those rows into a single net worth figure with a per-type
//! breakdown. The two are chained by callers, never auto-triggered.

pub mod backfill;

use anyhow::Result;
use rusqlite::Connection;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::db::{self, Investment, NetWorthSnapshot, Snapshot};
use crate::utils::YearMonth;
use crate::valuation::{self, DbPriceSource};

/// True when the investment existed during the month: opened on or before
/// month-end and not closed before month-start.
fn open_during(investment: &Investment, month: YearMonth) -> bool {
    if investment.open_date > month.last_day() {
        return false;
    }
    match investment.close_date {
        Some(closed) => closed >= month.first_day(),
        None => true,
    }
}

/// Build (or rebuild) snapshots for every investment of `user_id` open
/// during `month`. Returns the number of investments processed.
///
/// Idempotent: each upsert replaces the prior row for the same key, so
/// re-running after a backdated ledger correction simply overwrites.
pub fn build_snapshots(conn: &Connection, user_id: i64, month: YearMonth) -> Result<usize> {
    let as_of = month.last_day();
    let prices = DbPriceSource::new(conn);
    let investments = db::get_user_investments(conn, user_id)?;

    let mut count = 0;
    for investment in &investments {
        if !open_during(investment, month) {
            continue;
        }
        let Some(investment_id) = investment.id else {
            continue;
        };
        let transactions = db::get_investment_transactions(conn, investment_id, Some(as_of))?;
        let value = valuation::value_at(investment, &transactions, as_of, &prices);
        // The calculator reports liabilities positive; stored rows carry the
        // sign so a month's net worth is the plain sum of its rows.
        let value_minor = if investment.investment_type.is_liability() {
            -value
        } else {
            value
        };

        db::upsert_snapshot(
            conn,
            &Snapshot {
                id: None,
                user_id,
                investment_id,
                year: month.year,
                month: month.month,
                value_minor,
            },
        )?;
        debug!(investment_id, %month, value_minor, "Snapshot upserted");
        count += 1;
    }

    info!(user_id, %month, count, "Built snapshots");
    Ok(count)
}

/// Fold one month's snapshot rows into a NetWorthSnapshot and persist it.
///
/// Liability rows are stored negated by the builder, so the total is the
/// plain sum of the month's rows and the breakdown carries the same signs.
pub fn aggregate_net_worth(
    conn: &Connection,
    user_id: i64,
    month: YearMonth,
) -> Result<NetWorthSnapshot> {
    let snapshots = db::get_month_snapshots(conn, user_id, month)?;

    let investments = db::get_user_investments(conn, user_id)?;
    let type_by_id: HashMap<i64, _> = investments
        .iter()
        .filter_map(|inv| inv.id.map(|id| (id, inv.investment_type)))
        .collect();

    let mut breakdown = HashMap::new();
    let mut total: i64 = 0;
    for snapshot in &snapshots {
        let investment_type = match type_by_id.get(&snapshot.investment_id) {
            Some(t) => *t,
            None => continue, // investment deleted since the snapshot was taken
        };
        *breakdown.entry(investment_type).or_insert(0) += snapshot.value_minor;
        total += snapshot.value_minor;
    }

    let nws = NetWorthSnapshot {
        id: None,
        user_id,
        year: month.year,
        month: month.month,
        total_minor: total,
        breakdown,
    };
    db::upsert_net_worth_snapshot(conn, &nws)?;

    info!(user_id, %month, total_minor = total, "Aggregated net worth");
    Ok(nws)
}

/// Ordered net worth history for a user, oldest first.
pub fn net_worth_history(conn: &Connection, user_id: i64) -> Result<Vec<NetWorthSnapshot>> {
    db::get_net_worth_history(conn, user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    use crate::db::{InvestmentStatus, InvestmentType, Transaction, TransactionKind};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(include_str!("../db/schema.sql")).unwrap();
        conn
    }

    fn insert_investment(
        conn: &Connection,
        user_id: i64,
        investment_type: InvestmentType,
        open_date: NaiveDate,
        close_date: Option<NaiveDate>,
    ) -> i64 {
        db::insert_investment(
            conn,
            &crate::db::Investment {
                id: None,
                user_id,
                name: format!("{:?}", investment_type),
                investment_type,
                open_date,
                close_date,
                interest_rate: None,
                appreciation_rate: None,
                maturity_date: None,
                symbol: None,
                status: if close_date.is_some() {
                    InvestmentStatus::Closed
                } else {
                    InvestmentStatus::Active
                },
                created_at: Utc::now(),
            },
        )
        .unwrap()
    }

    fn deposit(conn: &Connection, investment_id: i64, date_: NaiveDate, amount: i64) {
        db::insert_transaction(
            conn,
            &Transaction {
                id: None,
                investment_id,
                kind: TransactionKind::Deposit,
                txn_date: date_,
                amount_minor: amount,
                units: None,
                unit_price_minor: None,
                notes: None,
                created_at: Utc::now(),
            },
        )
        .unwrap();
    }

    #[test]
    fn test_build_snapshots_skips_unopened_and_closed() {
        let conn = test_conn();
        let user_id = db::upsert_user(&conn, "alice").unwrap();

        let open = insert_investment(
            &conn,
            user_id,
            InvestmentType::SavingsAccount,
            date(2024, 1, 1),
            None,
        );
        deposit(&conn, open, date(2024, 1, 5), 10_000);

        // Opens after the target month
        insert_investment(
            &conn,
            user_id,
            InvestmentType::SavingsAccount,
            date(2024, 6, 1),
            None,
        );
        // Closed before the target month
        insert_investment(
            &conn,
            user_id,
            InvestmentType::SavingsAccount,
            date(2023, 1, 1),
            Some(date(2024, 2, 15)),
        );

        let month = YearMonth::new(2024, 3).unwrap();
        let count = build_snapshots(&conn, user_id, month).unwrap();
        assert_eq!(count, 1);

        let rows = db::get_month_snapshots(&conn, user_id, month).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].investment_id, open);
        assert_eq!(rows[0].value_minor, 10_000);
    }

    #[test]
    fn test_build_snapshots_is_idempotent() {
        let conn = test_conn();
        let user_id = db::upsert_user(&conn, "alice").unwrap();
        let inv = insert_investment(
            &conn,
            user_id,
            InvestmentType::SavingsAccount,
            date(2024, 1, 1),
            None,
        );
        deposit(&conn, inv, date(2024, 1, 5), 50_000);

        let month = YearMonth::new(2024, 2).unwrap();
        build_snapshots(&conn, user_id, month).unwrap();
        let first = db::get_month_snapshots(&conn, user_id, month).unwrap();

        build_snapshots(&conn, user_id, month).unwrap();
        let second = db::get_month_snapshots(&conn, user_id, month).unwrap();

        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].value_minor, second[0].value_minor);
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_backdated_correction_overwrites_on_rebuild() {
        let conn = test_conn();
        let user_id = db::upsert_user(&conn, "alice").unwrap();
        let inv = insert_investment(
            &conn,
            user_id,
            InvestmentType::SavingsAccount,
            date(2024, 1, 1),
            None,
        );
        deposit(&conn, inv, date(2024, 1, 5), 50_000);

        let month = YearMonth::new(2024, 2).unwrap();
        build_snapshots(&conn, user_id, month).unwrap();

        // Backdated deposit lands inside an already-snapshotted month
        deposit(&conn, inv, date(2024, 1, 20), 25_000);
        build_snapshots(&conn, user_id, month).unwrap();

        let rows = db::get_month_snapshots(&conn, user_id, month).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value_minor, 75_000);
    }

    #[test]
    fn test_aggregate_total_matches_snapshot_sum() {
        let conn = test_conn();
        let user_id = db::upsert_user(&conn, "alice").unwrap();

        let savings = insert_investment(
            &conn,
            user_id,
            InvestmentType::SavingsAccount,
            date(2024, 1, 1),
            None,
        );
        deposit(&conn, savings, date(2024, 1, 5), 80_000);
        let savings2 = insert_investment(
            &conn,
            user_id,
            InvestmentType::SavingsAccount,
            date(2024, 1, 1),
            None,
        );
        deposit(&conn, savings2, date(2024, 1, 6), 20_000);

        let month = YearMonth::new(2024, 1).unwrap();
        build_snapshots(&conn, user_id, month).unwrap();
        let nws = aggregate_net_worth(&conn, user_id, month).unwrap();

        let snapshot_sum: i64 = db::get_month_snapshots(&conn, user_id, month)
            .unwrap()
            .iter()
            .map(|s| s.value_minor)
            .sum();
        assert_eq!(nws.total_minor, snapshot_sum);
        assert_eq!(
            nws.breakdown.get(&InvestmentType::SavingsAccount),
            Some(&100_000)
        );

        // Persisted row matches the returned value
        let stored = db::get_net_worth_snapshot(&conn, user_id, month)
            .unwrap()
            .unwrap();
        assert_eq!(stored.total_minor, nws.total_minor);
    }

    #[test]
    fn test_liability_rows_are_signed_and_total_is_the_row_sum() {
        let conn = test_conn();
        let user_id = db::upsert_user(&conn, "alice").unwrap();

        let savings = insert_investment(
            &conn,
            user_id,
            InvestmentType::SavingsAccount,
            date(2024, 1, 1),
            None,
        );
        deposit(&conn, savings, date(2024, 1, 5), 100_000);

        let loan = insert_investment(&conn, user_id, InvestmentType::Loan, date(2024, 1, 1), None);
        deposit(&conn, loan, date(2024, 1, 10), 40_000);

        let month = YearMonth::new(2024, 1).unwrap();
        build_snapshots(&conn, user_id, month).unwrap();
        let nws = aggregate_net_worth(&conn, user_id, month).unwrap();

        assert_eq!(nws.total_minor, 60_000);
        // The outstanding balance is stored negated in both row and breakdown
        assert_eq!(nws.breakdown.get(&InvestmentType::Loan), Some(&-40_000));

        // Total always equals the plain sum of the month's snapshot rows
        let snapshot_sum: i64 = db::get_month_snapshots(&conn, user_id, month)
            .unwrap()
            .iter()
            .map(|s| s.value_minor)
            .sum();
        assert_eq!(nws.total_minor, snapshot_sum);
    }

    #[test]
    fn test_net_worth_history_is_ordered() {
        let conn = test_conn();
        let user_id = db::upsert_user(&conn, "alice").unwrap();
        let inv = insert_investment(
            &conn,
            user_id,
            InvestmentType::SavingsAccount,
            date(2023, 11, 1),
            None,
        );
        deposit(&conn, inv, date(2023, 11, 5), 10_000);
        deposit(&conn, inv, date(2024, 1, 10), 5_000);

        for month in [
            YearMonth::new(2023, 11).unwrap(),
            YearMonth::new(2023, 12).unwrap(),
            YearMonth::new(2024, 1).unwrap(),
        ] {
            build_snapshots(&conn, user_id, month).unwrap();
            aggregate_net_worth(&conn, user_id, month).unwrap();
        }

        let history = net_worth_history(&conn, user_id).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].total_minor, 10_000);
        assert_eq!(history[1].total_minor, 10_000);
        assert_eq!(history[2].total_minor, 15_000);
    }
}
