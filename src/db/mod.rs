// Database module - SQLite connection, ledger reads, snapshot persistence

pub mod models;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

use crate::utils::YearMonth;
pub use models::{
    Investment, InvestmentStatus, InvestmentType, NetWorthSnapshot, PricePoint, Snapshot,
    Transaction, TransactionKind,
};

/// Get the default database path (~/.nestegg/data.db)
pub fn get_default_db_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let nestegg_dir = PathBuf::from(home).join(".nestegg");

    std::fs::create_dir_all(&nestegg_dir).context("Failed to create .nestegg directory")?;

    Ok(nestegg_dir.join("data.db"))
}

/// Open database connection
pub fn open_db(db_path: Option<PathBuf>) -> Result<Connection> {
    let path = db_path.unwrap_or(get_default_db_path()?);
    let conn = Connection::open(&path).context(format!("Failed to open database at {:?}", path))?;

    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("Failed to enable foreign keys")?;

    Ok(conn)
}

/// Initialize the database with schema
pub fn init_database(db_path: Option<PathBuf>) -> Result<()> {
    let path = db_path.unwrap_or(get_default_db_path()?);

    info!("Initializing database at: {:?}", path);

    let conn = open_db(Some(path))?;

    let schema_sql = include_str!("schema.sql");
    conn.execute_batch(schema_sql)
        .context("Failed to execute schema")?;

    info!("Database initialized successfully");
    Ok(())
}

/// Insert or get user, returns user_id
pub fn upsert_user(conn: &Connection, name: &str) -> Result<i64> {
    let mut stmt = conn.prepare("SELECT id FROM users WHERE name = ?1")?;
    let existing: Option<i64> = stmt.query_row([name], |row| row.get(0)).optional()?;

    if let Some(id) = existing {
        return Ok(id);
    }

    conn.execute("INSERT INTO users (name) VALUES (?1)", params![name])?;
    Ok(conn.last_insert_rowid())
}

/// Look up a user id by name
pub fn get_user_id(conn: &Connection, name: &str) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM users WHERE name = ?1")?;
    let id: Option<i64> = stmt.query_row([name], |row| row.get(0)).optional()?;
    Ok(id)
}

/// Insert investment, returns investment_id
pub fn insert_investment(conn: &Connection, inv: &Investment) -> Result<i64> {
    conn.execute(
        "INSERT INTO investments (
            user_id, name, investment_type, open_date, close_date,
            interest_rate, appreciation_rate, maturity_date, symbol, status, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            inv.user_id,
            inv.name,
            inv.investment_type.as_str(),
            inv.open_date,
            inv.close_date,
            inv.interest_rate.as_ref().map(|d| d.to_string()),
            inv.appreciation_rate.as_ref().map(|d| d.to_string()),
            inv.maturity_date,
            inv.symbol,
            inv.status.as_str(),
            inv.created_at,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

fn investment_from_row(row: &Row) -> rusqlite::Result<Investment> {
    Ok(Investment {
        id: Some(row.get(0)?),
        user_id: row.get(1)?,
        name: row.get(2)?,
        investment_type: InvestmentType::from_str(&row.get::<_, String>(3)?).map_err(|_| {
            rusqlite::Error::InvalidColumnType(3, "investment_type".into(), rusqlite::types::Type::Text)
        })?,
        open_date: row.get(4)?,
        close_date: row.get(5)?,
        interest_rate: get_optional_decimal(row, 6)?,
        appreciation_rate: get_optional_decimal(row, 7)?,
        maturity_date: row.get(8)?,
        symbol: row.get(9)?,
        status: InvestmentStatus::from_str(&row.get::<_, String>(10)?).map_err(|_| {
            rusqlite::Error::InvalidColumnType(10, "status".into(), rusqlite::types::Type::Text)
        })?,
        created_at: row.get(11)?,
    })
}

const INVESTMENT_COLUMNS: &str = "id, user_id, name, investment_type, open_date, close_date, \
     interest_rate, appreciation_rate, maturity_date, symbol, status, created_at";

/// All investments owned by a user
pub fn get_user_investments(conn: &Connection, user_id: i64) -> Result<Vec<Investment>> {
    let sql = format!(
        "SELECT {} FROM investments WHERE user_id = ?1 ORDER BY id ASC",
        INVESTMENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let investments = stmt
        .query_map([user_id], investment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(investments)
}

/// Investments of one type owned by a user
pub fn get_user_investments_by_type(
    conn: &Connection,
    user_id: i64,
    investment_type: InvestmentType,
) -> Result<Vec<Investment>> {
    let sql = format!(
        "SELECT {} FROM investments WHERE user_id = ?1 AND investment_type = ?2 ORDER BY id ASC",
        INVESTMENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let investments = stmt
        .query_map(params![user_id, investment_type.as_str()], investment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(investments)
}

/// Insert transaction into the ledger
pub fn insert_transaction(conn: &Connection, tx: &Transaction) -> Result<i64> {
    conn.execute(
        "INSERT INTO transactions (
            investment_id, kind, txn_date, amount_minor, units,
            unit_price_minor, notes, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            tx.investment_id,
            tx.kind.as_str(),
            tx.txn_date,
            tx.amount_minor,
            tx.units.as_ref().map(|d| d.to_string()),
            tx.unit_price_minor,
            tx.notes,
            tx.created_at,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

fn transaction_from_row(row: &Row) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: Some(row.get(0)?),
        investment_id: row.get(1)?,
        kind: TransactionKind::from_str(&row.get::<_, String>(2)?).map_err(|_| {
            rusqlite::Error::InvalidColumnType(2, "kind".into(), rusqlite::types::Type::Text)
        })?,
        txn_date: row.get(3)?,
        amount_minor: row.get(4)?,
        units: get_optional_decimal(row, 5)?,
        unit_price_minor: row.get(6)?,
        notes: row.get(7)?,
        created_at: row.get(8)?,
    })
}

const TRANSACTION_COLUMNS: &str =
    "id, investment_id, kind, txn_date, amount_minor, units, unit_price_minor, notes, created_at";

/// All transactions for an investment up to and including a date,
/// in ledger order (date then insertion order).
pub fn get_investment_transactions(
    conn: &Connection,
    investment_id: i64,
    up_to: Option<NaiveDate>,
) -> Result<Vec<Transaction>> {
    let transactions = match up_to {
        Some(date) => {
            let sql = format!(
                "SELECT {} FROM transactions
                 WHERE investment_id = ?1 AND txn_date <= ?2
                 ORDER BY txn_date ASC, id ASC",
                TRANSACTION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![investment_id, date], transaction_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let sql = format!(
                "SELECT {} FROM transactions
                 WHERE investment_id = ?1
                 ORDER BY txn_date ASC, id ASC",
                TRANSACTION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![investment_id], transaction_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };

    Ok(transactions)
}

/// Earliest transaction date across all of a user's investments.
/// Drives the backfill month range.
pub fn earliest_transaction_date(conn: &Connection, user_id: i64) -> Result<Option<NaiveDate>> {
    let mut stmt = conn.prepare(
        "SELECT MIN(t.txn_date) FROM transactions t
         JOIN investments i ON i.id = t.investment_id
         WHERE i.user_id = ?1",
    )?;
    let date: Option<NaiveDate> = stmt.query_row([user_id], |row| row.get(0))?;
    Ok(date)
}

/// Upsert one monthly snapshot row. INSERT OR REPLACE keyed on the unique
/// (user, investment, year, month) index makes recomputation idempotent.
pub fn upsert_snapshot(conn: &Connection, snapshot: &Snapshot) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO snapshots (user_id, investment_id, year, month, value_minor)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            snapshot.user_id,
            snapshot.investment_id,
            snapshot.year,
            snapshot.month,
            snapshot.value_minor,
        ],
    )?;
    Ok(())
}

/// All snapshot rows for a user-month
pub fn get_month_snapshots(
    conn: &Connection,
    user_id: i64,
    month: YearMonth,
) -> Result<Vec<Snapshot>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, investment_id, year, month, value_minor
         FROM snapshots
         WHERE user_id = ?1 AND year = ?2 AND month = ?3
         ORDER BY investment_id ASC",
    )?;
    let snapshots = stmt
        .query_map(params![user_id, month.year, month.month], |row| {
            Ok(Snapshot {
                id: Some(row.get(0)?),
                user_id: row.get(1)?,
                investment_id: row.get(2)?,
                year: row.get(3)?,
                month: row.get(4)?,
                value_minor: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(snapshots)
}

/// Upsert the aggregated net worth row for a user-month
pub fn upsert_net_worth_snapshot(conn: &Connection, nws: &NetWorthSnapshot) -> Result<()> {
    let breakdown_json = serde_json::to_string(
        &nws.breakdown
            .iter()
            .map(|(t, v)| (t.as_str().to_string(), *v))
            .collect::<HashMap<String, i64>>(),
    )
    .context("Failed to serialize net worth breakdown")?;

    conn.execute(
        "INSERT OR REPLACE INTO net_worth_snapshots (user_id, year, month, total_minor, breakdown_json)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![nws.user_id, nws.year, nws.month, nws.total_minor, breakdown_json],
    )?;
    Ok(())
}

fn parse_breakdown(json: &str) -> Result<HashMap<InvestmentType, i64>> {
    let raw: HashMap<String, i64> =
        serde_json::from_str(json).context("Failed to parse net worth breakdown")?;
    let mut breakdown = HashMap::new();
    for (key, value) in raw {
        let investment_type = key
            .parse::<InvestmentType>()
            .map_err(|_| anyhow::anyhow!("Unknown investment type '{}' in breakdown", key))?;
        breakdown.insert(investment_type, value);
    }
    Ok(breakdown)
}

/// Net worth snapshot for a single user-month, if aggregated
pub fn get_net_worth_snapshot(
    conn: &Connection,
    user_id: i64,
    month: YearMonth,
) -> Result<Option<NetWorthSnapshot>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, year, month, total_minor, breakdown_json
         FROM net_worth_snapshots
         WHERE user_id = ?1 AND year = ?2 AND month = ?3",
    )?;
    let row: Option<(i64, i64, i32, u32, i64, String)> = stmt
        .query_row(params![user_id, month.year, month.month], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        })
        .optional()?;

    match row {
        Some((id, user_id, year, month, total_minor, json)) => Ok(Some(NetWorthSnapshot {
            id: Some(id),
            user_id,
            year,
            month,
            total_minor,
            breakdown: parse_breakdown(&json)?,
        })),
        None => Ok(None),
    }
}

/// Full net worth history for a user, oldest month first
pub fn get_net_worth_history(conn: &Connection, user_id: i64) -> Result<Vec<NetWorthSnapshot>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, year, month, total_minor, breakdown_json
         FROM net_worth_snapshots
         WHERE user_id = ?1
         ORDER BY year ASC, month ASC",
    )?;
    let rows = stmt
        .query_map([user_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i32>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut history = Vec::with_capacity(rows.len());
    for (id, user_id, year, month, total_minor, json) in rows {
        history.push(NetWorthSnapshot {
            id: Some(id),
            user_id,
            year,
            month,
            total_minor,
            breakdown: parse_breakdown(&json)?,
        });
    }
    Ok(history)
}

/// Delete all snapshot and net worth rows. Irreversible; the ledger is
/// untouched and a backfill rebuilds everything.
pub fn clear_snapshots(conn: &Connection) -> Result<(u64, u64)> {
    let snapshots = conn.execute("DELETE FROM snapshots", [])? as u64;
    let net_worth = conn.execute("DELETE FROM net_worth_snapshots", [])? as u64;
    info!(snapshots, net_worth, "Cleared snapshot tables");
    Ok((snapshots, net_worth))
}

/// Record a spot price (stand-in for the external pricing collaborator)
pub fn set_price(conn: &Connection, price: &PricePoint) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO prices (symbol, price_date, price_minor)
         VALUES (?1, ?2, ?3)",
        params![price.symbol, price.price_date, price.price_minor],
    )?;
    Ok(())
}

/// Most recent price for a symbol on or before a date
pub fn get_price_on_or_before(
    conn: &Connection,
    symbol: &str,
    as_of: NaiveDate,
) -> Result<Option<i64>> {
    let mut stmt = conn.prepare(
        "SELECT price_minor FROM prices
         WHERE symbol = ?1 AND price_date <= ?2
         ORDER BY price_date DESC
         LIMIT 1",
    )?;
    let price: Option<i64> = stmt
        .query_row(params![symbol, as_of], |row| row.get(0))
        .optional()?;
    Ok(price)
}

/// Helper to read an optional Decimal stored as TEXT
fn get_optional_decimal(row: &Row, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        Some(s) => Decimal::from_str(&s)
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )),
        None => Ok(None),
    }
}
