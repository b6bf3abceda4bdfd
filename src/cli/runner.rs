//! Command dispatch for the nestegg CLI.

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::analytics;
use crate::db::{
    self, Investment, InvestmentStatus, InvestmentType, PricePoint, Transaction, TransactionKind,
};
use crate::snapshots::{self, backfill::BackfillCoordinator, backfill::JobStatus};
use crate::utils::{format_minor, round_minor, YearMonth};

use super::{
    BackfillCommands, Cli, Commands, InvestmentCommands, PriceCommands, SnapshotCommands,
    TransactionCommands, UserCommands,
};

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{}', expected YYYY-MM-DD", s))
}

/// Parse a major-unit amount like "1500.00" into minor units.
fn parse_amount_minor(s: &str) -> Result<i64> {
    let amount =
        Decimal::from_str(s).with_context(|| format!("invalid amount '{}'", s))?;
    Ok(round_minor(amount * Decimal::from(100)))
}

fn parse_investment_type(s: &str) -> Result<InvestmentType> {
    s.parse::<InvestmentType>()
        .map_err(|_| anyhow!("unknown investment type '{}'", s))
}

fn resolve_user(conn: &Connection, name: &str) -> Result<i64> {
    db::get_user_id(conn, name)?
        .ok_or_else(|| anyhow!("unknown user '{}'; add them with `nestegg users add`", name))
}

fn open(db_path: &Option<PathBuf>) -> Result<Connection> {
    db::open_db(db_path.clone())
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init => {
            db::init_database(cli.db_path.clone())?;
            println!("Database initialized");
            Ok(())
        }

        Commands::Users { action } => match action {
            UserCommands::Add { name } => {
                let conn = open(&cli.db_path)?;
                let id = db::upsert_user(&conn, &name)?;
                println!("User '{}' (id {})", name, id);
                Ok(())
            }
        },

        Commands::Investments { action } => match action {
            InvestmentCommands::Add {
                user,
                name,
                investment_type,
                open_date,
                rate,
                appreciation,
                maturity,
                symbol,
            } => {
                let conn = open(&cli.db_path)?;
                let user_id = resolve_user(&conn, &user)?;
                let investment = Investment {
                    id: None,
                    user_id,
                    name: name.clone(),
                    investment_type: parse_investment_type(&investment_type)?,
                    open_date: parse_date(&open_date)?,
                    close_date: None,
                    interest_rate: rate
                        .map(|r| Decimal::from_str(&r))
                        .transpose()
                        .context("invalid rate")?,
                    appreciation_rate: appreciation
                        .map(|r| Decimal::from_str(&r))
                        .transpose()
                        .context("invalid appreciation rate")?,
                    maturity_date: maturity.as_deref().map(parse_date).transpose()?,
                    symbol,
                    status: InvestmentStatus::Active,
                    created_at: Utc::now(),
                };
                let id = db::insert_investment(&conn, &investment)?;
                println!("Investment '{}' (id {})", name, id);
                Ok(())
            }
            InvestmentCommands::List { user } => {
                let conn = open(&cli.db_path)?;
                let user_id = resolve_user(&conn, &user)?;
                let investments = db::get_user_investments(&conn, user_id)?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&investments)?);
                } else {
                    for inv in &investments {
                        println!(
                            "{:>4}  {:<18} {:<24} opened {}",
                            inv.id.unwrap_or(0),
                            inv.investment_type.as_str(),
                            inv.name,
                            inv.open_date
                        );
                    }
                }
                Ok(())
            }
        },

        Commands::Transactions { action } => match action {
            TransactionCommands::Add {
                investment_id,
                kind,
                date,
                amount,
                units,
                unit_price,
            } => {
                let conn = open(&cli.db_path)?;
                let tx = Transaction {
                    id: None,
                    investment_id,
                    kind: kind
                        .parse::<TransactionKind>()
                        .map_err(|_| anyhow!("unknown transaction kind '{}'", kind))?,
                    txn_date: parse_date(&date)?,
                    amount_minor: parse_amount_minor(&amount)?,
                    units: units
                        .map(|u| Decimal::from_str(&u))
                        .transpose()
                        .context("invalid units")?,
                    unit_price_minor: unit_price.as_deref().map(parse_amount_minor).transpose()?,
                    notes: None,
                    created_at: Utc::now(),
                };
                let id = db::insert_transaction(&conn, &tx)?;
                println!("Transaction recorded (id {})", id);
                Ok(())
            }
        },

        Commands::Prices { action } => match action {
            PriceCommands::Set {
                symbol,
                date,
                price,
            } => {
                let conn = open(&cli.db_path)?;
                db::set_price(
                    &conn,
                    &PricePoint {
                        symbol: symbol.clone(),
                        price_date: parse_date(&date)?,
                        price_minor: parse_amount_minor(&price)?,
                    },
                )?;
                println!("Price recorded for {}", symbol);
                Ok(())
            }
        },

        Commands::Snapshots { action } => match action {
            SnapshotCommands::Calculate { user, month } => {
                let conn = open(&cli.db_path)?;
                let user_id = resolve_user(&conn, &user)?;
                let month = match month {
                    Some(m) => m
                        .parse::<YearMonth>()
                        .map_err(|e| anyhow!("invalid month: {}", e))?,
                    None => YearMonth::from_date(Local::now().date_naive()),
                };

                let count = snapshots::build_snapshots(&conn, user_id, month)?;
                let nws = snapshots::aggregate_net_worth(&conn, user_id, month)?;

                if cli.json {
                    println!(
                        "{}",
                        serde_json::json!({
                            "month": month.to_string(),
                            "snapshotsCalculated": count,
                            "totalMinor": nws.total_minor,
                        })
                    );
                } else {
                    println!(
                        "{}: {} snapshots, net worth {}",
                        month,
                        count,
                        format_minor(nws.total_minor)
                    );
                }
                Ok(())
            }
            SnapshotCommands::Networth { user } => {
                let conn = open(&cli.db_path)?;
                let user_id = resolve_user(&conn, &user)?;
                let history = snapshots::net_worth_history(&conn, user_id)?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&history)?);
                } else {
                    for point in &history {
                        println!(
                            "{:04}-{:02}  {}",
                            point.year,
                            point.month,
                            format_minor(point.total_minor)
                        );
                    }
                }
                Ok(())
            }
            SnapshotCommands::Clear => {
                let conn = open(&cli.db_path)?;
                let (snaps, nws) = db::clear_snapshots(&conn)?;
                println!("Deleted {} snapshots and {} net worth rows", snaps, nws);
                Ok(())
            }
        },

        Commands::Backfill { action } => match action {
            BackfillCommands::Run { user } => {
                let db_path = match &cli.db_path {
                    Some(p) => p.clone(),
                    None => db::get_default_db_path()?,
                };
                let user_id = {
                    let conn = db::open_db(Some(db_path.clone()))?;
                    resolve_user(&conn, &user)?
                };

                let coordinator = BackfillCoordinator::new(db_path);
                coordinator.start(user_id)?;

                // The job runs off the request path; here we poll the way an
                // HTTP caller would until it reaches a terminal state.
                loop {
                    let state = coordinator.status(user_id);
                    match state.status {
                        JobStatus::Completed => {
                            println!("Backfill completed: {} months", state.processed);
                            return Ok(());
                        }
                        JobStatus::Failed => {
                            return Err(anyhow!(
                                "backfill failed after {}/{} months: {}",
                                state.processed,
                                state.total,
                                state.error.unwrap_or_default()
                            ));
                        }
                        _ => {
                            if state.total > 0 {
                                println!("  {}/{} months", state.processed, state.total);
                            }
                            tokio::time::sleep(Duration::from_millis(200)).await;
                        }
                    }
                }
            }
        },

        Commands::Xirr {
            user,
            investment_type,
        } => {
            let conn = open(&cli.db_path)?;
            let user_id = resolve_user(&conn, &user)?;
            let investment_type = parse_investment_type(&investment_type)?;
            let rate = analytics::calculate_type_xirr(&conn, user_id, investment_type)?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "investmentType": investment_type.as_str(),
                        "xirr": rate,
                    })
                );
            } else {
                println!("{} XIRR: {:.2}%", investment_type.as_str(), rate * 100.0);
            }
            Ok(())
        }

        Commands::Gains {
            user,
            fy_start,
            fy_end,
        } => {
            let conn = open(&cli.db_path)?;
            let user_id = resolve_user(&conn, &user)?;
            let summary = analytics::calculate_capital_gains(
                &conn,
                user_id,
                parse_date(&fy_start)?,
                parse_date(&fy_end)?,
            )?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Short-term gain: {}", format_minor(summary.short_term.gain_minor));
                for (t, gain) in &summary.short_term.by_type {
                    println!("  {:<18} {}", t.as_str(), format_minor(*gain));
                }
                println!("Long-term gain:  {}", format_minor(summary.long_term.gain_minor));
                for (t, gain) in &summary.long_term.by_type {
                    println!("  {:<18} {}", t.as_str(), format_minor(*gain));
                }
            }
            Ok(())
        }
    }
}
