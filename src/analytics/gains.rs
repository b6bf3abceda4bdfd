//! Capital Gains Engine
//!
//! Exact lot-based realized gains: buys open FIFO tax lots, sells consume
//! them oldest-first, and each matched portion is classified short- or
//! long-term against the investment type's holding threshold. Lots live only
//! for the duration of one calculation; they are never persisted.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

use crate::db::{InvestmentType, Transaction, TransactionKind};
use crate::error::GainsError;
use crate::utils::round_minor;

/// An open acquisition lot, consumed FIFO by sells.
#[derive(Debug, Clone)]
pub struct TaxLot {
    pub investment_id: i64,
    pub acquisition_date: NaiveDate,
    pub quantity: Decimal,
    pub remaining: Decimal,
    /// Cost per unit in minor units; zero for bonus/split lots.
    pub cost_per_unit_minor: Decimal,
}

/// Tax term of a matched portion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Term {
    Short,
    Long,
}

/// One consumed slice of a lot within a sale.
#[derive(Debug, Clone, Serialize)]
pub struct MatchedPortion {
    pub acquisition_date: NaiveDate,
    pub quantity: Decimal,
    pub cost_basis_minor: i64,
    pub proceeds_minor: i64,
    pub gain_minor: i64,
    pub term: Term,
}

/// A fully matched sale.
#[derive(Debug, Clone, Serialize)]
pub struct RealizedSale {
    pub investment_id: i64,
    pub investment_type: InvestmentType,
    pub sell_date: NaiveDate,
    pub quantity: Decimal,
    pub proceeds_minor: i64,
    pub cost_basis_minor: i64,
    pub gain_minor: i64,
    pub portions: Vec<MatchedPortion>,
}

/// Per-term accumulation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TermSummary {
    pub gain_minor: i64,
    pub by_type: HashMap<InvestmentType, i64>,
}

impl TermSummary {
    fn add(&mut self, investment_type: InvestmentType, gain_minor: i64) {
        self.gain_minor += gain_minor;
        *self.by_type.entry(investment_type).or_insert(0) += gain_minor;
    }
}

/// Realized gains for a fiscal period.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GainsSummary {
    pub short_term: TermSummary,
    pub long_term: TermSummary,
    pub sales: Vec<RealizedSale>,
}

/// FIFO lot queue for a single investment.
pub struct LotMatcher {
    investment_id: i64,
    investment_type: InvestmentType,
    lots: Vec<TaxLot>,
}

impl LotMatcher {
    pub fn new(investment_id: i64, investment_type: InvestmentType) -> Self {
        Self {
            investment_id,
            investment_type,
            lots: Vec::new(),
        }
    }

    /// Open a lot from a buy. Bonus and split units open zero-cost lots so
    /// later sells of those units match instead of overselling.
    pub fn add_acquisition(&mut self, tx: &Transaction) {
        let quantity = match tx.units {
            Some(q) if q > Decimal::ZERO => q,
            _ => return,
        };
        let cost_per_unit = match tx.kind {
            TransactionKind::Buy => Decimal::from(tx.amount_minor.abs()) / quantity,
            TransactionKind::Bonus | TransactionKind::Split => Decimal::ZERO,
            _ => return,
        };

        self.lots.push(TaxLot {
            investment_id: self.investment_id,
            acquisition_date: tx.txn_date,
            quantity,
            remaining: quantity,
            cost_per_unit_minor: cost_per_unit,
        });
    }

    pub fn available(&self) -> Decimal {
        self.lots.iter().map(|lot| lot.remaining).sum()
    }

    /// Consume lots oldest-first for a sell. A partially consumed lot keeps
    /// its remainder open with its original acquisition date. Selling more
    /// than is held is an oversell error, never clamped.
    pub fn match_sale(&mut self, tx: &Transaction) -> Result<RealizedSale, GainsError> {
        let quantity = tx.units.unwrap_or(Decimal::ZERO);
        let available = self.available();
        if quantity > available {
            return Err(GainsError::Oversell {
                investment_id: self.investment_id,
                sell_date: tx.txn_date,
                requested: quantity,
                available,
            });
        }

        let proceeds = Decimal::from(tx.amount_minor.abs());
        let threshold = self.investment_type.long_term_threshold_days();

        let mut to_consume = quantity;
        let mut portions = Vec::new();
        let mut total_basis = Decimal::ZERO;

        for lot in self.lots.iter_mut() {
            if to_consume <= Decimal::ZERO {
                break;
            }
            if lot.remaining <= Decimal::ZERO {
                continue;
            }

            let consumed = lot.remaining.min(to_consume);
            lot.remaining -= consumed;
            to_consume -= consumed;

            let basis = consumed * lot.cost_per_unit_minor;
            total_basis += basis;

            // Proceeds allocated to this portion by quantity share
            let portion_proceeds = if quantity > Decimal::ZERO {
                proceeds * consumed / quantity
            } else {
                Decimal::ZERO
            };

            let held_days = (tx.txn_date - lot.acquisition_date).num_days();
            let term = if held_days > threshold {
                Term::Long
            } else {
                Term::Short
            };

            let basis_minor = round_minor(basis);
            let proceeds_minor = round_minor(portion_proceeds);
            portions.push(MatchedPortion {
                acquisition_date: lot.acquisition_date,
                quantity: consumed,
                cost_basis_minor: basis_minor,
                proceeds_minor,
                gain_minor: proceeds_minor - basis_minor,
                term,
            });
        }

        self.lots.retain(|lot| lot.remaining > Decimal::ZERO);

        let cost_basis_minor = round_minor(total_basis);
        let proceeds_minor = round_minor(proceeds);
        Ok(RealizedSale {
            investment_id: self.investment_id,
            investment_type: self.investment_type,
            sell_date: tx.txn_date,
            quantity,
            proceeds_minor,
            cost_basis_minor,
            gain_minor: proceeds_minor - cost_basis_minor,
            portions,
        })
    }

    /// Remaining open lots, oldest first.
    pub fn open_lots(&self) -> &[TaxLot] {
        &self.lots
    }
}

/// One investment's ledger slice fed into a gains calculation.
pub struct InvestmentLedger<'a> {
    pub investment_id: i64,
    pub investment_type: InvestmentType,
    pub transactions: &'a [Transaction],
}

/// Realized gains across investments for [fy_start, fy_end].
///
/// Sells before the period still consume lots (they happened), but only
/// sells inside the period contribute to the summary. The whole calculation
/// aborts on the first oversell; no partial summary is produced.
pub fn calculate_gains(
    ledgers: &[InvestmentLedger],
    fy_start: NaiveDate,
    fy_end: NaiveDate,
) -> Result<GainsSummary, GainsError> {
    let mut summary = GainsSummary::default();

    for ledger in ledgers {
        let mut matcher = LotMatcher::new(ledger.investment_id, ledger.investment_type);

        for tx in ledger.transactions {
            match tx.kind {
                TransactionKind::Buy | TransactionKind::Bonus | TransactionKind::Split => {
                    matcher.add_acquisition(tx);
                }
                TransactionKind::Sell => {
                    if tx.txn_date > fy_end {
                        // Past the period; later sells cannot affect it
                        break;
                    }
                    let sale = matcher.match_sale(tx)?;
                    if tx.txn_date >= fy_start {
                        for portion in &sale.portions {
                            match portion.term {
                                Term::Short => summary
                                    .short_term
                                    .add(ledger.investment_type, portion.gain_minor),
                                Term::Long => summary
                                    .long_term
                                    .add(ledger.investment_type, portion.gain_minor),
                            }
                        }
                        summary.sales.push(sale);
                    }
                }
                _ => {}
            }
        }
    }

    summary.sales.sort_by_key(|sale| sale.sell_date);
    Ok(summary)
}
