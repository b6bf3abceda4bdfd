use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Investment types supported by the engine.
///
/// Valuation, XIRR cash-flow classification and gains term thresholds all
/// dispatch on this closed enumeration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum InvestmentType {
    FixedDeposit,     // Lump sum compounding at a stored rate
    RecurringDeposit, // Periodic contributions, each compounding independently
    EquityFund,
    HybridFund,
    DebtFund,
    Shares,
    Gold,            // Unit holdings priced off a spot source
    Loan,            // Outstanding balance, a liability
    FixedAsset,      // Property etc., cost basis with appreciation
    Pension,
    SavingsAccount,  // Literal running balance
    ExpectedExpense, // Earmarked future outflow, a liability
}

impl InvestmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvestmentType::FixedDeposit => "FIXED_DEPOSIT",
            InvestmentType::RecurringDeposit => "RECURRING_DEPOSIT",
            InvestmentType::EquityFund => "EQUITY_FUND",
            InvestmentType::HybridFund => "HYBRID_FUND",
            InvestmentType::DebtFund => "DEBT_FUND",
            InvestmentType::Shares => "SHARES",
            InvestmentType::Gold => "GOLD",
            InvestmentType::Loan => "LOAN",
            InvestmentType::FixedAsset => "FIXED_ASSET",
            InvestmentType::Pension => "PENSION",
            InvestmentType::SavingsAccount => "SAVINGS_ACCOUNT",
            InvestmentType::ExpectedExpense => "EXPECTED_EXPENSE",
        }
    }

    pub fn all() -> &'static [InvestmentType] {
        &[
            InvestmentType::FixedDeposit,
            InvestmentType::RecurringDeposit,
            InvestmentType::EquityFund,
            InvestmentType::HybridFund,
            InvestmentType::DebtFund,
            InvestmentType::Shares,
            InvestmentType::Gold,
            InvestmentType::Loan,
            InvestmentType::FixedAsset,
            InvestmentType::Pension,
            InvestmentType::SavingsAccount,
            InvestmentType::ExpectedExpense,
        ]
    }

    /// Types valued as units-held times price.
    pub fn is_unit_based(&self) -> bool {
        matches!(
            self,
            InvestmentType::EquityFund
                | InvestmentType::HybridFund
                | InvestmentType::DebtFund
                | InvestmentType::Shares
                | InvestmentType::Gold
        )
    }

    /// Types that reduce net worth rather than add to it.
    pub fn is_liability(&self) -> bool {
        matches!(
            self,
            InvestmentType::Loan | InvestmentType::ExpectedExpense
        )
    }

    /// Holding period above which a realized gain is long-term.
    /// Equity-oriented holdings use one year; everything else three.
    pub fn long_term_threshold_days(&self) -> i64 {
        match self {
            InvestmentType::EquityFund | InvestmentType::HybridFund | InvestmentType::Shares => 365,
            _ => 1095,
        }
    }
}

impl FromStr for InvestmentType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FIXED_DEPOSIT" | "FD" => Ok(InvestmentType::FixedDeposit),
            "RECURRING_DEPOSIT" | "RD" => Ok(InvestmentType::RecurringDeposit),
            "EQUITY_FUND" => Ok(InvestmentType::EquityFund),
            "HYBRID_FUND" => Ok(InvestmentType::HybridFund),
            "DEBT_FUND" => Ok(InvestmentType::DebtFund),
            "SHARES" | "STOCK" => Ok(InvestmentType::Shares),
            "GOLD" => Ok(InvestmentType::Gold),
            "LOAN" => Ok(InvestmentType::Loan),
            "FIXED_ASSET" | "PROPERTY" => Ok(InvestmentType::FixedAsset),
            "PENSION" => Ok(InvestmentType::Pension),
            "SAVINGS_ACCOUNT" | "SAVINGS" => Ok(InvestmentType::SavingsAccount),
            "EXPECTED_EXPENSE" => Ok(InvestmentType::ExpectedExpense),
            _ => Err(()),
        }
    }
}

/// Investment status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InvestmentStatus {
    Active,
    Closed,
}

impl InvestmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvestmentStatus::Active => "ACTIVE",
            InvestmentStatus::Closed => "CLOSED",
        }
    }
}

impl FromStr for InvestmentStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(InvestmentStatus::Active),
            "CLOSED" => Ok(InvestmentStatus::Closed),
            _ => Err(()),
        }
    }
}

/// An investment owned by one household member.
///
/// Immutable except through transactions; type-specific parameters live here
/// (rate, maturity, symbol) and are optional per type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Investment {
    pub id: Option<i64>,
    pub user_id: i64,
    pub name: String,
    pub investment_type: InvestmentType,
    pub open_date: NaiveDate,
    pub close_date: Option<NaiveDate>,
    /// Annual interest rate in percent, for deposit types.
    pub interest_rate: Option<Decimal>,
    /// Annual appreciation rate in percent, for fixed assets / pensions.
    pub appreciation_rate: Option<Decimal>,
    pub maturity_date: Option<NaiveDate>,
    /// Pricing symbol for unit-based types.
    pub symbol: Option<String>,
    pub status: InvestmentStatus,
    pub created_at: DateTime<Utc>,
}

/// Transaction kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionKind {
    Buy,
    Sell,
    Deposit,
    Withdrawal,
    Dividend,
    Interest,
    Contribution,
    Premium,
    Bonus,
    Split,
    Maturity,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Buy => "BUY",
            TransactionKind::Sell => "SELL",
            TransactionKind::Deposit => "DEPOSIT",
            TransactionKind::Withdrawal => "WITHDRAWAL",
            TransactionKind::Dividend => "DIVIDEND",
            TransactionKind::Interest => "INTEREST",
            TransactionKind::Contribution => "CONTRIBUTION",
            TransactionKind::Premium => "PREMIUM",
            TransactionKind::Bonus => "BONUS",
            TransactionKind::Split => "SPLIT",
            TransactionKind::Maturity => "MATURITY",
        }
    }

    /// Money leaving the household into the investment.
    pub fn is_outflow(&self) -> bool {
        matches!(
            self,
            TransactionKind::Buy
                | TransactionKind::Deposit
                | TransactionKind::Contribution
                | TransactionKind::Premium
        )
    }

    /// Money returning to the household from the investment.
    pub fn is_inflow(&self) -> bool {
        matches!(
            self,
            TransactionKind::Sell
                | TransactionKind::Withdrawal
                | TransactionKind::Dividend
                | TransactionKind::Interest
                | TransactionKind::Maturity
        )
    }
}

impl FromStr for TransactionKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(TransactionKind::Buy),
            "SELL" => Ok(TransactionKind::Sell),
            "DEPOSIT" => Ok(TransactionKind::Deposit),
            "WITHDRAWAL" => Ok(TransactionKind::Withdrawal),
            "DIVIDEND" => Ok(TransactionKind::Dividend),
            "INTEREST" => Ok(TransactionKind::Interest),
            "CONTRIBUTION" => Ok(TransactionKind::Contribution),
            "PREMIUM" => Ok(TransactionKind::Premium),
            "BONUS" => Ok(TransactionKind::Bonus),
            "SPLIT" => Ok(TransactionKind::Split),
            "MATURITY" => Ok(TransactionKind::Maturity),
            _ => Err(()),
        }
    }
}

/// A ledger transaction. Append-only; the engine never writes these outside
/// of the seeding CLI commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Option<i64>,
    pub investment_id: i64,
    pub kind: TransactionKind,
    pub txn_date: NaiveDate,
    /// Signed amount in minor currency units.
    pub amount_minor: i64,
    /// Unit count for quantity-bearing types.
    pub units: Option<Decimal>,
    /// Per-unit price in minor units, when known.
    pub unit_price_minor: Option<i64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Monthly valuation of one investment. Idempotent projection, unique per
/// (user, investment, year, month); recomputation overwrites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Option<i64>,
    pub user_id: i64,
    pub investment_id: i64,
    pub year: i32,
    pub month: u32,
    pub value_minor: i64,
}

/// Aggregated net worth for one user-month, derived entirely from Snapshot
/// rows; never hand-edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetWorthSnapshot {
    pub id: Option<i64>,
    pub user_id: i64,
    pub year: i32,
    pub month: u32,
    pub total_minor: i64,
    pub breakdown: HashMap<InvestmentType, i64>,
}

/// A spot price written by the external pricing collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    pub symbol: String,
    pub price_date: NaiveDate,
    pub price_minor: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_investment_type_conversions() {
        for it in InvestmentType::all() {
            assert_eq!(it.as_str().parse::<InvestmentType>().ok(), Some(*it));
        }
        assert_eq!(
            "fixed_deposit".parse::<InvestmentType>().ok(),
            Some(InvestmentType::FixedDeposit)
        );
        assert_eq!(
            "FD".parse::<InvestmentType>().ok(),
            Some(InvestmentType::FixedDeposit)
        );
        assert_eq!(
            "STOCK".parse::<InvestmentType>().ok(),
            Some(InvestmentType::Shares)
        );
        assert_eq!("INVALID".parse::<InvestmentType>().ok(), None);
    }

    #[test]
    fn test_transaction_kind_conversions() {
        let kinds = [
            TransactionKind::Buy,
            TransactionKind::Sell,
            TransactionKind::Deposit,
            TransactionKind::Withdrawal,
            TransactionKind::Dividend,
            TransactionKind::Interest,
            TransactionKind::Contribution,
            TransactionKind::Premium,
            TransactionKind::Bonus,
            TransactionKind::Split,
            TransactionKind::Maturity,
        ];
        for kind in kinds {
            assert_eq!(kind.as_str().parse::<TransactionKind>().ok(), Some(kind));
        }
        assert_eq!("INVALID".parse::<TransactionKind>().ok(), None);
    }

    #[test]
    fn test_flow_classification() {
        assert!(TransactionKind::Buy.is_outflow());
        assert!(TransactionKind::Premium.is_outflow());
        assert!(TransactionKind::Dividend.is_inflow());
        assert!(TransactionKind::Maturity.is_inflow());
        // Unit adjustments carry no cash
        assert!(!TransactionKind::Split.is_outflow());
        assert!(!TransactionKind::Split.is_inflow());
        assert!(!TransactionKind::Bonus.is_inflow());
    }

    #[test]
    fn test_term_thresholds() {
        assert_eq!(InvestmentType::Shares.long_term_threshold_days(), 365);
        assert_eq!(InvestmentType::EquityFund.long_term_threshold_days(), 365);
        assert_eq!(InvestmentType::DebtFund.long_term_threshold_days(), 1095);
        assert_eq!(InvestmentType::Gold.long_term_threshold_days(), 1095);
    }

    #[test]
    fn test_liability_classification() {
        assert!(InvestmentType::Loan.is_liability());
        assert!(InvestmentType::ExpectedExpense.is_liability());
        assert!(!InvestmentType::Shares.is_liability());
    }
}
