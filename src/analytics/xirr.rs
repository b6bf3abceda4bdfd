//! XIRR solver
//!
//! Annualized internal rate of return for irregularly-dated cash flows:
//! solves sum(cf_i / (1+r)^(days_i/365)) = 0 with Newton-Raphson, falling
//! back to bisection when Newton leaves the sane range or the derivative
//! flattens out. Rates are f64; a rate is not money and never stored.

use chrono::NaiveDate;

use crate::error::XirrError;

/// One dated cash flow. Outflows (money invested) are negative,
/// inflows (money returned) positive, in minor units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CashFlow {
    pub date: NaiveDate,
    pub amount_minor: i64,
}

const DAYS_PER_YEAR: f64 = 365.0;
const NEWTON_INITIAL_GUESS: f64 = 0.1;
const NEWTON_MAX_ITERATIONS: usize = 100;
const BISECTION_MAX_ITERATIONS: usize = 200;
const RESIDUAL_TOLERANCE: f64 = 1e-7;
const DERIVATIVE_EPSILON: f64 = 1e-10;
const RATE_LOWER_BOUND: f64 = -0.999;
const RATE_UPPER_BOUND: f64 = 10.0;

/// Net present value of the flows at rate `rate`, years measured from the
/// first flow's date.
fn net_present_value(flows: &[(f64, f64)], rate: f64) -> f64 {
    flows
        .iter()
        .map(|&(amount, years)| amount / (1.0 + rate).powf(years))
        .sum()
}

fn npv_derivative(flows: &[(f64, f64)], rate: f64) -> f64 {
    flows
        .iter()
        .map(|&(amount, years)| -years * amount / (1.0 + rate).powf(years + 1.0))
        .sum()
}

/// Solve for the annualized rate. Flows must contain at least one inflow
/// and one outflow; otherwise the rate is undefined.
pub fn xirr(cashflows: &[CashFlow]) -> Result<f64, XirrError> {
    if cashflows.len() < 2 {
        return Err(XirrError::Undefined);
    }
    let has_negative = cashflows.iter().any(|cf| cf.amount_minor < 0);
    let has_positive = cashflows.iter().any(|cf| cf.amount_minor > 0);
    if !has_negative || !has_positive {
        return Err(XirrError::Undefined);
    }

    let epoch = cashflows
        .iter()
        .map(|cf| cf.date)
        .min()
        .expect("non-empty cash flows");
    let flows: Vec<(f64, f64)> = cashflows
        .iter()
        .map(|cf| {
            let years = (cf.date - epoch).num_days() as f64 / DAYS_PER_YEAR;
            (cf.amount_minor as f64, years)
        })
        .collect();

    if let Some(rate) = newton_raphson(&flows) {
        return Ok(rate);
    }
    bisection(&flows).ok_or(XirrError::NoConvergence)
}

fn newton_raphson(flows: &[(f64, f64)]) -> Option<f64> {
    let mut rate = NEWTON_INITIAL_GUESS;

    for _ in 0..NEWTON_MAX_ITERATIONS {
        let residual = net_present_value(flows, rate);
        if residual.abs() < RESIDUAL_TOLERANCE {
            return Some(rate);
        }

        let derivative = npv_derivative(flows, rate);
        if derivative.abs() < DERIVATIVE_EPSILON {
            return None;
        }

        let next = rate - residual / derivative;
        if !next.is_finite() || next <= RATE_LOWER_BOUND || next > RATE_UPPER_BOUND {
            return None;
        }
        rate = next;
    }

    None
}

/// Bracketing fallback over [RATE_LOWER_BOUND, RATE_UPPER_BOUND]. The NPV
/// function is monotonic enough in practice to hold a single sign change;
/// when the interval does not bracket a root there is no convergent rate.
fn bisection(flows: &[(f64, f64)]) -> Option<f64> {
    let mut low = RATE_LOWER_BOUND;
    let mut high = RATE_UPPER_BOUND;
    let mut npv_low = net_present_value(flows, low);
    let npv_high = net_present_value(flows, high);

    if npv_low == 0.0 {
        return Some(low);
    }
    if npv_high == 0.0 {
        return Some(high);
    }
    if npv_low.signum() == npv_high.signum() {
        return None;
    }

    for _ in 0..BISECTION_MAX_ITERATIONS {
        let mid = (low + high) / 2.0;
        let npv_mid = net_present_value(flows, mid);

        if npv_mid.abs() < RESIDUAL_TOLERANCE || (high - low) / 2.0 < RESIDUAL_TOLERANCE {
            return Some(mid);
        }

        if npv_mid.signum() == npv_low.signum() {
            low = mid;
            npv_low = npv_mid;
        } else {
            high = mid;
        }
    }

    Some((low + high) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn cf(date_: NaiveDate, amount_minor: i64) -> CashFlow {
        CashFlow {
            date: date_,
            amount_minor,
        }
    }

    #[test]
    fn test_one_year_ten_percent() {
        let flows = vec![
            cf(date(2024, 1, 1), -100_000),
            cf(date(2025, 1, 1), 110_000),
        ];
        let rate = xirr(&flows).unwrap();
        // 366 days in 2024, so slightly under 10% annualized
        assert!((rate - 0.10).abs() < 0.005, "rate was {}", rate);
    }

    #[test]
    fn test_exact_365_days() {
        let flows = vec![
            cf(date(2023, 1, 1), -100_000),
            cf(date(2024, 1, 1), 110_000),
        ];
        let rate = xirr(&flows).unwrap();
        assert!((rate - 0.10).abs() < 1e-4, "rate was {}", rate);
    }

    #[test]
    fn test_single_sign_is_undefined() {
        let flows = vec![cf(date(2024, 1, 1), -10_000), cf(date(2024, 6, 1), -5_000)];
        assert_eq!(xirr(&flows), Err(XirrError::Undefined));

        let all_positive = vec![cf(date(2024, 1, 1), 10_000), cf(date(2024, 6, 1), 5_000)];
        assert_eq!(xirr(&all_positive), Err(XirrError::Undefined));
    }

    #[test]
    fn test_fewer_than_two_flows_is_undefined() {
        assert_eq!(xirr(&[]), Err(XirrError::Undefined));
        assert_eq!(
            xirr(&[cf(date(2024, 1, 1), -10_000)]),
            Err(XirrError::Undefined)
        );
    }

    #[test]
    fn test_monthly_sip_positive_return() {
        // Twelve monthly investments of 10,000 returning 130,000 at year end
        let mut flows: Vec<CashFlow> = (1..=12)
            .map(|month| cf(date(2024, month, 1), -10_000))
            .collect();
        flows.push(cf(date(2025, 1, 1), 130_000));

        let rate = xirr(&flows).unwrap();
        assert!(rate > 0.0);
        assert!(rate < 0.40, "rate was {}", rate);
    }

    #[test]
    fn test_losing_investment_negative_rate() {
        let flows = vec![
            cf(date(2023, 1, 1), -100_000),
            cf(date(2024, 1, 1), 80_000),
        ];
        let rate = xirr(&flows).unwrap();
        assert!((rate + 0.20).abs() < 1e-3, "rate was {}", rate);
    }

    #[test]
    fn test_near_total_loss_uses_bisection() {
        // Newton from 0.1 overshoots below -0.999 on this one
        let flows = vec![cf(date(2023, 1, 1), -100_000), cf(date(2024, 1, 1), 200)];
        let rate = xirr(&flows).unwrap();
        assert!((rate + 0.998).abs() < 1e-3, "rate was {}", rate);
        assert!(rate >= RATE_LOWER_BOUND);
    }

    #[test]
    fn test_residual_near_zero_at_solution() {
        let flows = vec![
            cf(date(2022, 3, 15), -250_000),
            cf(date(2022, 9, 1), -100_000),
            cf(date(2023, 6, 30), 120_000),
            cf(date(2024, 3, 15), 310_000),
        ];
        let rate = xirr(&flows).unwrap();

        let epoch = date(2022, 3, 15);
        let residual: f64 = flows
            .iter()
            .map(|f| {
                let years = (f.date - epoch).num_days() as f64 / 365.0;
                f.amount_minor as f64 / (1.0 + rate).powf(years)
            })
            .sum();
        assert!(residual.abs() < 0.01, "residual was {}", residual);
    }
}
