use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::error::WaterfallError;
use crate::types::{Money, Rate};
use crate::WaterfallResult;

const CONVERGENCE_THRESHOLD: Decimal = dec!(0.0000001);
const MAX_IRR_ITERATIONS: u32 = 50;

/// A periodic rate can never imply losing more than the whole of capital.
pub const RATE_FLOOR: Rate = dec!(-0.99);

/// Starting point for the Newton iteration (1% per period).
pub const DEFAULT_IRR_GUESS: Rate = dec!(0.01);

/// Net Present Value of a series of periodic cash flows (t = 0, 1, 2, ...)
pub fn npv(rate: Rate, cash_flows: &[Money]) -> WaterfallResult<Money> {
    if rate <= dec!(-1) {
        return Err(WaterfallError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    npv_with_slope(rate, cash_flows)
        .map(|(value, _)| value)
        .ok_or_else(|| WaterfallError::InvalidInput {
            field: "rate".into(),
            reason: "Discount factors leave the representable decimal range".into(),
        })
}

/// NPV and its first derivative with respect to the rate.
///
/// Returns `None` when a discount factor underflows to zero or any term
/// overflows the 96-bit mantissa.
fn npv_with_slope(rate: Rate, cash_flows: &[Money]) -> Option<(Money, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;
    let mut value = Decimal::ZERO;
    let mut slope = Decimal::ZERO;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount = discount.checked_mul(one_plus_r)?;
        }
        if discount.is_zero() {
            return None;
        }
        value = value.checked_add(cf.checked_div(discount)?)?;
        if t > 0 {
            let weighted = Decimal::from(t as u64).checked_mul(*cf)?;
            let term = weighted.checked_div(discount.checked_mul(one_plus_r)?)?;
            slope = slope.checked_sub(term)?;
        }
    }

    Some((value, slope))
}

/// Periodic Internal Rate of Return using Newton-Raphson.
///
/// Requires at least two flows with at least one sign change in the set of
/// values (one positive and one negative). Returns `None` when that does not
/// hold, when the derivative vanishes, or when 50 iterations pass without
/// `|NPV| < 1e-7`. A `None` is "no IRR", which is distinct from a 0% IRR.
pub fn irr(cash_flows: &[Money], guess: Rate) -> Option<Rate> {
    if cash_flows.len() < 2 {
        return None;
    }
    let has_positive = cash_flows.iter().any(|cf| *cf > Decimal::ZERO);
    let has_negative = cash_flows.iter().any(|cf| *cf < Decimal::ZERO);
    if !has_positive || !has_negative {
        return None;
    }

    let mut rate = guess.max(RATE_FLOOR);

    for _ in 0..MAX_IRR_ITERATIONS {
        let (npv_val, dnpv) = npv_with_slope(rate, cash_flows)?;

        if npv_val.abs() < CONVERGENCE_THRESHOLD {
            return Some(rate);
        }

        if dnpv.is_zero() {
            return None;
        }

        rate -= npv_val.checked_div(dnpv)?;
        if rate < RATE_FLOOR {
            rate = RATE_FLOOR;
        }
    }

    None
}

/// Convert a monthly rate to an effective annual rate: (1 + r)^12 - 1.
pub fn annualize_monthly(monthly: Rate) -> Option<Rate> {
    (Decimal::ONE + monthly)
        .checked_powi(12)
        .map(|growth| growth - Decimal::ONE)
}
