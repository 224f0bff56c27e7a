use crate::calc_engine::{compile, EvaluationContext, Expression};
use crate::error::{CalcError, CalcResult};

const GCD_TOLERANCE: f64 = 1e-9;

/// When a series stops accumulating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Termination {
    /// Every index in the range is visited; NaN and infinities are ordinary results.
    #[default]
    RunToEnd,
    /// Stop at the first index where the running total is NaN or infinite.
    StopOnNonFinite,
}

pub fn sum(source: &str, start: i64, end: i64) -> CalcResult<f64> {
    sum_with(source, start, end, Termination::RunToEnd)
}

pub fn product(source: &str, start: i64, end: i64) -> CalcResult<f64> {
    product_with(source, start, end, Termination::RunToEnd)
}

pub fn sum_with(source: &str, start: i64, end: i64, termination: Termination) -> CalcResult<f64> {
    let expr = compile(source)?;
    Ok(accumulate(&expr, start, end, 0.0, |acc, term| acc + term, termination))
}

pub fn product_with(
    source: &str,
    start: i64,
    end: i64,
    termination: Termination,
) -> CalcResult<f64> {
    let expr = compile(source)?;
    Ok(accumulate(&expr, start, end, 1.0, |acc, term| acc * term, termination))
}

fn accumulate(
    expr: &Expression,
    start: i64,
    end: i64,
    identity: f64,
    combine: impl Fn(f64, f64) -> f64,
    termination: Termination,
) -> f64 {
    let mut ctx = EvaluationContext::new();
    let mut total = identity;

    for i in start..=end {
        ctx.bind(i as f64);
        total = combine(total, expr.eval_in(&ctx));
        if termination == Termination::StopOnNonFinite && !total.is_finite() {
            log::debug!("series of '{}' stopped at index {}", expr.source(), i);
            break;
        }
    }
    total
}

/// `n!` as a float; past `170!` the result is `+inf`.
pub fn factorial(n: i64) -> CalcResult<f64> {
    if n < 0 {
        return Err(CalcError::validation(format!(
            "factorial is not defined for negative numbers (n = {})",
            n
        )));
    }
    let mut result = 1.0;
    for i in 1..=n {
        result *= i as f64;
        if result == f64::INFINITY {
            break;
        }
    }
    Ok(result)
}

/// Euclid's algorithm on the absolute values, treating remainders below `1e-9` as zero.
pub fn gcd(a: f64, b: f64) -> f64 {
    let mut a = a.abs();
    let mut b = b.abs();
    while b > GCD_TOLERANCE {
        let remainder = a % b;
        a = b;
        b = remainder;
    }
    a
}

pub fn lcm(a: f64, b: f64) -> f64 {
    if a.abs() < GCD_TOLERANCE || b.abs() < GCD_TOLERANCE {
        return 0.0;
    }
    (a * b).abs() / gcd(a, b)
}
