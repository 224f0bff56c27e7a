use crate::calc_engine::{compile, EvaluationContext, Expression};
use crate::error::{CalcError, CalcResult};

/// One evaluated point; `y` may be NaN or infinite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
}

/// `n` evenly spaced positions covering `[x_min, x_max]`, endpoints included.
/// A single position is placed at `x_min`.
pub fn linspace(x_min: f64, x_max: f64, n: usize) -> impl Iterator<Item = f64> {
    let step = if n > 1 {
        (x_max - x_min) / (n - 1) as f64
    } else {
        0.0
    };
    (0..n).map(move |i| {
        if n > 1 && i == n - 1 {
            x_max
        } else {
            x_min + i as f64 * step
        }
    })
}

/// Evaluates `expr` at every position of [`linspace`], reusing one context.
pub fn samples(
    expr: &Expression,
    x_min: f64,
    x_max: f64,
    n: usize,
) -> impl Iterator<Item = Sample> + '_ {
    let mut ctx = EvaluationContext::new();
    linspace(x_min, x_max, n).map(move |x| {
        ctx.bind(x);
        Sample {
            x,
            y: expr.eval_in(&ctx),
        }
    })
}

fn check_domain(x_min: f64, x_max: f64, num_samples: usize) -> CalcResult<()> {
    if !(x_min < x_max) {
        return Err(CalcError::validation(format!(
            "x-min ({}) must be less than x-max ({})",
            x_min, x_max
        )));
    }
    if !(x_max - x_min).is_finite() {
        return Err(CalcError::validation(format!(
            "x range [{}, {}] is too wide to sample",
            x_min, x_max
        )));
    }
    if num_samples < 1 {
        return Err(CalcError::validation("at least one sample is required"));
    }
    Ok(())
}

pub fn min_max(source: &str, x_min: f64, x_max: f64, num_samples: usize) -> CalcResult<(f64, f64)> {
    check_domain(x_min, x_max, num_samples)?;
    let expr = compile(source)?;
    min_max_of(&expr, x_min, x_max, num_samples)
}

/// Smallest and largest `f(x)` over the sampled interval. NaN samples are skipped; infinite
/// samples count, so an unbounded function yields an infinite bound.
pub fn min_max_of(
    expr: &Expression,
    x_min: f64,
    x_max: f64,
    num_samples: usize,
) -> CalcResult<(f64, f64)> {
    bounds(expr, x_min, x_max, num_samples, |y| !y.is_nan())
}

/// Like [`min_max_of`], but infinite samples are skipped as well.
pub fn finite_min_max(
    expr: &Expression,
    x_min: f64,
    x_max: f64,
    num_samples: usize,
) -> CalcResult<(f64, f64)> {
    bounds(expr, x_min, x_max, num_samples, f64::is_finite)
}

fn bounds(
    expr: &Expression,
    x_min: f64,
    x_max: f64,
    num_samples: usize,
    counts: impl Fn(f64) -> bool,
) -> CalcResult<(f64, f64)> {
    check_domain(x_min, x_max, num_samples)?;

    let mut range: Option<(f64, f64)> = None;
    let mut skipped = 0usize;
    for Sample { y, .. } in samples(expr, x_min, x_max, num_samples) {
        if !counts(y) {
            skipped += 1;
            continue;
        }
        range = Some(match range {
            Some((lo, hi)) => (lo.min(y), hi.max(y)),
            None => (y, y),
        });
    }

    log::trace!(
        "sampled '{}' at {} points on [{}, {}], {} skipped",
        expr.source(),
        num_samples,
        x_min,
        x_max,
        skipped
    );
    range.ok_or(CalcError::EmptyRange { x_min, x_max })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;
    use std::f64::consts::PI;

    #[test]
    fn linspace_includes_both_endpoints() {
        let xs: Vec<f64> = linspace(-1.0, 1.0, 5).collect();
        assert_eq!(xs, vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn linspace_single_point_is_x_min() {
        let xs: Vec<f64> = linspace(2.0, 3.0, 1).collect();
        assert_eq!(xs, vec![2.0]);
        assert_eq!(linspace(2.0, 3.0, 0).count(), 0);
    }

    #[test]
    fn sine_over_full_period() {
        let (lo, hi) = min_max("sin(x)", -PI, PI, 1000).unwrap();
        assert_abs_diff_eq!(lo, -1.0, epsilon = 1e-2);
        assert_abs_diff_eq!(hi, 1.0, epsilon = 1e-2);
    }

    #[test]
    fn constant_function_has_equal_bounds() {
        assert_eq!(min_max("5", -1.0, 1.0, 10).unwrap(), (5.0, 5.0));
    }

    #[test]
    fn single_sample_uses_x_min() {
        assert_eq!(min_max("x", 3.0, 4.0, 1).unwrap(), (3.0, 3.0));
    }

    #[test]
    fn nan_samples_are_skipped() {
        let (lo, hi) = min_max("sqrt(x)", -4.0, 4.0, 9).unwrap();
        assert_eq!((lo, hi), (0.0, 2.0));
    }

    #[test]
    fn infinite_samples_bound_the_range() {
        let (lo, hi) = min_max("1/x", -1.0, 1.0, 3).unwrap();
        assert_eq!(lo, -1.0);
        assert_eq!(hi, f64::INFINITY);

        let expr = compile("1/x").unwrap();
        assert_eq!(finite_min_max(&expr, -1.0, 1.0, 3).unwrap(), (-1.0, 1.0));
    }

    #[test]
    fn all_nan_is_an_empty_range() {
        let err = min_max("sqrt(x)", -10.0, -1.0, 50).unwrap_err();
        assert_eq!(err, CalcError::EmptyRange { x_min: -10.0, x_max: -1.0 });
    }

    #[test]
    fn invalid_domain_is_rejected_before_compiling() {
        assert!(matches!(min_max("x", 1.0, 1.0, 10), Err(CalcError::Validation(_))));
        assert!(matches!(min_max("x", 2.0, 1.0, 10), Err(CalcError::Validation(_))));
        assert!(matches!(min_max("x", f64::NAN, 1.0, 10), Err(CalcError::Validation(_))));
        assert!(matches!(min_max("x", 0.0, 1.0, 0), Err(CalcError::Validation(_))));
        assert!(matches!(min_max("2+*3", 1.0, 1.0, 10), Err(CalcError::Validation(_))));
        assert!(matches!(min_max("2+*3", 0.0, 1.0, 10), Err(CalcError::Parse(_))));
    }

    #[test]
    fn overflowing_span_is_rejected() {
        for (lo, hi) in [(-1e308, 1e308), (f64::NEG_INFINITY, 0.0), (0.0, f64::INFINITY)] {
            assert!(
                matches!(min_max("x", lo, hi, 10), Err(CalcError::Validation(_))),
                "[{}, {}]",
                lo,
                hi
            );
        }
        let expr = compile("x").unwrap();
        assert!(matches!(
            finite_min_max(&expr, -1e308, 1e308, 10),
            Err(CalcError::Validation(_))
        ));
        // wide but representable spans still sample
        assert!(min_max("x", -1e307, 1e307, 10).is_ok());
    }

    #[test]
    fn samples_pair_positions_with_values() {
        let expr = compile("x*10").unwrap();
        let got: Vec<Sample> = samples(&expr, 0.0, 1.0, 3).collect();
        assert_eq!(
            got,
            vec![
                Sample { x: 0.0, y: 0.0 },
                Sample { x: 0.5, y: 5.0 },
                Sample { x: 1.0, y: 10.0 },
            ]
        );
    }
}
