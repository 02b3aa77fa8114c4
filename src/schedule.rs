//! Adaptive tempering schedule.
//!
//! The next tempering coefficient is the one whose importance weights
//! `exp((β' - β)(Lᵢ - Lmax))` have a prescribed coefficient of variation. Steps shrink
//! automatically when the likelihood is peaked and grow when it is flat.

use ndarray::{Array1, ArrayBase, Data, Ix1};
use ndarray_stats::QuantileExt;

use crate::error::{Result, TmcmcError};

/// Target coefficient of variation of the incremental weights.
pub const DEFAULT_TARGET_COV: f64 = 1.0;

/// Relative bracket width at which the bisection stops.
pub const DEFAULT_BISECTION_TOL: f64 = 1e-6;

/// Upper end of the initial bisection bracket.
const BRACKET_UPPER: f64 = 2.0;

/// Returns `max(L)`, or an error naming the first sample whose log-likelihood makes
/// the weights undefined (NaN anywhere, or a non-finite maximum).
pub fn max_log_likelihood<S>(log_likelihoods: &ArrayBase<S, Ix1>) -> Result<f64>
where
    S: Data<Elem = f64>,
{
    if let Some(index) = log_likelihoods.iter().position(|l| l.is_nan()) {
        return Err(TmcmcError::NonFiniteLikelihood { index });
    }
    let index = log_likelihoods
        .argmax()
        .map_err(|_| TmcmcError::EmptyPopulation)?;
    let max = log_likelihoods[index];
    if !max.is_finite() {
        return Err(TmcmcError::NonFiniteLikelihood { index });
    }
    Ok(max)
}

/// Population standard deviation divided by the mean.
///
/// Returns 0 for an empty or all-zero slice, where the dispersion is undefined but
/// no weight dominates.
pub fn coefficient_of_variation<S>(weights: &ArrayBase<S, Ix1>) -> f64
where
    S: Data<Elem = f64>,
{
    match weights.mean() {
        Some(mean) if mean > 0.0 => weights.std(0.0) / mean,
        _ => 0.0,
    }
}

/// Unnormalized weights for a tempering increment `delta`, given log-likelihoods that
/// are already shifted by their maximum.
pub fn incremental_weights(delta: f64, shifted: &Array1<f64>) -> Array1<f64> {
    shifted.mapv(|l| (delta * l).exp())
}

/**
Finds the next tempering coefficient by bisection.

The bracket starts as `[beta, 2]`. A midpoint whose weights have a coefficient of
variation above `target_cov` becomes the new upper end, otherwise the new lower end.
The search stops once `hi - lo <= tol · max(mid, tol)` and the result is clamped
to 1.

Samples with a log-likelihood of `-inf` get zero weight at every step. When they are
the majority the target cannot be met, and the smallest positive step is returned.

A flat likelihood never exceeds the target, so the search walks up to the top of the
bracket and the clamped result is exactly 1.

# Examples

```rust
use mini_tmcmc::schedule::{next_beta, DEFAULT_BISECTION_TOL, DEFAULT_TARGET_COV};
use ndarray::arr1;

let flat = arr1(&[-3.0, -3.0, -3.0]);
let beta = next_beta(0.0, &flat, DEFAULT_TARGET_COV, DEFAULT_BISECTION_TOL).unwrap();
assert_eq!(beta, 1.0);

let peaked = arr1(&[0.0, -100.0, -200.0, -300.0]);
let beta = next_beta(0.0, &peaked, DEFAULT_TARGET_COV, DEFAULT_BISECTION_TOL).unwrap();
assert!(beta > 0.0 && beta < 1.0);
```
*/
pub fn next_beta(
    beta: f64,
    log_likelihoods: &Array1<f64>,
    target_cov: f64,
    tol: f64,
) -> Result<f64> {
    let l_max = max_log_likelihood(log_likelihoods)?;
    let shifted = log_likelihoods.mapv(|l| l - l_max);

    let (mut lo, mut hi) = (beta, BRACKET_UPPER);
    let mut mid = 0.5 * (lo + hi);
    // The width floor `tol²` keeps the search finite near `β = 0`, and `mid` stays
    // strictly above `beta` so a `-inf` log-likelihood never meets a zero increment.
    while hi - lo > tol * mid.max(tol) && lo < mid && mid < hi {
        let cov = coefficient_of_variation(&incremental_weights(mid - beta, &shifted));
        if cov > target_cov {
            hi = mid;
        } else {
            lo = mid;
        }
        mid = 0.5 * (lo + hi);
    }
    Ok(mid.min(1.0))
}
