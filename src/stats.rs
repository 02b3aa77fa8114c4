//! Weighted population statistics used to shape the random-walk proposal.

use ndarray::prelude::*;
use ndarray::Data;

use crate::error::{Result, TmcmcError};

/// Default factor applied to the weighted covariance of the population.
pub const DEFAULT_PROPOSAL_SCALE: f64 = 0.01;

fn check_shapes(theta: &Array2<f64>, weights: &Array1<f64>) -> Result<()> {
    if theta.nrows() != weights.len() {
        return Err(TmcmcError::DimensionMismatch {
            expected: theta.nrows(),
            got: weights.len(),
        });
    }
    if theta.is_empty() {
        return Err(TmcmcError::EmptyPopulation);
    }
    Ok(())
}

/// `μ = Σᵢ wᵢ θᵢ` for normalized weights `w`.
pub fn weighted_mean(theta: &Array2<f64>, weights: &Array1<f64>) -> Result<Array1<f64>> {
    check_shapes(theta, weights)?;
    Ok(weights.dot(theta))
}

/**
Weighted covariance of the rows of `theta`, multiplied by `scale`:

`Σ = scale · Σᵢ wᵢ (θᵢ - μ)ᵀ(θᵢ - μ)`

The result is averaged with its transpose, which makes it exactly symmetric.

# Examples

```rust
use mini_tmcmc::stats::weighted_covariance;
use ndarray::{arr1, arr2};

let theta = arr2(&[[0.0, 0.0], [2.0, 4.0]]);
let weights = arr1(&[0.5, 0.5]);
let cov = weighted_covariance(&theta, &weights, 1.0).unwrap();
assert_eq!(cov, arr2(&[[1.0, 2.0], [2.0, 4.0]]));
```
*/
pub fn weighted_covariance(
    theta: &Array2<f64>,
    weights: &Array1<f64>,
    scale: f64,
) -> Result<Array2<f64>> {
    let mean = weighted_mean(theta, weights)?;
    let centered = theta - &mean;
    let weighted = &centered * &weights.view().insert_axis(Axis(1));
    let cov = weighted.t().dot(&centered) * scale;
    Ok((&cov + &cov.t()) * 0.5)
}

/// Effective sample size `1 / Σ wᵢ²` of normalized weights.
pub fn effective_sample_size<S>(weights: &ArrayBase<S, Ix1>) -> f64
where
    S: Data<Elem = f64>,
{
    1.0 / weights.dot(weights)
}
