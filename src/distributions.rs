/*!
Defines the model-side traits of the sampler (likelihoods and priors), the generic
target and proposal traits used by the Metropolis–Hastings chains, and a handful of
concrete distributions: Gaussian targets, Gaussian and uniform priors, and a
multivariate normal used to build random-walk proposals.

# Examples

### A Gaussian prior with a closure likelihood

```rust
use mini_tmcmc::distributions::{GaussianPrior, LogLikelihood, Prior};
use ndarray::arr1;
use rand::rngs::SmallRng;
use rand::SeedableRng;

let prior = GaussianPrior::new(arr1(&[0.0, 0.0]), arr1(&[1.0, 2.0])).unwrap();
let likelihood = |theta: &[f64]| -0.5 * theta.iter().map(|x| x * x).sum::<f64>();

let mut rng = SmallRng::seed_from_u64(42);
let population = prior.sample(5, &mut rng);
assert_eq!(population.dim(), (5, 2));
println!("log-prior: {}", prior.log_prob(&[0.5, -0.5]));
println!("log-likelihood: {}", likelihood.log_likelihood(&[0.5, -0.5]));
```

### A Gaussian target and a random-walk kernel

```rust
use mini_tmcmc::distributions::{Gaussian2D, MultivariateNormal, Normalized};
use ndarray::{arr1, arr2};
use rand::rngs::SmallRng;
use rand::SeedableRng;

let gauss = Gaussian2D {
    mean: arr1(&[0.0, 0.0]),
    cov: arr2(&[[1.0, 0.0], [0.0, 1.0]]),
};
println!("Normalized log-probability: {}", gauss.log_prob(&[0.5, -0.5]));

let kernel = MultivariateNormal::new(&arr2(&[[0.1, 0.0], [0.0, 0.1]])).unwrap();
let mut rng = SmallRng::seed_from_u64(0);
let candidate = kernel.sample(&[0.0, 0.0], &mut rng);
assert_eq!(candidate.len(), 2);
```
*/

use nalgebra::{Cholesky, DMatrix, DVector};
use ndarray::{Array1, Array2};
use num_traits::Float;
use rand::rngs::SmallRng;
use rand::Rng;
use rand_distr::StandardNormal;
use std::f64::consts::PI;

use crate::error::{Result, TmcmcError};

/// How often the diagonal jitter of a semi-definite covariance is grown tenfold
/// before giving up on the factorisation.
const MAX_JITTER_ATTEMPTS: usize = 12;

/// A trait for generating proposals in Metropolis–Hastings-like algorithms.
/// The state type `T` is typically a vector of continuous values.
pub trait Proposal<T, F: Float> {
    /// Samples a new point from q(x' | x).
    fn sample(&mut self, current: &[T]) -> Result<Vec<T>>;

    /// Evaluates log q(x' | x).
    fn log_prob(&self, from: &[T], to: &[T]) -> F;

    /// Returns a new instance of this proposal distribution seeded with `seed`.
    fn set_seed(self, seed: u64) -> Self;
}

/// A trait for continuous target distributions from which we want to sample.
pub trait Target<T, F: Float> {
    /// Returns the log of the unnormalized density for state `theta`.
    fn unnorm_log_prob(&self, theta: &[T]) -> F;
}

/// A trait for distributions that provide a normalized log-density.
pub trait Normalized<T, F: Float> {
    /// Returns the normalized log-density for state `theta`.
    fn log_prob(&self, theta: &[T]) -> F;
}

/// The log-likelihood of a model, evaluated at a parameter vector.
///
/// Implemented for every `Fn(&[f64]) -> f64`, so plain closures can be used directly.
pub trait LogLikelihood {
    /// Returns log p(data | theta).
    fn log_likelihood(&self, theta: &[f64]) -> f64;
}

impl<F> LogLikelihood for F
where
    F: Fn(&[f64]) -> f64,
{
    fn log_likelihood(&self, theta: &[f64]) -> f64 {
        self(theta)
    }
}

/// A prior distribution: a log-density that is `-inf` outside its support, and a
/// sampler producing an `n × d` table of independent draws.
pub trait Prior {
    /// Returns log p(theta), or `f64::NEG_INFINITY` outside the support.
    fn log_prob(&self, theta: &[f64]) -> f64;

    /// Draws `n` points, one per row.
    fn sample(&self, n: usize, rng: &mut SmallRng) -> Array2<f64>;
}

/// A [`Prior`] assembled from a log-density closure and a sampler closure.
#[derive(Clone)]
pub struct FnPrior<P, S> {
    log_prob: P,
    sampler: S,
}

impl<P, S> FnPrior<P, S>
where
    P: Fn(&[f64]) -> f64,
    S: Fn(usize, &mut SmallRng) -> Array2<f64>,
{
    pub fn new(log_prob: P, sampler: S) -> Self {
        Self { log_prob, sampler }
    }
}

impl<P, S> Prior for FnPrior<P, S>
where
    P: Fn(&[f64]) -> f64,
    S: Fn(usize, &mut SmallRng) -> Array2<f64>,
{
    fn log_prob(&self, theta: &[f64]) -> f64 {
        (self.log_prob)(theta)
    }

    fn sample(&self, n: usize, rng: &mut SmallRng) -> Array2<f64> {
        (self.sampler)(n, rng)
    }
}

/**
Independent normal priors, one per dimension.

# Examples

```rust
use mini_tmcmc::distributions::{GaussianPrior, Prior};
use ndarray::arr1;

let prior = GaussianPrior::standard(2);
let lp = prior.log_prob(&[0.0, 0.0]);
assert!((lp + (2.0 * std::f64::consts::PI).ln()).abs() < 1e-12);
assert!(GaussianPrior::new(arr1(&[0.0]), arr1(&[-1.0])).is_err());
```
*/
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianPrior {
    pub mean: Array1<f64>,
    pub std: Array1<f64>,
}

impl GaussianPrior {
    /// Creates the prior, checking that every standard deviation is positive and finite.
    pub fn new(mean: Array1<f64>, std: Array1<f64>) -> Result<Self> {
        if mean.len() != std.len() {
            return Err(TmcmcError::DimensionMismatch {
                expected: mean.len(),
                got: std.len(),
            });
        }
        if std.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(TmcmcError::InvalidConfig(
                "prior standard deviations must be positive and finite".into(),
            ));
        }
        Ok(Self { mean, std })
    }

    /// The standard normal prior in `dim` dimensions.
    pub fn standard(dim: usize) -> Self {
        Self {
            mean: Array1::zeros(dim),
            std: Array1::ones(dim),
        }
    }
}

impl Prior for GaussianPrior {
    fn log_prob(&self, theta: &[f64]) -> f64 {
        let half_log_2pi = 0.5 * (2.0 * PI).ln();
        theta
            .iter()
            .zip(self.mean.iter().zip(self.std.iter()))
            .map(|(&x, (&m, &s))| {
                let z = (x - m) / s;
                -0.5 * z * z - s.ln() - half_log_2pi
            })
            .sum()
    }

    fn sample(&self, n: usize, rng: &mut SmallRng) -> Array2<f64> {
        Array2::from_shape_fn((n, self.mean.len()), |(_, j)| {
            let z: f64 = rng.sample(StandardNormal);
            self.mean[j] + self.std[j] * z
        })
    }
}

/// A uniform prior on the axis-aligned box `[low, high]`.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformPrior {
    pub low: Array1<f64>,
    pub high: Array1<f64>,
}

impl UniformPrior {
    /// Creates the prior, checking that every interval is finite and non-empty.
    pub fn new(low: Array1<f64>, high: Array1<f64>) -> Result<Self> {
        if low.len() != high.len() {
            return Err(TmcmcError::DimensionMismatch {
                expected: low.len(),
                got: high.len(),
            });
        }
        let valid = low
            .iter()
            .zip(high.iter())
            .all(|(l, h)| l.is_finite() && h.is_finite() && l < h);
        if !valid {
            return Err(TmcmcError::InvalidConfig(
                "uniform prior bounds must be finite with low < high".into(),
            ));
        }
        Ok(Self { low, high })
    }

    /// Returns true if `theta` lies inside the box.
    pub fn contains(&self, theta: &[f64]) -> bool {
        theta.len() == self.low.len()
            && theta
                .iter()
                .zip(self.low.iter().zip(self.high.iter()))
                .all(|(x, (l, h))| l <= x && x <= h)
    }
}

impl Prior for UniformPrior {
    fn log_prob(&self, theta: &[f64]) -> f64 {
        if !self.contains(theta) {
            return f64::NEG_INFINITY;
        }
        -self
            .low
            .iter()
            .zip(self.high.iter())
            .map(|(l, h)| (h - l).ln())
            .sum::<f64>()
    }

    fn sample(&self, n: usize, rng: &mut SmallRng) -> Array2<f64> {
        Array2::from_shape_fn((n, self.low.len()), |(_, j)| {
            let u: f64 = rng.gen();
            self.low[j] + (self.high[j] - self.low[j]) * u
        })
    }
}

/**
A multivariate normal with a fixed covariance, factorised once and then used to draw
points around arbitrary centres.

The covariance only needs to be positive semi-definite: if the Cholesky factorisation
fails, a growing multiple of the identity (relative to the mean variance) is added to
the diagonal until it succeeds.

# Examples

```rust
use mini_tmcmc::distributions::MultivariateNormal;
use ndarray::arr2;
use rand::rngs::SmallRng;
use rand::SeedableRng;

let normal = MultivariateNormal::new(&arr2(&[[1.0, 0.5], [0.5, 2.0]])).unwrap();
let mut rng = SmallRng::seed_from_u64(7);
let x = normal.sample(&[10.0, -10.0], &mut rng);
assert_eq!(x.len(), 2);
```
*/
#[derive(Debug, Clone, PartialEq)]
pub struct MultivariateNormal {
    /// Lower-triangular factor `L` with `L Lᵀ = Σ + jitter·I`.
    chol_l: DMatrix<f64>,
    /// Diagonal jitter that was needed to factorise the covariance.
    pub jitter: f64,
}

impl MultivariateNormal {
    pub fn new(cov: &Array2<f64>) -> Result<Self> {
        let (rows, cols) = cov.dim();
        if rows != cols {
            return Err(TmcmcError::DimensionMismatch {
                expected: rows,
                got: cols,
            });
        }
        if rows == 0 {
            return Err(TmcmcError::Covariance("covariance has no rows".into()));
        }
        if cov.iter().any(|v| !v.is_finite()) {
            return Err(TmcmcError::Covariance(
                "covariance has non-finite entries".into(),
            ));
        }

        let sigma = DMatrix::from_fn(rows, cols, |i, j| cov[[i, j]]);
        if sigma.diagonal().iter().any(|v| *v < 0.0) {
            return Err(TmcmcError::Covariance("negative variance on the diagonal".into()));
        }
        if let Some(chol_l) = lower_factor(sigma.clone()) {
            return Ok(Self {
                chol_l,
                jitter: 0.0,
            });
        }

        let mean_var = sigma.trace() / rows as f64;
        let mut jitter = 1e-10 * if mean_var > 0.0 { mean_var } else { 1.0 };
        for _ in 0..MAX_JITTER_ATTEMPTS {
            let jittered = &sigma + DMatrix::<f64>::identity(rows, cols) * jitter;
            if let Some(chol_l) = lower_factor(jittered) {
                tracing::warn!(jitter, "proposal covariance needed diagonal jitter");
                return Ok(Self { chol_l, jitter });
            }
            jitter *= 10.0;
        }
        Err(TmcmcError::Covariance(format!(
            "not positive semi-definite (jitter up to {jitter:e} failed)"
        )))
    }

    /// The dimension of the distribution.
    pub fn dim(&self) -> usize {
        self.chol_l.nrows()
    }

    /// Draws `mean + L z` with `z ~ N(0, I)`.
    pub fn sample<R: Rng + ?Sized>(&self, mean: &[f64], rng: &mut R) -> Vec<f64> {
        let z = DVector::<f64>::from_fn(self.dim(), |_, _| rng.sample(StandardNormal));
        let offset = &self.chol_l * z;
        mean.iter().zip(offset.iter()).map(|(m, e)| m + e).collect()
    }

    /// Log-density of `x` under a normal centred at `mean`.
    pub fn log_prob(&self, mean: &[f64], x: &[f64]) -> f64 {
        let d = self.dim();
        let diff = DVector::from_iterator(d, x.iter().zip(mean).map(|(a, b)| a - b));
        let log_det: f64 = 2.0 * self.chol_l.diagonal().iter().map(|v| v.ln()).sum::<f64>();
        self.chol_l
            .solve_lower_triangular(&diff)
            .map_or(f64::NEG_INFINITY, |y| {
                -0.5 * (d as f64 * (2.0 * PI).ln() + log_det + y.norm_squared())
            })
    }
}

/// Cholesky factor with a strictly positive, finite diagonal.
fn lower_factor(m: DMatrix<f64>) -> Option<DMatrix<f64>> {
    let l = Cholesky::new(m)?.l();
    l.diagonal()
        .iter()
        .all(|v| v.is_finite() && *v > 0.0)
        .then_some(l)
}

/**
A 2D Gaussian distribution parameterized by a mean vector and a 2×2 covariance matrix.

It doubles as a [`LogLikelihood`] through its normalized density, which makes it a
handy model with a closed-form evidence.

Only two-dimensional points are accepted. Any other length evaluates to NaN, which
the sampler reports as [`TmcmcError::NonFiniteLikelihood`].

# Examples

```rust
use mini_tmcmc::distributions::{Gaussian2D, Normalized};
use ndarray::{arr1, arr2};

let gauss: Gaussian2D<f64> = Gaussian2D {
    mean: arr1(&[0.0, 0.0]),
    cov: arr2(&[[1.0, 0.0], [0.0, 1.0]]),
};
let lp = gauss.log_prob(&[0.0, 0.0]);
assert!((lp + (2.0 * std::f64::consts::PI).ln()).abs() < 1e-12);
```
*/
#[derive(Debug, Clone, PartialEq)]
pub struct Gaussian2D<T: Float> {
    pub mean: Array1<T>,
    pub cov: Array2<T>,
}

impl<T: Float> Gaussian2D<T> {
    /// Returns `(det Σ, Σ⁻¹ (x - μ) · (x - μ))`, or `None` unless `theta` has two
    /// coordinates.
    fn det_and_quad_form(&self, theta: &[T]) -> Option<(T, T)> {
        let [x, y] = *theta else {
            return None;
        };
        let (a, b, c, d) = (
            self.cov[(0, 0)],
            self.cov[(0, 1)],
            self.cov[(1, 0)],
            self.cov[(1, 1)],
        );
        let det = a * d - b * c;
        let (dx, dy) = (x - self.mean[0], y - self.mean[1]);
        // Σ⁻¹ = [[d, -b], [-c, a]] / det
        let quad = (dx * (d * dx - b * dy) + dy * (-c * dx + a * dy)) / det;
        Some((det, quad))
    }
}

impl<T: Float> Normalized<T, T> for Gaussian2D<T> {
    fn log_prob(&self, theta: &[T]) -> T {
        let half = T::from(0.5).unwrap();
        let two_pi = T::from(2.0 * PI).unwrap();
        match self.det_and_quad_form(theta) {
            Some((det, quad)) => -two_pi.ln() - half * det.abs().ln() - half * quad,
            None => T::nan(),
        }
    }
}

impl<T: Float> Target<T, T> for Gaussian2D<T> {
    fn unnorm_log_prob(&self, theta: &[T]) -> T {
        self.det_and_quad_form(theta)
            .map_or(T::nan(), |(_, quad)| -T::from(0.5).unwrap() * quad)
    }
}

impl LogLikelihood for Gaussian2D<f64> {
    fn log_likelihood(&self, theta: &[f64]) -> f64 {
        self.log_prob(theta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, arr2, Axis};
    use rand::SeedableRng;
    use ndarray_stats::CorrelationExt;

    #[test]
    fn gaussian_2d_rejects_other_dimensions() {
        let gauss = Gaussian2D {
            mean: arr1(&[0.0, 0.0]),
            cov: arr2(&[[1.0, 0.0], [0.0, 1.0]]),
        };
        assert!(gauss.log_prob(&[0.5]).is_nan());
        assert!(gauss.unnorm_log_prob(&[0.5, 0.5, 0.5]).is_nan());
        assert!(gauss.log_likelihood(&[]).is_nan());
        assert!(gauss.log_likelihood(&[0.5, 0.5]).is_finite());
    }

    #[test]
    fn gaussian_2d_log_prob() {
        let gauss = Gaussian2D {
            mean: arr1(&[0.0, 1.0]),
            cov: arr2(&[[4.0, 2.0], [2.0, 3.0]]),
        };
        // det = 8, quad form at (1, 1) = [1, 0] Σ⁻¹ [1, 0]ᵀ = 3 / 8
        let expected = -(2.0 * PI).ln() - 0.5 * 8.0_f64.ln() - 0.5 * 3.0 / 8.0;
        assert_abs_diff_eq!(gauss.log_prob(&[1.0, 1.0]), expected, epsilon = 1e-12);
        assert_abs_diff_eq!(gauss.unnorm_log_prob(&[1.0, 1.0]), -3.0 / 16.0, epsilon = 1e-12);
    }

    #[test]
    fn gaussian_prior_matches_closed_form() {
        let prior = GaussianPrior::new(arr1(&[1.0, -1.0]), arr1(&[2.0, 0.5])).unwrap();
        let expected = -(2.0 * PI).ln() - 2.0_f64.ln() - 0.5_f64.ln() - 0.5 * (0.25 + 4.0);
        assert_abs_diff_eq!(prior.log_prob(&[2.0, 0.0]), expected, epsilon = 1e-12);
    }

    #[test]
    fn gaussian_prior_sample_moments() {
        let prior = GaussianPrior::new(arr1(&[3.0, -2.0]), arr1(&[1.0, 0.5])).unwrap();
        let mut rng = SmallRng::seed_from_u64(42);
        let draws = prior.sample(20_000, &mut rng);
        let mean = draws.mean_axis(Axis(0)).unwrap();
        let cov = draws.t().cov(1.0).unwrap();
        assert_abs_diff_eq!(mean, arr1(&[3.0, -2.0]), epsilon = 0.05);
        assert_abs_diff_eq!(cov, arr2(&[[1.0, 0.0], [0.0, 0.25]]), epsilon = 0.05);
    }

    #[test]
    fn uniform_prior_support() {
        let prior = UniformPrior::new(arr1(&[0.0, 0.0]), arr1(&[2.0, 4.0])).unwrap();
        assert_abs_diff_eq!(prior.log_prob(&[1.0, 1.0]), -(8.0_f64.ln()), epsilon = 1e-12);
        assert_eq!(prior.log_prob(&[-0.1, 1.0]), f64::NEG_INFINITY);
        assert_eq!(prior.log_prob(&[1.0, 4.1]), f64::NEG_INFINITY);

        let mut rng = SmallRng::seed_from_u64(3);
        let draws = prior.sample(1_000, &mut rng);
        assert!(draws.rows().into_iter().all(|r| prior.contains(&r.to_vec())));
    }

    #[test]
    fn invalid_priors_are_rejected() {
        assert!(UniformPrior::new(arr1(&[1.0]), arr1(&[1.0])).is_err());
        assert!(UniformPrior::new(arr1(&[0.0, 0.0]), arr1(&[1.0])).is_err());
        assert!(GaussianPrior::new(arr1(&[0.0]), arr1(&[0.0])).is_err());
    }

    #[test]
    fn fn_prior_delegates() {
        let prior = FnPrior::new(
            |theta: &[f64]| -theta[0].abs(),
            |n: usize, _rng: &mut SmallRng| Array2::from_elem((n, 1), 7.0),
        );
        let mut rng = SmallRng::seed_from_u64(0);
        assert_eq!(prior.log_prob(&[-3.0]), -3.0);
        assert_eq!(prior.sample(4, &mut rng), Array2::from_elem((4, 1), 7.0));
    }

    #[test]
    fn multivariate_normal_moments() {
        let cov = arr2(&[[2.0, 0.6], [0.6, 1.0]]);
        let normal = MultivariateNormal::new(&cov).unwrap();
        assert_eq!(normal.jitter, 0.0);

        let mut rng = SmallRng::seed_from_u64(11);
        let n = 20_000;
        let flat: Vec<f64> = (0..n)
            .flat_map(|_| normal.sample(&[1.0, -1.0], &mut rng))
            .collect();
        let draws = Array2::from_shape_vec((n, 2), flat).unwrap();
        let mean = draws.mean_axis(Axis(0)).unwrap();
        assert_abs_diff_eq!(mean, arr1(&[1.0, -1.0]), epsilon = 0.05);
        assert_abs_diff_eq!(draws.t().cov(1.0).unwrap(), cov, epsilon = 0.08);
    }

    #[test]
    fn multivariate_normal_log_prob_closed_form() {
        // N((0.42, 9.6); 0, 4I)
        let normal = MultivariateNormal::new(&arr2(&[[4.0, 0.0], [0.0, 4.0]])).unwrap();
        let lp = normal.log_prob(&[0.0, 0.0], &[0.42, 9.6]);
        assert_abs_diff_eq!(lp.exp(), 3.864661987252467e-7, epsilon = 1e-15);
        assert_abs_diff_eq!(
            lp,
            normal.log_prob(&[0.42, 9.6], &[0.0, 0.0]),
            epsilon = 1e-12
        );
    }

    #[test]
    fn multivariate_normal_handles_singular_covariance() {
        let normal = MultivariateNormal::new(&arr2(&[[1.0, 1.0], [1.0, 1.0]])).unwrap();
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..100 {
            let x = normal.sample(&[0.0, 0.0], &mut rng);
            assert!((x[0] - x[1]).abs() < 1e-3);
        }

        let zero = MultivariateNormal::new(&Array2::zeros((3, 3))).unwrap();
        assert!(zero.jitter > 0.0);
        assert!(zero.sample(&[0.0; 3], &mut rng).iter().all(|x| x.abs() < 1e-3));
    }

    #[test]
    fn multivariate_normal_rejects_bad_input() {
        assert!(MultivariateNormal::new(&Array2::zeros((2, 3))).is_err());
        assert!(MultivariateNormal::new(&arr2(&[[f64::NAN]])).is_err());
        assert!(MultivariateNormal::new(&arr2(&[[-1.0, 0.0], [0.0, -1.0]])).is_err());
    }
}
