/*!
The per-stage target and proposal handed to every refinement chain.

Both are small values built once per stage and shared read-only by all chains:
[`TemperedTarget`] fixes the tempering coefficient, and [`SupportedGaussian`] fixes
the proposal covariance. Each chain gets its own copy of the proposal with its own
random number generator.
*/

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::distributions::{LogLikelihood, MultivariateNormal, Prior, Proposal, Target};
use crate::error::{Result, TmcmcError};

/// Default cap on the number of draws spent looking for a proposal inside the prior
/// support.
pub const DEFAULT_MAX_PROPOSAL_RETRIES: usize = 10_000;

/// The tempered posterior `β · log L(x) + log p(x)`.
pub struct TemperedTarget<'a, L, P> {
    pub beta: f64,
    pub likelihood: &'a L,
    pub prior: &'a P,
}

impl<L, P> Clone for TemperedTarget<'_, L, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<L, P> Copy for TemperedTarget<'_, L, P> {}

impl<'a, L, P> TemperedTarget<'a, L, P> {
    pub fn new(beta: f64, likelihood: &'a L, prior: &'a P) -> Self {
        Self {
            beta,
            likelihood,
            prior,
        }
    }
}

impl<L: LogLikelihood, P: Prior> Target<f64, f64> for TemperedTarget<'_, L, P> {
    /// Outside the prior support the likelihood is not evaluated.
    fn unnorm_log_prob(&self, theta: &[f64]) -> f64 {
        let log_prior = self.prior.log_prob(theta);
        if log_prior == f64::NEG_INFINITY {
            return log_prior;
        }
        self.beta * self.likelihood.log_likelihood(theta) + log_prior
    }
}

/**
Draws from `N(center, Σ)` until the prior density of the draw is not `-inf`.

Gives up with [`TmcmcError::SupportRejection`] after `max_retries` draws.

# Examples

```rust
use mini_tmcmc::distributions::{MultivariateNormal, UniformPrior};
use mini_tmcmc::tempered::draw_in_support;
use ndarray::{arr1, arr2};
use rand::rngs::SmallRng;
use rand::SeedableRng;

let prior = UniformPrior::new(arr1(&[0.0]), arr1(&[1.0])).unwrap();
let normal = MultivariateNormal::new(&arr2(&[[1.0]])).unwrap();
let mut rng = SmallRng::seed_from_u64(3);
let x = draw_in_support(&normal, &[0.99], &prior, 1_000, &mut rng).unwrap();
assert!(prior.contains(&x));
```
*/
pub fn draw_in_support<P, R>(
    normal: &MultivariateNormal,
    center: &[f64],
    prior: &P,
    max_retries: usize,
    rng: &mut R,
) -> Result<Vec<f64>>
where
    P: Prior + ?Sized,
    R: Rng + ?Sized,
{
    for _ in 0..max_retries {
        let candidate = normal.sample(center, rng);
        if prior.log_prob(&candidate) != f64::NEG_INFINITY {
            return Ok(candidate);
        }
    }
    Err(TmcmcError::SupportRejection {
        retries: max_retries,
    })
}

/// A Gaussian random-walk proposal that only ever returns points inside the prior
/// support.
///
/// The density reported by [`Proposal::log_prob`] is that of the untruncated normal,
/// which is symmetric in `from` and `to`.
#[derive(Debug, Clone)]
pub struct SupportedGaussian<'a, P> {
    pub normal: &'a MultivariateNormal,
    pub prior: &'a P,
    pub max_retries: usize,
    rng: SmallRng,
}

impl<'a, P: Prior> SupportedGaussian<'a, P> {
    /// Creates a proposal drawing from its own generator seeded with `seed`.
    pub fn new(
        normal: &'a MultivariateNormal,
        prior: &'a P,
        max_retries: usize,
        seed: u64,
    ) -> Self {
        Self {
            normal,
            prior,
            max_retries,
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl<P: Prior> Proposal<f64, f64> for SupportedGaussian<'_, P> {
    fn sample(&mut self, current: &[f64]) -> Result<Vec<f64>> {
        draw_in_support(
            self.normal,
            current,
            self.prior,
            self.max_retries,
            &mut self.rng,
        )
    }

    fn log_prob(&self, from: &[f64], to: &[f64]) -> f64 {
        self.normal.log_prob(from, to)
    }

    fn set_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }
}
