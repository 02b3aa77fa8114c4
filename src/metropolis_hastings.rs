/*!
# Metropolis–Hastings Chain

A single Metropolis–Hastings Markov chain that works with any target distribution `D`
and proposal distribution `Q` implementing [`Target`] and [`Proposal`]. The TMCMC
sampler launches one such chain per resampled seed and keeps only its final state.

Each chain owns its random number generator, so independent chains can run on
different threads without sharing state. Use [`MHMarkovChain::set_seed`] to make a
chain reproducible.

## Example Usage

```rust
use mini_tmcmc::core::MarkovChain;
use mini_tmcmc::distributions::{Gaussian2D, GaussianPrior, MultivariateNormal};
use mini_tmcmc::metropolis_hastings::MHMarkovChain;
use mini_tmcmc::tempered::SupportedGaussian;
use ndarray::{arr1, arr2};

let target = Gaussian2D {
    mean: arr1(&[0.0, 0.0]),
    cov: arr2(&[[1.0, 0.0], [0.0, 1.0]]),
};
let prior = GaussianPrior::standard(2);
let normal = MultivariateNormal::new(&arr2(&[[1.0, 0.0], [0.0, 1.0]])).unwrap();
let proposal = SupportedGaussian::new(&normal, &prior, 100, 1);
let mut chain = MHMarkovChain::new(target, proposal, &[0.0, 0.0]).set_seed(42);

for _ in 0..1000 {
    chain.step().unwrap();
}
assert!(chain.acceptance_rate() > 0.0);
```
*/

use num_traits::Float;
use rand::prelude::*;

use crate::core::MarkovChain;
use crate::distributions::{Proposal, Target};
use crate::error::Result;

/// A single Markov chain for the Metropolis–Hastings algorithm.
///
/// The chain caches the target log-density of its current state, so every step
/// evaluates the target exactly once.
#[derive(Debug, Clone)]
pub struct MHMarkovChain<T, F, D, Q> {
    /// The target distribution to sample from.
    pub target: D,
    /// The proposal distribution used to generate candidate states.
    pub proposal: Q,
    /// The current state of the chain.
    pub current_state: Vec<T>,
    /// The chain-specific random seed.
    pub seed: u64,
    /// The random number generator for this chain.
    pub rng: SmallRng,
    current_log_prob: F,
    n_steps: usize,
    n_accepted: usize,
}

impl<T, F, D, Q> MHMarkovChain<T, F, D, Q>
where
    D: Target<T, F>,
    Q: Proposal<T, F>,
    T: Clone,
    F: Float,
{
    /**
    Creates a new Metropolis–Hastings chain.

    # Arguments
    * `target` - The target distribution.
    * `proposal` - The proposal distribution.
    * `initial_state` - The starting state for the chain.

    # Examples

    ```rust
    use mini_tmcmc::distributions::{Gaussian2D, GaussianPrior, MultivariateNormal};
    use mini_tmcmc::metropolis_hastings::MHMarkovChain;
    use mini_tmcmc::tempered::SupportedGaussian;
    use ndarray::{arr1, arr2};

    let target = Gaussian2D {
        mean: arr1(&[0.0, 0.0]),
        cov: arr2(&[[1.0, 0.0], [0.0, 1.0]]),
    };
    let prior = GaussianPrior::standard(2);
    let normal = MultivariateNormal::new(&arr2(&[[1.0, 0.0], [0.0, 1.0]])).unwrap();
    let proposal = SupportedGaussian::new(&normal, &prior, 100, 0);
    let chain = MHMarkovChain::new(target, proposal, &[0.0, 0.0]);
    assert_eq!(chain.current_state, vec![0.0, 0.0]);
    ```
    */
    pub fn new(target: D, proposal: Q, initial_state: &[T]) -> Self {
        let seed = thread_rng().gen::<u64>();
        let current_log_prob = target.unnorm_log_prob(initial_state);
        Self {
            target,
            proposal,
            current_state: initial_state.to_vec(),
            seed,
            rng: SmallRng::seed_from_u64(seed),
            current_log_prob,
            n_steps: 0,
            n_accepted: 0,
        }
    }

    /// Reseeds the chain's accept/reject stream.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    /// Unnormalized target log-density of the current state.
    pub fn current_log_prob(&self) -> F {
        self.current_log_prob
    }

    /// Fraction of steps so far whose proposal was accepted (0 before the first step).
    pub fn acceptance_rate(&self) -> f64 {
        if self.n_steps == 0 {
            return 0.0;
        }
        self.n_accepted as f64 / self.n_steps as f64
    }
}

impl<T, F, D, Q> MarkovChain<T> for MHMarkovChain<T, F, D, Q>
where
    D: Target<T, F>,
    Q: Proposal<T, F>,
    T: Clone,
    F: Float,
    rand_distr::Standard: rand_distr::Distribution<F>,
{
    /**
    Performs one Metropolis–Hastings update step.

    The acceptance ratio is computed in log-space as

    \[
    \log \alpha = \left[\log p(\text{proposed}) + \log q(\text{current} \mid \text{proposed})\right]
                  - \left[\log p(\text{current}) + \log q(\text{proposed} \mid \text{current})\right]
    \]

    and the proposal is accepted if \(\log(\text{Uniform}(0,1)) < \log \alpha\).
    A proposal whose target density is `-inf` is never accepted. Errors raised by
    the proposal (e.g. an exhausted support search) are returned unchanged.
    */
    fn step(&mut self) -> Result<&Vec<T>> {
        let proposed = self.proposal.sample(&self.current_state)?;
        let proposed_lp = self.target.unnorm_log_prob(&proposed);
        let log_q_forward = self.proposal.log_prob(&self.current_state, &proposed);
        let log_q_backward = self.proposal.log_prob(&proposed, &self.current_state);
        let log_accept_ratio =
            (proposed_lp + log_q_backward) - (self.current_log_prob + log_q_forward);

        self.n_steps += 1;
        let u: F = self.rng.gen();
        if log_accept_ratio > u.ln() {
            self.current_state = proposed;
            self.current_log_prob = proposed_lp;
            self.n_accepted += 1;
        }
        Ok(&self.current_state)
    }

    fn current_state(&self) -> &Vec<T> {
        &self.current_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::advance;
    use crate::distributions::{Gaussian2D, GaussianPrior, MultivariateNormal};
    use crate::tempered::SupportedGaussian;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, arr2, Array2, ArrayView1, Axis};
    use ndarray_stats::CorrelationExt;

    fn unit_normal(dim: usize) -> MultivariateNormal {
        MultivariateNormal::new(&Array2::eye(dim)).unwrap()
    }

    /// Checks that a single long chain recovers the mean and covariance of a
    /// correlated 2D Gaussian.
    #[test]
    fn gaussian_2d_moments() {
        const BURNIN: usize = 2_000;
        const SAMPLE_SIZE: usize = 40_000;
        const SEED: u64 = 42;

        let target = Gaussian2D {
            mean: arr1(&[0.0, 1.0]),
            cov: arr2(&[[4.0, 2.0], [2.0, 3.0]]),
        };
        let prior = GaussianPrior::standard(2);
        let normal = unit_normal(2);
        let proposal = SupportedGaussian::new(&normal, &prior, 10, SEED);
        let mut chain = MHMarkovChain::new(target.clone(), proposal, &[0.0, 0.0]).set_seed(SEED);

        advance(&mut chain, BURNIN).unwrap();
        let mut samples = Array2::<f64>::zeros((SAMPLE_SIZE, 2));
        for mut row in samples.rows_mut() {
            let state = chain.step().unwrap();
            row.assign(&ArrayView1::from(state.as_slice()));
        }

        let mean = samples.mean_axis(Axis(0)).unwrap();
        let cov = samples.t().cov(1.0).unwrap();
        assert_abs_diff_eq!(mean, target.mean, epsilon = 0.3);
        assert_abs_diff_eq!(cov, target.cov, epsilon = 0.5);

        let rate = chain.acceptance_rate();
        assert!(rate > 0.1 && rate < 0.9, "acceptance rate {rate}");
    }

    fn standard_target() -> Gaussian2D<f64> {
        Gaussian2D {
            mean: arr1(&[0.0, 0.0]),
            cov: arr2(&[[1.0, 0.0], [0.0, 1.0]]),
        }
    }

    #[test]
    fn seeded_chains_are_reproducible() {
        let prior = GaussianPrior::standard(2);
        let normal = MultivariateNormal::new(&arr2(&[[0.49, 0.0], [0.0, 0.49]])).unwrap();
        let make = || {
            let proposal = SupportedGaussian::new(&normal, &prior, 10, 5);
            MHMarkovChain::new(standard_target(), proposal, &[3.0, -3.0]).set_seed(6)
        };
        let (mut a, mut b) = (make(), make());
        assert_eq!(advance(&mut a, 100).unwrap(), advance(&mut b, 100).unwrap());
    }

    #[test]
    fn cached_log_prob_tracks_state() {
        let target = standard_target();
        let prior = GaussianPrior::standard(2);
        let normal = MultivariateNormal::new(&arr2(&[[0.25, 0.0], [0.0, 0.25]])).unwrap();
        let proposal = SupportedGaussian::new(&normal, &prior, 10, 9);
        let mut chain = MHMarkovChain::new(target.clone(), proposal, &[1.0, 0.5]).set_seed(10);
        for _ in 0..50 {
            chain.step().unwrap();
            assert_abs_diff_eq!(
                chain.current_log_prob(),
                target.unnorm_log_prob(&chain.current_state),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn acceptance_rate_starts_at_zero() {
        let prior = GaussianPrior::standard(2);
        let normal = unit_normal(2);
        let proposal = SupportedGaussian::new(&normal, &prior, 10, 0);
        let chain = MHMarkovChain::new(standard_target(), proposal, &[0.0, 0.0]);
        assert_eq!(chain.acceptance_rate(), 0.0);
    }
}
