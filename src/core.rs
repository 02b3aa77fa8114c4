//! The single-chain abstraction used by the refinement step, and a helper that
//! drives a chain for a fixed number of steps.

use crate::error::Result;

pub trait MarkovChain<T> {
    /// Does one iteration of the chain, returning the new current state.
    fn step(&mut self) -> Result<&Vec<T>>;

    /// Returns the current state without stepping.
    fn current_state(&self) -> &Vec<T>;
}

/**
Advances `chain` by `n_steps` and returns only the final state.

This is the contract the TMCMC refinement step relies on: every intermediate state is
discarded, so burn-in and thinning reduce to choosing the chain length.

# Examples

```rust
use mini_tmcmc::core::advance;
use mini_tmcmc::distributions::{GaussianPrior, MultivariateNormal};
use mini_tmcmc::metropolis_hastings::MHMarkovChain;
use mini_tmcmc::tempered::{SupportedGaussian, TemperedTarget};
use ndarray::arr2;

let prior = GaussianPrior::standard(2);
let likelihood = |theta: &[f64]| -theta[0].abs();
let normal = MultivariateNormal::new(&arr2(&[[0.25, 0.0], [0.0, 0.25]])).unwrap();

let target = TemperedTarget::new(0.5, &likelihood, &prior);
let proposal = SupportedGaussian::new(&normal, &prior, 100, 1);
let mut chain = MHMarkovChain::new(target, proposal, &[0.0, 0.0]).set_seed(2);
let last = advance(&mut chain, 23).unwrap();
assert_eq!(last.len(), 2);
```
*/
pub fn advance<T, M>(chain: &mut M, n_steps: usize) -> Result<Vec<T>>
where
    M: MarkovChain<T>,
    T: Clone,
{
    for _ in 0..n_steps {
        chain.step()?;
    }
    Ok(chain.current_state().clone())
}
