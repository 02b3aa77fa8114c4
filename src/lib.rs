//! # Mini TMCMC
//!
//! **Transitional Markov Chain Monte Carlo** in Rust: draws samples from a Bayesian
//! posterior that is only known up to a constant, and estimates the model evidence
//! (marginal likelihood) along the way.
//!
//! The sampler moves a population from the prior to the posterior through tempered
//! distributions `L(θ)^β p(θ)`. The step in `β` is chosen adaptively from the spread of
//! the importance weights, the population is resampled by weight, and every resampled
//! point is refined with a short Metropolis–Hastings chain. Likelihood evaluation and
//! chain refinement run in parallel on a rayon thread pool.
//!
//! ## Getting Started
//!
//! You need to provide:
//! - a log-likelihood, any type implementing [`distributions::LogLikelihood`]
//!   (closures `Fn(&[f64]) -> f64` do);
//! - a prior implementing [`distributions::Prior`], e.g.
//!   [`distributions::GaussianPrior`], [`distributions::UniformPrior`] or a pair of
//!   closures wrapped in [`distributions::FnPrior`].
//!
//! ```rust
//! use mini_tmcmc::distributions::GaussianPrior;
//! use mini_tmcmc::tmcmc::Tmcmc;
//!
//! // Two observations y = [0.8, 1.2] with unit noise and a standard normal prior on the mean.
//! let data = [0.8, 1.2];
//! let likelihood = move |theta: &[f64]| {
//!     data.iter()
//!         .map(|y| -0.5 * (y - theta[0]).powi(2) - 0.5 * (2.0 * std::f64::consts::PI).ln())
//!         .sum::<f64>()
//! };
//!
//! let result = Tmcmc::new(likelihood, GaussianPrior::standard(1), 1_000)
//!     .set_seed(42)
//!     .run()
//!     .unwrap();
//!
//! let mean = result.samples.mean().unwrap();
//! println!("posterior mean ≈ {mean:.3} (exact: 0.667)");
//! println!("log-evidence ≈ {:.3} over {} stages", result.log_evidence, result.stages.len());
//! ```
//!
//! ## Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `csv`   | [`io`] helpers to save the final population and the stage trace as CSV |
//!
//! ## Logging
//!
//! Runs emit [`tracing`] events: `info` at the start and end of a run, `debug` once
//! per stage, `warn` when the proposal covariance needed diagonal jitter. Install any
//! `tracing` subscriber to see them. [`tmcmc::Tmcmc::run_progress`] additionally
//! shows an `indicatif` progress bar.

pub mod core;
pub mod distributions;
pub mod error;
#[cfg(feature = "csv")]
pub mod io;
pub mod metropolis_hastings;
pub mod pool;
pub mod resample;
pub mod schedule;
pub mod stats;
pub mod tempered;
pub mod tmcmc;
pub mod weights;

pub use error::{Result, TmcmcError};
pub use tmcmc::{run_tmcmc, StageInfo, Tmcmc, TmcmcResult};
