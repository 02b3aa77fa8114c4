/*!
# Transitional Markov Chain Monte Carlo

Samples a Bayesian posterior `p(θ | data) ∝ L(θ) p(θ)` and estimates the model
evidence `∫ L(θ) p(θ) dθ` by moving a population of `N` points through the tempered
distributions `L(θ)^β p(θ)`, from `β = 0` (the prior) to `β = 1` (the posterior).

Every stage runs the same five steps:

1. evaluate the log-likelihood of every point, in parallel;
2. pick the next `β'` so that the incremental importance weights have a coefficient of
   variation of one ([`crate::schedule::next_beta`]);
3. normalize the weights and add the stage's contribution to the log-evidence
   ([`crate::weights::ImportanceWeights`]);
4. build the proposal covariance from the weighted population
   ([`crate::stats::weighted_covariance`]);
5. resample the population by weight ([`crate::resample::resample`]) and move every
   resampled point with a short Metropolis–Hastings chain targeting
   `β' log L(θ) + log p(θ)`, in parallel.

The run ends once `β` reaches exactly 1.

## Reproducibility

A single seed drives everything: the prior draws, the resampling and, through seeds
drawn before each parallel phase, every chain. Results therefore do not depend on the
number of worker threads.

## Example

```rust
use mini_tmcmc::distributions::GaussianPrior;
use mini_tmcmc::tmcmc::Tmcmc;

// Standard normal prior, Gaussian likelihood centred at 1 with unit variance.
let prior = GaussianPrior::standard(1);
let likelihood = |theta: &[f64]| {
    -0.5 * (theta[0] - 1.0).powi(2) - 0.5 * (2.0 * std::f64::consts::PI).ln()
};

let result = Tmcmc::new(likelihood, prior, 500)
    .set_seed(42)
    .run()
    .unwrap();

assert_eq!(result.samples.dim(), (500, 1));
assert_eq!(*result.betas().last().unwrap(), 1.0);
println!("log-evidence: {}", result.log_evidence);
```
*/

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array1, Array2};
use rand::prelude::*;

use crate::core::advance;
use crate::distributions::{FnPrior, LogLikelihood, MultivariateNormal, Prior};
use crate::error::{Result, TmcmcError};
use crate::metropolis_hastings::MHMarkovChain;
use crate::pool::WorkerPool;
use crate::resample::resample;
use crate::schedule::{next_beta, DEFAULT_BISECTION_TOL, DEFAULT_TARGET_COV};
use crate::stats::{weighted_covariance, DEFAULT_PROPOSAL_SCALE};
use crate::tempered::{SupportedGaussian, TemperedTarget, DEFAULT_MAX_PROPOSAL_RETRIES};
use crate::weights::ImportanceWeights;

pub const DEFAULT_BURNIN: usize = 20;
pub const DEFAULT_THIN: usize = 3;

/// Resolution of the progress bar, which tracks `β`.
const PROGRESS_STEPS: u64 = 1_000;

/// Diagnostics recorded for one stage of the tempering schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct StageInfo {
    /// Zero-based stage counter.
    pub stage: usize,
    /// Tempering coefficient at the start of the stage.
    pub beta: f64,
    /// Tempering coefficient the population was moved to.
    pub beta_next: f64,
    /// Contribution of this stage to the log-evidence.
    pub log_evidence_increment: f64,
    /// Effective sample size of the normalized weights.
    pub ess: f64,
    /// Mean acceptance rate of the refinement chains.
    pub acceptance_rate: f64,
}

/// The outcome of a TMCMC run.
#[derive(Debug, Clone, PartialEq)]
pub struct TmcmcResult {
    /// Final population, one posterior sample per row.
    pub samples: Array2<f64>,
    /// Estimate of the log marginal likelihood.
    pub log_evidence: f64,
    /// Per-stage diagnostics, in order.
    pub stages: Vec<StageInfo>,
}

impl TmcmcResult {
    /// The tempering schedule, starting at 0 and ending at 1.
    pub fn betas(&self) -> Vec<f64> {
        std::iter::once(0.0)
            .chain(self.stages.iter().map(|s| s.beta_next))
            .collect()
    }
}

/// The population after one stage, together with the stage's diagnostics.
struct Stage {
    samples: Array2<f64>,
    info: StageInfo,
}

/**
The TMCMC sampler.

Built from a log-likelihood `L`, a prior `P` and the population size, then tuned with
the consuming `set_*` methods.

# Examples

```rust
use mini_tmcmc::distributions::UniformPrior;
use mini_tmcmc::tmcmc::Tmcmc;
use ndarray::arr1;

let prior = UniformPrior::new(arr1(&[-5.0, -5.0]), arr1(&[5.0, 5.0])).unwrap();
let likelihood = |theta: &[f64]| -0.5 * theta.iter().map(|x| x * x).sum::<f64>();

let sampler = Tmcmc::new(likelihood, prior, 200)
    .set_burnin(10)
    .set_thin(2)
    .set_proposal_scale(0.04)
    .set_n_threads(2)
    .set_seed(7);
assert_eq!(sampler.seed, 7);
let result = sampler.run().unwrap();
assert_eq!(result.samples.nrows(), 200);
```
*/
#[derive(Debug, Clone)]
pub struct Tmcmc<L, P> {
    /// The model log-likelihood.
    pub likelihood: L,
    /// The prior, used both for the initial population and in every tempered target.
    pub prior: P,
    /// Population size `N`.
    pub n_samples: usize,
    /// Chain steps discarded before the thinning window.
    pub burnin: usize,
    /// Length of the thinning window; each chain runs `burnin + thin` steps.
    pub thin: usize,
    /// Factor applied to the weighted population covariance.
    pub proposal_scale: f64,
    /// Cap on the draws spent looking for a proposal inside the prior support.
    pub max_proposal_retries: usize,
    /// Target coefficient of variation of the incremental weights.
    pub target_cov: f64,
    /// Relative tolerance of the tempering bisection.
    pub bisection_tol: f64,
    /// Worker threads; `None` uses one per logical CPU.
    pub n_threads: Option<usize>,
    /// Optional cap on the number of stages.
    pub max_stages: Option<usize>,
    /// Seed of the coordinating random stream.
    pub seed: u64,
}

impl<L, P> Tmcmc<L, P>
where
    L: LogLikelihood + Sync,
    P: Prior + Sync,
{
    /// Creates a sampler with the default tuning constants and a random seed.
    pub fn new(likelihood: L, prior: P, n_samples: usize) -> Self {
        Self {
            likelihood,
            prior,
            n_samples,
            burnin: DEFAULT_BURNIN,
            thin: DEFAULT_THIN,
            proposal_scale: DEFAULT_PROPOSAL_SCALE,
            max_proposal_retries: DEFAULT_MAX_PROPOSAL_RETRIES,
            target_cov: DEFAULT_TARGET_COV,
            bisection_tol: DEFAULT_BISECTION_TOL,
            n_threads: None,
            max_stages: None,
            seed: thread_rng().gen::<u64>(),
        }
    }

    /// Sets the seed of the coordinating stream, from which every other stream is
    /// derived.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn set_burnin(mut self, burnin: usize) -> Self {
        self.burnin = burnin;
        self
    }

    pub fn set_thin(mut self, thin: usize) -> Self {
        self.thin = thin;
        self
    }

    pub fn set_proposal_scale(mut self, proposal_scale: f64) -> Self {
        self.proposal_scale = proposal_scale;
        self
    }

    pub fn set_max_proposal_retries(mut self, max_proposal_retries: usize) -> Self {
        self.max_proposal_retries = max_proposal_retries;
        self
    }

    pub fn set_target_cov(mut self, target_cov: f64) -> Self {
        self.target_cov = target_cov;
        self
    }

    pub fn set_bisection_tol(mut self, bisection_tol: f64) -> Self {
        self.bisection_tol = bisection_tol;
        self
    }

    pub fn set_n_threads(mut self, n_threads: usize) -> Self {
        self.n_threads = Some(n_threads);
        self
    }

    pub fn set_max_stages(mut self, max_stages: usize) -> Self {
        self.max_stages = Some(max_stages);
        self
    }

    fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(TmcmcError::InvalidConfig(msg.into()));
        if self.n_samples == 0 {
            return invalid("n_samples must be positive");
        }
        if self.thin == 0 {
            return invalid("thin must be positive");
        }
        if !(self.proposal_scale.is_finite() && self.proposal_scale > 0.0) {
            return invalid("proposal_scale must be positive and finite");
        }
        if self.max_proposal_retries == 0 {
            return invalid("max_proposal_retries must be positive");
        }
        if !(self.target_cov.is_finite() && self.target_cov > 0.0) {
            return invalid("target_cov must be positive and finite");
        }
        if !(self.bisection_tol.is_finite() && self.bisection_tol > 0.0) {
            return invalid("bisection_tol must be positive and finite");
        }
        if self.n_threads == Some(0) {
            return invalid("n_threads must be positive");
        }
        Ok(())
    }

    /// Runs the sampler until the tempering coefficient reaches 1.
    pub fn run(&self) -> Result<TmcmcResult> {
        self.run_with(|_| {})
    }

    /**
    Runs the sampler while displaying a progress bar that tracks `β`.

    This method uses the [`indicatif`] crate; the bar is cleared with a final message
    once the run finishes.
    */
    pub fn run_progress(&self) -> Result<TmcmcResult> {
        let pb = ProgressBar::new(PROGRESS_STEPS);
        let style = ProgressStyle::default_bar()
            .template("{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");
        pb.set_style(style);
        pb.set_prefix("beta");

        let result = self.run_with(|info| {
            pb.set_position((info.beta_next * PROGRESS_STEPS as f64).round() as u64);
            pb.set_message(format!("stage {}", info.stage));
        });
        match &result {
            Ok(_) => pb.finish_with_message("Done!"),
            Err(_) => pb.abandon_with_message("Failed"),
        }
        result
    }

    /// Runs the sampler, calling `on_stage` after every completed stage.
    pub fn run_with<F>(&self, mut on_stage: F) -> Result<TmcmcResult>
    where
        F: FnMut(&StageInfo),
    {
        self.validate()?;
        let pool = WorkerPool::new(self.n_threads)?;
        let mut rng = SmallRng::seed_from_u64(self.seed);

        let mut samples = self.initial_population(&mut rng)?;
        let mut beta = 0.0;
        let mut log_evidence = 0.0;
        let mut stages = Vec::new();
        tracing::info!(
            n_samples = self.n_samples,
            dim = samples.ncols(),
            seed = self.seed,
            threads = pool.n_threads(),
            "starting TMCMC"
        );

        while beta < 1.0 {
            if let Some(max) = self.max_stages {
                if stages.len() >= max {
                    return Err(TmcmcError::StageLimit {
                        stages: stages.len(),
                        beta,
                    });
                }
            }

            let stage = self.stage(&pool, &mut rng, &samples, beta, stages.len())?;
            tracing::debug!(
                stage = stage.info.stage,
                beta = stage.info.beta,
                beta_next = stage.info.beta_next,
                log_evidence_increment = stage.info.log_evidence_increment,
                ess = stage.info.ess,
                acceptance_rate = stage.info.acceptance_rate,
                "stage complete"
            );
            on_stage(&stage.info);

            samples = stage.samples;
            beta = stage.info.beta_next;
            log_evidence += stage.info.log_evidence_increment;
            stages.push(stage.info);
        }

        tracing::info!(stages = stages.len(), log_evidence, "TMCMC finished");
        Ok(TmcmcResult {
            samples,
            log_evidence,
            stages,
        })
    }

    /// Draws the `β = 0` population from the prior and checks its shape.
    fn initial_population(&self, rng: &mut SmallRng) -> Result<Array2<f64>> {
        let samples = self.prior.sample(self.n_samples, rng);
        if samples.nrows() != self.n_samples {
            return Err(TmcmcError::DimensionMismatch {
                expected: self.n_samples,
                got: samples.nrows(),
            });
        }
        if samples.ncols() == 0 {
            return Err(TmcmcError::EmptyPopulation);
        }
        Ok(samples)
    }

    /// Moves `samples` from `beta` to the next tempering coefficient.
    fn stage(
        &self,
        pool: &WorkerPool,
        rng: &mut SmallRng,
        samples: &Array2<f64>,
        beta: f64,
        stage: usize,
    ) -> Result<Stage> {
        let points = rows(samples);
        let log_likelihoods =
            Array1::from(pool.map(&points, |_, x| self.likelihood.log_likelihood(x)));

        let beta_next = next_beta(beta, &log_likelihoods, self.target_cov, self.bisection_tol)?;
        let weights = ImportanceWeights::new(beta, beta_next, &log_likelihoods)?;
        let cov = weighted_covariance(samples, &weights.normalized, self.proposal_scale)?;
        let normal = MultivariateNormal::new(&cov)?;

        let seeds = resample(samples, &weights.normalized, rng)?;
        let (refined, acceptance_rate) = self.refine(pool, rng, &seeds, beta_next, &normal)?;

        Ok(Stage {
            samples: refined,
            info: StageInfo {
                stage,
                beta,
                beta_next,
                log_evidence_increment: weights.log_evidence_increment,
                ess: weights.ess(),
                acceptance_rate,
            },
        })
    }

    /// Runs one independent chain of `burnin + thin` steps from every seed row and
    /// keeps the final states. Returns the new population and the mean acceptance rate.
    fn refine(
        &self,
        pool: &WorkerPool,
        rng: &mut SmallRng,
        seeds: &Array2<f64>,
        beta: f64,
        normal: &MultivariateNormal,
    ) -> Result<(Array2<f64>, f64)> {
        let (n, dim) = seeds.dim();
        let target = TemperedTarget::new(beta, &self.likelihood, &self.prior);
        let n_steps = self.burnin + self.thin;

        // Chain seeds are drawn here, in index order, so that the outcome does not
        // depend on how the pool schedules the chains.
        let jobs: Vec<(Vec<f64>, u64, u64)> = rows(seeds)
            .into_iter()
            .map(|start| (start, rng.gen::<u64>(), rng.gen::<u64>()))
            .collect();

        let finished = pool.try_map(&jobs, |_, (start, chain_seed, proposal_seed)| {
            let proposal = SupportedGaussian::new(
                normal,
                &self.prior,
                self.max_proposal_retries,
                *proposal_seed,
            );
            let mut chain = MHMarkovChain::new(target, proposal, start).set_seed(*chain_seed);
            let last = advance(&mut chain, n_steps)?;
            Ok((last, chain.acceptance_rate()))
        })?;

        let acceptance_rate = finished.iter().map(|(_, rate)| rate).sum::<f64>() / n as f64;
        let flat: Vec<f64> = finished.into_iter().flat_map(|(x, _)| x).collect();
        let got = flat.len();
        let samples = Array2::from_shape_vec((n, dim), flat).map_err(|_| {
            TmcmcError::DimensionMismatch {
                expected: n * dim,
                got,
            }
        })?;
        Ok((samples, acceptance_rate))
    }
}

/// Copies every row of `samples` into its own vector.
fn rows(samples: &Array2<f64>) -> Vec<Vec<f64>> {
    samples.rows().into_iter().map(|row| row.to_vec()).collect()
}

/**
Runs TMCMC with closures for the model and returns the final population together with
the log-evidence estimate.

`prior_sampler(n, rng)` must return an `n × d` table of prior draws.

# Examples

```rust
use mini_tmcmc::tmcmc::run_tmcmc;
use ndarray::Array2;
use rand::Rng;

// Flat likelihood: the posterior is the prior and the evidence is exactly 1.
let (samples, log_evidence) = run_tmcmc(
    |_: &[f64]| 0.0,
    |theta: &[f64]| if (0.0..=1.0).contains(&theta[0]) { 0.0 } else { f64::NEG_INFINITY },
    |n, rng| Array2::from_shape_fn((n, 1), |_| rng.gen::<f64>()),
    100,
    20,
    3,
    0.01,
)
.unwrap();
assert_eq!(samples.dim(), (100, 1));
assert_eq!(log_evidence, 0.0);
```
*/
pub fn run_tmcmc<L, LP, PS>(
    log_likelihood: L,
    log_prior: LP,
    prior_sampler: PS,
    n_samples: usize,
    burnin: usize,
    thin: usize,
    proposal_scale: f64,
) -> Result<(Array2<f64>, f64)>
where
    L: Fn(&[f64]) -> f64 + Sync,
    LP: Fn(&[f64]) -> f64 + Sync,
    PS: Fn(usize, &mut SmallRng) -> Array2<f64> + Sync,
{
    let result = Tmcmc::new(log_likelihood, FnPrior::new(log_prior, prior_sampler), n_samples)
        .set_burnin(burnin)
        .set_thin(thin)
        .set_proposal_scale(proposal_scale)
        .run()?;
    Ok((result.samples, result.log_evidence))
}
