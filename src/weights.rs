//! Importance weights of one tempering step and the matching log-evidence increment.

use ndarray::Array1;

use crate::error::Result;
use crate::schedule::{incremental_weights, max_log_likelihood};
use crate::stats::effective_sample_size;

/// The weights that carry a population from `beta` to `beta_next`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportanceWeights {
    /// `exp((β' - β)(Lᵢ - Lmax))`.
    pub unnormalized: Array1<f64>,
    /// The unnormalized weights divided by their sum.
    pub normalized: Array1<f64>,
    /// `log(Σw / N) + (β' - β) Lmax`.
    pub log_evidence_increment: f64,
}

impl ImportanceWeights {
    /**
    Computes the weights in log-space, shifting by the largest log-likelihood before
    exponentiating so that neither very large nor very small likelihoods overflow.

    # Examples

    ```rust
    use mini_tmcmc::weights::ImportanceWeights;
    use ndarray::arr1;

    // Half the population has likelihood 1, the other half likelihood e^-1000.
    let ll = arr1(&[0.0, -1000.0, 0.0, -1000.0]);
    let w = ImportanceWeights::new(0.0, 1.0, &ll).unwrap();
    assert!((w.normalized.sum() - 1.0).abs() < 1e-12);
    assert!((w.log_evidence_increment - 0.5_f64.ln()).abs() < 1e-12);
    ```
    */
    pub fn new(beta: f64, beta_next: f64, log_likelihoods: &Array1<f64>) -> Result<Self> {
        let l_max = max_log_likelihood(log_likelihoods)?;
        let delta = beta_next - beta;
        let unnormalized = incremental_weights(delta, &log_likelihoods.mapv(|l| l - l_max));
        let total = unnormalized.sum();
        let normalized = &unnormalized / total;
        let n = log_likelihoods.len() as f64;
        Ok(Self {
            unnormalized,
            normalized,
            log_evidence_increment: (total / n).ln() + delta * l_max,
        })
    }

    /// Effective sample size `1 / Σ wnᵢ²` of the normalized weights.
    pub fn ess(&self) -> f64 {
        effective_sample_size(&self.normalized)
    }
}
