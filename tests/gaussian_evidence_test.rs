//! End-to-end checks of the TMCMC sampler on Gaussian models whose evidence and
//! posterior moments are known in closed form.

use approx::assert_abs_diff_eq;
use mini_tmcmc::distributions::{Gaussian2D, GaussianPrior, UniformPrior};
use mini_tmcmc::tmcmc::Tmcmc;
use ndarray::{arr1, arr2, Axis};
use ndarray_stats::CorrelationExt;
use std::f64::consts::PI;

#[cfg(test)]
mod tests {
    use super::*;

    fn gaussian_likelihood(mean: [f64; 2], var: f64) -> Gaussian2D<f64> {
        Gaussian2D {
            mean: arr1(&mean),
            cov: arr2(&[[var, 0.0], [0.0, var]]),
        }
    }

    /// A flat likelihood leaves the prior untouched: the evidence is exactly one and
    /// the samples still follow the prior.
    #[test]
    fn flat_likelihood_returns_the_prior() {
        const N: usize = 4_000;
        let result = Tmcmc::new(|_: &[f64]| 0.0, GaussianPrior::standard(2), N)
            .set_seed(42)
            .run()
            .unwrap();

        assert_eq!(result.stages.len(), 1);
        assert_eq!(result.log_evidence, 0.0);

        let mean = result.samples.mean_axis(Axis(0)).unwrap();
        let cov = result.samples.t().cov(1.0).unwrap();
        assert_abs_diff_eq!(mean, arr1(&[0.0, 0.0]), epsilon = 0.1);
        assert_abs_diff_eq!(cov, arr2(&[[1.0, 0.0], [0.0, 1.0]]), epsilon = 0.15);
    }

    /// Prior N(0, I) and likelihood N(x; 0, I): the evidence is N(0; 0, 2I) = 1 / (4π)
    /// and the posterior is N(0, I / 2).
    fn run_standard_normal_test(n: usize, seed: u64, rel_tol: f64) {
        let expected = -(4.0 * PI).ln();
        let result = Tmcmc::new(gaussian_likelihood([0.0, 0.0], 1.0), GaussianPrior::standard(2), n)
            .set_seed(seed)
            .run()
            .unwrap();

        let rel_err = ((result.log_evidence - expected) / expected).abs();
        assert!(
            rel_err < rel_tol,
            "log-evidence {} vs expected {expected} (relative error {rel_err})",
            result.log_evidence
        );

        let cov = result.samples.t().cov(1.0).unwrap();
        assert_abs_diff_eq!(cov, arr2(&[[0.5, 0.0], [0.0, 0.5]]), epsilon = 0.15);
    }

    #[test]
    fn standard_normal_evidence() {
        run_standard_normal_test(2_000, 7, 0.1);
    }

    #[test]
    #[ignore = "Slow test: run only when explicitly requested"]
    fn standard_normal_evidence_large_population() {
        run_standard_normal_test(10_000, 7, 0.03);
    }

    /// A narrow Gaussian likelihood well inside a uniform box: the evidence is the
    /// inverse box volume, and the posterior is the likelihood itself.
    #[test]
    fn uniform_prior_narrow_likelihood() {
        let prior = UniformPrior::new(arr1(&[-5.0, -5.0]), arr1(&[5.0, 5.0])).unwrap();
        let result = Tmcmc::new(gaussian_likelihood([1.0, -1.0], 0.25), prior.clone(), 3_000)
            .set_seed(123)
            .run()
            .unwrap();

        assert_abs_diff_eq!(result.log_evidence, -(100.0_f64).ln(), epsilon = 0.3);

        let mean = result.samples.mean_axis(Axis(0)).unwrap();
        assert_abs_diff_eq!(mean, arr1(&[1.0, -1.0]), epsilon = 0.1);
        assert!(result
            .samples
            .rows()
            .into_iter()
            .all(|row| prior.contains(&row.to_vec())));

        let betas = result.betas();
        assert!(betas.len() > 2, "a peaked likelihood needs several stages");
        assert!(betas.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*betas.last().unwrap(), 1.0);
    }

    #[test]
    fn runs_are_reproducible() {
        let run = |seed: u64| {
            Tmcmc::new(gaussian_likelihood([0.5, 0.5], 0.5), GaussianPrior::standard(2), 300)
                .set_seed(seed)
                .run()
                .unwrap()
        };
        let a = run(99);
        let b = run(99);
        let c = run(100);
        assert_eq!(a.samples, b.samples);
        assert_eq!(a.log_evidence, b.log_evidence);
        assert_eq!(a.stages, b.stages);
        assert_ne!(a.samples, c.samples);
    }

    #[test]
    fn progress_run_matches_plain_run() {
        let sampler = Tmcmc::new(gaussian_likelihood([0.0, 0.0], 1.0), GaussianPrior::standard(2), 200)
            .set_seed(5);
        let plain = sampler.run().unwrap();
        let with_progress = sampler.run_progress().unwrap();
        assert_eq!(plain, with_progress);
    }
}
