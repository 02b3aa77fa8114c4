//! Multinomial resampling of a weighted population.

use ndarray::{Array1, Array2, Axis};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::error::{Result, TmcmcError};

/// Draws `n` indices with replacement, index `i` having probability proportional to
/// `weights[i]`.
pub fn resample_indices<R>(weights: &Array1<f64>, n: usize, rng: &mut R) -> Result<Vec<usize>>
where
    R: Rng + ?Sized,
{
    let dist = WeightedIndex::new(weights.iter())?;
    Ok((0..n).map(|_| dist.sample(&mut *rng)).collect())
}

/**
Builds a new population of the same size by drawing rows of `theta` with replacement
according to `weights`. High-weight rows tend to appear several times.

# Examples

```rust
use mini_tmcmc::resample::resample;
use ndarray::{arr1, arr2};
use rand::rngs::SmallRng;
use rand::SeedableRng;

let theta = arr2(&[[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]]);
let weights = arr1(&[0.0, 1.0, 0.0]);
let mut rng = SmallRng::seed_from_u64(0);
let seeds = resample(&theta, &weights, &mut rng).unwrap();
assert_eq!(seeds, arr2(&[[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]]));
```
*/
pub fn resample<R>(theta: &Array2<f64>, weights: &Array1<f64>, rng: &mut R) -> Result<Array2<f64>>
where
    R: Rng + ?Sized,
{
    if theta.nrows() != weights.len() {
        return Err(TmcmcError::DimensionMismatch {
            expected: theta.nrows(),
            got: weights.len(),
        });
    }
    let indices = resample_indices(weights, theta.nrows(), rng)?;
    Ok(theta.select(Axis(0), &indices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn concentrated_weights_copy_one_row() {
        let theta = Array2::from_shape_fn((50, 3), |(i, j)| (i * 10 + j) as f64);
        let mut weights = Array1::zeros(50);
        weights[17] = 1.0;
        let mut rng = SmallRng::seed_from_u64(5);
        let seeds = resample(&theta, &weights, &mut rng).unwrap();
        assert_eq!(seeds.dim(), (50, 3));
        for row in seeds.rows() {
            assert_eq!(row, theta.row(17));
        }
    }

    #[test]
    fn frequencies_follow_weights() {
        let weights = arr1(&[0.1, 0.2, 0.7]);
        let mut rng = SmallRng::seed_from_u64(42);
        let n = 100_000;
        let indices = resample_indices(&weights, n, &mut rng).unwrap();
        let mut counts = [0usize; 3];
        indices.iter().for_each(|&i| counts[i] += 1);
        for (count, w) in counts.iter().zip(weights.iter()) {
            assert!((*count as f64 / n as f64 - w).abs() < 0.01);
        }
    }

    #[test]
    fn same_seed_same_draws() {
        let weights = arr1(&[0.25, 0.25, 0.5]);
        let a = resample_indices(&weights, 20, &mut SmallRng::seed_from_u64(1)).unwrap();
        let b = resample_indices(&weights, 20, &mut SmallRng::seed_from_u64(1)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn degenerate_weights_are_rejected() {
        let theta = Array2::<f64>::zeros((2, 1));
        let mut rng = SmallRng::seed_from_u64(0);
        assert!(matches!(
            resample(&theta, &arr1(&[0.0, 0.0]), &mut rng),
            Err(TmcmcError::Weights(_))
        ));
        assert!(matches!(
            resample(&theta, &arr1(&[1.0]), &mut rng),
            Err(TmcmcError::DimensionMismatch { .. })
        ));
    }
}
