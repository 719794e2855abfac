//! Seeded holdout split.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::error::{RegshipError, Result};

/// Row indices of the training and test partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n_rows` with a seeded RNG and hold out `ceil(n * test_fraction)`
/// rows for testing. The same seed always yields the same partition.
pub fn train_test_split(n_rows: usize, test_fraction: f64, seed: u64) -> Result<SplitIndices> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(RegshipError::Validation(format!(
            "test fraction must be between 0 and 1, got {test_fraction}"
        )));
    }

    // Tolerance keeps 30 * 0.2 at 6 rather than 7.
    let n_test = (n_rows as f64 * test_fraction - 1e-9).ceil() as usize;
    let n_train = n_rows.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(RegshipError::Dataset(format!(
            "{n_rows} rows cannot be split with test fraction {test_fraction}: \
             both partitions need at least one row"
        )));
    }

    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok(SplitIndices {
        train,
        test: indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn eighty_twenty_partition_covers_every_row_once() {
        let split = train_test_split(10, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.train.len(), 8);

        let all: HashSet<usize> = split.train.iter().chain(&split.test).copied().collect();
        assert_eq!(all.len(), 10);
    }

    #[test]
    fn test_size_rounds_up() {
        let split = train_test_split(11, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 3);
        assert_eq!(split.train.len(), 8);

        let split = train_test_split(30, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 6);
    }

    #[test]
    fn same_seed_same_partition() {
        assert_eq!(
            train_test_split(50, 0.2, 42).unwrap(),
            train_test_split(50, 0.2, 42).unwrap()
        );
    }

    #[test]
    fn single_row_cannot_be_split() {
        assert!(matches!(
            train_test_split(1, 0.2, 42),
            Err(RegshipError::Dataset(_))
        ));
        assert!(matches!(
            train_test_split(0, 0.2, 42),
            Err(RegshipError::Dataset(_))
        ));
    }

    #[test]
    fn fraction_out_of_range_is_rejected() {
        assert!(matches!(
            train_test_split(10, 0.0, 42),
            Err(RegshipError::Validation(_))
        ));
    }
}
