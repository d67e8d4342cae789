//! Property-based tests for the split and metric invariants
//!
//! - Split partitions are disjoint, exhaustive, and reproducible
//! - Metric identities hold for arbitrary inputs
//! - Run with `ProptestConfig::with_cases(100)`

use housing_mlops::metrics::{mean_absolute_error, r2_score, root_mean_squared_error};
use housing_mlops::split::{permutation, split, test_row_count};
use housing_mlops::storage::Table;
use proptest::prelude::*;
use std::collections::HashSet;

// ============================================================================
// Strategies
// ============================================================================

/// Table with an `id` column equal to the row index plus a target column
fn arb_dataset() -> impl Strategy<Value = Table> {
    (2usize..200).prop_flat_map(|rows| {
        proptest::collection::vec(-1000.0f64..1000.0, rows).prop_map(move |target| {
            #[allow(clippy::cast_precision_loss)]
            let ids: Vec<f64> = (0..rows).map(|i| i as f64).collect();
            Table::from_columns(vec![("id", ids), ("target", target)]).unwrap()
        })
    })
}

fn arb_test_size() -> impl Strategy<Value = f64> {
    0.01f64..0.99
}

fn arb_pairs() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    (1usize..100).prop_flat_map(|n| {
        (
            proptest::collection::vec(-100.0f64..100.0, n),
            proptest::collection::vec(-100.0f64..100.0, n),
        )
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: train and test partition the rows, both non-empty
    #[test]
    fn prop_split_is_a_partition(
        dataset in arb_dataset(),
        test_size in arb_test_size(),
        seed in any::<i64>()
    ) {
        let n = dataset.num_rows();
        let result = split(&dataset, "target", test_size, seed).unwrap();

        let train: Vec<f64> = result.train_features.column("id").unwrap().to_vec();
        let test: Vec<f64> = result.test_features.column("id").unwrap().to_vec();
        prop_assert!(!train.is_empty());
        prop_assert!(!test.is_empty());
        prop_assert_eq!(train.len() + test.len(), n);
        prop_assert_eq!(test.len(), test_row_count(n, test_size));

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let seen: HashSet<usize> = train.iter().chain(&test).map(|&id| id as usize).collect();
        prop_assert_eq!(seen.len(), n);
    }

    /// Property: features and target stay aligned row by row
    #[test]
    fn prop_split_keeps_rows_aligned(
        dataset in arb_dataset(),
        test_size in arb_test_size(),
        seed in any::<i64>()
    ) {
        let result = split(&dataset, "target", test_size, seed).unwrap();
        let original = dataset.column("target").unwrap();

        for (features, target) in [
            (&result.train_features, &result.train_target),
            (&result.test_features, &result.test_target),
        ] {
            let ids = features.column("id").unwrap();
            let values = target.column("target").unwrap();
            for (&id, &value) in ids.iter().zip(values) {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let row = id as usize;
                prop_assert_eq!(original[row].to_bits(), value.to_bits());
            }
        }
    }

    /// Property: same seed, same split
    #[test]
    fn prop_split_is_reproducible(
        dataset in arb_dataset(),
        test_size in arb_test_size(),
        seed in any::<i64>()
    ) {
        let first = split(&dataset, "target", test_size, seed).unwrap();
        let second = split(&dataset, "target", test_size, seed).unwrap();
        prop_assert_eq!(first.train_rows(), second.train_rows());
        prop_assert_eq!(first.test_rows(), second.test_rows());
        prop_assert_eq!(first, second);
    }

    /// Property: a permutation holds every index exactly once
    #[test]
    fn prop_permutation_is_bijective(n in 0usize..500, seed in any::<i64>()) {
        let mut order = permutation(n, seed);
        order.sort_unstable();
        prop_assert_eq!(order, (0..n).collect::<Vec<_>>());
    }

    /// Property: MAE is non-negative and never exceeds RMSE
    #[test]
    fn prop_mae_bounded_by_rmse((y_true, y_pred) in arb_pairs()) {
        let mae = mean_absolute_error(&y_true, &y_pred).unwrap();
        let rmse = root_mean_squared_error(&y_true, &y_pred).unwrap();
        prop_assert!(mae >= 0.0);
        prop_assert!(mae <= rmse + 1e-9);
    }

    /// Property: perfect predictions score zero error
    #[test]
    fn prop_perfect_prediction((y_true, _) in arb_pairs()) {
        prop_assert_eq!(mean_absolute_error(&y_true, &y_true).unwrap(), 0.0);
        prop_assert_eq!(root_mean_squared_error(&y_true, &y_true).unwrap(), 0.0);
        let r2 = r2_score(&y_true, &y_true).unwrap();
        prop_assert!(r2 == 1.0 || r2 == 0.0);
    }

    /// Property: R² never exceeds one
    #[test]
    fn prop_r2_at_most_one((y_true, y_pred) in arb_pairs()) {
        prop_assert!(r2_score(&y_true, &y_pred).unwrap() <= 1.0 + 1e-12);
    }
}
