//! CART regression tree (MSE criterion)
//!
//! Nodes live in a flat arena so that a fully grown tree never recurses,
//! neither while building nor while (de)serializing the artifact.

use rand::seq::index::sample;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Gains smaller than this are treated as no improvement
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Growth limits of a single tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split (`<=` feature count)
    pub max_features: usize,
}

/// A fitted regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct Candidate {
    feature: usize,
    threshold: f64,
    sse: f64,
}

impl RegressionTree {
    /// Grow a tree over the rows in `rows` (duplicates allowed for
    /// bootstrap samples). `x` is row-major: `x[row][feature]`.
    pub(crate) fn grow<R: Rng>(
        x: &ndarray::Array2<f64>,
        y: &[f64],
        rows: Vec<usize>,
        params: TreeParams,
        rng: &mut R,
    ) -> Self {
        let n_features = x.ncols();
        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let mut pending = vec![(0usize, rows, 0usize)];

        while let Some((slot, rows, depth)) = pending.pop() {
            let value = mean(y, &rows);

            let can_split = rows.len() >= params.min_samples_split
                && rows.len() >= 2 * params.min_samples_leaf
                && params.max_depth.map_or(true, |max| depth < max);

            let split = if can_split {
                let features = sample(rng, n_features, params.max_features.clamp(1, n_features));
                best_split(x, y, &rows, features.iter(), params.min_samples_leaf)
            } else {
                None
            };

            let Some(best) = split else {
                nodes[slot] = Node::Leaf { value };
                continue;
            };

            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                .iter()
                .partition(|&&row| x[[row, best.feature]] <= best.threshold);

            let left = nodes.len();
            let right = left + 1;
            nodes.push(Node::Leaf { value: 0.0 });
            nodes.push(Node::Leaf { value: 0.0 });
            nodes[slot] = Node::Split {
                feature: best.feature,
                threshold: best.threshold,
                left,
                right,
            };

            pending.push((right, right_rows, depth + 1));
            pending.push((left, left_rows, depth + 1));
        }

        Self { nodes }
    }

    /// Predict a single row given in feature order.
    #[must_use]
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match self.nodes.get(index) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    index = if row[*feature] <= *threshold { *left } else { *right };
                }
                None => return f64::NAN,
            }
        }
    }

    /// Number of nodes (leaves and splits).
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Longest root-to-leaf path, in edges.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((index, depth)) = stack.pop() {
            match self.nodes.get(index) {
                Some(Node::Split { left, right, .. }) => {
                    stack.push((*left, depth + 1));
                    stack.push((*right, depth + 1));
                }
                Some(Node::Leaf { .. }) => deepest = deepest.max(depth),
                None => {}
            }
        }
        deepest
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(y: &[f64], rows: &[usize]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    rows.iter().map(|&row| y[row]).sum::<f64>() / rows.len() as f64
}

/// Sum of squared errors around the mean, from running sums.
#[allow(clippy::cast_precision_loss)]
fn sse(count: usize, sum: f64, sum_sq: f64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    (sum_sq - sum * sum / count as f64).max(0.0)
}

/// Best threshold over the given features by a sorted sweep.
fn best_split(
    x: &ndarray::Array2<f64>,
    y: &[f64],
    rows: &[usize],
    features: impl Iterator<Item = usize>,
    min_leaf: usize,
) -> Option<Candidate> {
    let total_sum: f64 = rows.iter().map(|&row| y[row]).sum();
    let total_sq: f64 = rows.iter().map(|&row| y[row] * y[row]).sum();
    let parent_sse = sse(rows.len(), total_sum, total_sq);
    if parent_sse <= MIN_GAIN {
        return None;
    }

    let min_leaf = min_leaf.max(1);
    let mut best: Option<Candidate> = None;
    let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(rows.len());

    for feature in features {
        pairs.clear();
        pairs.extend(rows.iter().map(|&row| (x[[row, feature]], y[row])));
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for i in 0..pairs.len() - 1 {
            let (value, target) = pairs[i];
            left_sum += target;
            left_sq += target * target;

            let left_count = i + 1;
            let right_count = pairs.len() - left_count;
            let next = pairs[i + 1].0;
            if value >= next || left_count < min_leaf || right_count < min_leaf {
                continue;
            }

            let split_sse = sse(left_count, left_sum, left_sq)
                + sse(right_count, total_sum - left_sum, total_sq - left_sq);
            if parent_sse - split_sse <= MIN_GAIN {
                continue;
            }
            if best.as_ref().map_or(true, |b| split_sse < b.sse) {
                let midpoint = value + (next - value) / 2.0;
                // Adjacent floats can round the midpoint up to `next`
                let threshold = if midpoint < next { midpoint } else { value };
                best = Some(Candidate {
                    feature,
                    threshold,
                    sse: split_sse,
                });
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn params() -> TreeParams {
        TreeParams {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 1,
        }
    }

    #[test]
    fn test_step_function_is_learned_exactly() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = [0.0, 0.0, 0.0, 5.0, 5.0, 5.0];
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let tree = RegressionTree::grow(&x, &y, (0..6).collect(), params(), &mut rng);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict_row(&[2.5]), 0.0);
        assert_eq!(tree.predict_row(&[11.5]), 5.0);
        assert_eq!(tree.predict_row(&[6.0]), 0.0);
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = [4.0, 4.0, 4.0];
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let tree = RegressionTree::grow(&x, &y, vec![0, 1, 2], params(), &mut rng);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict_row(&[100.0]), 4.0);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0]];
        let y = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let limited = TreeParams {
            max_depth: Some(2),
            ..params()
        };
        let tree = RegressionTree::grow(&x, &y, (0..8).collect(), limited, &mut rng);
        assert_eq!(tree.depth(), 2);
    }

    #[test]
    fn test_min_samples_leaf_is_respected() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = [0.0, 0.0, 0.0, 9.0];
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let strict = TreeParams {
            min_samples_leaf: 2,
            ..params()
        };
        let tree = RegressionTree::grow(&x, &y, (0..4).collect(), strict, &mut rng);
        // The only 2/2 split puts 9.0 with a 0.0
        assert_eq!(tree.predict_row(&[4.0]), 4.5);
    }

    #[test]
    fn test_duplicate_feature_values_never_split_between_equals() {
        let x = array![[1.0], [1.0], [1.0], [2.0]];
        let y = [0.0, 1.0, 2.0, 3.0];
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let tree = RegressionTree::grow(&x, &y, (0..4).collect(), params(), &mut rng);
        assert_eq!(tree.predict_row(&[1.0]), 1.0);
        assert_eq!(tree.predict_row(&[2.0]), 3.0);
    }
}
