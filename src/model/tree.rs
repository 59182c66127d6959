//! Regression trees grown on gradient statistics
//!
//! Exact greedy split search over sorted feature values with the regularised gain
//! used by XGBoost's squared-error objective.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::gbdt::BoosterParams;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        weight: f64,
    },
}

/// A single fitted tree; leaf weights already include the learning rate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

/// Borrowed training inputs for one boosting round
pub(crate) struct GradientTable<'a> {
    pub features: &'a [Vec<f64>],
    pub grad: &'a [f64],
    pub hess: &'a [f64],
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl RegressionTree {
    pub(crate) fn grow(table: &GradientTable<'_>, rows: &[usize], params: &BoosterParams) -> Self {
        let mut nodes = Vec::new();
        build_node(table, rows, params, 0, &mut nodes);
        RegressionTree { nodes }
    }

    pub fn predict(&self, sample: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { weight } => return *weight,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    // NaN compares false and follows the right branch, as in training
                    idx = if sample[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, TreeNode::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match &nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }
        walk(&self.nodes, 0)
    }
}

/// L1 soft-thresholding of a gradient sum
fn thresholded(g: f64, alpha: f64) -> f64 {
    if g > alpha {
        g - alpha
    } else if g < -alpha {
        g + alpha
    } else {
        0.0
    }
}

fn structure_score(g: f64, h: f64, params: &BoosterParams) -> f64 {
    let t = thresholded(g, params.reg_alpha);
    t * t / (h + params.reg_lambda)
}

fn leaf_weight(g: f64, h: f64, params: &BoosterParams) -> f64 {
    let denom = h + params.reg_lambda;
    if denom <= 0.0 {
        return 0.0;
    }
    -thresholded(g, params.reg_alpha) / denom * params.learning_rate
}

fn build_node(
    table: &GradientTable<'_>,
    rows: &[usize],
    params: &BoosterParams,
    depth: usize,
    nodes: &mut Vec<TreeNode>,
) -> usize {
    let g: f64 = rows.iter().map(|&i| table.grad[i]).sum();
    let h: f64 = rows.iter().map(|&i| table.hess[i]).sum();

    let split = if depth < params.max_depth && rows.len() >= 2 {
        best_split(table, rows, g, h, params)
    } else {
        None
    };

    let Some(split) = split else {
        let idx = nodes.len();
        nodes.push(TreeNode::Leaf {
            weight: leaf_weight(g, h, params),
        });
        return idx;
    };

    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
        .iter()
        .copied()
        .partition(|&i| table.features[i][split.feature] <= split.threshold);

    let idx = nodes.len();
    nodes.push(TreeNode::Leaf { weight: 0.0 }); // placeholder

    let left = build_node(table, &left_rows, params, depth + 1, nodes);
    let right = build_node(table, &right_rows, params, depth + 1, nodes);

    nodes[idx] = TreeNode::Split {
        feature: split.feature,
        threshold: split.threshold,
        left,
        right,
    };
    idx
}

fn best_split(
    table: &GradientTable<'_>,
    rows: &[usize],
    g_total: f64,
    h_total: f64,
    params: &BoosterParams,
) -> Option<SplitCandidate> {
    let parent = structure_score(g_total, h_total, params);
    let n_features = table.features[rows[0]].len();
    let mut best: Option<SplitCandidate> = None;

    let mut order: Vec<usize> = rows.to_vec();
    for feature in 0..n_features {
        order.sort_by(|&a, &b| {
            table.features[a][feature]
                .partial_cmp(&table.features[b][feature])
                .unwrap_or_else(|| {
                    // NaN sorts after every number
                    table.features[a][feature]
                        .is_nan()
                        .cmp(&table.features[b][feature].is_nan())
                })
        });

        let mut g_left = 0.0;
        let mut h_left = 0.0;
        for pos in 0..order.len() - 1 {
            let row = order[pos];
            g_left += table.grad[row];
            h_left += table.hess[row];

            let value = table.features[row][feature];
            let next = table.features[order[pos + 1]][feature];
            if value.is_nan() || next.is_nan() || value.partial_cmp(&next) != Some(Ordering::Less) {
                continue;
            }

            let g_right = g_total - g_left;
            let h_right = h_total - h_left;
            if h_left < params.min_child_weight || h_right < params.min_child_weight {
                continue;
            }

            let gain = 0.5
                * (structure_score(g_left, h_left, params) + structure_score(g_right, h_right, params)
                    - parent)
                - params.gamma;

            if gain > 0.0 && best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: value + (next - value) / 2.0,
                    gain,
                });
            }
        }
    }

    best
}
