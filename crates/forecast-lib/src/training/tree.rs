//! Regression trees and the leaf-wise tree grower

use super::binning::BinnedMatrix;
use super::params::TrainerParams;
use serde::{Deserialize, Serialize};

/// Tree node; children are indices into the owning tree's node list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    /// Rows with `features[feature] <= threshold` go left
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Binary regression tree; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub(crate) fn from_nodes(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Leaf value reached by a feature row
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Check that every child index is in range and points forward
    pub(crate) fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(format!(
                            "node {idx} splits on feature {feature} of {n_features}"
                        ));
                    }
                    let n_nodes = self.nodes.len();
                    if *left <= idx || *right <= idx || *left >= n_nodes || *right >= n_nodes {
                        return Err(format!("node {idx} has invalid children {left}/{right}"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {idx} has a non-finite threshold"));
                    }
                }
                Node::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(format!("leaf {idx} has a non-finite value"));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Best split found for one leaf
#[derive(Debug, Clone, Copy)]
struct SplitInfo {
    feature: usize,
    bin: usize,
    gain: f64,
}

/// Open leaf waiting to be split or finalized
struct LeafCandidate {
    node: usize,
    rows: Vec<u32>,
    grad: f64,
    hess: f64,
    best: Option<SplitInfo>,
}

/// Grows one tree from gradient histograms, best-gain leaf first
pub(crate) struct TreeGrower<'a> {
    matrix: &'a BinnedMatrix,
    params: &'a TrainerParams,
    hist: Vec<(f64, f64, usize)>,
}

impl<'a> TreeGrower<'a> {
    pub(crate) fn new(matrix: &'a BinnedMatrix, params: &'a TrainerParams) -> Self {
        Self {
            matrix,
            params,
            hist: Vec::with_capacity(256),
        }
    }

    /// Grow a tree over `rows` (sorted ascending) using per-row gradients
    pub(crate) fn grow(&mut self, rows: Vec<u32>, grad_hess: &[(f64, f64)]) -> Tree {
        let (grad, hess) = sum_gradients(&rows, grad_hess);
        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let mut root = LeafCandidate {
            node: 0,
            rows,
            grad,
            hess,
            best: None,
        };
        root.best = self.find_best_split(&root, grad_hess);

        let mut open = vec![root];
        let mut n_leaves = 1;

        while n_leaves < self.params.max_leaves {
            // highest gain first, earliest node on ties
            let Some((pick, split)) = open
                .iter()
                .enumerate()
                .filter_map(|(i, c)| c.best.map(|b| (i, b, c.node)))
                .max_by(|a, b| a.1.gain.total_cmp(&b.1.gain).then(b.2.cmp(&a.2)))
                .map(|(i, b, _)| (i, b))
            else {
                break;
            };

            let leaf = open.swap_remove(pick);
            let column = self.matrix.column(split.feature);
            let (left_rows, right_rows): (Vec<u32>, Vec<u32>) = leaf
                .rows
                .iter()
                .partition(|&&r| column[r as usize] as usize <= split.bin);

            let left_node = nodes.len();
            let right_node = left_node + 1;
            nodes[leaf.node] = Node::Split {
                feature: split.feature,
                threshold: self.matrix.mapper(split.feature).threshold(split.bin),
                left: left_node,
                right: right_node,
            };
            nodes.push(Node::Leaf { value: 0.0 });
            nodes.push(Node::Leaf { value: 0.0 });

            for (node, rows) in [(left_node, left_rows), (right_node, right_rows)] {
                let (grad, hess) = sum_gradients(&rows, grad_hess);
                let mut child = LeafCandidate {
                    node,
                    rows,
                    grad,
                    hess,
                    best: None,
                };
                child.best = self.find_best_split(&child, grad_hess);
                open.push(child);
            }
            n_leaves += 1;
        }

        for leaf in &open {
            nodes[leaf.node] = Node::Leaf {
                value: self.params.leaf_value(leaf.grad, leaf.hess),
            };
        }

        Tree::from_nodes(nodes)
    }

    fn find_best_split(
        &mut self,
        leaf: &LeafCandidate,
        grad_hess: &[(f64, f64)],
    ) -> Option<SplitInfo> {
        if leaf.rows.len() < 2 * self.params.min_samples_leaf {
            return None;
        }

        let mut best: Option<SplitInfo> = None;
        for feature in 0..self.matrix.n_features() {
            let n_bins = self.matrix.mapper(feature).n_bins();
            if n_bins < 2 {
                continue;
            }

            let column = self.matrix.column(feature);
            self.hist.clear();
            self.hist.resize(n_bins, (0.0, 0.0, 0));
            for &row in &leaf.rows {
                let (g, h) = grad_hess[row as usize];
                let slot = &mut self.hist[column[row as usize] as usize];
                slot.0 += g;
                slot.1 += h;
                slot.2 += 1;
            }

            let (mut grad_left, mut hess_left, mut count_left) = (0.0, 0.0, 0usize);
            for bin in 0..n_bins - 1 {
                let (g, h, c) = self.hist[bin];
                grad_left += g;
                hess_left += h;
                count_left += c;
                if c == 0 {
                    continue;
                }

                let grad_right = leaf.grad - grad_left;
                let hess_right = leaf.hess - hess_left;
                let count_right = leaf.rows.len() - count_left;
                if !self
                    .params
                    .is_valid_split(hess_left, hess_right, count_left, count_right)
                {
                    continue;
                }

                let gain = self
                    .params
                    .split_gain(grad_left, hess_left, grad_right, hess_right);
                if gain > 0.0 && best.map_or(true, |b| gain > b.gain) {
                    best = Some(SplitInfo { feature, bin, gain });
                }
            }
        }
        best
    }
}

fn sum_gradients(rows: &[u32], grad_hess: &[(f64, f64)]) -> (f64, f64) {
    rows.iter().fold((0.0, 0.0), |(g, h), &r| {
        let (gr, hr) = grad_hess[r as usize];
        (g + gr, h + hr)
    })
}
