//! CART regression tree builder
//!
//! Exact-greedy splits on squared-error reduction over a random subset of
//! features per node. Nodes are stored flat; children are addressed by
//! index.

use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn per node
    pub max_features: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub feature_index: usize,
    pub threshold: f64,
    pub left: u32,
    pub right: u32,
    /// Set on leaves only
    pub value: Option<f64>,
}

impl Node {
    fn leaf(value: f64) -> Self {
        Self {
            feature_index: 0,
            threshold: 0.0,
            left: 0,
            right: 0,
            value: Some(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<Node>,
}

impl RegressionTree {
    /// Grow a tree on the rows listed in `sample_rows` (duplicates allowed)
    pub fn fit<'a>(
        features: ArrayView2<'a, f64>,
        targets: &'a [f64],
        sample_rows: &[usize],
        params: TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let builder = CartBuilder {
            features,
            targets,
            params,
            feature_count: features.ncols(),
        };
        let mut nodes = Vec::new();
        builder.build_node(sample_rows.to_vec(), 0, &mut nodes, rng);
        Self { nodes }
    }

    pub fn predict(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0usize;
        loop {
            let Some(node) = self.nodes.get(idx) else {
                return 0.0;
            };
            if let Some(value) = node.value {
                return value;
            }
            let x = row.get(node.feature_index).copied().unwrap_or(0.0);
            let next = if x <= node.threshold {
                node.left as usize
            } else {
                node.right as usize
            };
            // Children always follow their parent
            if next <= idx {
                return 0.0;
            }
            idx = next;
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(node) if node.value.is_none() => {
                    1 + walk(nodes, node.left as usize).max(walk(nodes, node.right as usize))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.value.is_some()).count()
    }

    /// Check the flat layout a loaded tree must keep: a root exists and
    /// every split points forward to children inside the node list, so a
    /// walk from the root always ends on a leaf.
    pub fn check_layout(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if node.value.is_some() {
                continue;
            }
            for child in [node.left as usize, node.right as usize] {
                if child <= idx || child >= self.nodes.len() {
                    return Err(format!("node {} points to invalid child {}", idx, child));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    /// sum_l²/n_l + sum_r²/n_r, larger means lower child error
    score: f64,
}

struct CartBuilder<'a> {
    features: ArrayView2<'a, f64>,
    targets: &'a [f64],
    params: TreeParams,
    feature_count: usize,
}

impl CartBuilder<'_> {
    fn build_node(&self, indices: Vec<usize>, depth: usize, nodes: &mut Vec<Node>, rng: &mut StdRng) -> u32 {
        let current_idx = nodes.len() as u32;
        let n = indices.len();
        let sum: f64 = indices.iter().map(|&i| self.targets[i]).sum();
        let leaf_value = if n == 0 { 0.0 } else { sum / n as f64 };

        if n == 0
            || depth >= self.params.max_depth
            || n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf
            || self.is_pure(&indices)
        {
            nodes.push(Node::leaf(leaf_value));
            return current_idx;
        }

        let parent_score = sum * sum / n as f64;
        let split = match self.find_best_split(&indices, rng) {
            Some(s) if s.score > parent_score + 1e-9 * parent_score.abs().max(1.0) => s,
            _ => {
                nodes.push(Node::leaf(leaf_value));
                return current_idx;
            }
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.features[[i, split.feature_idx]] <= split.threshold);

        // Reserve the slot, children patched in after recursion
        nodes.push(Node {
            feature_index: split.feature_idx,
            threshold: split.threshold,
            left: 0,
            right: 0,
            value: None,
        });

        let left_idx = self.build_node(left, depth + 1, nodes, rng);
        let right_idx = self.build_node(right, depth + 1, nodes, rng);
        nodes[current_idx as usize].left = left_idx;
        nodes[current_idx as usize].right = right_idx;

        current_idx
    }

    fn is_pure(&self, indices: &[usize]) -> bool {
        let first = self.targets[indices[0]];
        indices.iter().all(|&i| self.targets[i] == first)
    }

    fn find_best_split(&self, indices: &[usize], rng: &mut StdRng) -> Option<SplitCandidate> {
        if self.feature_count == 0 {
            return None;
        }
        let k = self.params.max_features.clamp(1, self.feature_count.max(1));
        let candidates = sample(rng, self.feature_count, k);
        let min_leaf = self.params.min_samples_leaf.max(1);
        let n = indices.len();

        let mut best: Option<SplitCandidate> = None;
        let mut sorted = indices.to_vec();

        for feature_idx in candidates.iter() {
            sorted.sort_by(|&a, &b| {
                self.features[[a, feature_idx]]
                    .partial_cmp(&self.features[[b, feature_idx]])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let total: f64 = sorted.iter().map(|&i| self.targets[i]).sum();
            let mut left_sum = 0.0;

            for pos in 1..n {
                left_sum += self.targets[sorted[pos - 1]];
                if pos < min_leaf || n - pos < min_leaf {
                    continue;
                }
                let lo = self.features[[sorted[pos - 1], feature_idx]];
                let hi = self.features[[sorted[pos], feature_idx]];
                if hi <= lo {
                    continue;
                }

                let right_sum = total - left_sum;
                let score = left_sum * left_sum / pos as f64 + right_sum * right_sum / (n - pos) as f64;
                if best.map_or(true, |b| score > b.score) {
                    let mid = lo + (hi - lo) / 2.0;
                    let threshold = if mid < hi { mid } else { lo };
                    best = Some(SplitCandidate {
                        feature_idx,
                        threshold,
                        score,
                    });
                }
            }
        }

        best
    }
}
