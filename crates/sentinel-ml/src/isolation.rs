//! Isolation forest anomaly scoring.
//!
//! Standard isolation-forest construction: each tree is grown on a random
//! subsample with uniformly random axis-aligned splits; anomalous points
//! isolate in short paths. The raw score per point is
//! `2^(-E[path length] / c(sample_size))`, then min-max normalized across
//! the batch and scaled to a bounded bonus.

use crate::features::{extract_features, FEATURE_COUNT};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sentinel_core::config::AnomalyConfig;
use sentinel_core::detector::{BatchDetector, Detector, DetectorMetadata, Stage};
use sentinel_core::error::Result;
use sentinel_graph::TxnGraph;
use std::sync::Arc;

const EULER_MASCHERONI: f64 = 0.577_215_664_901_532_9;
const SPLIT_EPSILON: f64 = 1e-12;

/// One node of an isolation tree, arena-allocated.
#[derive(Debug, Clone)]
enum TreeNode {
    Internal {
        feature: usize,
        split: f64,
        left: u32,
        right: u32,
    },
    Leaf {
        size: u32,
    },
}

/// A single isolation tree.
#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<TreeNode>,
}

impl IsolationTree {
    /// Grow a tree over the sampled points.
    fn grow(
        data: &[[f64; FEATURE_COUNT]],
        sample: &mut [usize],
        max_depth: u32,
        rng: &mut StdRng,
    ) -> Self {
        let mut tree = IsolationTree { nodes: Vec::new() };
        tree.build(data, sample, 0, max_depth, rng);
        tree
    }

    fn build(
        &mut self,
        data: &[[f64; FEATURE_COUNT]],
        sample: &mut [usize],
        depth: u32,
        max_depth: u32,
        rng: &mut StdRng,
    ) -> u32 {
        let id = self.nodes.len() as u32;
        if sample.len() <= 1 || depth >= max_depth {
            self.nodes.push(TreeNode::Leaf {
                size: sample.len() as u32,
            });
            return id;
        }

        // Pick a random splittable feature; a region constant in every
        // dimension becomes a leaf.
        let mut chosen: Option<(usize, f64, f64)> = None;
        let offset = rng.gen_range(0..FEATURE_COUNT);
        for probe in 0..FEATURE_COUNT {
            let feature = (offset + probe) % FEATURE_COUNT;
            let mut lo = f64::INFINITY;
            let mut hi = f64::NEG_INFINITY;
            for &idx in sample.iter() {
                lo = lo.min(data[idx][feature]);
                hi = hi.max(data[idx][feature]);
            }
            if hi - lo > SPLIT_EPSILON {
                chosen = Some((feature, lo, hi));
                break;
            }
        }
        let Some((feature, lo, hi)) = chosen else {
            self.nodes.push(TreeNode::Leaf {
                size: sample.len() as u32,
            });
            return id;
        };

        let split = lo + rng.gen::<f64>() * (hi - lo);
        let pivot = partition(sample, |idx| data[idx][feature] < split);

        // Degenerate split (floating ties): stop here.
        if pivot == 0 || pivot == sample.len() {
            self.nodes.push(TreeNode::Leaf {
                size: sample.len() as u32,
            });
            return id;
        }

        self.nodes.push(TreeNode::Internal {
            feature,
            split,
            left: 0,
            right: 0,
        });
        let (left_slice, right_slice) = sample.split_at_mut(pivot);
        let left = self.build(data, left_slice, depth + 1, max_depth, rng);
        let right = self.build(data, right_slice, depth + 1, max_depth, rng);
        if let TreeNode::Internal {
            left: l, right: r, ..
        } = &mut self.nodes[id as usize]
        {
            *l = left;
            *r = right;
        }
        id
    }

    /// Path length for a point, with the standard leaf-size adjustment.
    fn path_length(&self, point: &[f64; FEATURE_COUNT]) -> f64 {
        let mut depth = 0.0;
        let mut cursor = 0usize;
        loop {
            match &self.nodes[cursor] {
                TreeNode::Leaf { size } => {
                    return depth + average_path_length(*size as usize);
                }
                TreeNode::Internal {
                    feature,
                    split,
                    left,
                    right,
                } => {
                    depth += 1.0;
                    cursor = if point[*feature] < *split {
                        *left as usize
                    } else {
                        *right as usize
                    };
                }
            }
        }
    }
}

/// Stable in-place partition preserving relative order within each side.
fn partition(sample: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    sample.sort_by_key(|&idx| !pred(idx));
    sample.iter().take_while(|&&idx| pred(idx)).count()
}

/// Expected path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    2.0 * ((n - 1.0).ln() + EULER_MASCHERONI) - 2.0 * (n - 1.0) / n
}

/// A fitted isolation forest.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    sample_size: usize,
}

impl IsolationForest {
    /// Fit a forest on the full population with a fixed seed.
    #[must_use]
    pub fn fit(data: &[[f64; FEATURE_COUNT]], config: &AnomalyConfig) -> Self {
        let sample_size = config.sample_size.min(data.len()).max(1);
        let max_depth = (sample_size as f64).log2().ceil().max(1.0) as u32;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let trees = (0..config.trees)
            .map(|_| {
                let mut sample = sample_without_replacement(data.len(), sample_size, &mut rng);
                IsolationTree::grow(data, &mut sample, max_depth, &mut rng)
            })
            .collect();

        Self { trees, sample_size }
    }

    /// Raw anomaly score in (0, 1); higher is more anomalous.
    #[must_use]
    pub fn score(&self, point: &[f64; FEATURE_COUNT]) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }
        let mean_path: f64 = self
            .trees
            .iter()
            .map(|t| t.path_length(point))
            .sum::<f64>()
            / self.trees.len() as f64;
        let norm = average_path_length(self.sample_size).max(SPLIT_EPSILON);
        2f64.powf(-mean_path / norm)
    }
}

/// Partial Fisher-Yates draw of `k` distinct indices out of `n`.
fn sample_without_replacement(n: usize, k: usize, rng: &mut StdRng) -> Vec<usize> {
    let mut pool: Vec<usize> = (0..n).collect();
    for i in 0..k.min(n) {
        let j = rng.gen_range(i..n);
        pool.swap(i, j);
    }
    pool.truncate(k);
    pool
}

/// Batch anomaly scorer: isolation forest plus batch-wide normalization.
#[derive(Debug, Clone)]
pub struct AnomalyScorer {
    metadata: DetectorMetadata,
    config: AnomalyConfig,
}

impl Default for AnomalyScorer {
    fn default() -> Self {
        Self::new(AnomalyConfig::default())
    }
}

impl AnomalyScorer {
    /// Create a scorer with the given parameters.
    #[must_use]
    pub fn new(config: AnomalyConfig) -> Self {
        Self {
            metadata: DetectorMetadata::new("forensics/anomaly-scorer", Stage::Anomaly)
                .with_description("Isolation-forest anomaly bonus over degree/volume features")
                .with_throughput(40_000),
            config,
        }
    }

    /// Per-node anomaly bonus in `[0, max_bonus]`, indexed by node id.
    ///
    /// Normalization is across the batch: the most anomalous node lands on
    /// `max_bonus`, the least on 0. A batch with no spread scores all
    /// zeros.
    pub fn compute(graph: &TxnGraph, config: &AnomalyConfig) -> Vec<f64> {
        let features = extract_features(graph);
        if features.len() < 2 {
            return vec![0.0; features.len()];
        }

        let forest = IsolationForest::fit(&features, config);
        let raw: Vec<f64> = features.iter().map(|f| forest.score(f)).collect();

        let min = raw.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = raw.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if max - min < SPLIT_EPSILON {
            return vec![0.0; raw.len()];
        }
        raw.iter()
            .map(|s| (s - min) / (max - min) * config.max_bonus)
            .collect()
    }
}

impl Detector for AnomalyScorer {
    fn metadata(&self) -> &DetectorMetadata {
        &self.metadata
    }
}

#[async_trait::async_trait]
impl BatchDetector<Arc<TxnGraph>, Vec<f64>> for AnomalyScorer {
    async fn execute(&self, graph: Arc<TxnGraph>) -> Result<Vec<f64>> {
        Ok(Self::compute(&graph, &self.config))
    }
}
