//! Layered passthrough (shell) chain detection.
//!
//! Phase one filters passthrough candidates: thin accounts that forward
//! almost everything they receive within a day and live only a fraction of
//! the batch. Phase two walks forward from non-candidate sources through
//! candidates only, collecting chains that end at a distinct non-candidate
//! sink.

use crate::types::{DetectorDiagnostics, ShellChain, ShellScan};
use chrono::Duration;
use sentinel_core::config::ShellConfig;
use sentinel_core::detector::{BatchDetector, Detector, DetectorMetadata, Stage};
use sentinel_core::error::Result;
use sentinel_graph::{NodeId, TxnGraph};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// Shell chain detector.
#[derive(Debug, Clone)]
pub struct ShellDetector {
    metadata: DetectorMetadata,
    config: ShellConfig,
}

impl Default for ShellDetector {
    fn default() -> Self {
        Self::new(ShellConfig::default())
    }
}

impl ShellDetector {
    /// Create a shell detector with the given thresholds.
    #[must_use]
    pub fn new(config: ShellConfig) -> Self {
        Self {
            metadata: DetectorMetadata::new("forensics/shell-detector", Stage::Detection)
                .with_description("Passthrough candidate filter and bounded chain walk")
                .with_throughput(80_000),
            config,
        }
    }

    /// Scan the graph for shell chains.
    pub fn compute(graph: &TxnGraph, config: &ShellConfig) -> ShellScan {
        if graph.is_empty() {
            return ShellScan::default();
        }
        let candidates = Self::filter_candidates(graph, config);
        Self::walk_chains(graph, &candidates, config)
    }

    /// Phase one: passthrough candidate filtering.
    fn filter_candidates(graph: &TxnGraph, config: &ShellConfig) -> Vec<bool> {
        let span_seconds = graph.span_seconds();
        let forward_window = Duration::hours(config.forward_window_hours);
        let mut candidates = vec![false; graph.node_count()];

        for node in graph.node_ids() {
            let degree = graph.total_degree(node);
            if degree < config.min_degree || degree > config.max_degree {
                continue;
            }
            let inbound = graph.incoming(node);
            let outbound = graph.outgoing(node);
            if inbound.is_empty() || outbound.is_empty() {
                continue;
            }

            // Lifetime bound relative to the batch span.
            if graph.active_seconds(node) > config.max_lifetime_ratio * span_seconds {
                continue;
            }

            // Passthrough ratio: value forwarded within the window, with
            // inbound edges matched greedily to the earliest outbound edge
            // at or after them.
            let total_in = graph.node(node).volume_in;
            if total_in <= 0.0 {
                continue;
            }
            let mut forwarded = 0.0;
            for &ie in inbound {
                let in_edge = graph.edge(ie);
                let idx = outbound
                    .partition_point(|&oe| graph.edge(oe).timestamp < in_edge.timestamp);
                if idx >= outbound.len() {
                    continue;
                }
                let out_edge = graph.edge(outbound[idx]);
                if out_edge.timestamp - in_edge.timestamp <= forward_window {
                    forwarded += in_edge.amount.min(out_edge.amount);
                }
            }
            if forwarded / total_in < config.passthrough_ratio {
                continue;
            }

            // At least one predecessor/successor pair with p != s.
            let predecessors = graph.predecessors(node);
            let successors = graph.successors(node);
            let has_distinct_endpoints = predecessors
                .iter()
                .any(|&p| successors.iter().any(|&s| p != s));
            if has_distinct_endpoints {
                candidates[node as usize] = true;
            }
        }
        candidates
    }

    /// Phase two: BFS chain walk from non-candidate sources.
    fn walk_chains(graph: &TxnGraph, candidates: &[bool], config: &ShellConfig) -> ShellScan {
        let mut scan = ShellScan {
            chains: Vec::new(),
            diagnostics: DetectorDiagnostics::default(),
        };
        let mut seen_pairs: HashSet<(NodeId, NodeId)> = HashSet::new();

        'outer: for source in graph.node_ids() {
            if candidates[source as usize] {
                continue;
            }
            let mut queue: VecDeque<Vec<NodeId>> = VecDeque::new();
            queue.push_back(vec![source]);

            while let Some(path) = queue.pop_front() {
                let last = *path.last().unwrap_or(&source);
                for next in graph.successors(last) {
                    scan.diagnostics.ops += 1;
                    if scan.diagnostics.ops > config.step_budget {
                        scan.diagnostics.budget_exhausted = true;
                        break 'outer;
                    }
                    if path.contains(&next) {
                        continue;
                    }
                    if candidates[next as usize] {
                        // Room for the candidate and a future sink.
                        if path.len() + 1 < config.max_chain_length {
                            let mut extended = path.clone();
                            extended.push(next);
                            queue.push_back(extended);
                        }
                    } else if path.len() > 1 {
                        // Chain terminates at the first non-candidate sink.
                        let intermediaries = path[1..].to_vec();
                        if intermediaries.len() >= config.min_intermediaries
                            && next != source
                            && seen_pairs.insert((source, next))
                        {
                            scan.chains.push(ShellChain {
                                source,
                                intermediaries,
                                sink: next,
                            });
                        }
                    }
                }
            }
        }
        scan
    }
}

impl Detector for ShellDetector {
    fn metadata(&self) -> &DetectorMetadata {
        &self.metadata
    }
}

#[async_trait::async_trait]
impl BatchDetector<Arc<TxnGraph>, ShellScan> for ShellDetector {
    async fn execute(&self, graph: Arc<TxnGraph>) -> Result<ShellScan> {
        Ok(Self::compute(&graph, &self.config))
    }
}
