//! Circular-flow detection.
//!
//! Bounded depth-first search over degree-filtered nodes, closing cycles of
//! length 3..=5. Every candidate must pass four constraints before it is
//! kept: a 72 h temporal window, per-edge amount tolerance around the cycle
//! mean, flow conservation, and external isolation of the participants.
//! Survivors are canonicalized by minimal rotation and deduplicated.

use crate::types::{CycleHit, CycleScan, DetectorDiagnostics};
use chrono::{Duration, NaiveDateTime};
use sentinel_core::config::CycleConfig;
use sentinel_core::detector::{BatchDetector, Detector, DetectorMetadata, Stage};
use sentinel_core::error::Result;
use sentinel_graph::{EdgeId, NodeId, TxnGraph};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// Upper bound on parallel-edge combinations tried per candidate.
const COMBINATION_CAP: u32 = 1_024;

/// Circular fund-routing detector.
#[derive(Debug, Clone)]
pub struct CycleDetector {
    metadata: DetectorMetadata,
    config: CycleConfig,
}

impl Default for CycleDetector {
    fn default() -> Self {
        Self::new(CycleConfig::default())
    }
}

impl CycleDetector {
    /// Create a cycle detector with the given thresholds.
    #[must_use]
    pub fn new(config: CycleConfig) -> Self {
        Self {
            metadata: DetectorMetadata::new("forensics/cycle-detector", Stage::Detection)
                .with_description("Bounded DFS circular-flow detection (length 3-5)")
                .with_throughput(25_000),
            config,
        }
    }

    /// Scan the graph for validated cycles.
    pub fn compute(graph: &TxnGraph, config: &CycleConfig) -> CycleScan {
        let node_count = graph.node_count();
        let mut eligible = vec![false; node_count];
        for id in graph.node_ids() {
            let degree = graph.total_degree(id);
            eligible[id as usize] = degree >= config.min_degree && degree <= config.max_degree;
        }

        // Distinct-successor adjacency restricted to eligible nodes. The
        // lists come out ascending, which pins the discovery order.
        let mut adjacency: Vec<Vec<NodeId>> = vec![Vec::new(); node_count];
        for id in graph.node_ids() {
            if !eligible[id as usize] {
                continue;
            }
            adjacency[id as usize] = graph
                .successors(id)
                .into_iter()
                .filter(|&s| s != id && eligible[s as usize])
                .collect();
        }

        let mut scan = CycleScan::default();
        let mut seen: HashSet<Vec<NodeId>> = HashSet::new();

        'outer: for start in graph.node_ids() {
            if !eligible[start as usize] || adjacency[start as usize].is_empty() {
                continue;
            }

            let mut ops = 0u64;
            let mut stack: Vec<(NodeId, Vec<NodeId>)> = vec![(start, vec![start])];

            while let Some((current, path)) = stack.pop() {
                ops += 1;
                if ops > config.ops_per_node {
                    scan.diagnostics.budget_exhausted = true;
                    break;
                }

                // Reverse push keeps neighbor expansion ascending.
                for &next in adjacency[current as usize].iter().rev() {
                    if next == start && path.len() >= config.min_length {
                        let canonical = canonical_rotation(&path);
                        if seen.insert(canonical) {
                            if let Some(hit) = Self::validate_candidate(graph, &path, config) {
                                scan.cycles.push(hit);
                                if scan.cycles.len() >= config.max_cycles {
                                    scan.diagnostics.budget_exhausted = true;
                                    scan.diagnostics.ops += ops;
                                    break 'outer;
                                }
                            }
                        }
                        continue;
                    }
                    if path.len() >= config.max_length || path.contains(&next) {
                        continue;
                    }
                    let mut extended = path.clone();
                    extended.push(next);
                    stack.push((next, extended));
                }
            }

            scan.diagnostics.ops += ops;
        }

        scan
    }

    /// Search parallel-edge combinations for one satisfying all four
    /// constraints; the per-hop lists are timestamp-sorted, so temporally
    /// close combinations are tried first.
    fn validate_candidate(
        graph: &TxnGraph,
        path: &[NodeId],
        config: &CycleConfig,
    ) -> Option<CycleHit> {
        let hops = path.len();
        let mut hop_edges: Vec<Vec<EdgeId>> = Vec::with_capacity(hops);
        for i in 0..hops {
            let from = path[i];
            let to = path[(i + 1) % hops];
            let bundle = graph.edges_between(from, to);
            if bundle.is_empty() {
                return None;
            }
            hop_edges.push(bundle);
        }

        let mut chosen = Vec::with_capacity(hops);
        let mut budget = COMBINATION_CAP;
        Self::choose_edges(graph, path, &hop_edges, &mut chosen, &mut budget, config)
    }

    fn choose_edges(
        graph: &TxnGraph,
        path: &[NodeId],
        hop_edges: &[Vec<EdgeId>],
        chosen: &mut Vec<EdgeId>,
        budget: &mut u32,
        config: &CycleConfig,
    ) -> Option<CycleHit> {
        if chosen.len() == hop_edges.len() {
            if *budget == 0 {
                return None;
            }
            *budget -= 1;
            return Self::check_constraints(graph, path, chosen, config);
        }
        for &edge in &hop_edges[chosen.len()] {
            chosen.push(edge);
            let hit = Self::choose_edges(graph, path, hop_edges, chosen, budget, config);
            chosen.pop();
            if hit.is_some() || *budget == 0 {
                return hit;
            }
        }
        None
    }

    /// The four-constraint gate.
    fn check_constraints(
        graph: &TxnGraph,
        path: &[NodeId],
        edges: &[EdgeId],
        config: &CycleConfig,
    ) -> Option<CycleHit> {
        let amounts: Vec<f64> = edges.iter().map(|&e| graph.edge(e).amount).collect();
        let stamps: Vec<NaiveDateTime> = edges.iter().map(|&e| graph.edge(e).timestamp).collect();

        let window_start = *stamps.iter().min()?;
        let window_end = *stamps.iter().max()?;

        // 1. Temporal window.
        if window_end - window_start > Duration::hours(config.window_hours) {
            return None;
        }

        // 2. Amount variance around the mean.
        let mean = amounts.iter().sum::<f64>() / amounts.len() as f64;
        if mean <= 0.0 {
            return None;
        }
        if amounts
            .iter()
            .any(|a| (a - mean).abs() / mean > config.amount_tolerance)
        {
            return None;
        }

        // 3. Flow conservation.
        let min = amounts.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = amounts.iter().cloned().fold(0.0f64, f64::max);
        if max <= 0.0 || min / max < config.flow_ratio_min {
            return None;
        }

        // 4. External isolation inside the window.
        if !Self::externally_isolated(graph, path, window_start, window_end, config) {
            return None;
        }

        let canonical = canonical_rotation(path);
        let offset = path.iter().position(|&n| n == canonical[0])?;
        let len = path.len();
        let rotated_edges: Vec<EdgeId> = (0..len).map(|i| edges[(offset + i) % len]).collect();

        Some(CycleHit {
            nodes: canonical,
            edges: rotated_edges,
            window_start,
            window_end,
            mean_amount: mean,
        })
    }

    /// Each cycle member may have at most `max_external_neighbors` distinct
    /// non-cycle counterparties active inside the cycle's window.
    fn externally_isolated(
        graph: &TxnGraph,
        path: &[NodeId],
        window_start: NaiveDateTime,
        window_end: NaiveDateTime,
        config: &CycleConfig,
    ) -> bool {
        for &node in path {
            let mut external: BTreeSet<NodeId> = BTreeSet::new();
            for &e in graph.incoming(node) {
                let edge = graph.edge(e);
                if edge.timestamp >= window_start
                    && edge.timestamp <= window_end
                    && !path.contains(&edge.src)
                {
                    external.insert(edge.src);
                }
            }
            for &e in graph.outgoing(node) {
                let edge = graph.edge(e);
                if edge.timestamp >= window_start
                    && edge.timestamp <= window_end
                    && !path.contains(&edge.dst)
                {
                    external.insert(edge.dst);
                }
            }
            if external.len() > config.max_external_neighbors {
                return false;
            }
        }
        true
    }
}

/// Rotate a cycle so the smallest node id leads. Node indices are assigned
/// in account order, so this is the lexicographically smallest rotation.
#[must_use]
pub fn canonical_rotation(path: &[NodeId]) -> Vec<NodeId> {
    let min_idx = path
        .iter()
        .enumerate()
        .min_by_key(|(_, &n)| n)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let mut rotated = Vec::with_capacity(path.len());
    rotated.extend_from_slice(&path[min_idx..]);
    rotated.extend_from_slice(&path[..min_idx]);
    rotated
}

impl Detector for CycleDetector {
    fn metadata(&self) -> &DetectorMetadata {
        &self.metadata
    }
}

#[async_trait::async_trait]
impl BatchDetector<Arc<TxnGraph>, CycleScan> for CycleDetector {
    async fn execute(&self, graph: Arc<TxnGraph>) -> Result<CycleScan> {
        Ok(Self::compute(&graph, &self.config))
    }
}
