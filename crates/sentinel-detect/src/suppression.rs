//! Normal-activity suppression statistics.
//!
//! Computes the per-account evidence consumed by the score composer's
//! merchant penalty and activity-suppression penalty. The profiler only
//! measures; the composer decides how the measurements offset pattern
//! scores.

use crate::stats::coefficient_of_variation;
use crate::types::SuppressionFlags;
use sentinel_core::config::ScoringConfig;
use sentinel_core::detector::{BatchDetector, Detector, DetectorMetadata, Stage};
use sentinel_core::error::Result;
use sentinel_graph::{NodeId, TxnGraph};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Merchant and sustained-activity profiler.
#[derive(Debug, Clone)]
pub struct SuppressionProfiler {
    metadata: DetectorMetadata,
    config: ScoringConfig,
}

impl Default for SuppressionProfiler {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

impl SuppressionProfiler {
    /// Create a profiler with the given thresholds.
    #[must_use]
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            metadata: DetectorMetadata::new("forensics/suppression-profiler", Stage::Detection)
                .with_description("Merchant and sustained-activity evidence for score suppression")
                .with_throughput(150_000),
            config,
        }
    }

    /// Profile every account, indexed by node id.
    pub fn compute(graph: &TxnGraph, config: &ScoringConfig) -> Vec<SuppressionFlags> {
        let span_seconds = graph.span_seconds();
        graph
            .node_ids()
            .map(|node| Self::profile_node(graph, node, span_seconds, config))
            .collect()
    }

    fn profile_node(
        graph: &TxnGraph,
        node: NodeId,
        span_seconds: f64,
        config: &ScoringConfig,
    ) -> SuppressionFlags {
        let touching = graph.touching(node);
        let total_edges = touching.len();
        let mut flags = SuppressionFlags::default();
        if total_edges == 0 {
            return flags;
        }

        let amounts: Vec<f64> = touching.iter().map(|&e| graph.edge(e).amount).collect();
        flags.amount_cv = coefficient_of_variation(&amounts);

        // Inter-arrival timing over the merged edge sequence.
        let gaps: Vec<f64> = touching
            .windows(2)
            .map(|w| {
                (graph.edge(w[1]).timestamp - graph.edge(w[0]).timestamp).num_seconds() as f64
            })
            .collect();
        flags.timing_cv = coefficient_of_variation(&gaps);

        // Repeat ratio: share of edges hitting the single busiest
        // counterparty.
        let mut per_counterparty: BTreeMap<NodeId, usize> = BTreeMap::new();
        for &e in graph.incoming(node) {
            *per_counterparty.entry(graph.edge(e).src).or_insert(0) += 1;
        }
        for &e in graph.outgoing(node) {
            *per_counterparty.entry(graph.edge(e).dst).or_insert(0) += 1;
        }
        let top = per_counterparty.values().copied().max().unwrap_or(0);
        flags.repeat_ratio = top as f64 / total_edges as f64;

        // Merchant profile: concentrated counterparty with regular timing.
        // Undefined below the minimum edge count, so skipped there.
        if total_edges >= config.merchant_min_edges
            && flags.repeat_ratio >= config.merchant_repeat_ratio
            && flags.timing_cv < config.merchant_timing_cv
        {
            flags.merchant = true;
        }

        // Sustained broad activity: busy for most of the batch with varied
        // amounts and no dormancy gap.
        if total_edges > config.activity_min_degree && span_seconds > 0.0 {
            let active = graph.active_seconds(node);
            let max_gap = gaps.iter().cloned().fold(0.0f64, f64::max);
            if active / span_seconds > config.activity_span_ratio
                && flags.amount_cv > config.activity_min_cv
                && max_gap < config.activity_gap_ratio * active
            {
                flags.sustained_activity = true;
            }
        }

        flags
    }
}

impl Detector for SuppressionProfiler {
    fn metadata(&self) -> &DetectorMetadata {
        &self.metadata
    }
}

#[async_trait::async_trait]
impl BatchDetector<Arc<TxnGraph>, Vec<SuppressionFlags>> for SuppressionProfiler {
    async fn execute(&self, graph: Arc<TxnGraph>) -> Result<Vec<SuppressionFlags>> {
        Ok(Self::compute(&graph, &self.config))
    }
}
