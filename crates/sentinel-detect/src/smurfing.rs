//! Structuring hub detection (smurfing).
//!
//! Two independent sliding-window scans per account over its sorted edge
//! lists: the aggregator scan looks for fan-in of similarly sized
//! transfers followed by prompt dispersal, the disperser scan for fan-out
//! funded by a narrow set of sources. Windows advance one edge at a time
//! with running moments, so each scan is linear in the account's degree.

use crate::stats::{RollingMoments, MEAN_EPSILON};
use crate::types::{SmurfHit, SmurfKind};
use chrono::{Duration, NaiveDateTime};
use sentinel_core::config::SmurfingConfig;
use sentinel_core::detector::{BatchDetector, Detector, DetectorMetadata, Stage};
use sentinel_core::error::Result;
use sentinel_graph::{EdgeId, NodeId, TxnGraph};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Fan-in / fan-out structuring detector.
#[derive(Debug, Clone)]
pub struct SmurfingDetector {
    metadata: DetectorMetadata,
    config: SmurfingConfig,
}

impl Default for SmurfingDetector {
    fn default() -> Self {
        Self::new(SmurfingConfig::default())
    }
}

impl SmurfingDetector {
    /// Create a smurfing detector with the given thresholds.
    #[must_use]
    pub fn new(config: SmurfingConfig) -> Self {
        Self {
            metadata: DetectorMetadata::new("forensics/smurfing-detector", Stage::Detection)
                .with_description("Sliding-window fan-in/fan-out structuring detection")
                .with_throughput(100_000),
            config,
        }
    }

    /// Scan every account; at most one aggregator and one disperser hit
    /// per account (lowest-CV window wins).
    pub fn compute(graph: &TxnGraph, config: &SmurfingConfig) -> Vec<SmurfHit> {
        let mut hits = Vec::new();
        for node in graph.node_ids() {
            if let Some(hit) = Self::scan_aggregator(graph, node, config) {
                hits.push(hit);
            }
            if let Some(hit) = Self::scan_disperser(graph, node, config) {
                hits.push(hit);
            }
        }
        hits
    }

    /// Fan-in scan over inbound edges.
    fn scan_aggregator(
        graph: &TxnGraph,
        node: NodeId,
        config: &SmurfingConfig,
    ) -> Option<SmurfHit> {
        let inbound = graph.incoming(node);
        if inbound.len() < config.min_fan_in {
            return None;
        }
        let outbound = graph.outgoing(node);
        let window = Duration::hours(config.window_hours);
        let grace = Duration::hours(config.outbound_grace_hours);

        let mut best: Option<SmurfHit> = None;
        let mut moments = RollingMoments::default();
        let mut right = 0usize;

        for left in 0..inbound.len() {
            let window_start = graph.edge(inbound[left]).timestamp;
            let window_end = window_start + window;
            while right < inbound.len() && graph.edge(inbound[right]).timestamp <= window_end {
                moments.push(graph.edge(inbound[right]).amount);
                right += 1;
            }

            if let Some(hit) = Self::evaluate_aggregator_window(
                graph,
                node,
                &inbound[left..right],
                outbound,
                window_start,
                window_end,
                grace,
                &moments,
                config,
            ) {
                let better = match &best {
                    Some(current) => hit.cv < current.cv,
                    None => true,
                };
                if better {
                    best = Some(hit);
                }
            }

            moments.pop(graph.edge(inbound[left]).amount);
        }
        best
    }

    #[allow(clippy::too_many_arguments)]
    fn evaluate_aggregator_window(
        graph: &TxnGraph,
        node: NodeId,
        window_in: &[EdgeId],
        outbound: &[EdgeId],
        window_start: NaiveDateTime,
        window_end: NaiveDateTime,
        grace: Duration,
        moments: &RollingMoments,
        config: &SmurfingConfig,
    ) -> Option<SmurfHit> {
        if moments.count() < config.min_fan_in {
            return None;
        }
        let mean = moments.mean();
        if mean < MEAN_EPSILON {
            return None;
        }
        let cv = moments.cv();
        if cv > config.max_cv {
            return None;
        }

        // Outbound edges inside the window plus the grace period.
        let out_slice = slice_by_time(graph, outbound, window_start, window_end + grace);
        if out_slice.len() < config.min_outbound {
            return None;
        }

        let inbound_sum = moments.sum();
        let outbound_sum: f64 = out_slice.iter().map(|&e| graph.edge(e).amount).sum();
        let retention = 1.0 - outbound_sum / inbound_sum;
        if retention > config.max_retention {
            return None;
        }

        let mean_holding =
            mean_holding_hours(graph, window_in, out_slice)?;
        if mean_holding > config.max_mean_holding_hours {
            return None;
        }

        let mut counterparties: BTreeSet<NodeId> =
            window_in.iter().map(|&e| graph.edge(e).src).collect();
        counterparties.extend(out_slice.iter().map(|&e| graph.edge(e).dst));
        counterparties.remove(&node);

        Some(SmurfHit {
            hub: node,
            kind: SmurfKind::Aggregator,
            window_start,
            window_end,
            cv,
            fan_count: window_in.len(),
            counterparties: counterparties.into_iter().collect(),
            inbound_total: inbound_sum,
            outbound_total: outbound_sum,
        })
    }

    /// Fan-out scan over outbound edges.
    fn scan_disperser(
        graph: &TxnGraph,
        node: NodeId,
        config: &SmurfingConfig,
    ) -> Option<SmurfHit> {
        let outbound = graph.outgoing(node);
        if outbound.len() < config.min_disperser_out {
            return None;
        }
        let inbound = graph.incoming(node);
        if inbound.is_empty() {
            // A disperser must be funded from somewhere.
            return None;
        }
        let window = Duration::hours(config.window_hours);
        let lookback = Duration::hours(config.funding_lookback_hours);

        let mut best: Option<SmurfHit> = None;
        let mut moments = RollingMoments::default();
        let mut right = 0usize;

        for left in 0..outbound.len() {
            let window_start = graph.edge(outbound[left]).timestamp;
            let window_end = window_start + window;
            while right < outbound.len() && graph.edge(outbound[right]).timestamp <= window_end {
                moments.push(graph.edge(outbound[right]).amount);
                right += 1;
            }

            if let Some(hit) = Self::evaluate_disperser_window(
                graph,
                node,
                &outbound[left..right],
                inbound,
                window_start,
                window_end,
                lookback,
                &moments,
                config,
            ) {
                let better = match &best {
                    Some(current) => hit.cv < current.cv,
                    None => true,
                };
                if better {
                    best = Some(hit);
                }
            }

            moments.pop(graph.edge(outbound[left]).amount);
        }
        best
    }

    #[allow(clippy::too_many_arguments)]
    fn evaluate_disperser_window(
        graph: &TxnGraph,
        node: NodeId,
        window_out: &[EdgeId],
        inbound: &[EdgeId],
        window_start: NaiveDateTime,
        window_end: NaiveDateTime,
        lookback: Duration,
        moments: &RollingMoments,
        config: &SmurfingConfig,
    ) -> Option<SmurfHit> {
        if moments.count() < config.min_disperser_out {
            return None;
        }
        let mean = moments.mean();
        if mean < MEAN_EPSILON {
            return None;
        }
        let cv = moments.cv();
        if cv > config.max_cv {
            return None;
        }

        // Funding phase: inbound activity shortly before and during the
        // dispersal window, restricted to a narrow source set.
        let funding = slice_by_time(graph, inbound, window_start - lookback, window_end);
        let sources: BTreeSet<NodeId> = funding.iter().map(|&e| graph.edge(e).src).collect();
        if sources.is_empty() || sources.len() > config.max_funding_sources {
            return None;
        }

        let mean_holding = mean_holding_hours(graph, inbound, window_out)?;
        if mean_holding > config.max_mean_holding_hours {
            return None;
        }

        let inbound_sum: f64 = funding.iter().map(|&e| graph.edge(e).amount).sum();
        let mut counterparties: BTreeSet<NodeId> =
            window_out.iter().map(|&e| graph.edge(e).dst).collect();
        counterparties.extend(sources);
        counterparties.remove(&node);

        Some(SmurfHit {
            hub: node,
            kind: SmurfKind::Disperser,
            window_start,
            window_end,
            cv,
            fan_count: window_out.len(),
            counterparties: counterparties.into_iter().collect(),
            inbound_total: inbound_sum,
            outbound_total: moments.sum(),
        })
    }
}

/// Contiguous slice of a timestamp-sorted edge list within `[from, to]`.
fn slice_by_time<'a>(
    graph: &TxnGraph,
    edges: &'a [EdgeId],
    from: NaiveDateTime,
    to: NaiveDateTime,
) -> &'a [EdgeId] {
    let lo = edges.partition_point(|&e| graph.edge(e).timestamp < from);
    let hi = edges.partition_point(|&e| graph.edge(e).timestamp <= to);
    &edges[lo..hi]
}

/// Mean gap in hours between each outbound edge and the nearest earlier
/// inbound edge. `None` when no outbound edge has an earlier inbound.
fn mean_holding_hours(graph: &TxnGraph, inbound: &[EdgeId], outbound: &[EdgeId]) -> Option<f64> {
    let mut total_secs = 0f64;
    let mut samples = 0usize;
    for &out in outbound {
        let out_ts = graph.edge(out).timestamp;
        let idx = inbound.partition_point(|&e| graph.edge(e).timestamp <= out_ts);
        if idx == 0 {
            continue;
        }
        let in_ts = graph.edge(inbound[idx - 1]).timestamp;
        total_secs += (out_ts - in_ts).num_seconds() as f64;
        samples += 1;
    }
    if samples == 0 {
        None
    } else {
        Some(total_secs / samples as f64 / 3600.0)
    }
}

impl Detector for SmurfingDetector {
    fn metadata(&self) -> &DetectorMetadata {
        &self.metadata
    }
}

#[async_trait::async_trait]
impl BatchDetector<Arc<TxnGraph>, Vec<SmurfHit>> for SmurfingDetector {
    async fn execute(&self, graph: Arc<TxnGraph>) -> Result<Vec<SmurfHit>> {
        Ok(Self::compute(&graph, &self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_graph::{types::parse_timestamp, GraphBuilder, Transaction};

    fn txn(id: &str, from: &str, to: &str, amount: f64, when: &str) -> Transaction {
        Transaction::new(id, from, to, amount, parse_timestamp(when).unwrap()).unwrap()
    }

    /// Twelve similar inbound transfers over 70h, then six dispersals.
    /// Amount variation sits in the tail so the full fan-in window is the
    /// lowest-CV window.
    fn aggregator_batch() -> Vec<Transaction> {
        let mut txns = Vec::new();
        for i in 0..12 {
            let amount = match i {
                10 => 860.0,
                11 => 940.0,
                _ => 900.0,
            };
            txns.push(txn(
                &format!("IN{i:02}"),
                &format!("S{i:02}"),
                "HUB",
                amount,
                &format!("2024-03-0{}T{:02}:00:00", 1 + i / 4, (i * 6) % 24),
            ));
        }
        for i in 0..6 {
            txns.push(txn(
                &format!("OUT{i}"),
                "HUB",
                &format!("R{i}"),
                1700.0,
                &format!("2024-03-04T{:02}:00:00", 2 + i * 3),
            ));
        }
        txns
    }

    #[test]
    fn test_aggregator_hit() {
        let graph = GraphBuilder::from_transactions(aggregator_batch()).unwrap();
        let hits = SmurfingDetector::compute(&graph, &SmurfingConfig::default());
        assert_eq!(hits.len(), 1);
        let hit = &hits[0];
        assert_eq!(hit.kind, SmurfKind::Aggregator);
        assert_eq!(graph.account(hit.hub), "HUB");
        assert_eq!(hit.fan_count, 12);
        // 12 senders + 6 receivers.
        assert_eq!(hit.counterparties.len(), 18);
    }

    #[test]
    fn test_aggregator_requires_dispersal() {
        let txns: Vec<Transaction> = aggregator_batch()
            .into_iter()
            .filter(|t| t.sender != "HUB")
            .collect();
        let graph = GraphBuilder::from_transactions(txns).unwrap();
        let hits = SmurfingDetector::compute(&graph, &SmurfingConfig::default());
        assert!(hits.is_empty());
    }

    #[test]
    fn test_aggregator_rejects_high_variance() {
        let mut txns = Vec::new();
        for i in 0..12 {
            txns.push(txn(
                &format!("IN{i:02}"),
                &format!("S{i:02}"),
                "HUB",
                // Wildly uneven amounts: CV far above 0.40.
                if i % 2 == 0 { 100.0 } else { 5000.0 },
                &format!("2024-03-01T{:02}:00:00", i),
            ));
        }
        for i in 0..6 {
            txns.push(txn(
                &format!("OUT{i}"),
                "HUB",
                &format!("R{i}"),
                5000.0,
                &format!("2024-03-02T{:02}:00:00", i),
            ));
        }
        let graph = GraphBuilder::from_transactions(txns).unwrap();
        let hits = SmurfingDetector::compute(&graph, &SmurfingConfig::default());
        assert!(hits.is_empty());
    }

    #[test]
    fn test_aggregator_rejects_high_retention() {
        let mut txns = Vec::new();
        for i in 0..12 {
            txns.push(txn(
                &format!("IN{i:02}"),
                &format!("S{i:02}"),
                "HUB",
                900.0,
                &format!("2024-03-01T{:02}:00:00", i),
            ));
        }
        // Only a sliver forwarded: retention ~0.95.
        for i in 0..5 {
            txns.push(txn(
                &format!("OUT{i}"),
                "HUB",
                &format!("R{i}"),
                100.0,
                &format!("2024-03-02T{:02}:00:00", i),
            ));
        }
        let graph = GraphBuilder::from_transactions(txns).unwrap();
        let hits = SmurfingDetector::compute(&graph, &SmurfingConfig::default());
        assert!(hits.is_empty());
    }

    #[test]
    fn test_disperser_hit() {
        let mut txns = vec![
            txn("F1", "SRC", "HUB", 11000.0, "2024-03-01T00:00:00"),
            txn("F2", "SRC", "HUB", 4000.0, "2024-03-01T04:00:00"),
        ];
        for i in 0..12 {
            let amount = match i {
                10 => 1150.0,
                11 => 1250.0,
                _ => 1200.0,
            };
            txns.push(txn(
                &format!("OUT{i:02}"),
                "HUB",
                &format!("R{i:02}"),
                amount,
                &format!("2024-03-01T{:02}:30:00", 6 + i),
            ));
        }
        let graph = GraphBuilder::from_transactions(txns).unwrap();
        let hits = SmurfingDetector::compute(&graph, &SmurfingConfig::default());
        assert_eq!(hits.len(), 1);
        let hit = &hits[0];
        assert_eq!(hit.kind, SmurfKind::Disperser);
        assert_eq!(graph.account(hit.hub), "HUB");
        // 12 receivers + 1 funding source.
        assert_eq!(hit.counterparties.len(), 13);
    }

    #[test]
    fn test_disperser_rejects_broad_funding() {
        let mut txns = Vec::new();
        for i in 0..4 {
            txns.push(txn(
                &format!("F{i}"),
                &format!("SRC{i}"),
                "HUB",
                4000.0,
                &format!("2024-03-01T0{i}:00:00"),
            ));
        }
        for i in 0..12 {
            txns.push(txn(
                &format!("OUT{i:02}"),
                "HUB",
                &format!("R{i:02}"),
                1200.0,
                &format!("2024-03-01T{:02}:30:00", 6 + i),
            ));
        }
        let graph = GraphBuilder::from_transactions(txns).unwrap();
        let hits = SmurfingDetector::compute(&graph, &SmurfingConfig::default());
        assert!(hits.is_empty());
    }

    #[test]
    fn test_one_hit_per_account_lowest_cv() {
        // Enough inbound edges that several window positions qualify; the
        // scan must still collapse them into a single hit.
        let mut txns = Vec::new();
        for i in 0..20 {
            txns.push(txn(
                &format!("IN{i:02}"),
                &format!("S{i:02}"),
                "HUB",
                900.0 + (i % 4) as f64 * 10.0,
                &format!("2024-03-01T{:02}:00:00", i),
            ));
        }
        for i in 0..8 {
            txns.push(txn(
                &format!("OUT{i}"),
                "HUB",
                &format!("R{i}"),
                2200.0,
                &format!("2024-03-02T{:02}:00:00", i * 2),
            ));
        }
        let graph = GraphBuilder::from_transactions(txns).unwrap();
        let hits = SmurfingDetector::compute(&graph, &SmurfingConfig::default());
        let aggregator_hits: Vec<_> = hits
            .iter()
            .filter(|h| h.kind == SmurfKind::Aggregator)
            .collect();
        assert_eq!(aggregator_hits.len(), 1);
    }

    #[tokio::test]
    async fn test_batch_detector_trait() {
        let graph = Arc::new(GraphBuilder::from_transactions(aggregator_batch()).unwrap());
        let detector = SmurfingDetector::default();
        assert_eq!(detector.id(), "forensics/smurfing-detector");
        let hits = detector.execute(graph).await.unwrap();
        assert_eq!(hits.len(), 1);
    }
}
