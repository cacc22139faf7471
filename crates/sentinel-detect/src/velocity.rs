//! High-velocity churn detection.
//!
//! A merge-pass over each account's sorted inbound and outbound edge
//! lists: the account is flagged when any receipt is followed within one
//! hour by an outbound transfer of at least half the received amount.

use crate::types::VelocityHit;
use chrono::Duration;
use sentinel_core::config::VelocityConfig;
use sentinel_core::detector::{BatchDetector, Detector, DetectorMetadata, Stage};
use sentinel_core::error::Result;
use sentinel_graph::TxnGraph;
use std::sync::Arc;

/// Rapid in-and-out turnover detector.
#[derive(Debug, Clone)]
pub struct VelocityDetector {
    metadata: DetectorMetadata,
    config: VelocityConfig,
}

impl Default for VelocityDetector {
    fn default() -> Self {
        Self::new(VelocityConfig::default())
    }
}

impl VelocityDetector {
    /// Create a velocity detector with the given thresholds.
    #[must_use]
    pub fn new(config: VelocityConfig) -> Self {
        Self {
            metadata: DetectorMetadata::new("forensics/velocity-detector", Stage::Detection)
                .with_description("Inbound-to-outbound turnover within one hour")
                .with_throughput(500_000),
            config,
        }
    }

    /// Scan every account; first qualifying pair per account.
    pub fn compute(graph: &TxnGraph, config: &VelocityConfig) -> Vec<VelocityHit> {
        let window = Duration::hours(config.window_hours);
        let mut hits = Vec::new();

        'nodes: for node in graph.node_ids() {
            let inbound = graph.incoming(node);
            let outbound = graph.outgoing(node);
            if inbound.is_empty() || outbound.is_empty() {
                continue;
            }

            for &ie in inbound {
                let in_edge = graph.edge(ie);
                let start =
                    outbound.partition_point(|&oe| graph.edge(oe).timestamp < in_edge.timestamp);
                for &oe in &outbound[start..] {
                    let out_edge = graph.edge(oe);
                    if out_edge.timestamp - in_edge.timestamp > window {
                        break;
                    }
                    if out_edge.amount >= config.min_amount_ratio * in_edge.amount {
                        hits.push(VelocityHit {
                            node,
                            inbound: ie,
                            outbound: oe,
                            lag_seconds: (out_edge.timestamp - in_edge.timestamp).num_seconds(),
                        });
                        continue 'nodes;
                    }
                }
            }
        }
        hits
    }
}

impl Detector for VelocityDetector {
    fn metadata(&self) -> &DetectorMetadata {
        &self.metadata
    }
}

#[async_trait::async_trait]
impl BatchDetector<Arc<TxnGraph>, Vec<VelocityHit>> for VelocityDetector {
    async fn execute(&self, graph: Arc<TxnGraph>) -> Result<Vec<VelocityHit>> {
        Ok(Self::compute(&graph, &self.config))
    }
}
