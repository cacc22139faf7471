//! Sub-threshold structuring detection.
//!
//! Flags accounts that repeatedly move amounts parked just below common
//! reporting thresholds: at least five banded transactions inside a 48 h
//! window, with the pattern recurring across two or more windows separated
//! by at least one window length.

use chrono::{Duration, NaiveDateTime};
use sentinel_core::config::StructuringConfig;
use sentinel_core::detector::{BatchDetector, Detector, DetectorMetadata, Stage};
use sentinel_core::error::Result;
use sentinel_graph::{NodeId, TxnGraph};
use std::sync::Arc;

/// Near-threshold band structuring detector.
#[derive(Debug, Clone)]
pub struct StructuringDetector {
    metadata: DetectorMetadata,
    config: StructuringConfig,
}

impl Default for StructuringDetector {
    fn default() -> Self {
        Self::new(StructuringConfig::default())
    }
}

impl StructuringDetector {
    /// Create a structuring detector with the given thresholds.
    #[must_use]
    pub fn new(config: StructuringConfig) -> Self {
        Self {
            metadata: DetectorMetadata::new("forensics/structuring-detector", Stage::Detection)
                .with_description("Repeated sub-threshold banded transfers across windows")
                .with_throughput(200_000),
            config,
        }
    }

    /// Scan every account; returns flagged node ids ascending.
    pub fn compute(graph: &TxnGraph, config: &StructuringConfig) -> Vec<NodeId> {
        let window = Duration::hours(config.window_hours);
        let mut flagged = Vec::new();

        for node in graph.node_ids() {
            let banded: Vec<NaiveDateTime> = graph
                .touching(node)
                .into_iter()
                .filter_map(|e| {
                    let edge = graph.edge(e);
                    let in_band = config
                        .bands
                        .iter()
                        .any(|&(lo, hi)| edge.amount >= lo && edge.amount <= hi);
                    in_band.then_some(edge.timestamp)
                })
                .collect();

            if banded.len() < config.min_hits {
                continue;
            }

            // Qualifying windows must not overlap: each new window start is
            // at least one window length after the previous one.
            let mut qualifying: Vec<NaiveDateTime> = Vec::new();
            let mut right = 0usize;
            for left in 0..banded.len() {
                let window_start = banded[left];
                let window_end = window_start + window;
                while right < banded.len() && banded[right] <= window_end {
                    right += 1;
                }
                if right - left >= config.min_hits {
                    let spaced = qualifying
                        .last()
                        .map_or(true, |&prev| window_start - prev >= window);
                    if spaced {
                        qualifying.push(window_start);
                    }
                }
            }

            if qualifying.len() >= config.min_windows {
                flagged.push(node);
            }
        }
        flagged
    }
}

impl Detector for StructuringDetector {
    fn metadata(&self) -> &DetectorMetadata {
        &self.metadata
    }
}

#[async_trait::async_trait]
impl BatchDetector<Arc<TxnGraph>, Vec<NodeId>> for StructuringDetector {
    async fn execute(&self, graph: Arc<TxnGraph>) -> Result<Vec<NodeId>> {
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

    fn flagged_accounts(txns: Vec<Transaction>) -> Vec<String> {
        let graph = GraphBuilder::from_transactions(txns).unwrap();
        StructuringDetector::compute(&graph, &StructuringConfig::default())
            .into_iter()
            .map(|n| graph.account(n).to_string())
            .collect()
    }

    /// Five banded deposits on day 1 and five more on day 5.
    fn repeated_windows() -> Vec<Transaction> {
        let mut txns = Vec::new();
        for i in 0..5 {
            txns.push(txn(
                &format!("W1-{i}"),
                "M",
                &format!("R{i}"),
                9_200.0 + i as f64 * 50.0,
                &format!("2024-03-01T{:02}:00:00", i * 4),
            ));
        }
        for i in 0..5 {
            txns.push(txn(
                &format!("W2-{i}"),
                "M",
                &format!("R{i}"),
                9_300.0 + i as f64 * 50.0,
                &format!("2024-03-05T{:02}:00:00", i * 4),
            ));
        }
        txns
    }

    #[test]
    fn test_repeated_banded_windows_flagged() {
        assert_eq!(flagged_accounts(repeated_windows()), vec!["M".to_string()]);
    }

    #[test]
    fn test_single_window_not_flagged() {
        let txns: Vec<Transaction> = repeated_windows()
            .into_iter()
            .filter(|t| t.txn_id.starts_with("W1"))
            .collect();
        assert!(flagged_accounts(txns).is_empty());
    }

    #[test]
    fn test_amounts_outside_bands_ignored() {
        let mut txns = Vec::new();
        for w in 0..2 {
            for i in 0..5 {
                txns.push(txn(
                    &format!("W{w}-{i}"),
                    "M",
                    &format!("R{i}"),
                    // Comfortably above every reporting band.
                    15_000.0 + i as f64 * 100.0,
                    &format!("2024-03-{:02}T{:02}:00:00", 1 + w * 4, i * 4),
                ));
            }
        }
        assert!(flagged_accounts(txns).is_empty());
    }

    #[test]
    fn test_lower_band_counts_too() {
        let mut txns = Vec::new();
        for w in 0..2 {
            for i in 0..5 {
                txns.push(txn(
                    &format!("W{w}-{i}"),
                    "M",
                    &format!("R{i}"),
                    4_500.0,
                    &format!("2024-03-{:02}T{:02}:00:00", 1 + w * 4, i * 4),
                ));
            }
        }
        assert_eq!(flagged_accounts(txns), vec!["M".to_string()]);
    }

    #[test]
    fn test_overlapping_windows_count_once() {
        // Ten banded transfers inside 40 hours: many window positions
        // qualify, but they all overlap, so only one window counts.
        let mut txns = Vec::new();
        for i in 0..10 {
            txns.push(txn(
                &format!("T{i}"),
                "M",
                &format!("R{i}"),
                9_500.0,
                &format!("2024-03-01T{:02}:00:00", i * 4),
            ));
        }
        assert!(flagged_accounts(txns).is_empty());
    }
}
