//! Report and graph-data output shapes.
//!
//! Field names and nesting match the external interface contract exactly;
//! collaborators deserialize these without adapters.

use serde::{Deserialize, Serialize};

/// Batch-level counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Accounts present in the batch.
    pub total_accounts_analyzed: usize,
    /// Accounts with a positive suspicion score.
    pub suspicious_accounts_flagged: usize,
    /// Rings across all pattern families.
    pub fraud_rings_detected: usize,
    /// Wall-clock analysis time.
    pub processing_time_seconds: f64,
}

/// One ring entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingEntry {
    /// Stable type-prefixed id, e.g. `R-SH-0001`.
    pub ring_id: String,
    /// `"cycle"`, `"smurfing"`, or `"shell"`.
    pub pattern_type: String,
    /// Member account ids, ascending.
    pub member_accounts: Vec<String>,
    /// Max member suspicion.
    pub risk_score: u32,
}

/// One flagged account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspiciousAccount {
    /// Account id.
    pub account_id: String,
    /// Suspicion score in 0..=100.
    pub suspicion_score: u32,
    /// Detected pattern tags, sorted.
    pub detected_patterns: Vec<String>,
    /// First associated ring, if any.
    pub ring_id: Option<String>,
    /// Dominant-evidence summary.
    pub explanation: String,
}

/// The full forensic report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForensicsReport {
    /// Batch counters.
    pub summary: ReportSummary,
    /// Rings in id order.
    pub fraud_rings: Vec<RingEntry>,
    /// Flagged accounts, score descending then account id ascending.
    pub suspicious_accounts: Vec<SuspiciousAccount>,
}

impl ForensicsReport {
    /// Serialize to a compact JSON string.
    pub fn to_json(&self) -> sentinel_core::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> sentinel_core::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// One node of the visualization payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    /// Account id.
    pub id: String,
    /// Display label (the account id).
    pub label: String,
    /// Suspicion score in 0..=100.
    pub suspicion_score: u32,
    /// Inbound transaction count.
    pub in_degree: usize,
    /// Outbound transaction count.
    pub out_degree: usize,
    /// Total inbound volume.
    pub total_incoming: f64,
    /// Total outbound volume.
    pub total_outgoing: f64,
    /// Detected pattern tags, sorted.
    pub detected_patterns: Vec<String>,
}

/// One collapsed edge of the visualization payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Sender account id.
    pub from: String,
    /// Receiver account id.
    pub to: String,
    /// Display weight, scaled into 1..=6.
    pub value: f64,
    /// Tooltip: formatted total amount over all parallel edges.
    pub title: String,
}

/// Visualization payload: nodes plus parallel-edge-collapsed edges.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphData {
    /// All accounts.
    pub nodes: Vec<GraphNode>,
    /// Collapsed directed edges.
    pub edges: Vec<GraphEdge>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_json_shape() {
        let report = ForensicsReport {
            summary: ReportSummary {
                total_accounts_analyzed: 3,
                suspicious_accounts_flagged: 1,
                fraud_rings_detected: 1,
                processing_time_seconds: 0.12,
            },
            fraud_rings: vec![RingEntry {
                ring_id: "R-C-0001".to_string(),
                pattern_type: "cycle".to_string(),
                member_accounts: vec!["A".to_string(), "B".to_string()],
                risk_score: 40,
            }],
            suspicious_accounts: vec![SuspiciousAccount {
                account_id: "A".to_string(),
                suspicion_score: 40,
                detected_patterns: vec!["cycle_length_3".to_string()],
                ring_id: Some("R-C-0001".to_string()),
                explanation: "Part of a 3-node circular routing loop".to_string(),
            }],
        };

        let value: serde_json::Value =
            serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["summary"]["total_accounts_analyzed"], 3);
        assert_eq!(value["fraud_rings"][0]["ring_id"], "R-C-0001");
        assert_eq!(value["fraud_rings"][0]["pattern_type"], "cycle");
        assert_eq!(value["suspicious_accounts"][0]["suspicion_score"], 40);
        assert_eq!(value["suspicious_accounts"][0]["ring_id"], "R-C-0001");
    }

    #[test]
    fn test_null_ring_id_serializes_as_null() {
        let account = SuspiciousAccount {
            account_id: "A".to_string(),
            suspicion_score: 18,
            detected_patterns: Vec::new(),
            ring_id: None,
            explanation: String::new(),
        };
        let value = serde_json::to_value(&account).unwrap();
        assert!(value["ring_id"].is_null());
    }

    #[test]
    fn test_graph_data_roundtrip() {
        let data = GraphData {
            nodes: vec![GraphNode {
                id: "A".to_string(),
                label: "A".to_string(),
                suspicion_score: 10,
                in_degree: 1,
                out_degree: 2,
                total_incoming: 50.0,
                total_outgoing: 70.0,
                detected_patterns: Vec::new(),
            }],
            edges: vec![GraphEdge {
                from: "A".to_string(),
                to: "B".to_string(),
                value: 1.0,
                title: "$70.00".to_string(),
            }],
        };
        let text = serde_json::to_string(&data).unwrap();
        let back: GraphData = serde_json::from_str(&text).unwrap();
        assert_eq!(back.nodes.len(), 1);
        assert_eq!(back.edges[0].to, "B");
    }
}
