//! Pattern tags and detector hit types.

use chrono::NaiveDateTime;
use sentinel_graph::{EdgeId, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Pattern Tags
// ============================================================================

/// A detected behavioral pattern attached to an account.
///
/// Weights feed the base pattern score of the composer; structural tags are
/// the ones allowed to flag an account on their own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternTag {
    /// Member of a validated 3-cycle.
    CycleLength3,
    /// Member of a validated 4-cycle.
    CycleLength4,
    /// Member of a validated 5-cycle.
    CycleLength5,
    /// Fan-in aggregation hub.
    SmurfingAggregator,
    /// Fan-out dispersal hub.
    SmurfingDisperser,
    /// Passthrough intermediary of a shell chain.
    ShellNetwork,
    /// Repeated sub-threshold banded deposits.
    Structuring,
    /// Funds forwarded within one hour of receipt. Contributes to the
    /// score only alongside a structural pattern.
    HighVelocity,
}

impl PatternTag {
    /// Base score contribution.
    #[must_use]
    pub const fn weight(&self) -> f64 {
        match self {
            PatternTag::CycleLength3 => 25.0,
            PatternTag::CycleLength4 => 20.0,
            PatternTag::CycleLength5 => 15.0,
            PatternTag::SmurfingAggregator | PatternTag::SmurfingDisperser => 22.0,
            PatternTag::ShellNetwork => 18.0,
            PatternTag::Structuring => 12.0,
            PatternTag::HighVelocity => 10.0,
        }
    }

    /// Structural patterns can flag an account on their own; velocity
    /// cannot.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        !matches!(self, PatternTag::HighVelocity)
    }

    /// Wire representation used in reports.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            PatternTag::CycleLength3 => "cycle_length_3",
            PatternTag::CycleLength4 => "cycle_length_4",
            PatternTag::CycleLength5 => "cycle_length_5",
            PatternTag::SmurfingAggregator => "smurfing_aggregator",
            PatternTag::SmurfingDisperser => "smurfing_disperser",
            PatternTag::ShellNetwork => "shell_network",
            PatternTag::Structuring => "structuring",
            PatternTag::HighVelocity => "high_velocity",
        }
    }

    /// Cycle tag for a validated cycle of the given length.
    #[must_use]
    pub const fn for_cycle_length(len: usize) -> Option<Self> {
        match len {
            3 => Some(PatternTag::CycleLength3),
            4 => Some(PatternTag::CycleLength4),
            5 => Some(PatternTag::CycleLength5),
            _ => None,
        }
    }
}

impl fmt::Display for PatternTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Detector Hit Types
// ============================================================================

/// Budget bookkeeping a detector returns alongside its hits.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectorDiagnostics {
    /// Operations performed.
    pub ops: u64,
    /// True when the detector stopped early on its budget; results are
    /// partial but valid.
    pub budget_exhausted: bool,
}

/// A validated cycle, in path order starting at the canonical rotation.
#[derive(Debug, Clone)]
pub struct CycleHit {
    /// Cycle nodes; `nodes[0]` is the lexicographically smallest account.
    pub nodes: Vec<NodeId>,
    /// One chosen edge per hop, aligned with `nodes`.
    pub edges: Vec<EdgeId>,
    /// Earliest edge timestamp.
    pub window_start: NaiveDateTime,
    /// Latest edge timestamp.
    pub window_end: NaiveDateTime,
    /// Mean edge amount.
    pub mean_amount: f64,
}

impl CycleHit {
    /// Cycle length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a hit has at least three nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Window duration in whole hours.
    #[must_use]
    pub fn window_hours(&self) -> i64 {
        (self.window_end - self.window_start).num_hours()
    }
}

/// Result of the cycle scan.
#[derive(Debug, Clone, Default)]
pub struct CycleScan {
    /// Validated, canonical, deduplicated cycles in discovery order.
    pub cycles: Vec<CycleHit>,
    /// Budget bookkeeping.
    pub diagnostics: DetectorDiagnostics,
}

/// Direction of a smurfing hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmurfKind {
    /// Fan-in: many similar inbound transfers, then dispersal.
    Aggregator,
    /// Fan-out: many similar outbound transfers from a narrow source.
    Disperser,
}

impl SmurfKind {
    /// Pattern tag for the hub account.
    #[must_use]
    pub const fn tag(&self) -> PatternTag {
        match self {
            SmurfKind::Aggregator => PatternTag::SmurfingAggregator,
            SmurfKind::Disperser => PatternTag::SmurfingDisperser,
        }
    }
}

/// One smurfing hit; at most one per account per kind, lowest-CV window.
#[derive(Debug, Clone)]
pub struct SmurfHit {
    /// Hub account.
    pub hub: NodeId,
    /// Aggregator or disperser.
    pub kind: SmurfKind,
    /// Window open.
    pub window_start: NaiveDateTime,
    /// Window close.
    pub window_end: NaiveDateTime,
    /// Coefficient of variation of the window amounts.
    pub cv: f64,
    /// Edges inside the window (inbound for aggregators, outbound for
    /// dispersers).
    pub fan_count: usize,
    /// Counterparties inside the hit window plus the adjoining span,
    /// distinct, ascending, hub excluded.
    pub counterparties: Vec<NodeId>,
    /// Total inbound amount considered.
    pub inbound_total: f64,
    /// Total outbound amount considered.
    pub outbound_total: f64,
}

/// A walked shell chain between two distinct external endpoints.
#[derive(Debug, Clone)]
pub struct ShellChain {
    /// Non-candidate source endpoint.
    pub source: NodeId,
    /// Passthrough candidates, in walk order.
    pub intermediaries: Vec<NodeId>,
    /// Non-candidate sink endpoint.
    pub sink: NodeId,
}

impl ShellChain {
    /// All chain members, in walk order.
    #[must_use]
    pub fn members(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.intermediaries.len() + 2);
        out.push(self.source);
        out.extend_from_slice(&self.intermediaries);
        out.push(self.sink);
        out
    }

    /// Total chain length including both endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.intermediaries.len() + 2
    }

    /// Always false: a chain has at least two endpoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Result of the shell scan.
#[derive(Debug, Clone, Default)]
pub struct ShellScan {
    /// Valid chains in discovery order, one per (source, sink) pair.
    pub chains: Vec<ShellChain>,
    /// Budget bookkeeping.
    pub diagnostics: DetectorDiagnostics,
}

/// A velocity hit: receipt followed by rapid forwarding.
#[derive(Debug, Clone, Copy)]
pub struct VelocityHit {
    /// Flagged account.
    pub node: NodeId,
    /// Inbound edge.
    pub inbound: EdgeId,
    /// Outbound edge within the window.
    pub outbound: EdgeId,
    /// Gap between the two, in seconds.
    pub lag_seconds: i64,
}

/// Per-account suppression statistics consumed by composer steps 3 and 4.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuppressionFlags {
    /// Merchant-shaped: concentrated counterparty, regular timing.
    pub merchant: bool,
    /// Sustained broad activity: high degree, long span, no dormancy.
    pub sustained_activity: bool,
    /// Top-counterparty repeat ratio.
    pub repeat_ratio: f64,
    /// Inter-arrival timing CV.
    pub timing_cv: f64,
    /// Amount CV over all touching edges.
    pub amount_cv: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_weights_and_wire_names() {
        assert_eq!(PatternTag::CycleLength3.weight(), 25.0);
        assert_eq!(PatternTag::CycleLength4.weight(), 20.0);
        assert_eq!(PatternTag::CycleLength5.weight(), 15.0);
        assert_eq!(PatternTag::SmurfingAggregator.weight(), 22.0);
        assert_eq!(PatternTag::ShellNetwork.weight(), 18.0);
        assert_eq!(PatternTag::HighVelocity.weight(), 10.0);
        assert_eq!(PatternTag::SmurfingDisperser.as_str(), "smurfing_disperser");
        assert_eq!(PatternTag::CycleLength5.to_string(), "cycle_length_5");
    }

    #[test]
    fn test_velocity_is_not_structural() {
        assert!(!PatternTag::HighVelocity.is_structural());
        assert!(PatternTag::Structuring.is_structural());
        assert!(PatternTag::ShellNetwork.is_structural());
    }

    #[test]
    fn test_cycle_tag_by_length() {
        assert_eq!(
            PatternTag::for_cycle_length(3),
            Some(PatternTag::CycleLength3)
        );
        assert_eq!(PatternTag::for_cycle_length(6), None);
        assert_eq!(PatternTag::for_cycle_length(2), None);
    }

    #[test]
    fn test_shell_chain_members() {
        let chain = ShellChain {
            source: 0,
            intermediaries: vec![3, 4],
            sink: 9,
        };
        assert_eq!(chain.members(), vec![0, 3, 4, 9]);
        assert_eq!(chain.len(), 4);
    }
}
