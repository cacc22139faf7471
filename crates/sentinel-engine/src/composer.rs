//! Suspicion score composition.
//!
//! Per-account fusion of all evidence, in strict order: base pattern
//! score (capped), anomaly bonus, merchant penalty, activity-suppression
//! penalty, then a cluster booster computed over a snapshot of the
//! post-penalty scores for every node. Accounts without structural
//! evidence are zeroed unless the booster carried them over the flag
//! threshold; the anomaly signal alone can never flag an account.

use crate::rings::RingSet;
use sentinel_core::config::ScoringConfig;
use sentinel_detect::{CycleHit, PatternTag, ShellChain, SmurfHit, SmurfKind, SuppressionFlags};
use sentinel_graph::{NodeId, TxnGraph};
use std::collections::BTreeSet;

/// Read-only inputs of the composer, all indexed by node id.
#[derive(Debug)]
pub struct ComposerContext<'a> {
    /// The immutable batch graph.
    pub graph: &'a TxnGraph,
    /// Detected pattern tags per node.
    pub tags: &'a [BTreeSet<PatternTag>],
    /// Anomaly bonus per node, already scaled.
    pub anomaly: &'a [f64],
    /// Suppression evidence per node.
    pub suppression: &'a [SuppressionFlags],
    /// Assembled rings, for id interpolation in explanations.
    pub rings: &'a RingSet,
    /// Validated cycles, for explanation statistics.
    pub cycles: &'a [CycleHit],
    /// Smurfing hits, for explanation statistics.
    pub smurfs: &'a [SmurfHit],
    /// Shell chains, for explanation statistics.
    pub shells: &'a [ShellChain],
}

/// Final per-account outcome.
#[derive(Debug, Clone)]
pub struct Verdict {
    /// Node id.
    pub node: NodeId,
    /// Clamped suspicion score.
    pub score: f64,
    /// Rounded score as reported.
    pub rounded: u32,
    /// Detected pattern tags.
    pub tags: BTreeSet<PatternTag>,
    /// True when the cluster booster fired for this node.
    pub boosted: bool,
    /// Human-readable summary of the dominant evidence.
    pub explanation: String,
}

/// Compose suspicion scores for every node.
///
/// Returns one verdict per node, ranked by score descending with ties
/// broken by ascending account id.
#[must_use]
pub fn compose(ctx: &ComposerContext<'_>, config: &ScoringConfig) -> Vec<Verdict> {
    let n = ctx.graph.node_count();
    let mut scores = vec![0.0f64; n];
    let mut structural = vec![false; n];

    // Steps 1-4: per-node, no cross-node dependencies.
    for node in 0..n {
        let tags = &ctx.tags[node];
        structural[node] = tags.iter().any(PatternTag::is_structural);

        let mut base: f64 = tags
            .iter()
            .filter(|t| t.is_structural() || structural[node])
            .map(PatternTag::weight)
            .sum();
        base = base.min(config.base_cap);

        let mut score = base + ctx.anomaly[node];

        let flags = &ctx.suppression[node];
        if flags.merchant {
            score -= config.merchant_penalty;
        }
        if flags.sustained_activity {
            score -= config.activity_penalty;
        }
        scores[node] = score;
    }

    // Step 5 reads a snapshot of the step-4 scores for all nodes; the
    // booster must not observe its own effects.
    let snapshot = scores.clone();
    let mut boosted = vec![false; n];
    for node in 0..n {
        let flagged_neighbors = ctx
            .graph
            .neighbors(node as NodeId)
            .into_iter()
            .filter(|&peer| snapshot[peer as usize] > config.booster_neighbor_score)
            .count();
        if flagged_neighbors >= config.booster_min_neighbors {
            scores[node] += config.booster_bonus;
            boosted[node] = true;
        }
    }

    // Steps 6-7: clamp, zero out unflaggable accounts, rank.
    let mut verdicts: Vec<Verdict> = (0..n)
        .map(|node| {
            let mut score = scores[node].clamp(0.0, 100.0);
            if !structural[node] && !(boosted[node] && score >= config.flag_threshold) {
                score = 0.0;
            }
            let node_id = node as NodeId;
            let explanation = explanation_for(ctx, node_id, boosted[node]);
            Verdict {
                node: node_id,
                score,
                rounded: score.round() as u32,
                tags: ctx.tags[node].clone(),
                boosted: boosted[node],
                explanation,
            }
        })
        .collect();

    verdicts.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| ctx.graph.account(a.node).cmp(ctx.graph.account(b.node)))
    });
    verdicts
}

/// Explanation template keyed on the highest-weighted pattern.
fn explanation_for(ctx: &ComposerContext<'_>, node: NodeId, boosted: bool) -> String {
    let tags = &ctx.tags[node as usize];
    let top = tags
        .iter()
        .max_by_key(|t| (t.weight() * 100.0) as u64)
        .copied();

    let ring_suffix = ctx
        .rings
        .ring_id_of(node)
        .map(|id| format!(" in ring {id}"))
        .unwrap_or_default();

    match top {
        Some(tag @ (PatternTag::CycleLength3 | PatternTag::CycleLength4 | PatternTag::CycleLength5)) => {
            let length = match tag {
                PatternTag::CycleLength3 => 3,
                PatternTag::CycleLength4 => 4,
                _ => 5,
            };
            let hours = ctx
                .cycles
                .iter()
                .find(|c| c.len() == length && c.nodes.contains(&node))
                .map(|c| c.window_hours())
                .unwrap_or(0);
            format!(
                "Part of a {length}-node circular routing loop{ring_suffix} closed within {hours}h"
            )
        }
        Some(PatternTag::SmurfingAggregator) => {
            match ctx
                .smurfs
                .iter()
                .find(|h| h.hub == node && h.kind == SmurfKind::Aggregator)
            {
                Some(hit) => {
                    let forwarded = if hit.inbound_total > 0.0 {
                        (hit.outbound_total / hit.inbound_total * 100.0).min(100.0)
                    } else {
                        0.0
                    };
                    format!(
                        "Aggregated {} similar-sized transfers{ring_suffix}, forwarding {forwarded:.0}% of the funds",
                        hit.fan_count
                    )
                }
                None => format!("Fan-in aggregation hub{ring_suffix}"),
            }
        }
        Some(PatternTag::SmurfingDisperser) => {
            match ctx
                .smurfs
                .iter()
                .find(|h| h.hub == node && h.kind == SmurfKind::Disperser)
            {
                Some(hit) => format!(
                    "Dispersed {} similar-sized transfers from a narrow funding source{ring_suffix}",
                    hit.fan_count
                ),
                None => format!("Fan-out dispersal hub{ring_suffix}"),
            }
        }
        Some(PatternTag::ShellNetwork) => {
            let hops = ctx
                .shells
                .iter()
                .find(|c| c.intermediaries.contains(&node))
                .map(|c| c.len())
                .unwrap_or(0);
            format!("Relay hop on a {hops}-account passthrough chain{ring_suffix}")
        }
        Some(PatternTag::Structuring) => {
            "Repeated sub-threshold transfers across separate windows".to_string()
        }
        Some(PatternTag::HighVelocity) => {
            "Funds forwarded within one hour of receipt".to_string()
        }
        None if boosted => "Transacts with multiple flagged counterparties".to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rings::build_rings;
    use sentinel_graph::{types::parse_timestamp, GraphBuilder, Transaction};

    fn txn(id: &str, from: &str, to: &str, amount: f64, when: &str) -> Transaction {
        Transaction::new(id, from, to, amount, parse_timestamp(when).unwrap()).unwrap()
    }

    /// N3 transacts with both N1 and N2; N4 is a bystander.
    fn cluster_graph() -> sentinel_graph::TxnGraph {
        GraphBuilder::from_transactions(vec![
            txn("T1", "N1", "N3", 500.0, "2024-03-01T00:00:00"),
            txn("T2", "N3", "N2", 450.0, "2024-03-01T01:00:00"),
            txn("T3", "N4", "N1", 100.0, "2024-03-01T02:00:00"),
        ])
        .unwrap()
    }

    struct Fixture {
        graph: sentinel_graph::TxnGraph,
        tags: Vec<BTreeSet<PatternTag>>,
        anomaly: Vec<f64>,
        suppression: Vec<SuppressionFlags>,
        rings: RingSet,
    }

    impl Fixture {
        fn new(graph: sentinel_graph::TxnGraph) -> Self {
            let n = graph.node_count();
            let rings = build_rings(&graph, &[], &[], &[], 30);
            Self {
                graph,
                tags: vec![BTreeSet::new(); n],
                anomaly: vec![0.0; n],
                suppression: vec![SuppressionFlags::default(); n],
                rings,
            }
        }

        fn compose(&self) -> Vec<Verdict> {
            let ctx = ComposerContext {
                graph: &self.graph,
                tags: &self.tags,
                anomaly: &self.anomaly,
                suppression: &self.suppression,
                rings: &self.rings,
                cycles: &[],
                smurfs: &[],
                shells: &[],
            };
            compose(&ctx, &ScoringConfig::default())
        }

        fn score_of(&self, verdicts: &[Verdict], account: &str) -> f64 {
            let node = self.graph.resolve(account).unwrap();
            verdicts.iter().find(|v| v.node == node).unwrap().score
        }
    }

    #[test]
    fn test_base_weights_and_cap() {
        let mut fx = Fixture::new(cluster_graph());
        let n1 = fx.graph.resolve("N1").unwrap() as usize;
        fx.tags[n1].insert(PatternTag::CycleLength3);
        fx.tags[n1].insert(PatternTag::SmurfingAggregator);
        fx.tags[n1].insert(PatternTag::SmurfingDisperser);
        fx.tags[n1].insert(PatternTag::ShellNetwork);
        // 25 + 22 + 22 + 18 = 87, capped at 70.
        let verdicts = fx.compose();
        assert!((fx.score_of(&verdicts, "N1") - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_velocity_only_suppressed() {
        let mut fx = Fixture::new(cluster_graph());
        let n1 = fx.graph.resolve("N1").unwrap() as usize;
        fx.tags[n1].insert(PatternTag::HighVelocity);
        fx.anomaly[n1] = 12.0;
        let verdicts = fx.compose();
        assert_eq!(fx.score_of(&verdicts, "N1"), 0.0);
    }

    #[test]
    fn test_velocity_counts_with_structural_pattern() {
        let mut fx = Fixture::new(cluster_graph());
        let n1 = fx.graph.resolve("N1").unwrap() as usize;
        fx.tags[n1].insert(PatternTag::ShellNetwork);
        let verdicts = fx.compose();
        let without = fx.score_of(&verdicts, "N1");

        fx.tags[n1].insert(PatternTag::HighVelocity);
        let verdicts = fx.compose();
        let with = fx.score_of(&verdicts, "N1");
        assert!((with - without - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_anomaly_alone_cannot_flag() {
        let mut fx = Fixture::new(cluster_graph());
        let n1 = fx.graph.resolve("N1").unwrap() as usize;
        fx.anomaly[n1] = 15.0;
        let verdicts = fx.compose();
        assert_eq!(fx.score_of(&verdicts, "N1"), 0.0);
    }

    #[test]
    fn test_merchant_penalty_applies() {
        let mut fx = Fixture::new(cluster_graph());
        let n1 = fx.graph.resolve("N1").unwrap() as usize;
        fx.tags[n1].insert(PatternTag::SmurfingAggregator);
        fx.suppression[n1].merchant = true;
        let verdicts = fx.compose();
        // 22 - 20 = 2.
        assert!((fx.score_of(&verdicts, "N1") - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_activity_suppression_clamps_at_zero() {
        let mut fx = Fixture::new(cluster_graph());
        let n1 = fx.graph.resolve("N1").unwrap() as usize;
        fx.tags[n1].insert(PatternTag::ShellNetwork);
        fx.suppression[n1].sustained_activity = true;
        let verdicts = fx.compose();
        // 18 - 50 clamps to 0.
        assert_eq!(fx.score_of(&verdicts, "N1"), 0.0);
    }

    #[test]
    fn test_cluster_booster_flags_bystander() {
        let mut fx = Fixture::new(cluster_graph());
        let n1 = fx.graph.resolve("N1").unwrap() as usize;
        let n2 = fx.graph.resolve("N2").unwrap() as usize;
        let n3 = fx.graph.resolve("N3").unwrap() as usize;
        // N1 lands at 35, N2 at 40 pre-boost; N3 has only anomaly 10.
        fx.tags[n1].insert(PatternTag::CycleLength3);
        fx.anomaly[n1] = 10.0;
        fx.tags[n2].insert(PatternTag::CycleLength3);
        fx.anomaly[n2] = 15.0;
        fx.anomaly[n3] = 10.0;

        let verdicts = fx.compose();
        let n3_verdict = verdicts
            .iter()
            .find(|v| v.node == n3 as u32)
            .unwrap();
        assert!(n3_verdict.boosted);
        assert!((n3_verdict.score - 18.0).abs() < 1e-9);
        assert!(n3_verdict.tags.is_empty());
        assert_eq!(
            n3_verdict.explanation,
            "Transacts with multiple flagged counterparties"
        );
    }

    #[test]
    fn test_booster_reads_pre_boost_snapshot() {
        // N4 neighbors only N1. Even if N1 ends above 30 after boosting,
        // N4 must see the pre-boost snapshot (and one neighbor is too few
        // anyway); N4 stays at zero.
        let mut fx = Fixture::new(cluster_graph());
        let n1 = fx.graph.resolve("N1").unwrap() as usize;
        fx.tags[n1].insert(PatternTag::CycleLength3);
        let verdicts = fx.compose();
        assert_eq!(fx.score_of(&verdicts, "N4"), 0.0);
    }

    #[test]
    fn test_boosted_below_threshold_stays_zero() {
        let mut fx = Fixture::new(cluster_graph());
        let n1 = fx.graph.resolve("N1").unwrap() as usize;
        let n2 = fx.graph.resolve("N2").unwrap() as usize;
        let n3 = fx.graph.resolve("N3").unwrap() as usize;
        fx.tags[n1].insert(PatternTag::CycleLength3);
        fx.anomaly[n1] = 10.0;
        fx.tags[n2].insert(PatternTag::CycleLength3);
        fx.anomaly[n2] = 15.0;
        // Anomaly 5 + booster 8 = 13 < 15.
        fx.anomaly[n3] = 5.0;
        let verdicts = fx.compose();
        assert_eq!(fx.score_of(&verdicts, "N3"), 0.0);
    }

    #[test]
    fn test_ranking_order() {
        let mut fx = Fixture::new(cluster_graph());
        let n1 = fx.graph.resolve("N1").unwrap() as usize;
        let n2 = fx.graph.resolve("N2").unwrap() as usize;
        fx.tags[n1].insert(PatternTag::ShellNetwork);
        fx.tags[n2].insert(PatternTag::ShellNetwork);
        let verdicts = fx.compose();
        // Equal scores: ties break on ascending account id, zeros last.
        let order: Vec<&str> = verdicts
            .iter()
            .map(|v| fx.graph.account(v.node))
            .collect();
        assert_eq!(order[0], "N1");
        assert_eq!(order[1], "N2");
    }

    #[test]
    fn test_scores_bounded() {
        let mut fx = Fixture::new(cluster_graph());
        for node in 0..fx.graph.node_count() {
            fx.tags[node].insert(PatternTag::CycleLength3);
            fx.tags[node].insert(PatternTag::SmurfingAggregator);
            fx.tags[node].insert(PatternTag::SmurfingDisperser);
            fx.anomaly[node] = 15.0;
        }
        let verdicts = fx.compose();
        for v in &verdicts {
            assert!(v.score >= 0.0 && v.score <= 100.0);
            assert!(v.rounded <= 100);
        }
    }
}
