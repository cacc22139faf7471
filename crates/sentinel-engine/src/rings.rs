//! Ring assembly.
//!
//! Cycle rings merge overlapping validated cycles through a size-capped
//! union-find; smurfing and shell hits map one-to-one onto rings. Ring ids
//! are stable: `R-{TYPE}-{0000}` with the numeric suffix incrementing per
//! type in discovery order.

use sentinel_detect::{CycleHit, ShellChain, SmurfHit};
use sentinel_graph::{NodeId, TxnGraph, UnionFind};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Pattern family of a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingPattern {
    /// Merged circular-flow cycles.
    Cycle,
    /// One smurfing hub with its window counterparties.
    Smurfing,
    /// One walked shell chain.
    Shell,
}

impl RingPattern {
    /// Wire representation used in reports.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RingPattern::Cycle => "cycle",
            RingPattern::Smurfing => "smurfing",
            RingPattern::Shell => "shell",
        }
    }

    /// Ring-id prefix letter(s).
    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        match self {
            RingPattern::Cycle => "C",
            RingPattern::Smurfing => "S",
            RingPattern::Shell => "SH",
        }
    }
}

/// A named group of co-implicated accounts.
#[derive(Debug, Clone)]
pub struct Ring {
    /// Stable type-prefixed identifier, e.g. `R-C-0001`.
    pub ring_id: String,
    /// Pattern family.
    pub pattern: RingPattern,
    /// Member nodes, ascending.
    pub members: Vec<NodeId>,
    /// Max member suspicion, filled after scoring.
    pub risk_score: u32,
}

/// All rings of a batch plus the first-ring membership index.
#[derive(Debug, Clone, Default)]
pub struct RingSet {
    /// Rings in id order: cycle rings, then smurfing, then shell.
    pub rings: Vec<Ring>,
    membership: HashMap<NodeId, usize>,
}

impl RingSet {
    /// Number of rings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rings.len()
    }

    /// True when no rings were detected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    /// Id of the first ring a node belongs to.
    #[must_use]
    pub fn ring_id_of(&self, node: NodeId) -> Option<&str> {
        self.membership
            .get(&node)
            .map(|&idx| self.rings[idx].ring_id.as_str())
    }

    /// Fill ring risk scores as the max member suspicion.
    pub fn assign_risk_scores(&mut self, suspicion_by_node: &[u32]) {
        for ring in &mut self.rings {
            ring.risk_score = ring
                .members
                .iter()
                .map(|&n| suspicion_by_node[n as usize])
                .max()
                .unwrap_or(0);
        }
    }
}

/// Assemble rings from the detector outputs.
#[must_use]
pub fn build_rings(
    graph: &TxnGraph,
    cycles: &[CycleHit],
    smurfs: &[SmurfHit],
    shells: &[ShellChain],
    max_cycle_ring: usize,
) -> RingSet {
    let mut set = RingSet::default();

    for members in merge_cycles(graph, cycles, max_cycle_ring) {
        push_ring(&mut set, RingPattern::Cycle, members);
    }

    for hit in smurfs {
        let mut members: BTreeSet<NodeId> = hit.counterparties.iter().copied().collect();
        members.insert(hit.hub);
        push_ring(&mut set, RingPattern::Smurfing, members.into_iter().collect());
    }

    for chain in shells {
        let mut members = chain.members();
        members.sort_unstable();
        members.dedup();
        push_ring(&mut set, RingPattern::Shell, members);
    }

    set
}

fn push_ring(set: &mut RingSet, pattern: RingPattern, members: Vec<NodeId>) {
    let sequence = set
        .rings
        .iter()
        .filter(|r| r.pattern == pattern)
        .count()
        + 1;
    let idx = set.rings.len();
    for &node in &members {
        set.membership.entry(node).or_insert(idx);
    }
    set.rings.push(Ring {
        ring_id: format!("R-{}-{:04}", pattern.prefix(), sequence),
        pattern,
        members,
        risk_score: 0,
    });
}

/// Union-find merge of overlapping cycles with a member cap. A cycle whose
/// merge would push a component past the cap keeps its own ring; member
/// ordering inside each ring is ascending, ring ordering follows first
/// cycle discovery.
fn merge_cycles(
    graph: &TxnGraph,
    cycles: &[CycleHit],
    max_cycle_ring: usize,
) -> Vec<Vec<NodeId>> {
    if cycles.is_empty() {
        return Vec::new();
    }

    let mut uf = UnionFind::new(graph.node_count());
    let mut involved: BTreeSet<NodeId> = BTreeSet::new();
    let mut discovery: HashMap<NodeId, usize> = HashMap::new();
    let mut standalone: Vec<(usize, Vec<NodeId>)> = Vec::new();

    for (idx, cycle) in cycles.iter().enumerate() {
        let mut roots: Vec<NodeId> = cycle.nodes.iter().map(|&n| uf.find(n)).collect();
        roots.sort_unstable();
        roots.dedup();

        let merged_size: u32 = roots.iter().map(|&r| uf.component_size(r)).sum();
        if merged_size as usize > max_cycle_ring {
            let mut members = cycle.nodes.clone();
            members.sort_unstable();
            standalone.push((idx, members));
            continue;
        }

        let earliest = roots
            .iter()
            .filter_map(|r| discovery.get(r).copied())
            .min()
            .unwrap_or(idx)
            .min(idx);

        let mut root = cycle.nodes[0];
        for &node in &cycle.nodes[1..] {
            root = uf.union(root, node);
        }
        for r in roots {
            discovery.remove(&r);
        }
        discovery.insert(uf.find(root), earliest);
        involved.extend(cycle.nodes.iter().copied());
    }

    let mut components: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
    for &node in &involved {
        components.entry(uf.find(node)).or_default().push(node);
    }

    let mut ordered: Vec<(usize, Vec<NodeId>)> = components
        .into_iter()
        .map(|(root, members)| (discovery.get(&root).copied().unwrap_or(usize::MAX), members))
        .collect();
    ordered.extend(standalone);
    ordered.sort_by_key(|(disc, _)| *disc);
    ordered.into_iter().map(|(_, members)| members).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use sentinel_graph::{types::parse_timestamp, GraphBuilder, Transaction};

    fn txn(id: &str, from: &str, to: &str, amount: f64, when: &str) -> Transaction {
        Transaction::new(id, from, to, amount, parse_timestamp(when).unwrap()).unwrap()
    }

    fn stamp() -> NaiveDateTime {
        parse_timestamp("2024-03-01T00:00:00").unwrap()
    }

    fn cycle(nodes: &[NodeId]) -> CycleHit {
        CycleHit {
            nodes: nodes.to_vec(),
            edges: Vec::new(),
            window_start: stamp(),
            window_end: stamp(),
            mean_amount: 1000.0,
        }
    }

    /// Ten isolated accounts to give union-find a real node universe.
    fn graph_with_nodes() -> sentinel_graph::TxnGraph {
        let txns: Vec<Transaction> = (0..5)
            .map(|i| {
                txn(
                    &format!("T{i}"),
                    &format!("N{i}"),
                    &format!("N{}", i + 5),
                    100.0,
                    "2024-03-01T00:00:00",
                )
            })
            .collect();
        GraphBuilder::from_transactions(txns).unwrap()
    }

    #[test]
    fn test_overlapping_cycles_merge() {
        let graph = graph_with_nodes();
        let set = build_rings(
            &graph,
            &[cycle(&[0, 1, 2]), cycle(&[2, 3, 4])],
            &[],
            &[],
            30,
        );
        assert_eq!(set.len(), 1);
        assert_eq!(set.rings[0].ring_id, "R-C-0001");
        assert_eq!(set.rings[0].members, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_disjoint_cycles_stay_separate() {
        let graph = graph_with_nodes();
        let set = build_rings(
            &graph,
            &[cycle(&[0, 1, 2]), cycle(&[5, 6, 7])],
            &[],
            &[],
            30,
        );
        assert_eq!(set.len(), 2);
        assert_eq!(set.rings[0].members, vec![0, 1, 2]);
        assert_eq!(set.rings[1].ring_id, "R-C-0002");
    }

    #[test]
    fn test_size_cap_refuses_merge() {
        let graph = graph_with_nodes();
        // Cap 5: the third cycle would grow the component to 7 members.
        let set = build_rings(
            &graph,
            &[
                cycle(&[0, 1, 2]),
                cycle(&[2, 3, 4]),
                cycle(&[4, 8, 9]),
            ],
            &[],
            &[],
            5,
        );
        assert_eq!(set.len(), 2);
        assert_eq!(set.rings[0].members, vec![0, 1, 2, 3, 4]);
        // The refused cycle keeps its own ring.
        assert_eq!(set.rings[1].members, vec![4, 8, 9]);
    }

    #[test]
    fn test_ring_id_sequences_per_type() {
        let graph = graph_with_nodes();
        let smurf = SmurfHit {
            hub: 5,
            kind: sentinel_detect::SmurfKind::Aggregator,
            window_start: stamp(),
            window_end: stamp(),
            cv: 0.1,
            fan_count: 10,
            counterparties: vec![6, 7],
            inbound_total: 9000.0,
            outbound_total: 8000.0,
        };
        let chain = ShellChain {
            source: 0,
            intermediaries: vec![8, 9],
            sink: 1,
        };
        let set = build_rings(&graph, &[cycle(&[0, 1, 2])], &[smurf], &[chain], 30);
        let ids: Vec<&str> = set.rings.iter().map(|r| r.ring_id.as_str()).collect();
        assert_eq!(ids, vec!["R-C-0001", "R-S-0001", "R-SH-0001"]);
        assert_eq!(set.rings[1].members, vec![5, 6, 7]);
        assert_eq!(set.rings[2].members, vec![0, 1, 8, 9]);
    }

    #[test]
    fn test_first_ring_membership() {
        let graph = graph_with_nodes();
        let chain = ShellChain {
            source: 0,
            intermediaries: vec![8, 9],
            sink: 1,
        };
        let set = build_rings(&graph, &[cycle(&[0, 1, 2])], &[], &[chain], 30);
        // Node 0 is in both rings; the cycle ring came first.
        assert_eq!(set.ring_id_of(0), Some("R-C-0001"));
        assert_eq!(set.ring_id_of(8), Some("R-SH-0001"));
        assert_eq!(set.ring_id_of(7), None);
    }

    #[test]
    fn test_risk_scores_are_max_member() {
        let graph = graph_with_nodes();
        let mut set = build_rings(&graph, &[cycle(&[0, 1, 2])], &[], &[], 30);
        let mut scores = vec![0u32; graph.node_count()];
        scores[0] = 25;
        scores[1] = 40;
        scores[2] = 10;
        set.assign_risk_scores(&scores);
        assert_eq!(set.rings[0].risk_score, 40);
    }
}
