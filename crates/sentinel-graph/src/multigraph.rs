//! Directed multi-graph over a transaction batch.
//!
//! Flat-array representation: one edge per transaction in a single edge
//! table, plus per-node inbound/outbound edge-id lists sorted by
//! `(timestamp, txn_id)`. Built once per batch by
//! [`crate::builder::GraphBuilder`] and treated as immutable afterwards;
//! detectors share it read-only.

use crate::types::{EdgeId, NodeId};
use chrono::NaiveDateTime;
use sentinel_core::error::{EngineError, Result};
use std::collections::HashMap;

/// One directed edge of the multi-graph; parallel edges between the same
/// account pair are preserved.
#[derive(Debug, Clone)]
pub struct TxnEdge {
    /// Opaque transaction identifier.
    pub txn_id: String,
    /// Source node.
    pub src: NodeId,
    /// Destination node.
    pub dst: NodeId,
    /// Transferred amount.
    pub amount: f64,
    /// Edge timestamp.
    pub timestamp: NaiveDateTime,
}

/// Cached per-node state.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// Account identifier.
    pub account: String,
    /// Inbound edge ids, sorted by `(timestamp, txn_id)`.
    pub incoming: Vec<EdgeId>,
    /// Outbound edge ids, sorted by `(timestamp, txn_id)`.
    pub outgoing: Vec<EdgeId>,
    /// Sum of inbound amounts.
    pub volume_in: f64,
    /// Sum of outbound amounts.
    pub volume_out: f64,
    /// Earliest timestamp the account appears at.
    pub first_seen: NaiveDateTime,
    /// Latest timestamp the account appears at.
    pub last_seen: NaiveDateTime,
}

/// The immutable transaction multi-graph for one batch.
#[derive(Debug, Clone)]
pub struct TxnGraph {
    pub(crate) nodes: Vec<NodeData>,
    pub(crate) edges: Vec<TxnEdge>,
    pub(crate) index: HashMap<String, NodeId>,
    pub(crate) span: Option<(NaiveDateTime, NaiveDateTime)>,
    pub(crate) self_loops_dropped: usize,
}

impl TxnGraph {
    /// Number of accounts.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges (transactions).
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Returns true if the batch produced no usable transactions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Iterate node ids in ascending (deterministic) order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        0..self.nodes.len() as NodeId
    }

    /// Node state by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id as usize]
    }

    /// Account string for a node.
    #[must_use]
    pub fn account(&self, id: NodeId) -> &str {
        &self.nodes[id as usize].account
    }

    /// Resolve an account id to its node index.
    #[must_use]
    pub fn resolve(&self, account: &str) -> Option<NodeId> {
        self.index.get(account).copied()
    }

    /// Edge by id.
    #[must_use]
    pub fn edge(&self, id: EdgeId) -> &TxnEdge {
        &self.edges[id as usize]
    }

    /// Inbound edge ids of a node, timestamp-sorted.
    #[must_use]
    pub fn incoming(&self, id: NodeId) -> &[EdgeId] {
        &self.nodes[id as usize].incoming
    }

    /// Outbound edge ids of a node, timestamp-sorted.
    #[must_use]
    pub fn outgoing(&self, id: NodeId) -> &[EdgeId] {
        &self.nodes[id as usize].outgoing
    }

    /// In-degree (parallel edges counted).
    #[must_use]
    pub fn in_degree(&self, id: NodeId) -> usize {
        self.nodes[id as usize].incoming.len()
    }

    /// Out-degree (parallel edges counted).
    #[must_use]
    pub fn out_degree(&self, id: NodeId) -> usize {
        self.nodes[id as usize].outgoing.len()
    }

    /// Total degree (parallel edges counted).
    #[must_use]
    pub fn total_degree(&self, id: NodeId) -> usize {
        self.in_degree(id) + self.out_degree(id)
    }

    /// Batch time span. Fails with [`EngineError::EmptyGraph`] on an empty
    /// batch.
    pub fn span(&self) -> Result<(NaiveDateTime, NaiveDateTime)> {
        self.span.ok_or(EngineError::EmptyGraph)
    }

    /// Batch time span in seconds, zero for an empty batch.
    #[must_use]
    pub fn span_seconds(&self) -> f64 {
        match self.span {
            Some((start, end)) => (end - start).num_seconds() as f64,
            None => 0.0,
        }
    }

    /// Self-loop transactions dropped during construction.
    #[must_use]
    pub fn self_loops_dropped(&self) -> usize {
        self.self_loops_dropped
    }

    /// Distinct successor nodes, ascending.
    #[must_use]
    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self.outgoing(id).iter().map(|&e| self.edge(e).dst).collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Distinct predecessor nodes, ascending.
    #[must_use]
    pub fn predecessors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self.incoming(id).iter().map(|&e| self.edge(e).src).collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Distinct neighbors in either direction, ascending.
    #[must_use]
    pub fn neighbors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = self.predecessors(id);
        out.extend(self.successors(id));
        out.sort_unstable();
        out.dedup();
        out
    }

    /// All parallel edges from `src` to `dst`, timestamp-sorted.
    #[must_use]
    pub fn edges_between(&self, src: NodeId, dst: NodeId) -> Vec<EdgeId> {
        self.outgoing(src)
            .iter()
            .copied()
            .filter(|&e| self.edge(e).dst == dst)
            .collect()
    }

    /// Merged, timestamp-sorted view of all edges touching a node.
    #[must_use]
    pub fn touching(&self, id: NodeId) -> Vec<EdgeId> {
        let node = self.node(id);
        let mut merged = Vec::with_capacity(node.incoming.len() + node.outgoing.len());
        let (mut i, mut o) = (0, 0);
        while i < node.incoming.len() && o < node.outgoing.len() {
            let ie = self.edge(node.incoming[i]);
            let oe = self.edge(node.outgoing[o]);
            if (ie.timestamp, &ie.txn_id) <= (oe.timestamp, &oe.txn_id) {
                merged.push(node.incoming[i]);
                i += 1;
            } else {
                merged.push(node.outgoing[o]);
                o += 1;
            }
        }
        merged.extend_from_slice(&node.incoming[i..]);
        merged.extend_from_slice(&node.outgoing[o..]);
        merged
    }

    /// Active span of one account in seconds.
    #[must_use]
    pub fn active_seconds(&self, id: NodeId) -> f64 {
        let node = self.node(id);
        (node.last_seen - node.first_seen).num_seconds() as f64
    }
}
