//! Graph construction.

use crate::multigraph::{NodeData, TxnEdge, TxnGraph};
use crate::types::{NodeId, Transaction, TransactionRecord};
use sentinel_core::error::Result;
use std::collections::HashMap;
use tracing::warn;

/// Validating builder for [`TxnGraph`].
///
/// Input order is irrelevant: accounts are interned in lexicographic order
/// and the edge table is sorted by `(timestamp, txn_id)` before the
/// per-node lists are laid down, so two permutations of the same batch
/// produce identical graphs.
#[derive(Debug, Default)]
pub struct GraphBuilder;

impl GraphBuilder {
    /// Build a graph from raw ingest records.
    ///
    /// Any record failing validation aborts the batch with
    /// `MalformedInput`; self-loops are dropped with a warning count.
    pub fn from_records(records: &[TransactionRecord]) -> Result<TxnGraph> {
        let transactions = records
            .iter()
            .map(TransactionRecord::parse)
            .collect::<Result<Vec<_>>>()?;
        Self::from_transactions(transactions)
    }

    /// Build a graph from already-validated transactions.
    pub fn from_transactions(transactions: Vec<Transaction>) -> Result<TxnGraph> {
        let mut usable = Vec::with_capacity(transactions.len());
        let mut self_loops_dropped = 0usize;
        for txn in transactions {
            if txn.is_self_loop() {
                self_loops_dropped += 1;
                continue;
            }
            usable.push(txn);
        }
        if self_loops_dropped > 0 {
            warn!(
                count = self_loops_dropped,
                "dropped self-loop transactions during graph construction"
            );
        }

        // Canonical edge order: (timestamp, txn_id). Per-node lists inherit
        // this order, which is what keeps equal-timestamp ties stable.
        usable.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.txn_id.cmp(&b.txn_id))
        });

        let mut accounts: Vec<&str> = usable
            .iter()
            .flat_map(|t| [t.sender.as_str(), t.receiver.as_str()])
            .collect();
        accounts.sort_unstable();
        accounts.dedup();

        let index: HashMap<String, NodeId> = accounts
            .iter()
            .enumerate()
            .map(|(i, &a)| (a.to_string(), i as NodeId))
            .collect();

        let mut nodes: Vec<NodeData> = accounts
            .iter()
            .map(|&a| NodeData {
                account: a.to_string(),
                incoming: Vec::new(),
                outgoing: Vec::new(),
                volume_in: 0.0,
                volume_out: 0.0,
                first_seen: chrono::NaiveDateTime::MAX,
                last_seen: chrono::NaiveDateTime::MIN,
            })
            .collect();

        let mut edges = Vec::with_capacity(usable.len());
        for txn in usable {
            let src = index[&txn.sender];
            let dst = index[&txn.receiver];
            let edge_id = edges.len() as u32;

            let sender = &mut nodes[src as usize];
            sender.outgoing.push(edge_id);
            sender.volume_out += txn.amount;
            sender.first_seen = sender.first_seen.min(txn.timestamp);
            sender.last_seen = sender.last_seen.max(txn.timestamp);

            let receiver = &mut nodes[dst as usize];
            receiver.incoming.push(edge_id);
            receiver.volume_in += txn.amount;
            receiver.first_seen = receiver.first_seen.min(txn.timestamp);
            receiver.last_seen = receiver.last_seen.max(txn.timestamp);

            edges.push(TxnEdge {
                txn_id: txn.txn_id,
                src,
                dst,
                amount: txn.amount,
                timestamp: txn.timestamp,
            });
        }

        let span = match (edges.first(), edges.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp)),
            _ => None,
        };

        Ok(TxnGraph {
            nodes,
            edges,
            index,
            span,
            self_loops_dropped,
        })
    }
}
