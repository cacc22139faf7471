//! Per-node feature extraction.

use sentinel_graph::TxnGraph;

/// Number of features per node.
pub const FEATURE_COUNT: usize = 4;

/// Feature vector per node: `[in_degree, out_degree, total_volume_in,
/// total_volume_out]`, indexed by node id.
#[must_use]
pub fn extract_features(graph: &TxnGraph) -> Vec<[f64; FEATURE_COUNT]> {
    graph
        .node_ids()
        .map(|node| {
            let data = graph.node(node);
            [
                data.incoming.len() as f64,
                data.outgoing.len() as f64,
                data.volume_in,
                data.volume_out,
            ]
        })
        .collect()
}
