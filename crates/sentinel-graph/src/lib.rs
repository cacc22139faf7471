//! # Sentinel Graph
//!
//! Transaction model and directed multi-graph construction.
//!
//! This crate provides:
//! - The validated [`types::Transaction`] and the raw ingest record
//! - [`multigraph::TxnGraph`]: interned accounts, a flat edge table, and
//!   per-node timestamp-sorted inbound/outbound edge lists
//! - [`builder::GraphBuilder`]: validating O(E) construction
//! - [`union_find::UnionFind`]: weighted quick-union used for ring merging

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod multigraph;
pub mod types;
pub mod union_find;

pub use builder::GraphBuilder;
pub use multigraph::{NodeData, TxnEdge, TxnGraph};
pub use types::{EdgeId, NodeId, Transaction, TransactionRecord};
pub use union_find::UnionFind;
