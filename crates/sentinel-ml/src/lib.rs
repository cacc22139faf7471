//! # Sentinel ML
//!
//! Unsupervised anomaly scoring over per-node graph features.
//!
//! The [`isolation::AnomalyScorer`] fits an isolation forest on the full
//! node population and hands the composer a bounded per-node bonus. The
//! signal is advisory: it sharpens ranking but can never flag an account
//! on its own.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod features;
pub mod isolation;

pub use features::{extract_features, FEATURE_COUNT};
pub use isolation::{AnomalyScorer, IsolationForest};
