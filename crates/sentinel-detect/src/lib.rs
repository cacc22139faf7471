//! # Sentinel Detect
//!
//! Structural pattern detectors over the immutable transaction graph:
//!
//! - [`cycles`]: bounded-DFS circular-flow detection with four-constraint
//!   validation and canonical deduplication
//! - [`smurfing`]: sliding-window aggregator (fan-in) and disperser
//!   (fan-out) scans
//! - [`shells`]: passthrough candidate filtering and bounded chain walking
//! - [`velocity`]: rapid in-and-out turnover
//! - [`structuring`]: repeated sub-threshold banded deposits
//! - [`suppression`]: merchant and sustained-activity statistics consumed
//!   by the score composer
//!
//! Each detector is independent, reads the graph only, and returns owned
//! hit lists; the engine runs them concurrently.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cycles;
pub mod shells;
pub mod smurfing;
pub mod stats;
pub mod structuring;
pub mod suppression;
pub mod types;
pub mod velocity;

pub use cycles::CycleDetector;
pub use shells::ShellDetector;
pub use smurfing::SmurfingDetector;
pub use structuring::StructuringDetector;
pub use suppression::SuppressionProfiler;
pub use types::{
    CycleHit, CycleScan, DetectorDiagnostics, PatternTag, ShellChain, ShellScan, SmurfHit,
    SmurfKind, SuppressionFlags, VelocityHit,
};
pub use velocity::VelocityDetector;
