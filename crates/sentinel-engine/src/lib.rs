//! # Sentinel Engine
//!
//! The composition layer of the forensics pipeline:
//!
//! - [`rings`]: groups co-implicated accounts into named rings
//! - [`composer`]: fuses pattern evidence, the anomaly bonus, suppression
//!   penalties, and cluster boosters into bounded suspicion scores
//! - [`report`]: the exact JSON report and graph-data shapes
//! - [`engine`]: the async orchestrator fanning detectors out over the
//!   shared immutable graph

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod composer;
pub mod engine;
pub mod report;
pub mod rings;

pub use composer::{compose, ComposerContext, Verdict};
pub use engine::{Analysis, EngineDiagnostics, ForensicsEngine};
pub use report::{ForensicsReport, GraphData, GraphEdge, GraphNode, ReportSummary};
pub use rings::{build_rings, Ring, RingPattern, RingSet};
