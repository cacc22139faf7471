//! Detector metadata and execution traits.
//!
//! Every pipeline component carries a [`DetectorMetadata`] describing its
//! identity and expected performance, and exposes its work through the
//! [`BatchDetector`] trait so the engine can fan components out as
//! independent tasks over the shared read-only graph.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage a component belongs to.
///
/// Stages order the batch: ingest builds the graph, detection and anomaly
/// scoring consume it concurrently, scoring composes the final verdicts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Graph construction from raw transactions.
    #[default]
    Ingest,
    /// Structural pattern detectors reading the immutable graph.
    Detection,
    /// Unsupervised anomaly scoring over per-node features.
    Anomaly,
    /// Score composition, ring assembly, and report generation.
    Scoring,
}

impl Stage {
    /// All pipeline stages in execution order.
    pub const ALL: &'static [Stage] = &[
        Stage::Ingest,
        Stage::Detection,
        Stage::Anomaly,
        Stage::Scoring,
    ];

    /// Returns the stage name as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::Detection => "detection",
            Stage::Anomaly => "anomaly",
            Stage::Scoring => "scoring",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata describing a pipeline component.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectorMetadata {
    /// Unique detector identifier (e.g. "forensics/cycle-detector").
    pub id: String,

    /// Pipeline stage this component runs in.
    pub stage: Stage,

    /// Human-readable description.
    pub description: String,

    /// Expected throughput in transactions per second.
    pub expected_throughput: u64,

    /// Version of the detector implementation.
    pub version: u32,
}

impl DetectorMetadata {
    /// Create metadata for a detector in the given stage.
    #[must_use]
    pub fn new(id: impl Into<String>, stage: Stage) -> Self {
        Self {
            id: id.into(),
            stage,
            description: String::new(),
            expected_throughput: 50_000,
            version: 1,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the expected throughput.
    #[must_use]
    pub fn with_throughput(mut self, txns_per_sec: u64) -> Self {
        self.expected_throughput = txns_per_sec;
        self
    }

    /// Set the version.
    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }
}

impl Default for DetectorMetadata {
    fn default() -> Self {
        Self::new("unnamed", Stage::Detection)
    }
}

/// Base trait for all pipeline components.
pub trait Detector: Send + Sync + fmt::Debug {
    /// Returns the detector metadata.
    fn metadata(&self) -> &DetectorMetadata;

    /// Returns the detector ID.
    fn id(&self) -> &str {
        &self.metadata().id
    }

    /// Validate detector configuration before a batch run.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Trait for components executed once per batch.
///
/// The engine clones each detector into a task and awaits all of them
/// before scoring begins; inputs are shared read-only (`Arc`), outputs are
/// owned by the task.
///
/// # Type Parameters
///
/// - `I`: input type (typically `Arc<TxnGraph>`)
/// - `O`: output type (the detector's hit list plus diagnostics)
#[async_trait]
pub trait BatchDetector<I, O>: Detector
where
    I: Send + Sync,
    O: Send + Sync,
{
    /// Run the detector over the batch input.
    async fn execute(&self, input: I) -> Result<O>;

    /// Validate the input before execution.
    fn validate_input(&self, _input: &I) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_ordering() {
        assert_eq!(Stage::ALL.len(), 4);
        assert_eq!(Stage::ALL[0], Stage::Ingest);
        assert_eq!(Stage::ALL[3], Stage::Scoring);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Detection.to_string(), "detection");
        assert_eq!(Stage::Anomaly.as_str(), "anomaly");
    }

    #[test]
    fn test_metadata_builders() {
        let meta = DetectorMetadata::new("forensics/cycle-detector", Stage::Detection)
            .with_description("Bounded DFS cycle scan")
            .with_throughput(25_000)
            .with_version(2);

        assert_eq!(meta.id, "forensics/cycle-detector");
        assert_eq!(meta.stage, Stage::Detection);
        assert_eq!(meta.expected_throughput, 25_000);
        assert_eq!(meta.version, 2);
    }

    #[test]
    fn test_metadata_default() {
        let meta = DetectorMetadata::default();
        assert_eq!(meta.id, "unnamed");
        assert_eq!(meta.version, 1);
    }
}
