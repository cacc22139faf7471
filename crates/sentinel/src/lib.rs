//! # Sentinel
//!
//! A financial forensics engine that ingests a batch of transactions and
//! produces a report of accounts and account groups exhibiting money-mule
//! behavior: circular fund routing, structuring (smurfing), layered
//! passthrough chains, and high-velocity churn.
//!
//! ## Pipeline
//!
//! 1. **Graph construction** — one directed edge per transaction,
//!    parallel edges preserved, per-node sorted edge lists.
//! 2. **Detection** — cycle, smurfing, shell, velocity, and structuring
//!    detectors plus the suppression profiler run concurrently over the
//!    immutable graph.
//! 3. **Anomaly scoring** — an isolation forest turns degree/volume
//!    features into a bounded advisory bonus.
//! 4. **Composition** — pattern weights, penalties, and cluster boosters
//!    fuse into a 0-100 suspicion score per account; co-implicated
//!    accounts group into named rings.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sentinel::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let engine = ForensicsEngine::with_defaults();
//!     let analysis = engine.analyze_records(&records).await?;
//!     println!("{}", analysis.report.to_json_pretty()?);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export the component crates.
pub use sentinel_core as core;
pub use sentinel_detect as detect;
pub use sentinel_engine as engine;
pub use sentinel_graph as graph;
pub use sentinel_ml as ml;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use sentinel_core::config::EngineConfig;
    pub use sentinel_core::detector::{BatchDetector, Detector, DetectorMetadata, Stage};
    pub use sentinel_core::error::{EngineError, Result};
    pub use sentinel_core::logging::{LogConfig, LogLevel};
    pub use sentinel_detect::PatternTag;
    pub use sentinel_engine::{Analysis, ForensicsEngine, ForensicsReport, GraphData};
    pub use sentinel_graph::{GraphBuilder, Transaction, TransactionRecord, TxnGraph};
}

/// Catalog of the pipeline components and their metadata.
pub mod catalog {
    use sentinel_core::detector::{Detector, DetectorMetadata};
    use sentinel_detect::{
        CycleDetector, ShellDetector, SmurfingDetector, StructuringDetector, SuppressionProfiler,
        VelocityDetector,
    };
    use sentinel_ml::AnomalyScorer;

    /// Metadata for every component, in pipeline order.
    #[must_use]
    pub fn detectors() -> Vec<DetectorMetadata> {
        vec![
            CycleDetector::default().metadata().clone(),
            SmurfingDetector::default().metadata().clone(),
            ShellDetector::default().metadata().clone(),
            VelocityDetector::default().metadata().clone(),
            StructuringDetector::default().metadata().clone(),
            SuppressionProfiler::default().metadata().clone(),
            AnomalyScorer::default().metadata().clone(),
        ]
    }

    /// Number of registered components.
    #[must_use]
    pub fn detector_count() -> usize {
        detectors().len()
    }
}

/// Version information.
pub mod version {
    /// Crate version.
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_ids_unique() {
        let detectors = catalog::detectors();
        assert_eq!(detectors.len(), 7);
        let mut ids: Vec<&str> = detectors.iter().map(|m| m.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 7);
        assert!(ids.contains(&"forensics/cycle-detector"));
        assert!(ids.contains(&"forensics/anomaly-scorer"));
    }

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;
        let _engine = ForensicsEngine::with_defaults();
        let _config = EngineConfig::default();
        let _stage = Stage::Detection;
    }

    #[test]
    fn test_version() {
        assert!(!version::VERSION.is_empty());
    }
}
