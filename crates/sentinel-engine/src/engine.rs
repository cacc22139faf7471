//! Pipeline orchestration.
//!
//! The engine builds the graph single-threaded, then fans the detectors
//! out as independent tasks over the shared immutable graph, joins them
//! (the barrier the composer requires), and assembles rings, verdicts,
//! and the report. A failing detector is isolated: it logs, increments a
//! failure counter, and contributes an empty result. Only malformed input
//! aborts the batch.

use crate::composer::{compose, ComposerContext};
use crate::report::{
    ForensicsReport, GraphData, GraphEdge, GraphNode, ReportSummary, RingEntry, SuspiciousAccount,
};
use crate::rings::build_rings;
use sentinel_core::config::EngineConfig;
use sentinel_core::detector::{BatchDetector, Detector};
use sentinel_core::error::{EngineError, Result};
use sentinel_detect::{
    CycleDetector, CycleScan, DetectorDiagnostics, PatternTag, ShellDetector, ShellScan,
    SmurfHit, SmurfingDetector, StructuringDetector, SuppressionFlags, SuppressionProfiler,
    VelocityDetector, VelocityHit,
};
use sentinel_graph::{GraphBuilder, NodeId, Transaction, TransactionRecord, TxnGraph};
use sentinel_ml::AnomalyScorer;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

/// Batch-level diagnostics surfaced alongside the report.
#[derive(Debug, Clone, Default)]
pub struct EngineDiagnostics {
    /// Self-loop transactions dropped during graph construction.
    pub self_loops_dropped: usize,
    /// Failure count per detector id; failed detectors contribute empty
    /// results.
    pub detector_failures: BTreeMap<String, u32>,
    /// Cycle scan budget bookkeeping.
    pub cycle: DetectorDiagnostics,
    /// Shell walk budget bookkeeping.
    pub shell: DetectorDiagnostics,
}

/// Everything one batch analysis produces.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// The forensic report.
    pub report: ForensicsReport,
    /// Visualization payload.
    pub graph_data: GraphData,
    /// Batch diagnostics.
    pub diagnostics: EngineDiagnostics,
}

/// The forensics engine: one instance serves many batches.
#[derive(Debug, Clone)]
pub struct ForensicsEngine {
    config: EngineConfig,
    cycles: CycleDetector,
    smurfing: SmurfingDetector,
    shells: ShellDetector,
    velocity: VelocityDetector,
    structuring: StructuringDetector,
    suppression: SuppressionProfiler,
    anomaly: AnomalyScorer,
}

impl Default for ForensicsEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ForensicsEngine {
    /// Create an engine from a validated configuration.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            cycles: CycleDetector::new(config.cycle.clone()),
            smurfing: SmurfingDetector::new(config.smurfing.clone()),
            shells: ShellDetector::new(config.shell.clone()),
            velocity: VelocityDetector::new(config.velocity.clone()),
            structuring: StructuringDetector::new(config.structuring.clone()),
            suppression: SuppressionProfiler::new(config.scoring.clone()),
            anomaly: AnomalyScorer::new(config.anomaly.clone()),
            config,
        })
    }

    /// Create an engine with default thresholds.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            config: EngineConfig::default(),
            cycles: CycleDetector::default(),
            smurfing: SmurfingDetector::default(),
            shells: ShellDetector::default(),
            velocity: VelocityDetector::default(),
            structuring: StructuringDetector::default(),
            suppression: SuppressionProfiler::default(),
            anomaly: AnomalyScorer::default(),
        }
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Analyze a batch of raw ingest records.
    pub async fn analyze_records(&self, records: &[TransactionRecord]) -> Result<Analysis> {
        let transactions = records
            .iter()
            .map(TransactionRecord::parse)
            .collect::<Result<Vec<_>>>()?;
        self.analyze(transactions).await
    }

    /// Analyze a batch of validated transactions.
    pub async fn analyze(&self, transactions: Vec<Transaction>) -> Result<Analysis> {
        let started = Instant::now();
        let graph = Arc::new(GraphBuilder::from_transactions(transactions)?);

        if graph.is_empty() {
            info!("batch contains no usable transactions; returning empty report");
            return Ok(Self::empty_analysis(&graph, started));
        }
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "graph constructed"
        );

        // Fan the detectors out; the graph is immutable from here on.
        let cycle_task = spawn_detector(&self.cycles, &graph);
        let smurf_task = spawn_detector(&self.smurfing, &graph);
        let shell_task = spawn_detector(&self.shells, &graph);
        let velocity_task = spawn_detector(&self.velocity, &graph);
        let structuring_task = spawn_detector(&self.structuring, &graph);
        let suppression_task = spawn_detector(&self.suppression, &graph);
        let anomaly_task = spawn_detector(&self.anomaly, &graph);

        let mut failures: BTreeMap<String, u32> = BTreeMap::new();
        let cycle_scan: CycleScan = resolve(
            cycle_task.await,
            self.cycles.id(),
            &mut failures,
            CycleScan::default(),
        );
        let smurf_hits: Vec<SmurfHit> =
            resolve(smurf_task.await, self.smurfing.id(), &mut failures, Vec::new());
        let shell_scan: ShellScan = resolve(
            shell_task.await,
            self.shells.id(),
            &mut failures,
            ShellScan::default(),
        );
        let velocity_hits: Vec<VelocityHit> = resolve(
            velocity_task.await,
            self.velocity.id(),
            &mut failures,
            Vec::new(),
        );
        let structuring_hits: Vec<NodeId> = resolve(
            structuring_task.await,
            self.structuring.id(),
            &mut failures,
            Vec::new(),
        );
        let suppression: Vec<SuppressionFlags> = resolve(
            suppression_task.await,
            self.suppression.id(),
            &mut failures,
            vec![SuppressionFlags::default(); graph.node_count()],
        );
        let anomaly: Vec<f64> = resolve(
            anomaly_task.await,
            self.anomaly.id(),
            &mut failures,
            vec![0.0; graph.node_count()],
        );

        if cycle_scan.diagnostics.budget_exhausted {
            warn!(
                error = %EngineError::budget(self.cycles.id(), cycle_scan.diagnostics.ops),
                "cycle scan stopped on its budget; results are partial"
            );
        }
        if shell_scan.diagnostics.budget_exhausted {
            warn!(
                error = %EngineError::budget(self.shells.id(), shell_scan.diagnostics.ops),
                "shell walk stopped on its budget; results are partial"
            );
        }

        // All detectors joined: the composer may begin.
        let tags = assemble_tags(
            &graph,
            &cycle_scan,
            &smurf_hits,
            &shell_scan,
            &structuring_hits,
            &velocity_hits,
        );
        let mut rings = build_rings(
            &graph,
            &cycle_scan.cycles,
            &smurf_hits,
            &shell_scan.chains,
            self.config.cycle.max_ring_size,
        );

        let ctx = ComposerContext {
            graph: &graph,
            tags: &tags,
            anomaly: &anomaly,
            suppression: &suppression,
            rings: &rings,
            cycles: &cycle_scan.cycles,
            smurfs: &smurf_hits,
            shells: &shell_scan.chains,
        };
        let verdicts = compose(&ctx, &self.config.scoring);

        let mut suspicion_by_node = vec![0u32; graph.node_count()];
        for verdict in &verdicts {
            suspicion_by_node[verdict.node as usize] = verdict.rounded;
        }
        rings.assign_risk_scores(&suspicion_by_node);

        let suspicious_accounts: Vec<SuspiciousAccount> = verdicts
            .iter()
            .filter(|v| v.rounded > 0)
            .map(|v| {
                let mut patterns: Vec<String> =
                    v.tags.iter().map(|t| t.as_str().to_string()).collect();
                patterns.sort();
                SuspiciousAccount {
                    account_id: graph.account(v.node).to_string(),
                    suspicion_score: v.rounded,
                    detected_patterns: patterns,
                    ring_id: rings.ring_id_of(v.node).map(str::to_string),
                    explanation: v.explanation.clone(),
                }
            })
            .collect();

        let fraud_rings: Vec<RingEntry> = rings
            .rings
            .iter()
            .map(|ring| RingEntry {
                ring_id: ring.ring_id.clone(),
                pattern_type: ring.pattern.as_str().to_string(),
                member_accounts: ring
                    .members
                    .iter()
                    .map(|&n| graph.account(n).to_string())
                    .collect(),
                risk_score: ring.risk_score,
            })
            .collect();

        let graph_data = build_graph_data(&graph, &suspicion_by_node, &tags);
        let report = ForensicsReport {
            summary: ReportSummary {
                total_accounts_analyzed: graph.node_count(),
                suspicious_accounts_flagged: suspicious_accounts.len(),
                fraud_rings_detected: fraud_rings.len(),
                processing_time_seconds: started.elapsed().as_secs_f64(),
            },
            fraud_rings,
            suspicious_accounts,
        };

        info!(
            accounts = report.summary.total_accounts_analyzed,
            flagged = report.summary.suspicious_accounts_flagged,
            rings = report.summary.fraud_rings_detected,
            "batch analysis complete"
        );

        Ok(Analysis {
            report,
            graph_data,
            diagnostics: EngineDiagnostics {
                self_loops_dropped: graph.self_loops_dropped(),
                detector_failures: failures,
                cycle: cycle_scan.diagnostics,
                shell: shell_scan.diagnostics,
            },
        })
    }

    fn empty_analysis(graph: &TxnGraph, started: Instant) -> Analysis {
        Analysis {
            report: ForensicsReport {
                summary: ReportSummary {
                    total_accounts_analyzed: 0,
                    suspicious_accounts_flagged: 0,
                    fraud_rings_detected: 0,
                    processing_time_seconds: started.elapsed().as_secs_f64(),
                },
                fraud_rings: Vec::new(),
                suspicious_accounts: Vec::new(),
            },
            graph_data: GraphData::default(),
            diagnostics: EngineDiagnostics {
                self_loops_dropped: graph.self_loops_dropped(),
                ..Default::default()
            },
        }
    }
}

/// Spawn one detector as an independent task over the shared graph.
fn spawn_detector<D, O>(
    detector: &D,
    graph: &Arc<TxnGraph>,
) -> tokio::task::JoinHandle<Result<O>>
where
    D: BatchDetector<Arc<TxnGraph>, O> + Clone + 'static,
    O: Send + Sync + 'static,
{
    let detector = detector.clone();
    let graph = Arc::clone(graph);
    tokio::spawn(async move { detector.execute(graph).await })
}

/// Unwrap a joined detector task, isolating failures.
fn resolve<T>(
    joined: std::result::Result<Result<T>, JoinError>,
    name: &str,
    failures: &mut BTreeMap<String, u32>,
    fallback: T,
) -> T {
    match joined {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => {
            warn!(detector = name, error = %err, "detector failed; continuing with empty result");
            *failures.entry(name.to_string()).or_insert(0) += 1;
            fallback
        }
        Err(err) => {
            warn!(detector = name, error = %err, "detector task aborted; continuing with empty result");
            *failures.entry(name.to_string()).or_insert(0) += 1;
            fallback
        }
    }
}

/// Merge detector hits into per-node tag sets.
fn assemble_tags(
    graph: &TxnGraph,
    cycle_scan: &CycleScan,
    smurf_hits: &[SmurfHit],
    shell_scan: &ShellScan,
    structuring_hits: &[NodeId],
    velocity_hits: &[VelocityHit],
) -> Vec<BTreeSet<PatternTag>> {
    let mut tags: Vec<BTreeSet<PatternTag>> = vec![BTreeSet::new(); graph.node_count()];

    for cycle in &cycle_scan.cycles {
        if let Some(tag) = PatternTag::for_cycle_length(cycle.len()) {
            for &node in &cycle.nodes {
                tags[node as usize].insert(tag);
            }
        }
    }
    for hit in smurf_hits {
        tags[hit.hub as usize].insert(hit.kind.tag());
    }
    for chain in &shell_scan.chains {
        for &node in &chain.intermediaries {
            tags[node as usize].insert(PatternTag::ShellNetwork);
        }
    }
    for &node in structuring_hits {
        tags[node as usize].insert(PatternTag::Structuring);
    }
    for hit in velocity_hits {
        tags[hit.node as usize].insert(PatternTag::HighVelocity);
    }
    tags
}

/// Build the visualization payload; parallel edges collapse into one
/// weighted edge per (sender, receiver) pair.
fn build_graph_data(
    graph: &TxnGraph,
    suspicion_by_node: &[u32],
    tags: &[BTreeSet<PatternTag>],
) -> GraphData {
    let nodes = graph
        .node_ids()
        .map(|id| {
            let data = graph.node(id);
            let mut patterns: Vec<String> = tags[id as usize]
                .iter()
                .map(|t| t.as_str().to_string())
                .collect();
            patterns.sort();
            GraphNode {
                id: data.account.clone(),
                label: data.account.clone(),
                suspicion_score: suspicion_by_node[id as usize],
                in_degree: data.incoming.len(),
                out_degree: data.outgoing.len(),
                total_incoming: data.volume_in,
                total_outgoing: data.volume_out,
                detected_patterns: patterns,
            }
        })
        .collect();

    let mut totals: BTreeMap<(NodeId, NodeId), f64> = BTreeMap::new();
    for e in 0..graph.edge_count() as u32 {
        let edge = graph.edge(e);
        *totals.entry((edge.src, edge.dst)).or_insert(0.0) += edge.amount;
    }
    let edges = totals
        .into_iter()
        .map(|((src, dst), total)| GraphEdge {
            from: graph.account(src).to_string(),
            to: graph.account(dst).to_string(),
            value: (total / 1000.0).clamp(1.0, 6.0),
            title: format!("${total:.2}"),
        })
        .collect();

    GraphData { nodes, edges }
}
