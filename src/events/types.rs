//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the indexer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Root scanning events
    Scan(ScanEvent),
    /// Batch progress events
    Batch(BatchEvent),
    /// Per-item indexing events
    Index(IndexEvent),
    /// Pipeline-level events
    Pipeline(PipelineEvent),
}

/// Events while walking and reconciling a root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// Walk of a root has started
    Started { root: PathBuf },
    /// Root was skipped (disabled or not reachable)
    Skipped { root: PathBuf, reason: String },
    /// An entry could not be read; the walk continues
    Error { path: PathBuf, message: String },
    /// Root was reconciled against the store
    Completed(ScanSummary),
}

/// Counts from one reconciled root
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub root: PathBuf,
    pub new: usize,
    pub changed: usize,
    pub reappeared: usize,
    pub missing: usize,
    pub unchanged: usize,
}

/// Events from the batch runner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BatchEvent {
    /// A run over `total` items has started
    Started { total: usize, batch_size: usize },
    /// Cumulative count after a finished batch
    Progress(BatchProgress),
    /// Run stopped early at a batch boundary
    Cancelled { processed: usize },
    /// All items were processed
    Completed { processed: usize, failed: usize },
}

/// Progress after one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    /// Items processed so far, across all batches
    pub processed: usize,
    /// Total items in the run
    pub total: usize,
    /// Failures so far
    pub failed: usize,
}

/// Per-item indexing outcomes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IndexEvent {
    /// Item indexed; `generated` lists the thumbnail tiers written this time
    Indexed { item_id: i64, generated: Vec<String> },
    /// Item failed; its thumbnail status was set to error
    Failed { item_id: i64, message: String },
}

/// Pipeline-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// Pipeline has started
    Started,
    /// Moving to a new phase
    PhaseChanged { phase: PipelinePhase },
    /// Pipeline completed
    Completed { summary: PipelineSummary },
    /// Pipeline was cancelled
    Cancelled,
    /// Pipeline encountered a fatal error
    Error { message: String },
}

/// Phases of a full run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelinePhase {
    Scanning,
    Indexing,
    Deduplicating,
}

/// Summary of a full run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Roots actually walked
    pub roots_scanned: usize,
    /// Items discovered for the first time
    pub new_items: usize,
    /// Items newly marked missing
    pub missing_items: usize,
    /// Items indexed successfully
    pub indexed: usize,
    /// Items whose indexing failed
    pub failed: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelinePhase::Scanning => write!(f, "Scanning"),
            PipelinePhase::Indexing => write!(f, "Indexing"),
            PipelinePhase::Deduplicating => write!(f, "Deduplicating"),
        }
    }
}
