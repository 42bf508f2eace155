//! Query lifecycle stages

use std::fmt;
use std::time::Instant;

use crate::error::Error;

/// Where a query is in the pipeline
///
/// `Idle -> Embedding -> Retrieving -> Assembling -> Generating`, then
/// `Completed` or `Failed`. Validation happens while `Idle`, so rejected
/// queries fail without leaving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Embedding,
    Retrieving,
    Assembling,
    Generating,
    Completed,
    Failed,
}

impl Stage {
    pub fn is_finished(&self) -> bool {
        matches!(self, Stage::Completed | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Embedding => "embedding",
            Stage::Retrieving => "retrieving",
            Stage::Assembling => "assembling",
            Stage::Generating => "generating",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Logs stage transitions for one query
pub(crate) struct Progress {
    ticker: String,
    stage: Stage,
    started: Instant,
}

impl Progress {
    pub(crate) fn new(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            stage: Stage::Idle,
            started: Instant::now(),
        }
    }

    #[cfg(test)]
    pub(crate) fn stage(&self) -> Stage {
        self.stage
    }

    pub(crate) fn advance(&mut self, next: Stage) {
        tracing::debug!(ticker = %self.ticker, from = %self.stage, stage = %next, "stage transition");
        self.stage = next;
    }

    pub(crate) fn complete(&mut self, passages: usize) {
        self.stage = Stage::Completed;
        tracing::info!(
            ticker = %self.ticker,
            passages,
            latency_ms = self.started.elapsed().as_millis() as u64,
            "query completed"
        );
    }

    pub(crate) fn fail(&mut self, err: &Error) {
        let at = self.stage;
        self.stage = Stage::Failed;
        if err.status().0.is_server_error() {
            tracing::warn!(ticker = %self.ticker, stage = %at, error = %err, "query failed");
        } else {
            tracing::debug!(ticker = %self.ticker, stage = %at, error = %err, "query rejected");
        }
    }

    /// Caller went away mid-stream
    pub(crate) fn cancel(&mut self) {
        let at = self.stage;
        self.stage = Stage::Failed;
        tracing::info!(
            ticker = %self.ticker,
            stage = %at,
            latency_ms = self.started.elapsed().as_millis() as u64,
            "client disconnected, generation stopped"
        );
    }
}
