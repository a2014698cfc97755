//! Run reporter: progress counters and the failure report

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;
use crate::error_log::ErrorLog;
use crate::types::{Event, Item, Outcome, RunSummary};

/// Mutable counters for one run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunState {
    /// Items settled so far
    pub processed: usize,
    /// Items in the run
    pub total: usize,
    /// Items skipped because their output was present
    pub skipped: usize,
    /// Items downloaded in this run
    pub downloaded: usize,
    /// Items that exhausted their attempts, in settle order
    pub failed: Vec<Item>,
}

impl RunState {
    /// Progress percentage (100.0 for an empty run)
    pub fn percent(&self) -> f32 {
        if self.total == 0 {
            return 100.0;
        }
        (self.processed as f64 / self.total as f64 * 100.0) as f32
    }
}

/// Collects outcomes as batches settle and writes the end-of-run artifacts
pub struct RunReporter {
    state: RunState,
    error_log: Arc<ErrorLog>,
    failure_report_path: PathBuf,
    event_tx: tokio::sync::broadcast::Sender<Event>,
}

impl RunReporter {
    /// Create a reporter for a run of `total` items
    pub fn new(
        total: usize,
        error_log: Arc<ErrorLog>,
        failure_report_path: impl Into<PathBuf>,
        event_tx: tokio::sync::broadcast::Sender<Event>,
    ) -> Self {
        Self {
            state: RunState {
                total,
                ..RunState::default()
            },
            error_log,
            failure_report_path: failure_report_path.into(),
            event_tx,
        }
    }

    /// Current counters
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Record one settled batch and emit progress
    pub fn record_batch(&mut self, outcomes: Vec<Outcome>) {
        self.state.processed = (self.state.processed + outcomes.len()).min(self.state.total);
        for outcome in outcomes {
            match outcome {
                Outcome::Skipped { .. } => self.state.skipped += 1,
                Outcome::Downloaded { .. } => self.state.downloaded += 1,
                Outcome::Failed { item, .. } => self.state.failed.push(item),
            }
        }

        let percent = self.state.percent();
        tracing::info!(
            processed = self.state.processed,
            total = self.state.total,
            "Progress: {:.2}% ({}/{})",
            percent,
            self.state.processed,
            self.state.total
        );
        self.event_tx
            .send(Event::BatchCompleted {
                processed: self.state.processed,
                total: self.state.total,
                percent,
            })
            .ok();
    }

    /// Finish the run: write the failure report if needed and summarize
    ///
    /// A report that cannot be written is logged; the summary then carries no
    /// report path.
    pub fn finish(self) -> RunSummary {
        let failure_report = if self.state.failed.is_empty() {
            None
        } else {
            match write_failure_report(&self.failure_report_path, &self.state.failed) {
                Ok(()) => Some(self.failure_report_path.clone()),
                Err(e) => {
                    tracing::error!(
                        path = %self.failure_report_path.display(),
                        error = %e,
                        "Failed to write failure report"
                    );
                    self.error_log
                        .log(format!("Failed to write failure report: {}", e));
                    None
                }
            }
        };

        let summary = RunSummary {
            total: self.state.total,
            skipped: self.state.skipped,
            downloaded: self.state.downloaded,
            failed: self.state.failed.len(),
            error_log: self.error_log.path().to_path_buf(),
            failure_report,
        };

        tracing::info!(
            total = summary.total,
            skipped = summary.skipped,
            downloaded = summary.downloaded,
            failed = summary.failed,
            "Download process completed"
        );
        self.event_tx
            .send(Event::RunCompleted {
                summary: summary.clone(),
            })
            .ok();
        summary
    }
}

/// Write `items` as a fully quoted CSV in the input's column layout
pub fn write_failure_report(path: &Path, items: &[Item]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_path(path)?;
    for item in items {
        writer.serialize(item)?;
    }
    writer.flush()?;
    Ok(())
}
