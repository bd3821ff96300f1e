use crate::model::status::ResponseStatus;
use serde::Serialize;
use std::collections::BTreeMap;

/// What happened to one unprocessed row during a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum RowOutcome {
    /// A terminal status was computed (and written, unless the run is a dry run).
    Resolved(ResponseStatus),
    /// The row stays unprocessed; the message says why.
    Deferred(String),
}

/// Counters for a single validation run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    /// Rows read from the sheet.
    pub examined: usize,
    /// Rows already terminal when the run started.
    pub skipped: usize,
    /// Rows resolved in this run, keyed by the status cell text.
    pub resolved: BTreeMap<String, usize>,
    /// Rows left unprocessed for the next run.
    pub deferred: usize,
    pub dry_run: bool,
}

impl RunSummary {
    pub fn new(run_id: impl Into<String>, dry_run: bool) -> Self {
        Self {
            run_id: run_id.into(),
            dry_run,
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: &RowOutcome) {
        match outcome {
            RowOutcome::Resolved(status) => {
                *self.resolved.entry(status.as_cell().to_string()).or_insert(0) += 1;
            }
            RowOutcome::Deferred(_) => self.deferred += 1,
        }
    }

    pub fn resolved_total(&self) -> usize {
        self.resolved.values().sum()
    }

    pub fn resolved_as(&self, status: &ResponseStatus) -> usize {
        self.resolved.get(status.as_cell()).copied().unwrap_or(0)
    }
}
