//! Concurrent batch export
//!
//! Exports many object changes with bounded concurrency. Changes that
//! target the same object run one after another in input order; a failure
//! on one object never stops its siblings. Cancellation stops new objects
//! from starting and lets in-flight ones finish.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::change::ObjectChange;
use crate::error::{SyncError, SyncResult};
use crate::synchronizer::ObjectExporter;

/// Result of exporting one object change.
#[derive(Debug)]
pub struct ObjectOutcome {
    pub object_type: String,
    /// Display identity of the object.
    pub identity: String,
    /// The confirmed change, or the reason it failed.
    pub result: SyncResult<ObjectChange>,
}

impl ObjectOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&SyncError> {
        self.result.as_ref().err()
    }
}

/// Outcomes of a batch, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<ObjectOutcome>,
    /// Changes with no outcome: not started before cancellation, or lost
    /// to a panicked export task.
    pub skipped: usize,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ObjectOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

/// Routes object changes to their exporters and runs them concurrently.
pub struct BatchSynchronizer {
    exporters: HashMap<String, Arc<dyn ObjectExporter>>,
    concurrency: usize,
}

impl BatchSynchronizer {
    /// `concurrency` is clamped to at least one.
    pub fn new(exporters: HashMap<String, Arc<dyn ObjectExporter>>, concurrency: usize) -> Self {
        Self {
            exporters,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Export `changes`, honoring `cancel` between objects.
    pub async fn run(&self, changes: Vec<ObjectChange>, cancel: CancellationToken) -> BatchReport {
        let total = changes.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = JoinSet::new();

        for group in group_by_identity(changes) {
            let exporters = self.exporters.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            join_set.spawn(async move {
                let mut outcomes = Vec::with_capacity(group.len());
                for (index, change) in group {
                    let Ok(_permit) = semaphore.clone().acquire_owned().await else {
                        break;
                    };
                    if cancel.is_cancelled() {
                        break;
                    }
                    let result = match exporters.get(&change.object_type) {
                        Some(exporter) => exporter.export(&change).await,
                        None => Err(SyncError::invalid_configuration(format!(
                            "no exporter registered for object type '{}'",
                            change.object_type
                        ))),
                    };
                    outcomes.push((
                        index,
                        ObjectOutcome {
                            object_type: change.object_type,
                            identity: change.dn,
                            result,
                        },
                    ));
                }
                outcomes
            });
        }

        let mut report = BatchReport::default();
        let mut indexed = Vec::with_capacity(total);
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(outcomes) => indexed.extend(outcomes),
                Err(e) => error!(error = %e, "Export task panicked"),
            }
        }
        // a panicked task reports nothing for its objects
        report.skipped = total - indexed.len();

        indexed.sort_by_key(|(index, _)| *index);
        for (_, outcome) in indexed {
            if let Err(e) = &outcome.result {
                warn!(
                    object_type = %outcome.object_type,
                    identity = %outcome.identity,
                    attribute = e.attribute().unwrap_or("-"),
                    code = e.error_code(),
                    error = %e,
                    "Object export failed"
                );
            }
            report.outcomes.push(outcome);
        }

        if report.skipped > 0 {
            debug!(skipped = report.skipped, "Objects not started");
        }
        info!(
            total,
            succeeded = report.succeeded(),
            failed = report.failed(),
            skipped = report.skipped,
            "Batch export finished"
        );
        report
    }
}

/// Group changes per object, keeping input order inside each group and
/// ordering groups by first appearance.
fn group_by_identity(changes: Vec<ObjectChange>) -> Vec<Vec<(usize, ObjectChange)>> {
    let mut groups: Vec<Vec<(usize, ObjectChange)>> = Vec::new();
    let mut positions: HashMap<(String, String), usize> = HashMap::new();
    for (index, change) in changes.into_iter().enumerate() {
        let key = (change.object_type.clone(), change.dn.to_lowercase());
        match positions.get(&key) {
            Some(&position) => groups[position].push((index, change)),
            None => {
                positions.insert(key, groups.len());
                groups.push(vec![(index, change)]);
            }
        }
    }
    groups
}
