//! Comparison engine
//!
//! Drives the sequence and table comparators over every object of the source
//! and exposes the results as a lazy stream.

use futures::stream::{self, BoxStream, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::catalog::CatalogProvider;
use crate::compare::outcome::{ComparisonEvent, ComparisonOutcome, ObjectKind};
use crate::compare::sequence::SequenceComparator;
use crate::compare::table::{single, TableComparator};
use crate::config::CompareConfig;
use crate::error::{Error, Result};

/// Compares every sequence and table of a source catalog with a target catalog
///
/// Objects are compared by up to `workers` concurrent comparisons. Each one
/// issues its own queries, so a pooled backend hands every worker a separate
/// connection. Results come out in source name order, sequences first.
/// A table's record events are produced while that table is being read from
/// the stream, by up to `key_workers` concurrent row fetches.
pub struct ComparisonEngine {
    source: Arc<dyn CatalogProvider>,
    target: Arc<dyn CatalogProvider>,
    config: CompareConfig,
}

impl ComparisonEngine {
    pub fn new(
        source: Arc<dyn CatalogProvider>,
        target: Arc<dyn CatalogProvider>,
        config: CompareConfig,
    ) -> Self {
        Self {
            source,
            target,
            config,
        }
    }

    /// Start a comparison run
    ///
    /// Object names are fetched up front and a failure there fails the run.
    /// Everything after that is reported per object through the stream.
    /// Dropping the stream cancels the comparisons still in flight.
    pub async fn run(&self) -> Result<BoxStream<'static, ComparisonEvent>> {
        let mut sequences = self.source.sequence_names().await?;
        let mut tables = self.source.table_names().await?;
        sequences.sort();
        tables.sort();

        // Prime the target's name lists so workers only read the memo
        self.target.sequence_names().await?;
        self.target.table_names().await?;

        info!(
            sequences = sequences.len(),
            tables = tables.len(),
            max_level = self.config.max_level.ordinal(),
            workers = self.config.workers,
            "Starting comparison"
        );

        let workers = self.config.workers.max(1);
        let deadline = self.config.object_timeout();

        let sequence_comparator = SequenceComparator::new(
            Arc::clone(&self.source),
            Arc::clone(&self.target),
            self.config.max_level,
        );
        let table_comparator = TableComparator::new(
            Arc::clone(&self.source),
            Arc::clone(&self.target),
            self.config.max_level,
            self.config.key_workers,
        )
        .with_row_timeout(deadline);

        let sequence_events = stream::iter(sequences)
            .map(move |name| {
                let comparator = sequence_comparator.clone();
                async move {
                    let event = match with_deadline(deadline, comparator.compare(&name)).await {
                        Ok(event) => event,
                        Err(err) => ComparisonEvent::sequence(&name, ComparisonOutcome::error(err)),
                    };
                    single(event)
                }
            })
            .buffered(workers);

        // The deadline bounds levels 0-3 and the key scan; each row fetch has its own
        let table_events = stream::iter(tables)
            .map(move |name| {
                let comparator = table_comparator.clone();
                async move {
                    match with_deadline(deadline, comparator.compare(&name)).await {
                        Ok(events) => events,
                        Err(err) => single(ComparisonEvent::table(&name, ComparisonOutcome::error(err))),
                    }
                }
            })
            .buffered(workers);

        Ok(sequence_events
            .chain(table_events)
            .flatten()
            .inspect(log_event)
            .boxed())
    }

    /// Run to completion and collect every event
    pub async fn collect(&self) -> Result<Vec<ComparisonEvent>> {
        Ok(self.run().await?.collect().await)
    }
}

async fn with_deadline<F: Future>(deadline: Option<Duration>, work: F) -> Result<F::Output> {
    match deadline {
        Some(limit) => tokio::time::timeout(limit, work)
            .await
            .map_err(|_| Error::Timeout(limit)),
        None => Ok(work.await),
    }
}

fn log_event(event: &ComparisonEvent) {
    let kind = match &event.kind {
        ObjectKind::Sequence => "sequence",
        ObjectKind::Table => "table",
        ObjectKind::Record { .. } => "record",
    };

    match (&event.outcome, &event.kind) {
        (ComparisonOutcome::Error { detail }, _) => {
            warn!(kind, object = %event.name, error = %detail, "Comparison failed")
        }
        (outcome, ObjectKind::Record { key }) => {
            debug!(kind, object = %event.name, key = %key, outcome = outcome.label(), "Compared")
        }
        (outcome, _) => info!(kind, object = %event.name, outcome = outcome.label(), "Compared"),
    }
}
