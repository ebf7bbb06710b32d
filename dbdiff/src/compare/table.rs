//! Table comparator
//!
//! Walks the levels in order and stops at the first one that fails:
//!
//! | level | check |
//! |---|---|
//! | 0 | table exists in the target |
//! | 1 | row counts are equal |
//! | 2 | column definitions are equal as a set |
//! | 3 | primary-key columns are equal |
//! | 4 | every source key value exists in the target |
//! | 5 | rows with the same key have equal values |
//!
//! Levels 4 and 5 only iterate the source's key values, so rows that exist
//! only in the target are never reported. Level 5 reads both rows with the
//! source's declared column list, so a target that declares the same columns
//! in another order still compares value by value.

use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::catalog::types::{Column, ConstraintKind, KeyValue};
use crate::catalog::CatalogProvider;
use crate::compare::level::ComparisonLevel;
use crate::compare::outcome::{ComparisonEvent, ComparisonOutcome, MismatchDetail, SkipReason};
use crate::error::{Error, Result};

/// A stream holding a single event
pub(crate) fn single(event: ComparisonEvent) -> BoxStream<'static, ComparisonEvent> {
    stream::once(future::ready(event)).boxed()
}

/// Compares a source table with its namesake in the target
#[derive(Clone)]
pub struct TableComparator {
    source: Arc<dyn CatalogProvider>,
    target: Arc<dyn CatalogProvider>,
    max_level: ComparisonLevel,
    key_workers: usize,
    row_timeout: Option<Duration>,
}

impl TableComparator {
    pub fn new(
        source: Arc<dyn CatalogProvider>,
        target: Arc<dyn CatalogProvider>,
        max_level: ComparisonLevel,
        key_workers: usize,
    ) -> Self {
        Self {
            source,
            target,
            max_level,
            key_workers: key_workers.max(1),
            row_timeout: None,
        }
    }

    /// Deadline for fetching and comparing one record's rows
    pub fn with_row_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.row_timeout = timeout;
        self
    }

    /// Compare one table
    ///
    /// Levels 0-3 are evaluated before this returns. The stream then yields
    /// the table event, followed at levels 4 and 5 by one event per source
    /// key value. Record comparisons only run as the stream is polled.
    pub async fn compare(&self, name: &str) -> BoxStream<'static, ComparisonEvent> {
        match self.try_compare(name).await {
            Ok(events) => events,
            Err(err) => {
                warn!(table = %name, error = %err, "Table comparison failed");
                single(ComparisonEvent::table(name, ComparisonOutcome::error(err)))
            }
        }
    }

    async fn try_compare(&self, name: &str) -> Result<BoxStream<'static, ComparisonEvent>> {
        let table_levels = ComparisonLevel::ALL
            .into_iter()
            .take_while(|level| level.within(self.max_level) && *level <= ComparisonLevel::PrimaryKey);

        for level in table_levels {
            debug!(table = %name, level = level.ordinal(), "Checking {}", level.description());
            if let Some(failure) = self.check_level(level, name).await? {
                return Ok(single(ComparisonEvent::table(name, failure)));
            }
        }

        if !ComparisonLevel::KeyValues.within(self.max_level) {
            return Ok(single(ComparisonEvent::table(name, ComparisonOutcome::Match)));
        }

        // Level 3 passed, so both sides agree on the key column
        if self.source.primary_key_column(name).await?.is_none() {
            return Ok(single(ComparisonEvent::table(
                name,
                ComparisonOutcome::Skipped {
                    level: ComparisonLevel::KeyValues,
                    reason: SkipReason::NoPrimaryKey,
                },
            )));
        }

        let records = self.record_events(name).await?;
        Ok(single(ComparisonEvent::table(name, ComparisonOutcome::Match))
            .chain(records)
            .boxed())
    }

    /// Evaluate one table-scope level, returning the outcome when it fails
    async fn check_level(
        &self,
        level: ComparisonLevel,
        name: &str,
    ) -> Result<Option<ComparisonOutcome>> {
        match level {
            ComparisonLevel::Existence => {
                let target_names = self.target.table_names().await?;
                if target_names.iter().any(|t| t == name) {
                    Ok(None)
                } else {
                    Ok(Some(ComparisonOutcome::MissingInTarget))
                }
            }
            ComparisonLevel::Cardinality => {
                let source = self.source.table_row_count(name).await?;
                let target = self.target.table_row_count(name).await?;
                if source == target {
                    Ok(None)
                } else {
                    Ok(Some(ComparisonOutcome::mismatch(
                        level,
                        MismatchDetail::row_count(source, target),
                    )))
                }
            }
            ComparisonLevel::Columns => {
                let mut source = self.source.table_columns(name).await?;
                let mut target = self.target.table_columns(name).await?;
                if same_columns(&source, &target) {
                    Ok(None)
                } else {
                    source.sort_by(|a, b| a.name.cmp(&b.name));
                    target.sort_by(|a, b| a.name.cmp(&b.name));
                    Ok(Some(ComparisonOutcome::mismatch(
                        level,
                        MismatchDetail::Columns { source, target },
                    )))
                }
            }
            ComparisonLevel::PrimaryKey => {
                let source = self.source.primary_key_column(name).await?;
                let target = self.target.primary_key_column(name).await?;
                if source == target {
                    Ok(None)
                } else {
                    Ok(Some(ComparisonOutcome::mismatch(
                        level,
                        MismatchDetail::PrimaryKey { source, target },
                    )))
                }
            }
            // Per-key levels are evaluated by record_events
            ComparisonLevel::KeyValues | ComparisonLevel::RowContent => Ok(None),
        }
    }

    /// Read both key sets and build the lazy per-record stream
    async fn record_events(&self, name: &str) -> Result<BoxStream<'static, ComparisonEvent>> {
        let source_keys = self.source.primary_key_values(name).await?;
        let target_keys: HashSet<KeyValue> = self
            .target
            .primary_key_values(name)
            .await?
            .into_iter()
            .collect();

        debug!(
            table = %name,
            source_keys = source_keys.len(),
            target_keys = target_keys.len(),
            "Comparing primary key values"
        );

        // Both sides select the source's columns, in the source's order
        let columns: Option<Arc<Vec<String>>> = if ComparisonLevel::RowContent.within(self.max_level) {
            let names = self
                .source
                .table_columns(name)
                .await?
                .into_iter()
                .map(|c| c.name)
                .collect();
            Some(Arc::new(names))
        } else {
            None
        };

        let comparator = self.clone();
        let target_keys = Arc::new(target_keys);
        let table: Arc<str> = Arc::from(name);

        // buffered() keeps source key order whatever order the fetches finish in
        Ok(stream::iter(source_keys)
            .map(move |key| {
                let comparator = comparator.clone();
                let target_keys = Arc::clone(&target_keys);
                let columns = columns.clone();
                let table = Arc::clone(&table);
                async move {
                    let outcome = match columns {
                        _ if !target_keys.contains(&key) => ComparisonOutcome::MissingInTarget,
                        Some(columns) => comparator.compare_row(&table, &key, &columns).await,
                        None => ComparisonOutcome::Match,
                    };
                    ComparisonEvent::record(&table, key, outcome)
                }
            })
            .buffered(self.key_workers)
            .boxed())
    }

    async fn compare_row(&self, name: &str, key: &KeyValue, columns: &[String]) -> ComparisonOutcome {
        let fetch = async {
            futures::try_join!(
                self.source.row_columns_by_primary_key(name, key, columns),
                self.target.row_columns_by_primary_key(name, key, columns),
            )
        };
        let rows = match self.row_timeout {
            Some(limit) => tokio::time::timeout(limit, fetch)
                .await
                .unwrap_or(Err(Error::Timeout(limit))),
            None => fetch.await,
        };

        match rows {
            Ok((Some(source), Some(target))) => {
                if source == target {
                    ComparisonOutcome::Match
                } else {
                    ComparisonOutcome::mismatch(
                        ComparisonLevel::RowContent,
                        MismatchDetail::Row { source, target },
                    )
                }
            }
            // Deleted from the target after the key scan
            Ok((Some(_), None)) => ComparisonOutcome::MissingInTarget,
            Ok((None, _)) => ComparisonOutcome::error(format!(
                "record {} disappeared from source '{}' during the scan",
                key, name
            )),
            Err(err) => {
                warn!(table = %name, key = %key, error = %err, "Row fetch failed");
                ComparisonOutcome::error(err)
            }
        }
    }
}

/// Set equality over the compared column attributes; nullability is ignored
fn same_columns(source: &[Column], target: &[Column]) -> bool {
    fn definitions(columns: &[Column]) -> HashSet<(&str, &str, Option<&str>, ConstraintKind)> {
        columns
            .iter()
            .map(|c| {
                (
                    c.name.as_str(),
                    c.data_type.as_str(),
                    c.default.as_deref(),
                    c.constraint,
                )
            })
            .collect()
    }

    source.len() == target.len() && definitions(source) == definitions(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_order_and_nullability_are_ignored() {
        let a = vec![
            Column::new("id", "integer").constraint(ConstraintKind::PrimaryKey),
            Column::new("total", "numeric").nullable(true),
        ];
        let b = vec![
            Column::new("total", "numeric"),
            Column::new("id", "integer").constraint(ConstraintKind::PrimaryKey),
        ];
        assert!(same_columns(&a, &b));
    }

    #[test]
    fn default_and_constraint_differences_count() {
        let a = vec![Column::new("status", "text").default("'new'::text")];
        let b = vec![Column::new("status", "text")];
        assert!(!same_columns(&a, &b));

        let c = vec![Column::new("email", "text").constraint(ConstraintKind::Unique)];
        let d = vec![Column::new("email", "text")];
        assert!(!same_columns(&c, &d));
    }
}
