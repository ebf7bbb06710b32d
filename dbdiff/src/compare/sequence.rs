//! Sequence comparator

use std::sync::Arc;
use tracing::debug;

use crate::catalog::CatalogProvider;
use crate::compare::level::ComparisonLevel;
use crate::compare::outcome::{ComparisonEvent, ComparisonOutcome, MismatchDetail};
use crate::error::Result;

/// Compares a source sequence with its namesake in the target
#[derive(Clone)]
pub struct SequenceComparator {
    source: Arc<dyn CatalogProvider>,
    target: Arc<dyn CatalogProvider>,
    max_level: ComparisonLevel,
}

impl SequenceComparator {
    pub fn new(
        source: Arc<dyn CatalogProvider>,
        target: Arc<dyn CatalogProvider>,
        max_level: ComparisonLevel,
    ) -> Self {
        Self {
            source,
            target,
            max_level,
        }
    }

    /// Compare one sequence; failures become an error outcome
    pub async fn compare(&self, name: &str) -> ComparisonEvent {
        let outcome = self
            .try_compare(name)
            .await
            .unwrap_or_else(ComparisonOutcome::error);
        ComparisonEvent::sequence(name, outcome)
    }

    async fn try_compare(&self, name: &str) -> Result<ComparisonOutcome> {
        let target_names = self.target.sequence_names().await?;
        if !target_names.iter().any(|s| s == name) {
            return Ok(ComparisonOutcome::MissingInTarget);
        }

        if !ComparisonLevel::Cardinality.within(self.max_level) {
            return Ok(ComparisonOutcome::Match);
        }

        debug!(sequence = %name, "Comparing sequence definition");
        let source = self.source.sequence_descriptor(name).await?;
        let target = self.target.sequence_descriptor(name).await?;

        if source == target {
            Ok(ComparisonOutcome::Match)
        } else {
            Ok(ComparisonOutcome::mismatch(
                ComparisonLevel::Cardinality,
                MismatchDetail::Sequence { source, target },
            ))
        }
    }
}
