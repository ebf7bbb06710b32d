//! Rendering of comparison results
//!
//! The engine only produces [`ComparisonEvent`]s. This module turns them
//! into text or JSON lines and tallies a [`Summary`] for the exit code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::compare::{ComparisonEvent, ComparisonOutcome, MismatchDetail, ObjectKind, SkipReason};
use crate::error::Result;

/// Exit code when source and target agree
pub const EXIT_OK: i32 = 0;
/// Exit code when divergence was found
pub const EXIT_DIVERGED: i32 = 1;
/// Exit code when an object or the run failed
pub const EXIT_ERROR: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

/// Outcome tallies for one kind of object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub matched: usize,
    pub missing: usize,
    pub mismatched: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl OutcomeCounts {
    fn add(&mut self, outcome: &ComparisonOutcome) {
        match outcome {
            ComparisonOutcome::Match => self.matched += 1,
            ComparisonOutcome::MissingInTarget => self.missing += 1,
            ComparisonOutcome::Mismatch { .. } => self.mismatched += 1,
            ComparisonOutcome::Skipped { .. } => self.skipped += 1,
            ComparisonOutcome::Error { .. } => self.errors += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.matched + self.missing + self.mismatched + self.skipped + self.errors
    }
}

/// Totals of a comparison run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: i64,
    pub sequences: OutcomeCounts,
    pub tables: OutcomeCounts,
    pub records: OutcomeCounts,
}

impl Summary {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            elapsed_ms: 0,
            sequences: OutcomeCounts::default(),
            tables: OutcomeCounts::default(),
            records: OutcomeCounts::default(),
        }
    }

    pub fn record(&mut self, event: &ComparisonEvent) {
        match event.kind {
            ObjectKind::Sequence => self.sequences.add(&event.outcome),
            ObjectKind::Table => self.tables.add(&event.outcome),
            ObjectKind::Record { .. } => self.records.add(&event.outcome),
        }
    }

    pub fn finish(&mut self) {
        self.elapsed_ms = (Utc::now() - self.started_at).num_milliseconds();
    }

    fn all(&self) -> [&OutcomeCounts; 3] {
        [&self.sequences, &self.tables, &self.records]
    }

    pub fn has_errors(&self) -> bool {
        self.all().iter().any(|c| c.errors > 0)
    }

    pub fn has_divergence(&self) -> bool {
        self.all().iter().any(|c| c.missing + c.mismatched > 0)
    }

    pub fn exit_code(&self) -> i32 {
        if self.has_errors() {
            EXIT_ERROR
        } else if self.has_divergence() {
            EXIT_DIVERGED
        } else {
            EXIT_OK
        }
    }
}

/// Render one event in the requested format
pub fn render_event(event: &ComparisonEvent, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(event)?),
        OutputFormat::Text => Ok(render_text(event)),
    }
}

pub fn render_summary(summary: &Summary, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(&serde_json::json!({ "summary": summary }))?),
        OutputFormat::Text => {
            let mut out = String::new();
            let _ = writeln!(out, "-----------------------------------------------------");
            for (label, counts) in [
                ("sequences", &summary.sequences),
                ("tables", &summary.tables),
                ("records", &summary.records),
            ] {
                if counts.total() == 0 {
                    continue;
                }
                let _ = writeln!(
                    out,
                    "{}: {} OK, {} missing, {} different, {} skipped, {} failed",
                    label, counts.matched, counts.missing, counts.mismatched, counts.skipped, counts.errors
                );
            }
            let _ = write!(out, "Done in {} ms", summary.elapsed_ms);
            Ok(out)
        }
    }
}

fn render_text(event: &ComparisonEvent) -> String {
    let subject = match &event.kind {
        ObjectKind::Sequence => format!("Sequence '{}'", event.name),
        ObjectKind::Table => format!("Table '{}'", event.name),
        ObjectKind::Record { key } => format!("\trecord ({})", key),
    };

    let verdict = match &event.outcome {
        ComparisonOutcome::Match => "OK".to_string(),
        ComparisonOutcome::MissingInTarget => match event.kind {
            ObjectKind::Record { .. } => "KO, record misses.".to_string(),
            _ => "KO, missing in target".to_string(),
        },
        ComparisonOutcome::Mismatch { level, detail } => {
            format!("KO at level {}: {}", level, describe_mismatch(detail))
        }
        ComparisonOutcome::Skipped { level, reason } => match reason {
            SkipReason::NoPrimaryKey => format!(
                "OK, {} skipped: no single-column primary key",
                level.description()
            ),
        },
        ComparisonOutcome::Error { detail } => format!("ERROR: {}", detail),
    };

    format!("{} ... {}", subject, verdict)
}

fn describe_mismatch(detail: &MismatchDetail) -> String {
    match detail {
        MismatchDetail::RowCount {
            source,
            target,
            delta,
        } => format!("{} records in source, {} in target, {} records miss.", source, target, delta),
        MismatchDetail::Columns { source, target } => {
            let names = |columns: &[crate::catalog::Column]| {
                columns
                    .iter()
                    .map(|c| format!("{} {}", c.name, c.data_type))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            format!("source [{}], target [{}]", names(source), names(target))
        }
        MismatchDetail::PrimaryKey { source, target } => format!(
            "source key {}, target key {}",
            source.as_deref().unwrap_or("none"),
            target.as_deref().unwrap_or("no primary key")
        ),
        MismatchDetail::Row { source, target } => {
            format!("record data differs: {:?} vs {:?}", source, target)
        }
        MismatchDetail::Sequence { source, target } => {
            format!("sequence check differs: {:?} vs {:?}", source, target)
        }
    }
}
