use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::error::ErrorKind;

/// One recorded, non-fatal import failure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportErrorEntry {
    pub entity_id: Option<i64>,
    pub kind: ErrorKind,
    pub message: String,
    pub details: Option<String>,
}

/// Run-scoped counters. Snapshots go to the progress channel after every
/// batch; the final value is returned to the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportProgress {
    /// Records fetched so far; the upstream total is unknown up front
    pub total: u64,
    /// Records seen so far
    pub current: u64,
    pub success: u64,
    pub failed: u64,
    pub last_batch_id: Option<u32>,
    pub errors: Vec<ImportErrorEntry>,
    pub cancelled: bool,
    /// Gave up after too many consecutive skipped batches
    pub stopped_early: bool,
}

impl ImportProgress {
    pub fn record(&mut self, kind: ErrorKind, entity_id: Option<i64>, message: impl Into<String>, details: Option<String>) {
        self.errors.push(ImportErrorEntry {
            entity_id,
            kind,
            message: message.into(),
            details,
        });
    }

    /// Some records landed and some did not
    pub fn is_partial(&self) -> bool {
        self.success > 0 && self.failed > 0
    }
}

/// Cooperative stop signal, checked between batches.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let handle = token.clone();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn partial_needs_both_counters() {
        let mut p = ImportProgress::default();
        p.success = 9;
        assert!(!p.is_partial());
        p.failed = 1;
        p.record(ErrorKind::Validation, Some(7), "missing team", None);
        assert!(p.is_partial());
        assert_eq!(p.errors[0].entity_id, Some(7));
    }

    #[test]
    fn error_kind_serializes_snake_case() {
        let entry = ImportErrorEntry {
            entity_id: None,
            kind: ErrorKind::BatchFetch,
            message: "timed out".into(),
            details: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "batch_fetch");
    }
}
