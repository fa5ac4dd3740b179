// 📦 Extraction Outcome - rows plus whatever went wrong along the way
//
// FailFast keeps the historical behavior: the first broken record aborts
// the batch. Isolate drops only the broken record and reports it.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    FailFast,
    Isolate,
}

/// A record that was dropped under `FailurePolicy::Isolate`
#[derive(Debug)]
pub struct RecordFailure {
    pub source: String,
    pub record_index: usize,
    pub error: EngineError,
}

#[derive(Debug)]
pub struct Extraction<R> {
    pub rows: Vec<R>,
    /// Non-fatal conditions (skipped sources)
    pub warnings: Vec<EngineError>,
    /// Records dropped in isolation mode
    pub failures: Vec<RecordFailure>,
}

impl<R> Extraction<R> {
    pub fn new() -> Self {
        Extraction {
            rows: Vec::new(),
            warnings: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.failures.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} rows, {} warnings, {} failed records",
            self.rows.len(),
            self.warnings.len(),
            self.failures.len()
        )
    }

    /// Apply the failure policy to one record's result
    ///
    /// Returns `Err` only when the policy says the whole batch must stop.
    pub(crate) fn settle<T>(
        &mut self,
        policy: FailurePolicy,
        source: &str,
        record_index: usize,
        result: EngineResult<T>,
    ) -> EngineResult<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(error) => match policy {
                FailurePolicy::FailFast => Err(error),
                FailurePolicy::Isolate => {
                    warn!(source, record_index, error = %error, "dropping record");
                    self.failures.push(RecordFailure {
                        source: source.to_string(),
                        record_index,
                        error,
                    });
                    Ok(None)
                }
            },
        }
    }
}

impl<R> Default for Extraction<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_fast_propagates() {
        let mut out: Extraction<u32> = Extraction::new();
        let result: EngineResult<u32> = Err(EngineError::lookup("1", "age"));
        assert!(out.settle(FailurePolicy::FailFast, "src", 0, result).is_err());
        assert!(out.failures.is_empty());
    }

    #[test]
    fn test_isolate_collects() {
        let mut out: Extraction<u32> = Extraction::new();
        let bad: EngineResult<u32> = Err(EngineError::lookup("1", "age"));
        let good: EngineResult<u32> = Ok(7);

        assert_eq!(out.settle(FailurePolicy::Isolate, "src", 0, bad).unwrap(), None);
        assert_eq!(out.settle(FailurePolicy::Isolate, "src", 1, good).unwrap(), Some(7));
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].record_index, 0);
        assert!(!out.is_clean());
        assert_eq!(out.summary(), "0 rows, 0 warnings, 1 failed records");
    }
}
