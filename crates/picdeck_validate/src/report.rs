use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::harness::{Outcome, ValidationResult};

/// Outcome of a suite run, one result per case in case order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuiteReport {
    pub store: PathBuf,
    pub run_id: Uuid,
    pub results: Vec<ValidationResult>,
}

impl SuiteReport {
    pub fn new(store: PathBuf, run_id: Uuid, results: Vec<ValidationResult>) -> Self {
        Self {
            store,
            run_id,
            results,
        }
    }

    pub fn passed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Pass { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Fail(_)))
    }

    pub fn new_baselines(&self) -> usize {
        self.count(|o| matches!(o, Outcome::NewBaseline))
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results.iter().filter(|r| r.is_fail())
    }

    /// No case failed; new baselines count as success
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_success() { 0 } else { 1 }
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "validation of {} (run {})", self.store.display(), self.run_id)?;
        let width = self.results.iter().map(|r| r.label.len()).max().unwrap_or(0);
        for result in &self.results {
            let label = &result.label;
            match &result.outcome {
                Outcome::Pass { max_deviation } => writeln!(
                    f,
                    "  PASS  {label:<width$}  max deviation {max_deviation:e} ({})",
                    result.tolerance
                )?,
                Outcome::Fail(reason) => writeln!(
                    f,
                    "  FAIL  {label:<width$}  {reason} ({})",
                    result.tolerance
                )?,
                Outcome::NewBaseline => writeln!(f, "  NEW   {label:<width$}  baseline recorded")?,
            }
        }
        write!(
            f,
            "{} passed, {} failed, {} new baselines",
            self.passed(),
            self.failed(),
            self.new_baselines()
        )
    }
}
