use ndarray::ArrayD;
use picdeck_core::{RELATIVE_EPSILON, Tolerance};
use picdeck_storage::{BaselineEntry, BaselineStore, ResultStore};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::compare::{Deviation, check_tolerance, max_deviation};
use crate::error::{Result, ValidationError};
use crate::report::SuiteReport;
use crate::selector::{SeriesSelector, extract_series};

/// What to do with existing baselines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselinePolicy {
    #[default]
    Compare,
    /// Accept every value as the new baseline
    Update,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    pub policy: BaselinePolicy,
    /// Floor on |reference| for relative deviations
    pub relative_epsilon: f64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            policy: BaselinePolicy::Compare,
            relative_epsilon: RELATIVE_EPSILON,
        }
    }
}

/// One named check against a baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationCase {
    pub label: String,
    pub selector: SeriesSelector,
    /// Exact agreement when absent
    #[serde(default)]
    pub tolerance: Option<Tolerance>,
}

impl ValidationCase {
    pub fn new(label: &str, selector: SeriesSelector) -> Self {
        Self {
            label: label.to_string(),
            selector,
            tolerance: None,
        }
    }

    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = Some(tolerance);
        self
    }
}

/// Read a JSON list of cases
pub fn load_cases(path: &Path) -> Result<Vec<ValidationCase>> {
    let case_file_error = |message: String| ValidationError::CaseFile {
        path: path.to_path_buf(),
        message,
    };
    let text = fs::read_to_string(path).map_err(|e| case_file_error(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| case_file_error(e.to_string()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Deviation(Deviation),
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    /// The case could not be evaluated
    Error(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deviation(deviation) => write!(f, "{deviation}"),
            Self::ShapeMismatch { expected, actual } => {
                write!(f, "shape {actual:?} does not match baseline {expected:?}")
            }
            Self::Error(message) => f.write_str(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pass { max_deviation: f64 },
    Fail(FailureReason),
    NewBaseline,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub label: String,
    pub tolerance: Tolerance,
    pub outcome: Outcome,
}

impl ValidationResult {
    fn failed(label: &str, tolerance: Tolerance, reason: FailureReason) -> Self {
        Self {
            label: label.to_string(),
            tolerance,
            outcome: Outcome::Fail(reason),
        }
    }

    pub fn is_fail(&self) -> bool {
        matches!(self.outcome, Outcome::Fail(_))
    }
}

/// Compares values against a baseline store, recording new baselines as it goes
pub struct Harness {
    baselines: BaselineStore,
    config: HarnessConfig,
}

impl Harness {
    pub fn new(baselines: BaselineStore, config: HarnessConfig) -> Self {
        Self { baselines, config }
    }

    pub fn baselines(&self) -> &BaselineStore {
        &self.baselines
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Check `actual` against the baseline for `label`.
    /// Without a baseline (or under [`BaselinePolicy::Update`]) the value is
    /// persisted and the result is `NewBaseline`.
    pub fn compare(
        &mut self,
        label: &str,
        actual: ArrayD<f64>,
        tolerance: Option<Tolerance>,
    ) -> Result<ValidationResult> {
        self.compare_from_run(label, actual, tolerance, None)
    }

    fn compare_from_run(
        &mut self,
        label: &str,
        actual: ArrayD<f64>,
        tolerance: Option<Tolerance>,
        run_id: Option<Uuid>,
    ) -> Result<ValidationResult> {
        let tolerance = tolerance.unwrap_or_else(Tolerance::exact);
        check_tolerance(&tolerance)?;

        let reference = match self.baselines.get(label) {
            Some(entry) if self.config.policy == BaselinePolicy::Compare => &entry.value,
            _ => {
                self.baselines.record(
                    label,
                    BaselineEntry {
                        value: actual,
                        tolerance: Some(tolerance),
                        run_id,
                    },
                )?;
                return Ok(ValidationResult {
                    label: label.to_string(),
                    tolerance,
                    outcome: Outcome::NewBaseline,
                });
            }
        };

        let worst = match max_deviation(
            &actual,
            reference,
            tolerance.kind,
            self.config.relative_epsilon,
        ) {
            Ok(worst) => worst,
            Err(ValidationError::ShapeMismatch { expected, actual }) => {
                warn!(label, ?expected, ?actual, "shape mismatch");
                return Ok(ValidationResult::failed(
                    label,
                    tolerance,
                    FailureReason::ShapeMismatch { expected, actual },
                ));
            }
            Err(e) => return Err(e),
        };

        let outcome = match worst {
            Some(worst) if worst.deviation.is_nan() || worst.deviation > tolerance.value => {
                warn!(
                    label,
                    deviation = worst.deviation,
                    index = ?worst.index,
                    %tolerance,
                    "case failed"
                );
                Outcome::Fail(FailureReason::Deviation(worst))
            }
            worst => {
                let max_deviation = worst.map_or(0.0, |w| w.deviation);
                debug!(label, max_deviation, %tolerance, "case passed");
                Outcome::Pass { max_deviation }
            }
        };
        Ok(ValidationResult {
            label: label.to_string(),
            tolerance,
            outcome,
        })
    }

    /// Run every case in order. A case that cannot be evaluated fails on its
    /// own; the remaining cases still run.
    pub fn run_suite(&mut self, store: &ResultStore, cases: &[ValidationCase]) -> SuiteReport {
        info!(
            store = %store.path().display(),
            run_id = %store.run_id(),
            cases = cases.len(),
            policy = ?self.config.policy,
            "running validation suite"
        );
        let mut occurrences: HashMap<&str, usize> = HashMap::new();
        let mut slots = HashSet::new();
        let mut results = Vec::with_capacity(cases.len());

        for case in cases {
            let tolerance = case.tolerance.unwrap_or_else(Tolerance::exact);
            let occurrence = occurrences.entry(case.label.as_str()).or_insert(0);
            *occurrence += 1;
            let slot = baseline_slot(&case.label, *occurrence);

            let result = if !slots.insert(slot.clone()) {
                Err(ValidationError::DuplicateLabel(slot.clone()))
            } else {
                extract_series(store, &case.selector).and_then(|actual| {
                    self.compare_from_run(&slot, actual, case.tolerance, Some(store.run_id()))
                })
            };

            results.push(result.unwrap_or_else(|e| {
                warn!(label = %slot, error = %e, "case could not be evaluated");
                ValidationResult::failed(&slot, tolerance, FailureReason::Error(e.to_string()))
            }));
        }

        let report = SuiteReport::new(store.path().to_path_buf(), store.run_id(), results);
        info!(
            passed = report.passed(),
            failed = report.failed(),
            new_baselines = report.new_baselines(),
            "validation suite finished"
        );
        report
    }
}

/// Baseline key of the n-th case (from 1) carrying `label` in a suite.
/// The first keeps the bare label, later ones get `label#n`.
fn baseline_slot(label: &str, occurrence: usize) -> String {
    if occurrence <= 1 {
        label.to_string()
    } else {
        format!("{label}#{occurrence}")
    }
}
