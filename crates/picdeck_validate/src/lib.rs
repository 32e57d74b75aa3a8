//! Baseline validation of engine output.
//!
//! A suite is a list of [`ValidationCase`]s. Each case pulls one series out
//! of a finished run's result store with a [`SeriesSelector`] and checks it
//! against the baseline recorded under the case label. Cases run in order
//! and a failing case never stops the ones after it.

pub mod compare;
pub mod error;
pub mod harness;
pub mod report;
pub mod selector;

pub use compare::{Deviation, check_tolerance, max_deviation};
pub use error::{Result, ValidationError};
pub use harness::{
    BaselinePolicy, FailureReason, Harness, HarnessConfig, Outcome, ValidationCase,
    ValidationResult, load_cases,
};
pub use report::SuiteReport;
pub use selector::{
    AxisSlice, SeriesOutput, SeriesSelector, SliceOp, Timesteps, extract_series,
    open_result_store,
};
