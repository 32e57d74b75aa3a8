//! Configuration errors and warnings

use picdeck_core::{Geometry, OutputKey, ParticleQuantity};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Everything that stops a deck from reaching the engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{what} has {found} entries but {geometry} needs {expected}")]
    InvalidDimensionality {
        what: String,
        geometry: Geometry,
        expected: usize,
        found: usize,
    },

    #[error("invalid timestep {timestep} for simulation time {simulation_time} (expected 0 < timestep <= simulation_time < inf)")]
    InvalidTimestep { timestep: f64, simulation_time: f64 },

    #[error("invalid grid along {axis}: cell length {cell_length}, grid length {grid_length}")]
    InvalidGrid {
        axis: String,
        cell_length: f64,
        grid_length: f64,
    },

    #[error("{what} is periodic on only one end of axis {axis}")]
    AsymmetricPeriodic { what: String, axis: String },

    #[error("invalid {name}: {value} (expected {constraint})")]
    InvalidParameter {
        name: String,
        value: String,
        constraint: String,
    },

    #[error("missing {name}: {reason}")]
    MissingParameter { name: String, reason: String },

    #[error("species '{0}' is already defined")]
    DuplicateSpeciesName(String),

    #[error("species '{0}' sets both number_density and charge_density")]
    AmbiguousDensity(String),

    #[error("species '{0}' sets neither number_density nor charge_density")]
    MissingDensity(String),

    #[error("species '{species}' drifts at {speed} (must be below the speed of light)")]
    SuperluminalVelocity { species: String, speed: f64 },

    #[error("{context} references unknown species '{name}'")]
    UnknownSpeciesReference { context: String, name: String },

    #[error("invalid coupling parameter {0} (must be > 0)")]
    InvalidCoupling(f64),

    #[error("species '{0}' appears in both interaction groups")]
    OverlappingSpeciesGroups(String),

    #[error("{0} is empty")]
    EmptySpeciesGroup(String),

    #[error("ionizing interaction has no species with an atomic number among {species:?}")]
    IonizationWithoutTarget { species: Vec<String> },

    #[error("invalid cadence {0} (must be > 0)")]
    InvalidCadence(u64),

    #[error("binning axis {quantity}: min {min} must be below max {max}")]
    AxisOutOfRange {
        quantity: ParticleQuantity,
        min: f64,
        max: f64,
    },

    #[error("binning axis {quantity} does not exist in {geometry}")]
    AxisNotInGeometry {
        quantity: ParticleQuantity,
        geometry: Geometry,
    },

    #[error("more than one diagnostic writes to {0}")]
    DuplicateOutputKey(OutputKey),

    #[error("species '{species}' boundary along {axis} disagrees with the field boundary periodicity")]
    BoundaryMismatch { species: String, axis: String },

    #[error("failed to read deck {path}: {message}")]
    Io { path: String, message: String },

    #[error("malformed deck: {0}")]
    Parse(String),

    #[error("configuration incomplete, {} problem(s):\n{}", .violations.len(), list_violations(.violations))]
    ConfigurationIncomplete { violations: Vec<ConfigError> },
}

impl ConfigError {
    pub fn invalid(name: &str, value: impl fmt::Display, constraint: &str) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            constraint: constraint.to_string(),
        }
    }

    /// Violations carried by a `ConfigurationIncomplete`, or the error itself
    pub fn violations(&self) -> Vec<&ConfigError> {
        match self {
            Self::ConfigurationIncomplete { violations } => violations.iter().collect(),
            other => vec![other],
        }
    }
}

fn list_violations(violations: &[ConfigError]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Accepted but suspicious settings; kept on the finalized config
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ConfigWarning {
    /// Degenerate collision strength, normally only seen in test decks
    NearZeroCoupling {
        species1: Vec<String>,
        species2: Vec<String>,
        coulomb_log: f64,
    },
    /// Timestep above the Courant limit of the grid
    CflViolation { timestep: f64, limit: f64 },
    /// Diagnostic period longer than the whole run, so only step 0 is written
    CadenceBeyondRun {
        key: OutputKey,
        every: u64,
        n_timesteps: u64,
    },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NearZeroCoupling {
                species1,
                species2,
                coulomb_log,
            } => write!(
                f,
                "near-zero coulomb_log {coulomb_log} between {species1:?} and {species2:?}"
            ),
            Self::CflViolation { timestep, limit } => {
                write!(f, "timestep {timestep} exceeds the CFL limit {limit}")
            }
            Self::CadenceBeyondRun {
                key,
                every,
                n_timesteps,
            } => write!(
                f,
                "{key} records every {every} steps but the run has {n_timesteps}"
            ),
        }
    }
}
