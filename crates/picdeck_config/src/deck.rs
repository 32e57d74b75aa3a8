//! JSON input decks.
//!
//! A deck file mirrors the engine's namelists:
//!
//! ```json
//! {
//!   "simulation": { "geometry": "1Dcartesian", "grid": [{"cell_length": 6.28, "grid_length": 251.2}],
//!                   "timestep": 1.57, "simulation_time": 31400, "EM_boundary_conditions": [["periodic"]] },
//!   "species": [{ "name": "ion1", "mass": 48600, "number_density": 1.0 }],
//!   "interactions": [{ "species1": ["electron1"], "species2": ["ion1"], "coulomb_log": 2.0 }],
//!   "diagnostics": [{ "every": 100, "kind": "scalar" }]
//! }
//! ```
//!
//! Blocks are defined in the order species, interactions, diagnostics, so
//! references never depend on where a block sits in the file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::diagnostic::DiagnosticParams;
use crate::error::{ConfigError, Result};
use crate::finalize::SimulationConfig;
use crate::interaction::InteractionParams;
use crate::simulation::{SimulationParams, define_simulation};
use crate::species::SpeciesParams;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionDeclaration {
    pub species1: Vec<String>,
    pub species2: Vec<String>,
    #[serde(flatten)]
    pub params: InteractionParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    pub simulation: SimulationParams,
    #[serde(default)]
    pub species: Vec<SpeciesParams>,
    #[serde(default)]
    pub interactions: Vec<InteractionDeclaration>,
    #[serde(default)]
    pub diagnostics: Vec<DiagnosticParams>,
}

impl Deck {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&text)
    }

    /// Run every block through the builder and finalize. All define errors
    /// and finalize violations come back together.
    pub fn build(&self) -> Result<SimulationConfig> {
        let mut builder = define_simulation(self.simulation.clone())?;
        let mut violations = Vec::new();

        for species in &self.species {
            if let Err(e) = builder.define_species(species.clone()) {
                violations.push(e);
            }
        }
        for declaration in &self.interactions {
            if let Err(e) = builder.define_interaction(
                declaration.species1.as_slice(),
                declaration.species2.as_slice(),
                declaration.params.clone(),
            ) {
                violations.push(e);
            }
        }
        for diagnostic in &self.diagnostics {
            if let Err(e) = builder.define_diagnostic(diagnostic.clone()) {
                violations.push(e);
            }
        }
        debug!(errors = violations.len(), "deck blocks defined");

        match builder.finalize() {
            Ok(config) if violations.is_empty() => Ok(config),
            Ok(_) => Err(ConfigError::ConfigurationIncomplete { violations }),
            Err(ConfigError::ConfigurationIncomplete { violations: more }) => {
                violations.extend(more);
                Err(ConfigError::ConfigurationIncomplete { violations })
            }
            Err(other) => {
                violations.push(other);
                Err(ConfigError::ConfigurationIncomplete { violations })
            }
        }
    }
}
