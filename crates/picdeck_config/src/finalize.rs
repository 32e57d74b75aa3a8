use picdeck_core::{
    BoundaryPair, FieldBoundary, L0, OutputKey, ParticleBoundary, SPEED_OF_LIGHT_SI,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::diagnostic::DiagnosticConfig;
use crate::error::{ConfigError, ConfigWarning, Result};
use crate::interaction::InteractionConfig;
use crate::simulation::{SimulationBuilder, SimulationParams};
use crate::species::SpeciesConfig;

/// Values implied by the deck, computed once at finalize
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedParams {
    pub cells_per_axis: Vec<u64>,
    pub n_timesteps: u64,
    /// Courant limit of the grid
    pub cfl_timestep: f64,
    /// Explicit value, or 2*pi*c / wavelength
    pub reference_angular_frequency_si: Option<f64>,
    pub species: Vec<DerivedSpecies>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedSpecies {
    pub name: String,
    pub number_density: f64,
    pub boundary_conditions: Vec<BoundaryPair<ParticleBoundary>>,
}

/// A validated, immutable deck ready for the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationConfig {
    params: SimulationParams,
    species: Vec<SpeciesConfig>,
    interactions: Vec<InteractionConfig>,
    diagnostics: Vec<DiagnosticConfig>,
    derived: DerivedParams,
    warnings: Vec<ConfigWarning>,
}

impl SimulationConfig {
    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn species(&self) -> &[SpeciesConfig] {
        &self.species
    }

    pub fn species_named(&self, name: &str) -> Option<&SpeciesConfig> {
        self.species.iter().find(|s| s.name == name)
    }

    pub fn interactions(&self) -> &[InteractionConfig] {
        &self.interactions
    }

    pub fn diagnostics(&self) -> &[DiagnosticConfig] {
        &self.diagnostics
    }

    pub fn derived(&self) -> &DerivedParams {
        &self.derived
    }

    pub fn warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }

    /// RNG for particle initialization: seeded when the deck sets `random_seed`
    pub fn rng(&self) -> ChaCha8Rng {
        match self.params.random_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    /// Engine input as JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

impl SimulationBuilder {
    /// Cross-check the whole deck, collecting every problem, and freeze it
    pub fn finalize(&self) -> Result<SimulationConfig> {
        let violations = self.cross_validate();
        if !violations.is_empty() {
            return Err(ConfigError::ConfigurationIncomplete { violations });
        }

        let derived = self.derive();
        let mut warnings = self.warnings.clone();
        warnings.extend(self.run_warnings(&derived));
        for warning in &warnings[self.warnings.len()..] {
            warn!("{warning}");
        }

        info!(
            geometry = %self.params.geometry,
            species = self.species.len(),
            interactions = self.interactions.len(),
            diagnostics = self.diagnostics.len(),
            n_timesteps = derived.n_timesteps,
            "configuration finalized"
        );

        Ok(SimulationConfig {
            params: self.params.clone(),
            species: self.species.values().cloned().collect(),
            interactions: self.interactions.clone(),
            diagnostics: self.diagnostics.clone(),
            derived,
            warnings,
        })
    }

    fn cross_validate(&self) -> Vec<ConfigError> {
        let mut violations = Vec::new();

        for (i, interaction) in self.interactions.iter().enumerate() {
            for name in interaction.species() {
                if self.species(name).is_none() {
                    violations.push(ConfigError::UnknownSpeciesReference {
                        context: format!("interaction #{i}"),
                        name: name.to_string(),
                    });
                }
            }
        }

        let mut keys = BTreeSet::new();
        let mut reported: BTreeSet<OutputKey> = BTreeSet::new();
        for diagnostic in &self.diagnostics {
            for name in diagnostic.spec.species() {
                if self.species(name).is_none() {
                    violations.push(ConfigError::UnknownSpeciesReference {
                        context: format!("diagnostic {}", diagnostic.key),
                        name: name.to_string(),
                    });
                }
            }
            if !keys.insert(diagnostic.key) && reported.insert(diagnostic.key) {
                violations.push(ConfigError::DuplicateOutputKey(diagnostic.key));
            }
        }

        let axes = self.params.geometry.axis_names();
        for species in self.species.values() {
            let pairs = species.boundary_conditions.iter();
            let fields = &self.params.field_boundary_conditions;
            for ((axis, particle), field) in axes.iter().zip(pairs).zip(fields) {
                if particle.is_periodic() != field.is_periodic() {
                    violations.push(ConfigError::BoundaryMismatch {
                        species: species.name.clone(),
                        axis: axis.to_string(),
                    });
                }
            }
        }

        violations
    }

    fn derive(&self) -> DerivedParams {
        let params = &self.params;
        let cells_per_axis = params
            .grid
            .iter()
            .map(|g| (g.grid_length / g.cell_length).round() as u64)
            .collect();

        // Nudge up so 31400 / 1.57 lands on 20000, not 19999
        let ratio = params.simulation_time / params.timestep;
        let n_timesteps = (ratio * (1.0 + 1e-12)).floor() as u64;

        let inverse_sq: f64 = params
            .grid
            .iter()
            .map(|g| 1.0 / (g.cell_length * g.cell_length))
            .sum();
        let cfl_timestep = 1.0 / inverse_sq.sqrt();

        let reference_angular_frequency_si = params.reference_angular_frequency_si.or_else(|| {
            params
                .reference_wavelength_si
                .map(|wavelength| L0 * SPEED_OF_LIGHT_SI / wavelength)
        });

        let species = self
            .species
            .values()
            .map(|s| DerivedSpecies {
                name: s.name.clone(),
                // Neutral species with a charge density are rejected at define time
                number_density: s.density.number_density(s.charge).unwrap_or(0.0),
                boundary_conditions: if s.boundary_conditions.is_empty() {
                    params
                        .field_boundary_conditions
                        .iter()
                        .map(inherit_boundary)
                        .collect()
                } else {
                    s.boundary_conditions.clone()
                },
            })
            .collect();

        DerivedParams {
            cells_per_axis,
            n_timesteps,
            cfl_timestep,
            reference_angular_frequency_si,
            species,
        }
    }

    fn run_warnings(&self, derived: &DerivedParams) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        if self.params.timestep > derived.cfl_timestep {
            warnings.push(ConfigWarning::CflViolation {
                timestep: self.params.timestep,
                limit: derived.cfl_timestep,
            });
        }
        for diagnostic in &self.diagnostics {
            if diagnostic.every > derived.n_timesteps {
                warnings.push(ConfigWarning::CadenceBeyondRun {
                    key: diagnostic.key,
                    every: diagnostic.every,
                    n_timesteps: derived.n_timesteps,
                });
            }
        }
        warnings
    }
}

fn inherit_boundary(field: &BoundaryPair<FieldBoundary>) -> BoundaryPair<ParticleBoundary> {
    let map = |tag: FieldBoundary| match tag {
        FieldBoundary::Periodic => ParticleBoundary::Periodic,
        FieldBoundary::Reflective => ParticleBoundary::Reflective,
        FieldBoundary::SilverMuller => ParticleBoundary::Remove,
    };
    BoundaryPair::new(map(field.min), map(field.max))
}
