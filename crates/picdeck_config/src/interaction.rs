use picdeck_core::NEAR_ZERO_COUPLING;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, ConfigWarning, Result};
use crate::simulation::SimulationBuilder;

/// Binary collision parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionParams {
    /// Coulomb logarithm
    pub coulomb_log: f64,
    /// Also run collisional ionization
    #[serde(default)]
    pub ionizing: bool,
    /// Collisions are computed every this many steps
    #[serde(default = "default_every")]
    pub every: u64,
}

fn default_every() -> u64 {
    1
}

impl InteractionParams {
    pub fn new(coulomb_log: f64) -> Self {
        Self {
            coulomb_log,
            ionizing: false,
            every: 1,
        }
    }
}

/// Collisions between two disjoint groups of species, held by name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionConfig {
    pub species1: Vec<String>,
    pub species2: Vec<String>,
    pub coulomb_log: f64,
    pub ionizing: bool,
    pub every: u64,
}

impl InteractionConfig {
    pub fn species(&self) -> impl Iterator<Item = &str> {
        self.species1.iter().chain(&self.species2).map(String::as_str)
    }
}

impl SimulationBuilder {
    /// Validate and register a collision block between two species groups
    pub fn define_interaction<S: AsRef<str>>(
        &mut self,
        species1: &[S],
        species2: &[S],
        params: InteractionParams,
    ) -> Result<&InteractionConfig> {
        let species1: Vec<String> = species1.iter().map(|s| s.as_ref().to_string()).collect();
        let species2: Vec<String> = species2.iter().map(|s| s.as_ref().to_string()).collect();

        if species1.is_empty() {
            return Err(ConfigError::EmptySpeciesGroup("species1".into()));
        }
        if species2.is_empty() {
            return Err(ConfigError::EmptySpeciesGroup("species2".into()));
        }
        let context = format!("interaction {species1:?} x {species2:?}");
        for name in species1.iter().chain(&species2) {
            if self.species(name).is_none() {
                return Err(ConfigError::UnknownSpeciesReference {
                    context,
                    name: name.clone(),
                });
            }
        }
        if let Some(shared) = species1.iter().find(|s| species2.contains(s)) {
            return Err(ConfigError::OverlappingSpeciesGroups(shared.clone()));
        }

        if !(params.coulomb_log > 0.0 && params.coulomb_log.is_finite()) {
            return Err(ConfigError::InvalidCoupling(params.coulomb_log));
        }
        if params.every == 0 {
            return Err(ConfigError::InvalidCadence(0));
        }
        if params.ionizing {
            let has_target = species1
                .iter()
                .chain(&species2)
                .filter_map(|name| self.species(name))
                .any(|s| s.is_ionizable());
            if !has_target {
                return Err(ConfigError::IonizationWithoutTarget {
                    species: species1.iter().chain(&species2).cloned().collect(),
                });
            }
        }

        if params.coulomb_log < NEAR_ZERO_COUPLING {
            let warning = ConfigWarning::NearZeroCoupling {
                species1: species1.clone(),
                species2: species2.clone(),
                coulomb_log: params.coulomb_log,
            };
            warn!("{warning}");
            self.warnings.push(warning);
        }

        self.interactions.push(InteractionConfig {
            species1,
            species2,
            coulomb_log: params.coulomb_log,
            ionizing: params.ionizing,
            every: params.every,
        });
        Ok(&self.interactions[self.interactions.len() - 1])
    }
}
