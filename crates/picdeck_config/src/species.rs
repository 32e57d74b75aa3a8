use picdeck_core::{BoundaryPair, DEFAULT_C_PART_MAX, DEFAULT_PARTICLES_PER_CELL, ParticleBoundary};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::simulation::{SimulationBuilder, check_dimensionality, check_periodic_symmetry};

/// How macro-particles are laid out in each cell at t = 0
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PositionInit {
    #[default]
    Regular,
    Random,
    Centered,
}

/// Initial momentum distribution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MomentumInit {
    #[default]
    Cold,
    MaxwellJuettner,
    Rectangular,
}

/// Species density, given either as a number or a charge density
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Density {
    Number(f64),
    Charge(f64),
}

impl Density {
    /// Number density for a species of the given charge; None for a neutral
    /// species described by charge density
    pub fn number_density(&self, charge: f64) -> Option<f64> {
        match *self {
            Self::Number(n) => Some(n),
            Self::Charge(_) if charge == 0.0 => None,
            Self::Charge(rho) => Some((rho / charge).abs()),
        }
    }
}

/// Species block as written in a deck
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesParams {
    pub name: String,
    pub mass: f64,
    #[serde(default)]
    pub charge: f64,
    /// Set for species that can be ionized
    #[serde(default)]
    pub atomic_number: Option<u32>,
    #[serde(default)]
    pub number_density: Option<f64>,
    #[serde(default)]
    pub charge_density: Option<f64>,
    #[serde(default)]
    pub position_initialization: PositionInit,
    #[serde(default)]
    pub momentum_initialization: MomentumInit,
    /// Temperature per momentum component (normalized to m_e c^2)
    #[serde(default)]
    pub temperature: [f64; 3],
    /// Drift velocity (fraction of c)
    #[serde(default)]
    pub mean_velocity: [f64; 3],
    #[serde(default = "default_particles_per_cell")]
    pub particles_per_cell: u32,
    #[serde(default = "default_c_part_max")]
    pub c_part_max: f64,
    /// The species does not move before this time
    #[serde(default)]
    pub time_frozen: f64,
    /// Empty means inherited from the field boundaries at finalize
    #[serde(default)]
    pub boundary_conditions: Vec<BoundaryPair<ParticleBoundary>>,
}

fn default_particles_per_cell() -> u32 {
    DEFAULT_PARTICLES_PER_CELL
}

fn default_c_part_max() -> f64 {
    DEFAULT_C_PART_MAX
}

impl SpeciesParams {
    /// Cold species at rest with the given number density
    pub fn new(name: impl Into<String>, mass: f64, charge: f64, number_density: f64) -> Self {
        Self {
            name: name.into(),
            mass,
            charge,
            atomic_number: None,
            number_density: Some(number_density),
            charge_density: None,
            position_initialization: PositionInit::default(),
            momentum_initialization: MomentumInit::default(),
            temperature: [0.0; 3],
            mean_velocity: [0.0; 3],
            particles_per_cell: DEFAULT_PARTICLES_PER_CELL,
            c_part_max: DEFAULT_C_PART_MAX,
            time_frozen: 0.0,
            boundary_conditions: Vec::new(),
        }
    }
}

/// A registered species
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesConfig {
    pub name: String,
    pub mass: f64,
    pub charge: f64,
    pub atomic_number: Option<u32>,
    pub density: Density,
    pub position_initialization: PositionInit,
    pub momentum_initialization: MomentumInit,
    pub temperature: [f64; 3],
    pub mean_velocity: [f64; 3],
    pub particles_per_cell: u32,
    pub c_part_max: f64,
    pub time_frozen: f64,
    pub boundary_conditions: Vec<BoundaryPair<ParticleBoundary>>,
}

impl SpeciesConfig {
    pub fn drift_speed(&self) -> f64 {
        speed(&self.mean_velocity)
    }

    pub fn is_ionizable(&self) -> bool {
        self.atomic_number.is_some()
    }
}

fn speed(v: &[f64; 3]) -> f64 {
    v.iter().map(|c| c * c).sum::<f64>().sqrt()
}

impl SimulationBuilder {
    /// Validate and register a species. The builder is untouched on error.
    pub fn define_species(&mut self, params: SpeciesParams) -> Result<&SpeciesConfig> {
        let species = self.check_species(params)?;
        let name = species.name.clone();
        let entry = self.species.entry(name).or_insert(species);
        Ok(entry)
    }

    fn check_species(&self, params: SpeciesParams) -> Result<SpeciesConfig> {
        let name = params.name;
        if name.trim().is_empty() {
            return Err(ConfigError::invalid("species name", "\"\"", "a non-empty name"));
        }
        if self.species.contains_key(&name) {
            return Err(ConfigError::DuplicateSpeciesName(name));
        }

        let density = match (params.number_density, params.charge_density) {
            (Some(_), Some(_)) => return Err(ConfigError::AmbiguousDensity(name)),
            (None, None) => return Err(ConfigError::MissingDensity(name)),
            (Some(n), None) => Density::Number(n),
            (None, Some(rho)) => Density::Charge(rho),
        };
        let magnitude = match density {
            Density::Number(v) => v,
            Density::Charge(v) => v.abs(),
        };
        if !(magnitude >= 0.0 && magnitude.is_finite()) {
            return Err(ConfigError::invalid("density", magnitude, "a finite value >= 0"));
        }
        if matches!(density, Density::Charge(_)) && params.charge == 0.0 {
            return Err(ConfigError::invalid(
                "charge_density",
                format!("{magnitude} on neutral species '{name}'"),
                "number_density for neutral species",
            ));
        }

        let drift = speed(&params.mean_velocity);
        if !(drift < 1.0) {
            return Err(ConfigError::SuperluminalVelocity {
                species: name,
                speed: drift,
            });
        }

        if !(params.mass > 0.0 && params.mass.is_finite()) {
            return Err(ConfigError::invalid("mass", params.mass, "> 0"));
        }
        if let Some(z) = params.atomic_number {
            if params.charge.abs() > z as f64 {
                return Err(ConfigError::invalid(
                    "charge",
                    params.charge,
                    "a charge state no larger than the atomic number",
                ));
            }
        }
        if let Some(t) = params.temperature.iter().find(|t| !(**t >= 0.0)) {
            return Err(ConfigError::invalid("temperature", t, ">= 0"));
        }
        if !(params.c_part_max >= 1.0) {
            return Err(ConfigError::invalid("c_part_max", params.c_part_max, ">= 1"));
        }
        if !(params.time_frozen >= 0.0) {
            return Err(ConfigError::invalid("time_frozen", params.time_frozen, ">= 0"));
        }

        if !params.boundary_conditions.is_empty() {
            let geometry = self.params.geometry;
            let what = format!("boundary_conditions of '{name}'");
            check_dimensionality(&what, geometry, params.boundary_conditions.len())?;
            check_periodic_symmetry(&what, geometry.axis_names(), &params.boundary_conditions)?;
        }

        Ok(SpeciesConfig {
            name,
            mass: params.mass,
            charge: params.charge,
            atomic_number: params.atomic_number,
            density,
            position_initialization: params.position_initialization,
            momentum_initialization: params.momentum_initialization,
            temperature: params.temperature,
            mean_velocity: params.mean_velocity,
            particles_per_cell: params.particles_per_cell,
            c_part_max: params.c_part_max,
            time_frozen: params.time_frozen,
            boundary_conditions: params.boundary_conditions,
        })
    }
}
