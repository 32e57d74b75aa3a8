use indexmap::IndexMap;
use picdeck_core::{
    BoundaryPair, DEFAULT_INTERPOLATION_ORDER, DEFAULT_PRINT_EVERY, FieldBoundary, Geometry,
    INTERPOLATION_ORDERS,
};
use serde::{Deserialize, Serialize};

use crate::diagnostic::DiagnosticConfig;
use crate::error::{ConfigError, ConfigWarning, Result};
use crate::interaction::InteractionConfig;
use crate::species::SpeciesConfig;

/// Cell size and box length along one axis (normalized units)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisGrid {
    pub cell_length: f64,
    pub grid_length: f64,
}

impl AxisGrid {
    pub fn new(cell_length: f64, grid_length: f64) -> Self {
        Self {
            cell_length,
            grid_length,
        }
    }
}

/// Top-level engine parameters, as written in a deck
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    pub geometry: Geometry,
    /// One entry per grid dimension
    pub grid: Vec<AxisGrid>,
    pub timestep: f64,
    pub simulation_time: f64,
    #[serde(rename = "EM_boundary_conditions")]
    pub field_boundary_conditions: Vec<BoundaryPair<FieldBoundary>>,
    /// None = nondeterministic
    #[serde(default)]
    pub random_seed: Option<u64>,
    #[serde(default = "default_interpolation_order")]
    pub interpolation_order: u32,
    /// Patch decomposition per axis (powers of two)
    #[serde(default)]
    pub number_of_patches: Option<Vec<u32>>,
    /// Azimuthal modes, required for AMcylindrical
    #[serde(default, rename = "number_of_AM")]
    pub number_of_am: Option<u32>,
    #[serde(default)]
    pub time_fields_frozen: f64,
    #[serde(default = "default_print_every")]
    pub print_every: u64,
    /// Laser wavelength in meters; derives the reference frequency
    #[serde(default, rename = "reference_wavelength_SI")]
    pub reference_wavelength_si: Option<f64>,
    #[serde(default, rename = "reference_angular_frequency_SI")]
    pub reference_angular_frequency_si: Option<f64>,
}

fn default_interpolation_order() -> u32 {
    DEFAULT_INTERPOLATION_ORDER
}

fn default_print_every() -> u64 {
    DEFAULT_PRINT_EVERY
}

impl SimulationParams {
    /// Parameters with periodic fields on every axis and engine defaults elsewhere
    pub fn new(geometry: Geometry, grid: Vec<AxisGrid>, timestep: f64, simulation_time: f64) -> Self {
        let field_boundary_conditions = vec![BoundaryPair::both(FieldBoundary::Periodic); grid.len()];
        Self {
            geometry,
            grid,
            timestep,
            simulation_time,
            field_boundary_conditions,
            random_seed: None,
            interpolation_order: DEFAULT_INTERPOLATION_ORDER,
            number_of_patches: None,
            number_of_am: None,
            time_fields_frozen: 0.0,
            print_every: DEFAULT_PRINT_EVERY,
            reference_wavelength_si: None,
            reference_angular_frequency_si: None,
        }
    }

    fn validate(&self) -> Result<()> {
        let geometry = self.geometry;
        let axes = geometry.axis_names();

        check_dimensionality("grid", geometry, self.grid.len())?;
        check_dimensionality(
            "EM_boundary_conditions",
            geometry,
            self.field_boundary_conditions.len(),
        )?;
        if let Some(patches) = &self.number_of_patches {
            check_dimensionality("number_of_patches", geometry, patches.len())?;
        }

        let bounded = self.simulation_time.is_finite()
            && self.timestep > 0.0
            && self.timestep <= self.simulation_time;
        if !bounded {
            return Err(ConfigError::InvalidTimestep {
                timestep: self.timestep,
                simulation_time: self.simulation_time,
            });
        }

        for (axis, grid) in axes.iter().zip(&self.grid) {
            let valid = grid.cell_length > 0.0
                && grid.grid_length.is_finite()
                && grid.grid_length >= grid.cell_length;
            if !valid {
                return Err(ConfigError::InvalidGrid {
                    axis: axis.to_string(),
                    cell_length: grid.cell_length,
                    grid_length: grid.grid_length,
                });
            }
        }

        check_periodic_symmetry("EM_boundary_conditions", axes, &self.field_boundary_conditions)?;

        if !INTERPOLATION_ORDERS.contains(&self.interpolation_order) {
            return Err(ConfigError::invalid(
                "interpolation_order",
                self.interpolation_order,
                "2 or 4",
            ));
        }
        if let Some(patches) = &self.number_of_patches {
            if let Some(bad) = patches.iter().find(|p| !p.is_power_of_two()) {
                return Err(ConfigError::invalid("number_of_patches", bad, "a power of two"));
            }
        }
        if geometry == Geometry::AzimuthalModes {
            match self.number_of_am {
                None => {
                    return Err(ConfigError::MissingParameter {
                        name: "number_of_AM".into(),
                        reason: "required by AMcylindrical".into(),
                    });
                }
                Some(0) => return Err(ConfigError::invalid("number_of_AM", 0, "at least 1")),
                Some(_) => {}
            }
        }
        if !(self.time_fields_frozen >= 0.0) {
            return Err(ConfigError::invalid(
                "time_fields_frozen",
                self.time_fields_frozen,
                ">= 0",
            ));
        }
        if self.print_every == 0 {
            return Err(ConfigError::invalid("print_every", 0, "> 0"));
        }
        check_positive("reference_wavelength_SI", self.reference_wavelength_si)?;
        check_positive(
            "reference_angular_frequency_SI",
            self.reference_angular_frequency_si,
        )?;

        Ok(())
    }
}

pub(crate) fn check_dimensionality(what: &str, geometry: Geometry, found: usize) -> Result<()> {
    let expected = geometry.dimensions();
    if found != expected {
        return Err(ConfigError::InvalidDimensionality {
            what: what.to_string(),
            geometry,
            expected,
            found,
        });
    }
    Ok(())
}

pub(crate) fn check_periodic_symmetry<T: picdeck_core::BoundaryTag>(
    what: &str,
    axes: &[&str],
    pairs: &[BoundaryPair<T>],
) -> Result<()> {
    for (axis, pair) in axes.iter().zip(pairs) {
        if !pair.is_consistent() {
            return Err(ConfigError::AsymmetricPeriodic {
                what: what.to_string(),
                axis: axis.to_string(),
            });
        }
    }
    Ok(())
}

fn check_positive(name: &str, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) if !(v > 0.0 && v.is_finite()) => Err(ConfigError::invalid(name, v, "> 0")),
        _ => Ok(()),
    }
}

/// A deck under construction. Owns every registered block; species are
/// looked up by name, in declaration order.
#[derive(Debug, Clone)]
pub struct SimulationBuilder {
    pub(crate) params: SimulationParams,
    pub(crate) species: IndexMap<String, SpeciesConfig>,
    pub(crate) interactions: Vec<InteractionConfig>,
    pub(crate) diagnostics: Vec<DiagnosticConfig>,
    pub(crate) warnings: Vec<ConfigWarning>,
}

/// Start a deck from validated top-level parameters
pub fn define_simulation(params: SimulationParams) -> Result<SimulationBuilder> {
    SimulationBuilder::new(params)
}

impl SimulationBuilder {
    pub fn new(params: SimulationParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            species: IndexMap::new(),
            interactions: Vec::new(),
            diagnostics: Vec::new(),
            warnings: Vec::new(),
        })
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn geometry(&self) -> Geometry {
        self.params.geometry
    }

    pub fn species(&self, name: &str) -> Option<&SpeciesConfig> {
        self.species.get(name)
    }

    pub fn species_count(&self) -> usize {
        self.species.len()
    }

    pub fn interactions(&self) -> &[InteractionConfig] {
        &self.interactions
    }

    pub fn diagnostics(&self) -> &[DiagnosticConfig] {
        &self.diagnostics
    }

    pub fn warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }
}
