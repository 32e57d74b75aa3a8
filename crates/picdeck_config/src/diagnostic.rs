use picdeck_core::{DiagnosticKind, OutputKey, ParticleFilter, ParticleQuantity};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::simulation::SimulationBuilder;

/// What a particle-binning diagnostic accumulates into its bins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositedQuantity {
    Weight,
    WeightCharge,
    WeightChargeVx,
    WeightChargeVy,
    WeightChargeVz,
    WeightPx,
    WeightPy,
    WeightPz,
    WeightEkin,
}

/// One histogram axis: `bins` bins spanning [min, max)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinningAxis {
    pub quantity: ParticleQuantity,
    pub min: f64,
    pub max: f64,
    pub bins: u32,
    /// Particles outside the range are counted in the edge bins
    #[serde(default)]
    pub edge_inclusive: bool,
    #[serde(default)]
    pub logscale: bool,
}

impl BinningAxis {
    pub fn new(quantity: ParticleQuantity, min: f64, max: f64, bins: u32) -> Self {
        Self {
            quantity,
            min,
            max,
            bins,
            edge_inclusive: false,
            logscale: false,
        }
    }
}

/// Kind-specific diagnostic settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DiagnosticSpec {
    /// Grid snapshots; empty list means every field
    Fields {
        #[serde(default)]
        fields: Vec<String>,
    },
    /// Volume-integrated scalars; empty list means every scalar
    Scalar {
        #[serde(default)]
        vars: Vec<String>,
    },
    ParticleBinning {
        deposited_quantity: DepositedQuantity,
        species: Vec<String>,
        axes: Vec<BinningAxis>,
    },
    TrackParticles {
        species: String,
        #[serde(default)]
        filter: Option<ParticleFilter>,
    },
}

impl DiagnosticSpec {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Self::Fields { .. } => DiagnosticKind::Fields,
            Self::Scalar { .. } => DiagnosticKind::Scalar,
            Self::ParticleBinning { .. } => DiagnosticKind::ParticleBinning,
            Self::TrackParticles { .. } => DiagnosticKind::TrackParticles,
        }
    }

    /// Species names this diagnostic reads from
    pub fn species(&self) -> Vec<&str> {
        match self {
            Self::ParticleBinning { species, .. } => species.iter().map(String::as_str).collect(),
            Self::TrackParticles { species, .. } => vec![species.as_str()],
            Self::Fields { .. } | Self::Scalar { .. } => Vec::new(),
        }
    }
}

/// Diagnostic block as written in a deck
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticParams {
    /// Output period in timesteps
    pub every: u64,
    /// Output index within its kind; declaration order when absent
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(flatten)]
    pub spec: DiagnosticSpec,
}

impl DiagnosticParams {
    pub fn new(every: u64, spec: DiagnosticSpec) -> Self {
        Self {
            every,
            index: None,
            spec,
        }
    }
}

/// A registered diagnostic and the series key it writes to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticConfig {
    pub key: OutputKey,
    pub every: u64,
    pub spec: DiagnosticSpec,
}

impl SimulationBuilder {
    /// Validate and register a diagnostic. Species references are resolved at finalize.
    pub fn define_diagnostic(&mut self, params: DiagnosticParams) -> Result<&DiagnosticConfig> {
        if params.every == 0 {
            return Err(ConfigError::InvalidCadence(0));
        }

        match &params.spec {
            DiagnosticSpec::ParticleBinning { species, axes, .. } => {
                if species.is_empty() {
                    return Err(ConfigError::EmptySpeciesGroup("binning species".into()));
                }
                if axes.is_empty() {
                    return Err(ConfigError::invalid("axes", "[]", "at least one binning axis"));
                }
                for axis in axes {
                    self.check_axis(axis)?;
                }
            }
            DiagnosticSpec::TrackParticles { species, .. } => {
                if species.trim().is_empty() {
                    return Err(ConfigError::EmptySpeciesGroup("tracked species".into()));
                }
            }
            DiagnosticSpec::Fields { fields } => {
                if fields.iter().any(|f| f.trim().is_empty()) {
                    return Err(ConfigError::invalid("fields", "\"\"", "non-empty field names"));
                }
            }
            DiagnosticSpec::Scalar { vars } => {
                if vars.iter().any(|v| v.trim().is_empty()) {
                    return Err(ConfigError::invalid("vars", "\"\"", "non-empty scalar names"));
                }
            }
        }

        let kind = params.spec.kind();
        let index = params.index.unwrap_or_else(|| {
            self.diagnostics.iter().filter(|d| d.key.kind == kind).count() as u32
        });

        self.diagnostics.push(DiagnosticConfig {
            key: OutputKey { kind, index },
            every: params.every,
            spec: params.spec,
        });
        Ok(&self.diagnostics[self.diagnostics.len() - 1])
    }

    fn check_axis(&self, axis: &BinningAxis) -> Result<()> {
        let geometry = self.params.geometry;
        if axis.quantity.is_spatial() && !geometry.has_particle_coordinate(axis.quantity) {
            return Err(ConfigError::AxisNotInGeometry {
                quantity: axis.quantity,
                geometry,
            });
        }
        if !(axis.min < axis.max) {
            return Err(ConfigError::AxisOutOfRange {
                quantity: axis.quantity,
                min: axis.min,
                max: axis.max,
            });
        }
        if axis.bins == 0 {
            return Err(ConfigError::invalid("bins", 0, "> 0"));
        }
        if axis.logscale && !(axis.min > 0.0) {
            return Err(ConfigError::invalid("min", axis.min, "> 0 on a logscale axis"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{AxisGrid, SimulationParams, define_simulation};
    use picdeck_core::Geometry;

    fn builder() -> SimulationBuilder {
        define_simulation(SimulationParams::new(
            Geometry::Cartesian1D,
            vec![AxisGrid::new(6.28, 251.2)],
            1.57,
            31400.0,
        ))
        .unwrap()
    }

    fn binning(axis: BinningAxis) -> DiagnosticParams {
        DiagnosticParams::new(
            100,
            DiagnosticSpec::ParticleBinning {
                deposited_quantity: DepositedQuantity::WeightPx,
                species: vec!["electron1".into()],
                axes: vec![axis],
            },
        )
    }

    #[test]
    fn indexes_follow_declaration_order_per_kind() {
        let mut b = builder();
        let x_axis = BinningAxis::new(ParticleQuantity::X, 0.0, 251.2, 1);
        b.define_diagnostic(DiagnosticParams::new(1_000_000, DiagnosticSpec::Fields { fields: vec![] }))
            .unwrap();
        b.define_diagnostic(binning(x_axis)).unwrap();
        let second = b.define_diagnostic(binning(x_axis)).unwrap();
        assert_eq!(
            second.key,
            OutputKey {
                kind: DiagnosticKind::ParticleBinning,
                index: 1
            }
        );
        assert_eq!(b.diagnostics()[0].key.index, 0);
    }

    #[test]
    fn zero_cadence_rejected() {
        let mut b = builder();
        let params = DiagnosticParams::new(0, DiagnosticSpec::Scalar { vars: vec![] });
        assert_eq!(
            b.define_diagnostic(params).unwrap_err(),
            ConfigError::InvalidCadence(0)
        );
    }

    #[test]
    fn inverted_axis_rejected() {
        let mut b = builder();
        for (min, max) in [(1.0, 1.0), (2.0, 1.0), (f64::NAN, 1.0)] {
            let axis = BinningAxis::new(ParticleQuantity::Px, min, max, 10);
            assert!(matches!(
                b.define_diagnostic(binning(axis)),
                Err(ConfigError::AxisOutOfRange { .. })
            ));
        }
        assert!(b.diagnostics().is_empty());
    }

    #[test]
    fn spatial_axis_must_exist() {
        let mut b = builder();
        let axis = BinningAxis::new(ParticleQuantity::Y, 0.0, 1.0, 10);
        assert!(matches!(
            b.define_diagnostic(binning(axis)),
            Err(ConfigError::AxisNotInGeometry { .. })
        ));
    }

    #[test]
    fn deck_syntax_parses() {
        let json = r#"{
            "every": 100,
            "kind": "particle-binning",
            "deposited_quantity": "weight_px",
            "species": ["electron1"],
            "axes": [{"quantity": "x", "min": 0.0, "max": 251.2, "bins": 1}]
        }"#;
        let params: DiagnosticParams = serde_json::from_str(json).unwrap();
        assert_eq!(params.spec.kind(), DiagnosticKind::ParticleBinning);
        assert_eq!(params.spec.species(), ["electron1"]);

        let json = r#"{"every": 10, "kind": "track-particles", "species": "ion", "filter": "x < 0.02"}"#;
        let params: DiagnosticParams = serde_json::from_str(json).unwrap();
        assert!(matches!(
            params.spec,
            DiagnosticSpec::TrackParticles { filter: Some(_), .. }
        ));
    }
}
