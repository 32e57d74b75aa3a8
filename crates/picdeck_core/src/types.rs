use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Simulation geometry understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Geometry {
    #[serde(rename = "1Dcartesian")]
    Cartesian1D,
    #[serde(rename = "2Dcartesian")]
    Cartesian2D,
    #[serde(rename = "3Dcartesian")]
    Cartesian3D,
    /// Azimuthal-mode decomposition on an (x, r) grid
    #[serde(rename = "AMcylindrical")]
    AzimuthalModes,
}

impl Geometry {
    /// Number of grid dimensions
    pub fn dimensions(&self) -> usize {
        match self {
            Self::Cartesian1D => 1,
            Self::Cartesian2D | Self::AzimuthalModes => 2,
            Self::Cartesian3D => 3,
        }
    }

    /// Grid axis names, in order
    pub fn axis_names(&self) -> &'static [&'static str] {
        match self {
            Self::Cartesian1D => &["x"],
            Self::Cartesian2D => &["x", "y"],
            Self::Cartesian3D => &["x", "y", "z"],
            Self::AzimuthalModes => &["x", "r"],
        }
    }

    /// Whether particles carry a coordinate along this spatial quantity
    pub fn has_particle_coordinate(&self, quantity: ParticleQuantity) -> bool {
        match quantity {
            ParticleQuantity::X => true,
            ParticleQuantity::Y => !matches!(self, Self::Cartesian1D),
            ParticleQuantity::Z => matches!(self, Self::Cartesian3D | Self::AzimuthalModes),
            _ => true,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Cartesian1D => "1Dcartesian",
            Self::Cartesian2D => "2Dcartesian",
            Self::Cartesian3D => "3Dcartesian",
            Self::AzimuthalModes => "AMcylindrical",
        }
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Boundary tags that know whether they wrap around
pub trait BoundaryTag: Copy + PartialEq + fmt::Debug {
    fn is_periodic(&self) -> bool;
}

/// Electromagnetic boundary condition at one end of an axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldBoundary {
    Periodic,
    SilverMuller,
    Reflective,
}

impl BoundaryTag for FieldBoundary {
    fn is_periodic(&self) -> bool {
        matches!(self, Self::Periodic)
    }
}

/// Particle boundary condition at one end of an axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParticleBoundary {
    Periodic,
    Reflective,
    Remove,
    Thermalize,
}

impl BoundaryTag for ParticleBoundary {
    fn is_periodic(&self) -> bool {
        matches!(self, Self::Periodic)
    }
}

/// Boundary conditions at the (min, max) ends of one axis.
/// Decks may give a single tag, which applies to both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<T>", into = "Vec<T>")]
#[serde(bound(
    serialize = "T: Serialize + Copy",
    deserialize = "T: Deserialize<'de> + Copy"
))]
pub struct BoundaryPair<T> {
    pub min: T,
    pub max: T,
}

impl<T: BoundaryTag> BoundaryPair<T> {
    pub fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    pub fn both(tag: T) -> Self {
        Self { min: tag, max: tag }
    }

    /// Periodic on one end only is meaningless
    pub fn is_consistent(&self) -> bool {
        self.min.is_periodic() == self.max.is_periodic()
    }

    pub fn is_periodic(&self) -> bool {
        self.min.is_periodic() && self.max.is_periodic()
    }
}

impl<T: Copy> TryFrom<Vec<T>> for BoundaryPair<T> {
    type Error = String;

    fn try_from(tags: Vec<T>) -> Result<Self, Self::Error> {
        match tags.as_slice() {
            [tag] => Ok(Self { min: *tag, max: *tag }),
            [min, max] => Ok(Self { min: *min, max: *max }),
            other => Err(format!(
                "boundary conditions take one or two tags per axis, got {}",
                other.len()
            )),
        }
    }
}

impl<T> From<BoundaryPair<T>> for Vec<T> {
    fn from(pair: BoundaryPair<T>) -> Self {
        vec![pair.min, pair.max]
    }
}

/// Per-particle quantities used by binning axes and filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticleQuantity {
    X,
    Y,
    Z,
    Px,
    Py,
    Pz,
    /// Statistical weight
    W,
    Charge,
    Gamma,
    Ekin,
}

impl ParticleQuantity {
    pub const ALL: [ParticleQuantity; 10] = [
        Self::X,
        Self::Y,
        Self::Z,
        Self::Px,
        Self::Py,
        Self::Pz,
        Self::W,
        Self::Charge,
        Self::Gamma,
        Self::Ekin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
            Self::Px => "px",
            Self::Py => "py",
            Self::Pz => "pz",
            Self::W => "w",
            Self::Charge => "charge",
            Self::Gamma => "gamma",
            Self::Ekin => "ekin",
        }
    }

    pub fn is_spatial(&self) -> bool {
        matches!(self, Self::X | Self::Y | Self::Z)
    }
}

impl fmt::Display for ParticleQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParticleQuantity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| format!("unknown particle quantity '{s}'"))
    }
}

/// Diagnostic families; each declared diagnostic writes one output series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    Fields,
    Scalar,
    ParticleBinning,
    TrackParticles,
}

impl DiagnosticKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fields => "fields",
            Self::Scalar => "scalar",
            Self::ParticleBinning => "particle-binning",
            Self::TrackParticles => "track-particles",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a diagnostic's series lands in the result store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutputKey {
    pub kind: DiagnosticKind,
    pub index: u32,
}

impl fmt::Display for OutputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.index)
    }
}

/// Whether a deviation threshold is absolute or scaled by the reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToleranceKind {
    Absolute,
    Relative,
}

/// Largest accepted deviation between a value and its baseline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub value: f64,
    pub kind: ToleranceKind,
}

impl Tolerance {
    pub fn absolute(value: f64) -> Self {
        Self {
            value,
            kind: ToleranceKind::Absolute,
        }
    }

    pub fn relative(value: f64) -> Self {
        Self {
            value,
            kind: ToleranceKind::Relative,
        }
    }

    /// Bit-for-bit agreement
    pub fn exact() -> Self {
        Self::absolute(0.0)
    }
}

impl fmt::Display for Tolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ToleranceKind::Absolute => write!(f, "abs {:e}", self.value),
            ToleranceKind::Relative => write!(f, "rel {:e}", self.value),
        }
    }
}
