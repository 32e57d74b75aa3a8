// Normalized units follow the engine's conventions:
// - Length: 1 unit = c / omega_r (so one laser wavelength is 2*pi)
// - Time: 1 unit = 1 / omega_r
// - Velocity: fraction of the speed of light
// - Density: critical density at omega_r

/// Wavelength in normalized length units
pub const L0: f64 = 2.0 * std::f64::consts::PI;

/// Speed of light in m/s, used for SI reference quantities
pub const SPEED_OF_LIGHT_SI: f64 = 299_792_458.0;

/// Coulomb logarithms below this are accepted but flagged (test-only decks use ~1e-8)
pub const NEAR_ZERO_COUPLING: f64 = 1e-3;

/// Allowed shape-function orders for field interpolation
pub const INTERPOLATION_ORDERS: [u32; 2] = [2, 4];

pub const DEFAULT_INTERPOLATION_ORDER: u32 = 2;

pub const DEFAULT_PRINT_EVERY: u64 = 100;

pub const DEFAULT_PARTICLES_PER_CELL: u32 = 1;

pub const DEFAULT_C_PART_MAX: f64 = 1.0;

/// Floor on the reference magnitude for relative deviations
pub const RELATIVE_EPSILON: f64 = f64::EPSILON;

/// File the engine writes inside a result store directory
pub const RESULT_ARCHIVE_FILE: &str = "results.bin";

/// Case file looked up inside the result store when none is given
pub const DEFAULT_CASE_FILE: &str = "cases.json";

/// Directory holding baseline files, relative to the working directory
pub const DEFAULT_BASELINE_DIR: &str = "references";

/// Result archive on-disk format version (bump on breaking changes)
pub const ARCHIVE_FORMAT_VERSION: u32 = 1;

/// Baseline file on-disk format version
pub const BASELINE_FORMAT_VERSION: u32 = 1;
