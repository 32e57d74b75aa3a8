pub mod constants;
pub mod filter;
pub mod types;

pub use constants::*;
pub use filter::{Comparison, FilterParseError, ParticleFilter, Predicate};
pub use types::*;
