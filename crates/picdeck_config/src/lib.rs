//! Typed, validated input decks for the external PIC engine.
//!
//! A deck is assembled through a [`SimulationBuilder`]: each `define_*`
//! call checks its own parameters and registers the block, and
//! [`SimulationBuilder::finalize`] cross-checks the whole graph, computes
//! derived defaults, and hands back an immutable [`SimulationConfig`].

pub mod deck;
pub mod diagnostic;
pub mod error;
pub mod finalize;
pub mod interaction;
pub mod simulation;
pub mod species;

pub use deck::{Deck, InteractionDeclaration};
pub use diagnostic::{BinningAxis, DepositedQuantity, DiagnosticConfig, DiagnosticParams, DiagnosticSpec};
pub use error::{ConfigError, ConfigWarning};
pub use finalize::{DerivedParams, DerivedSpecies, SimulationConfig};
pub use interaction::{InteractionConfig, InteractionParams};
pub use simulation::{AxisGrid, SimulationBuilder, SimulationParams, define_simulation};
pub use species::{Density, MomentumInit, PositionInit, SpeciesConfig, SpeciesParams};
