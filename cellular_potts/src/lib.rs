#![deny(missing_docs)]
//! [cellular_potts](crate) simulates populations of biological cells on a fixed lattice
//! with the cellular Potts formalism: cells occupy connected collections of lattice
//! sites and their shapes evolve through Metropolis-sampled reassignments of single
//! sites, driven by a Hamiltonian assembled from pluggable energy terms.
//!
//! The workspace separates the abstract [concepts] (traits for update rules, cycle
//! models, killers, modifiers and field collaborators), the [core] backend (lattice,
//! Metropolis engine, lifecycle manager, orchestrator, storage) and ready-made
//! [building_blocks] implementing the common rules, cycles and modifiers.

pub use cellular_potts_building_blocks as building_blocks;

pub use cellular_potts_concepts as concepts;

pub use cellular_potts_core as core;

/// Re-exports the default simulation types and traits.
pub mod prelude;
