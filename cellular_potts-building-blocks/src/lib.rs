#![deny(missing_docs)]
//! # cellular_potts - Building Blocks
//!
//! Building blocks are the concrete pluggable pieces which the lattice backend of
//! `cellular_potts-core` composes into a full simulation: energy-contribution
//! [update_rules] of the Potts Hamiltonian, cell-cycle models in [cycles], removal
//! predicates in [killers], pipeline stages in [modifiers] and default mesh/solver
//! collaborators for field equations in [meshes].

/// Cell-cycle models governing division readiness.
pub mod cycles;
/// Predicates marking cells for removal.
pub mod killers;
/// Default auxiliary mesh and field-solver collaborators.
pub mod meshes;
/// Growth-law and field-coupling pipeline stages.
pub mod modifiers;
/// Re-exports of all building blocks.
pub mod prelude;
/// Energy-contribution terms of the Potts Hamiltonian.
pub mod update_rules;
