//! This backend drives a cellular Potts population on a regular lattice.
//!
//! One [OnLatticeSimulation] step performs the following sequence
//!
//! ```text
//! population update -> Metropolis sweeps -> modifier pipeline
//!     -> division pass -> killer pass -> sampling/checkpoint
//! ```
//!
//! The lattice substrate lives in [population], the stochastic update engine in
//! [engine] and the birth/death bookkeeping in [lifecycle]. All pieces are glued
//! together by [simulation::OnLatticeSimulation].

/// Configuration of the Metropolis engine and the time loop.
pub mod config;
/// Metropolis update engine over pluggable Hamiltonian terms.
pub mod engine;
/// Aggregated error type of this backend.
pub mod errors;
/// Cell directory with division and killer passes.
pub mod lifecycle;
/// Lattice substrate and element bookkeeping.
pub mod population;
/// Orchestrator state machine with sampling and checkpointing.
pub mod simulation;

pub use config::*;
pub use engine::*;
pub use errors::*;
pub use lifecycle::*;
pub use population::*;
pub use simulation::*;
