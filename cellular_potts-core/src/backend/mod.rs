//! The backend controls how the simulation is set up and executed.

/// Single-threaded backend for on-lattice (cellular Potts) populations.
pub mod lattice;
