#![deny(missing_docs)]
//! This crate collects objects and methods needed to run a numerical simulation of
//! on-lattice cell populations that satisfy the given
//! [concepts](cellular_potts_concepts).
//!
//! ## Backends
//! The [backend::lattice] backend drives a cellular Potts population: a Metropolis
//! update engine over pluggable Hamiltonian terms, a modifier pipeline and a cell
//! lifecycle manager, sequenced by [backend::lattice::OnLatticeSimulation].
//!
//! ## Storage
//! We distinguish between sampled snapshots suitable for data readout and full
//! checkpoints from which the simulation can be recovered. Both are written through the
//! [storage] module; checkpoints additionally contain the random-generator stream
//! position so that a reloaded run reproduces the identical trajectory.

pub mod backend;

pub mod storage;

pub mod time;
