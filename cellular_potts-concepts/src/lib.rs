#![deny(missing_docs)]
//! This crate encapsulates the concepts which govern an on-lattice (cellular Potts)
//! population model as driven by [cellular_potts](https://docs.rs/cellular_potts).
//! The traits defined here are implemented by the engine in `cellular_potts-core` and by
//! the concrete rules, cycle models, killers and modifiers in
//! `cellular_potts-building-blocks`.

mod cell;
mod cycle;
mod errors;
mod field;
mod killer;
mod modifier;
mod potts;

pub use cell::*;
pub use cycle::*;
pub use errors::*;
pub use field::*;
pub use killer::*;
pub use modifier::*;
pub use potts::*;
