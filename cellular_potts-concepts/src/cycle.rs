use crate::errors::{DeathError, DivisionError};

use serde::{Deserialize, Serialize};

/// Contains all events which can arise during the cell cycle and need to be communicated to
/// the simulation engine (see also [Cycle]).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum CycleEvent {
    /// A cell-event which calls the [Cycle::divide] method which will spawn an additional
    /// cell and modify the existing one.
    Division,
    /// Immediately removes the cell from the simulation. No function will be called.
    Remove,
    /// The cell enters a dying mode.
    /// Its target geometry shrinks while [Cycle::update_conditional_phased_death] is
    /// called until the death phase is completed, after which [CycleEvent::Remove] is
    /// carried out.
    PhasedDeath,
}

/// This trait represents all cycles of a cell and works in tandem with the [CycleEvent] enum.
///
/// The `update_cycle` function is designed to be called once per simulation step and
/// return only something if a specific cycle event is supposed to be occurring. The
/// lifecycle manager calls the corresponding functions as needed.
pub trait Cycle<Cell, Float = f64> {
    /// Continuously updates cellular properties and may spawn a [CycleEvent] which then
    /// calls the corresponding functions (see also [CycleEvent]).
    #[must_use]
    fn update_cycle(
        rng: &mut rand_chacha::ChaCha8Rng,
        dt: &Float,
        cell: &mut Cell,
    ) -> Option<CycleEvent>;

    /// Performs division of the cell by modifying the existing one and spawning an
    /// additional cell. Implementations are responsible for resetting cell-cycle ages and
    /// duplicating cell-specific values such as the data store. Identifiers and birth
    /// times of the returned daughter are overwritten by the lifecycle manager.
    /// Corresponds to [CycleEvent::Division].
    #[must_use]
    fn divide(rng: &mut rand_chacha::ChaCha8Rng, cell: &mut Cell) -> Result<Cell, DivisionError>;

    /// Method corresponding to the [CycleEvent::PhasedDeath] event.
    /// Update the cell while returning a boolean which indicates if the dying procedure
    /// has finished. As soon as the return value is `true` the cell is removed.
    #[allow(unused)]
    #[must_use]
    fn update_conditional_phased_death(
        rng: &mut rand_chacha::ChaCha8Rng,
        dt: &Float,
        cell: &mut Cell,
    ) -> Result<bool, DeathError> {
        Ok(true)
    }
}

/// Read access to the phase structure of a cell-cycle model.
///
/// Growth-law modifiers consume these durations together with the cell age to compute
/// target geometries. Models without a meaningful phase decomposition may report their
/// total duration as G1 and zero for the remaining phases.
pub trait CyclePhases {
    /// Elapsed age of the cell since birth or the last division.
    fn age(&self) -> f64;
    /// Duration of the G1 phase.
    fn g1_duration(&self) -> f64;
    /// Duration of the S phase.
    fn s_duration(&self) -> f64;
    /// Duration of the G2 phase.
    fn g2_duration(&self) -> f64;
    /// Duration of the M phase.
    fn m_duration(&self) -> f64;

    /// Whether the model has signalled division readiness.
    ///
    /// Readiness is flagged one step before the division event fires so that growth-law
    /// modifiers (which run earlier in the same step) can pre-set the halved target
    /// geometry which the daughter inherits.
    fn ready_to_divide(&self) -> bool;
}

/// Summary of a cell's cycle state as exposed to modifiers.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct CycleInfo {
    /// Elapsed age since birth.
    pub age: f64,
    /// Duration of the G1 phase.
    pub g1_duration: f64,
    /// Duration of the S phase.
    pub s_duration: f64,
    /// Duration of the G2 phase.
    pub g2_duration: f64,
    /// Duration of the M phase.
    pub m_duration: f64,
    /// Whether the cell is about to divide.
    pub ready_to_divide: bool,
}

impl CycleInfo {
    /// Constructs the info struct from any model implementing [CyclePhases].
    pub fn from_phases<C: CyclePhases>(cycle: &C) -> Self {
        CycleInfo {
            age: cycle.age(),
            g1_duration: cycle.g1_duration(),
            s_duration: cycle.s_duration(),
            g2_duration: cycle.g2_duration(),
            m_duration: cycle.m_duration(),
            ready_to_divide: cycle.ready_to_divide(),
        }
    }
}
