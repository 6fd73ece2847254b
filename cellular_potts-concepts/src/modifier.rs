use crate::cell::{ApoptosisInfo, CellData};
use crate::cycle::CycleInfo;
use crate::errors::{IndexError, ModifierError, SetupError};

/// Read/write access to the cell population as exposed to [SimulationModifier] hooks.
///
/// The orchestrator constructs one such view per modifier invocation, after the lattice
/// sweep of the step has completed, so that geometric queries never observe stale data.
/// Modifiers may mutate cell-data stores but never the lattice itself.
pub trait PopulationAccess<const D: usize> {
    /// Current simulation time.
    fn time(&self) -> f64;

    /// Ids of all elements currently occupied by a live cell, in ascending order.
    fn element_ids(&self) -> Vec<usize>;

    /// Centroid of the given element, averaged over its site coordinates.
    fn centroid(&self, element: usize) -> Result<[f64; D], IndexError>;

    /// Lower and upper corner of the axis-aligned bounding box of all owned sites.
    fn bounding_box(&self) -> ([f64; D], [f64; D]);

    /// Cycle-phase summary of the cell occupying the given element.
    fn cycle_info(&self, element: usize) -> Result<CycleInfo, IndexError>;

    /// Apoptosis state of the cell occupying the given element, if any.
    fn apoptosis(&self, element: usize) -> Result<Option<ApoptosisInfo>, IndexError>;

    /// Cell-data store of the cell occupying the given element.
    fn data(&self, element: usize) -> Result<&CellData, IndexError>;

    /// Mutable cell-data store of the cell occupying the given element.
    fn data_mut(&mut self, element: usize) -> Result<&mut CellData, IndexError>;
}

/// A pluggable pipeline stage invoked at setup and at the end of every time step.
///
/// Two families are provided as building blocks: growth-law modifiers which update
/// per-cell target geometry from cell-cycle state, and field-coupling modifiers which
/// solve an overlaid field equation and write the interpolated solution back into
/// per-cell data.
pub trait SimulationModifier<const D: usize> {
    /// Invoked exactly once before the first step.
    ///
    /// Must populate any cell data which later hooks (of this or downstream modifiers)
    /// read; skipping this would yield undefined cell-data reads in step 1.
    fn setup(&mut self, population: &mut dyn PopulationAccess<D>) -> Result<(), SetupError>;

    /// Invoked at the end of every step, after the lattice sweep changed population
    /// geometry and before the lifecycle passes.
    fn update_at_end_of_time_step(
        &mut self,
        population: &mut dyn PopulationAccess<D>,
    ) -> Result<(), ModifierError>;
}
