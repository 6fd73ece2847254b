use crate::cell::ApoptosisInfo;
use crate::errors::DeathError;

/// Snapshot of a single live cell as presented to [Killer] predicates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellState<const D: usize> {
    /// Centroid of the cell's element.
    pub centroid: [f64; D],
    /// Age of the cell since birth.
    pub age: f64,
    /// Current simulation time.
    pub time: f64,
    /// Whether the cell carries a label.
    pub labelled: bool,
    /// Apoptosis state, if the cell has entered apoptosis.
    pub apoptosis: Option<ApoptosisInfo>,
}

/// A pluggable predicate marking cells for removal.
///
/// All killers are evaluated once per step against every live cell; a cell for which any
/// killer returns `true` is removed at the end of the killer pass. Killers are queries
/// only; the lifecycle manager performs the actual removal (collect-then-remove).
pub trait Killer<const D: usize> {
    /// Decides whether the given cell should be removed this step.
    fn should_kill(&self, cell: &CellState<D>) -> Result<bool, DeathError>;
}
