use crate::errors::{CalcError, DataNotFoundError, IndexError};

/// Read-only view of the lattice and the per-cell data which update rules may consult.
///
/// The engine constructs one view per sweep which bundles the population model and the
/// cell directory. All methods are queries; a rule must never be able to mutate the
/// population through this trait.
pub trait LatticeContext<const D: usize> {
    /// Spatial coordinates of the given lattice site.
    fn site_position(&self, site: usize) -> [f64; D];

    /// Neighbor site ids of the given site. Fixed at lattice construction.
    fn neighbor_sites(&self, site: usize) -> &[usize];

    /// Element currently owning the given site, or `None` for an unowned site.
    fn element_of_site(&self, site: usize) -> Option<usize>;

    /// Current volume (site count) of the given element.
    fn element_volume(&self, element: usize) -> Result<f64, IndexError>;

    /// Reads an item from the cell-data store of the cell occupying the given element.
    fn data_item(&self, element: usize, key: &str) -> Result<f64, DataNotFoundError>;

    /// Reads an item from the cell-data store, falling back to a default if absent.
    fn data_item_or(&self, element: usize, key: &str, default: f64) -> f64 {
        self.data_item(element, key).unwrap_or(default)
    }

    /// Whether the cell occupying the given element carries a label.
    fn is_labelled(&self, element: usize) -> Result<bool, IndexError>;
}

/// A single energy-contribution term of the Potts Hamiltonian.
///
/// For a proposed reassignment of `site` from `current_owner` to `proposed_owner` the
/// rule returns its share of the total energy difference
/// $\Delta H = H_\text{after} - H_\text{before}$.
/// The Metropolis engine sums the contributions of all registered rules.
///
/// Implementations must be free of side effects on the population model: the engine may
/// evaluate a rule arbitrarily often for proposals which are ultimately rejected.
pub trait UpdateRule<const D: usize> {
    /// Computes this rule's Hamiltonian difference for the proposed reassignment.
    ///
    /// `current_owner` and `proposed_owner` are element ids, `None` denoting the unowned
    /// medium. A no-op proposal (`current_owner == proposed_owner`) must yield exactly
    /// zero.
    fn hamiltonian_contribution(
        &self,
        current_owner: Option<usize>,
        proposed_owner: Option<usize>,
        site: usize,
        population: &dyn LatticeContext<D>,
    ) -> Result<f64, CalcError>;
}
