use cellular_potts_concepts::{CalcError, LatticeContext, UpdateRule};

use serde::{Deserialize, Serialize};

/// Data key under which target volumes are stored.
///
/// [VolumeConstraintUpdateRule] reads this key and the
/// [TargetVolumeGrowthModifier](crate::modifiers::TargetVolumeGrowthModifier)
/// writes it at the end of every time step.
pub const TARGET_VOLUME_KEY: &str = "target volume";

/// Penalizes deviations of each cells volume from its target volume.
///
/// The rule adds a quadratic term
/// $$H_\text{vol} = \lambda \sum_\text{cells} (V_i - V_i^\text{target})^2$$
/// to the Hamiltonian. Copy attempts which grow an element beyond or shrink it
/// below its target volume are thus energetically penalized. The target volume
/// of a cell is read from its [TARGET_VOLUME_KEY] data item and falls back to
/// [mature_cell_target_volume](VolumeConstraintUpdateRule::mature_cell_target_volume)
/// when the item is absent.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct VolumeConstraintUpdateRule {
    /// Strength $\lambda$ of the quadratic volume penalty.
    pub deformation_energy_parameter: f64,
    /// Fallback target volume for cells without a [TARGET_VOLUME_KEY] item.
    pub mature_cell_target_volume: f64,
}

impl Default for VolumeConstraintUpdateRule {
    fn default() -> Self {
        Self {
            deformation_energy_parameter: 0.5,
            mature_cell_target_volume: 16.0,
        }
    }
}

impl<const D: usize> UpdateRule<D> for VolumeConstraintUpdateRule {
    fn hamiltonian_contribution(
        &self,
        current_owner: Option<usize>,
        proposed_owner: Option<usize>,
        _site: usize,
        population: &dyn LatticeContext<D>,
    ) -> Result<f64, CalcError> {
        if current_owner == proposed_owner {
            return Ok(0.0);
        }
        let mut delta = 0.0;
        if let Some(element) = current_owner {
            let volume = population
                .element_volume(element)
                .map_err(|e| CalcError(format!("{e}")))?;
            let target =
                population.data_item_or(element, TARGET_VOLUME_KEY, self.mature_cell_target_volume);
            delta += self.deformation_energy_parameter
                * ((volume - 1.0 - target).powi(2) - (volume - target).powi(2));
        }
        if let Some(element) = proposed_owner {
            let volume = population
                .element_volume(element)
                .map_err(|e| CalcError(format!("{e}")))?;
            let target =
                population.data_item_or(element, TARGET_VOLUME_KEY, self.mature_cell_target_volume);
            delta += self.deformation_energy_parameter
                * ((volume + 1.0 - target).powi(2) - (volume - target).powi(2));
        }
        Ok(delta)
    }
}

/// Surface-tension term counting contact interfaces around the flipped site.
///
/// Each pair of neighboring sites owned by distinct elements contributes
/// [cell_cell_adhesion_energy](AdhesionUpdateRule::cell_cell_adhesion_energy)
/// while interfaces between an owned and an unowned (medium) site contribute
/// [cell_boundary_adhesion_energy](AdhesionUpdateRule::cell_boundary_adhesion_energy).
/// Since a copy attempt only changes the ownership of a single site, the energy
/// difference is evaluated locally over the neighbor links of that site.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct AdhesionUpdateRule {
    /// Energy per interface between two distinct cells.
    pub cell_cell_adhesion_energy: f64,
    /// Energy per interface between a cell and the surrounding medium.
    pub cell_boundary_adhesion_energy: f64,
}

impl Default for AdhesionUpdateRule {
    fn default() -> Self {
        Self {
            cell_cell_adhesion_energy: 0.1,
            cell_boundary_adhesion_energy: 0.2,
        }
    }
}

impl AdhesionUpdateRule {
    fn contact_energy(&self, first: Option<usize>, second: Option<usize>) -> f64 {
        match (first, second) {
            (Some(a), Some(b)) if a != b => self.cell_cell_adhesion_energy,
            (Some(_), None) | (None, Some(_)) => self.cell_boundary_adhesion_energy,
            _ => 0.0,
        }
    }
}

impl<const D: usize> UpdateRule<D> for AdhesionUpdateRule {
    fn hamiltonian_contribution(
        &self,
        current_owner: Option<usize>,
        proposed_owner: Option<usize>,
        site: usize,
        population: &dyn LatticeContext<D>,
    ) -> Result<f64, CalcError> {
        if current_owner == proposed_owner {
            return Ok(0.0);
        }
        let mut delta = 0.0;
        for &neighbor in population.neighbor_sites(site) {
            let neighbor_owner = population.element_of_site(neighbor);
            delta += self.contact_energy(proposed_owner, neighbor_owner)
                - self.contact_energy(current_owner, neighbor_owner);
        }
        Ok(delta)
    }
}

/// Adhesion term distinguishing labelled from unlabelled cells.
///
/// Identical to [AdhesionUpdateRule] except that the contact energy depends on
/// whether the two elements forming an interface carry the mutation label.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct DifferentialAdhesionUpdateRule {
    /// Energy per interface between two labelled cells.
    pub labelled_cell_labelled_cell_adhesion_energy: f64,
    /// Energy per interface between a labelled and an unlabelled cell.
    pub labelled_cell_cell_adhesion_energy: f64,
    /// Energy per interface between two unlabelled cells.
    pub cell_cell_adhesion_energy: f64,
    /// Energy per interface between a labelled cell and the medium.
    pub labelled_cell_boundary_adhesion_energy: f64,
    /// Energy per interface between an unlabelled cell and the medium.
    pub cell_boundary_adhesion_energy: f64,
}

impl Default for DifferentialAdhesionUpdateRule {
    fn default() -> Self {
        Self {
            labelled_cell_labelled_cell_adhesion_energy: 0.16,
            labelled_cell_cell_adhesion_energy: 0.11,
            cell_cell_adhesion_energy: 0.02,
            labelled_cell_boundary_adhesion_energy: 0.16,
            cell_boundary_adhesion_energy: 0.16,
        }
    }
}

impl DifferentialAdhesionUpdateRule {
    fn contact_energy<const D: usize>(
        &self,
        first: Option<usize>,
        second: Option<usize>,
        population: &dyn LatticeContext<D>,
    ) -> Result<f64, CalcError> {
        let labelled =
            |element: usize| population.is_labelled(element).map_err(|e| CalcError(format!("{e}")));
        Ok(match (first, second) {
            (Some(a), Some(b)) if a != b => match (labelled(a)?, labelled(b)?) {
                (true, true) => self.labelled_cell_labelled_cell_adhesion_energy,
                (false, false) => self.cell_cell_adhesion_energy,
                _ => self.labelled_cell_cell_adhesion_energy,
            },
            (Some(a), None) | (None, Some(a)) => {
                if labelled(a)? {
                    self.labelled_cell_boundary_adhesion_energy
                } else {
                    self.cell_boundary_adhesion_energy
                }
            }
            _ => 0.0,
        })
    }
}

impl<const D: usize> UpdateRule<D> for DifferentialAdhesionUpdateRule {
    fn hamiltonian_contribution(
        &self,
        current_owner: Option<usize>,
        proposed_owner: Option<usize>,
        site: usize,
        population: &dyn LatticeContext<D>,
    ) -> Result<f64, CalcError> {
        if current_owner == proposed_owner {
            return Ok(0.0);
        }
        let mut delta = 0.0;
        for &neighbor in population.neighbor_sites(site) {
            let neighbor_owner = population.element_of_site(neighbor);
            delta += self.contact_energy(proposed_owner, neighbor_owner, population)?
                - self.contact_energy(current_owner, neighbor_owner, population)?;
        }
        Ok(delta)
    }
}

/// Biases cell movement along a fixed chemical gradient.
///
/// The rule assigns every owned site the energy $-\chi\,\vec{g}\cdot\vec{x}$
/// so that gaining a site far up the gradient lowers the Hamiltonian. Copy
/// attempts between two cells leave the total owned set unchanged and
/// contribute nothing.
#[derive(Clone, Debug, PartialEq)]
pub struct ChemotaxisUpdateRule<const D: usize> {
    /// Chemotactic sensitivity $\chi$.
    pub chemotaxis_parameter: f64,
    /// Direction and magnitude $\vec{g}$ of the chemical gradient.
    pub gradient: [f64; D],
}

impl<const D: usize> ChemotaxisUpdateRule<D> {
    /// Constructs the rule from sensitivity and gradient vector.
    pub fn new(chemotaxis_parameter: f64, gradient: [f64; D]) -> Self {
        Self {
            chemotaxis_parameter,
            gradient,
        }
    }

    fn site_energy<'a>(&self, position: impl IntoIterator<Item = &'a f64>) -> f64 {
        -self.chemotaxis_parameter
            * self
                .gradient
                .iter()
                .zip(position)
                .map(|(g, x)| g * x)
                .sum::<f64>()
    }
}

impl<const D: usize> UpdateRule<D> for ChemotaxisUpdateRule<D> {
    fn hamiltonian_contribution(
        &self,
        current_owner: Option<usize>,
        proposed_owner: Option<usize>,
        site: usize,
        population: &dyn LatticeContext<D>,
    ) -> Result<f64, CalcError> {
        let position = population.site_position(site);
        Ok(match (current_owner, proposed_owner) {
            (None, Some(_)) => self.site_energy(position.iter()),
            (Some(_), None) => -self.site_energy(position.iter()),
            _ => 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellular_potts_concepts::{DataNotFoundError, IndexError};
    use std::collections::BTreeMap;

    struct StaticContext {
        volumes: BTreeMap<usize, f64>,
        targets: BTreeMap<usize, f64>,
        labels: BTreeMap<usize, bool>,
        owners: Vec<Option<usize>>,
        neighbors: Vec<Vec<usize>>,
    }

    impl StaticContext {
        fn pair() -> Self {
            // Two-site strip with element 0 on site 0 and medium on site 1.
            Self {
                volumes: BTreeMap::from([(0, 3.0), (1, 5.0)]),
                targets: BTreeMap::from([(0, 4.0)]),
                labels: BTreeMap::from([(0, true), (1, false)]),
                owners: vec![Some(0), None],
                neighbors: vec![vec![1], vec![0]],
            }
        }
    }

    impl LatticeContext<1> for StaticContext {
        fn site_position(&self, site: usize) -> [f64; 1] {
            [site as f64]
        }
        fn neighbor_sites(&self, site: usize) -> &[usize] {
            &self.neighbors[site]
        }
        fn element_of_site(&self, site: usize) -> Option<usize> {
            self.owners[site]
        }
        fn element_volume(&self, element: usize) -> Result<f64, IndexError> {
            self.volumes
                .get(&element)
                .copied()
                .ok_or(IndexError(format!("unknown element {element}")))
        }
        fn data_item(&self, element: usize, key: &str) -> Result<f64, DataNotFoundError> {
            if key != TARGET_VOLUME_KEY {
                return Err(DataNotFoundError(format!("no item {key}")));
            }
            self.targets
                .get(&element)
                .copied()
                .ok_or(DataNotFoundError(format!("no item {key}")))
        }
        fn is_labelled(&self, element: usize) -> Result<bool, IndexError> {
            self.labels
                .get(&element)
                .copied()
                .ok_or(IndexError(format!("unknown element {element}")))
        }
    }

    #[test]
    fn volume_constraint_prefers_growth_towards_target() {
        let rule = VolumeConstraintUpdateRule {
            deformation_energy_parameter: 0.5,
            mature_cell_target_volume: 16.0,
        };
        let context = StaticContext::pair();
        // Element 0 has volume 3 and target 4. Growing it lowers the energy.
        let grow = rule
            .hamiltonian_contribution(None, Some(0), 1, &context)
            .unwrap();
        assert!(grow < 0.0);
        // Shrinking it away from the target raises the energy.
        let shrink = rule
            .hamiltonian_contribution(Some(0), None, 0, &context)
            .unwrap();
        assert!(shrink > 0.0);
        // Element 1 has no stored target and falls back to the mature volume.
        let fallback = rule
            .hamiltonian_contribution(None, Some(1), 1, &context)
            .unwrap();
        assert_eq!(fallback, 0.5 * ((6.0f64 - 16.0).powi(2) - (5.0f64 - 16.0).powi(2)));
    }

    #[test]
    fn adhesion_counts_local_interfaces() {
        let rule = AdhesionUpdateRule::default();
        let context = StaticContext::pair();
        // Site 1 is medium with the single neighbor site 0 owned by element 0.
        // Claiming it for element 1 replaces one cell-boundary interface by a
        // cell-cell interface.
        let delta = rule
            .hamiltonian_contribution(None, Some(1), 1, &context)
            .unwrap();
        assert!((delta - (0.1 - 0.2)).abs() < 1e-12);
        // Claiming it for element 0 itself removes the interface entirely.
        let merge = rule
            .hamiltonian_contribution(None, Some(0), 1, &context)
            .unwrap();
        assert!((merge - (0.0 - 0.2)).abs() < 1e-12);
    }

    #[test]
    fn differential_adhesion_distinguishes_labels() {
        let rule = DifferentialAdhesionUpdateRule::default();
        let context = StaticContext::pair();
        // Element 0 is labelled, element 1 is not. The neighbor of site 1 is
        // owned by the labelled element 0.
        let labelled_to_cell = rule
            .hamiltonian_contribution(None, Some(1), 1, &context)
            .unwrap();
        assert!((labelled_to_cell - (0.11 - 0.16)).abs() < 1e-12);
    }

    #[test]
    fn chemotaxis_favours_up_gradient_gains() {
        let rule = ChemotaxisUpdateRule::new(2.0, [1.0]);
        let context = StaticContext::pair();
        // Gaining site 1 at position x = 1 lowers the energy by chi * g * x.
        let gain = rule
            .hamiltonian_contribution(None, Some(0), 1, &context)
            .unwrap();
        assert_eq!(gain, -2.0);
        let lose = rule
            .hamiltonian_contribution(Some(0), None, 1, &context)
            .unwrap();
        assert_eq!(lose, 2.0);
        // Transfer between two cells does not change the owned set.
        let transfer = rule
            .hamiltonian_contribution(Some(0), Some(1), 1, &context)
            .unwrap();
        assert_eq!(transfer, 0.0);
    }
}
