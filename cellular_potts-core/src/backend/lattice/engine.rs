use cellular_potts_concepts::{DataNotFoundError, IndexError, LatticeContext, UpdateRule};
use rand::Rng;
use rand::seq::SliceRandom;

use super::config::{SimulationConfig, SiteVisitOrder};
use super::errors::SimulationError;
use super::lifecycle::CellDirectory;
use super::population::PottsLattice;

/// Read-only view bundling the lattice substrate and the cell directory, handed to
/// [UpdateRule]s during a sweep.
///
/// Element volumes are computed from the live site lists rather than the cached
/// geometry so that rules observe moves accepted earlier in the same sweep.
pub struct LatticeCellView<'a, const D: usize, C> {
    /// The lattice substrate.
    pub lattice: &'a PottsLattice<D>,
    /// The directory of live cells.
    pub cells: &'a CellDirectory<C>,
}

impl<'a, const D: usize, C> LatticeContext<D> for LatticeCellView<'a, D, C> {
    fn site_position(&self, site: usize) -> [f64; D] {
        self.lattice.site_position(site).unwrap_or([0.0; D])
    }

    fn neighbor_sites(&self, site: usize) -> &[usize] {
        self.lattice.neighbor_sites(site).unwrap_or(&[])
    }

    fn element_of_site(&self, site: usize) -> Option<usize> {
        self.lattice.element_of_site(site)
    }

    fn element_volume(&self, element: usize) -> Result<f64, IndexError> {
        Ok(self.lattice.element_sites(element)?.len() as f64)
    }

    fn data_item(&self, element: usize, key: &str) -> Result<f64, DataNotFoundError> {
        self.cells
            .data(element)
            .map_err(|e| DataNotFoundError(format!("{}", e)))?
            .get_item(key)
    }

    fn is_labelled(&self, element: usize) -> Result<bool, IndexError> {
        Ok(self.cells.get(element)?.properties.labelled)
    }
}

/// Counts proposals and acceptances of one or more sweeps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepStatistics {
    /// Number of proposals made.
    pub proposals: usize,
    /// Number of proposals accepted.
    pub accepted: usize,
}

/// Performs Metropolis sweeps over the lattice.
///
/// Per visited site the engine samples a proposal target uniformly from the owners of
/// differently-owned neighbor sites, sums the Hamiltonian differences of all registered
/// rules and accepts according to the Metropolis criterion: unconditionally for
/// `dH <= 0`, with probability `exp(-dH/temperature)` otherwise. All randomness is
/// drawn from the single generator passed in by the orchestrator.
#[derive(Clone, Debug)]
pub struct MetropolisEngine {
    temperature: f64,
    site_selection_probability: f64,
    site_visit_order: SiteVisitOrder,
}

impl MetropolisEngine {
    /// Constructs the engine from the backend configuration.
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            temperature: config.temperature,
            site_selection_probability: config.site_selection_probability,
            site_visit_order: config.site_visit_order,
        }
    }

    /// Performs one sweep, visiting every lattice site once.
    pub fn sweep<const D: usize, C>(
        &self,
        lattice: &mut PottsLattice<D>,
        cells: &CellDirectory<C>,
        rules: &[Box<dyn UpdateRule<D>>],
        rng: &mut rand_chacha::ChaCha8Rng,
    ) -> Result<SweepStatistics, SimulationError> {
        let mut order: Vec<usize> = (0..lattice.num_sites()).collect();
        if self.site_visit_order == SiteVisitOrder::Shuffled {
            order.shuffle(rng);
        }

        let mut statistics = SweepStatistics::default();
        for site in order {
            if self.site_selection_probability < 1.0
                && rng.gen::<f64>() >= self.site_selection_probability
            {
                continue;
            }
            let current_owner = lattice.element_of_site(site);

            // Copy attempts never vacate an element's last site. Emptying an
            // element is reserved for the lifecycle passes.
            if let Some(element) = current_owner {
                if lattice.element_sites(element)?.len() == 1 {
                    continue;
                }
            }

            // A site with no differently-owned neighbor makes no proposal this sweep.
            let mut candidates: Vec<Option<usize>> = Vec::new();
            for &neighbor in lattice.neighbor_sites(site)? {
                let owner = lattice.element_of_site(neighbor);
                if owner != current_owner && !candidates.contains(&owner) {
                    candidates.push(owner);
                }
            }
            if candidates.is_empty() {
                continue;
            }
            let proposed_owner = candidates[rng.gen_range(0..candidates.len())];
            statistics.proposals += 1;

            let delta_hamiltonian = {
                let view = LatticeCellView {
                    lattice: &*lattice,
                    cells,
                };
                let mut total = 0.0;
                for rule in rules.iter() {
                    total +=
                        rule.hamiltonian_contribution(current_owner, proposed_owner, site, &view)?;
                }
                total
            };

            if self.accept(delta_hamiltonian, rng) {
                lattice.move_site_to_element(site, proposed_owner)?;
                statistics.accepted += 1;
            }
        }
        Ok(statistics)
    }

    fn accept(&self, delta_hamiltonian: f64, rng: &mut rand_chacha::ChaCha8Rng) -> bool {
        if delta_hamiltonian <= 0.0 {
            return true;
        }
        rng.gen::<f64>() < (-delta_hamiltonian / self.temperature).exp()
    }
}
