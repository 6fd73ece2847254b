use cellular_potts_concepts::{
    CellBox, CellIdentifier, CellData, CellState, Cycle, CycleEvent, IndexError,
    InvalidOperationError, Killer,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::errors::SimulationError;
use super::population::PottsLattice;

/// Owns the live cells and their association to lattice elements.
///
/// Cells are keyed by the id of the element they occupy; the map thus encodes the
/// one-to-one correspondence between live cells and non-empty elements. Division and
/// killer passes follow a collect-then-act pattern so that removal never invalidates
/// iteration over the remaining live set.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CellDirectory<C> {
    cells: BTreeMap<usize, CellBox<C>>,
    division_counter: u64,
    num_births: u64,
    num_deaths: u64,
}

impl<C> CellDirectory<C> {
    /// Creates a directory from initially placed cells and their element ids.
    ///
    /// Initial cells are numbered consecutively in iteration order.
    pub fn from_initial_cells(
        cells: impl IntoIterator<Item = (usize, C)>,
    ) -> Result<Self, InvalidOperationError> {
        let mut directory = Self {
            cells: BTreeMap::new(),
            division_counter: 0,
            num_births: 0,
            num_deaths: 0,
        };
        for (n_cell, (element, cell)) in cells.into_iter().enumerate() {
            if directory
                .cells
                .insert(element, CellBox::new_initial(n_cell, cell))
                .is_some()
            {
                return Err(InvalidOperationError(format!(
                    "element {} was assigned more than one initial cell",
                    element
                )));
            }
        }
        Ok(directory)
    }

    /// The cell occupying the given element.
    pub fn get(&self, element: usize) -> Result<&CellBox<C>, IndexError> {
        self.cells.get(&element).ok_or(IndexError(format!(
            "no live cell occupies element {}",
            element
        )))
    }

    /// Mutable access to the cell occupying the given element.
    pub fn get_mut(&mut self, element: usize) -> Result<&mut CellBox<C>, IndexError> {
        self.cells.get_mut(&element).ok_or(IndexError(format!(
            "no live cell occupies element {}",
            element
        )))
    }

    /// Cell-data store of the cell occupying the given element.
    pub fn data(&self, element: usize) -> Result<&CellData, IndexError> {
        Ok(&self.get(element)?.data)
    }

    /// Mutable cell-data store of the cell occupying the given element.
    pub fn data_mut(&mut self, element: usize) -> Result<&mut CellData, IndexError> {
        Ok(&mut self.get_mut(element)?.data)
    }

    /// Element ids of all live cells, in ascending order.
    pub fn element_ids(&self) -> Vec<usize> {
        self.cells.keys().copied().collect()
    }

    /// Iterates over `(element id, cell)` pairs in ascending element order.
    pub fn iter(&self) -> impl Iterator<Item = (&usize, &CellBox<C>)> {
        self.cells.iter()
    }

    /// Number of live cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no cell is alive.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of division events since the start of the simulation.
    pub fn num_births(&self) -> u64 {
        self.num_births
    }

    /// Number of removed cells since the start of the simulation.
    pub fn num_deaths(&self) -> u64 {
        self.num_deaths
    }

    fn remove_cell<const D: usize>(
        &mut self,
        element: usize,
        lattice: &mut PottsLattice<D>,
    ) -> Result<CellBox<C>, InvalidOperationError> {
        let cell = self.cells.remove(&element).ok_or(InvalidOperationError(
            format!("cannot remove untracked cell of element {}", element),
        ))?;
        lattice.remove_element(element)?;
        self.num_deaths += 1;
        Ok(cell)
    }
}

/// Default programmed duration of the apoptosis phase entered through
/// [CycleEvent::PhasedDeath], overridable per cell through the
/// `"apoptosis duration"` data item.
pub const DEFAULT_APOPTOSIS_DURATION: f64 = 0.25;

impl<C> CellDirectory<C>
where
    C: Cycle<CellBox<C>>,
{
    /// Runs the cell-cycle update of every live cell and carries out the resulting
    /// events.
    ///
    /// Division partitions the parent's element via
    /// [PottsLattice::divide_element]; the daughter receives a fresh
    /// [CellIdentifier::Division] id, birth time `time` and the data store cloned by
    /// the cycle model's `divide`. [CycleEvent::PhasedDeath] marks the cell apoptotic;
    /// the cell is removed once its programmed duration has elapsed and
    /// `update_conditional_phased_death` has signalled completion.
    pub fn division_pass<const D: usize>(
        &mut self,
        lattice: &mut PottsLattice<D>,
        rng: &mut rand_chacha::ChaCha8Rng,
        dt: f64,
        time: f64,
    ) -> Result<(), SimulationError> {
        // Collect events first; the map is only mutated afterwards.
        let mut events = Vec::new();
        for (&element, cell) in self.cells.iter_mut() {
            match cell.properties.apoptosis {
                Some(info) => {
                    let elapsed = time - info.started_at;
                    if elapsed >= info.duration
                        && C::update_conditional_phased_death(rng, &dt, cell)?
                    {
                        events.push((element, CycleEvent::Remove));
                    }
                }
                None => {
                    if let Some(event) = C::update_cycle(rng, &dt, cell) {
                        events.push((element, event));
                    }
                }
            }
        }

        for (element, event) in events {
            match event {
                CycleEvent::Division => {
                    let daughter_element = lattice.divide_element(element)?;
                    let parent = self.get_mut(element).map_err(InvalidOperationError::from)?;
                    let parent_id = parent.identifier;
                    let mut daughter = C::divide(rng, parent)?;
                    daughter.identifier = CellIdentifier::Division(self.division_counter);
                    daughter.parent = Some(parent_id);
                    daughter.birth_time = time;
                    self.division_counter += 1;
                    self.num_births += 1;
                    if self.cells.insert(daughter_element, daughter).is_some() {
                        return Err(InvalidOperationError(format!(
                            "daughter element {} was already occupied",
                            daughter_element
                        ))
                        .into());
                    }
                }
                CycleEvent::PhasedDeath => {
                    let cell = self.get_mut(element).map_err(InvalidOperationError::from)?;
                    let duration = cell
                        .data
                        .get_item_or("apoptosis duration", DEFAULT_APOPTOSIS_DURATION);
                    cell.start_apoptosis(time, duration);
                }
                CycleEvent::Remove => {
                    self.remove_cell(element, lattice)?;
                }
            }
        }
        Ok(())
    }
}

impl<C> CellDirectory<C> {
    /// Evaluates every killer against every live cell and removes the marked cells.
    ///
    /// Kills are collected first and applied afterwards; vacated sites become unowned.
    /// Returns the number of cells removed in this pass.
    pub fn killer_pass<const D: usize>(
        &mut self,
        lattice: &mut PottsLattice<D>,
        killers: &[Box<dyn Killer<D>>],
        time: f64,
    ) -> Result<u64, SimulationError> {
        if killers.is_empty() {
            return Ok(0);
        }
        let mut marked = Vec::new();
        for (&element, cell) in self.cells.iter() {
            let state = CellState {
                centroid: lattice.element_centroid(element)?,
                age: cell.age(time),
                time,
                labelled: cell.properties.labelled,
                apoptosis: cell.properties.apoptosis,
            };
            for killer in killers.iter() {
                if killer.should_kill(&state)? {
                    marked.push(element);
                    break;
                }
            }
        }
        let n_killed = marked.len() as u64;
        for element in marked {
            self.remove_cell(element, lattice)?;
        }
        Ok(n_killed)
    }
}

#[cfg(test)]
mod test_lifecycle {
    use super::*;
    use crate::backend::lattice::population::PottsLatticeGenerator;
    use cellular_potts_concepts::DivisionError;
    use rand::SeedableRng;

    #[derive(Clone, Debug, Deserialize, Serialize)]
    struct CountdownCycle {
        age: f64,
        division_age: f64,
    }

    impl Cycle<CellBox<CountdownCycle>> for CountdownCycle {
        fn update_cycle(
            _rng: &mut rand_chacha::ChaCha8Rng,
            dt: &f64,
            cell: &mut CellBox<CountdownCycle>,
        ) -> Option<CycleEvent> {
            cell.cell.age += *dt;
            if cell.cell.age >= cell.cell.division_age {
                Some(CycleEvent::Division)
            } else {
                None
            }
        }

        fn divide(
            _rng: &mut rand_chacha::ChaCha8Rng,
            cell: &mut CellBox<CountdownCycle>,
        ) -> Result<CellBox<CountdownCycle>, DivisionError> {
            cell.cell.age = 0.0;
            let mut daughter = cell.clone();
            daughter.data = cell.data.clone();
            Ok(daughter)
        }
    }

    fn setup(division_age: f64) -> (PottsLattice<2>, CellDirectory<CountdownCycle>) {
        let (lattice, elements) = PottsLatticeGenerator {
            lattice_shape: [8, 8],
            elements_shape: [2, 1],
            element_shape: [2, 4],
            offset: [1, 1],
        }
        .generate()
        .unwrap();
        let cells = CellDirectory::from_initial_cells(elements.into_iter().map(|element| {
            (
                element,
                CountdownCycle {
                    age: 0.0,
                    division_age,
                },
            )
        }))
        .unwrap();
        (lattice, cells)
    }

    #[test]
    fn division_creates_daughter_with_reset_age() {
        let (mut lattice, mut cells) = setup(0.05);
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(0);
        let owned_before = lattice.total_owned_sites();
        cells
            .division_pass(&mut lattice, &mut rng, 0.1, 0.1)
            .unwrap();
        assert_eq!(4, cells.len());
        assert_eq!(2, cells.num_births());
        assert_eq!(owned_before, lattice.total_owned_sites());
        for (_, cell) in cells.iter() {
            assert_eq!(0.0, cell.cell.age);
        }
        let division_ids = cells
            .iter()
            .filter(|(_, cell)| matches!(cell.identifier, CellIdentifier::Division(_)))
            .count();
        assert_eq!(2, division_ids);
        for (_, cell) in cells.iter() {
            if let CellIdentifier::Division(_) = cell.identifier {
                assert!(cell.parent.is_some());
                assert_eq!(0.1, cell.birth_time);
            }
        }
    }

    #[test]
    fn no_division_before_readiness() {
        let (mut lattice, mut cells) = setup(100.0);
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(0);
        cells
            .division_pass(&mut lattice, &mut rng, 0.1, 0.1)
            .unwrap();
        assert_eq!(2, cells.len());
        assert_eq!(0, cells.num_births());
    }

    struct KillAboveY {
        y: f64,
    }
    impl Killer<2> for KillAboveY {
        fn should_kill(
            &self,
            cell: &CellState<2>,
        ) -> Result<bool, cellular_potts_concepts::DeathError> {
            Ok(cell.centroid[1] > self.y)
        }
    }

    #[test]
    fn killer_pass_collects_then_removes() {
        let (mut lattice, mut cells) = setup(100.0);
        // Move every centroid apart: elements sit at y in [1, 4].
        let killers: Vec<Box<dyn Killer<2>>> = vec![Box::new(KillAboveY { y: 10.0 })];
        let killed = cells.killer_pass(&mut lattice, &killers, 0.1).unwrap();
        assert_eq!(0, killed);

        let killers: Vec<Box<dyn Killer<2>>> = vec![Box::new(KillAboveY { y: 0.0 })];
        let killed = cells.killer_pass(&mut lattice, &killers, 0.1).unwrap();
        assert_eq!(2, killed);
        assert!(cells.is_empty());
        assert_eq!(2, cells.num_deaths());
        assert_eq!(0, lattice.total_owned_sites());
    }

    #[test]
    fn untracked_cell_is_an_invalid_operation() {
        let (mut lattice, mut cells) = setup(100.0);
        assert!(cells.remove_cell(999, &mut lattice).is_err());
    }
}
