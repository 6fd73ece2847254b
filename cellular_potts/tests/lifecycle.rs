use cellular_potts::prelude::*;

struct MediumBarrier;

impl<const D: usize> UpdateRule<D> for MediumBarrier {
    fn hamiltonian_contribution(
        &self,
        current_owner: Option<usize>,
        proposed_owner: Option<usize>,
        _site: usize,
        _population: &dyn LatticeContext<D>,
    ) -> Result<f64, CalcError> {
        Ok(match (current_owner, proposed_owner) {
            (Some(_), Some(_)) => 0.0,
            _ => 1.0e9,
        })
    }
}

#[test]
fn divisions_conserve_sites_and_track_parentage() {
    let (lattice, elements) = PottsLatticeGenerator {
        lattice_shape: [8, 8],
        elements_shape: [1, 1],
        element_shape: [4, 4],
        offset: [2, 2],
    }
    .generate()
    .unwrap();
    let cells = CellDirectory::from_initial_cells(
        elements
            .into_iter()
            .map(|element| (element, FixedDurationCycle::new(0.1, 0.1, 0.1, 0.1))),
    )
    .unwrap();
    let config = SimulationConfig {
        t_max: 1.0,
        rng_seed: 5,
        ..Default::default()
    };
    let mut simulation = OnLatticeSimulation::new(config, lattice, cells)
        .unwrap()
        .add_update_rule(MediumBarrier)
        .add_update_rule(VolumeConstraintUpdateRule::default())
        .add_modifier(TargetVolumeGrowthModifier::default());
    simulation.run().unwrap();

    assert!(simulation.num_births() >= 1);
    assert_eq!(0, simulation.num_deaths());
    assert_eq!(16, simulation.lattice().total_owned_sites());
    assert_eq!(
        1 + simulation.num_births() as usize,
        simulation.cells().len()
    );

    let mut daughters = 0;
    for (&element, cell) in simulation.cells().iter() {
        assert!(!simulation.lattice().element_sites(element).unwrap().is_empty());
        if let CellIdentifier::Division(_) = cell.identifier {
            daughters += 1;
            assert!(cell.parent.is_some());
            assert!(cell.birth_time > 0.0);
        }
    }
    assert!(daughters >= 1);
}

#[test]
fn plane_killer_removes_cells_beyond_the_plane() {
    let (lattice, elements) = PottsLatticeGenerator {
        lattice_shape: [10, 8],
        elements_shape: [2, 1],
        element_shape: [3, 3],
        offset: [1, 1],
    }
    .generate()
    .unwrap();
    let cells = CellDirectory::from_initial_cells(
        elements
            .into_iter()
            .map(|element| (element, FixedDurationCycle::new(100.0, 10.0, 10.0, 10.0))),
    )
    .unwrap();
    let config = SimulationConfig {
        t_max: 0.3,
        rng_seed: 1,
        ..Default::default()
    };
    let mut simulation = OnLatticeSimulation::new(config, lattice, cells)
        .unwrap()
        .add_update_rule(MediumBarrier)
        .add_update_rule(VolumeConstraintUpdateRule::default())
        .add_update_rule(AdhesionUpdateRule::default())
        .add_killer(PlaneBasedKiller::new([4.0, 0.0], [1.0, 0.0]))
        .add_modifier(TargetVolumeGrowthModifier::default());
    let cells_before = simulation.cells().len();
    simulation.run().unwrap();

    // The right-hand cell starts with its centroid beyond x = 4 and is removed
    // in the first killer pass; the left-hand cell survives.
    assert_eq!(0, simulation.num_births());
    assert_eq!(1, simulation.num_deaths());
    assert_eq!(cells_before - 1, simulation.cells().len());
    for element in simulation.cells().element_ids() {
        let centroid = simulation.lattice().element_centroid(element).unwrap();
        assert!(centroid[0] < 4.0);
    }
}
