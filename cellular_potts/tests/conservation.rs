use cellular_potts::prelude::*;

/// Forbids any exchange of sites with the unowned medium so that the total
/// number of owned sites can only change through lifecycle events.
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

fn quiescent_population() -> OnLatticeSimulation<2, FixedDurationCycle> {
    let (lattice, elements) = PottsLatticeGenerator {
        lattice_shape: [8, 8],
        elements_shape: [2, 2],
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
        t_max: 1.0,
        rng_seed: 3,
        ..Default::default()
    };
    OnLatticeSimulation::new(config, lattice, cells).unwrap()
}

#[test]
fn sites_and_cells_are_conserved_without_lifecycle_events() {
    let mut simulation = quiescent_population()
        .add_update_rule(MediumBarrier)
        .add_update_rule(VolumeConstraintUpdateRule::default())
        .add_update_rule(AdhesionUpdateRule::default())
        .add_modifier(TargetVolumeGrowthModifier::default());
    let sites_before = simulation.lattice().total_owned_sites();
    let cells_before = simulation.cells().len();

    simulation.run().unwrap();

    assert_eq!(0, simulation.num_births());
    assert_eq!(0, simulation.num_deaths());
    assert_eq!(sites_before, simulation.lattice().total_owned_sites());
    assert_eq!(cells_before, simulation.cells().len());
}

#[test]
fn fully_tiled_lattice_conserves_sites_with_a_volume_constraint_alone() {
    // Four 3x3 elements tile the 6x6 lattice completely, so no site borders
    // the medium and the owned-site count has to stay at exactly 36.
    let (lattice, elements) = PottsLatticeGenerator {
        lattice_shape: [6, 6],
        elements_shape: [2, 2],
        element_shape: [3, 3],
        offset: [0, 0],
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
        t_max: 0.1,
        rng_seed: 5,
        ..Default::default()
    };
    let mut simulation = OnLatticeSimulation::new(config, lattice, cells)
        .unwrap()
        .add_update_rule(VolumeConstraintUpdateRule::default());

    simulation.run().unwrap();

    assert_eq!(0, simulation.num_births());
    assert_eq!(0, simulation.num_deaths());
    assert_eq!(36, simulation.lattice().total_owned_sites());
    assert_eq!(4, simulation.cells().len());
    for element in simulation.cells().element_ids() {
        assert!(!simulation.lattice().element_sites(element).unwrap().is_empty());
    }
}

#[test]
fn every_owned_site_belongs_to_a_live_cell() {
    let mut simulation = quiescent_population()
        .add_update_rule(VolumeConstraintUpdateRule::default())
        .add_update_rule(AdhesionUpdateRule::default())
        .add_modifier(TargetVolumeGrowthModifier::default());
    simulation.run().unwrap();

    let live: Vec<usize> = simulation.cells().element_ids();
    for site in 0..simulation.lattice().num_sites() {
        if let Some(element) = simulation.lattice().element_of_site(site) {
            assert!(live.contains(&element));
        }
    }
    for element in live {
        assert!(!simulation.lattice().element_sites(element).unwrap().is_empty());
    }
}

#[test]
fn growth_modifier_populates_target_volumes_at_setup() {
    let mut simulation =
        quiescent_population().add_modifier(TargetVolumeGrowthModifier::default());
    simulation.setup().unwrap();
    for element in simulation.cells().element_ids() {
        let data = simulation.cells().get(element).unwrap().data.clone();
        assert!(data.contains(TARGET_VOLUME_KEY));
    }
}
