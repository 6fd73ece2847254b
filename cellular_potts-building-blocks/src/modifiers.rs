use crate::update_rules::TARGET_VOLUME_KEY;

use cellular_potts_concepts::{
    BoundaryConditionPlacement, FieldEquation, FieldMesh, FieldSolveRequest, FieldSolver,
    FieldSourceTerm, IndexError, MeshGenerator, ModifierError, PopulationAccess, SetupError,
    SimulationModifier,
};

use serde::{Deserialize, Serialize};

/// Data key from which [TargetVolumeGrowthModifier] reads a per-cell growth
/// slope, falling back to its configured default.
pub const GROWTH_SLOPE_KEY: &str = "slope";

/// Grows and shrinks per-cell target volumes along the cell cycle.
///
/// At setup and at the end of every step the modifier writes a target volume
/// under [TARGET_VOLUME_KEY] for every live cell:
///
/// * growing cells start at half the mature volume and increase linearly with
///   age through G1,
/// * through S the target stays at the mature volume,
/// * through G2 and M the target is interpolated back up to the mature volume
///   from wherever G1 growth ended,
/// * cells flagged ready to divide are set to half the mature volume so both
///   daughters start consistently,
/// * apoptotic cells shrink linearly over their death duration, clamped at
///   zero.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TargetVolumeGrowthModifier {
    /// Target volume of a fully grown cell.
    pub mature_cell_target_volume: f64,
    /// Default growth slope for cells without a [GROWTH_SLOPE_KEY] item.
    pub default_growth_slope: f64,
    /// Substitute G1 duration for cycle models without a phase decomposition.
    pub fallback_g1_duration: f64,
}

impl Default for TargetVolumeGrowthModifier {
    fn default() -> Self {
        Self {
            mature_cell_target_volume: 16.0,
            default_growth_slope: 1.0,
            fallback_g1_duration: 8.0,
        }
    }
}

impl TargetVolumeGrowthModifier {
    fn update_target_volumes<const D: usize>(
        &self,
        population: &mut dyn PopulationAccess<D>,
    ) -> Result<(), ModifierError> {
        let time = population.time();
        let mature = self.mature_cell_target_volume;
        for element in population.element_ids() {
            let info = population.cycle_info(element)?;
            let apoptosis = population.apoptosis(element)?;
            let slope = population
                .data(element)?
                .get_item_or(GROWTH_SLOPE_KEY, self.default_growth_slope);
            let g1 = if info.g1_duration.is_finite() {
                info.g1_duration
            } else {
                self.fallback_g1_duration
            };
            let target = match apoptosis {
                Some(apoptosis) => {
                    let elapsed = time - apoptosis.started_at;
                    let onset_age = info.age - elapsed;
                    let mut target = mature;
                    if onset_age < g1 {
                        target *= 0.5 * (1.0 + onset_age / g1);
                    }
                    target -= 0.5 * target / apoptosis.duration * elapsed;
                    target.max(0.0)
                }
                None if info.ready_to_divide => 0.5 * mature,
                None if info.age < 1.1 * g1 => 0.5 * mature + info.age / (8.0 * slope),
                None if info.age > g1 + info.s_duration => {
                    let remainder = info.g2_duration + info.m_duration;
                    if remainder > 0.0 {
                        let post_g1 = 0.5 * mature + g1 / (8.0 * slope);
                        post_g1
                            + ((info.age - g1 - info.s_duration) / remainder) * (mature - post_g1)
                    } else {
                        mature
                    }
                }
                None => mature,
            };
            population
                .data_mut(element)?
                .set_item(TARGET_VOLUME_KEY, target);
        }
        Ok(())
    }
}

impl<const D: usize> SimulationModifier<D> for TargetVolumeGrowthModifier {
    fn setup(&mut self, population: &mut dyn PopulationAccess<D>) -> Result<(), SetupError> {
        self.update_target_volumes(population)
            .map_err(|e| SetupError(format!("{e}")))
    }

    fn update_at_end_of_time_step(
        &mut self,
        population: &mut dyn PopulationAccess<D>,
    ) -> Result<(), ModifierError> {
        self.update_target_volumes(population)
    }
}

/// Solves a field equation on a box domain overlaying the population and
/// writes the interpolated solution into per-cell data.
///
/// At setup the mesh is generated once from the padded bounding box of the
/// population. Every invocation then
///
/// 1. maps each cell into the mesh element containing its centroid,
/// 2. aggregates the per-element source strengths,
/// 3. determines the boundary nodes required by the equation's placement,
/// 4. delegates to the [FieldSolver], seeding it with the previous solution,
/// 5. interpolates the new solution at every cell centroid and stores it under
///    the name of the dependent variable.
///
/// The cell-to-element map is refreshed before every solve so that solves
/// never observe memberships from a previous step. A cell whose centroid has
/// left the mesh is an error; choose the padding generously enough for the
/// expected population movement.
pub struct BoxDomainFieldModifier<M, G, S, const D: usize> {
    equation: FieldEquation,
    generator: G,
    solver: S,
    padding: f64,
    mesh: Option<M>,
    previous_solution: Option<Vec<f64>>,
}

impl<M, G, S, const D: usize> BoxDomainFieldModifier<M, G, S, D>
where
    M: FieldMesh<D>,
    G: MeshGenerator<M, D>,
    S: FieldSolver<M, D>,
{
    /// Constructs the modifier. The mesh is generated at setup from the
    /// bounding box of the population, enlarged by `padding` on every side.
    pub fn new(equation: FieldEquation, generator: G, solver: S, padding: f64) -> Self {
        Self {
            equation,
            generator,
            solver,
            padding,
            mesh: None,
            previous_solution: None,
        }
    }

    /// The most recent nodal solution, if a solve has happened.
    pub fn solution(&self) -> Option<&[f64]> {
        self.previous_solution.as_deref()
    }

    fn solve_and_write(
        &mut self,
        population: &mut dyn PopulationAccess<D>,
    ) -> Result<(), ModifierError> {
        let mesh = self.mesh.as_ref().ok_or(SetupError(
            "field modifier invoked before its setup hook".into(),
        ))?;

        let mut cell_locations = Vec::new();
        for element in population.element_ids() {
            let centroid = population.centroid(element)?;
            let mesh_element = mesh.element_containing(&centroid).ok_or(IndexError(format!(
                "centroid {centroid:?} of element {element} lies outside the field mesh"
            )))?;
            cell_locations.push((element, mesh_element, centroid));
        }

        let mut element_sources = vec![0.0; mesh.num_elements()];
        match &self.equation.source {
            FieldSourceTerm::Constant(strength) => element_sources.fill(*strength),
            FieldSourceTerm::AveragedCellSource {
                rate_key,
                default_rate,
            } => {
                for (element, mesh_element, _) in &cell_locations {
                    let rate = population
                        .data(*element)?
                        .get_item_or(rate_key, *default_rate);
                    element_sources[*mesh_element] += rate;
                }
                for (mesh_element, source) in element_sources.iter_mut().enumerate() {
                    *source /= mesh.element_measure(mesh_element)?;
                }
            }
        }

        let boundary_nodes = match self.equation.placement {
            BoundaryConditionPlacement::BoxBoundary => mesh.boundary_nodes(),
            BoundaryConditionPlacement::PopulationBoundary => {
                let mut occupied = vec![false; mesh.num_nodes()];
                for (_, mesh_element, _) in &cell_locations {
                    for &node in mesh.element_nodes(*mesh_element)? {
                        occupied[node] = true;
                    }
                }
                (0..mesh.num_nodes()).filter(|&n| !occupied[n]).collect()
            }
        };

        let solution = self.solver.solve(
            mesh,
            FieldSolveRequest {
                equation: &self.equation,
                element_sources: &element_sources,
                boundary_nodes: &boundary_nodes,
                previous_solution: self.previous_solution.as_deref(),
            },
        )?;

        for (element, _, centroid) in &cell_locations {
            let value = mesh.interpolate(centroid, &solution)?;
            population
                .data_mut(*element)?
                .set_item(self.equation.dependent_variable.clone(), value);
        }
        self.previous_solution = Some(solution);
        Ok(())
    }
}

impl<M, G, S, const D: usize> SimulationModifier<D> for BoxDomainFieldModifier<M, G, S, D>
where
    M: FieldMesh<D>,
    G: MeshGenerator<M, D>,
    S: FieldSolver<M, D>,
{
    fn setup(&mut self, population: &mut dyn PopulationAccess<D>) -> Result<(), SetupError> {
        let (mut lower, mut upper) = population.bounding_box();
        for axis in 0..D {
            lower[axis] -= self.padding;
            upper[axis] += self.padding;
        }
        self.mesh = Some(self.generator.generate(lower, upper)?);
        self.previous_solution = None;
        self.solve_and_write(population)
            .map_err(|e| SetupError(format!("{e}")))
    }

    fn update_at_end_of_time_step(
        &mut self,
        population: &mut dyn PopulationAccess<D>,
    ) -> Result<(), ModifierError> {
        self.solve_and_write(population)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meshes::{RectangularGridMesh, RectangularGridMeshGenerator, RelaxationFieldSolver};
    use approx::assert_relative_eq;
    use cellular_potts_concepts::{
        ApoptosisInfo, CellData, CycleInfo, FieldBoundaryCondition,
    };
    use std::collections::BTreeMap;

    struct TestPopulation {
        time: f64,
        centroids: BTreeMap<usize, [f64; 2]>,
        cycles: BTreeMap<usize, CycleInfo>,
        apoptosis: BTreeMap<usize, ApoptosisInfo>,
        data: BTreeMap<usize, CellData>,
    }

    impl TestPopulation {
        fn single(cycle: CycleInfo) -> Self {
            Self {
                time: 0.0,
                centroids: BTreeMap::from([(0, [1.0, 1.0])]),
                cycles: BTreeMap::from([(0, cycle)]),
                apoptosis: BTreeMap::new(),
                data: BTreeMap::from([(0, CellData::new())]),
            }
        }

        fn missing(element: usize) -> IndexError {
            IndexError(format!("no element {element}"))
        }
    }

    impl PopulationAccess<2> for TestPopulation {
        fn time(&self) -> f64 {
            self.time
        }
        fn element_ids(&self) -> Vec<usize> {
            self.data.keys().copied().collect()
        }
        fn centroid(&self, element: usize) -> Result<[f64; 2], IndexError> {
            self.centroids
                .get(&element)
                .copied()
                .ok_or(Self::missing(element))
        }
        fn bounding_box(&self) -> ([f64; 2], [f64; 2]) {
            ([0.0, 0.0], [2.0, 2.0])
        }
        fn cycle_info(&self, element: usize) -> Result<CycleInfo, IndexError> {
            self.cycles
                .get(&element)
                .copied()
                .ok_or(Self::missing(element))
        }
        fn apoptosis(&self, element: usize) -> Result<Option<ApoptosisInfo>, IndexError> {
            if !self.data.contains_key(&element) {
                return Err(Self::missing(element));
            }
            Ok(self.apoptosis.get(&element).copied())
        }
        fn data(&self, element: usize) -> Result<&CellData, IndexError> {
            self.data.get(&element).ok_or(Self::missing(element))
        }
        fn data_mut(&mut self, element: usize) -> Result<&mut CellData, IndexError> {
            self.data.get_mut(&element).ok_or(Self::missing(element))
        }
    }

    fn quiescent(age: f64) -> CycleInfo {
        CycleInfo {
            age,
            g1_duration: 4.0,
            s_duration: 2.0,
            g2_duration: 1.0,
            m_duration: 1.0,
            ready_to_divide: false,
        }
    }

    #[test]
    fn growth_modifier_tracks_the_cycle_phases() {
        let modifier = TargetVolumeGrowthModifier::default();
        let mature = modifier.mature_cell_target_volume;

        // Fresh cell starts at half the mature volume.
        let mut population = TestPopulation::single(quiescent(0.0));
        modifier.update_target_volumes(&mut population).unwrap();
        let target = population.data[&0].get_item(TARGET_VOLUME_KEY).unwrap();
        assert_relative_eq!(target, 0.5 * mature);

        // Midway through G1 the target has grown linearly.
        let mut population = TestPopulation::single(quiescent(2.0));
        modifier.update_target_volumes(&mut population).unwrap();
        let target = population.data[&0].get_item(TARGET_VOLUME_KEY).unwrap();
        assert_relative_eq!(target, 0.5 * mature + 2.0 / 8.0);

        // In S phase the target rests at the mature volume.
        let mut population = TestPopulation::single(quiescent(5.0));
        modifier.update_target_volumes(&mut population).unwrap();
        let target = population.data[&0].get_item(TARGET_VOLUME_KEY).unwrap();
        assert_relative_eq!(target, mature);

        // Readiness halves the target for the upcoming division.
        let mut info = quiescent(8.5);
        info.ready_to_divide = true;
        let mut population = TestPopulation::single(info);
        modifier.update_target_volumes(&mut population).unwrap();
        let target = population.data[&0].get_item(TARGET_VOLUME_KEY).unwrap();
        assert_relative_eq!(target, 0.5 * mature);
    }

    #[test]
    fn apoptotic_targets_shrink_monotonically_to_zero() {
        let modifier = TargetVolumeGrowthModifier::default();
        let mut population = TestPopulation::single(quiescent(6.0));
        population.apoptosis.insert(
            0,
            ApoptosisInfo {
                started_at: 5.0,
                duration: 0.5,
            },
        );
        let mut previous = f64::INFINITY;
        for step in 0..12 {
            population.time = 5.0 + step as f64 * 0.1;
            let mut info = quiescent(6.0);
            info.age = 6.0 + step as f64 * 0.1;
            population.cycles.insert(0, info);
            modifier.update_target_volumes(&mut population).unwrap();
            let target = population.data[&0].get_item(TARGET_VOLUME_KEY).unwrap();
            assert!(target <= previous);
            assert!(target >= 0.0);
            previous = target;
        }
        // Eventually the clamp pins the target at zero.
        assert_eq!(previous, 0.0);
    }

    #[test]
    fn infinite_g1_uses_the_fallback_duration() {
        let modifier = TargetVolumeGrowthModifier::default();
        let info = CycleInfo {
            age: 0.0,
            g1_duration: f64::INFINITY,
            s_duration: 0.0,
            g2_duration: 0.0,
            m_duration: 0.0,
            ready_to_divide: false,
        };
        let mut population = TestPopulation::single(info);
        modifier.update_target_volumes(&mut population).unwrap();
        let target = population.data[&0].get_item(TARGET_VOLUME_KEY).unwrap();
        assert_relative_eq!(target, 0.5 * modifier.mature_cell_target_volume);
    }

    type GridFieldModifier = BoxDomainFieldModifier<
        RectangularGridMesh,
        RectangularGridMeshGenerator,
        RelaxationFieldSolver,
        2,
    >;

    fn oxygen_equation(source: FieldSourceTerm) -> FieldEquation {
        FieldEquation {
            dependent_variable: "oxygen".into(),
            diffusion_constant: 0.0,
            decay_rate: 1.0,
            source,
            boundary_condition: FieldBoundaryCondition::Dirichlet(1.0),
            placement: BoundaryConditionPlacement::PopulationBoundary,
        }
    }

    #[test]
    fn field_modifier_writes_the_dependent_variable() {
        let mut modifier: GridFieldModifier = BoxDomainFieldModifier::new(
            oxygen_equation(FieldSourceTerm::Constant(1.0)),
            RectangularGridMeshGenerator::new(1.0),
            RelaxationFieldSolver::default(),
            1.0,
        );
        let mut population = TestPopulation::single(quiescent(0.0));
        SimulationModifier::setup(&mut modifier, &mut population).unwrap();
        assert!(population.data[&0].contains("oxygen"));
        assert!(modifier.solution().is_some());
        SimulationModifier::update_at_end_of_time_step(&mut modifier, &mut population).unwrap();
    }

    #[test]
    fn averaged_cell_sources_read_the_rate_key() {
        let mut modifier: GridFieldModifier = BoxDomainFieldModifier::new(
            oxygen_equation(FieldSourceTerm::AveragedCellSource {
                rate_key: "oxygen consumption".into(),
                default_rate: -0.1,
            }),
            RectangularGridMeshGenerator::new(1.0),
            RelaxationFieldSolver::default(),
            1.0,
        );
        let mut population = TestPopulation::single(quiescent(0.0));
        population
            .data
            .get_mut(&0)
            .unwrap()
            .set_item("oxygen consumption", -0.5);
        SimulationModifier::setup(&mut modifier, &mut population).unwrap();
        let value = population.data[&0].get_item("oxygen").unwrap();
        // The cell sits in an element with a negative source; its oxygen must
        // lie below the Dirichlet value applied around the population.
        assert!(value < 1.0);
    }

    #[test]
    fn field_modifier_requires_setup() {
        let mut modifier: GridFieldModifier = BoxDomainFieldModifier::new(
            oxygen_equation(FieldSourceTerm::Constant(0.0)),
            RectangularGridMeshGenerator::new(1.0),
            RelaxationFieldSolver::default(),
            1.0,
        );
        let mut population = TestPopulation::single(quiescent(0.0));
        assert!(
            SimulationModifier::update_at_end_of_time_step(&mut modifier, &mut population).is_err()
        );
    }
}
