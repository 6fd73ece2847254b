use crate::errors::{IndexError, SetupError, SolveError};

use serde::{Deserialize, Serialize};

/// The different types of boundary conditions of a field equation.
///
/// One has to be careful, since the Neumann condition is strictly speaking not of the
/// same type since its units are multiplied by 1/time compared to the Dirichlet value.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub enum FieldBoundaryCondition {
    /// Fixes the value of the field at the boundary.
    Dirichlet(f64),
    /// Applies a value to the derivative of the field at the boundary.
    Neumann(f64),
}

/// Where the boundary condition of a field equation is applied.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub enum BoundaryConditionPlacement {
    /// On the outer boundary of the box domain covering the population.
    BoxBoundary,
    /// On the boundary of the cell population itself, i.e. on all mesh nodes whose
    /// elements currently contain no cell.
    PopulationBoundary,
}

/// Source term of a field equation.
///
/// Whether a field equation has population-density-dependent sources is decided once at
/// setup through this tagged variant rather than checked on every solve.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum FieldSourceTerm {
    /// A spatially uniform source strength.
    Constant(f64),
    /// Per-mesh-element sources aggregated from the cells mapped into each element.
    AveragedCellSource {
        /// Cell-data key holding the per-cell source rate.
        rate_key: String,
        /// Rate used for cells which have not stored the key.
        default_rate: f64,
    },
}

/// Configuration of a single field equation solved on the auxiliary mesh.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FieldEquation {
    /// Name of the dependent variable; also the cell-data key under which the
    /// interpolated solution is written.
    pub dependent_variable: String,
    /// Diffusion constant of the field.
    pub diffusion_constant: f64,
    /// Linear decay rate of the field.
    pub decay_rate: f64,
    /// Source term specification.
    pub source: FieldSourceTerm,
    /// Boundary condition applied by the solver.
    pub boundary_condition: FieldBoundaryCondition,
    /// Where the boundary condition is applied.
    pub placement: BoundaryConditionPlacement,
}

/// Contract of the auxiliary mesh overlaying the cell population.
///
/// Node and element indices must be stable across steps so that solutions can be reused
/// for interpolation and as the previous state of time-dependent equations.
pub trait FieldMesh<const D: usize> {
    /// Number of mesh nodes.
    fn num_nodes(&self) -> usize;

    /// Number of mesh elements.
    fn num_elements(&self) -> usize;

    /// Position of the given mesh node.
    fn node_position(&self, node: usize) -> Result<[f64; D], IndexError>;

    /// Node ids of the given mesh element.
    fn element_nodes(&self, element: usize) -> Result<&[usize], IndexError>;

    /// Measure (area/volume) of the given mesh element.
    fn element_measure(&self, element: usize) -> Result<f64, IndexError>;

    /// Mesh element containing the given point, or `None` if outside the mesh.
    fn element_containing(&self, position: &[f64; D]) -> Option<usize>;

    /// Interpolates a nodal solution vector at the given point.
    fn interpolate(&self, position: &[f64; D], nodal_values: &[f64]) -> Result<f64, IndexError>;

    /// Nodes on the outer boundary of the mesh.
    fn boundary_nodes(&self) -> Vec<usize>;
}

/// External collaborator generating the auxiliary mesh from a bounding region.
pub trait MeshGenerator<M, const D: usize> {
    /// Generates a mesh covering the axis-aligned box spanned by `lower` and `upper`.
    fn generate(&self, lower: [f64; D], upper: [f64; D]) -> Result<M, SetupError>;
}

/// Everything a [FieldSolver] needs for one solve, besides the mesh.
#[derive(Clone, Debug)]
pub struct FieldSolveRequest<'a> {
    /// Equation parameters.
    pub equation: &'a FieldEquation,
    /// Per-mesh-element source strengths, one entry per mesh element.
    pub element_sources: &'a [f64],
    /// Nodes at which the boundary condition is applied.
    pub boundary_nodes: &'a [usize],
    /// Previous nodal solution for time-dependent equations.
    pub previous_solution: Option<&'a [f64]>,
}

/// External collaborator solving the field equation on the auxiliary mesh.
///
/// The orchestrator treats the solve as a synchronous call: it does not proceed past a
/// field-coupling modifier until the solver returns a nodal solution vector or a
/// [SolveError]. Retries, if desired, belong to the solver itself.
pub trait FieldSolver<M, const D: usize> {
    /// Solves the field equation, returning one value per mesh node.
    fn solve(&mut self, mesh: &M, request: FieldSolveRequest) -> Result<Vec<f64>, SolveError>;
}
