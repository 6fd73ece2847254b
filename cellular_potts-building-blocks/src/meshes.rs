use cellular_potts_concepts::{
    FieldBoundaryCondition, FieldMesh, FieldSolveRequest, FieldSolver, IndexError, MeshGenerator,
    SetupError, SolveError,
};

use itertools::iproduct;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Two-dimensional structured mesh of square elements.
///
/// Nodes and elements are numbered row-major with the first axis running
/// fastest. Each element is the square spanned by four neighboring nodes and
/// nodal solutions are interpolated bilinearly. Generated by
/// [RectangularGridMeshGenerator].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct RectangularGridMesh {
    lower: [f64; 2],
    step: f64,
    nodes_per_axis: [usize; 2],
    element_nodes: Vec<[usize; 4]>,
}

impl RectangularGridMesh {
    fn elements_per_axis(&self) -> [usize; 2] {
        [self.nodes_per_axis[0] - 1, self.nodes_per_axis[1] - 1]
    }

    fn node_coords(&self, node: usize) -> [usize; 2] {
        [node % self.nodes_per_axis[0], node / self.nodes_per_axis[0]]
    }

    /// Side length of the square elements.
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Grid neighbors of the given node along both axes.
    pub fn node_neighbors(&self, node: usize) -> Vec<usize> {
        let [nx, ny] = self.nodes_per_axis;
        let [i, j] = self.node_coords(node);
        let mut neighbors = Vec::with_capacity(4);
        if i > 0 {
            neighbors.push(node - 1);
        }
        if i + 1 < nx {
            neighbors.push(node + 1);
        }
        if j > 0 {
            neighbors.push(node - nx);
        }
        if j + 1 < ny {
            neighbors.push(node + nx);
        }
        neighbors
    }
}

impl FieldMesh<2> for RectangularGridMesh {
    fn num_nodes(&self) -> usize {
        self.nodes_per_axis[0] * self.nodes_per_axis[1]
    }

    fn num_elements(&self) -> usize {
        self.element_nodes.len()
    }

    fn node_position(&self, node: usize) -> Result<[f64; 2], IndexError> {
        if node >= self.num_nodes() {
            return Err(IndexError(format!("mesh node {node} does not exist")));
        }
        let [i, j] = self.node_coords(node);
        Ok([
            self.lower[0] + i as f64 * self.step,
            self.lower[1] + j as f64 * self.step,
        ])
    }

    fn element_nodes(&self, element: usize) -> Result<&[usize], IndexError> {
        self.element_nodes
            .get(element)
            .map(|nodes| &nodes[..])
            .ok_or(IndexError(format!("mesh element {element} does not exist")))
    }

    fn element_measure(&self, element: usize) -> Result<f64, IndexError> {
        if element >= self.num_elements() {
            return Err(IndexError(format!("mesh element {element} does not exist")));
        }
        Ok(self.step * self.step)
    }

    fn element_containing(&self, position: &[f64; 2]) -> Option<usize> {
        let [ex, ey] = self.elements_per_axis();
        let mut indices = [0usize; 2];
        for axis in 0..2 {
            let relative = (position[axis] - self.lower[axis]) / self.step;
            let extent = [ex, ey][axis] as f64;
            if relative < 0.0 || relative > extent {
                return None;
            }
            indices[axis] = (relative as usize).min([ex, ey][axis] - 1);
        }
        Some(indices[0] + indices[1] * ex)
    }

    fn interpolate(&self, position: &[f64; 2], nodal_values: &[f64]) -> Result<f64, IndexError> {
        if nodal_values.len() != self.num_nodes() {
            return Err(IndexError(format!(
                "solution vector has {} entries but the mesh has {} nodes",
                nodal_values.len(),
                self.num_nodes()
            )));
        }
        let element = self.element_containing(position).ok_or(IndexError(format!(
            "position {position:?} lies outside the mesh"
        )))?;
        let nodes = self.element_nodes[element];
        let origin = self.node_position(nodes[0])?;
        let xi = ((position[0] - origin[0]) / self.step).clamp(0.0, 1.0);
        let eta = ((position[1] - origin[1]) / self.step).clamp(0.0, 1.0);
        Ok(nodal_values[nodes[0]] * (1.0 - xi) * (1.0 - eta)
            + nodal_values[nodes[1]] * xi * (1.0 - eta)
            + nodal_values[nodes[2]] * (1.0 - xi) * eta
            + nodal_values[nodes[3]] * xi * eta)
    }

    fn boundary_nodes(&self) -> Vec<usize> {
        let [nx, ny] = self.nodes_per_axis;
        (0..self.num_nodes())
            .filter(|&node| {
                let [i, j] = self.node_coords(node);
                i == 0 || i == nx - 1 || j == 0 || j == ny - 1
            })
            .collect()
    }
}

/// Generates a [RectangularGridMesh] covering a bounding box with square
/// elements of a prescribed side length.
///
/// The box is enlarged to the next multiple of the step size so that elements
/// are exact squares.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct RectangularGridMeshGenerator {
    /// Side length of the generated square elements.
    pub step: f64,
}

impl RectangularGridMeshGenerator {
    /// Constructs a generator with the given element side length.
    pub fn new(step: f64) -> Self {
        Self { step }
    }
}

impl MeshGenerator<RectangularGridMesh, 2> for RectangularGridMeshGenerator {
    fn generate(&self, lower: [f64; 2], upper: [f64; 2]) -> Result<RectangularGridMesh, SetupError> {
        if self.step <= 0.0 {
            return Err(SetupError(format!(
                "mesh step size must be positive but is {}",
                self.step
            )));
        }
        let mut elements = [0usize; 2];
        for axis in 0..2 {
            let extent = upper[axis] - lower[axis];
            if extent <= 0.0 {
                return Err(SetupError(format!(
                    "degenerate bounding box: lower {lower:?} upper {upper:?}"
                )));
            }
            elements[axis] = ((extent / self.step).ceil() as usize).max(1);
        }
        let [ex, ey] = elements;
        let nx = ex + 1;
        let element_nodes = iproduct!(0..ey, 0..ex)
            .map(|(j, i)| {
                let node = i + j * nx;
                [node, node + 1, node + nx, node + nx + 1]
            })
            .collect();
        Ok(RectangularGridMesh {
            lower,
            step: self.step,
            nodes_per_axis: [nx, ey + 1],
            element_nodes,
        })
    }
}

/// Iterative Gauss-Seidel solver for reaction-diffusion equations on a
/// [RectangularGridMesh].
///
/// Solves the steady state of
/// $$-D\,\Delta u + \lambda u = f$$
/// with a five-point Laplacian stencil. The previous nodal solution, when
/// available, seeds the iteration. Dirichlet conditions pin the value at the
/// requested boundary nodes; Neumann conditions prescribe the outward normal
/// derivative there. Failure to converge within the iteration budget is a
/// [SolveError], never silently replaced by a stale solution.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct RelaxationFieldSolver {
    /// Upper bound on Gauss-Seidel sweeps per solve.
    pub max_iterations: usize,
    /// Convergence threshold on the maximum nodal update per sweep.
    pub tolerance: f64,
}

impl Default for RelaxationFieldSolver {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            tolerance: 1e-8,
        }
    }
}

impl FieldSolver<RectangularGridMesh, 2> for RelaxationFieldSolver {
    fn solve(
        &mut self,
        mesh: &RectangularGridMesh,
        request: FieldSolveRequest,
    ) -> Result<Vec<f64>, SolveError> {
        let num_nodes = mesh.num_nodes();
        let equation = request.equation;
        let h = mesh.step();
        let diffusion = equation.diffusion_constant / (h * h);
        let diagonal = 4.0 * diffusion + equation.decay_rate;
        if diagonal <= 0.0 {
            return Err(SolveError(format!(
                "singular system for field \"{}\": diffusion {} and decay {}",
                equation.dependent_variable, equation.diffusion_constant, equation.decay_rate
            )));
        }

        // Nodal sources are averaged over the elements adjacent to each node.
        let mut node_sources = DVector::<f64>::zeros(num_nodes);
        let mut adjacent_elements = vec![0usize; num_nodes];
        for (element, source) in request.element_sources.iter().enumerate() {
            let nodes = mesh
                .element_nodes(element)
                .map_err(|e| SolveError(format!("{e}")))?;
            for &node in nodes {
                node_sources[node] += source;
                adjacent_elements[node] += 1;
            }
        }
        for node in 0..num_nodes {
            if adjacent_elements[node] > 0 {
                node_sources[node] /= adjacent_elements[node] as f64;
            }
        }

        let mut is_boundary = vec![false; num_nodes];
        for &node in request.boundary_nodes {
            if node >= num_nodes {
                return Err(SolveError(format!(
                    "boundary node {node} does not exist on a mesh with {num_nodes} nodes"
                )));
            }
            is_boundary[node] = true;
        }

        let mut solution = match request.previous_solution {
            Some(previous) if previous.len() == num_nodes => {
                DVector::from_column_slice(previous)
            }
            _ => DVector::zeros(num_nodes),
        };
        if let FieldBoundaryCondition::Dirichlet(value) = equation.boundary_condition {
            for node in 0..num_nodes {
                if is_boundary[node] {
                    solution[node] = value;
                }
            }
        }

        for _ in 0..self.max_iterations {
            let mut largest_update: f64 = 0.0;
            for node in 0..num_nodes {
                if is_boundary[node] {
                    continue;
                }
                let neighbor_sum: f64 = mesh
                    .node_neighbors(node)
                    .into_iter()
                    .map(|neighbor| solution[neighbor])
                    .sum();
                let updated = (diffusion * neighbor_sum + node_sources[node]) / diagonal;
                largest_update = largest_update.max((updated - solution[node]).abs());
                solution[node] = updated;
            }
            if let FieldBoundaryCondition::Neumann(gradient) = equation.boundary_condition {
                for node in 0..num_nodes {
                    if !is_boundary[node] {
                        continue;
                    }
                    let neighbors = mesh.node_neighbors(node);
                    let interior: Vec<usize> = neighbors
                        .iter()
                        .copied()
                        .filter(|&n| !is_boundary[n])
                        .collect();
                    let reference = if interior.is_empty() {
                        &neighbors
                    } else {
                        &interior
                    };
                    let mean: f64 = reference.iter().map(|&n| solution[n]).sum::<f64>()
                        / reference.len() as f64;
                    let updated = mean + gradient * h;
                    largest_update = largest_update.max((updated - solution[node]).abs());
                    solution[node] = updated;
                }
            }
            if largest_update < self.tolerance {
                return Ok(solution.iter().copied().collect());
            }
        }
        Err(SolveError(format!(
            "field \"{}\" did not converge within {} iterations",
            equation.dependent_variable, self.max_iterations
        )))
    }
}
