use cellular_potts_concepts::{DivisionError, IndexError, InvalidOperationError, SetupError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Regular lattice of sites together with the element ownership map.
///
/// Sites sit on integer coordinates with unit spacing, numbered row-major with the
/// first axis running fastest. The neighbor topology (von Neumann) is fixed at
/// construction; only the ownership assignment is mutable. Derived geometric
/// quantities (volume, perimeter, centroid) are cached and recomputed by
/// [update](PottsLattice::update) which must be called after any batch of site moves
/// before geometry is read.
///
/// Serialization goes through [LatticeState] which keeps only the shape and the
/// ownership vector; topology and geometry caches are rebuilt on deserialization.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(try_from = "LatticeState", into = "LatticeState")]
pub struct PottsLattice<const D: usize> {
    shape: [usize; D],
    site_positions: Vec<[f64; D]>,
    neighbors: Vec<Vec<usize>>,
    owner: Vec<Option<usize>>,
    elements: BTreeMap<usize, Vec<usize>>,
    next_element_id: usize,

    volumes: BTreeMap<usize, f64>,
    perimeters: BTreeMap<usize, f64>,
    centroids: BTreeMap<usize, [f64; D]>,
}

impl<const D: usize> PottsLattice<D> {
    /// Constructs an empty lattice with the given number of sites along each axis.
    pub fn new(shape: [usize; D]) -> Result<Self, SetupError> {
        if shape.iter().any(|&n| n == 0) {
            return Err(SetupError(format!(
                "every lattice axis needs at least one site, got {:?}",
                shape
            )));
        }
        let n_total: usize = shape.iter().product();
        let mut site_positions = Vec::with_capacity(n_total);
        let mut neighbors = Vec::with_capacity(n_total);
        for site in 0..n_total {
            let coords = Self::site_coords(shape, site);
            let mut position = [0.0; D];
            for axis in 0..D {
                position[axis] = coords[axis] as f64;
            }
            site_positions.push(position);

            let mut site_neighbors = Vec::with_capacity(2 * D);
            for axis in 0..D {
                if coords[axis] > 0 {
                    let mut c = coords;
                    c[axis] -= 1;
                    site_neighbors.push(Self::site_index(shape, c));
                }
                if coords[axis] + 1 < shape[axis] {
                    let mut c = coords;
                    c[axis] += 1;
                    site_neighbors.push(Self::site_index(shape, c));
                }
            }
            site_neighbors.sort_unstable();
            neighbors.push(site_neighbors);
        }
        Ok(Self {
            shape,
            site_positions,
            neighbors,
            owner: vec![None; n_total],
            elements: BTreeMap::new(),
            next_element_id: 0,
            volumes: BTreeMap::new(),
            perimeters: BTreeMap::new(),
            centroids: BTreeMap::new(),
        })
    }

    fn site_coords(shape: [usize; D], site: usize) -> [usize; D] {
        let mut coords = [0; D];
        let mut rest = site;
        for axis in 0..D {
            coords[axis] = rest % shape[axis];
            rest /= shape[axis];
        }
        coords
    }

    fn site_index(shape: [usize; D], coords: [usize; D]) -> usize {
        let mut index = 0;
        let mut stride = 1;
        for axis in 0..D {
            index += coords[axis] * stride;
            stride *= shape[axis];
        }
        index
    }

    /// Number of sites along each axis.
    pub fn shape(&self) -> [usize; D] {
        self.shape
    }

    /// Total number of lattice sites.
    pub fn num_sites(&self) -> usize {
        self.owner.len()
    }

    /// Spatial coordinates of the given site.
    pub fn site_position(&self, site: usize) -> Result<[f64; D], IndexError> {
        self.site_positions
            .get(site)
            .copied()
            .ok_or(IndexError(format!("site {} does not exist", site)))
    }

    /// Neighbor site ids of the given site.
    pub fn neighbor_sites(&self, site: usize) -> Result<&[usize], IndexError> {
        self.neighbors
            .get(site)
            .map(|n| n.as_slice())
            .ok_or(IndexError(format!("site {} does not exist", site)))
    }

    /// Element currently owning the given site, `None` for an unowned site.
    pub fn element_of_site(&self, site: usize) -> Option<usize> {
        self.owner.get(site).copied().flatten()
    }

    /// Ids of all elements, in ascending order.
    pub fn element_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.elements.keys().copied()
    }

    /// Site ids currently assigned to the given element.
    pub fn element_sites(&self, element: usize) -> Result<&[usize], IndexError> {
        self.elements
            .get(&element)
            .map(|sites| sites.as_slice())
            .ok_or(IndexError(format!("element {} does not exist", element)))
    }

    /// Creates a new element from presently unowned sites, returning its id.
    pub fn create_element(&mut self, sites: Vec<usize>) -> Result<usize, InvalidOperationError> {
        if sites.is_empty() {
            return Err(InvalidOperationError(
                "an element cannot be created without sites".to_owned(),
            ));
        }
        for &site in sites.iter() {
            match self.owner.get(site) {
                Some(None) => (),
                Some(Some(owner)) => {
                    return Err(InvalidOperationError(format!(
                        "site {} is already owned by element {}",
                        site, owner
                    )))
                }
                None => {
                    return Err(InvalidOperationError(format!(
                        "site {} does not exist",
                        site
                    )))
                }
            }
        }
        let id = self.next_element_id;
        self.next_element_id += 1;
        for &site in sites.iter() {
            self.owner[site] = Some(id);
        }
        let mut sites = sites;
        sites.sort_unstable();
        self.elements.insert(id, sites);
        Ok(id)
    }

    /// Removes an element, vacating all of its sites. Returns the freed site ids.
    pub fn remove_element(&mut self, element: usize) -> Result<Vec<usize>, InvalidOperationError> {
        let sites = self.elements.remove(&element).ok_or(InvalidOperationError(
            format!("cannot remove unknown element {}", element),
        ))?;
        for &site in sites.iter() {
            self.owner[site] = None;
        }
        self.volumes.remove(&element);
        self.perimeters.remove(&element);
        self.centroids.remove(&element);
        Ok(sites)
    }

    /// Reassigns ownership of a single site.
    ///
    /// The site must be adjacent to the target element's current boundary; long-range
    /// transfer of ownership is an [InvalidOperationError]. Passing `new_owner = None`
    /// vacates the site. Reassigning a site to its current owner is a no-op.
    pub fn move_site_to_element(
        &mut self,
        site: usize,
        new_owner: Option<usize>,
    ) -> Result<(), InvalidOperationError> {
        let current = *self
            .owner
            .get(site)
            .ok_or(InvalidOperationError(format!("site {} does not exist", site)))?;
        if current == new_owner {
            return Ok(());
        }
        if let Some(target) = new_owner {
            if !self.elements.contains_key(&target) {
                return Err(InvalidOperationError(format!(
                    "cannot move site {} to unknown element {}",
                    site, target
                )));
            }
            let adjacent = self.neighbors[site]
                .iter()
                .any(|&neighbor| self.owner[neighbor] == Some(target));
            if !adjacent {
                return Err(InvalidOperationError(format!(
                    "site {} is not adjacent to the boundary of element {}",
                    site, target
                )));
            }
        }
        if let Some(old) = current {
            if let Some(sites) = self.elements.get_mut(&old) {
                sites.retain(|&s| s != site);
            }
        }
        self.owner[site] = new_owner;
        if let Some(target) = new_owner {
            if let Some(sites) = self.elements.get_mut(&target) {
                let position = sites.partition_point(|&s| s < site);
                sites.insert(position, site);
            }
        }
        Ok(())
    }

    /// Recomputes the cached volumes, perimeters and centroids of all elements.
    ///
    /// Must be called after a batch of site moves and before geometry is read; rules
    /// and modifiers would otherwise operate on stale data.
    pub fn update(&mut self) {
        self.volumes.clear();
        self.perimeters.clear();
        self.centroids.clear();
        for (&element, sites) in self.elements.iter() {
            self.volumes.insert(element, sites.len() as f64);

            // Boundary site pairs: neighbor links leaving the element.
            let mut perimeter = 0;
            let mut centroid = [0.0; D];
            for &site in sites.iter() {
                perimeter += self.neighbors[site]
                    .iter()
                    .filter(|&&neighbor| self.owner[neighbor] != Some(element))
                    .count();
                for axis in 0..D {
                    centroid[axis] += self.site_positions[site][axis];
                }
            }
            self.perimeters.insert(element, perimeter as f64);
            if !sites.is_empty() {
                for value in centroid.iter_mut() {
                    *value /= sites.len() as f64;
                }
            }
            self.centroids.insert(element, centroid);
        }
    }

    /// Current volume (site count) of the given element.
    pub fn element_volume(&self, element: usize) -> Result<f64, IndexError> {
        self.volumes.get(&element).copied().ok_or(IndexError(format!(
            "no volume cached for element {}; was update() called?",
            element
        )))
    }

    /// Current perimeter (boundary site pairs) of the given element.
    pub fn element_perimeter(&self, element: usize) -> Result<f64, IndexError> {
        self.perimeters
            .get(&element)
            .copied()
            .ok_or(IndexError(format!(
                "no perimeter cached for element {}; was update() called?",
                element
            )))
    }

    /// Current centroid of the given element.
    pub fn element_centroid(&self, element: usize) -> Result<[f64; D], IndexError> {
        self.centroids
            .get(&element)
            .copied()
            .ok_or(IndexError(format!(
                "no centroid cached for element {}; was update() called?",
                element
            )))
    }

    /// Lower and upper corner of the axis-aligned bounding box of all owned sites.
    /// Falls back to the full lattice box when no site is owned.
    pub fn bounding_box(&self) -> ([f64; D], [f64; D]) {
        let mut lower = [f64::INFINITY; D];
        let mut upper = [f64::NEG_INFINITY; D];
        let mut any = false;
        for (site, owner) in self.owner.iter().enumerate() {
            if owner.is_some() {
                any = true;
                for axis in 0..D {
                    lower[axis] = lower[axis].min(self.site_positions[site][axis]);
                    upper[axis] = upper[axis].max(self.site_positions[site][axis]);
                }
            }
        }
        if !any {
            lower = [0.0; D];
            for axis in 0..D {
                upper[axis] = (self.shape[axis] - 1) as f64;
            }
        }
        (lower, upper)
    }

    /// Total number of sites currently owned by any element.
    pub fn total_owned_sites(&self) -> usize {
        self.owner.iter().filter(|owner| owner.is_some()).count()
    }

    /// Splits off roughly half of an element's sites into a newly created element.
    ///
    /// The partition is deterministic: sites are ordered along the axis of largest
    /// spatial extent (ties broken towards the lower axis, then by site index) and the
    /// upper half becomes the daughter element. Returns the daughter's element id.
    pub fn divide_element(&mut self, element: usize) -> Result<usize, DivisionError> {
        let sites = self
            .elements
            .get(&element)
            .ok_or(DivisionError(format!(
                "cannot divide unknown element {}",
                element
            )))?
            .clone();
        if sites.len() < 2 {
            return Err(DivisionError(format!(
                "element {} has only {} site(s) and cannot be divided",
                element,
                sites.len()
            )));
        }

        let mut split_axis = 0;
        let mut largest_extent = f64::NEG_INFINITY;
        for axis in 0..D {
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            for &site in sites.iter() {
                min = min.min(self.site_positions[site][axis]);
                max = max.max(self.site_positions[site][axis]);
            }
            if max - min > largest_extent {
                largest_extent = max - min;
                split_axis = axis;
            }
        }

        let mut ordered = sites;
        ordered.sort_by(|&a, &b| {
            self.site_positions[a][split_axis]
                .partial_cmp(&self.site_positions[b][split_axis])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        let daughter_sites = ordered.split_off(ordered.len() - ordered.len() / 2);

        let parent_sites = {
            let mut parent_sites = ordered;
            parent_sites.sort_unstable();
            parent_sites
        };
        let daughter = self.next_element_id;
        self.next_element_id += 1;
        for &site in daughter_sites.iter() {
            self.owner[site] = Some(daughter);
        }
        let mut daughter_sites = daughter_sites;
        daughter_sites.sort_unstable();
        self.elements.insert(daughter, daughter_sites);
        self.elements.insert(element, parent_sites);
        Ok(daughter)
    }
}

/// Serialized form of a [PottsLattice]: the lattice shape and site ownership.
///
/// Neighbor topology, element site lists and geometry caches are derived data and
/// rebuilt when converting back.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LatticeState {
    /// Number of sites along each axis.
    pub shape: Vec<usize>,
    /// Owning element per site, `None` for unowned sites.
    pub owner: Vec<Option<usize>>,
    /// Next element id to be handed out.
    pub next_element_id: usize,
}

impl<const D: usize> From<PottsLattice<D>> for LatticeState {
    fn from(lattice: PottsLattice<D>) -> Self {
        LatticeState {
            shape: lattice.shape.to_vec(),
            owner: lattice.owner,
            next_element_id: lattice.next_element_id,
        }
    }
}

impl<const D: usize> TryFrom<LatticeState> for PottsLattice<D> {
    type Error = SetupError;

    fn try_from(state: LatticeState) -> Result<Self, SetupError> {
        let shape: [usize; D] = state.shape.clone().try_into().map_err(|_| {
            SetupError(format!(
                "serialized lattice has {} axes but {} were expected",
                state.shape.len(),
                D
            ))
        })?;
        let mut lattice = PottsLattice::new(shape)?;
        if state.owner.len() != lattice.num_sites() {
            return Err(SetupError(format!(
                "serialized ownership covers {} sites but the lattice has {}",
                state.owner.len(),
                lattice.num_sites()
            )));
        }
        for (site, owner) in state.owner.iter().enumerate() {
            if let Some(element) = owner {
                lattice.elements.entry(*element).or_default().push(site);
            }
        }
        lattice.owner = state.owner;
        lattice.next_element_id = state.next_element_id;
        lattice.update();
        Ok(lattice)
    }
}

/// Constructs a [PottsLattice] pre-populated with a rectangular block arrangement of
/// elements, the usual starting condition for Potts simulations.
///
/// `elements_shape` blocks of `element_shape` sites each are laid out starting at
/// `offset`, one element per block.
#[derive(Clone, Debug)]
pub struct PottsLatticeGenerator<const D: usize> {
    /// Number of lattice sites along each axis.
    pub lattice_shape: [usize; D],
    /// Number of initial elements along each axis.
    pub elements_shape: [usize; D],
    /// Number of sites per element along each axis.
    pub element_shape: [usize; D],
    /// Lower corner at which the block arrangement starts.
    pub offset: [usize; D],
}

impl<const D: usize> PottsLatticeGenerator<D> {
    /// Builds the lattice and its initial elements.
    ///
    /// Returns the lattice and the element ids in generation order (first axis
    /// running fastest).
    pub fn generate(&self) -> Result<(PottsLattice<D>, Vec<usize>), SetupError> {
        for axis in 0..D {
            let needed = self.offset[axis] + self.elements_shape[axis] * self.element_shape[axis];
            if needed > self.lattice_shape[axis] {
                return Err(SetupError(format!(
                    "element arrangement needs {} sites along axis {} but the lattice has {}",
                    needed, axis, self.lattice_shape[axis]
                )));
            }
            if self.element_shape[axis] == 0 {
                return Err(SetupError(format!(
                    "elements need at least one site along axis {}",
                    axis
                )));
            }
        }
        let mut lattice = PottsLattice::new(self.lattice_shape)?;
        let n_elements: usize = self.elements_shape.iter().product();
        let mut element_ids = Vec::with_capacity(n_elements);
        for element_index in 0..n_elements {
            let block = PottsLattice::site_coords(self.elements_shape, element_index);
            let sites_per_element: usize = self.element_shape.iter().product();
            let mut sites = Vec::with_capacity(sites_per_element);
            for local in 0..sites_per_element {
                let within = PottsLattice::site_coords(self.element_shape, local);
                let mut coords = [0; D];
                for axis in 0..D {
                    coords[axis] =
                        self.offset[axis] + block[axis] * self.element_shape[axis] + within[axis];
                }
                sites.push(PottsLattice::site_index(self.lattice_shape, coords));
            }
            let id = lattice
                .create_element(sites)
                .map_err(|e| SetupError(format!("{}", e)))?;
            element_ids.push(id);
        }
        lattice.update();
        Ok((lattice, element_ids))
    }
}

#[cfg(test)]
mod test_population {
    use super::*;

    fn four_elements_on_6x6() -> (PottsLattice<2>, Vec<usize>) {
        PottsLatticeGenerator {
            lattice_shape: [6, 6],
            elements_shape: [2, 2],
            element_shape: [2, 2],
            offset: [1, 1],
        }
        .generate()
        .unwrap()
    }

    #[test]
    fn generator_assigns_blocks() {
        let (lattice, elements) = four_elements_on_6x6();
        assert_eq!(4, elements.len());
        assert_eq!(16, lattice.total_owned_sites());
        for &element in elements.iter() {
            assert_eq!(4.0, lattice.element_volume(element).unwrap());
            assert_eq!(8.0, lattice.element_perimeter(element).unwrap());
        }
        // First element occupies sites (1,1), (2,1), (1,2), (2,2).
        assert_eq!([1.5, 1.5], lattice.element_centroid(elements[0]).unwrap());
        assert_eq!(Some(elements[0]), lattice.element_of_site(1 + 6));
        assert_eq!(None, lattice.element_of_site(0));
    }

    #[test]
    fn neighbor_topology_is_von_neumann() {
        let lattice = PottsLattice::<2>::new([3, 3]).unwrap();
        // Center site 4 has four neighbors, corner site 0 has two.
        assert_eq!(vec![1, 3, 5, 7], lattice.neighbor_sites(4).unwrap());
        assert_eq!(vec![1, 3], lattice.neighbor_sites(0).unwrap());
        assert!(lattice.neighbor_sites(9).is_err());
    }

    #[test]
    fn moves_require_adjacency() {
        let (mut lattice, elements) = four_elements_on_6x6();
        // Site (0,1) touches element 0 at (1,1).
        lattice.move_site_to_element(6, Some(elements[0])).unwrap();
        assert_eq!(Some(elements[0]), lattice.element_of_site(6));
        // Site (5,5) touches nothing owned.
        assert!(lattice
            .move_site_to_element(5 + 5 * 6, Some(elements[0]))
            .is_err());
        // Vacating is always permitted.
        lattice.move_site_to_element(6, None).unwrap();
        assert_eq!(None, lattice.element_of_site(6));
    }

    #[test]
    fn noop_move_changes_nothing() {
        let (mut lattice, elements) = four_elements_on_6x6();
        let before = lattice.element_sites(elements[1]).unwrap().to_vec();
        lattice
            .move_site_to_element(before[0], Some(elements[1]))
            .unwrap();
        assert_eq!(before, lattice.element_sites(elements[1]).unwrap());
    }

    #[test]
    fn update_refreshes_geometry() {
        let (mut lattice, elements) = four_elements_on_6x6();
        lattice.move_site_to_element(6, Some(elements[0])).unwrap();
        // Geometry is stale until update() runs.
        assert_eq!(4.0, lattice.element_volume(elements[0]).unwrap());
        lattice.update();
        assert_eq!(5.0, lattice.element_volume(elements[0]).unwrap());
    }

    #[test]
    fn division_conserves_sites() {
        let (mut lattice, elements) = four_elements_on_6x6();
        let parent_sites = lattice.element_sites(elements[0]).unwrap().to_vec();
        let daughter = lattice.divide_element(elements[0]).unwrap();
        let kept = lattice.element_sites(elements[0]).unwrap().to_vec();
        let moved = lattice.element_sites(daughter).unwrap().to_vec();
        assert_eq!(parent_sites.len(), kept.len() + moved.len());
        for site in moved.iter() {
            assert!(parent_sites.contains(site));
            assert_eq!(Some(daughter), lattice.element_of_site(*site));
        }
        assert_eq!(16, lattice.total_owned_sites());
    }

    #[test]
    fn serde_roundtrip_rebuilds_topology() {
        let (mut lattice, elements) = four_elements_on_6x6();
        lattice.move_site_to_element(6, Some(elements[0])).unwrap();
        lattice.update();
        let json = serde_json::to_string(&lattice).unwrap();
        let restored: PottsLattice<2> = serde_json::from_str(&json).unwrap();
        assert_eq!(lattice.shape(), restored.shape());
        for element in elements {
            assert_eq!(
                lattice.element_sites(element).unwrap(),
                restored.element_sites(element).unwrap()
            );
            assert_eq!(
                lattice.element_centroid(element).unwrap(),
                restored.element_centroid(element).unwrap()
            );
        }
    }

    #[test]
    fn division_needs_two_sites() {
        let mut lattice = PottsLattice::<2>::new([3, 3]).unwrap();
        let element = lattice.create_element(vec![4]).unwrap();
        assert!(lattice.divide_element(element).is_err());
    }
}
