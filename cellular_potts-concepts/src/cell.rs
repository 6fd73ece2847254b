use crate::errors::DataNotFoundError;

use serde::{Deserialize, Serialize};

/// Unique identifier which is given to every cell in the simulation
///
/// Cells placed during the initial setup are numbered consecutively.
/// Cells created by division carry a process-wide division counter so that
/// identifiers remain unique and reproducible over the course of the simulation.
#[derive(Clone, Copy, Debug, Deserialize, Hash, PartialEq, Eq, Ord, PartialOrd, Serialize)]
pub enum CellIdentifier {
    /// Initially placed inside the simulation
    Initial(usize),
    /// Produced from a division process
    Division(u64),
}

/// Specifies how to retrieve a unique identifier of an object.
pub trait Id {
    /// The identifier type is usually chosen to be completely unique and repeatable across
    /// different simulations.
    type Identifier;

    /// Retrieves the Identifier from the object.
    fn get_id(&self) -> Self::Identifier;
    /// Returns a reference to the id of the object.
    fn ref_id(&self) -> &Self::Identifier;
}

/// Key-value numeric store attached to every cell.
///
/// Modifiers communicate through this store: a growth modifier writes
/// `"target volume"`, a field-coupling modifier writes the concentration of its
/// dependent variable under the field's name, and so on. Reading a key which no
/// modifier has written is a [DataNotFoundError] since downstream consumers
/// assume presence.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct CellData(std::collections::BTreeMap<String, f64>);

impl CellData {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieves the value stored under `key`.
    pub fn get_item(&self, key: &str) -> Result<f64, DataNotFoundError> {
        self.0.get(key).copied().ok_or(DataNotFoundError(format!(
            "cell-data key \"{}\" was never written",
            key
        )))
    }

    /// Retrieves the value stored under `key` or the given default if absent.
    pub fn get_item_or(&self, key: &str, default: f64) -> f64 {
        self.0.get(key).copied().unwrap_or(default)
    }

    /// Stores `value` under `key`, overwriting any previous value.
    pub fn set_item(&mut self, key: impl Into<String>, value: f64) {
        self.0.insert(key.into(), value);
    }

    /// Returns whether a value has been stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

/// Records when a cell entered apoptosis and how long its death program takes.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct ApoptosisInfo {
    /// Simulation time at which apoptosis began.
    pub started_at: f64,
    /// Duration of the death program. Once elapsed the cell is removed.
    pub duration: f64,
}

/// Mutation and property tags of a cell.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct CellProperties {
    /// Whether the cell carries a label (used e.g. by differential adhesion).
    pub labelled: bool,
    /// Set once the cell has entered apoptosis.
    pub apoptosis: Option<ApoptosisInfo>,
}

/// Wrapper around the user-defined cell-cycle model
///
/// This wrapper provides a unique identifier, the optional parent of the cell,
/// its birth time, the [CellData] store and the [CellProperties] tag set.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CellBox<C> {
    /// Unique identifier of this cell.
    pub identifier: CellIdentifier,
    /// Identifier of the parent cell if this cell was created by cell-division
    pub parent: Option<CellIdentifier>,
    /// Simulation time at which the cell was created.
    pub birth_time: f64,
    /// Per-cell key-value store used for inter-modifier communication.
    pub data: CellData,
    /// Mutation/property tag set.
    pub properties: CellProperties,
    /// The cell-cycle model which is encapsulated by this box.
    pub cell: C,
}

impl<C> Id for CellBox<C> {
    type Identifier = CellIdentifier;

    fn get_id(&self) -> CellIdentifier {
        self.identifier
    }

    fn ref_id(&self) -> &CellIdentifier {
        &self.identifier
    }
}

impl<C> core::ops::Deref for CellBox<C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        &self.cell
    }
}

impl<C> core::ops::DerefMut for CellBox<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.cell
    }
}

impl<C> CellBox<C> {
    /// Create a new [CellBox] for a cell present initially in the simulation.
    pub fn new_initial(n_cell: usize, cell: C) -> CellBox<C> {
        CellBox {
            identifier: CellIdentifier::Initial(n_cell),
            parent: None,
            birth_time: 0.0,
            data: CellData::new(),
            properties: CellProperties::default(),
            cell,
        }
    }

    /// Simple method to retrieve the [CellIdentifier] of the parent cell if existing.
    pub fn get_parent_id(&self) -> Option<CellIdentifier> {
        self.parent
    }

    /// Age of the cell, measured from its birth time.
    pub fn age(&self, time: f64) -> f64 {
        time - self.birth_time
    }

    /// Marks the cell as apoptotic. Subsequent calls keep the original onset time.
    pub fn start_apoptosis(&mut self, time: f64, duration: f64) {
        if self.properties.apoptosis.is_none() {
            self.properties.apoptosis = Some(ApoptosisInfo {
                started_at: time,
                duration,
            });
        }
    }
}
