use std::collections::HashMap;
use std::error::Error;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::memory_storage::MemoryStorageInterface;
use super::serde_json::JsonStorageInterface;

/// Error related to storing and reading elements
#[derive(Debug)]
pub enum StorageError {
    /// Error related to File Io operations.
    IoError(std::io::Error),
    /// Occurs during parsing of json structs.
    SerdeJsonError(serde_json::Error),
    /// Initialization error for storage backends.
    InitError(String),
    /// Error when parsing file/folder names.
    ParseIntError(std::num::ParseIntError),
    /// A lock over an in-memory storage backend was poisoned.
    PoisonError(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerdeJsonError(err)
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError(err)
    }
}

impl From<std::num::ParseIntError> for StorageError {
    fn from(err: std::num::ParseIntError) -> Self {
        StorageError::ParseIntError(err)
    }
}

impl Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            StorageError::SerdeJsonError(message) => write!(f, "{}", message),
            StorageError::IoError(message) => write!(f, "{}", message),
            StorageError::InitError(message) => write!(f, "{}", message),
            StorageError::ParseIntError(message) => write!(f, "{}", message),
            StorageError::PoisonError(message) => write!(f, "{}", message),
        }
    }
}

impl Error for StorageError {}

/// Define how to store results of the simulation.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum StorageOption {
    /// Save results as [json](https://www.json.org/json-en.html) files.
    SerdeJson,
    /// Keep results in memory only. Mostly useful for testing and analysis scripts.
    Memory,
}

impl StorageOption {
    /// Which storage option should be used by default.
    pub fn default_priority() -> Vec<Self> {
        vec![StorageOption::SerdeJson]
    }
}

/// Define how elements and identifiers are saved when being serialized together.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CombinedSaveFormat<Id, Element> {
    pub(super) identifier: Id,
    pub(super) element: Element,
}

/// Define how batches of elements and identifiers are saved when being serialized.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BatchSaveFormat<Id, Element> {
    pub(super) data: Vec<CombinedSaveFormat<Id, Element>>,
}

/// Used to construct a [StorageManager]
///
/// This builder contains multiple options which can be used to configure the location and type in
/// which results are stored.
///
/// ```
/// use cellular_potts_core::storage::{StorageBuilder, StorageOption};
///
/// let storage_builder = StorageBuilder::new()
///     .priority(StorageOption::default_priority())
///     .location("./out");
/// ```
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StorageBuilder {
    location: std::path::PathBuf,
    priority: Vec<StorageOption>,
    suffix: std::path::PathBuf,
}

impl StorageBuilder {
    /// Constructs a new [StorageBuilder] with default settings.
    pub fn new() -> Self {
        Self {
            location: "./out".into(),
            priority: StorageOption::default_priority(),
            suffix: "".into(),
        }
    }

    /// Define the priority of [StorageOption]. See [StorageOption::default_priority].
    pub fn priority(self, priority: impl IntoIterator<Item = StorageOption>) -> Self {
        let mut unique = Vec::new();
        for option in priority {
            if !unique.contains(&option) {
                unique.push(option);
            }
        }
        Self {
            priority: unique,
            ..self
        }
    }

    /// Get the current priority
    pub fn get_priority(&self) -> Vec<StorageOption> {
        self.priority.clone()
    }

    /// Define a folder where to store results
    pub fn location<P>(self, location: P) -> Self
    where
        std::path::PathBuf: From<P>,
    {
        Self {
            location: location.into(),
            ..self
        }
    }

    /// Get the current storage location
    pub fn get_location(&self) -> std::path::PathBuf {
        self.location.clone()
    }

    /// Define a suffix which will be appended to the save path
    pub fn suffix(self, suffix: impl Into<std::path::PathBuf>) -> Self {
        Self {
            suffix: suffix.into(),
            ..self
        }
    }

    /// Get the current suffix
    pub fn get_suffix(&self) -> std::path::PathBuf {
        self.suffix.clone()
    }

    /// Get the fully constructed path including the suffix.
    pub fn get_full_path(&self) -> std::path::PathBuf {
        let mut full_path = self.location.clone();
        full_path.extend(&self.suffix);
        full_path
    }
}

impl Default for StorageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// This manager handles if multiple storage options have been specified
///
/// It will store elements in every configured backend and load them from the
/// backend with the highest priority.
#[derive(Clone, Debug)]
pub struct StorageManager<Id, Element> {
    storage_priority: Vec<StorageOption>,
    builder: StorageBuilder,
    instance: u64,

    json_storage: Option<JsonStorageInterface<Id, Element>>,
    memory_storage: Option<MemoryStorageInterface<Id, Element>>,
}

impl<Id, Element> StorageManager<Id, Element> {
    /// Constructs the [StorageManager] from the instance identifier
    /// and the settings given by the [StorageBuilder].
    ///
    /// ```
    /// use cellular_potts_core::storage::*;
    /// let builder = StorageBuilder::new().location("/tmp/storage-doctest");
    ///
    /// let manager = StorageManager::<usize, f64>::open_or_create(builder, 0)?;
    /// # Ok::<(), StorageError>(())
    /// ```
    pub fn open_or_create(
        storage_builder: StorageBuilder,
        instance: u64,
    ) -> Result<Self, StorageError> {
        let location = storage_builder.get_full_path();

        let mut json_storage = None;
        let mut memory_storage = None;
        for storage_variant in storage_builder.priority.iter() {
            match storage_variant {
                StorageOption::SerdeJson => {
                    json_storage = Some(JsonStorageInterface::<Id, Element>::open_or_create(
                        &location.join("json"),
                        instance,
                    )?);
                }
                StorageOption::Memory => {
                    memory_storage = Some(MemoryStorageInterface::<Id, Element>::open_or_create(
                        &location.join("memory"),
                        instance,
                    )?);
                }
            }
        }
        Ok(StorageManager {
            storage_priority: storage_builder.priority.clone(),
            builder: storage_builder,
            instance,

            json_storage,
            memory_storage,
        })
    }

    /// Extracts all information given by the [StorageBuilder] when constructing
    pub fn extract_builder(&self) -> StorageBuilder {
        self.builder.clone()
    }

    /// Get the instance of this object.
    ///
    /// These instances should not be overlapping, ie. there should not be two objects existing in
    /// parallel with the same instance number.
    pub fn get_instance(&self) -> u64 {
        self.instance
    }
}

macro_rules! exec_for_all_storage_options(
    (@internal $self:ident, $storage_option:ident, $field:ident, $function:ident, $($args:tt)*) => {
        {
            if let Some($field) = &$self.$field {
                $field.$function($($args)*)
            } else {
                Err(StorageError::InitError(
                    stringify!($storage_option, " storage was not initialized but called").into(),
                ))?
            }
        }
    };
    ($self:ident, $priority:ident, $function:ident, $($args:tt)*) => {
        match $priority {
            StorageOption::SerdeJson => exec_for_all_storage_options!(
                @internal $self, SerdeJson, json_storage, $function, $($args)*),
            StorageOption::Memory => exec_for_all_storage_options!(
                @internal $self, Memory, memory_storage, $function, $($args)*),
        }
    }
);

impl<Id, Element> StorageInterfaceStore<Id, Element> for StorageManager<Id, Element>
where
    Id: Clone + std::hash::Hash + std::cmp::Eq,
    Element: Clone,
{
    fn store_single_element(
        &self,
        iteration: u64,
        identifier: &Id,
        element: &Element,
    ) -> Result<(), StorageError>
    where
        Id: Serialize,
        Element: Serialize,
    {
        if let Some(json_storage) = &self.json_storage {
            json_storage.store_single_element(iteration, identifier, element)?;
        }
        if let Some(memory_storage) = &self.memory_storage {
            memory_storage.store_single_element(iteration, identifier, element)?;
        }
        Ok(())
    }

    fn store_batch_elements<'a, I>(
        &'a self,
        iteration: u64,
        identifiers_elements: I,
    ) -> Result<(), StorageError>
    where
        Id: 'a + Serialize,
        Element: 'a + Serialize,
        I: Clone + IntoIterator<Item = (&'a Id, &'a Element)>,
    {
        if let Some(json_storage) = &self.json_storage {
            json_storage.store_batch_elements(iteration, identifiers_elements.clone())?;
        }
        if let Some(memory_storage) = &self.memory_storage {
            memory_storage.store_batch_elements(iteration, identifiers_elements)?;
        }
        Ok(())
    }
}

impl<Id, Element> StorageInterfaceLoad<Id, Element> for StorageManager<Id, Element>
where
    Id: Clone + std::hash::Hash + std::cmp::Eq,
    Element: Clone,
{
    fn load_single_element(
        &self,
        iteration: u64,
        identifier: &Id,
    ) -> Result<Option<Element>, StorageError>
    where
        Id: Serialize + for<'a> Deserialize<'a>,
        Element: for<'a> Deserialize<'a>,
    {
        for priority in self.storage_priority.iter() {
            return exec_for_all_storage_options!(
                self,
                priority,
                load_single_element,
                iteration,
                identifier
            );
        }
        Ok(None)
    }

    fn load_all_elements_at_iteration(
        &self,
        iteration: u64,
    ) -> Result<HashMap<Id, Element>, StorageError>
    where
        Id: std::hash::Hash + std::cmp::Eq + for<'a> Deserialize<'a>,
        Element: for<'a> Deserialize<'a>,
    {
        for priority in self.storage_priority.iter() {
            return exec_for_all_storage_options!(
                self,
                priority,
                load_all_elements_at_iteration,
                iteration
            );
        }
        Ok(HashMap::new())
    }

    fn get_all_iterations(&self) -> Result<Vec<u64>, StorageError> {
        for priority in self.storage_priority.iter() {
            return exec_for_all_storage_options!(self, priority, get_all_iterations,);
        }
        Ok(Vec::new())
    }
}

/// Open or create a new instance of the Storage controller.
pub trait StorageInterfaceOpen<Id, Element> {
    /// Initializes the current storage device.
    ///
    /// When saving as files such as json, folders might be created.
    fn open_or_create(
        location: &std::path::Path,
        storage_instance: u64,
    ) -> Result<Self, StorageError>
    where
        Self: Sized;
}

/// Handles storing of elements
pub trait StorageInterfaceStore<Id, Element> {
    /// Saves a single element at given iteration.
    fn store_single_element(
        &self,
        iteration: u64,
        identifier: &Id,
        element: &Element,
    ) -> Result<(), StorageError>
    where
        Id: Serialize,
        Element: Serialize;

    /// Stores a batch of multiple elements with identifiers all at the same iteration.
    fn store_batch_elements<'a, I>(
        &'a self,
        iteration: u64,
        identifiers_elements: I,
    ) -> Result<(), StorageError>
    where
        Id: 'a + Serialize,
        Element: 'a + Serialize,
        I: Clone + IntoIterator<Item = (&'a Id, &'a Element)>,
    {
        identifiers_elements
            .into_iter()
            .map(|(id, element)| self.store_single_element(iteration, id, element))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(())
    }
}

/// Handles loading of elements
pub trait StorageInterfaceLoad<Id, Element> {
    /// Loads a single element from the storage solution if the element exists.
    fn load_single_element(
        &self,
        iteration: u64,
        identifier: &Id,
    ) -> Result<Option<Element>, StorageError>
    where
        Id: Serialize + for<'a> Deserialize<'a>,
        Element: for<'a> Deserialize<'a>;

    /// Loads the elements history, meaning every occurrence of the element in the storage.
    fn load_element_history(
        &self,
        identifier: &Id,
    ) -> Result<Option<HashMap<u64, Element>>, StorageError>
    where
        Id: Serialize + for<'a> Deserialize<'a>,
        Element: for<'a> Deserialize<'a>,
    {
        let results = self
            .get_all_iterations()?
            .iter()
            .filter_map(
                |&iteration| match self.load_single_element(iteration, identifier) {
                    Ok(Some(element)) => Some(Ok((iteration, element))),
                    Ok(None) => None,
                    Err(e) => Some(Err(e)),
                },
            )
            .collect::<Result<HashMap<u64, _>, StorageError>>()?;
        Ok(if results.is_empty() {
            None
        } else {
            Some(results)
        })
    }

    /// Gets a snapshot of all elements at a given iteration.
    ///
    /// This function might be useful when implementing how simulations can be restored from saved
    /// results.
    fn load_all_elements_at_iteration(
        &self,
        iteration: u64,
    ) -> Result<HashMap<Id, Element>, StorageError>
    where
        Id: std::hash::Hash + std::cmp::Eq + for<'a> Deserialize<'a>,
        Element: for<'a> Deserialize<'a>;

    /// Get all iteration values which have been saved.
    fn get_all_iterations(&self) -> Result<Vec<u64>, StorageError>;

    /// Loads all elements for every iteration.
    /// This will yield the complete storage and may result in extremely large allocations of
    /// memory.
    fn load_all_elements(&self) -> Result<HashMap<u64, HashMap<Id, Element>>, StorageError>
    where
        Id: std::hash::Hash + std::cmp::Eq + for<'a> Deserialize<'a>,
        Element: for<'a> Deserialize<'a>,
    {
        let iterations = self.get_all_iterations()?;
        let all_elements = iterations
            .iter()
            .map(|iteration| {
                let elements = self.load_all_elements_at_iteration(*iteration)?;
                Ok((*iteration, elements))
            })
            .collect::<Result<HashMap<_, _>, StorageError>>()?;
        Ok(all_elements)
    }

    /// Similarly to the [load_all_elements](StorageInterfaceLoad::load_all_elements) function,
    /// but this function returns all elements as their histories.
    fn load_all_element_histories(&self) -> Result<HashMap<Id, HashMap<u64, Element>>, StorageError>
    where
        Id: std::hash::Hash + std::cmp::Eq + Clone + for<'a> Deserialize<'a>,
        Element: for<'a> Deserialize<'a>,
    {
        let all_elements = self.load_all_elements()?;
        let reordered_elements: HashMap<Id, HashMap<u64, Element>> = all_elements
            .into_iter()
            .flat_map(|(iteration, identifier_to_elements)| {
                identifier_to_elements
                    .into_iter()
                    .map(move |(identifier, element)| (identifier, iteration, element))
            })
            .fold(
                HashMap::new(),
                |mut acc, (identifier, iteration, element)| {
                    let existing_elements: &mut HashMap<u64, Element> =
                        acc.entry(identifier).or_default();
                    existing_elements.insert(iteration, element);
                    acc
                },
            );
        Ok(reordered_elements)
    }
}

/// Provide methods to initialize, store and load single and multiple elements at iterations.
pub trait StorageInterface<Id, Element>:
    StorageInterfaceOpen<Id, Element>
    + StorageInterfaceLoad<Id, Element>
    + StorageInterfaceStore<Id, Element>
{
}

impl<Id, Element, T> StorageInterface<Id, Element> for T
where
    T: StorageInterfaceLoad<Id, Element>,
    T: StorageInterfaceStore<Id, Element>,
    T: StorageInterfaceOpen<Id, Element>,
{
}
