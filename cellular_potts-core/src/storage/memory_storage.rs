use super::concepts::StorageError;
use super::concepts::{StorageInterfaceLoad, StorageInterfaceOpen, StorageInterfaceStore};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use std::collections::{BTreeMap, HashMap};

/// Keep elements in memory instead of writing them to disk.
///
/// Cloning this interface yields a handle to the same underlying map.
#[derive(Clone, Debug)]
pub struct MemoryStorageInterface<Id, Element> {
    map: Arc<Mutex<BTreeMap<u64, HashMap<Id, Element>>>>,
}

impl<Id, Element> MemoryStorageInterface<Id, Element> {
    fn lock(&self) -> Result<MutexGuard<BTreeMap<u64, HashMap<Id, Element>>>, StorageError> {
        self.map
            .lock()
            .map_err(|e| StorageError::PoisonError(format!("{e}")))
    }
}

impl<Id, Element> StorageInterfaceOpen<Id, Element> for MemoryStorageInterface<Id, Element> {
    fn open_or_create(
        _location: &std::path::Path,
        _storage_instance: u64,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            map: Arc::new(Mutex::new(BTreeMap::new())),
        })
    }
}

impl<Id, Element> StorageInterfaceStore<Id, Element> for MemoryStorageInterface<Id, Element>
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
        self.lock()?
            .entry(iteration)
            .or_default()
            .insert(identifier.clone(), element.clone());
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
        self.lock()?.entry(iteration).or_default().extend(
            identifiers_elements
                .into_iter()
                .map(|(id, el)| (id.clone(), el.clone())),
        );
        Ok(())
    }
}

impl<Id, Element> StorageInterfaceLoad<Id, Element> for MemoryStorageInterface<Id, Element>
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
        Ok(self
            .lock()?
            .get(&iteration)
            .and_then(|elements| elements.get(identifier).cloned()))
    }

    fn load_all_elements_at_iteration(
        &self,
        iteration: u64,
    ) -> Result<HashMap<Id, Element>, StorageError>
    where
        Id: std::hash::Hash + std::cmp::Eq + for<'a> Deserialize<'a>,
        Element: for<'a> Deserialize<'a>,
    {
        match self.lock()?.get(&iteration) {
            Some(x) => Ok(x.clone()),
            None => Ok(HashMap::new()),
        }
    }

    fn get_all_iterations(&self) -> Result<Vec<u64>, StorageError> {
        Ok(self.lock()?.keys().copied().collect())
    }
}

#[cfg(test)]
mod test_memory_storage {
    use super::*;

    #[test]
    fn clones_share_backing_map() {
        let storage = MemoryStorageInterface::<usize, i32>::open_or_create(
            std::path::Path::new("unused"),
            0,
        )
        .unwrap();
        let clone = storage.clone();
        storage.store_single_element(3, &7, &-1).unwrap();
        assert_eq!(Some(-1), clone.load_single_element(3, &7).unwrap());
        assert_eq!(vec![3], clone.get_all_iterations().unwrap());
    }
}
