use super::concepts::StorageError;
use super::concepts::{
    BatchSaveFormat, CombinedSaveFormat, StorageInterfaceLoad, StorageInterfaceOpen,
    StorageInterfaceStore,
};
use serde::{Deserialize, Serialize};

use core::marker::PhantomData;
use std::collections::HashMap;

/// Save elements as json files with [serde_json].
///
/// Each iteration gets its own folder named by the zero-padded iteration number
/// which contains one json file per stored batch or single element.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct JsonStorageInterface<Id, Element> {
    /// Storage path.
    pub path: std::path::PathBuf,
    storage_instance: u64,
    phantom_id: PhantomData<Id>,
    phantom_element: PhantomData<Element>,
}

impl<Id, Element> JsonStorageInterface<Id, Element> {
    fn create_or_get_iteration_file_with_prefix(
        &self,
        iteration: u64,
        prefix: &str,
    ) -> Result<std::io::BufWriter<std::fs::File>, StorageError> {
        let save_path = self.get_iteration_save_path_with_prefix(iteration, prefix)?;

        // Open+Create a file and wrap it inside a buffer writer
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&save_path)?;

        Ok(std::io::BufWriter::new(file))
    }

    fn get_iteration_path(&self, iteration: u64) -> std::path::PathBuf {
        self.path.join(format!("{:020.0}", iteration))
    }

    fn get_iteration_save_path_with_prefix(
        &self,
        iteration: u64,
        prefix: &str,
    ) -> Result<std::path::PathBuf, StorageError> {
        let iteration_path = self.get_iteration_path(iteration);
        std::fs::create_dir_all(&iteration_path)?;

        let save_path = iteration_path
            .join(format!("{}_{:020.0}", prefix, self.storage_instance))
            .with_extension("json");
        Ok(save_path)
    }

    fn folder_name_to_iteration(
        &self,
        file: &std::path::Path,
    ) -> Result<Option<u64>, StorageError> {
        match file.file_stem() {
            Some(filename) => match filename.to_str() {
                Some(filename_string) => Ok(Some(filename_string.parse::<u64>()?)),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    fn read_batches_at_iteration(
        &self,
        iteration: u64,
    ) -> Result<Vec<BatchSaveFormat<Id, Element>>, StorageError>
    where
        Id: for<'a> Deserialize<'a>,
        Element: for<'a> Deserialize<'a>,
    {
        let mut batches = Vec::new();
        let iteration_path = self.get_iteration_path(iteration);
        for path in std::fs::read_dir(&iteration_path)? {
            let p = path?.path();
            let file = std::fs::OpenOptions::new().read(true).open(&p)?;
            let stem = p.file_stem().and_then(|stem| stem.to_str());
            match stem.and_then(|tail| tail.split('_').next()) {
                Some("batch") => {
                    let batch: BatchSaveFormat<Id, Element> = serde_json::from_reader(file)?;
                    batches.push(batch);
                }
                Some("single") => {
                    let single: CombinedSaveFormat<Id, Element> = serde_json::from_reader(file)?;
                    batches.push(BatchSaveFormat { data: vec![single] });
                }
                _ => (),
            }
        }
        Ok(batches)
    }
}

impl<Id, Element> StorageInterfaceOpen<Id, Element> for JsonStorageInterface<Id, Element> {
    fn open_or_create(
        location: &std::path::Path,
        storage_instance: u64,
    ) -> Result<Self, StorageError>
    where
        Self: Sized,
    {
        if !location.is_dir() {
            std::fs::create_dir_all(location)?;
        }
        Ok(JsonStorageInterface {
            path: location.into(),
            storage_instance,
            phantom_id: PhantomData,
            phantom_element: PhantomData,
        })
    }
}

impl<Id, Element> StorageInterfaceStore<Id, Element> for JsonStorageInterface<Id, Element> {
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
        let iteration_file = self.create_or_get_iteration_file_with_prefix(iteration, "single")?;
        let save_format = CombinedSaveFormat {
            identifier,
            element,
        };
        serde_json::to_writer_pretty(iteration_file, &save_format)?;
        Ok(())
    }

    fn store_batch_elements<'a, I>(
        &self,
        iteration: u64,
        identifiers_elements: I,
    ) -> Result<(), StorageError>
    where
        Id: 'a + Serialize,
        Element: 'a + Serialize,
        I: Clone + IntoIterator<Item = (&'a Id, &'a Element)>,
    {
        let iteration_file = self.create_or_get_iteration_file_with_prefix(iteration, "batch")?;
        let batch = BatchSaveFormat {
            data: identifiers_elements
                .into_iter()
                .map(|(id, element)| CombinedSaveFormat {
                    identifier: id,
                    element,
                })
                .collect(),
        };
        serde_json::to_writer_pretty(iteration_file, &batch)?;
        Ok(())
    }
}

impl<Id, Element> StorageInterfaceLoad<Id, Element> for JsonStorageInterface<Id, Element> {
    fn load_single_element(
        &self,
        iteration: u64,
        identifier: &Id,
    ) -> Result<Option<Element>, StorageError>
    where
        Id: Serialize + for<'a> Deserialize<'a>,
        Element: for<'a> Deserialize<'a>,
    {
        if !self.get_all_iterations()?.contains(&iteration) {
            return Ok(None);
        }
        // Compare identifiers in their serialized form since we do not
        // require Id: PartialEq here.
        let id_wanted = serde_json::to_string(identifier)?;
        for batch in self.read_batches_at_iteration(iteration)? {
            for save_format in batch.data.into_iter() {
                let id_found = serde_json::to_string(&save_format.identifier)?;
                if id_found == id_wanted {
                    return Ok(Some(save_format.element));
                }
            }
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
        if !self.get_all_iterations()?.contains(&iteration) {
            return Ok(HashMap::new());
        }
        let mut all_elements_at_iteration = HashMap::new();
        for batch in self.read_batches_at_iteration(iteration)? {
            all_elements_at_iteration.extend(
                batch
                    .data
                    .into_iter()
                    .map(|save_format| (save_format.identifier, save_format.element)),
            );
        }
        Ok(all_elements_at_iteration)
    }

    fn get_all_iterations(&self) -> Result<Vec<u64>, StorageError> {
        let paths = std::fs::read_dir(&self.path)?;
        let mut iterations = paths
            .into_iter()
            .filter_map(|path| match path {
                Ok(p) => match self.folder_name_to_iteration(&p.path()) {
                    Ok(Some(entry)) => Some(Ok(entry)),
                    Ok(None) => None,
                    Err(e) => Some(Err(e)),
                },
                Err(_) => None,
            })
            .collect::<Result<Vec<_>, _>>()?;
        iterations.sort_unstable();
        Ok(iterations)
    }
}

#[cfg(test)]
mod test_json_storage {
    use super::*;

    #[test]
    fn store_and_load_batches() {
        let dir = tempfile::tempdir().unwrap();
        let storage =
            JsonStorageInterface::<usize, f64>::open_or_create(dir.path(), 0).unwrap();
        let elements = vec![(1_usize, 10.0_f64), (2, 20.0), (3, 30.0)];
        storage
            .store_batch_elements(50, elements.iter().map(|(id, el)| (id, el)))
            .unwrap();

        assert_eq!(vec![50], storage.get_all_iterations().unwrap());
        let loaded = storage.load_all_elements_at_iteration(50).unwrap();
        assert_eq!(3, loaded.len());
        assert_eq!(Some(&20.0), loaded.get(&2));
        assert_eq!(Some(30.0), storage.load_single_element(50, &3).unwrap());
        assert_eq!(None, storage.load_single_element(50, &4).unwrap());
    }

    #[test]
    fn iterations_are_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let storage =
            JsonStorageInterface::<usize, String>::open_or_create(dir.path(), 0).unwrap();
        for iteration in [30_u64, 10, 20] {
            storage
                .store_single_element(iteration, &0, &format!("it{iteration}"))
                .unwrap();
        }
        assert_eq!(vec![10, 20, 30], storage.get_all_iterations().unwrap());
        let history = storage.load_element_history(&0).unwrap().unwrap();
        assert_eq!(Some(&"it20".to_owned()), history.get(&20));
    }
}
