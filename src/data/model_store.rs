//! Trained model persistence
//!
//! One artifact per model-type name; saving again replaces it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::model::GradientBoostedRegressor;
use crate::{Result, StatError};

/// Storage for trained ensemble models keyed by model type
pub trait ModelStore {
    fn save(&mut self, model_type: &str, model: &GradientBoostedRegressor) -> Result<()>;

    /// # Errors
    /// `ModelNotFound` when nothing has been saved under `model_type`.
    fn load(&self, model_type: &str) -> Result<GradientBoostedRegressor>;

    fn contains(&self, model_type: &str) -> bool;
}

/// JSON files under a directory, one `<model_type>.json` per model
#[derive(Debug, Clone)]
pub struct FileModelStore {
    dir: PathBuf,
}

impl FileModelStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(FileModelStore { dir })
    }

    pub fn path_for(&self, model_type: &str) -> Result<PathBuf> {
        validate_name(model_type)?;
        Ok(self.dir.join(format!("{}.json", model_type)))
    }
}

impl ModelStore for FileModelStore {
    fn save(&mut self, model_type: &str, model: &GradientBoostedRegressor) -> Result<()> {
        let path = self.path_for(model_type)?;
        let tmp = path.with_extension("json.tmp");

        let content = serde_json::to_vec(model)?;
        std::fs::write(&tmp, content)?;
        // Rename so readers never observe a half-written file
        std::fs::rename(&tmp, &path)?;

        log::info!("Saved model '{}' to {}", model_type, path.display());
        Ok(())
    }

    fn load(&self, model_type: &str) -> Result<GradientBoostedRegressor> {
        let path = self.path_for(model_type)?;
        let content = match std::fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StatError::ModelNotFound(model_type.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let model = serde_json::from_slice(&content)?;
        log::debug!("Loaded model '{}' from {}", model_type, path.display());
        Ok(model)
    }

    fn contains(&self, model_type: &str) -> bool {
        self.path_for(model_type)
            .map(|p| p.exists())
            .unwrap_or(false)
    }
}

/// Model types become file names, so keep them to a safe alphabet
fn validate_name(model_type: &str) -> Result<()> {
    let ok = !model_type.is_empty()
        && model_type
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !model_type.starts_with('.');
    if ok {
        Ok(())
    } else {
        Err(StatError::InvalidInput(format!(
            "invalid model type name '{}'",
            model_type
        )))
    }
}

/// Process-local store, mainly for tests
#[derive(Debug, Default)]
pub struct InMemoryModelStore {
    models: HashMap<String, GradientBoostedRegressor>,
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl ModelStore for InMemoryModelStore {
    fn save(&mut self, model_type: &str, model: &GradientBoostedRegressor) -> Result<()> {
        self.models.insert(model_type.to_string(), model.clone());
        Ok(())
    }

    fn load(&self, model_type: &str) -> Result<GradientBoostedRegressor> {
        self.models
            .get(model_type)
            .cloned()
            .ok_or_else(|| StatError::ModelNotFound(model_type.to_string()))
    }

    fn contains(&self, model_type: &str) -> bool {
        self.models.contains_key(model_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BoosterParams;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tiny_model(offset: f64) -> GradientBoostedRegressor {
        let features = vec![vec![1.0], vec![2.0], vec![3.0]];
        let targets = vec![offset, offset + 1.0, offset + 2.0];
        let params = BoosterParams {
            n_estimators: 5,
            ..BoosterParams::default()
        };
        GradientBoostedRegressor::fit(&features, &targets, &params, &mut StdRng::seed_from_u64(1))
            .unwrap()
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileModelStore::open(dir.path().join("models")).unwrap();
        let model = tiny_model(0.0);

        assert!(!store.contains("xgb"));
        store.save("xgb", &model).unwrap();
        assert!(store.contains("xgb"));

        let loaded = store.load("xgb").unwrap();
        assert!((loaded.predict(&[2.0]) - model.predict(&[2.0])).abs() < 1e-9);
        assert!(!dir.path().join("models").join("xgb.json.tmp").exists());
    }

    #[test]
    fn test_file_store_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileModelStore::open(dir.path()).unwrap();

        store.save("xgb", &tiny_model(0.0)).unwrap();
        store.save("xgb", &tiny_model(10.0)).unwrap();

        let loaded = store.load("xgb").unwrap();
        assert!(loaded.predict(&[2.0]) > 5.0);
    }

    #[test]
    fn test_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.load("nope"),
            Err(StatError::ModelNotFound(name)) if name == "nope"
        ));

        let memory = InMemoryModelStore::new();
        assert!(matches!(memory.load("nope"), Err(StatError::ModelNotFound(_))));
    }

    #[test]
    fn test_corrupt_artifact_is_not_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("xgb.json"), b"{ not json").unwrap();

        assert!(store.contains("xgb"));
        assert!(matches!(store.load("xgb"), Err(StatError::Serialization(_))));
    }

    #[test]
    fn test_rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileModelStore::open(dir.path()).unwrap();
        let model = tiny_model(0.0);

        for name in ["", "../escape", "a/b", ".hidden"] {
            assert!(matches!(
                store.save(name, &model),
                Err(StatError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_memory_store_replaces() {
        let mut store = InMemoryModelStore::new();
        store.save("xgb", &tiny_model(0.0)).unwrap();
        store.save("xgb", &tiny_model(10.0)).unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.load("xgb").unwrap().predict(&[2.0]) > 5.0);
    }
}
