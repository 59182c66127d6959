//! Data access and storage
//!
//! SQLite persistence, history tables, training sets, and the model store.

pub mod database;
pub mod dataset;
pub mod history;
pub mod model_store;

pub use database::{Database, DatabaseStats, StoredScores};
pub use dataset::TrainingSet;
pub use history::HistoryTable;
pub use model_store::{FileModelStore, InMemoryModelStore, ModelStore};
