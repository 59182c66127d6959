//! Feature extraction and encoding
//!
//! Converts raw stat records into model-ready feature vectors.

pub mod career;
pub mod encoding;

pub use career::CareerSummary;
pub use encoding::{encode, FeatureVector, AGE_FIELD, FEATURE_DIM, FEATURE_FIELDS, STAT_FIELDS};
