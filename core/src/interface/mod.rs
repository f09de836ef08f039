//! Collaborators downstream of feature extraction: the feature-file writer
//! and the classifier that consumes those files.

pub mod classify;
pub mod persist;

pub use classify::{Classification, Classifier};
pub use persist::{FeatureRecord, FeatureWriter, JsonFeatureWriter};
