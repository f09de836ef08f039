//! Feature-extraction core for dispersed radio transient candidates.
//!
//! A candidate pulse found by a single-pulse search is turned into two
//! fixed-size features for a downstream classifier: the dedispersed dynamic
//! spectrum and the DM-time transform. The modules follow the order data
//! flows through them: raw sources, windowing, planning, the two parallel
//! kernels, and feature assembly.

pub mod interface;
pub mod math;
pub mod model;
pub mod prelude;
pub mod processing;
pub mod source;
pub mod telemetry;

pub use model::{Candidate, DedispersedFeature, DmTransform, FeatureSet, RawHeader, RawWindow};
pub use prelude::{CandidateFailure, FeatureError, FeatureResult, Kernel, KernelInput};
pub use processing::{Device, Featurizer};
