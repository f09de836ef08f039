pub mod assemble;
pub mod dedisperse;
pub mod device;
pub mod dmt;
pub mod featurizer;
pub mod planner;
pub mod window;

pub use assemble::FeatureAssembler;
pub use dedisperse::DedispersionKernel;
pub use device::Device;
pub use dmt::DmTransformKernel;
pub use featurizer::{BatchReport, CandidateOutcome, FeatureConfig, Featurizer};
pub use planner::{ParameterPlanner, Plan, PlannerConfig, FEATURE_SIZE, NDMS};
pub use window::{WindowBounds, WindowExtractor};
