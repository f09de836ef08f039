use crate::model::{Candidate, RawHeader, RawWindow};
use crate::processing::device::Device;
use crate::processing::planner::Plan;
use crate::source::SourceError;
use ndarray::Array2;

/// Common error type for feature extraction.
#[derive(thiserror::Error, Debug)]
pub enum FeatureError {
    #[error("configuration error: `{field}` {reason}")]
    Configuration { field: String, reason: String },
    #[error("data unavailable: {0}")]
    DataUnavailable(String),
    #[error("device error: {0}")]
    Device(String),
    #[error("persistence error: {0}")]
    Persist(String),
}

impl FeatureError {
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        FeatureError::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<SourceError> for FeatureError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::MissingField(field) => {
                FeatureError::configuration(field, "missing from source header")
            }
            SourceError::BadHeader { field, reason } => FeatureError::configuration(field, reason),
            other => FeatureError::DataUnavailable(other.to_string()),
        }
    }
}

pub type FeatureResult<T> = Result<T, FeatureError>;

/// A failure tied to the candidate that caused it.
#[derive(thiserror::Error, Debug)]
#[error("candidate (t0={t0:.7} s, dm={dm:.5}): {source}")]
pub struct CandidateFailure {
    pub t0: f64,
    pub dm: f64,
    pub source: FeatureError,
}

impl CandidateFailure {
    pub fn new(candidate: &Candidate, source: FeatureError) -> Self {
        Self {
            t0: candidate.t0,
            dm: candidate.dm,
            source,
        }
    }
}

/// Everything a kernel needs for one launch.
#[derive(Debug, Clone, Copy)]
pub struct KernelInput<'a> {
    pub window: &'a RawWindow,
    pub header: &'a RawHeader,
    pub plan: &'a Plan,
    pub dm: f64,
}

/// A data-parallel kernel launched on a [`Device`].
pub trait Kernel {
    fn name(&self) -> &'static str;
    fn launch(&self, device: &Device, input: &KernelInput<'_>) -> FeatureResult<Array2<f32>>;
}

/// Checks that a window matches the header before any work is queued.
pub(crate) fn check_geometry(kernel: &str, input: &KernelInput<'_>) -> FeatureResult<(usize, usize)> {
    let (nf, nt) = input.window.data.dim();
    if nf == 0 || nt == 0 {
        return Err(FeatureError::Device(format!(
            "{} launch with empty grid ({}x{})",
            kernel, nf, nt
        )));
    }
    if nf != input.header.nf {
        return Err(FeatureError::Device(format!(
            "{} launch with {} channels, header declares {}",
            kernel, nf, input.header.nf
        )));
    }
    if input.plan.downf == 0 || input.plan.downt == 0 {
        return Err(FeatureError::Device(format!(
            "{} launch with zero downsampling factor",
            kernel
        )));
    }
    Ok((nf, nt))
}
