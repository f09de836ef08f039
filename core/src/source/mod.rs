//! Raw time-frequency data sources.
//!
//! Every backend exposes the same capability through [`RawDataSource`]: a
//! calibration header and block reads returning `nf x count` arrays with the
//! highest frequency channel first.

pub mod array;
pub mod block;
pub mod sigproc;

pub use array::ArraySource;
pub use block::BlockSource;
pub use sigproc::{SigprocSource, SigprocWriter};

use crate::model::RawHeader;
use ndarray::Array2;

/// Errors raised by raw data backends.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("header field `{0}` is missing")]
    MissingField(String),

    #[error("header field `{field}` is invalid: {reason}")]
    BadHeader { field: String, reason: String },

    #[error("requested samples [{offset}, {end}) outside available range [0, {nt})")]
    OutOfRange { offset: usize, end: usize, nt: usize },

    #[error("beam {beam} not available ({nbeams} beams)")]
    NoSuchBeam { beam: usize, nbeams: usize },

    #[error("data shape mismatch: {0}")]
    Shape(String),
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Capability shared by all raw data backends.
pub trait RawDataSource {
    fn header(&self) -> SourceResult<RawHeader>;

    /// Number of time samples available.
    fn nt(&self) -> usize;

    /// Reads `count` samples starting at `offset`, shaped `nf x count`.
    fn read(&mut self, offset: usize, count: usize, beam: Option<usize>) -> SourceResult<Array2<f32>>;
}

pub(crate) fn check_range(offset: usize, count: usize, nt: usize) -> SourceResult<()> {
    let end = offset.saturating_add(count);
    if end > nt {
        return Err(SourceError::OutOfRange { offset, end, nt });
    }
    Ok(())
}

/// Turns a time-major block (`count` spectra of `nf` channels) into a
/// channel-major array with the top of the band first.
pub(crate) fn spectra_to_channels(
    spectra: Vec<f32>,
    count: usize,
    nf: usize,
    ascending: bool,
) -> SourceResult<Array2<f32>> {
    let block = Array2::from_shape_vec((count, nf), spectra)
        .map_err(|e| SourceError::Shape(format!("({}, {}): {}", count, nf, e)))?;
    let channels = block.reversed_axes();
    let channels = if ascending {
        channels.slice(ndarray::s![..;-1, ..]).to_owned()
    } else {
        channels.as_standard_layout().into_owned()
    };
    Ok(channels)
}
