//! Beam-indexed block backend with a key/value calibration header.
//!
//! This is the layout produced by shared-memory ring buffers: a header of
//! named numeric fields and, per beam, a time-major run of spectra.

use crate::model::RawHeader;
use crate::source::{check_range, spectra_to_channels, RawDataSource, SourceError, SourceResult};
use ndarray::Array2;
use std::collections::BTreeMap;

pub const CHANNELS: &str = "Channels";
pub const BANDWIDTH: &str = "Bandwidth_MHz";
pub const FREQUENCY_CH0: &str = "Frequency_Ch_0_Hz";
pub const SAMPLING_TIME: &str = "Sampling_time_uSec";
pub const BITS_PER_SAMPLE: &str = "Num_bits_per_sample";

fn field(fields: &BTreeMap<String, f64>, key: &str) -> SourceResult<f64> {
    fields
        .get(key)
        .copied()
        .ok_or_else(|| SourceError::MissingField(key.to_string()))
}

/// Parses a key/value header.
///
/// A negative bandwidth means channel 0 is the top of the band; otherwise
/// channel 0 is the bottom and the returned flag asks for the channel axis to
/// be flipped on read.
pub fn header_from_fields(fields: &BTreeMap<String, f64>) -> SourceResult<(RawHeader, bool)> {
    let nf = field(fields, CHANNELS)?;
    let bw = field(fields, BANDWIDTH)?;
    let f0 = field(fields, FREQUENCY_CH0)? / 1e6;
    let dt = field(fields, SAMPLING_TIME)? / 1e6;
    let nbits = field(fields, BITS_PER_SAMPLE)?;

    if !(nf >= 1.0) {
        return Err(SourceError::BadHeader {
            field: CHANNELS.into(),
            reason: format!("must be positive, got {}", nf),
        });
    }
    let nf = nf as usize;
    let df = bw / nf as f64;
    if df == 0.0 {
        return Err(SourceError::BadHeader {
            field: BANDWIDTH.into(),
            reason: "bandwidth is zero".into(),
        });
    }

    let ascending = df > 0.0;
    let fh = if ascending {
        f0 + (nf - 1) as f64 * df
    } else {
        f0
    };
    let mut header = RawHeader::from_top(fh, df, dt, nf, nbits as u32);
    header.extras = fields
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::from(*v)))
        .collect();
    Ok((header, ascending))
}

/// In-memory beam blocks described by a key/value header.
#[derive(Debug, Clone)]
pub struct BlockSource {
    header: RawHeader,
    ascending: bool,
    beams: Vec<Vec<f32>>,
    nt: usize,
}

impl BlockSource {
    pub fn new(fields: &BTreeMap<String, f64>, beams: Vec<Vec<f32>>) -> SourceResult<Self> {
        let (header, ascending) = header_from_fields(fields)?;
        let nf = header.nf;
        let nt = beams.iter().map(|b| b.len() / nf).min().unwrap_or(0);
        if let Some(bad) = beams.iter().position(|b| b.len() % nf != 0) {
            return Err(SourceError::Shape(format!(
                "beam {} holds {} values, not a multiple of {} channels",
                bad,
                beams[bad].len(),
                nf
            )));
        }
        Ok(Self {
            header,
            ascending,
            beams,
            nt,
        })
    }
}

impl RawDataSource for BlockSource {
    fn header(&self) -> SourceResult<RawHeader> {
        Ok(self.header.clone())
    }

    fn nt(&self) -> usize {
        self.nt
    }

    fn read(&mut self, offset: usize, count: usize, beam: Option<usize>) -> SourceResult<Array2<f32>> {
        check_range(offset, count, self.nt)?;
        let beam = beam.unwrap_or(0);
        let block = self.beams.get(beam).ok_or(SourceError::NoSuchBeam {
            beam,
            nbeams: self.beams.len(),
        })?;
        let nf = self.header.nf;
        let spectra = block[offset * nf..(offset + count) * nf].to_vec();
        spectra_to_channels(spectra, count, nf, self.ascending)
    }
}
