use crate::math::dispersion;
use crate::prelude::{FeatureError, FeatureResult};
use crate::processing::planner::Plan;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single-pulse candidate as reported by the upstream search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Arrival time at the top of the band, in seconds.
    pub t0: f64,
    /// Dispersion measure, in pc cm^-3.
    pub dm: f64,
    pub snr: f64,
    /// Boxcar width in samples.
    pub wbin: usize,
    #[serde(default)]
    pub beam: Option<usize>,
}

impl Candidate {
    pub fn new(t0: f64, dm: f64, snr: f64, wbin: usize) -> Self {
        Self {
            t0,
            dm,
            snr,
            wbin,
            beam: None,
        }
    }

    pub fn with_beam(mut self, beam: usize) -> Self {
        self.beam = Some(beam);
        self
    }

    pub fn id(&self) -> String {
        format!("T{:.7}DM{:.5}SNR{:.5}", self.t0, self.dm, self.snr)
    }

    pub fn validate(&self) -> FeatureResult<()> {
        if !self.t0.is_finite() || self.t0 < 0.0 {
            return Err(FeatureError::configuration(
                "t0",
                format!("must be a non-negative time, got {}", self.t0),
            ));
        }
        if !self.dm.is_finite() || self.dm < 0.0 {
            return Err(FeatureError::configuration(
                "dm",
                format!("must be non-negative, got {}", self.dm),
            ));
        }
        Ok(())
    }
}

/// Calibration header of a raw data source.
///
/// Channel 0 is the top of the band: channel `i` sits at `fh - i * df`.
/// `fl` is the centre of the lowest channel, so every channel frequency lies
/// in `[fl, fh]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHeader {
    /// Top-of-band frequency, MHz.
    pub fh: f64,
    /// Bottom-of-band frequency, MHz.
    pub fl: f64,
    /// Channel width, MHz (always positive).
    pub df: f64,
    /// Sample interval, seconds.
    pub dt: f64,
    pub nf: usize,
    pub nbits: u32,
    /// Total bandwidth, MHz.
    pub bw: f64,
    /// Observation start as MJD, when the source knows it.
    #[serde(default)]
    pub tstart: Option<f64>,
    /// Any further source metadata, carried through to the feature file.
    #[serde(default)]
    pub extras: BTreeMap<String, serde_json::Value>,
}

impl RawHeader {
    /// Builds a header from the top channel frequency and channel width.
    pub fn from_top(fh: f64, df: f64, dt: f64, nf: usize, nbits: u32) -> Self {
        let df = df.abs();
        Self {
            fh,
            fl: fh - nf.saturating_sub(1) as f64 * df,
            df,
            dt,
            nf,
            nbits,
            bw: nf as f64 * df,
            tstart: None,
            extras: BTreeMap::new(),
        }
    }

    /// Builds a header spanning `[fl, fh]` with `nf` channels.
    pub fn from_band(fl: f64, fh: f64, nf: usize, dt: f64, nbits: u32) -> Self {
        Self {
            fh,
            fl,
            df: if nf > 1 { (fh - fl) / (nf - 1) as f64 } else { 0.0 },
            dt,
            nf,
            nbits,
            bw: fh - fl,
            tstart: None,
            extras: BTreeMap::new(),
        }
    }

    pub fn with_tstart(mut self, tstart: f64) -> Self {
        self.tstart = Some(tstart);
        self
    }

    pub fn channel_freq(&self, fi: usize) -> f64 {
        self.fh - fi as f64 * self.df
    }

    /// Dispersion sweep across the whole band at `dm`, in seconds.
    pub fn max_delay(&self, dm: f64) -> f64 {
        dispersion::dm2delay(self.fl, self.fh, dm)
    }

    pub fn validate(&self) -> FeatureResult<()> {
        if self.nf == 0 {
            return Err(FeatureError::configuration("nf", "must be positive"));
        }
        if !(self.df > 0.0) {
            return Err(FeatureError::configuration(
                "df",
                format!("must be positive, got {}", self.df),
            ));
        }
        if !(self.dt > 0.0) {
            return Err(FeatureError::configuration(
                "dt",
                format!("must be positive, got {}", self.dt),
            ));
        }
        if !(self.fh > self.fl) || self.fl <= 0.0 {
            return Err(FeatureError::configuration(
                "fh",
                format!("band [{}, {}] MHz is empty or non-physical", self.fl, self.fh),
            ));
        }
        Ok(())
    }
}

/// Raw samples around a candidate, `nf x nread`, high frequency first.
#[derive(Debug, Clone)]
pub struct RawWindow {
    pub data: Array2<f32>,
    /// First sample index of the window in source coordinates (may be negative).
    pub nbegin: i64,
    pub tbeg: f64,
    pub tend: f64,
}

impl RawWindow {
    pub fn nf(&self) -> usize {
        self.data.nrows()
    }

    pub fn nread(&self) -> usize {
        self.data.ncols()
    }
}

/// Dedispersed dynamic spectrum feature.
#[derive(Debug, Clone)]
pub struct DedispersedFeature {
    pub data: Array2<f32>,
    pub fl: f64,
    pub fh: f64,
    pub dm: f64,
    pub dt: f64,
    pub df: f64,
}

/// DM-time transform feature.
#[derive(Debug, Clone)]
pub struct DmTransform {
    pub data: Array2<f32>,
    pub dmlow: f64,
    pub dmhigh: f64,
    pub ddm: f64,
    pub dm: f64,
    pub dt: f64,
}

impl DmTransform {
    pub fn ndms(&self) -> usize {
        self.data.nrows()
    }

    pub fn dm_grid(&self) -> Vec<f64> {
        (0..self.ndms())
            .map(|i| self.dmlow + i as f64 * self.ddm)
            .collect()
    }
}

/// A candidate together with both of its computed features.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub candidate: Candidate,
    pub header: RawHeader,
    pub plan: Plan,
    /// Length of the raw window the features were computed from.
    pub nread: usize,
    pub tbeg: f64,
    pub tend: f64,
    pub dedispersed: DedispersedFeature,
    pub dmtransform: DmTransform,
}

impl FeatureSet {
    pub fn id(&self) -> String {
        self.candidate.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_from_top_puts_lowest_channel_at_fl() {
        let header = RawHeader::from_top(1500.0, -0.5, 1e-3, 4, 8);
        assert_eq!(header.df, 0.5);
        assert_eq!(header.fl, 1498.5);
        assert_eq!(header.channel_freq(3), header.fl);
        assert!(header.validate().is_ok());
    }

    #[test]
    fn header_validation_names_the_field() {
        let mut header = RawHeader::from_band(1200.0, 1500.0, 16, 64e-6, 8);
        header.dt = 0.0;
        match header.validate() {
            Err(FeatureError::Configuration { field, .. }) => assert_eq!(field, "dt"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn candidate_rejects_negative_dm() {
        let candidate = Candidate::new(1.0, -3.0, 8.0, 2);
        assert!(matches!(
            candidate.validate(),
            Err(FeatureError::Configuration { ref field, .. }) if field == "dm"
        ));
    }

    #[test]
    fn candidate_id_matches_file_naming() {
        let candidate = Candidate::new(10.0, 100.0, 12.0, 4);
        assert_eq!(candidate.id(), "T10.0000000DM100.00000SNR12.00000");
    }
}
