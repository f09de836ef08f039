use crate::math::dispersion;
use crate::model::{Candidate, RawHeader};
use crate::prelude::{FeatureError, FeatureResult};
use serde::{Deserialize, Serialize};

/// Side length of both output features.
pub const FEATURE_SIZE: usize = 256;

/// Number of trial DMs in the DM-time transform.
pub const NDMS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Narrow the DM range around the candidate's DM.
    pub zoom: bool,
    /// Width of the zoomed range, in boxcars of delay. Larger zooms out.
    pub fudging: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            zoom: true,
            fudging: 512.0,
        }
    }
}

/// Search and downsampling parameters for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub ndms: usize,
    pub dmlow: f64,
    pub dmhigh: f64,
    pub ddm: f64,
    pub downf: usize,
    pub downt: usize,
    pub nfdown: usize,
    pub ntdown: usize,
}

impl Plan {
    pub fn dm_at(&self, dmi: usize) -> f64 {
        self.dmlow + dmi as f64 * self.ddm
    }

    pub fn dm_grid(&self) -> Vec<f64> {
        (0..self.ndms).map(|i| self.dm_at(i)).collect()
    }
}

pub struct ParameterPlanner {
    config: PlannerConfig,
}

impl ParameterPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// DM half-width whose sweep across the band equals `fudging` boxcars.
    fn zoom_half_width(&self, wbin: usize, header: &RawHeader) -> f64 {
        dispersion::delay2dm(header.fl, header.fh, self.config.fudging * wbin as f64 * header.dt)
    }

    /// DM search range `[dmlow, dmhigh]` for a candidate.
    ///
    /// Zoom only narrows the range when the half-width is below the DM, so
    /// low-DM candidates keep `[0, 2 dm]`. An empty range (zero DM, or a
    /// zero boxcar under zoom) is rebuilt around the DM from the half-width
    /// of a one-sample boxcar, clipped at zero.
    pub fn dm_range(&self, candidate: &Candidate, header: &RawHeader) -> (f64, f64) {
        let dm = candidate.dm;
        let (mut dmlow, mut dmhigh) = (0.0, 2.0 * dm);
        if self.config.zoom {
            let half = self.zoom_half_width(candidate.wbin, header);
            if half < dm {
                dmlow = dm - half;
                dmhigh = dm + half;
            }
        }
        if dmhigh <= dmlow {
            let half = self.zoom_half_width(candidate.wbin.max(1), header);
            dmlow = (dm - half).max(0.0);
            dmhigh = dm + half;
        }
        (dmlow, dmhigh)
    }

    pub fn plan(&self, candidate: &Candidate, header: &RawHeader, nread: usize) -> FeatureResult<Plan> {
        let (dmlow, dmhigh) = self.dm_range(candidate, header);
        let ddm = (dmhigh - dmlow) / (NDMS - 1) as f64;
        if !(ddm > 0.0) || !ddm.is_finite() {
            return Err(FeatureError::configuration(
                "fudging",
                format!("yields an empty DM range [{}, {}]", dmlow, dmhigh),
            ));
        }

        let downf = (header.nf / FEATURE_SIZE).max(1);
        let downt = if candidate.wbin < 3 { 1 } else { candidate.wbin / 2 };
        let nfdown = header.nf / downf;
        let ntdown = nread / downt;
        if ntdown < FEATURE_SIZE {
            return Err(FeatureError::DataUnavailable(format!(
                "{} samples downsampled by {} leave {} < {} columns",
                nread, downt, ntdown, FEATURE_SIZE
            )));
        }

        Ok(Plan {
            ndms: NDMS,
            dmlow,
            dmhigh,
            ddm,
            downf,
            downt,
            nfdown,
            ntdown,
        })
    }
}
