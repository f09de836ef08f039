use crate::math::stats::StatsHelper;
use crate::model::{Candidate, RawHeader, RawWindow};
use crate::prelude::{FeatureError, FeatureResult};
use crate::processing::planner::FEATURE_SIZE;
use crate::source::RawDataSource;
use ndarray::{s, Array1, Array2};

/// Sample range a candidate needs, in source coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBounds {
    /// First sample; negative when the window starts before the data.
    pub nbegin: i64,
    pub nread: usize,
    /// Length of the window before widening.
    pub ncount: usize,
}

impl WindowBounds {
    pub fn end(&self) -> i64 {
        self.nbegin + self.nread as i64
    }
}

/// Cuts the raw data around a candidate, padding past either edge of the
/// source with per-channel medians.
pub struct WindowExtractor;

impl WindowExtractor {
    /// Window covering the full dispersion sweep plus a boxcar on either side.
    pub fn bounds(candidate: &Candidate, header: &RawHeader) -> WindowBounds {
        let maxdelay = header.max_delay(candidate.dm);
        let wbin = candidate.wbin as i64;
        let binbeg = ((candidate.t0 - maxdelay) / header.dt).floor() as i64 - wbin;
        let binend = ((candidate.t0 + maxdelay) / header.dt).ceil() as i64 + wbin;
        let ncount = (binend - binbeg).max(0) as usize;

        let half = candidate.wbin / 2;
        let nread = if candidate.wbin > 2 && ncount / half < FEATURE_SIZE {
            FEATURE_SIZE * candidate.wbin / 2
        } else {
            ncount.max(FEATURE_SIZE)
        };
        let nbegin = binbeg - (nread as i64 - ncount as i64).div_euclid(2);

        WindowBounds {
            nbegin,
            nread,
            ncount,
        }
    }

    pub fn extract<S: RawDataSource + ?Sized>(
        source: &mut S,
        candidate: &Candidate,
        header: &RawHeader,
    ) -> FeatureResult<RawWindow> {
        let bounds = Self::bounds(candidate, header);
        let data = Self::read_padded(source, &bounds, header.nf, candidate.beam)?;
        let tbeg = bounds.nbegin as f64 * header.dt;
        Ok(RawWindow {
            data,
            nbegin: bounds.nbegin,
            tbeg,
            tend: tbeg + bounds.nread as f64 * header.dt,
        })
    }

    fn read_padded<S: RawDataSource + ?Sized>(
        source: &mut S,
        bounds: &WindowBounds,
        nf: usize,
        beam: Option<usize>,
    ) -> FeatureResult<Array2<f32>> {
        let nt = source.nt() as i64;
        let (nbegin, nread, end) = (bounds.nbegin, bounds.nread, bounds.end());

        if end <= 0 || nbegin >= nt {
            return Err(FeatureError::DataUnavailable(format!(
                "window [{}, {}) does not overlap the {} available samples",
                nbegin, end, nt
            )));
        }

        if nbegin >= 0 && end <= nt {
            let data = source.read(nbegin as usize, nread, beam)?;
            return check_shape(data, nf, nread);
        }

        // Offset into the source and span of the window the real samples fill.
        let (offset, dst_start) = if nbegin < 0 {
            (0, (-nbegin) as usize)
        } else {
            (nbegin as usize, 0)
        };
        let count = (end.min(nt) - offset as i64) as usize;
        let real = check_shape(source.read(offset, count, beam)?, nf, count)?;

        let mut data = median_fill(&real, nread);
        data.slice_mut(s![.., dst_start..dst_start + count]).assign(&real);
        Ok(data)
    }
}

/// `nf x len` array with each channel set to that channel's median.
pub fn median_fill(real: &Array2<f32>, len: usize) -> Array2<f32> {
    let medians: Array1<f32> = real
        .rows()
        .into_iter()
        .map(|row| StatsHelper::median(&row.to_vec()))
        .collect();
    Array2::from_shape_fn((real.nrows(), len), |(fi, _)| medians[fi])
}

fn check_shape(data: Array2<f32>, nf: usize, count: usize) -> FeatureResult<Array2<f32>> {
    if data.dim() != (nf, count) {
        return Err(FeatureError::DataUnavailable(format!(
            "source returned {:?}, expected ({}, {})",
            data.dim(),
            nf,
            count
        )));
    }
    Ok(data)
}
