use crate::math::normalise::{Normaliser, NormaliserKind};
use crate::model::{Candidate, DedispersedFeature, DmTransform, RawHeader};
use crate::prelude::{FeatureError, FeatureResult};
use crate::processing::planner::{Plan, FEATURE_SIZE};
use ndarray::{s, Array2, Axis};

/// Crops, resamples and normalises kernel outputs into the fixed-size
/// features handed to the classifier.
pub struct FeatureAssembler {
    normaliser: Box<dyn Normaliser>,
}

impl FeatureAssembler {
    pub fn new(kind: NormaliserKind) -> Self {
        Self::with_normaliser(kind.build())
    }

    pub fn with_normaliser(normaliser: Box<dyn Normaliser>) -> Self {
        Self { normaliser }
    }

    pub fn normaliser(&self) -> &dyn Normaliser {
        self.normaliser.as_ref()
    }

    pub fn assemble(
        &self,
        candidate: &Candidate,
        header: &RawHeader,
        plan: &Plan,
        spectrum: &Array2<f32>,
        plane: &Array2<f32>,
    ) -> FeatureResult<(DedispersedFeature, DmTransform)> {
        let mut dedispersed = resample_rows(&crop_centre(spectrum)?, FEATURE_SIZE);
        let mut dmt = resample_rows(&crop_centre(plane)?, FEATURE_SIZE);
        self.normaliser.normalise(&mut dedispersed);
        self.normaliser.normalise(&mut dmt);

        let dt = header.dt * plan.downt as f64;
        Ok((
            DedispersedFeature {
                data: dedispersed,
                fl: header.fl,
                fh: header.fh,
                dm: candidate.dm,
                dt,
                df: (header.fh - header.fl) / FEATURE_SIZE as f64,
            },
            DmTransform {
                data: dmt,
                dmlow: plan.dmlow,
                dmhigh: plan.dmhigh,
                ddm: plan.ddm,
                dm: candidate.dm,
                dt,
            },
        ))
    }
}

/// Central `FEATURE_SIZE` columns, `[n/2 - 128, n/2 + 128)`.
pub fn crop_centre(array: &Array2<f32>) -> FeatureResult<Array2<f32>> {
    let ncols = array.ncols();
    if ncols < FEATURE_SIZE {
        return Err(FeatureError::DataUnavailable(format!(
            "cannot crop {} columns from {}",
            FEATURE_SIZE, ncols
        )));
    }
    let start = ncols / 2 - FEATURE_SIZE / 2;
    Ok(array.slice(s![.., start..start + FEATURE_SIZE]).to_owned())
}

/// Brings the row count to `rows`: block means when shrinking, repeated
/// rows when growing.
pub fn resample_rows(array: &Array2<f32>, rows: usize) -> Array2<f32> {
    let n = array.nrows();
    if n == rows || n == 0 {
        return array.to_owned();
    }
    let mut out = Array2::<f32>::zeros((rows, array.ncols()));
    for (r, mut row) in out.axis_iter_mut(Axis(0)).enumerate() {
        if n > rows {
            let (lo, hi) = (r * n / rows, (r + 1) * n / rows);
            let block = array.slice(s![lo..hi, ..]);
            row.assign(&block.sum_axis(Axis(0)));
            row.mapv_inplace(|v| v / (hi - lo) as f32);
        } else {
            row.assign(&array.row(r * n / rows));
        }
    }
    out
}
