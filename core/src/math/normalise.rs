use crate::math::stats::StatsHelper;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Normalisation applied to each cropped feature before it is stored.
pub trait Normaliser: Send + Sync {
    fn name(&self) -> &'static str;
    fn normalise(&self, data: &mut Array2<f32>);
}

/// Subtract the mean and divide by the standard deviation.
pub struct ZScore;

/// Subtract the median and divide by the standard deviation.
pub struct MedianStd;

/// Rescale into `[0, 1]`.
pub struct MinMax;

fn flat(data: &Array2<f32>) -> Vec<f32> {
    data.iter().copied().collect()
}

fn centre_and_scale(data: &mut Array2<f32>, centre: f32, scale: f32) {
    if scale > 0.0 && scale.is_finite() {
        data.mapv_inplace(|v| (v - centre) / scale);
    } else {
        data.mapv_inplace(|v| v - centre);
    }
}

impl Normaliser for ZScore {
    fn name(&self) -> &'static str {
        "zscore"
    }

    fn normalise(&self, data: &mut Array2<f32>) {
        let values = flat(data);
        let mean = StatsHelper::mean(&values);
        let std = StatsHelper::std(&values);
        centre_and_scale(data, mean, std);
    }
}

impl Normaliser for MedianStd {
    fn name(&self) -> &'static str {
        "median"
    }

    fn normalise(&self, data: &mut Array2<f32>) {
        let values = flat(data);
        let median = StatsHelper::median(&values);
        let std = StatsHelper::std(&values);
        centre_and_scale(data, median, std);
    }
}

impl Normaliser for MinMax {
    fn name(&self) -> &'static str {
        "minmax"
    }

    fn normalise(&self, data: &mut Array2<f32>) {
        let values = flat(data);
        if let Some((lo, hi)) = StatsHelper::min_max(&values) {
            centre_and_scale(data, lo, hi - lo);
        }
    }
}

/// Selectable normaliser, as named in configuration files and on the
/// command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormaliserKind {
    #[default]
    ZScore,
    Median,
    MinMax,
}

impl NormaliserKind {
    pub fn build(self) -> Box<dyn Normaliser> {
        match self {
            NormaliserKind::ZScore => Box::new(ZScore),
            NormaliserKind::Median => Box::new(MedianStd),
            NormaliserKind::MinMax => Box::new(MinMax),
        }
    }
}

impl FromStr for NormaliserKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zscore" => Ok(NormaliserKind::ZScore),
            "median" => Ok(NormaliserKind::Median),
            "minmax" => Ok(NormaliserKind::MinMax),
            other => Err(format!(
                "unknown normaliser `{}` (expected zscore, median or minmax)",
                other
            )),
        }
    }
}

impl fmt::Display for NormaliserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.build().name())
    }
}
