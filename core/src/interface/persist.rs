use crate::model::FeatureSet;
use crate::prelude::{FeatureError, FeatureResult};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Persists the features of one candidate and returns where they went.
pub trait FeatureWriter {
    fn write(&mut self, features: &FeatureSet) -> FeatureResult<PathBuf>;
}

/// Row-major 2-D array with optional axis labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayRecord {
    pub shape: [usize; 2],
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    pub data: Vec<f32>,
}

impl ArrayRecord {
    pub fn from_array(array: &Array2<f32>, labels: &[&str]) -> Self {
        Self {
            shape: [array.nrows(), array.ncols()],
            labels: labels.iter().map(|l| l.to_string()).collect(),
            data: array.iter().copied().collect(),
        }
    }

    pub fn to_array(&self) -> FeatureResult<Array2<f32>> {
        Array2::from_shape_vec((self.shape[0], self.shape[1]), self.data.clone())
            .map_err(|e| FeatureError::Persist(format!("array shape {:?}: {}", self.shape, e)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedispersedRecord {
    pub fl: f64,
    pub fh: f64,
    pub dm: f64,
    pub dt: f64,
    pub df: f64,
    #[serde(flatten)]
    pub array: ArrayRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DmTransformRecord {
    pub dmlow: f64,
    pub dmhigh: f64,
    pub ddm: f64,
    pub dm: f64,
    pub dt: f64,
    #[serde(flatten)]
    pub array: ArrayRecord,
}

/// On-disk layout of a feature file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub id: String,
    /// Raw window length in samples.
    pub nt: usize,
    pub ndms: usize,
    pub nf: usize,
    pub dt: f64,
    pub df: f64,
    pub fl: f64,
    pub fh: f64,
    pub t0: f64,
    pub dm: f64,
    pub snr: f64,
    pub wbin: usize,
    #[serde(rename = "dyn")]
    pub dedispersed: DedispersedRecord,
    #[serde(rename = "dmt")]
    pub dmtransform: DmTransformRecord,
    #[serde(default)]
    pub extras: BTreeMap<String, Value>,
}

impl FeatureRecord {
    pub fn from_features(features: &FeatureSet) -> Self {
        let header = &features.header;
        let candidate = &features.candidate;
        let dd = &features.dedispersed;
        let dmt = &features.dmtransform;
        Self {
            id: features.id(),
            nt: features.nread,
            ndms: dmt.ndms(),
            nf: header.nf,
            dt: header.dt,
            df: header.df,
            fl: header.fl,
            fh: header.fh,
            t0: candidate.t0,
            dm: candidate.dm,
            snr: candidate.snr,
            wbin: candidate.wbin,
            dedispersed: DedispersedRecord {
                fl: dd.fl,
                fh: dd.fh,
                dm: dd.dm,
                dt: dd.dt,
                df: dd.df,
                array: ArrayRecord::from_array(&dd.data, &[]),
            },
            dmtransform: DmTransformRecord {
                dmlow: dmt.dmlow,
                dmhigh: dmt.dmhigh,
                ddm: dmt.ddm,
                dm: dmt.dm,
                dt: dmt.dt,
                array: ArrayRecord::from_array(&dmt.data, &["dm", "time"]),
            },
            extras: header.extras.clone(),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> FeatureResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| FeatureError::Persist(format!("opening {}: {}", path.display(), e)))?;
        serde_json::from_reader(GzDecoder::new(BufReader::new(file)))
            .map_err(|e| FeatureError::Persist(format!("parsing {}: {}", path.display(), e)))
    }
}

/// File stem shared by every feature file, e.g.
/// `MJD60000.1234567_T10.0000000_DM100.00000_SNR12.00000`.
pub fn file_stem(features: &FeatureSet) -> String {
    let candidate = &features.candidate;
    let body = format!(
        "T{:.7}_DM{:.5}_SNR{:.5}",
        candidate.t0, candidate.dm, candidate.snr
    );
    match features.header.tstart {
        Some(mjd) => format!("MJD{:.7}_{}", mjd, body),
        None => body,
    }
}

/// Writes one gzip-compressed JSON feature file per candidate into a
/// directory.
pub struct JsonFeatureWriter {
    output_dir: PathBuf,
}

impl JsonFeatureWriter {
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

impl FeatureWriter for JsonFeatureWriter {
    fn write(&mut self, features: &FeatureSet) -> FeatureResult<PathBuf> {
        let persist = |what: &str, e: &dyn std::fmt::Display| {
            FeatureError::Persist(format!("{} in {}: {}", what, self.output_dir.display(), e))
        };
        fs::create_dir_all(&self.output_dir).map_err(|e| persist("creating directory", &e))?;

        let path = self.output_dir.join(format!("{}.json.gz", file_stem(features)));
        let file = File::create(&path).map_err(|e| persist("creating feature file", &e))?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::best());
        serde_json::to_writer(&mut encoder, &FeatureRecord::from_features(features))
            .map_err(|e| persist("serialising features", &e))?;
        let mut writer = encoder.finish().map_err(|e| persist("compressing feature file", &e))?;
        writer.flush().map_err(|e| persist("flushing feature file", &e))?;
        Ok(path)
    }
}
