use anyhow::Context;
use candycore::math::NormaliserKind;
use candycore::processing::{FeatureConfig, PlannerConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub zoom: bool,
    pub fudging: f64,
    /// Kernel worker threads, 0 for one per core.
    pub threads: usize,
    pub normaliser: NormaliserKind,
    pub save: bool,
    pub output_dir: PathBuf,
    pub beam: Option<usize>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        let planner = PlannerConfig::default();
        Self {
            zoom: planner.zoom,
            fudging: planner.fudging,
            threads: 0,
            normaliser: NormaliserKind::default(),
            save: true,
            output_dir: PathBuf::from("."),
            beam: None,
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn from_args(
        zoom: bool,
        fudging: f64,
        threads: usize,
        normaliser: NormaliserKind,
        save: bool,
        output_dir: PathBuf,
        beam: Option<usize>,
    ) -> Self {
        Self {
            zoom,
            fudging,
            threads,
            normaliser,
            save,
            output_dir,
            beam,
        }
    }

    pub fn to_feature_config(&self) -> FeatureConfig {
        FeatureConfig {
            planner: PlannerConfig {
                zoom: self.zoom,
                fudging: self.fudging,
            },
            normaliser: self.normaliser,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_produces_feature_config() {
        let cfg = WorkflowConfig::from_args(
            false,
            256.0,
            2,
            NormaliserKind::MinMax,
            true,
            PathBuf::from("out"),
            None,
        );
        let features = cfg.to_feature_config();
        assert!(!features.planner.zoom);
        assert_eq!(features.planner.fudging, 256.0);
        assert_eq!(features.normaliser, NormaliserKind::MinMax);
    }

    #[test]
    fn config_load_reads_yaml_with_defaults() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"fudging: 128\nnormaliser: median\nbeam: 3\n")
            .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.fudging, 128.0);
        assert_eq!(cfg.normaliser, NormaliserKind::Median);
        assert_eq!(cfg.beam, Some(3));
        assert!(cfg.zoom);
        assert!(cfg.save);
        assert_eq!(cfg.threads, 0);
    }

    #[test]
    fn config_load_rejects_unknown_normaliser() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"normaliser: softmax\n").unwrap();
        let path = temp.into_temp_path();
        assert!(WorkflowConfig::load(&path).is_err());
    }
}
