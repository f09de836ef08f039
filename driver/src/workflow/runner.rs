use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use candycore::interface::{FeatureWriter, JsonFeatureWriter};
use candycore::source::{RawDataSource, SigprocSource};
use candycore::telemetry::Metrics;
use candycore::{Candidate, Device, Featurizer};
use std::path::{Path, PathBuf};

pub struct WorkflowResult {
    pub candidates: usize,
    pub written: Vec<PathBuf>,
    pub failures: Vec<String>,
    pub metrics: Metrics,
}

impl WorkflowResult {
    pub fn succeeded(&self) -> usize {
        self.candidates - self.failures.len()
    }
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn execute_file(&self, filterbank: &Path, candidates: &[Candidate]) -> anyhow::Result<WorkflowResult> {
        let mut source = SigprocSource::open(filterbank)
            .with_context(|| format!("opening filterbank {}", filterbank.display()))?;
        self.execute(&mut source, candidates)
    }

    pub fn execute<S: RawDataSource + ?Sized>(
        &self,
        source: &mut S,
        candidates: &[Candidate],
    ) -> anyhow::Result<WorkflowResult> {
        let device = Device::acquire(self.config.threads).context("acquiring compute device")?;
        let featurizer = Featurizer::new(&device, self.config.to_feature_config());

        let report = if self.config.save {
            let mut writer = JsonFeatureWriter::new(&self.config.output_dir);
            featurizer.run(source, candidates, |features| writer.write(&features).map(Some))
        } else {
            featurizer.run(source, candidates, |_| Ok(None))
        }
        .context("featurizing candidates")?;

        let failures = report.failures().map(|f| f.to_string()).collect();
        let written = report
            .outcomes
            .into_iter()
            .filter_map(|o| o.result.ok().flatten())
            .collect();
        Ok(WorkflowResult {
            candidates: candidates.len(),
            written,
            failures,
            metrics: report.metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::{write_filterbank, GeneratorConfig, InjectedPulse};
    use candycore::interface::FeatureRecord;
    use candycore::math::NormaliserKind;

    fn simulate(dir: &Path) -> (PathBuf, Vec<Candidate>) {
        let config = GeneratorConfig {
            nf: 32,
            duration: 2.0,
            seed: 11,
            pulses: vec![InjectedPulse {
                t0: 1.0,
                dm: 50.0,
                width: 3,
                amplitude: 4.0,
            }],
            ..Default::default()
        };
        let path = dir.join("sim.fil");
        let candidates = write_filterbank(&config, &path).unwrap();
        (path, candidates)
    }

    fn workflow(save: bool, output_dir: PathBuf) -> WorkflowConfig {
        WorkflowConfig::from_args(true, 512.0, 2, NormaliserKind::ZScore, save, output_dir, None)
    }

    #[test]
    fn runner_writes_one_feature_file_per_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let (fil, candidates) = simulate(dir.path());
        let runner = Runner::new(workflow(true, dir.path().join("features")));
        let result = runner.execute_file(&fil, &candidates).unwrap();

        assert_eq!(result.succeeded(), 1);
        assert_eq!(result.written.len(), 1);
        let record = FeatureRecord::load(&result.written[0]).unwrap();
        assert_eq!(record.dedispersed.array.shape, [256, 256]);
        assert_eq!(record.dmtransform.array.shape, [256, 256]);
        assert_eq!(record.nf, 32);
        assert_eq!(record.wbin, 3);
        assert_eq!(result.metrics.processed, 1);
    }

    #[test]
    fn failing_candidate_does_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let (fil, mut candidates) = simulate(dir.path());
        candidates.insert(0, Candidate::new(500.0, 50.0, 9.0, 3));
        let runner = Runner::new(workflow(false, dir.path().join("features")));
        let result = runner.execute_file(&fil, &candidates).unwrap();

        assert_eq!(result.candidates, 2);
        assert_eq!(result.succeeded(), 1);
        assert_eq!(result.failures.len(), 1);
        assert!(result.failures[0].contains("t0=500.0000000"));
        assert!(result.written.is_empty());
        assert!(!dir.path().join("features").exists());
    }

    #[test]
    fn missing_filterbank_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Runner::new(workflow(false, dir.path().to_path_buf()));
        assert!(runner
            .execute_file(&dir.path().join("absent.fil"), &[Candidate::new(1.0, 1.0, 1.0, 1)])
            .is_err());
    }
}
