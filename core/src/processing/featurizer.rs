use crate::math::normalise::NormaliserKind;
use crate::model::{Candidate, FeatureSet, RawHeader};
use crate::prelude::{CandidateFailure, FeatureResult, Kernel, KernelInput};
use crate::processing::assemble::FeatureAssembler;
use crate::processing::dedisperse::DedispersionKernel;
use crate::processing::device::Device;
use crate::processing::dmt::DmTransformKernel;
use crate::processing::planner::{ParameterPlanner, PlannerConfig};
use crate::processing::window::WindowExtractor;
use crate::source::RawDataSource;
use crate::telemetry::{LogManager, Metrics, MetricsRecorder};
use log::info;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Settings shared by every candidate in a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub planner: PlannerConfig,
    pub normaliser: NormaliserKind,
}

/// What happened to one candidate of a batch.
#[derive(Debug)]
pub struct CandidateOutcome<T> {
    pub candidate: Candidate,
    pub result: Result<T, CandidateFailure>,
}

/// Per-candidate outcomes of a batch, in input order.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub outcomes: Vec<CandidateOutcome<T>>,
    pub metrics: Metrics,
}

impl<T> BatchReport<T> {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CandidateFailure> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().err())
    }
}

/// Runs window extraction, planning, both kernels and assembly for each
/// candidate in turn on one device.
pub struct Featurizer<'d> {
    device: &'d Device,
    planner: ParameterPlanner,
    assembler: FeatureAssembler,
    metrics: MetricsRecorder,
}

impl<'d> Featurizer<'d> {
    pub fn new(device: &'d Device, config: FeatureConfig) -> Self {
        Self {
            device,
            planner: ParameterPlanner::new(config.planner),
            assembler: FeatureAssembler::new(config.normaliser),
            metrics: MetricsRecorder::new(),
        }
    }

    /// Computes both features for a single candidate.
    pub fn featurize<S: RawDataSource + ?Sized>(
        &self,
        source: &mut S,
        header: &RawHeader,
        candidate: &Candidate,
    ) -> FeatureResult<FeatureSet> {
        let logger = LogManager::for_candidate(candidate);
        candidate.validate()?;

        let window = WindowExtractor::extract(source, candidate, header)?;
        let nread = window.nread();
        logger.detail(&format!(
            "Read {} channels and {} samples from [{:.6}, {:.6}) s",
            window.nf(),
            nread,
            window.tbeg,
            window.tend
        ));

        let plan = self.planner.plan(candidate, header, nread)?;
        logger.detail(&format!(
            "DM range {:.4} to {:.4} pc cm^-3, downsampling by {} in frequency and {} in time",
            plan.dmlow, plan.dmhigh, plan.downf, plan.downt
        ));

        let input = KernelInput {
            window: &window,
            header,
            plan: &plan,
            dm: candidate.dm,
        };
        let started = Instant::now();
        let spectrum = DedispersionKernel.launch(self.device, &input)?;
        let plane = DmTransformKernel.launch(self.device, &input)?;
        let elapsed = started.elapsed();
        self.metrics.record_kernel_time(elapsed);
        logger.detail(&format!("Kernels finished in {:.3} ms", elapsed.as_secs_f64() * 1e3));

        let (dedispersed, dmtransform) =
            self.assembler
                .assemble(candidate, header, &plan, &spectrum, &plane)?;
        logger.record(&format!(
            "Featurized {} samples over DM {:.3} to {:.3}",
            nread, plan.dmlow, plan.dmhigh
        ));

        Ok(FeatureSet {
            candidate: *candidate,
            header: header.clone(),
            plan,
            nread,
            tbeg: window.tbeg,
            tend: window.tend,
            dedispersed,
            dmtransform,
        })
    }

    /// Featurizes every candidate and hands each result to `sink`. Metrics in
    /// the report cover this batch only.
    ///
    /// A failing candidate, in extraction or in the sink, is recorded and the
    /// batch moves on. Only an unusable source header stops the batch.
    pub fn run<S, F, T>(
        &self,
        source: &mut S,
        candidates: &[Candidate],
        mut sink: F,
    ) -> FeatureResult<BatchReport<T>>
    where
        S: RawDataSource + ?Sized,
        F: FnMut(FeatureSet) -> FeatureResult<T>,
    {
        let header = source.header()?;
        header.validate()?;
        self.metrics.reset();
        info!(
            "Featurizing {} candidates over {} channels ({:.3}-{:.3} MHz, dt={:.3e} s) on {} threads",
            candidates.len(),
            header.nf,
            header.fl,
            header.fh,
            header.dt,
            self.device.threads()
        );

        let mut outcomes = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let result = self
                .featurize(source, &header, candidate)
                .and_then(&mut sink)
                .map_err(|e| CandidateFailure::new(candidate, e));
            match &result {
                Ok(_) => self.metrics.record_processed(),
                Err(failure) => {
                    LogManager::for_candidate(candidate).warn(&failure.to_string());
                    self.metrics.record_error();
                }
            }
            outcomes.push(CandidateOutcome {
                candidate: *candidate,
                result,
            });
        }

        let metrics = self.metrics.snapshot();
        info!(
            "Batch complete: {} featurized, {} failed, {:.1} ms in kernels",
            metrics.processed,
            metrics.errors,
            metrics.kernel_time.as_secs_f64() * 1e3
        );
        Ok(BatchReport { outcomes, metrics })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::dispersion::delay_bin;
    use crate::prelude::FeatureError;
    use crate::source::{ArraySource, SourceResult};
    use ndarray::{Array2, Axis};

    /// Source that synthesises samples on read: hashed noise in `[0, 1)` plus
    /// a dispersed pulse arriving at `t0` at the top of the band.
    struct PulseSource {
        header: RawHeader,
        nt: usize,
        arrival: usize,
        delays: Vec<usize>,
    }

    impl PulseSource {
        fn new(header: RawHeader, nt: usize, t0: f64, dm: f64) -> Self {
            let delays = (0..header.nf)
                .map(|fi| delay_bin(header.channel_freq(fi), header.fh, dm, header.dt) as usize)
                .collect();
            Self {
                arrival: (t0 / header.dt).round() as usize,
                header,
                nt,
                delays,
            }
        }

        fn sample(&self, fi: usize, t: usize) -> f32 {
            let mut x = (fi as u64) << 32 ^ t as u64;
            x = (x ^ (x >> 33)).wrapping_mul(0xff51afd7ed558ccd);
            x ^= x >> 33;
            let noise = (x >> 40) as f32 / (1u64 << 24) as f32;
            if t == self.arrival + self.delays[fi] {
                noise + 20.0
            } else {
                noise
            }
        }
    }

    impl RawDataSource for PulseSource {
        fn header(&self) -> SourceResult<RawHeader> {
            Ok(self.header.clone())
        }

        fn nt(&self) -> usize {
            self.nt
        }

        fn read(&mut self, offset: usize, count: usize, _beam: Option<usize>) -> SourceResult<Array2<f32>> {
            Ok(Array2::from_shape_fn((self.header.nf, count), |(fi, t)| {
                self.sample(fi, offset + t)
            }))
        }
    }

    fn reference_header() -> RawHeader {
        RawHeader::from_band(1200.0, 1500.0, 4096, 64e-6, 8)
    }

    #[test]
    fn reference_candidate_plan() {
        let header = reference_header();
        let candidate = Candidate::new(10.0, 100.0, 12.0, 4);
        let bounds = WindowExtractor::bounds(&candidate, &header);
        let plan = ParameterPlanner::new(PlannerConfig::default())
            .plan(&candidate, &header, bounds.nread)
            .unwrap();
        assert_eq!(plan.downf, 16);
        assert_eq!(plan.downt, 2);
        assert_eq!(plan.nfdown, 256);
        assert!(plan.ntdown >= 256);
        assert!(plan.dmlow <= 100.0 && 100.0 <= plan.dmhigh);
    }

    #[test]
    fn reference_candidate_end_to_end() {
        let header = reference_header();
        let candidate = Candidate::new(10.0, 100.0, 12.0, 4);
        let mut source = PulseSource::new(header.clone(), 160_000, candidate.t0, candidate.dm);

        let device = Device::acquire(0).unwrap();
        let featurizer = Featurizer::new(&device, FeatureConfig::default());
        let features = featurizer.featurize(&mut source, &header, &candidate).unwrap();

        assert!(features.nread >= 512);
        assert_eq!(features.plan.downf, 16);
        assert_eq!(features.plan.downt, 2);
        assert_eq!(features.dedispersed.data.dim(), (256, 256));
        assert_eq!(features.dmtransform.data.dim(), (256, 256));
        assert!(features.dmtransform.dmlow <= 100.0 && 100.0 <= features.dmtransform.dmhigh);
    }

    #[test]
    fn widened_window_end_to_end() {
        let header = reference_header();
        let candidate = Candidate::new(10.0, 1.0, 12.0, 4);
        let mut source = PulseSource::new(header.clone(), 200_000, candidate.t0, candidate.dm);

        let device = Device::acquire(4).unwrap();
        let featurizer = Featurizer::new(&device, FeatureConfig::default());
        let features = featurizer.featurize(&mut source, &header, &candidate).unwrap();

        assert_eq!(features.nread, 512);
        assert_eq!(features.plan.downf, 16);
        assert_eq!(features.plan.downt, 2);
        assert_eq!(features.dedispersed.data.dim(), (256, 256));
        assert_eq!(features.dmtransform.data.dim(), (256, 256));
        assert!((features.dedispersed.dt - 128e-6).abs() < 1e-15);

        // The dedispersed pulse is brightest in the central columns.
        let profile = features.dedispersed.data.sum_axis(Axis(0));
        let peak = profile
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert!((120..136).contains(&peak), "peak at {}", peak);
    }

    #[test]
    fn features_are_square_across_widths_and_dms() {
        let header = RawHeader::from_band(1200.0, 1500.0, 300, 1e-3, 8);
        let mut source = PulseSource::new(header.clone(), 20_000, 8.0, 50.0);
        let device = Device::acquire(2).unwrap();
        let featurizer = Featurizer::new(&device, FeatureConfig::default());
        for &(dm, wbin) in &[(0.0, 1), (50.0, 2), (50.0, 3), (120.0, 7), (10.0, 16)] {
            let candidate = Candidate::new(8.0, dm, 10.0, wbin);
            let features = featurizer.featurize(&mut source, &header, &candidate).unwrap();
            assert!(features.nread >= 256);
            assert_eq!(features.dedispersed.data.dim(), (256, 256));
            assert_eq!(features.dmtransform.data.dim(), (256, 256));
        }
    }

    #[test]
    fn failing_candidate_does_not_stop_the_batch() {
        let header = RawHeader::from_band(1200.0, 1500.0, 64, 1e-3, 8);
        let mut source = PulseSource::new(header, 4_000, 2.0, 30.0);
        let candidates = [
            Candidate::new(2.0, 30.0, 10.0, 2),
            Candidate::new(100.0, 30.0, 10.0, 2),
            Candidate::new(1.0, -5.0, 10.0, 2),
            Candidate::new(3.0, 20.0, 10.0, 1),
        ];
        let device = Device::acquire(2).unwrap();
        let featurizer = Featurizer::new(&device, FeatureConfig::default());
        let report = featurizer
            .run(&mut source, &candidates, |features| Ok(features.id()))
            .unwrap();

        assert_eq!(report.outcomes.len(), 4);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.metrics.processed, 2);
        assert_eq!(report.metrics.errors, 2);

        let failures: Vec<String> = report.failures().map(|f| f.to_string()).collect();
        assert!(failures[0].contains("t0=100.0000000"));
        assert!(failures[0].contains("data unavailable"));
        assert!(failures[1].contains("`dm`"));
        assert!(matches!(
            report.outcomes[2].result,
            Err(CandidateFailure {
                source: FeatureError::Configuration { .. },
                ..
            })
        ));
    }

    #[test]
    fn metrics_cover_one_batch_only() {
        let header = RawHeader::from_band(1200.0, 1500.0, 64, 1e-3, 8);
        let mut source = PulseSource::new(header, 4_000, 2.0, 30.0);
        let device = Device::acquire(1).unwrap();
        let featurizer = Featurizer::new(&device, FeatureConfig::default());

        let first = featurizer
            .run(&mut source, &[Candidate::new(2.0, 30.0, 10.0, 2)], |_| Ok(()))
            .unwrap();
        assert_eq!(first.metrics.processed, 1);

        let second = featurizer
            .run(
                &mut source,
                &[Candidate::new(3.0, 30.0, 10.0, 2), Candidate::new(100.0, 30.0, 10.0, 2)],
                |_| Ok(()),
            )
            .unwrap();
        assert_eq!(second.outcomes.len(), 2);
        assert_eq!(second.metrics.processed, 1);
        assert_eq!(second.metrics.errors, 1);
    }

    #[test]
    fn sink_failure_is_reported_per_candidate() {
        let header = RawHeader::from_band(1200.0, 1500.0, 64, 1e-3, 8);
        let mut source = PulseSource::new(header, 4_000, 2.0, 30.0);
        let candidates = [Candidate::new(2.0, 30.0, 10.0, 2), Candidate::new(3.0, 30.0, 10.0, 2)];
        let device = Device::acquire(1).unwrap();
        let featurizer = Featurizer::new(&device, FeatureConfig::default());
        let mut calls = 0;
        let report = featurizer
            .run(&mut source, &candidates, |_| {
                calls += 1;
                if calls == 1 {
                    Err(FeatureError::Persist("disk full".into()))
                } else {
                    Ok(())
                }
            })
            .unwrap();
        assert_eq!(report.succeeded(), 1);
        assert!(report.failures().next().unwrap().to_string().contains("disk full"));
    }

    #[test]
    fn invalid_header_aborts_before_any_candidate() {
        let mut header = RawHeader::from_band(1200.0, 1500.0, 64, 1e-3, 8);
        header.df = -1.0;
        let mut source = ArraySource::new(header, Array2::zeros((64, 1000)));
        let device = Device::acquire(1).unwrap();
        let featurizer = Featurizer::new(&device, FeatureConfig::default());
        let result = featurizer.run(&mut source, &[Candidate::new(0.5, 1.0, 8.0, 1)], |_| Ok(()));
        assert!(matches!(result, Err(FeatureError::Configuration { ref field, .. }) if field == "df"));
    }
}
