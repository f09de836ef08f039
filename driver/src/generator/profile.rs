use crate::generator::template::gaussian_pulse;
use anyhow::{ensure, Context};
use candycore::math::dispersion::dm2delay;
use candycore::source::SigprocWriter;
use candycore::{Candidate, RawHeader};
use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A dispersed pulse to inject.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InjectedPulse {
    /// Arrival time at the top of the band, in seconds.
    pub t0: f64,
    pub dm: f64,
    /// Width in samples (full width at half maximum).
    pub width: usize,
    /// Peak height per channel, in units of the noise level.
    pub amplitude: f32,
}

/// Configuration for generating a synthetic filterbank.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub fl: f64,
    pub fh: f64,
    pub nf: usize,
    pub dt: f64,
    pub nbits: u32,
    /// Observation length in seconds.
    pub duration: f64,
    pub tstart: f64,
    /// Baseline sample level.
    pub baseline: f32,
    /// Half-width of the uniform noise around the baseline.
    pub noise: f32,
    pub seed: u64,
    pub pulses: Vec<InjectedPulse>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            fl: 1200.0,
            fh: 1500.0,
            nf: 256,
            dt: 1e-3,
            nbits: 8,
            duration: 10.0,
            tstart: 60000.0,
            baseline: 64.0,
            noise: 16.0,
            seed: 0,
            pulses: vec![InjectedPulse {
                t0: 5.0,
                dm: 100.0,
                width: 4,
                amplitude: 1.5,
            }],
        }
    }
}

impl GeneratorConfig {
    pub fn header(&self) -> RawHeader {
        RawHeader::from_band(self.fl, self.fh, self.nf, self.dt, self.nbits).with_tstart(self.tstart)
    }

    pub fn nt(&self) -> usize {
        (self.duration / self.dt).round() as usize
    }

    fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.nf > 1, "need at least two channels, got {}", self.nf);
        ensure!(self.fh > self.fl, "band [{}, {}] MHz is empty", self.fl, self.fh);
        ensure!(self.dt > 0.0, "sampling time must be positive, got {}", self.dt);
        ensure!(self.nt() > 0, "duration {} s holds no samples", self.duration);
        ensure!(self.noise >= 0.0, "noise must be non-negative, got {}", self.noise);
        Ok(())
    }

    fn peak(&self, pulse: &InjectedPulse) -> f32 {
        pulse.amplitude * self.noise.max(1.0)
    }

    /// Candidate a single-pulse search would report for each injected pulse.
    pub fn candidates(&self) -> Vec<Candidate> {
        // Standard deviation of the uniform noise.
        let rms = (self.noise / 3f32.sqrt()).max(f32::EPSILON) as f64;
        self.pulses
            .iter()
            .map(|p| {
                let wbin = p.width.max(1);
                let snr = self.peak(p) as f64 * ((self.nf * wbin) as f64).sqrt() / rms;
                Candidate::new(p.t0, p.dm, snr, wbin)
            })
            .collect()
    }
}

/// Builds the `nf x nt` block: uniform noise around the baseline plus every
/// injected pulse, swept across the band by its DM.
pub fn build_block(config: &GeneratorConfig) -> anyhow::Result<Array2<f32>> {
    config.validate()?;
    let header = config.header();
    let nt = config.nt();
    let nf = config.nf;
    let cells = nf
        .checked_mul(nt)
        .context("overflow computing sample count for generator")?;
    log::debug!("Generating {} channels x {} samples ({} values)", nf, nt, cells);

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut block = Array2::<f32>::from_elem((nf, nt), config.baseline);
    if config.noise > 0.0 {
        block.mapv_inplace(|v| v + rng.gen_range(-config.noise..config.noise));
    }

    for pulse in &config.pulses {
        let amplitude = config.peak(pulse);
        for fi in 0..nf {
            let delay = dm2delay(header.channel_freq(fi), header.fh, pulse.dm);
            let centre = (pulse.t0 + delay) / config.dt;
            for (ti, value) in gaussian_pulse(centre, pulse.width.max(1) as f64, amplitude) {
                if (0..nt as i64).contains(&ti) {
                    block[[fi, ti as usize]] += value;
                }
            }
        }
    }
    Ok(block)
}

/// Writes a synthetic filterbank to `path` and returns the matching
/// candidates.
pub fn write_filterbank(config: &GeneratorConfig, path: &Path) -> anyhow::Result<Vec<Candidate>> {
    let block = build_block(config)?;
    let mut writer = SigprocWriter::create(path, &config.header(), "candies_simulation")
        .with_context(|| format!("creating filterbank {}", path.display()))?;
    writer
        .write_block(block.view())
        .with_context(|| format!("writing samples to {}", path.display()))?;
    writer.finish().context("flushing filterbank")?;
    Ok(config.candidates())
}
