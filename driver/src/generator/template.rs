/// Full width at half maximum of a unit Gaussian, in standard deviations.
const FWHM_SIGMAS: f64 = 2.354_820_045;

/// Gaussian pulse of `fwhm` samples centred on `centre`, sampled at the
/// integer indices it reaches above 1e-3 of its peak.
pub fn gaussian_pulse(centre: f64, fwhm: f64, amplitude: f32) -> impl Iterator<Item = (i64, f32)> {
    let sigma = (fwhm / FWHM_SIGMAS).max(0.25);
    let reach = (3.72 * sigma).ceil() as i64;
    let peak = centre.round() as i64;
    (peak - reach..=peak + reach).filter_map(move |i| {
        let x = (i as f64 - centre) / sigma;
        let value = amplitude as f64 * (-0.5 * x * x).exp();
        (value.abs() >= 1e-3 * amplitude.abs() as f64).then_some((i, value as f32))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_peaks_at_centre_and_halves_at_fwhm() {
        let samples: Vec<(i64, f32)> = gaussian_pulse(50.0, 4.0, 10.0).collect();
        let peak = samples.iter().find(|(i, _)| *i == 50).unwrap().1;
        assert!((peak - 10.0).abs() < 1e-6);
        let half = samples.iter().find(|(i, _)| *i == 52).unwrap().1;
        assert!((half - 5.0).abs() < 1e-3);
        assert!(samples.iter().all(|&(_, v)| v > 0.0 && v <= 10.0));
    }

    #[test]
    fn narrow_pulse_still_lands_on_a_sample() {
        let samples: Vec<(i64, f32)> = gaussian_pulse(7.3, 0.1, 1.0).collect();
        assert!(samples.iter().any(|&(i, _)| i == 7));
    }
}
