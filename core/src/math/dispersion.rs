//! Cold-plasma dispersion relations.
//!
//! Frequencies are in MHz, times in seconds and DMs in pc cm^-3.

use crate::model::RawHeader;
use ndarray::{Array2, ArrayView1};

/// Dispersion constant in s MHz^2 cm^3 / pc.
pub const KDM: f64 = 4.148808e3;

/// Delay between `fh` and `fl` at dispersion measure `dm`.
pub fn dm2delay(fl: f64, fh: f64, dm: f64) -> f64 {
    KDM * dm * (fl.powi(-2) - fh.powi(-2))
}

/// Dispersion measure that produces `delay` seconds between `fh` and `fl`.
pub fn delay2dm(fl: f64, fh: f64, delay: f64) -> f64 {
    delay / (KDM * (fl.powi(-2) - fh.powi(-2)))
}

/// Delay of frequency `f` relative to `fh`, in whole samples.
///
/// Rounds half away from zero. Both kernels go through this function so
/// their alignment agrees bit for bit.
pub fn delay_bin(f: f64, fh: f64, dm: f64, dt: f64) -> i64 {
    (KDM * dm * (f.powi(-2) - fh.powi(-2)) / dt).round() as i64
}

/// Per-channel sample shifts for one or more trial DMs, already reduced
/// modulo the window length.
#[derive(Debug, Clone)]
pub struct DelayTable {
    shifts: Array2<usize>,
}

impl DelayTable {
    pub fn single(header: &RawHeader, dm: f64, nt: usize) -> Self {
        Self::grid(header, &[dm], nt)
    }

    pub fn grid(header: &RawHeader, dms: &[f64], nt: usize) -> Self {
        let nt = nt.max(1) as i64;
        let shifts = Array2::from_shape_fn((dms.len(), header.nf), |(di, fi)| {
            let dbin = delay_bin(header.channel_freq(fi), header.fh, dms[di], header.dt);
            dbin.rem_euclid(nt) as usize
        });
        Self { shifts }
    }

    pub fn ndms(&self) -> usize {
        self.shifts.nrows()
    }

    pub fn row(&self, dmi: usize) -> ArrayView1<'_, usize> {
        self.shifts.row(dmi)
    }
}

/// Circular read index for sample `ti` shifted by `shift < nt`.
#[inline]
pub fn wrap(ti: usize, shift: usize, nt: usize) -> usize {
    let x = ti + shift;
    if x >= nt {
        x - nt
    } else {
        x
    }
}
