use crate::math::dispersion::{wrap, DelayTable};
use crate::prelude::{check_geometry, FeatureResult, Kernel, KernelInput};
use crate::processing::device::Device;
use ndarray::Array2;
use rayon::prelude::*;

/// Shifts every channel by its delay at the candidate's DM and sums the
/// result into an `nfdown x ntdown` spectrum.
///
/// Each work item covers one channel; workers fold into private partial
/// spectra that are summed once at the end, so the result does not depend on
/// scheduling. Channels past `nfdown * downf` and samples past
/// `ntdown * downt` fall outside the downsampled grid and are dropped.
pub struct DedispersionKernel;

impl Kernel for DedispersionKernel {
    fn name(&self) -> &'static str {
        "dedisperse"
    }

    fn launch(&self, device: &Device, input: &KernelInput<'_>) -> FeatureResult<Array2<f32>> {
        let (nf, nt) = check_geometry(self.name(), input)?;
        let plan = input.plan;
        let (nfdown, ntdown) = (plan.nfdown, plan.ntdown);
        let (downf, downt) = (plan.downf, plan.downt);
        let table = DelayTable::single(input.header, input.dm, nt);
        let shifts = table.row(0);
        let data = &input.window.data;

        let spectrum = device.launch(|| {
            (0..nf)
                .into_par_iter()
                .filter(|fi| fi / downf < nfdown)
                .fold(
                    || Array2::<f32>::zeros((nfdown, ntdown)),
                    |mut acc, fi| {
                        let (row, shift) = (fi / downf, shifts[fi]);
                        let channel = data.row(fi);
                        for ti in 0..(ntdown * downt).min(nt) {
                            acc[[row, ti / downt]] += channel[wrap(ti, shift, nt)];
                        }
                        acc
                    },
                )
                .reduce(
                    || Array2::<f32>::zeros((nfdown, ntdown)),
                    |mut a, b| {
                        a += &b;
                        a
                    },
                )
        });
        Ok(spectrum)
    }
}
