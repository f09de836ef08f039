use crate::math::dispersion::{wrap, DelayTable};
use crate::prelude::{check_geometry, FeatureResult, Kernel, KernelInput};
use crate::processing::device::Device;
use ndarray::Array2;
use rayon::prelude::*;

/// Brute-force DM-time transform over the planned DM grid.
///
/// One work item per `(ti, dmi)` pair sums all channels at that trial DM;
/// the sums land in `(dmi, ti / downt)` through per-worker partial planes
/// merged at the end.
pub struct DmTransformKernel;

/// Items handed to a worker at a time; one time sample across every DM.
const MIN_ITEMS_PER_TASK: usize = 256;

impl Kernel for DmTransformKernel {
    fn name(&self) -> &'static str {
        "dmt"
    }

    fn launch(&self, device: &Device, input: &KernelInput<'_>) -> FeatureResult<Array2<f32>> {
        let (nf, nt) = check_geometry(self.name(), input)?;
        let plan = input.plan;
        let (ndms, ntdown, downt) = (plan.ndms, plan.ntdown, plan.downt);
        let table = DelayTable::grid(input.header, &plan.dm_grid(), nt);
        let data = &input.window.data;
        let table = &table;

        let plane = device.launch(|| {
            (0..nt * ndms)
                .into_par_iter()
                .with_min_len(MIN_ITEMS_PER_TASK)
                .fold(
                    || Array2::<f32>::zeros((ndms, ntdown)),
                    |mut acc, item| {
                        let (ti, dmi) = (item / ndms, item % ndms);
                        let col = ti / downt;
                        if col >= ntdown {
                            return acc;
                        }
                        let shifts = table.row(dmi);
                        let mut sum = 0.0_f32;
                        for fi in 0..nf {
                            sum += data[[fi, wrap(ti, shifts[fi], nt)]];
                        }
                        acc[[dmi, col]] += sum;
                        acc
                    },
                )
                .reduce(
                    || Array2::<f32>::zeros((ndms, ntdown)),
                    |mut a, b| {
                        a += &b;
                        a
                    },
                )
        });
        Ok(plane)
    }
}
