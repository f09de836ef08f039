pub mod dispersion;
pub mod normalise;
pub mod stats;

pub use dispersion::DelayTable;
pub use normalise::{Normaliser, NormaliserKind};
pub use stats::StatsHelper;
