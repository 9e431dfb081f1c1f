mod peak;
mod ref_spectrum;
mod retention_time;

pub use peak::Peak;
pub use ref_spectrum::{
    IonKey,
    RefSpectrum,
    SmallMoleculeInfo,
};
pub use retention_time::RetentionTimeRow;
