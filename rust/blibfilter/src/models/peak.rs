/// Upper bound for a plausible m/z value, anything above marks a corrupt blob.
pub const MAX_VALID_MZ: f64 = 100_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Peak {
    pub mz: f64,
    pub intensity: f32,
}

impl Peak {
    pub fn new(mz: f64, intensity: f32) -> Self {
        Self { mz, intensity }
    }

    /// Finite, non-negative, and the m/z no larger than [`MAX_VALID_MZ`].
    pub fn is_valid(&self) -> bool {
        self.mz.is_finite()
            && self.mz >= 0.0
            && self.mz <= MAX_VALID_MZ
            && self.intensity.is_finite()
            && self.intensity >= 0.0
    }
}
