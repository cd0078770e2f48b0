//! Time budgets for mutant execution

/// Computes how long a mutant may run given the unmutated run time
pub trait TimeoutStrategy: Send + Sync {
    fn compute_timeout(&self, baseline_ms: u64) -> u64;
}

/// `baseline * factor + constant`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentAndConstantTimeoutStrategy {
    factor: f32,
    constant_ms: u64,
}

impl PercentAndConstantTimeoutStrategy {
    pub const DEFAULT_FACTOR: f32 = 1.25;
    pub const DEFAULT_CONSTANT_MS: u64 = 4000;

    pub fn new(factor: f32, constant_ms: u64) -> Self {
        Self {
            factor,
            constant_ms,
        }
    }
}

impl Default for PercentAndConstantTimeoutStrategy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FACTOR, Self::DEFAULT_CONSTANT_MS)
    }
}

impl TimeoutStrategy for PercentAndConstantTimeoutStrategy {
    fn compute_timeout(&self, baseline_ms: u64) -> u64 {
        let scaled = (baseline_ms as f64 * f64::from(self.factor)).round() as u64;
        scaled.saturating_add(self.constant_ms)
    }
}
