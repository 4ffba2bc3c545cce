//! CPU threshold policy

use crate::sampler::ProcessSample;

/// True iff `sample` is strictly above `threshold`. A sample exactly at the
/// threshold is not flagged.
pub fn evaluate(sample: &ProcessSample, threshold: f64) -> bool {
    sample.cpu_percent > threshold
}

#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f64,
    pub threshold_percent: f64,
}

pub trait Detector: Send + Sync {
    fn check(&self, sample: &ProcessSample) -> Option<Violation>;
}

/// Flags on a single over-threshold sample. There is no hysteresis, so a
/// process hovering around the threshold can be flagged on every cycle.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdDetector {
    threshold_percent: f64,
}

impl ThresholdDetector {
    pub fn new(threshold_percent: f64) -> Self {
        Self { threshold_percent }
    }
}

impl Detector for ThresholdDetector {
    fn check(&self, sample: &ProcessSample) -> Option<Violation> {
        evaluate(sample, self.threshold_percent).then(|| Violation {
            pid: sample.pid,
            name: sample.name.clone(),
            cpu_percent: sample.cpu_percent,
            threshold_percent: self.threshold_percent,
        })
    }
}
