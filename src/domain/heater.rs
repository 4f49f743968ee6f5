// Heater profile: timed temperature set-points for the gas sensor's heating element
use serde::{Deserialize, Serialize};

const DEFAULT_DWELL_MS: u64 = 140;
const DEFAULT_TARGET_C: f64 = 320.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaterStep {
    pub dwell_ms: u64,
    pub target_c: f64,
}

impl Default for HeaterStep {
    fn default() -> Self {
        Self {
            dwell_ms: DEFAULT_DWELL_MS,
            target_c: DEFAULT_TARGET_C,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepField {
    DwellMs,
    TargetC,
}

/// Ordered duty cycle. An empty profile is a cycle of zero duration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeaterProfile {
    steps: Vec<HeaterStep>,
}

impl HeaterProfile {
    pub fn new(steps: Vec<HeaterStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[HeaterStep] {
        &self.steps
    }

    pub fn add_step(&mut self) {
        self.steps.push(HeaterStep::default());
    }

    /// Replace one field of the step at `index`. Out-of-range indexes are ignored.
    pub fn update_step(&mut self, index: usize, field: StepField, value: f64) {
        let Some(step) = self.steps.get_mut(index) else {
            return;
        };
        match field {
            StepField::DwellMs => step.dwell_ms = value.max(0.0).round() as u64,
            StepField::TargetC => step.target_c = value,
        }
    }

    pub fn remove_step(&mut self, index: usize) {
        if index < self.steps.len() {
            self.steps.remove(index);
        }
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.steps.iter().map(|s| s.dwell_ms).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_steps() -> HeaterProfile {
        HeaterProfile::new(vec![
            HeaterStep { dwell_ms: 100, target_c: 200.0 },
            HeaterStep { dwell_ms: 150, target_c: 250.0 },
            HeaterStep { dwell_ms: 200, target_c: 300.0 },
        ])
    }

    #[test]
    fn test_add_step_uses_non_zero_defaults() {
        let mut p = HeaterProfile::default();
        p.add_step();
        assert_eq!(p.steps().len(), 1);
        assert!(p.steps()[0].dwell_ms > 0);
        assert!(p.steps()[0].target_c > 0.0);
    }

    #[test]
    fn test_total_duration() {
        assert_eq!(three_steps().total_duration_ms(), 450);
        assert_eq!(HeaterProfile::default().total_duration_ms(), 0);
    }

    #[test]
    fn test_update_step() {
        let mut p = three_steps();
        p.update_step(1, StepField::TargetC, 275.5);
        p.update_step(1, StepField::DwellMs, 90.0);
        assert_eq!(p.steps()[1], HeaterStep { dwell_ms: 90, target_c: 275.5 });
        assert_eq!(p.total_duration_ms(), 390);
    }

    #[test]
    fn test_negative_dwell_clamps_to_zero() {
        let mut p = three_steps();
        p.update_step(0, StepField::DwellMs, -50.0);
        assert_eq!(p.steps()[0].dwell_ms, 0);
    }

    #[test]
    fn test_out_of_range_update_is_noop() {
        let mut p = three_steps();
        p.update_step(7, StepField::DwellMs, 1.0);
        assert_eq!(p, three_steps());
    }

    #[test]
    fn test_out_of_range_remove_is_noop() {
        let mut p = three_steps();
        p.remove_step(3);
        assert_eq!(p.steps().len(), 3);
        assert_eq!(p, three_steps());

        let mut empty = HeaterProfile::default();
        empty.remove_step(0);
        assert!(empty.steps().is_empty());
    }

    #[test]
    fn test_remove_step() {
        let mut p = three_steps();
        p.remove_step(0);
        assert_eq!(p.steps()[0].dwell_ms, 150);
        assert_eq!(p.steps().len(), 2);
    }
}
