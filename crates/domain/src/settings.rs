use crate::{ExerciseDraft, MediumPolicy, ReadError, Target, Title, UpdateError, Units};

pub trait SettingsRepository {
    /// Returns the defaults if no settings have been written yet.
    fn read_settings(&self) -> Result<ProgressionSettings, ReadError>;
    fn write_settings(&self, settings: ProgressionSettings) -> Result<(), UpdateError>;
}

/// Tuning parameters of the momentum progression.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressionSettings {
    /// Number of most recent ratings, including the new one, that contribute
    /// to the hard weight.
    pub window: usize,
    /// Maximum magnitude of the increment relative to the current target.
    pub ceiling_ratio: f64,
    /// Ordered lookup table from hard weight to momentum change.
    pub momentum_steps: Vec<MomentumStep>,
    pub medium_policy: MediumPolicy,
    /// Increment of newly created exercises.
    pub initial_increment: f64,
    /// Momentum of newly created exercises.
    pub initial_momentum: f64,
}

impl ProgressionSettings {
    /// Momentum change for the first bucket containing `total_hard_weight`.
    #[must_use]
    pub fn momentum_step(&self, total_hard_weight: f64) -> f64 {
        self.momentum_steps
            .iter()
            .find(|s| s.up_to.is_none_or(|up_to| total_hard_weight <= up_to))
            .map_or(0.0, |s| s.step)
    }

    /// Draft of a new exercise starting with the configured increment and momentum.
    #[must_use]
    pub fn draft(&self, title: Title, units: Units, initial_target: Target) -> ExerciseDraft {
        ExerciseDraft {
            title,
            units,
            initial_target,
            initial_increment: self.initial_increment,
            initial_momentum: self.initial_momentum,
            alternates_sides: false,
            notes: String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.window == 0 {
            return Err(SettingsError::EmptyWindow);
        }
        if !(self.ceiling_ratio.is_finite() && self.ceiling_ratio > 0.0) {
            return Err(SettingsError::InvalidCeilingRatio(self.ceiling_ratio));
        }
        if let Some(value) = [self.initial_increment, self.initial_momentum]
            .into_iter()
            .chain(
                self.momentum_steps
                    .iter()
                    .flat_map(|s| s.up_to.into_iter().chain([s.step])),
            )
            .find(|v| !v.is_finite())
        {
            return Err(SettingsError::NonFiniteValue(value));
        }
        if self.momentum_steps.last().is_none_or(|s| s.up_to.is_some()) {
            return Err(SettingsError::UnboundedBucketMissing);
        }
        if self
            .momentum_steps
            .windows(2)
            .any(|w| match (w[0].up_to, w[1].up_to) {
                (Some(a), Some(b)) => a >= b,
                (None, _) => true,
                (Some(_), None) => false,
            })
        {
            return Err(SettingsError::UnorderedBuckets);
        }
        Ok(())
    }
}

impl Default for ProgressionSettings {
    fn default() -> Self {
        Self {
            window: 100,
            ceiling_ratio: 0.03,
            momentum_steps: vec![
                MomentumStep::up_to(1.0, 0.015),
                MomentumStep::up_to(2.0, 0.01),
                MomentumStep::up_to(3.0, 0.005),
                MomentumStep::up_to(5.0, -0.01),
                MomentumStep::up_to(7.0, -0.05),
                MomentumStep::up_to(15.0, -0.1),
                MomentumStep::otherwise(-0.2),
            ],
            medium_policy: MediumPolicy::default(),
            initial_increment: 0.0,
            initial_momentum: 0.0,
        }
    }
}

/// Bucket of the momentum lookup table. `up_to` is inclusive; `None` matches
/// any remaining weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MomentumStep {
    pub up_to: Option<f64>,
    pub step: f64,
}

impl MomentumStep {
    #[must_use]
    pub const fn up_to(up_to: f64, step: f64) -> Self {
        Self {
            up_to: Some(up_to),
            step,
        }
    }

    #[must_use]
    pub const fn otherwise(step: f64) -> Self {
        Self { up_to: None, step }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum SettingsError {
    #[error("Window must contain at least one rating")]
    EmptyWindow,
    #[error("Ceiling ratio must be a positive number ({0})")]
    InvalidCeilingRatio(f64),
    #[error("Settings must only contain finite numbers ({0})")]
    NonFiniteValue(f64),
    #[error("Momentum table must end with an unbounded bucket")]
    UnboundedBucketMissing,
    #[error("Momentum buckets must be in ascending order")]
    UnorderedBuckets,
}
