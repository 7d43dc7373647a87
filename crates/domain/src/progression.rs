//! Adjustment of an exercise's target after each completed set.
//!
//! The canonical strategy is [`MomentumProgression`]. The increment applied to
//! the target is itself adjusted by a momentum term, which depends on how
//! often recent sets were rated hard. Recent ratings weigh more than old ones,
//! so a sustained run of hard sets slows progress faster than a single one.

use std::iter;

use crate::{
    Difficulty, MediumPolicy, ProgressionSettings, SettingsError, Target, TargetError, classify,
};

/// The part of an exercise the progression operates on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressionState {
    pub current_target: f64,
    pub increment: f64,
    pub increment_momentum: f64,
}

impl ProgressionState {
    /// A storable state has a target of at least 1 and a finite increment and
    /// momentum.
    pub fn validate(&self) -> Result<(), ProgressionStateError> {
        Target::new(self.current_target)?;
        if !self.increment.is_finite() {
            return Err(ProgressionStateError::NonFiniteIncrement(self.increment));
        }
        if !self.increment_momentum.is_finite() {
            return Err(ProgressionStateError::NonFiniteMomentum(
                self.increment_momentum,
            ));
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ProgressionStateError {
    #[error(transparent)]
    InvalidTarget(#[from] TargetError),
    #[error("Increment must be a finite number ({0})")]
    NonFiniteIncrement(f64),
    #[error("Momentum must be a finite number ({0})")]
    NonFiniteMomentum(f64),
}

pub trait ProgressionStrategy: Send + Sync {
    /// Number of prior logs the strategy needs to see.
    fn history_limit(&self) -> usize;

    /// Compute the state after a set rated `difficulty`.
    ///
    /// `history` contains the ratings of prior sets, newest first.
    fn progress(
        &self,
        state: ProgressionState,
        difficulty: Difficulty,
        history: &[Difficulty],
    ) -> ProgressionState;
}

/// Sum of the recency-weighted effort scores of the newest `window` ratings.
///
/// The rating at position `i` (0 = newest) has the weight `1 - i / n`, where
/// `n` is the number of ratings actually considered.
#[must_use]
pub fn total_hard_weight(
    ratings: &[Difficulty],
    window: usize,
    medium_policy: MediumPolicy,
) -> f64 {
    let effective_window = ratings.len().min(window);
    #[allow(clippy::cast_precision_loss)]
    let n = effective_window as f64;
    ratings
        .iter()
        .take(effective_window)
        .enumerate()
        .map(|(i, difficulty)| {
            #[allow(clippy::cast_precision_loss)]
            let weight = 1.0 - i as f64 / n;
            weight * *classify(*difficulty, medium_policy)
        })
        .sum()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MomentumProgression {
    settings: ProgressionSettings,
}

impl MomentumProgression {
    pub fn new(settings: ProgressionSettings) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self { settings })
    }

    #[must_use]
    pub fn settings(&self) -> &ProgressionSettings {
        &self.settings
    }

    fn ceiling(&self, current_target: f64) -> f64 {
        current_target * self.settings.ceiling_ratio
    }
}

impl ProgressionStrategy for MomentumProgression {
    fn history_limit(&self) -> usize {
        self.settings.window.saturating_sub(1)
    }

    fn progress(
        &self,
        state: ProgressionState,
        difficulty: Difficulty,
        history: &[Difficulty],
    ) -> ProgressionState {
        let ratings = iter::once(difficulty)
            .chain(history.iter().copied())
            .take(self.settings.window)
            .collect::<Vec<_>>();
        let hard_weight =
            total_hard_weight(&ratings, self.settings.window, self.settings.medium_policy);

        let mut increment_momentum =
            state.increment_momentum + self.settings.momentum_step(hard_weight);

        let max_increment = self.ceiling(state.current_target);
        let attempted_increment = state.increment + increment_momentum;
        let mut increment = if attempted_increment.abs() <= max_increment {
            attempted_increment
        } else {
            increment_momentum = 0.0;
            max_increment.copysign(attempted_increment)
        };

        let mut current_target = state.current_target;
        if difficulty.is_hard() && increment > 0.0 {
            increment = 0.0;
            current_target -= 1.0;
        } else {
            current_target += increment;
        }
        current_target = current_target.max(Target::MIN);

        // The target may have shrunk, so the increment is bounded again.
        let max_increment = self.ceiling(current_target);
        increment = increment.clamp(-max_increment, max_increment);

        ProgressionState {
            current_target,
            increment,
            increment_momentum,
        }
    }
}

/// Constant step in both directions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedIncrementProgression {
    pub step: f64,
}

impl Default for FixedIncrementProgression {
    fn default() -> Self {
        Self { step: 1.0 }
    }
}

impl ProgressionStrategy for FixedIncrementProgression {
    fn history_limit(&self) -> usize {
        0
    }

    fn progress(
        &self,
        state: ProgressionState,
        difficulty: Difficulty,
        _: &[Difficulty],
    ) -> ProgressionState {
        let current_target = if difficulty.is_hard() {
            (state.current_target - self.step).max(Target::MIN)
        } else {
            state.current_target + self.step
        };
        ProgressionState {
            current_target,
            increment: current_target - state.current_target,
            increment_momentum: state.increment_momentum,
        }
    }
}

/// Step proportional to the current target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentageProgression {
    pub ratio: f64,
}

impl Default for PercentageProgression {
    fn default() -> Self {
        Self { ratio: 0.05 }
    }
}

impl ProgressionStrategy for PercentageProgression {
    fn history_limit(&self) -> usize {
        0
    }

    fn progress(
        &self,
        state: ProgressionState,
        difficulty: Difficulty,
        _: &[Difficulty],
    ) -> ProgressionState {
        let factor = if difficulty.is_hard() {
            1.0 - self.ratio
        } else {
            1.0 + self.ratio
        };
        let current_target = (state.current_target * factor).max(Target::MIN);
        ProgressionState {
            current_target,
            increment: current_target - state.current_target,
            increment_momentum: state.increment_momentum,
        }
    }
}
