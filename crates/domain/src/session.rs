use chrono::{DateTime, Duration, Utc};

use crate::ExerciseID;

/// State of one training session: the exercise currently presented and the
/// stopwatch timing the set in progress.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub exercise_id: Option<ExerciseID>,
    /// Exercise of the last completed set, excluded from the next selection.
    pub last_completed: Option<ExerciseID>,
    pub stopwatch: Stopwatch,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Present a new exercise and restart timing.
    pub fn present(&mut self, exercise_id: ExerciseID) {
        self.exercise_id = Some(exercise_id);
        self.stopwatch.reset();
    }

    /// Finish the presented exercise. It stays excluded from the next selection.
    pub fn complete(&mut self, exercise_id: ExerciseID) {
        self.exercise_id = None;
        self.last_completed = Some(exercise_id);
        self.stopwatch.reset();
    }

    /// Exercise to avoid when selecting the next one.
    #[must_use]
    pub fn excluded(&self) -> Option<ExerciseID> {
        self.exercise_id.or(self.last_completed)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stopwatch {
    started_at: Option<DateTime<Utc>>,
    accumulated: Duration,
}

impl Stopwatch {
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    /// Start or resume. Has no effect if already running.
    pub fn start(&mut self, now: DateTime<Utc>) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    pub fn pause(&mut self, now: DateTime<Utc>) {
        if let Some(started_at) = self.started_at.take() {
            self.accumulated += (now - started_at).max(Duration::zero());
        }
    }

    pub fn reset(&mut self) {
        self.started_at = None;
        self.accumulated = Duration::zero();
    }

    #[must_use]
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        self.accumulated
            + self
                .started_at
                .map_or(Duration::zero(), |started_at| {
                    (now - started_at).max(Duration::zero())
                })
    }

    /// Elapsed time in whole seconds.
    #[must_use]
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> u32 {
        u32::try_from(self.elapsed(now).num_seconds()).unwrap_or(u32::MAX)
    }
}
