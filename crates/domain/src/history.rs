use chrono::{DateTime, Utc};
use derive_more::Deref;
use uuid::Uuid;

use crate::{
    AppendError, CommitError, Difficulty, Exercise, ExerciseID, ReadError, Side, StashedExercise,
};

/// Append-only history of performed sets.
pub trait LogRepository {
    /// Fails with [`DuplicateLog`] if a log with the same exercise and
    /// timestamp exists.
    fn append_log(&self, log: Log) -> Result<Log, AppendError>;
    /// Most recent logs of an exercise, newest first.
    fn read_recent_logs(&self, exercise_id: ExerciseID, limit: usize)
    -> Result<Vec<Log>, ReadError>;
    fn read_logs(&self) -> Result<Vec<Log>, ReadError>;
}

/// Atomic write-back of a completed set.
///
/// Either both the updated state and the log are stored or neither is.
pub trait CompletionRepository {
    fn commit_completion(&self, exercise: Exercise, log: Log) -> Result<(), CommitError>;
    fn commit_stashed_completion(
        &self,
        stashed_exercise: StashedExercise,
        log: Log,
    ) -> Result<(), CommitError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Log {
    pub id: LogID,
    pub timestamp: DateTime<Utc>,
    pub exercise_id: ExerciseID,
    /// Seconds elapsed on the stopwatch.
    pub duration: u32,
    /// Repetitions or seconds achieved.
    pub recorded_value: u32,
    pub difficulty: Difficulty,
    pub side: Option<Side>,
}

impl Log {
    /// Uniqueness key of a log.
    #[must_use]
    pub fn key(&self) -> (ExerciseID, DateTime<Utc>) {
        (self.exercise_id, self.timestamp)
    }
}

#[derive(Deref, Debug, Default, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct LogID(Uuid);

impl LogID {
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<Uuid> for LogID {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<u128> for LogID {
    fn from(value: u128) -> Self {
        Self(Uuid::from_bytes(value.to_be_bytes()))
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("log of exercise {exercise_id} at {timestamp} already exists")]
pub struct DuplicateLog {
    pub exercise_id: ExerciseID,
    pub timestamp: DateTime<Utc>,
}

impl From<&Log> for DuplicateLog {
    fn from(value: &Log) -> Self {
        Self {
            exercise_id: value.exercise_id,
            timestamp: value.timestamp,
        }
    }
}
