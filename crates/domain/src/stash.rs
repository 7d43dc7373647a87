use chrono::{DateTime, Utc};
use derive_more::Deref;
use uuid::Uuid;

use crate::{CreateError, DeleteError, Exercise, ExerciseID, ReadError};

pub trait StashRepository {
    fn create_stashed_exercise(
        &self,
        stashed_exercise: StashedExercise,
    ) -> Result<StashedExercise, CreateError>;
    fn read_stashed_exercise(&self, id: StashID) -> Result<Option<StashedExercise>, ReadError>;
    /// All stashed exercises, oldest first.
    fn read_stashed_exercises(&self) -> Result<Vec<StashedExercise>, ReadError>;
    fn delete_stashed_exercise(&self, id: StashID) -> Result<StashID, DeleteError>;
}

/// Exercise set aside for later completion.
///
/// Holds its own copy of the exercise. Progress made on the copy does not
/// reach the original and changes to the original do not reach the copy.
#[derive(Debug, Clone, PartialEq)]
pub struct StashedExercise {
    pub id: StashID,
    pub stashed_at: DateTime<Utc>,
    pub exercise: Exercise,
}

impl StashedExercise {
    #[must_use]
    pub fn new(id: StashID, stashed_at: DateTime<Utc>, exercise: &Exercise) -> Self {
        Self {
            id,
            stashed_at,
            exercise: exercise.clone(),
        }
    }

    #[must_use]
    pub fn exercise_id(&self) -> ExerciseID {
        self.exercise.id
    }
}

#[derive(Deref, Debug, Default, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct StashID(Uuid);

impl StashID {
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<Uuid> for StashID {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<u128> for StashID {
    fn from(value: u128) -> Self {
        Self(Uuid::from_bytes(value.to_be_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{ExerciseDraft, Target, Title, Units};

    #[test]
    fn test_stashed_exercise_new() {
        let mut exercise = ExerciseDraft {
            title: Title::new("L-Sit").unwrap(),
            units: Units::Duration,
            initial_target: Target::new(15.0).unwrap(),
            initial_increment: 0.2,
            initial_momentum: 0.0,
            alternates_sides: false,
            notes: String::new(),
        }
        .into_exercise(7.into());
        let stashed_at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        let stashed_exercise = StashedExercise::new(1.into(), stashed_at, &exercise);
        exercise.current_target = 16.0;

        assert_eq!(stashed_exercise.exercise_id(), ExerciseID::from(7));
        assert_eq!(stashed_exercise.stashed_at, stashed_at);
        assert_eq!(stashed_exercise.exercise.current_target, 15.0);
    }
}
