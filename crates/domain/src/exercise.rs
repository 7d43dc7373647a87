use derive_more::Deref;
use uuid::Uuid;

use crate::{
    CreateError, DeleteError, Difficulty, ProgressionState, ProgressionStateError, ReadError,
    Title, UpdateError,
};

/// Current state of every trainable movement, keyed by id.
pub trait ExerciseRepository {
    fn read_exercise(&self, id: ExerciseID) -> Result<Option<Exercise>, ReadError>;
    fn read_exercises(&self) -> Result<Vec<Exercise>, ReadError>;
    fn read_active_exercises(&self) -> Result<Vec<Exercise>, ReadError> {
        Ok(self
            .read_exercises()?
            .into_iter()
            .filter(|e| e.is_active)
            .collect())
    }
    fn create_exercise(&self, draft: ExerciseDraft) -> Result<Exercise, CreateError>;
    fn replace_exercise(&self, exercise: Exercise) -> Result<Exercise, UpdateError>;
    /// Remove an exercise together with all of its logs.
    fn delete_exercise(&self, id: ExerciseID) -> Result<ExerciseID, DeleteError>;
    /// Remove all exercises, logs and stashed exercises.
    fn delete_all(&self) -> Result<(), DeleteError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exercise {
    pub id: ExerciseID,
    pub title: Title,
    pub units: Units,
    pub current_target: f64,
    pub increment: f64,
    pub increment_momentum: f64,
    pub last_difficulty: Option<Difficulty>,
    pub is_active: bool,
    pub alternates_sides: bool,
    pub current_side: Side,
    pub notes: String,
}

impl Exercise {
    #[must_use]
    pub fn progression_state(&self) -> ProgressionState {
        ProgressionState {
            current_target: self.current_target,
            increment: self.increment,
            increment_momentum: self.increment_momentum,
        }
    }

    pub fn validate(&self) -> Result<(), ProgressionStateError> {
        self.progression_state().validate()
    }

    pub fn apply(&mut self, state: ProgressionState, difficulty: Difficulty) {
        self.current_target = state.current_target;
        self.increment = state.increment;
        self.increment_momentum = state.increment_momentum;
        self.last_difficulty = Some(difficulty);
    }

    /// Side to record for the set currently being performed.
    #[must_use]
    pub fn side(&self) -> Option<Side> {
        self.alternates_sides.then_some(self.current_side)
    }

    pub fn toggle_side(&mut self) {
        if self.alternates_sides {
            self.current_side = self.current_side.opposite();
        }
    }

    /// Target as presented to the user: whole repetitions or whole seconds.
    #[must_use]
    pub fn display_target(&self) -> u32 {
        self.units.whole(self.current_target)
    }
}

#[derive(Deref, Debug, Default, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ExerciseID(Uuid);

impl ExerciseID {
    #[must_use]
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ExerciseID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for ExerciseID {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<u128> for ExerciseID {
    fn from(value: u128) -> Self {
        Self(Uuid::from_bytes(value.to_be_bytes()))
    }
}

/// Everything needed to create an exercise. The repository assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseDraft {
    pub title: Title,
    pub units: Units,
    pub initial_target: Target,
    pub initial_increment: f64,
    pub initial_momentum: f64,
    pub alternates_sides: bool,
    pub notes: String,
}

impl ExerciseDraft {
    pub fn validate(&self) -> Result<(), ProgressionStateError> {
        ProgressionState {
            current_target: *self.initial_target,
            increment: self.initial_increment,
            increment_momentum: self.initial_momentum,
        }
        .validate()
    }

    #[must_use]
    pub fn into_exercise(self, id: ExerciseID) -> Exercise {
        Exercise {
            id,
            title: self.title,
            units: self.units,
            current_target: *self.initial_target,
            increment: self.initial_increment,
            increment_momentum: self.initial_momentum,
            last_difficulty: None,
            is_active: true,
            alternates_sides: self.alternates_sides,
            current_side: Side::Left,
            notes: self.notes,
        }
    }
}

#[derive(Deref, Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Target(f64);

impl Target {
    pub const MIN: f64 = 1.0;

    pub fn new(value: f64) -> Result<Self, TargetError> {
        if !value.is_finite() {
            return Err(TargetError::NotFinite);
        }
        if value < Self::MIN {
            return Err(TargetError::TooSmall(value));
        }
        Ok(Self(value))
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum TargetError {
    #[error("Target must be a finite number")]
    NotFinite,
    #[error("Target must be 1 or greater ({0} < 1)")]
    TooSmall(f64),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Units {
    #[default]
    Reps = 0,
    Duration = 1,
}

impl Units {
    /// Truncate a target or achieved value to what is recorded for this unit.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn whole(self, value: f64) -> u32 {
        match self {
            Units::Reps => value.max(0.0).floor() as u32,
            Units::Duration => value.max(0.0).round() as u32,
        }
    }
}

impl TryFrom<u8> for Units {
    type Error = UnitsError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            x if x == Units::Reps as u8 => Ok(Units::Reps),
            x if x == Units::Duration as u8 => Ok(Units::Duration),
            _ => Err(UnitsError::Invalid(value)),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum UnitsError {
    #[error("Invalid units ({0})")]
    Invalid(u8),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Side {
    #[default]
    Left = 0,
    Right = 1,
}

impl Side {
    #[must_use]
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

impl TryFrom<u8> for Side {
    type Error = SideError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            x if x == Side::Left as u8 => Ok(Side::Left),
            x if x == Side::Right as u8 => Ok(Side::Right),
            _ => Err(SideError::Invalid(value)),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum SideError {
    #[error("Invalid side ({0})")]
    Invalid(u8),
}
