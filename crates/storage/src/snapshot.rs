//! Persistent form of the in-memory repository.
//!
//! A snapshot is a versioned JSON document holding all exercises, logs,
//! stashed exercises and settings. Enums are stored by their numeric value
//! and ids as plain UUIDs.

#![allow(clippy::missing_errors_doc)]

use std::{fs, path::Path};

use chrono::{DateTime, Utc};
use log::{debug, info};
use overload_domain as domain;
use uuid::Uuid;

use crate::memory::{InMemory, State};

pub const VERSION: u32 = 1;

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub version: u32,
    pub exercises: Vec<Exercise>,
    pub logs: Vec<Log>,
    pub stashed_exercises: Vec<StashedExercise>,
    pub settings: Option<Settings>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: VERSION,
            exercises: vec![],
            logs: vec![],
            stashed_exercises: vec![],
            settings: None,
        }
    }
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        if snapshot.version != VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version));
        }
        Ok(snapshot)
    }
}

impl State {
    fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            version: VERSION,
            exercises: self.exercises.values().map(Exercise::from).collect(),
            logs: self.logs.values().map(Log::from).collect(),
            stashed_exercises: self
                .stashed_exercises
                .values()
                .map(StashedExercise::from)
                .collect(),
            settings: self.settings.as_ref().map(Settings::from),
        }
    }

    /// Validate all entries and the references between them.
    fn from_snapshot(value: Snapshot) -> Result<Self, SnapshotError> {
        let mut state = State::default();

        for exercise in value.exercises {
            let exercise = domain::Exercise::try_from(exercise)?;
            if state.exercises.insert(exercise.id, exercise).is_some() {
                return Err(SnapshotError::Inconsistent("duplicate exercise id"));
            }
        }

        for log in value.logs {
            let log = domain::Log::try_from(log)?;
            if !state.exercises.contains_key(&log.exercise_id) {
                return Err(SnapshotError::Inconsistent("log of unknown exercise"));
            }
            if state.logs.contains_key(&log.key()) {
                return Err(domain::DuplicateLog::from(&log).into());
            }
            state.logs.insert(log.key(), log);
        }

        for stashed_exercise in value.stashed_exercises {
            let stashed_exercise = domain::StashedExercise::try_from(stashed_exercise)?;
            if !state
                .exercises
                .contains_key(&stashed_exercise.exercise_id())
            {
                return Err(SnapshotError::Inconsistent(
                    "stashed exercise of unknown exercise",
                ));
            }
            if state
                .stashed_exercises
                .insert(stashed_exercise.id, stashed_exercise)
                .is_some()
            {
                return Err(SnapshotError::Inconsistent("duplicate stash id"));
            }
        }

        state.settings = value
            .settings
            .map(domain::ProgressionSettings::from)
            .map(|settings| settings.validate().map(|()| settings))
            .transpose()?;

        Ok(state)
    }
}

impl InMemory {
    pub fn snapshot(&self) -> Result<Snapshot, domain::StorageError> {
        Ok(self.state()?.to_snapshot())
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, SnapshotError> {
        Ok(InMemory::from_state(State::from_snapshot(snapshot)?))
    }

    /// Replace all data by the content of `snapshot`.
    ///
    /// The current data is kept if the snapshot is invalid.
    pub fn restore(&self, snapshot: Snapshot) -> Result<(), SnapshotError> {
        let state = State::from_snapshot(snapshot)?;
        *self.state()? = state;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let snapshot = self.snapshot()?;
        fs::write(path, snapshot.to_json()?)?;
        info!(
            "saved {} exercises and {} logs to {}",
            snapshot.exercises.len(),
            snapshot.logs.len(),
            path.display()
        );
        Ok(())
    }

    /// Load a repository from a file written by [`InMemory::save`].
    ///
    /// A missing file results in an empty repository.
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        if !path.exists() {
            debug!("{} does not exist, starting empty", path.display());
            return Ok(InMemory::new());
        }
        let snapshot = Snapshot::from_json(&fs::read_to_string(path)?)?;
        info!(
            "loaded {} exercises and {} logs from {}",
            snapshot.exercises.len(),
            snapshot.logs.len(),
            path.display()
        );
        InMemory::from_snapshot(snapshot)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SnapshotError {
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    #[error("inconsistent snapshot: {0}")]
    Inconsistent(&'static str),
    #[error(transparent)]
    DuplicateLog(#[from] domain::DuplicateLog),
    #[error(transparent)]
    InvalidExercise(#[from] ExerciseError),
    #[error(transparent)]
    InvalidLog(#[from] LogError),
    #[error(transparent)]
    InvalidSettings(#[from] domain::SettingsError),
    #[error(transparent)]
    Storage(#[from] domain::StorageError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct Exercise {
    pub id: Uuid,
    pub title: String,
    pub units: u8,
    pub current_target: f64,
    pub increment: f64,
    pub increment_momentum: f64,
    pub last_difficulty: Option<u8>,
    pub is_active: bool,
    pub alternates_sides: bool,
    pub current_side: u8,
    pub notes: String,
}

impl From<&domain::Exercise> for Exercise {
    fn from(value: &domain::Exercise) -> Self {
        Self {
            id: *value.id,
            title: value.title.to_string(),
            units: value.units as u8,
            current_target: value.current_target,
            increment: value.increment,
            increment_momentum: value.increment_momentum,
            last_difficulty: value.last_difficulty.map(|d| d as u8),
            is_active: value.is_active,
            alternates_sides: value.alternates_sides,
            current_side: value.current_side as u8,
            notes: value.notes.clone(),
        }
    }
}

impl TryFrom<Exercise> for domain::Exercise {
    type Error = ExerciseError;

    fn try_from(value: Exercise) -> Result<Self, Self::Error> {
        let exercise = Self {
            id: value.id.into(),
            title: domain::Title::new(&value.title)?,
            units: domain::Units::try_from(value.units)?,
            current_target: *domain::Target::new(value.current_target)?,
            increment: value.increment,
            increment_momentum: value.increment_momentum,
            last_difficulty: value
                .last_difficulty
                .map(domain::Difficulty::try_from)
                .transpose()?,
            is_active: value.is_active,
            alternates_sides: value.alternates_sides,
            current_side: domain::Side::try_from(value.current_side)?,
            notes: value.notes,
        };
        exercise.validate()?;
        Ok(exercise)
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ExerciseError {
    #[error(transparent)]
    InvalidTitle(#[from] domain::TitleError),
    #[error(transparent)]
    InvalidUnits(#[from] domain::UnitsError),
    #[error(transparent)]
    InvalidTarget(#[from] domain::TargetError),
    #[error(transparent)]
    InvalidDifficulty(#[from] domain::DifficultyError),
    #[error(transparent)]
    InvalidSide(#[from] domain::SideError),
    #[error(transparent)]
    InvalidProgression(#[from] domain::ProgressionStateError),
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct Log {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub exercise_id: Uuid,
    pub duration: u32,
    pub recorded_value: u32,
    pub difficulty: u8,
    pub side: Option<u8>,
}

impl From<&domain::Log> for Log {
    fn from(value: &domain::Log) -> Self {
        Self {
            id: *value.id,
            timestamp: value.timestamp,
            exercise_id: *value.exercise_id,
            duration: value.duration,
            recorded_value: value.recorded_value,
            difficulty: value.difficulty as u8,
            side: value.side.map(|s| s as u8),
        }
    }
}

impl TryFrom<Log> for domain::Log {
    type Error = LogError;

    fn try_from(value: Log) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.into(),
            timestamp: value.timestamp,
            exercise_id: value.exercise_id.into(),
            duration: value.duration,
            recorded_value: value.recorded_value,
            difficulty: domain::Difficulty::try_from(value.difficulty)?,
            side: value.side.map(domain::Side::try_from).transpose()?,
        })
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum LogError {
    #[error(transparent)]
    InvalidDifficulty(#[from] domain::DifficultyError),
    #[error(transparent)]
    InvalidSide(#[from] domain::SideError),
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct StashedExercise {
    pub id: Uuid,
    pub stashed_at: DateTime<Utc>,
    pub exercise: Exercise,
}

impl From<&domain::StashedExercise> for StashedExercise {
    fn from(value: &domain::StashedExercise) -> Self {
        Self {
            id: *value.id,
            stashed_at: value.stashed_at,
            exercise: Exercise::from(&value.exercise),
        }
    }
}

impl TryFrom<StashedExercise> for domain::StashedExercise {
    type Error = ExerciseError;

    fn try_from(value: StashedExercise) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.into(),
            stashed_at: value.stashed_at,
            exercise: domain::Exercise::try_from(value.exercise)?,
        })
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct Settings {
    pub window: usize,
    pub ceiling_ratio: f64,
    pub momentum_steps: Vec<MomentumStep>,
    pub medium_policy: MediumPolicy,
    pub initial_increment: f64,
    pub initial_momentum: f64,
}

impl From<&domain::ProgressionSettings> for Settings {
    fn from(value: &domain::ProgressionSettings) -> Self {
        Self {
            window: value.window,
            ceiling_ratio: value.ceiling_ratio,
            momentum_steps: value
                .momentum_steps
                .iter()
                .map(|s| MomentumStep {
                    up_to: s.up_to,
                    step: s.step,
                })
                .collect(),
            medium_policy: value.medium_policy.into(),
            initial_increment: value.initial_increment,
            initial_momentum: value.initial_momentum,
        }
    }
}

impl From<Settings> for domain::ProgressionSettings {
    fn from(value: Settings) -> Self {
        Self {
            window: value.window,
            ceiling_ratio: value.ceiling_ratio,
            momentum_steps: value
                .momentum_steps
                .into_iter()
                .map(|s| domain::MomentumStep {
                    up_to: s.up_to,
                    step: s.step,
                })
                .collect(),
            medium_policy: value.medium_policy.into(),
            initial_increment: value.initial_increment,
            initial_momentum: value.initial_momentum,
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct MomentumStep {
    pub up_to: Option<f64>,
    pub step: f64,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MediumPolicy {
    Half,
    AsEasy,
}

impl From<domain::MediumPolicy> for MediumPolicy {
    fn from(value: domain::MediumPolicy) -> Self {
        match value {
            domain::MediumPolicy::Half => MediumPolicy::Half,
            domain::MediumPolicy::AsEasy => MediumPolicy::AsEasy,
        }
    }
}

impl From<MediumPolicy> for domain::MediumPolicy {
    fn from(value: MediumPolicy) -> Self {
        match value {
            MediumPolicy::Half => domain::MediumPolicy::Half,
            MediumPolicy::AsEasy => domain::MediumPolicy::AsEasy,
        }
    }
}
