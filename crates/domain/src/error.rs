use crate::{DuplicateLog, ExerciseID, ProgressionStateError, SettingsError};

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(thiserror::Error, Debug)]
pub enum CreateError {
    #[error("conflict")]
    Conflict,
    #[error(transparent)]
    Invalid(#[from] ProgressionStateError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(thiserror::Error, Debug)]
pub enum UpdateError {
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Invalid(#[from] ProgressionStateError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<ReadError> for UpdateError {
    fn from(value: ReadError) -> Self {
        match value {
            ReadError::Storage(storage) => UpdateError::Storage(storage),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DeleteError {
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<ReadError> for DeleteError {
    fn from(value: ReadError) -> Self {
        match value {
            ReadError::Storage(storage) => DeleteError::Storage(storage),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AppendError {
    #[error(transparent)]
    Duplicate(#[from] DuplicateLog),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failure of an atomic `(exercise, log)` write-back.
///
/// Nothing is written if any of these is returned.
#[derive(thiserror::Error, Debug)]
pub enum CommitError {
    #[error(transparent)]
    Duplicate(#[from] DuplicateLog),
    #[error("exercise not found")]
    ExerciseNotFound,
    #[error("stashed exercise not found")]
    StashNotFound,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("no connection")]
    NoConnection,
    #[error("corrupt storage: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Other(#[from] BoxedError),
}

#[derive(thiserror::Error, Debug)]
pub enum CompleteSetError {
    #[error("exercise {0} not found")]
    ExerciseNotFound(ExerciseID),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<ReadError> for CompleteSetError {
    fn from(value: ReadError) -> Self {
        match value {
            ReadError::Storage(storage) => CompleteSetError::Storage(storage),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum StashError {
    #[error("exercise {0} not found")]
    ExerciseNotFound(ExerciseID),
    #[error("stashed exercise not found")]
    StashNotFound,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<ReadError> for StashError {
    fn from(value: ReadError) -> Self {
        match value {
            ReadError::Storage(storage) => StashError::Storage(storage),
        }
    }
}

impl From<CreateError> for StashError {
    fn from(value: CreateError) -> Self {
        match value {
            CreateError::Conflict => {
                StashError::Storage(StorageError::Corrupt("stash id conflict".to_string()))
            }
            CreateError::Invalid(err) => StashError::Storage(StorageError::Corrupt(format!(
                "invalid stashed exercise: {err}"
            ))),
            CreateError::Storage(storage) => StashError::Storage(storage),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SettingsUpdateError {
    #[error(transparent)]
    Invalid(#[from] SettingsError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<UpdateError> for SettingsUpdateError {
    fn from(value: UpdateError) -> Self {
        match value {
            UpdateError::NotFound => {
                SettingsUpdateError::Storage(StorageError::Corrupt("settings vanished".into()))
            }
            UpdateError::Invalid(err) => {
                SettingsUpdateError::Storage(StorageError::Corrupt(err.to_string()))
            }
            UpdateError::Storage(storage) => SettingsUpdateError::Storage(storage),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SelectError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<ReadError> for SelectError {
    fn from(value: ReadError) -> Self {
        match value {
            ReadError::Storage(storage) => SelectError::Storage(storage),
        }
    }
}

impl From<UpdateError> for SelectError {
    fn from(value: UpdateError) -> Self {
        match value {
            UpdateError::NotFound => {
                SelectError::Storage(StorageError::Corrupt("selected exercise vanished".into()))
            }
            UpdateError::Invalid(err) => {
                SelectError::Storage(StorageError::Corrupt(format!("invalid exercise: {err}")))
            }
            UpdateError::Storage(storage) => SelectError::Storage(storage),
        }
    }
}
