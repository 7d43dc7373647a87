use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    CommitError, CompleteSetError, CompletionRepository, CreateError, DeleteError, Difficulty,
    DuplicateLog, Exercise, ExerciseDraft, ExerciseID, ExerciseRepository, Log, LogID,
    LogRepository, MomentumProgression, ProgressionSettings, ProgressionStrategy, ReadError,
    SelectError, Session, SettingsRepository, SettingsUpdateError, StashError, StashID,
    StashRepository, StashedExercise, StorageError, UpdateError, select_next,
};

macro_rules! log_on_error {
    ($result: expr, $error: ident, $action: literal, $entity: literal) => {{
        let result = $result;
        match result {
            Ok(_) => {}
            Err(ref err) => match err {
                $error::Storage(crate::StorageError::NoConnection) => {
                    debug!("failed to {} {}: {err}", $action, $entity);
                }
                _ => {
                    error!("failed to {} {}: {err}", $action, $entity);
                }
            },
        }
        result
    }};
}

pub trait TrainingService {
    /// Record a finished set and adjust the exercise's target.
    ///
    /// A set with the same exercise and timestamp as an existing log is not
    /// recorded again and leaves the exercise unchanged.
    fn complete_set(
        &self,
        session: &mut Session,
        exercise_id: ExerciseID,
        outcome: SetOutcome,
    ) -> Result<Completion, CompleteSetError>;
    fn select_next_exercise(
        &self,
        excluding: Option<ExerciseID>,
    ) -> Result<Option<ExerciseID>, SelectError>;
    /// Select an exercise other than the one presented or just completed and present it.
    fn present_next_exercise(
        &self,
        session: &mut Session,
    ) -> Result<Option<ExerciseID>, SelectError>;
    fn get_recent_logs(&self, exercise_id: ExerciseID, limit: usize)
    -> Result<Vec<Log>, ReadError>;
}

pub trait StashService {
    fn skip_to_stash(&self, exercise_id: ExerciseID) -> Result<StashedExercise, StashError>;
    fn get_stashed_exercises(&self) -> Result<Vec<StashedExercise>, ReadError>;
    /// Record a set of a stashed exercise. Only the stashed copy is adjusted.
    fn complete_stashed(
        &self,
        session: &mut Session,
        id: StashID,
        outcome: SetOutcome,
    ) -> Result<Completion, StashError>;
    fn discard_stashed(&self, id: StashID) -> Result<StashID, DeleteError>;
}

pub trait RepertoireService {
    fn get_exercises(&self) -> Result<Vec<Exercise>, ReadError>;
    fn get_exercise(&self, id: ExerciseID) -> Result<Option<Exercise>, ReadError>;
    fn create_exercise(&self, draft: ExerciseDraft) -> Result<Exercise, CreateError>;
    fn replace_exercise(&self, exercise: Exercise) -> Result<Exercise, UpdateError>;
    fn set_active(&self, id: ExerciseID, is_active: bool) -> Result<Exercise, UpdateError>;
    fn delete_exercise(&self, id: ExerciseID) -> Result<ExerciseID, DeleteError>;
    fn delete_all(&self) -> Result<(), DeleteError>;
}

pub trait SettingsService {
    fn get_settings(&self) -> Result<ProgressionSettings, ReadError>;
    /// Store the settings and use them for all following completions.
    fn set_settings(&self, settings: ProgressionSettings) -> Result<(), SettingsUpdateError>;
}

/// What the user achieved in a set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetOutcome {
    pub difficulty: Difficulty,
    /// Taken from the session's stopwatch if absent.
    pub elapsed_seconds: Option<u32>,
    /// Defaults to the target of the exercise before the adjustment.
    pub achieved_value: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Recorded { exercise: Exercise, log: Log },
    Duplicate(DuplicateLog),
}

impl Completion {
    #[must_use]
    pub fn log(&self) -> Option<&Log> {
        match self {
            Completion::Recorded { log, .. } => Some(log),
            Completion::Duplicate(_) => None,
        }
    }

    #[must_use]
    pub fn exercise(&self) -> Option<&Exercise> {
        match self {
            Completion::Recorded { exercise, .. } => Some(exercise),
            Completion::Duplicate(_) => None,
        }
    }
}

pub struct Service<R> {
    repository: R,
    strategy: RwLock<Arc<dyn ProgressionStrategy>>,
    rng: Mutex<StdRng>,
    exercise_locks: Mutex<HashMap<ExerciseID, Arc<Mutex<()>>>>,
}

impl<R> Service<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            strategy: RwLock::new(Arc::new(MomentumProgression::default())),
            rng: Mutex::new(StdRng::from_entropy()),
            exercise_locks: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_strategy(self, strategy: impl ProgressionStrategy + 'static) -> Self {
        *self
            .strategy
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(strategy);
        self
    }

    #[must_use]
    pub fn with_rng(self, rng: StdRng) -> Self {
        *self.rng.lock().unwrap_or_else(PoisonError::into_inner) = rng;
        self
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    fn strategy(&self) -> Arc<dyn ProgressionStrategy> {
        self.strategy
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Lock serializing all state changes of one exercise.
    fn exercise_lock(&self, id: ExerciseID) -> Arc<Mutex<()>> {
        self.exercise_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id)
            .or_default()
            .clone()
    }

    /// Forget the lock of an exercise that no longer exists.
    fn release_exercise_lock(&self, id: ExerciseID) {
        self.exercise_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

impl<R: SettingsRepository> Service<R> {
    /// Create a service using the momentum progression with the stored settings.
    ///
    /// Invalid stored settings are replaced by the defaults.
    pub fn from_settings(repository: R) -> Result<Self, ReadError> {
        let settings = log_on_error!(
            repository.read_settings(),
            ReadError,
            "read",
            "settings"
        )?;
        let strategy = MomentumProgression::new(settings).unwrap_or_else(|err| {
            warn!("ignoring invalid settings: {err}");
            MomentumProgression::default()
        });
        Ok(Self::new(repository).with_strategy(strategy))
    }
}

impl<R: ExerciseRepository + LogRepository> Service<R> {
    /// Apply a set to `exercise` and return the log describing it.
    fn progress(
        &self,
        exercise: &mut Exercise,
        session: &Session,
        outcome: &SetOutcome,
    ) -> Result<Log, ReadError> {
        let strategy = self.strategy();
        let limit = strategy.history_limit();
        let history = if limit == 0 {
            vec![]
        } else {
            log_on_error!(
                self.repository.read_recent_logs(exercise.id, limit),
                ReadError,
                "read",
                "logs"
            )?
            .into_iter()
            .map(|log| log.difficulty)
            .collect::<Vec<_>>()
        };

        let log = Log {
            id: LogID::random(),
            timestamp: outcome.timestamp,
            exercise_id: exercise.id,
            duration: outcome
                .elapsed_seconds
                .unwrap_or_else(|| session.stopwatch.elapsed_seconds(outcome.timestamp)),
            recorded_value: exercise
                .units
                .whole(outcome.achieved_value.unwrap_or(exercise.current_target)),
            difficulty: outcome.difficulty,
            side: exercise.side(),
        };

        let before = exercise.progression_state();
        let after = strategy.progress(before, outcome.difficulty, &history);
        debug!(
            "{} rated {}: target {:.2} -> {:.2}, increment {:.3} -> {:.3}, momentum {:.3} -> {:.3}",
            exercise.title,
            outcome.difficulty,
            before.current_target,
            after.current_target,
            before.increment,
            after.increment,
            before.increment_momentum,
            after.increment_momentum
        );
        exercise.apply(after, outcome.difficulty);

        Ok(log)
    }
}

impl<R: ExerciseRepository + LogRepository + CompletionRepository> TrainingService for Service<R> {
    fn complete_set(
        &self,
        session: &mut Session,
        exercise_id: ExerciseID,
        outcome: SetOutcome,
    ) -> Result<Completion, CompleteSetError> {
        let lock = self.exercise_lock(exercise_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(mut exercise) = log_on_error!(
            self.repository.read_exercise(exercise_id),
            ReadError,
            "read",
            "exercise"
        )?
        else {
            self.release_exercise_lock(exercise_id);
            return Err(CompleteSetError::ExerciseNotFound(exercise_id));
        };

        let log = self.progress(&mut exercise, session, &outcome)?;

        match self
            .repository
            .commit_completion(exercise.clone(), log.clone())
        {
            Ok(()) => {
                session.complete(exercise_id);
                Ok(Completion::Recorded { exercise, log })
            }
            Err(CommitError::Duplicate(duplicate)) => {
                warn!("ignoring completed set: {duplicate}");
                Ok(Completion::Duplicate(duplicate))
            }
            Err(CommitError::ExerciseNotFound) => {
                Err(CompleteSetError::ExerciseNotFound(exercise_id))
            }
            Err(CommitError::StashNotFound) => Err(CompleteSetError::Storage(
                StorageError::Corrupt("unexpected stash reference".to_string()),
            )),
            Err(CommitError::Storage(err)) => {
                error!("failed to commit completed set: {err}");
                Err(CompleteSetError::Storage(err))
            }
        }
    }

    fn select_next_exercise(
        &self,
        excluding: Option<ExerciseID>,
    ) -> Result<Option<ExerciseID>, SelectError> {
        let mut pool = log_on_error!(
            self.repository.read_active_exercises(),
            ReadError,
            "read",
            "active exercises"
        )?;

        let selected = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            select_next(&mut pool, excluding, &mut *rng).map(|e| (e.id, e.alternates_sides))
        };

        let Some((id, alternates_sides)) = selected else {
            debug!("no active exercise to select");
            return Ok(None);
        };

        if alternates_sides {
            let lock = self.exercise_lock(id);
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

            if let Some(mut exercise) = self.repository.read_exercise(id)? {
                exercise.toggle_side();
                log_on_error!(
                    self.repository.replace_exercise(exercise),
                    UpdateError,
                    "replace",
                    "exercise"
                )?;
            }
        }

        Ok(Some(id))
    }

    fn present_next_exercise(
        &self,
        session: &mut Session,
    ) -> Result<Option<ExerciseID>, SelectError> {
        let selected = self.select_next_exercise(session.excluded())?;
        match selected {
            Some(id) => session.present(id),
            None => session.clear(),
        }
        Ok(selected)
    }

    fn get_recent_logs(
        &self,
        exercise_id: ExerciseID,
        limit: usize,
    ) -> Result<Vec<Log>, ReadError> {
        log_on_error!(
            self.repository.read_recent_logs(exercise_id, limit),
            ReadError,
            "get",
            "logs"
        )
    }
}

impl<R> StashService for Service<R>
where
    R: ExerciseRepository + LogRepository + CompletionRepository + StashRepository,
{
    fn skip_to_stash(&self, exercise_id: ExerciseID) -> Result<StashedExercise, StashError> {
        let exercise = log_on_error!(
            self.repository.read_exercise(exercise_id),
            ReadError,
            "read",
            "exercise"
        )?
        .ok_or(StashError::ExerciseNotFound(exercise_id))?;

        let stashed_exercise = log_on_error!(
            self.repository.create_stashed_exercise(StashedExercise::new(
                StashID::random(),
                Utc::now(),
                &exercise
            )),
            CreateError,
            "create",
            "stashed exercise"
        )?;
        info!("stashed {}", exercise.title);

        Ok(stashed_exercise)
    }

    fn get_stashed_exercises(&self) -> Result<Vec<StashedExercise>, ReadError> {
        log_on_error!(
            self.repository.read_stashed_exercises(),
            ReadError,
            "get",
            "stashed exercises"
        )
    }

    fn complete_stashed(
        &self,
        session: &mut Session,
        id: StashID,
        outcome: SetOutcome,
    ) -> Result<Completion, StashError> {
        let exercise_id = self
            .repository
            .read_stashed_exercise(id)?
            .ok_or(StashError::StashNotFound)?
            .exercise_id();

        let lock = self.exercise_lock(exercise_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut stashed_exercise = self
            .repository
            .read_stashed_exercise(id)?
            .ok_or(StashError::StashNotFound)?;

        let log = self.progress(&mut stashed_exercise.exercise, session, &outcome)?;
        let exercise = stashed_exercise.exercise.clone();

        match self
            .repository
            .commit_stashed_completion(stashed_exercise, log.clone())
        {
            Ok(()) => {
                session.complete(exercise_id);
                Ok(Completion::Recorded { exercise, log })
            }
            Err(CommitError::Duplicate(duplicate)) => {
                warn!("ignoring completed set: {duplicate}");
                Ok(Completion::Duplicate(duplicate))
            }
            Err(CommitError::ExerciseNotFound) => Err(StashError::ExerciseNotFound(exercise_id)),
            Err(CommitError::StashNotFound) => Err(StashError::StashNotFound),
            Err(CommitError::Storage(err)) => {
                error!("failed to commit completed set of stashed exercise: {err}");
                Err(StashError::Storage(err))
            }
        }
    }

    fn discard_stashed(&self, id: StashID) -> Result<StashID, DeleteError> {
        log_on_error!(
            self.repository.delete_stashed_exercise(id),
            DeleteError,
            "delete",
            "stashed exercise"
        )
    }
}

impl<R: ExerciseRepository> RepertoireService for Service<R> {
    fn get_exercises(&self) -> Result<Vec<Exercise>, ReadError> {
        log_on_error!(
            self.repository.read_exercises(),
            ReadError,
            "get",
            "exercises"
        )
    }

    fn get_exercise(&self, id: ExerciseID) -> Result<Option<Exercise>, ReadError> {
        log_on_error!(
            self.repository.read_exercise(id),
            ReadError,
            "get",
            "exercise"
        )
    }

    fn create_exercise(&self, draft: ExerciseDraft) -> Result<Exercise, CreateError> {
        draft.validate()?;
        log_on_error!(
            self.repository.create_exercise(draft),
            CreateError,
            "create",
            "exercise"
        )
    }

    fn replace_exercise(&self, exercise: Exercise) -> Result<Exercise, UpdateError> {
        exercise.validate()?;
        let id = exercise.id;
        let lock = self.exercise_lock(id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let result = log_on_error!(
            self.repository.replace_exercise(exercise),
            UpdateError,
            "replace",
            "exercise"
        );
        if matches!(result, Err(UpdateError::NotFound)) {
            self.release_exercise_lock(id);
        }
        result
    }

    fn set_active(&self, id: ExerciseID, is_active: bool) -> Result<Exercise, UpdateError> {
        let lock = self.exercise_lock(id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(mut exercise) = self.repository.read_exercise(id)? else {
            self.release_exercise_lock(id);
            return Err(UpdateError::NotFound);
        };
        exercise.is_active = is_active;

        log_on_error!(
            self.repository.replace_exercise(exercise),
            UpdateError,
            "replace",
            "exercise"
        )
    }

    fn delete_exercise(&self, id: ExerciseID) -> Result<ExerciseID, DeleteError> {
        let lock = self.exercise_lock(id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let result = log_on_error!(
            self.repository.delete_exercise(id),
            DeleteError,
            "delete",
            "exercise"
        );
        if matches!(result, Ok(_) | Err(DeleteError::NotFound)) {
            self.release_exercise_lock(id);
        }
        result
    }

    fn delete_all(&self) -> Result<(), DeleteError> {
        log_on_error!(
            self.repository.delete_all(),
            DeleteError,
            "delete",
            "all data"
        )?;
        self.exercise_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        info!("deleted all data");
        Ok(())
    }
}

impl<R: SettingsRepository> SettingsService for Service<R> {
    fn get_settings(&self) -> Result<ProgressionSettings, ReadError> {
        log_on_error!(
            self.repository.read_settings(),
            ReadError,
            "get",
            "settings"
        )
    }

    fn set_settings(&self, settings: ProgressionSettings) -> Result<(), SettingsUpdateError> {
        let strategy = MomentumProgression::new(settings.clone())?;
        log_on_error!(
            self.repository.write_settings(settings),
            UpdateError,
            "write",
            "settings"
        )?;
        *self
            .strategy
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(strategy);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{Target, Title, Units};

    #[derive(Default)]
    struct Exercises(Mutex<BTreeMap<ExerciseID, Exercise>>);

    impl ExerciseRepository for Exercises {
        fn read_exercise(&self, id: ExerciseID) -> Result<Option<Exercise>, ReadError> {
            Ok(self.0.lock().unwrap().get(&id).cloned())
        }

        fn read_exercises(&self) -> Result<Vec<Exercise>, ReadError> {
            Ok(self.0.lock().unwrap().values().cloned().collect())
        }

        fn create_exercise(&self, draft: ExerciseDraft) -> Result<Exercise, CreateError> {
            let exercise = draft.into_exercise(ExerciseID::random());
            self.0.lock().unwrap().insert(exercise.id, exercise.clone());
            Ok(exercise)
        }

        fn replace_exercise(&self, exercise: Exercise) -> Result<Exercise, UpdateError> {
            match self.0.lock().unwrap().get_mut(&exercise.id) {
                Some(stored) => {
                    *stored = exercise.clone();
                    Ok(exercise)
                }
                None => Err(UpdateError::NotFound),
            }
        }

        fn delete_exercise(&self, id: ExerciseID) -> Result<ExerciseID, DeleteError> {
            self.0
                .lock()
                .unwrap()
                .remove(&id)
                .map(|_| id)
                .ok_or(DeleteError::NotFound)
        }

        fn delete_all(&self) -> Result<(), DeleteError> {
            self.0.lock().unwrap().clear();
            Ok(())
        }
    }

    fn create(service: &Service<Exercises>, title: &str) -> Exercise {
        service
            .create_exercise(
                ProgressionSettings::default().draft(
                    Title::new(title).unwrap(),
                    Units::Reps,
                    Target::new(5.0).unwrap(),
                ),
            )
            .unwrap()
    }

    fn lock_count(service: &Service<Exercises>) -> usize {
        service.exercise_locks.lock().unwrap().len()
    }

    #[test]
    fn test_delete_exercise_releases_lock() {
        let service = Service::new(Exercises::default());
        let exercise = create(&service, "Dip");
        let other = create(&service, "Row");

        service.set_active(exercise.id, false).unwrap();
        service.set_active(other.id, false).unwrap();
        assert_eq!(lock_count(&service), 2);

        service.delete_exercise(exercise.id).unwrap();
        assert_eq!(lock_count(&service), 1);

        assert!(matches!(
            service.delete_exercise(exercise.id),
            Err(DeleteError::NotFound)
        ));
        assert_eq!(lock_count(&service), 1);
        assert_eq!(
            service.get_exercises().unwrap(),
            vec![Exercise {
                is_active: false,
                ..other
            }]
        );
    }

    #[test]
    fn test_delete_all_releases_locks() {
        let service = Service::new(Exercises::default());
        for title in ["Dip", "Row", "Lunge"] {
            let exercise = create(&service, title);
            service.set_active(exercise.id, false).unwrap();
        }
        assert_eq!(lock_count(&service), 3);

        service.delete_all().unwrap();

        assert_eq!(lock_count(&service), 0);
        assert_eq!(service.get_exercises().unwrap(), vec![]);
    }

    #[test]
    fn test_missing_exercise_leaves_no_lock() {
        let service = Service::new(Exercises::default());
        let exercise = create(&service, "Dip");
        service.delete_exercise(exercise.id).unwrap();

        assert!(matches!(
            service.replace_exercise(exercise.clone()),
            Err(UpdateError::NotFound)
        ));
        assert!(matches!(
            service.set_active(exercise.id, true),
            Err(UpdateError::NotFound)
        ));
        assert_eq!(lock_count(&service), 0);
    }
}
