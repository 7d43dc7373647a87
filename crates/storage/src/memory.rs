#![allow(clippy::missing_errors_doc)]

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};
use log::debug;
use overload_domain as domain;

/// Repository keeping all data in memory.
///
/// Every operation holds a single lock for its whole duration, so a completed
/// set either changes the exercise and appends the log or does neither.
#[derive(Debug, Default)]
pub struct InMemory {
    state: Mutex<State>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct State {
    pub exercises: BTreeMap<domain::ExerciseID, domain::Exercise>,
    pub logs: BTreeMap<(domain::ExerciseID, DateTime<Utc>), domain::Log>,
    pub stashed_exercises: BTreeMap<domain::StashID, domain::StashedExercise>,
    pub settings: Option<domain::ProgressionSettings>,
}

impl InMemory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_state(state: State) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub(crate) fn state(&self) -> Result<MutexGuard<'_, State>, domain::StorageError> {
        self.state
            .lock()
            .map_err(|_| domain::StorageError::Corrupt("poisoned lock".to_string()))
    }
}

impl State {
    fn remove_exercise(&mut self, id: domain::ExerciseID) -> Option<domain::Exercise> {
        let exercise = self.exercises.remove(&id)?;
        self.logs.retain(|(exercise_id, _), _| *exercise_id != id);
        self.stashed_exercises
            .retain(|_, stashed_exercise| stashed_exercise.exercise_id() != id);
        Some(exercise)
    }

    fn check_log(&self, log: &domain::Log) -> Result<(), domain::CommitError> {
        if !self.exercises.contains_key(&log.exercise_id) {
            return Err(domain::CommitError::ExerciseNotFound);
        }
        if self.logs.contains_key(&log.key()) {
            return Err(domain::CommitError::Duplicate(log.into()));
        }
        Ok(())
    }
}

impl domain::ExerciseRepository for InMemory {
    fn read_exercise(
        &self,
        id: domain::ExerciseID,
    ) -> Result<Option<domain::Exercise>, domain::ReadError> {
        Ok(self.state()?.exercises.get(&id).cloned())
    }

    fn read_exercises(&self) -> Result<Vec<domain::Exercise>, domain::ReadError> {
        Ok(self.state()?.exercises.values().cloned().collect())
    }

    fn create_exercise(
        &self,
        draft: domain::ExerciseDraft,
    ) -> Result<domain::Exercise, domain::CreateError> {
        draft.validate()?;
        let mut state = self.state()?;
        let id = domain::ExerciseID::random();
        if state.exercises.contains_key(&id) {
            return Err(domain::CreateError::Conflict);
        }
        let exercise = draft.into_exercise(id);
        state.exercises.insert(id, exercise.clone());
        debug!("created exercise {id}");
        Ok(exercise)
    }

    fn replace_exercise(
        &self,
        exercise: domain::Exercise,
    ) -> Result<domain::Exercise, domain::UpdateError> {
        exercise.validate()?;
        let mut state = self.state()?;
        match state.exercises.get_mut(&exercise.id) {
            Some(stored) => {
                *stored = exercise.clone();
                Ok(exercise)
            }
            None => Err(domain::UpdateError::NotFound),
        }
    }

    fn delete_exercise(
        &self,
        id: domain::ExerciseID,
    ) -> Result<domain::ExerciseID, domain::DeleteError> {
        self.state()?
            .remove_exercise(id)
            .map(|_| id)
            .ok_or(domain::DeleteError::NotFound)
    }

    fn delete_all(&self) -> Result<(), domain::DeleteError> {
        let mut state = self.state()?;
        state.exercises.clear();
        state.logs.clear();
        state.stashed_exercises.clear();
        Ok(())
    }
}

impl domain::LogRepository for InMemory {
    fn append_log(&self, log: domain::Log) -> Result<domain::Log, domain::AppendError> {
        let mut state = self.state()?;
        if state.logs.contains_key(&log.key()) {
            return Err(domain::AppendError::Duplicate((&log).into()));
        }
        state.logs.insert(log.key(), log.clone());
        Ok(log)
    }

    fn read_recent_logs(
        &self,
        exercise_id: domain::ExerciseID,
        limit: usize,
    ) -> Result<Vec<domain::Log>, domain::ReadError> {
        let first = (exercise_id, DateTime::<Utc>::MIN_UTC);
        let last = (exercise_id, DateTime::<Utc>::MAX_UTC);
        Ok(self
            .state()?
            .logs
            .range(first..=last)
            .rev()
            .take(limit)
            .map(|(_, log)| log.clone())
            .collect())
    }

    fn read_logs(&self) -> Result<Vec<domain::Log>, domain::ReadError> {
        let mut logs = self
            .state()?
            .logs
            .values()
            .cloned()
            .collect::<Vec<_>>();
        logs.sort_by_key(|log| log.timestamp);
        Ok(logs)
    }
}

impl domain::CompletionRepository for InMemory {
    fn commit_completion(
        &self,
        exercise: domain::Exercise,
        log: domain::Log,
    ) -> Result<(), domain::CommitError> {
        let mut state = self.state()?;
        if exercise.id != log.exercise_id {
            return Err(domain::CommitError::Storage(domain::StorageError::Corrupt(
                format!("log of exercise {} stored for {}", log.exercise_id, exercise.id),
            )));
        }
        state.check_log(&log)?;
        state.exercises.insert(exercise.id, exercise);
        state.logs.insert(log.key(), log);
        Ok(())
    }

    fn commit_stashed_completion(
        &self,
        stashed_exercise: domain::StashedExercise,
        log: domain::Log,
    ) -> Result<(), domain::CommitError> {
        let mut state = self.state()?;
        if !state.stashed_exercises.contains_key(&stashed_exercise.id) {
            return Err(domain::CommitError::StashNotFound);
        }
        state.check_log(&log)?;
        state
            .stashed_exercises
            .insert(stashed_exercise.id, stashed_exercise);
        state.logs.insert(log.key(), log);
        Ok(())
    }
}

impl domain::StashRepository for InMemory {
    fn create_stashed_exercise(
        &self,
        stashed_exercise: domain::StashedExercise,
    ) -> Result<domain::StashedExercise, domain::CreateError> {
        let mut state = self.state()?;
        if state.stashed_exercises.contains_key(&stashed_exercise.id) {
            return Err(domain::CreateError::Conflict);
        }
        state
            .stashed_exercises
            .insert(stashed_exercise.id, stashed_exercise.clone());
        Ok(stashed_exercise)
    }

    fn read_stashed_exercise(
        &self,
        id: domain::StashID,
    ) -> Result<Option<domain::StashedExercise>, domain::ReadError> {
        Ok(self.state()?.stashed_exercises.get(&id).cloned())
    }

    fn read_stashed_exercises(&self) -> Result<Vec<domain::StashedExercise>, domain::ReadError> {
        let mut stashed_exercises = self
            .state()?
            .stashed_exercises
            .values()
            .cloned()
            .collect::<Vec<_>>();
        stashed_exercises.sort_by_key(|s| s.stashed_at);
        Ok(stashed_exercises)
    }

    fn delete_stashed_exercise(
        &self,
        id: domain::StashID,
    ) -> Result<domain::StashID, domain::DeleteError> {
        self.state()?
            .stashed_exercises
            .remove(&id)
            .map(|_| id)
            .ok_or(domain::DeleteError::NotFound)
    }
}

impl domain::SettingsRepository for InMemory {
    fn read_settings(&self) -> Result<domain::ProgressionSettings, domain::ReadError> {
        Ok(self.state()?.settings.clone().unwrap_or_default())
    }

    fn write_settings(
        &self,
        settings: domain::ProgressionSettings,
    ) -> Result<(), domain::UpdateError> {
        self.state()?.settings = Some(settings);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use domain::{
        CompletionRepository, ExerciseRepository, LogRepository, SettingsRepository,
        StashRepository,
    };
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use crate::tests::data::{
        EXERCISE, EXERCISE_2, EXERCISES, LOG, LOG_2, LOG_3, LOGS, STASHED_EXERCISE, at, in_memory,
    };

    use super::*;

    #[test]
    fn test_read_exercises() {
        let repository = in_memory(&EXERCISES, &[]);

        assert_eq!(repository.read_exercises().unwrap(), EXERCISES.clone());
        assert_eq!(
            repository.read_exercise(EXERCISE.id).unwrap(),
            Some(EXERCISE.clone())
        );
        assert_eq!(repository.read_exercise(42.into()).unwrap(), None);
    }

    #[test]
    fn test_read_active_exercises() {
        let repository = in_memory(&EXERCISES, &[]);

        assert_eq!(
            repository.read_active_exercises().unwrap(),
            EXERCISES
                .iter()
                .filter(|e| e.is_active)
                .cloned()
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_create_exercise() {
        let repository = InMemory::new();
        let draft = domain::ExerciseDraft {
            title: domain::Title::new("Dip").unwrap(),
            units: domain::Units::Reps,
            initial_target: domain::Target::new(8.0).unwrap(),
            initial_increment: 0.1,
            initial_momentum: 0.0,
            alternates_sides: false,
            notes: String::new(),
        };

        let exercise = repository.create_exercise(draft.clone()).unwrap();

        assert!(!exercise.id.is_nil());
        assert_eq!(exercise, draft.into_exercise(exercise.id));
        assert_eq!(repository.read_exercises().unwrap(), vec![exercise]);
    }

    #[test]
    fn test_replace_exercise() {
        let repository = in_memory(&EXERCISES, &[]);
        let mut exercise = EXERCISE.clone();
        exercise.current_target = 12.0;

        assert_eq!(
            repository.replace_exercise(exercise.clone()).unwrap(),
            exercise
        );
        assert_eq!(repository.read_exercise(EXERCISE.id).unwrap(), Some(exercise));
    }

    #[rstest]
    #[case::target_below_minimum(domain::Exercise { current_target: 0.5, ..EXERCISE.clone() })]
    #[case::nan_target(domain::Exercise { current_target: f64::NAN, ..EXERCISE.clone() })]
    #[case::nan_increment(domain::Exercise { increment: f64::NAN, ..EXERCISE.clone() })]
    #[case::infinite_momentum(domain::Exercise {
        increment_momentum: f64::INFINITY,
        ..EXERCISE.clone()
    })]
    fn test_replace_exercise_invalid(#[case] exercise: domain::Exercise) {
        let repository = in_memory(&EXERCISES, &[]);

        assert!(matches!(
            repository.replace_exercise(exercise),
            Err(domain::UpdateError::Invalid(_))
        ));
        assert_eq!(
            repository.read_exercise(EXERCISE.id).unwrap().as_ref(),
            Some(&*EXERCISE)
        );
        assert!(InMemory::from_snapshot(repository.snapshot().unwrap()).is_ok());
    }

    #[test]
    fn test_create_exercise_invalid() {
        let repository = InMemory::new();

        assert!(matches!(
            repository.create_exercise(domain::ExerciseDraft {
                title: domain::Title::new("Dip").unwrap(),
                units: domain::Units::Reps,
                initial_target: domain::Target::new(8.0).unwrap(),
                initial_increment: f64::NAN,
                initial_momentum: 0.0,
                alternates_sides: false,
                notes: String::new(),
            }),
            Err(domain::CreateError::Invalid(
                domain::ProgressionStateError::NonFiniteIncrement(_)
            ))
        ));
        assert_eq!(repository.read_exercises().unwrap(), vec![]);
    }

    #[test]
    fn test_replace_exercise_not_found() {
        let repository = InMemory::new();

        assert!(matches!(
            repository.replace_exercise(EXERCISE.clone()),
            Err(domain::UpdateError::NotFound)
        ));
        assert_eq!(repository.read_exercises().unwrap(), vec![]);
    }

    #[test]
    fn test_delete_exercise_removes_logs_and_stashed_exercises() {
        let repository = in_memory(&EXERCISES, &LOGS);
        repository
            .create_stashed_exercise(STASHED_EXERCISE.clone())
            .unwrap();

        assert_eq!(repository.delete_exercise(EXERCISE.id).unwrap(), EXERCISE.id);

        assert_eq!(repository.read_exercise(EXERCISE.id).unwrap(), None);
        assert_eq!(repository.read_recent_logs(EXERCISE.id, 10).unwrap(), vec![]);
        assert_eq!(repository.read_logs().unwrap(), vec![LOG_3.clone()]);
        assert_eq!(repository.read_stashed_exercises().unwrap(), vec![]);
        assert!(matches!(
            repository.delete_exercise(EXERCISE.id),
            Err(domain::DeleteError::NotFound)
        ));
    }

    #[test]
    fn test_delete_all() {
        let repository = in_memory(&EXERCISES, &LOGS);
        repository
            .create_stashed_exercise(STASHED_EXERCISE.clone())
            .unwrap();
        let settings = domain::ProgressionSettings {
            window: 10,
            ..domain::ProgressionSettings::default()
        };
        repository.write_settings(settings.clone()).unwrap();

        repository.delete_all().unwrap();

        assert_eq!(repository.read_exercises().unwrap(), vec![]);
        assert_eq!(repository.read_logs().unwrap(), vec![]);
        assert_eq!(repository.read_stashed_exercises().unwrap(), vec![]);
        assert_eq!(repository.read_settings().unwrap(), settings);
    }

    #[test]
    fn test_append_log_duplicate() {
        let repository = in_memory(&EXERCISES, &[]);

        assert_eq!(repository.append_log(LOG.clone()).unwrap(), LOG.clone());

        let duplicate = domain::Log {
            id: 99.into(),
            recorded_value: 1,
            ..LOG.clone()
        };
        assert!(matches!(
            repository.append_log(duplicate),
            Err(domain::AppendError::Duplicate(d)) if d == domain::DuplicateLog::from(&*LOG)
        ));
        assert_eq!(repository.read_logs().unwrap(), vec![LOG.clone()]);
    }

    #[test]
    fn test_read_recent_logs() {
        let repository = in_memory(&EXERCISES, &LOGS);

        assert_eq!(
            repository.read_recent_logs(EXERCISE.id, 10).unwrap(),
            vec![LOG_2.clone(), LOG.clone()]
        );
        assert_eq!(
            repository.read_recent_logs(EXERCISE.id, 1).unwrap(),
            vec![LOG_2.clone()]
        );
        assert_eq!(repository.read_recent_logs(EXERCISE.id, 0).unwrap(), vec![]);
        assert_eq!(
            repository.read_recent_logs(EXERCISE_2.id, 10).unwrap(),
            vec![LOG_3.clone()]
        );
    }

    #[test]
    fn test_read_logs_ordered_by_timestamp() {
        let repository = in_memory(&EXERCISES, &LOGS);

        let timestamps = repository
            .read_logs()
            .unwrap()
            .iter()
            .map(|log| log.timestamp)
            .collect::<Vec<_>>();

        assert!(timestamps.is_sorted());
        assert_eq!(timestamps.len(), LOGS.len());
    }

    #[test]
    fn test_commit_completion() {
        let repository = in_memory(&EXERCISES, &[]);
        let mut exercise = EXERCISE.clone();
        exercise.current_target = 11.0;

        repository
            .commit_completion(exercise.clone(), LOG.clone())
            .unwrap();

        assert_eq!(repository.read_exercise(EXERCISE.id).unwrap(), Some(exercise));
        assert_eq!(repository.read_logs().unwrap(), vec![LOG.clone()]);
    }

    #[test]
    fn test_commit_completion_duplicate_changes_nothing() {
        let repository = in_memory(&EXERCISES, &[LOG.clone()]);
        let mut exercise = EXERCISE.clone();
        exercise.current_target = 11.0;

        assert!(matches!(
            repository.commit_completion(exercise, LOG.clone()),
            Err(domain::CommitError::Duplicate(_))
        ));
        assert_eq!(
            repository.read_exercise(EXERCISE.id).unwrap(),
            Some(EXERCISE.clone())
        );
        assert_eq!(repository.read_logs().unwrap(), vec![LOG.clone()]);
    }

    #[test]
    fn test_commit_completion_exercise_not_found() {
        let repository = InMemory::new();

        assert!(matches!(
            repository.commit_completion(EXERCISE.clone(), LOG.clone()),
            Err(domain::CommitError::ExerciseNotFound)
        ));
        assert_eq!(repository.read_exercises().unwrap(), vec![]);
        assert_eq!(repository.read_logs().unwrap(), vec![]);
    }

    #[test]
    fn test_commit_completion_mismatched_log() {
        let repository = in_memory(&EXERCISES, &[]);

        assert!(matches!(
            repository.commit_completion(EXERCISE_2.clone(), LOG.clone()),
            Err(domain::CommitError::Storage(domain::StorageError::Corrupt(_)))
        ));
        assert_eq!(repository.read_logs().unwrap(), vec![]);
    }

    #[test]
    fn test_commit_stashed_completion() {
        let repository = in_memory(&EXERCISES, &[]);
        repository
            .create_stashed_exercise(STASHED_EXERCISE.clone())
            .unwrap();
        let mut stashed_exercise = STASHED_EXERCISE.clone();
        stashed_exercise.exercise.current_target = 20.0;

        repository
            .commit_stashed_completion(stashed_exercise.clone(), LOG.clone())
            .unwrap();

        assert_eq!(
            repository.read_stashed_exercise(STASHED_EXERCISE.id).unwrap(),
            Some(stashed_exercise)
        );
        assert_eq!(
            repository.read_exercise(EXERCISE.id).unwrap(),
            Some(EXERCISE.clone())
        );
        assert_eq!(repository.read_logs().unwrap(), vec![LOG.clone()]);
    }

    #[test]
    fn test_commit_stashed_completion_stash_not_found() {
        let repository = in_memory(&EXERCISES, &[]);

        assert!(matches!(
            repository.commit_stashed_completion(STASHED_EXERCISE.clone(), LOG.clone()),
            Err(domain::CommitError::StashNotFound)
        ));
        assert_eq!(repository.read_logs().unwrap(), vec![]);
    }

    #[test]
    fn test_stashed_exercises() {
        let repository = in_memory(&EXERCISES, &[]);
        let later = domain::StashedExercise::new(2.into(), at(600), &EXERCISE_2);

        repository.create_stashed_exercise(later.clone()).unwrap();
        repository
            .create_stashed_exercise(STASHED_EXERCISE.clone())
            .unwrap();

        assert!(matches!(
            repository.create_stashed_exercise(later.clone()),
            Err(domain::CreateError::Conflict)
        ));
        assert_eq!(
            repository.read_stashed_exercises().unwrap(),
            vec![STASHED_EXERCISE.clone(), later.clone()]
        );
        assert_eq!(
            repository.delete_stashed_exercise(later.id).unwrap(),
            later.id
        );
        assert!(matches!(
            repository.delete_stashed_exercise(later.id),
            Err(domain::DeleteError::NotFound)
        ));
        assert_eq!(repository.read_stashed_exercise(later.id).unwrap(), None);
    }

    #[test]
    fn test_settings() {
        let repository = InMemory::new();

        assert_eq!(
            repository.read_settings().unwrap(),
            domain::ProgressionSettings::default()
        );

        let settings = domain::ProgressionSettings {
            ceiling_ratio: 0.05,
            ..domain::ProgressionSettings::default()
        };
        repository.write_settings(settings.clone()).unwrap();

        assert_eq!(repository.read_settings().unwrap(), settings);
    }
}
