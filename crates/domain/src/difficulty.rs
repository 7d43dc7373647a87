use std::slice::Iter;

use derive_more::Deref;

/// Qualitative rating given by the user after finishing a set.
///
/// `Easy` and `Hard` form the current two-level scale. `Medium` only occurs in
/// history recorded with the older three-level scale and is mapped to an
/// effort score according to a [`MediumPolicy`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy = 0,
    Hard = 1,
    Medium = 2,
}

impl Difficulty {
    /// Ratings offered for new input.
    pub fn iter() -> Iter<'static, Difficulty> {
        static DIFFICULTY: [Difficulty; 2] = [Difficulty::Easy, Difficulty::Hard];
        DIFFICULTY.iter()
    }

    #[must_use]
    pub fn is_hard(self) -> bool {
        self == Difficulty::Hard
    }
}

impl TryFrom<u8> for Difficulty {
    type Error = DifficultyError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            x if x == Difficulty::Easy as u8 => Ok(Difficulty::Easy),
            x if x == Difficulty::Hard as u8 => Ok(Difficulty::Hard),
            x if x == Difficulty::Medium as u8 => Ok(Difficulty::Medium),
            _ => Err(DifficultyError::Invalid(value)),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum DifficultyError {
    #[error("Invalid difficulty ({0})")]
    Invalid(u8),
}

/// How legacy `Medium` ratings count towards the hard weight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MediumPolicy {
    #[default]
    Half,
    AsEasy,
}

/// Numeric effort of a rating, between 0 (easy) and 1 (hard).
#[derive(Deref, Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct EffortScore(f64);

impl EffortScore {
    pub const EASY: EffortScore = EffortScore(0.0);
    pub const MEDIUM: EffortScore = EffortScore(0.5);
    pub const HARD: EffortScore = EffortScore(1.0);
}

#[must_use]
pub fn classify(difficulty: Difficulty, medium_policy: MediumPolicy) -> EffortScore {
    match (difficulty, medium_policy) {
        (Difficulty::Hard, _) => EffortScore::HARD,
        (Difficulty::Medium, MediumPolicy::Half) => EffortScore::MEDIUM,
        (Difficulty::Easy, _) | (Difficulty::Medium, MediumPolicy::AsEasy) => EffortScore::EASY,
    }
}
