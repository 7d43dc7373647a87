use derive_more::{AsRef, Display};

/// Display name of an exercise.
///
/// Leading and trailing whitespace is removed and inner runs of whitespace
/// are collapsed, so "  Pike   Push Up " and "Pike Push Up" are the same title.
#[derive(AsRef, Debug, Display, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Title(String);

impl Title {
    pub const MAX_LEN: usize = 64;

    pub fn new(title: &str) -> Result<Self, TitleError> {
        let normalized = title.split_whitespace().collect::<Vec<_>>().join(" ");

        if normalized.is_empty() {
            return Err(TitleError::Empty);
        }

        let len = normalized.chars().count();

        if len > Self::MAX_LEN {
            return Err(TitleError::TooLong(len));
        }

        Ok(Title(normalized))
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum TitleError {
    #[error("Title must not be empty")]
    Empty,
    #[error("Title must be 64 characters or fewer ({0} > 64)")]
    TooLong(usize),
}
