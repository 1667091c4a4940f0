use thiserror::Error;

use crate::habit::HabitId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HabitError {
    #[error("habit name must not be empty")]
    EmptyName,

    #[error("invalid color `{0}`, expected six hex digits")]
    InvalidColor(String),

    #[error("unknown frequency `{0}`")]
    UnknownFrequency(String),

    #[error("unknown habit {0}")]
    UnknownHabit(HabitId),

    #[error("habit {0} is already tracked")]
    DuplicateHabit(HabitId),
}

pub type Result<T> = std::result::Result<T, HabitError>;
