use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::habit::{Habit, HabitId, Toggle};

/// A mutation that has already been applied to the in-memory collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HabitChange {
    Added {
        habit: HabitId,
    },
    Renamed {
        habit: HabitId,
    },
    Deleted {
        habit: HabitId,
        logs_removed: usize,
    },
    Toggled {
        habit: HabitId,
        day: NaiveDate,
        outcome: Toggle,
    },
}

impl HabitChange {
    pub fn habit_id(&self) -> HabitId {
        match self {
            HabitChange::Added { habit }
            | HabitChange::Renamed { habit }
            | HabitChange::Deleted { habit, .. }
            | HabitChange::Toggled { habit, .. } => *habit,
        }
    }
}

/// Storage adapters implement this to commit the collection after each
/// mutation. A change that is never committed is simply lost.
pub trait ChangeSink: Send + Sync {
    fn record(&self, change: &HabitChange, habits: &[Habit]);
}

impl<T: ChangeSink + ?Sized> ChangeSink for Arc<T> {
    fn record(&self, change: &HabitChange, habits: &[Habit]) {
        (**self).record(change, habits);
    }
}
