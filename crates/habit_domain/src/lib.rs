pub mod calendar;
pub mod changes;
pub mod day_index;
pub mod error;
pub mod habit;
pub mod service;

pub use crate::calendar::{CalendarDay, CalendarDayGenerator, CalendarScope};
pub use crate::changes::{ChangeSink, HabitChange};
pub use crate::day_index::{habits_completed_on, DayHabitIndex};
pub use crate::error::{HabitError, Result};
pub use crate::habit::{CompletionLog, Habit, HabitFrequency, HabitId, NewHabit, Toggle};
pub use crate::service::{CalendarCell, CalendarPage, HabitService, HabitServiceBuilder};
