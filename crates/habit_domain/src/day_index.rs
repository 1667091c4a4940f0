use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::warn;

use crate::habit::{CompletionLog, Habit, HabitId};

/// Habits with a completion log on `day`, each listed once, oldest habit
/// first so calendar markers keep a stable position.
///
/// A log only counts for the habit that holds it, and only when its
/// back-reference names that same habit.
pub fn habits_completed_on(day: NaiveDate, habits: &[Habit]) -> Vec<&Habit> {
    let mut completed = Vec::new();
    for (holder, log) in held_logs(habits) {
        if log.day() != day {
            continue;
        }
        if log.habit_id() != holder.id() {
            warn!(
                habit = %holder.id(),
                referenced = %log.habit_id(),
                %day,
                "completion log names another habit"
            );
            continue;
        }
        if !completed.iter().any(|habit: &&Habit| habit.id() == holder.id()) {
            completed.push(holder);
        }
    }
    sort_by_creation(&mut completed);
    completed
}

/// Day to completed-habits lookup built once per snapshot, so painting a
/// whole grid does not rescan every log per cell.
#[derive(Debug, Clone, Default)]
pub struct DayHabitIndex<'a> {
    by_day: BTreeMap<NaiveDate, Vec<&'a Habit>>,
    duplicate_logs: usize,
    orphaned_logs: usize,
}

impl<'a> DayHabitIndex<'a> {
    pub fn build(habits: &'a [Habit]) -> Self {
        let mut index = DayHabitIndex::default();

        for (holder, log) in held_logs(habits) {
            if log.habit_id() != holder.id() {
                index.orphaned_logs += 1;
                continue;
            }
            let entry = index.by_day.entry(log.day()).or_default();
            if entry.iter().any(|habit| habit.id() == holder.id()) {
                index.duplicate_logs += 1;
                continue;
            }
            entry.push(holder);
        }

        for entry in index.by_day.values_mut() {
            sort_by_creation(entry);
        }

        if index.duplicate_logs > 0 {
            warn!(
                duplicate_logs = index.duplicate_logs,
                "several completion logs share a habit and day"
            );
        }
        if index.orphaned_logs > 0 {
            warn!(
                orphaned_logs = index.orphaned_logs,
                "completion logs name a habit other than their holder"
            );
        }
        index
    }

    pub fn habits_on(&self, day: NaiveDate) -> &[&'a Habit] {
        self.by_day.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn habit_ids_on(&self, day: NaiveDate) -> Vec<HabitId> {
        self.habits_on(day).iter().map(|habit| habit.id()).collect()
    }

    /// Days with at least one completion, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.by_day.keys().copied()
    }

    pub fn duplicate_logs(&self) -> usize {
        self.duplicate_logs
    }

    pub fn orphaned_logs(&self) -> usize {
        self.orphaned_logs
    }
}

fn held_logs(habits: &[Habit]) -> impl Iterator<Item = (&Habit, &CompletionLog)> {
    habits
        .iter()
        .flat_map(|habit| habit.logs().iter().map(move |log| (habit, log)))
}

fn sort_by_creation(habits: &mut [&Habit]) {
    habits.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.id().cmp(&b.id()))
    });
}
