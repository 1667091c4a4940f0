use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, TimeZone, Weekday};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::{
    calendar::{CalendarDay, CalendarDayGenerator, CalendarScope},
    changes::{ChangeSink, HabitChange},
    day_index::{self, DayHabitIndex},
    error::{HabitError, Result},
    habit::{calendar_day, Habit, HabitId, NewHabit, Toggle},
};

/// One painted day together with the habits completed on it, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarCell {
    pub day: CalendarDay,
    pub completed: Vec<HabitId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarPage {
    pub scope: CalendarScope,
    pub reference: NaiveDate,
    pub first_weekday: Weekday,
    pub cells: Vec<CalendarCell>,
}

impl CalendarPage {
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn weeks(&self) -> impl Iterator<Item = &[CalendarCell]> {
        self.cells.chunks(7)
    }
}

/// Owns the habit collection and serializes every write through one lock.
pub struct HabitService {
    habits: RwLock<Vec<Habit>>,
    generator: CalendarDayGenerator,
    change_sink: Option<Box<dyn ChangeSink>>,
}

pub struct HabitServiceBuilder {
    habits: Vec<Habit>,
    first_weekday: Weekday,
    today: Option<NaiveDate>,
    change_sink: Option<Box<dyn ChangeSink>>,
}

impl HabitServiceBuilder {
    pub fn new() -> Self {
        Self {
            habits: Vec::new(),
            first_weekday: Weekday::Sun,
            today: None,
            change_sink: None,
        }
    }

    pub fn with_habits(mut self, habits: impl IntoIterator<Item = Habit>) -> Self {
        self.habits.extend(habits);
        self
    }

    pub fn with_first_weekday(mut self, first_weekday: Weekday) -> Self {
        self.first_weekday = first_weekday;
        self
    }

    /// Pin "today" instead of reading the local clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn with_change_sink(mut self, sink: Box<dyn ChangeSink>) -> Self {
        self.change_sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<HabitService> {
        let mut seen: HashSet<HabitId> = HashSet::new();
        for habit in &self.habits {
            if !seen.insert(habit.id()) {
                return Err(HabitError::DuplicateHabit(habit.id()));
            }
            let foreign = habit.foreign_log_count();
            if foreign > 0 {
                warn!(habit = %habit.id(), foreign, "habit holds logs owned by another habit");
            }
        }

        let mut generator = CalendarDayGenerator::new(self.first_weekday);
        if let Some(today) = self.today {
            generator = generator.with_today(today);
        }

        Ok(HabitService {
            habits: RwLock::new(self.habits),
            generator,
            change_sink: self.change_sink,
        })
    }
}

impl Default for HabitServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HabitService {
    pub fn builder() -> HabitServiceBuilder {
        HabitServiceBuilder::new()
    }

    pub fn generator(&self) -> CalendarDayGenerator {
        self.generator
    }

    pub fn today(&self) -> NaiveDate {
        self.generator.today()
    }

    /// All habits, newest first.
    pub fn habits(&self) -> Vec<Habit> {
        let mut habits = self.habits.read().clone();
        habits.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        habits
    }

    pub fn len(&self) -> usize {
        self.habits.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.habits.read().is_empty()
    }

    pub fn get_habit(&self, id: HabitId) -> Result<Habit> {
        self.habits
            .read()
            .iter()
            .find(|habit| habit.id() == id)
            .cloned()
            .ok_or(HabitError::UnknownHabit(id))
    }

    /// Case-insensitive match on the trimmed display name.
    pub fn find_by_name(&self, name: &str) -> Option<Habit> {
        let wanted = name.trim().to_lowercase();
        self.habits
            .read()
            .iter()
            .find(|habit| habit.name().to_lowercase() == wanted)
            .cloned()
    }

    #[instrument(skip(self))]
    pub fn add_habit(&self, new_habit: NewHabit) -> Result<Habit> {
        let habit = new_habit.into_habit()?;
        let mut habits = self.habits.write();
        if habits.iter().any(|existing| existing.id() == habit.id()) {
            return Err(HabitError::DuplicateHabit(habit.id()));
        }
        habits.push(habit.clone());
        info!(habit = %habit.id(), name = habit.name(), "habit added");
        self.notify(&HabitChange::Added { habit: habit.id() }, &habits);
        Ok(habit)
    }

    #[instrument(skip(self))]
    pub fn rename_habit(&self, id: HabitId, name: &str) -> Result<()> {
        let mut habits = self.habits.write();
        let habit = habits
            .iter_mut()
            .find(|habit| habit.id() == id)
            .ok_or(HabitError::UnknownHabit(id))?;
        habit.rename(name)?;
        self.notify(&HabitChange::Renamed { habit: id }, &habits);
        Ok(())
    }

    /// Remove a habit. Its logs are destroyed first; the count is returned.
    #[instrument(skip(self))]
    pub fn delete_habit(&self, id: HabitId) -> Result<usize> {
        let mut habits = self.habits.write();
        let position = habits
            .iter()
            .position(|habit| habit.id() == id)
            .ok_or(HabitError::UnknownHabit(id))?;
        let logs_removed = habits[position].clear_logs();
        habits.remove(position);
        info!(habit = %id, logs_removed, "habit deleted");
        self.notify(
            &HabitChange::Deleted {
                habit: id,
                logs_removed,
            },
            &habits,
        );
        Ok(logs_removed)
    }

    #[instrument(skip(self, at), fields(habit = %id))]
    pub fn toggle_completion<Tz: TimeZone>(
        &self,
        id: HabitId,
        at: &DateTime<Tz>,
    ) -> Result<Toggle> {
        let mut habits = self.habits.write();
        let habit = habits
            .iter_mut()
            .find(|habit| habit.id() == id)
            .ok_or(HabitError::UnknownHabit(id))?;
        let outcome = habit.toggle(at);
        self.notify(
            &HabitChange::Toggled {
                habit: id,
                day: calendar_day(at),
                outcome,
            },
            &habits,
        );
        Ok(outcome)
    }

    pub fn is_completed<Tz: TimeZone>(&self, id: HabitId, at: &DateTime<Tz>) -> Result<bool> {
        self.habits
            .read()
            .iter()
            .find(|habit| habit.id() == id)
            .map(|habit| habit.is_completed(at))
            .ok_or(HabitError::UnknownHabit(id))
    }

    /// Ids of the habits completed on `day`, oldest habit first.
    pub fn completed_on(&self, day: NaiveDate) -> Vec<HabitId> {
        let habits = self.habits.read();
        day_index::habits_completed_on(day, &habits)
            .into_iter()
            .map(Habit::id)
            .collect()
    }

    /// Generate the days for `scope` around `reference` and resolve the
    /// completed habits of each, all from one snapshot.
    pub fn calendar(&self, scope: CalendarScope, reference: NaiveDate) -> CalendarPage {
        let habits = self.habits.read();
        let index = DayHabitIndex::build(&habits);
        let cells = self
            .generator
            .days_for(scope, reference)
            .into_iter()
            .map(|day| CalendarCell {
                completed: index.habit_ids_on(day.date),
                day,
            })
            .collect();
        CalendarPage {
            scope,
            reference,
            first_weekday: self.generator.first_weekday(),
            cells,
        }
    }

    fn notify(&self, change: &HabitChange, habits: &[Habit]) {
        if let Some(sink) = &self.change_sink {
            sink.record(change, habits);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::FixedOffset;
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        changes: Mutex<Vec<(HabitChange, usize)>>,
    }

    impl ChangeSink for RecordingSink {
        fn record(&self, change: &HabitChange, habits: &[Habit]) {
            self.changes.lock().push((change.clone(), habits.len()));
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, 0, 0)
            .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn service() -> HabitService {
        HabitService::builder()
            .with_today(date(2025, 1, 20))
            .build()
            .unwrap()
    }

    #[test]
    fn builder_rejects_duplicate_ids() {
        let habit = NewHabit::new("Walk").into_habit().unwrap();
        let err = HabitService::builder()
            .with_habits([habit.clone(), habit.clone()])
            .build()
            .err();
        assert_eq!(err, Some(HabitError::DuplicateHabit(habit.id())));
    }

    #[test]
    fn toggling_through_the_service_flips_completion() {
        let service = service();
        let habit = service
            .add_habit(NewHabit::new("Drink Water").created_at(at(2025, 1, 1, 9)))
            .unwrap();
        assert_eq!(
            service.toggle_completion(habit.id(), &at(2025, 1, 5, 9)),
            Ok(Toggle::Completed)
        );
        assert_eq!(service.is_completed(habit.id(), &at(2025, 1, 5, 22)), Ok(true));
        assert_eq!(service.is_completed(habit.id(), &at(2025, 1, 6, 1)), Ok(false));
        assert_eq!(
            service.toggle_completion(habit.id(), &at(2025, 1, 5, 18)),
            Ok(Toggle::Cleared)
        );
        assert_eq!(service.is_completed(habit.id(), &at(2025, 1, 5, 9)), Ok(false));
    }

    #[test]
    fn unknown_habits_are_reported() {
        let service = service();
        let missing = HabitId::new();
        assert_eq!(
            service.toggle_completion(missing, &at(2025, 1, 5, 9)),
            Err(HabitError::UnknownHabit(missing))
        );
        assert_eq!(service.delete_habit(missing), Err(HabitError::UnknownHabit(missing)));
        assert!(service.get_habit(missing).is_err());
    }

    #[test]
    fn deleting_a_habit_destroys_its_logs() {
        let service = service();
        let keep = service.add_habit(NewHabit::new("Keep")).unwrap();
        let gone = service.add_habit(NewHabit::new("Drop")).unwrap();
        for day in 1..=3 {
            service.toggle_completion(gone.id(), &at(2025, 1, day, 8)).unwrap();
        }
        service.toggle_completion(keep.id(), &at(2025, 1, 2, 8)).unwrap();

        assert_eq!(service.delete_habit(gone.id()), Ok(3));
        assert_eq!(service.len(), 1);
        assert_eq!(service.completed_on(date(2025, 1, 2)), vec![keep.id()]);
        assert!(service.completed_on(date(2025, 1, 1)).is_empty());
    }

    #[test]
    fn calendar_page_carries_ordered_completions() {
        let service = service();
        let older = service
            .add_habit(NewHabit::new("Older").created_at(at(2024, 6, 1, 8)))
            .unwrap();
        let newer = service
            .add_habit(NewHabit::new("Newer").created_at(at(2024, 9, 1, 8)))
            .unwrap();
        service.toggle_completion(newer.id(), &at(2025, 1, 20, 7)).unwrap();
        service.toggle_completion(older.id(), &at(2025, 1, 20, 19)).unwrap();

        let page = service.calendar(CalendarScope::Month, date(2025, 1, 15));
        assert_eq!(page.cells.len(), 42);
        assert_eq!(page.weeks().count(), 6);
        let today: Vec<&CalendarCell> = page
            .cells
            .iter()
            .filter(|cell| cell.day.is_today)
            .collect();
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].day.date, date(2025, 1, 20));
        assert_eq!(today[0].completed, vec![older.id(), newer.id()]);

        let week = service.calendar(CalendarScope::Week, date(2025, 1, 20));
        assert_eq!(week.cells.len(), 7);
        assert_eq!(week.cells[0].day.date, date(2025, 1, 19));
        assert_eq!(week.cells[1].completed.len(), 2);
    }

    #[test]
    fn habits_are_listed_newest_first() {
        let service = service();
        service
            .add_habit(NewHabit::new("First").created_at(at(2024, 1, 1, 8)))
            .unwrap();
        service
            .add_habit(NewHabit::new("Second").created_at(at(2024, 2, 1, 8)))
            .unwrap();
        let names: Vec<String> = service
            .habits()
            .iter()
            .map(|habit| habit.name().to_string())
            .collect();
        assert_eq!(names, vec!["Second", "First"]);
        assert!(service.find_by_name(" second ").is_some());
        assert!(service.find_by_name("third").is_none());
    }

    #[test]
    fn every_mutation_reaches_the_sink() {
        let sink = Arc::new(RecordingSink::default());
        let service = HabitService::builder()
            .with_change_sink(Box::new(Arc::clone(&sink)))
            .build()
            .unwrap();
        let habit = service.add_habit(NewHabit::new("Floss")).unwrap();
        service.toggle_completion(habit.id(), &at(2025, 3, 3, 21)).unwrap();
        service.rename_habit(habit.id(), "Floss nightly").unwrap();
        service.delete_habit(habit.id()).unwrap();

        let changes = sink.changes.lock();
        assert_eq!(changes.len(), 4);
        assert_eq!(changes[0], (HabitChange::Added { habit: habit.id() }, 1));
        assert_eq!(
            changes[1].0,
            HabitChange::Toggled {
                habit: habit.id(),
                day: date(2025, 3, 3),
                outcome: Toggle::Completed,
            }
        );
        assert_eq!(changes[2].0, HabitChange::Renamed { habit: habit.id() });
        assert_eq!(
            changes[3],
            (
                HabitChange::Deleted {
                    habit: habit.id(),
                    logs_removed: 1,
                },
                0
            )
        );
    }

    #[test]
    fn failed_mutations_are_not_reported() {
        let sink = Arc::new(RecordingSink::default());
        let service = HabitService::builder()
            .with_change_sink(Box::new(Arc::clone(&sink)))
            .build()
            .unwrap();
        assert!(service.add_habit(NewHabit::new("  ")).is_err());
        assert!(service.rename_habit(HabitId::new(), "x").is_err());
        assert!(sink.changes.lock().is_empty());
    }
}
