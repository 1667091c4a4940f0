use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Weekday};
use clap::{Parser, Subcommand};
use habit_domain::{
    CalendarPage, CalendarScope, Habit, HabitFrequency, HabitId, HabitService, NewHabit, Toggle,
};
use tracing::{info, warn};

use crate::store::JsonStore;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub(crate) data_file: PathBuf,
    pub(crate) first_weekday: Weekday,
    pub(crate) scope: CalendarScope,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok()))
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(path) = lookup("HABIT_DATA_FILE") {
            if !path.trim().is_empty() {
                config.data_file = PathBuf::from(path.trim());
            }
        }
        if let Some(raw) = lookup("HABIT_FIRST_WEEKDAY") {
            match raw.trim().parse::<Weekday>() {
                Ok(weekday) => config.first_weekday = weekday,
                Err(_) => warn!(value = %raw, "ignoring unrecognised HABIT_FIRST_WEEKDAY"),
            }
        }
        if let Some(raw) = lookup("HABIT_CALENDAR_SCOPE") {
            match raw.parse::<CalendarScope>() {
                Ok(scope) => config.scope = scope,
                Err(err) => warn!(%err, "ignoring HABIT_CALENDAR_SCOPE"),
            }
        }
        config
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(path) = &cli.data_file {
            self.data_file = path.clone();
        }
        if let Some(weekday) = cli.first_weekday {
            self.first_weekday = weekday;
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("habits.json"),
            first_weekday: Weekday::Sun,
            scope: CalendarScope::Month,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "habit_calendar", version, about = "Track daily habits on a calendar")]
pub struct Cli {
    /// JSON file holding the habit collection.
    #[arg(long, global = true)]
    pub data_file: Option<PathBuf>,

    /// Day the week starts on (sun, mon, ...).
    #[arg(long, global = true)]
    pub first_weekday: Option<Weekday>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create a habit.
    Add {
        name: String,
        #[arg(long, default_value = "daily")]
        frequency: HabitFrequency,
        /// Six hex digits, with or without a leading `#`.
        #[arg(long)]
        color: Option<String>,
        #[arg(long, value_parser = parse_time)]
        reminder: Option<NaiveTime>,
    },
    /// Show every habit and whether it is done on a day.
    List {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Mark a habit done for a day, or undo it.
    Toggle {
        /// Habit id or name.
        habit: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    Rename {
        habit: String,
        name: String,
    },
    /// Delete a habit along with its completion history.
    Delete { habit: String },
    /// Paint a month grid or week strip.
    Calendar {
        #[arg(long)]
        scope: Option<CalendarScope>,
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Months (or weeks) to move from the reference date.
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        shift: i32,
    },
}

fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|err| format!("invalid time `{raw}`: {err}"))
}

pub fn run(config: AppConfig, command: Command) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_with(config, command, Local::now().date_naive(), &mut out)
}

pub(crate) fn run_with(
    config: AppConfig,
    command: Command,
    today: NaiveDate,
    out: &mut dyn Write,
) -> Result<()> {
    let store = Arc::new(JsonStore::new(&config.data_file));
    let habits = store.load()?;
    info!(
        path = %store.path().display(),
        habit_count = habits.len(),
        "habits loaded"
    );
    let service = HabitService::builder()
        .with_habits(habits)
        .with_first_weekday(config.first_weekday)
        .with_today(today)
        .with_change_sink(Box::new(Arc::clone(&store)))
        .build()
        .context("failed to initialize habit service")?;

    match command {
        Command::Add {
            name,
            frequency,
            color,
            reminder,
        } => {
            let mut new_habit = NewHabit::new(name).frequency(frequency);
            if let Some(color) = color {
                new_habit = new_habit.color_hex(color);
            }
            if let Some(time) = reminder {
                new_habit = new_habit.reminder_time(time);
            }
            let habit = service.add_habit(new_habit)?;
            writeln!(out, "Added {} {} ({})", habit.emoji_icon(), habit.name(), habit.id())?;
        }
        Command::List { date } => {
            let day = date.unwrap_or(today);
            writeln!(out, "Habits for {}", format_day_heading(day, today))?;
            let habits = service.habits();
            if habits.is_empty() {
                writeln!(out, "No habits yet. Add one with `habit_calendar add <name>`.")?;
            }
            for habit in &habits {
                writeln!(out, "{}", format_habit_row(habit, day))?;
            }
        }
        Command::Toggle { habit, date } => {
            let habit = resolve_habit(&service, &habit)?;
            let day = date.unwrap_or(today);
            let stamp = stamp_for(day, today)?;
            let outcome = service.toggle_completion(habit.id(), &stamp)?;
            let verb = match outcome {
                Toggle::Completed => "done",
                Toggle::Cleared => "not done",
            };
            writeln!(out, "{} marked {} for {}", habit.name(), verb, day)?;
        }
        Command::Rename { habit, name } => {
            let habit = resolve_habit(&service, &habit)?;
            service.rename_habit(habit.id(), &name)?;
            writeln!(out, "Renamed {} to {}", habit.name(), name.trim())?;
        }
        Command::Delete { habit } => {
            let habit = resolve_habit(&service, &habit)?;
            let logs_removed = service.delete_habit(habit.id())?;
            writeln!(
                out,
                "Deleted {} and {} completion{}",
                habit.name(),
                logs_removed,
                if logs_removed == 1 { "" } else { "s" }
            )?;
        }
        Command::Calendar { scope, date, shift } => {
            let scope = scope.unwrap_or(config.scope);
            let reference = scope
                .shift(date.unwrap_or(today), shift)
                .ok_or_else(|| anyhow!("cannot move {shift} {scope}s from the reference date"))?;
            let page = service.calendar(scope, reference);
            write!(out, "{}", render_page(&page, &service.habits()))?;
        }
    }

    store.take_error()
}

fn resolve_habit(service: &HabitService, key: &str) -> Result<Habit> {
    if let Ok(id) = key.parse::<HabitId>() {
        return Ok(service.get_habit(id)?);
    }
    match service.find_by_name(key) {
        Some(habit) => Ok(habit),
        None => bail!("no habit named `{}`", key.trim()),
    }
}

/// Stamp for toggling `day`: the current instant for today, local noon otherwise.
fn stamp_for(day: NaiveDate, today: NaiveDate) -> Result<DateTime<Local>> {
    let now = Local::now();
    if day == today && now.date_naive() == today {
        return Ok(now);
    }
    day.and_hms_opt(12, 0, 0)
        .and_then(|noon| Local.from_local_datetime(&noon).earliest())
        .ok_or_else(|| anyhow!("cannot place {day} on the local calendar"))
}

fn format_habit_row(habit: &Habit, day: NaiveDate) -> String {
    let mark = if habit.is_completed_on(day) { "x" } else { " " };
    let mut row = format!(
        "[{}] {} {} · {}",
        mark,
        habit.emoji_icon(),
        habit.name(),
        habit.target_frequency()
    );
    if let Some(time) = habit.reminder_time() {
        row.push_str(&format!(" · reminder {}", time.format("%H:%M")));
    }
    row
}

fn format_day_heading(date: NaiveDate, today: NaiveDate) -> String {
    let calendar = date.format("%A, %B %d, %Y");
    let relative = format_relative_label(date, today);
    if relative.is_empty() {
        calendar.to_string()
    } else {
        format!("{} — {}", relative, calendar)
    }
}

fn format_relative_label(date: NaiveDate, today: NaiveDate) -> String {
    let diff = date.signed_duration_since(today).num_days();
    match diff {
        -1 => "Yesterday".to_string(),
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        _ => String::new(),
    }
}

const MAX_MARKERS: usize = 4;

/// Text rendering of a calendar page. Today is bracketed, days outside the
/// displayed month are parenthesised, and each completed habit adds a dot.
pub(crate) fn render_page(page: &CalendarPage, habits: &[Habit]) -> String {
    let mut text = format!("{}\n", page.reference.format("%B %Y"));
    if page.is_empty() {
        text.push_str("(nothing to show)\n");
        return text;
    }

    let header: Vec<String> = habit_domain::calendar::ordered_weekdays(page.first_weekday)
        .iter()
        .map(|weekday| format!("{:^8}", &weekday.to_string()[..2]))
        .collect();
    text.push_str(header.join("").trim_end());
    text.push('\n');

    for week in page.weeks() {
        let row: Vec<String> = week
            .iter()
            .map(|cell| {
                let day = cell.day.day_number();
                let label = if cell.day.is_today {
                    format!("[{day}]")
                } else if cell.day.is_current_month {
                    format!(" {day} ")
                } else {
                    format!("({day})")
                };
                let dots = "•".repeat(cell.completed.len().min(MAX_MARKERS));
                format!("{label:>4}{dots:<4}")
            })
            .collect();
        text.push_str(row.join("").trim_end());
        text.push('\n');
    }

    if page.scope == CalendarScope::Week {
        for cell in &page.cells {
            let names: Vec<&str> = cell
                .completed
                .iter()
                .filter_map(|id| habits.iter().find(|habit| habit.id() == *id))
                .map(Habit::name)
                .collect();
            if !names.is_empty() {
                text.push_str(&format!(
                    "{}: {}\n",
                    cell.day.date.format("%a %d"),
                    names.join(", ")
                ));
            }
        }
    }
    text
}
