use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{HabitError, Result};

pub const DEFAULT_EMOJI: &str = "🎯";
pub const DEFAULT_COLOR_HEX: &str = "007AFF";

/// Stable identity of a habit. Never reused once assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HabitId(Uuid);

impl HabitId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for HabitId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HabitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for HabitId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Target cadence chosen when the habit was created. Stored as data only;
/// nothing in this crate evaluates it against the completion logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HabitFrequency {
    #[default]
    #[serde(rename = "Daily")]
    Daily,
    #[serde(rename = "Specific Days")]
    SpecificDays,
    #[serde(rename = "X Times Per Week")]
    XTimesPerWeek,
}

impl HabitFrequency {
    pub const ALL: [HabitFrequency; 3] = [
        HabitFrequency::Daily,
        HabitFrequency::SpecificDays,
        HabitFrequency::XTimesPerWeek,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            HabitFrequency::Daily => "Daily",
            HabitFrequency::SpecificDays => "Specific Days",
            HabitFrequency::XTimesPerWeek => "X Times Per Week",
        }
    }
}

impl fmt::Display for HabitFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for HabitFrequency {
    type Err = HabitError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "daily" => Ok(HabitFrequency::Daily),
            "specificdays" => Ok(HabitFrequency::SpecificDays),
            "xtimesperweek" => Ok(HabitFrequency::XTimesPerWeek),
            _ => Err(HabitError::UnknownFrequency(s.to_string())),
        }
    }
}

/// Truncate an instant to the calendar day it falls on in its own offset
/// (midnight to midnight, not a rolling 24 hour window).
pub fn calendar_day<Tz: TimeZone>(at: &DateTime<Tz>) -> NaiveDate {
    at.date_naive()
}

/// Proof that a habit was completed on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionLog {
    habit_id: HabitId,
    completed_at: DateTime<FixedOffset>,
}

impl CompletionLog {
    pub(crate) fn new(habit_id: HabitId, completed_at: DateTime<FixedOffset>) -> Self {
        Self {
            habit_id,
            completed_at,
        }
    }

    pub fn habit_id(&self) -> HabitId {
        self.habit_id
    }

    pub fn completed_at(&self) -> DateTime<FixedOffset> {
        self.completed_at
    }

    pub fn day(&self) -> NaiveDate {
        calendar_day(&self.completed_at)
    }
}

/// Result of flipping a habit's completion for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Toggle {
    Completed,
    Cleared,
}

impl Toggle {
    pub fn is_completed(&self) -> bool {
        matches!(self, Toggle::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredHabit")]
pub struct Habit {
    id: HabitId,
    name: String,
    emoji_icon: String,
    target_frequency: HabitFrequency,
    created_at: DateTime<FixedOffset>,
    reminder_time: Option<NaiveTime>,
    color_hex: String,
    logs: Vec<CompletionLog>,
}

/// Habit as read back from storage, before the same checks `NewHabit` runs.
#[derive(Deserialize)]
struct StoredHabit {
    id: HabitId,
    name: String,
    #[serde(default)]
    emoji_icon: String,
    target_frequency: HabitFrequency,
    created_at: DateTime<FixedOffset>,
    #[serde(default)]
    reminder_time: Option<NaiveTime>,
    color_hex: String,
    #[serde(default)]
    logs: Vec<CompletionLog>,
}

impl TryFrom<StoredHabit> for Habit {
    type Error = HabitError;

    fn try_from(stored: StoredHabit) -> Result<Self> {
        let name = normalize_name(&stored.name)?;
        let color_hex = normalize_color(&stored.color_hex)?;
        let emoji_icon = if stored.emoji_icon.is_empty() {
            first_emoji(&name).unwrap_or(DEFAULT_EMOJI).to_string()
        } else {
            stored.emoji_icon
        };
        Ok(Habit {
            id: stored.id,
            name,
            emoji_icon,
            target_frequency: stored.target_frequency,
            created_at: stored.created_at,
            reminder_time: stored.reminder_time,
            color_hex,
            logs: stored.logs,
        })
    }
}

impl Habit {
    pub fn id(&self) -> HabitId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn emoji_icon(&self) -> &str {
        &self.emoji_icon
    }

    pub fn target_frequency(&self) -> HabitFrequency {
        self.target_frequency
    }

    pub fn created_at(&self) -> DateTime<FixedOffset> {
        self.created_at
    }

    pub fn reminder_time(&self) -> Option<NaiveTime> {
        self.reminder_time
    }

    pub fn color_hex(&self) -> &str {
        &self.color_hex
    }

    pub fn logs(&self) -> &[CompletionLog] {
        &self.logs
    }

    pub fn rename(&mut self, name: &str) -> Result<()> {
        let name = normalize_name(name)?;
        self.emoji_icon = first_emoji(&name).unwrap_or(DEFAULT_EMOJI).to_string();
        self.name = name;
        Ok(())
    }

    pub fn is_completed<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> bool {
        self.is_completed_on(calendar_day(at))
    }

    pub fn is_completed_on(&self, day: NaiveDate) -> bool {
        self.log_for_day(day).is_some()
    }

    /// First log recorded for `day`. Any later duplicates are ignored, as are
    /// logs whose back-reference names another habit.
    pub fn log_for_day(&self, day: NaiveDate) -> Option<&CompletionLog> {
        self.owned_logs().find(|log| log.day() == day)
    }

    /// Mark the day of `at` complete, or clear it if it already is.
    ///
    /// The new log is stamped with `at` itself, so historical and future days
    /// can be toggled just like today.
    pub fn toggle<Tz: TimeZone>(&mut self, at: &DateTime<Tz>) -> Toggle {
        let day = calendar_day(at);
        let id = self.id;
        let matching = |log: &CompletionLog| log.habit_id == id && log.day() == day;
        if let Some(index) = self.logs.iter().position(matching) {
            self.logs.remove(index);
            tracing::debug!(habit = %self.id, %day, "completion cleared");
            return Toggle::Cleared;
        }
        self.logs.push(CompletionLog::new(self.id, at.fixed_offset()));
        tracing::debug!(habit = %self.id, %day, "completion recorded");
        Toggle::Completed
    }

    /// Distinct completed days, oldest first.
    pub fn completed_days(&self) -> Vec<NaiveDate> {
        let mut days: Vec<NaiveDate> = self.owned_logs().map(CompletionLog::day).collect();
        days.sort();
        days.dedup();
        days
    }

    /// Destroy every owned log. Runs before the habit itself is dropped.
    pub fn clear_logs(&mut self) -> usize {
        let removed = self.logs.len();
        self.logs.clear();
        removed
    }

    #[cfg(test)]
    pub(crate) fn push_raw_log(&mut self, log: CompletionLog) {
        self.logs.push(log);
    }

    fn owned_logs(&self) -> impl Iterator<Item = &CompletionLog> + '_ {
        self.logs.iter().filter(move |log| log.habit_id == self.id)
    }

    pub(crate) fn foreign_log_count(&self) -> usize {
        self.logs
            .iter()
            .filter(|log| log.habit_id != self.id)
            .count()
    }
}

/// Input for creating a habit.
#[derive(Debug, Clone, Default)]
pub struct NewHabit {
    id: Option<HabitId>,
    name: String,
    frequency: HabitFrequency,
    color_hex: Option<String>,
    reminder_time: Option<NaiveTime>,
    created_at: Option<DateTime<FixedOffset>>,
}

impl NewHabit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: HabitId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn frequency(mut self, frequency: HabitFrequency) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn color_hex(mut self, color: impl Into<String>) -> Self {
        self.color_hex = Some(color.into());
        self
    }

    pub fn reminder_time(mut self, time: NaiveTime) -> Self {
        self.reminder_time = Some(time);
        self
    }

    pub fn created_at<Tz: TimeZone>(mut self, at: DateTime<Tz>) -> Self {
        self.created_at = Some(at.fixed_offset());
        self
    }

    pub fn into_habit(self) -> Result<Habit> {
        let name = normalize_name(&self.name)?;
        let color_hex = match self.color_hex {
            Some(raw) => normalize_color(&raw)?,
            None => DEFAULT_COLOR_HEX.to_string(),
        };
        let emoji_icon = first_emoji(&name).unwrap_or(DEFAULT_EMOJI).to_string();
        Ok(Habit {
            id: self.id.unwrap_or_default(),
            name,
            emoji_icon,
            target_frequency: self.frequency,
            created_at: self
                .created_at
                .unwrap_or_else(|| Local::now().fixed_offset()),
            reminder_time: self.reminder_time,
            color_hex,
            logs: Vec::new(),
        })
    }
}

fn normalize_name(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(HabitError::EmptyName);
    }
    Ok(trimmed.to_string())
}

fn normalize_color(raw: &str) -> Result<String> {
    let hex = raw.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(HabitError::InvalidColor(raw.to_string()));
    }
    Ok(hex.to_ascii_uppercase())
}

/// First character in `text` that renders as an emoji by default.
pub fn first_emoji(text: &str) -> Option<&str> {
    text.char_indices()
        .find(|(_, c)| is_emoji_presentation(*c))
        .map(|(idx, c)| &text[idx..idx + c.len_utf8()])
}

// Emoji_Presentation=Yes ranges; text-default symbols such as U+2600 are excluded.
fn is_emoji_presentation(c: char) -> bool {
    matches!(
        c as u32,
        0x231A..=0x231B
            | 0x23E9..=0x23EC
            | 0x23F0
            | 0x23F3
            | 0x25FD..=0x25FE
            | 0x2614..=0x2615
            | 0x2648..=0x2653
            | 0x267F
            | 0x2693
            | 0x26A1
            | 0x26AA..=0x26AB
            | 0x26BD..=0x26BE
            | 0x26C4..=0x26C5
            | 0x26CE
            | 0x26D4
            | 0x26EA
            | 0x26F2..=0x26F3
            | 0x26F5
            | 0x26FA
            | 0x26FD
            | 0x2705
            | 0x270A..=0x270B
            | 0x2728
            | 0x274C
            | 0x274E
            | 0x2753..=0x2755
            | 0x2757
            | 0x2795..=0x2797
            | 0x27B0
            | 0x27BF
            | 0x2B1B..=0x2B1C
            | 0x2B50
            | 0x2B55
            | 0x1F004
            | 0x1F0CF
            | 0x1F18E
            | 0x1F191..=0x1F19A
            | 0x1F300..=0x1F320
            | 0x1F32D..=0x1F335
            | 0x1F337..=0x1F37C
            | 0x1F37E..=0x1F393
            | 0x1F3A0..=0x1F3CA
            | 0x1F3CF..=0x1F3D3
            | 0x1F3E0..=0x1F3F0
            | 0x1F3F4
            | 0x1F3F8..=0x1F43E
            | 0x1F440
            | 0x1F442..=0x1F4FC
            | 0x1F4FF..=0x1F53D
            | 0x1F54B..=0x1F54E
            | 0x1F550..=0x1F567
            | 0x1F57A
            | 0x1F595..=0x1F596
            | 0x1F5A4
            | 0x1F5FB..=0x1F64F
            | 0x1F680..=0x1F6C5
            | 0x1F6CC
            | 0x1F6D0..=0x1F6D2
            | 0x1F6D5..=0x1F6D7
            | 0x1F6EB..=0x1F6EC
            | 0x1F6F4..=0x1F6FC
            | 0x1F7E0..=0x1F7EB
            | 0x1F90C..=0x1F93A
            | 0x1F93C..=0x1F945
            | 0x1F947..=0x1F9FF
            | 0x1FA70..=0x1FAFF
    )
}
