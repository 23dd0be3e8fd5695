use crate::nutrition::{Nutrients, NutritionRecord, Provenance};

/// A Telegram user known to the bot.
///
/// The first-contact time is kept in the `users` row only; nothing reads it back.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Note,
    Food,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Note => "note",
            EntryKind::Food => "food",
        }
    }

    pub(crate) fn from_column(s: &str) -> Self {
        match s {
            "food" => EntryKind::Food,
            _ => EntryKind::Note,
        }
    }
}

/// Payload for [`super::Database::add_entry`].
#[derive(Debug, Clone)]
pub enum NewEntry {
    Note { text: String },
    Food { description: String, record: NutritionRecord },
}

impl NewEntry {
    pub fn kind(&self) -> EntryKind {
        match self {
            NewEntry::Note { .. } => EntryKind::Note,
            NewEntry::Food { .. } => EntryKind::Food,
        }
    }
}

/// A stored note or food record.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: i64,
    pub owner_id: i64,
    pub kind: EntryKind,
    /// Note text or food description.
    pub body: String,
    /// Present on food records only.
    pub nutrients: Option<Nutrients>,
    pub advice: Option<String>,
    pub provenance: Option<Provenance>,
    pub created_at: String,
}

impl Entry {
    /// Calendar date part of `created_at`.
    pub fn created_date(&self) -> &str {
        self.created_at.get(..10).unwrap_or(&self.created_at)
    }

    /// `HH:MM` part of `created_at`.
    pub fn created_time(&self) -> &str {
        self.created_at.get(11..16).unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Day,
    Month,
}

/// Summed nutrition over one period.
///
/// For [`Granularity::Day`] `period` is `YYYY-MM-DD` and `days` is 1; for
/// [`Granularity::Month`] `period` is `YYYY-MM` and `days` counts the days
/// with food records in that month.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodTotals {
    pub period: String,
    pub days: u32,
    pub totals: Nutrients,
}

impl PeriodTotals {
    /// Per-day averages as `(calories, protein, fat, carbs)`.
    pub fn daily_average(&self) -> (f64, f64, f64, f64) {
        let days = f64::from(self.days.max(1));
        (
            self.totals.calories as f64 / days,
            self.totals.protein_g / days,
            self.totals.fat_g / days,
            self.totals.carbs_g / days,
        )
    }
}

/// Note counters shown by `/stats`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteStats {
    pub total_notes: usize,
    pub total_chars: usize,
    pub total_created: usize,
    pub total_edited: usize,
    pub total_deleted: usize,
    pub weekly_created: usize,
    pub weekly_edited: usize,
    pub weekly_deleted: usize,
}

/// An entry of the LLM model catalogue.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmModel {
    pub id: i64,
    pub key: String,
    pub label: String,
    pub active: bool,
}
