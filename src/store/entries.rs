//! Notes, food records and the per-day totals derived from them.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};

use super::types::{Entry, EntryKind, Granularity, NewEntry, NoteStats, PeriodTotals};
use super::{DATE_FORMAT, Database, ENTRY_CAPACITY, Result, StoreError, TIMESTAMP_FORMAT};
use crate::nutrition::{Nutrients, Provenance};

const ENTRY_COLUMNS: &str =
    "id, owner_id, kind, body, calories, protein_g, fat_g, carbs_g, advice, provenance, created_at";

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<Entry> {
    let calories: Option<i64> = row.get(4)?;
    let nutrients = match calories {
        Some(calories) => Some(Nutrients {
            calories,
            protein_g: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
            fat_g: row.get::<_, Option<f64>>(6)?.unwrap_or(0.0),
            carbs_g: row.get::<_, Option<f64>>(7)?.unwrap_or(0.0),
        }),
        None => None,
    };

    Ok(Entry {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        kind: EntryKind::from_column(&row.get::<_, String>(2)?),
        body: row.get(3)?,
        nutrients,
        advice: row.get(8)?,
        provenance: row
            .get::<_, Option<String>>(9)?
            .and_then(|tag| Provenance::parse(&tag)),
        created_at: row.get(10)?,
    })
}

fn log_event(conn: &Connection, owner_id: i64, entry_id: i64, action: &str, at: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO entry_events (owner_id, entry_id, action, at) VALUES (?1, ?2, ?3, ?4)",
        params![owner_id, entry_id, action, at],
    )?;
    Ok(())
}

/// Rebuild the `daily_totals` row of one day from the food entries left on it.
fn recompute_day(conn: &Connection, owner_id: i64, date: &str) -> Result<()> {
    let (count, calories, protein, fat, carbs): (i64, i64, f64, f64, f64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(calories), 0), COALESCE(SUM(protein_g), 0),
                COALESCE(SUM(fat_g), 0), COALESCE(SUM(carbs_g), 0)
         FROM entries
         WHERE owner_id = ?1 AND kind = 'food' AND substr(created_at, 1, 10) = ?2",
        params![owner_id, date],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
    )?;

    if count == 0 {
        conn.execute(
            "DELETE FROM daily_totals WHERE owner_id = ?1 AND date = ?2",
            params![owner_id, date],
        )?;
    } else {
        conn.execute(
            "INSERT INTO daily_totals (owner_id, date, total_calories, total_protein, total_fat, total_carbs)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(owner_id, date) DO UPDATE SET
                total_calories = excluded.total_calories,
                total_protein = excluded.total_protein,
                total_fat = excluded.total_fat,
                total_carbs = excluded.total_carbs",
            params![owner_id, date, calories, protein, fat, carbs],
        )?;
    }
    Ok(())
}

impl Database {
    /// Store a note or a food record.
    ///
    /// Fails with [`StoreError::CapacityExceeded`] once the owner already has
    /// [`ENTRY_CAPACITY`] entries of the same kind. Food records bump the
    /// matching `daily_totals` row inside the same transaction.
    pub fn add_entry(&self, owner_id: i64, entry: &NewEntry, at: NaiveDateTime) -> Result<i64> {
        let kind = entry.kind();
        let created_at = at.format(TIMESTAMP_FORMAT).to_string();

        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM entries WHERE owner_id = ?1 AND kind = ?2",
            params![owner_id, kind.as_str()],
            |row| row.get(0),
        )?;
        if count as usize >= ENTRY_CAPACITY {
            info!("Entry limit reached for {owner_id} ({})", kind.as_str());
            return Err(StoreError::CapacityExceeded { limit: ENTRY_CAPACITY });
        }

        let id = match entry {
            NewEntry::Note { text } => {
                tx.execute(
                    "INSERT INTO entries (owner_id, kind, body, created_at) VALUES (?1, 'note', ?2, ?3)",
                    params![owner_id, text, created_at],
                )?;
                let id = tx.last_insert_rowid();
                log_event(&tx, owner_id, id, "created", &created_at)?;
                id
            }
            NewEntry::Food { description, record } => {
                let n = &record.nutrients;
                tx.execute(
                    "INSERT INTO entries
                        (owner_id, kind, body, calories, protein_g, fat_g, carbs_g, advice, provenance, created_at)
                     VALUES (?1, 'food', ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        owner_id,
                        description,
                        n.calories,
                        n.protein_g,
                        n.fat_g,
                        n.carbs_g,
                        record.advice,
                        record.provenance.as_str(),
                        created_at
                    ],
                )?;
                let id = tx.last_insert_rowid();
                let date = at.format(DATE_FORMAT).to_string();
                tx.execute(
                    "INSERT INTO daily_totals (owner_id, date, total_calories, total_protein, total_fat, total_carbs)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(owner_id, date) DO UPDATE SET
                        total_calories = total_calories + excluded.total_calories,
                        total_protein = total_protein + excluded.total_protein,
                        total_fat = total_fat + excluded.total_fat,
                        total_carbs = total_carbs + excluded.total_carbs",
                    params![owner_id, date, n.calories, n.protein_g, n.fat_g, n.carbs_g],
                )?;
                id
            }
        };

        tx.commit()?;
        debug!("Stored {} #{id} for {owner_id}", kind.as_str());
        Ok(id)
    }

    /// Newest entries of one kind first.
    pub fn list_recent(&self, owner_id: i64, kind: EntryKind, limit: usize) -> Result<Vec<Entry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries
             WHERE owner_id = ?1 AND kind = ?2
             ORDER BY created_at DESC, id DESC LIMIT ?3"
        ))?;
        let rows = stmt.query_map(params![owner_id, kind.as_str(), limit as i64], entry_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Every entry of one kind, oldest first.
    pub fn list_all(&self, owner_id: i64, kind: EntryKind) -> Result<Vec<Entry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE owner_id = ?1 AND kind = ?2 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![owner_id, kind.as_str()], entry_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// One of the owner's entries; other users' ids read as absent.
    pub fn get_entry(&self, owner_id: i64, id: i64) -> Result<Option<Entry>> {
        let conn = self.conn();
        let entry = conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1 AND owner_id = ?2"),
                params![id, owner_id],
                entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    /// Notes containing `needle`, case-insensitively, newest first.
    ///
    /// Matching happens in Rust: SQLite's `LOWER` only folds ASCII.
    pub fn find(&self, owner_id: i64, needle: &str) -> Result<Vec<Entry>> {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let mut notes = self.list_all(owner_id, EntryKind::Note)?;
        notes.retain(|note| note.body.to_lowercase().contains(&needle));
        notes.reverse();
        Ok(notes)
    }

    /// Replace the text of one of the owner's notes.
    pub fn update_text(&self, owner_id: i64, id: i64, text: &str, at: NaiveDateTime) -> Result<()> {
        let updated_at = at.format(TIMESTAMP_FORMAT).to_string();
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let changed = tx.execute(
            "UPDATE entries SET body = ?1, updated_at = ?2
             WHERE id = ?3 AND owner_id = ?4 AND kind = 'note'",
            params![text, updated_at, id, owner_id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound { id });
        }
        log_event(&tx, owner_id, id, "edited", &updated_at)?;

        tx.commit()?;
        Ok(())
    }

    /// Delete one of the owner's entries and return it.
    ///
    /// Entries of other users are reported as [`StoreError::NotFound`].
    pub fn delete(&self, owner_id: i64, id: i64, at: NaiveDateTime) -> Result<Entry> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let entry = tx
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1 AND owner_id = ?2"),
                params![id, owner_id],
                entry_from_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound { id })?;

        tx.execute("DELETE FROM entries WHERE id = ?1 AND owner_id = ?2", params![id, owner_id])?;

        match entry.kind {
            EntryKind::Food => recompute_day(&tx, owner_id, entry.created_date())?,
            EntryKind::Note => {
                let at = at.format(TIMESTAMP_FORMAT).to_string();
                log_event(&tx, owner_id, id, "deleted", &at)?;
            }
        }

        tx.commit()?;
        info!("🗑️ Deleted {} #{id} of {owner_id}", entry.kind.as_str());
        Ok(entry)
    }

    /// Number of live entries of one kind.
    pub fn count(&self, owner_id: i64, kind: EntryKind) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE owner_id = ?1 AND kind = ?2",
            params![owner_id, kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Accumulated totals of one day, if anything was eaten.
    pub fn day_totals(&self, owner_id: i64, date: NaiveDate) -> Result<Option<Nutrients>> {
        let conn = self.conn();
        let totals = conn
            .query_row(
                "SELECT total_calories, total_protein, total_fat, total_carbs
                 FROM daily_totals WHERE owner_id = ?1 AND date = ?2",
                params![owner_id, date.format(DATE_FORMAT).to_string()],
                |row| {
                    Ok(Nutrients {
                        calories: row.get(0)?,
                        protein_g: row.get(1)?,
                        fat_g: row.get(2)?,
                        carbs_g: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(totals)
    }

    /// Entries of one kind created on `date`, in chronological order.
    pub fn entries_on(&self, owner_id: i64, kind: EntryKind, date: NaiveDate) -> Result<Vec<Entry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries
             WHERE owner_id = ?1 AND kind = ?2 AND substr(created_at, 1, 10) = ?3
             ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map(
            params![owner_id, kind.as_str(), date.format(DATE_FORMAT).to_string()],
            entry_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Food totals from `start` (inclusive) on, per day or per month, oldest first.
    pub fn period_summary(
        &self,
        owner_id: i64,
        start: NaiveDate,
        granularity: Granularity,
    ) -> Result<Vec<PeriodTotals>> {
        let sql = match granularity {
            Granularity::Day => {
                "SELECT date, 1, total_calories, total_protein, total_fat, total_carbs
                 FROM daily_totals
                 WHERE owner_id = ?1 AND date >= ?2
                 ORDER BY date"
            }
            Granularity::Month => {
                "SELECT substr(date, 1, 7) AS month, COUNT(*), SUM(total_calories),
                        SUM(total_protein), SUM(total_fat), SUM(total_carbs)
                 FROM daily_totals
                 WHERE owner_id = ?1 AND date >= ?2
                 GROUP BY month
                 ORDER BY month"
            }
        };

        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![owner_id, start.format(DATE_FORMAT).to_string()], |row| {
            Ok(PeriodTotals {
                period: row.get(0)?,
                days: row.get::<_, i64>(1)? as u32,
                totals: Nutrients {
                    calories: row.get(2)?,
                    protein_g: row.get(3)?,
                    fat_g: row.get(4)?,
                    carbs_g: row.get(5)?,
                },
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Note counters for `/stats`; the weekly window ends at `now`.
    pub fn note_stats(&self, owner_id: i64, now: NaiveDateTime) -> Result<NoteStats> {
        let week_ago = (now - Duration::days(7)).format(TIMESTAMP_FORMAT).to_string();
        let conn = self.conn();

        let (total_notes, total_chars): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(LENGTH(body)), 0)
             FROM entries WHERE owner_id = ?1 AND kind = 'note'",
            params![owner_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let mut stats = NoteStats {
            total_notes: total_notes as usize,
            total_chars: total_chars as usize,
            ..NoteStats::default()
        };

        let mut stmt = conn.prepare(
            "SELECT action, COUNT(*), COALESCE(SUM(CASE WHEN at >= ?2 THEN 1 ELSE 0 END), 0)
             FROM entry_events WHERE owner_id = ?1
             GROUP BY action",
        )?;
        let rows = stmt.query_map(params![owner_id, week_ago], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
        })?;

        for row in rows {
            let (action, total, weekly) = row?;
            let (total, weekly) = (total as usize, weekly as usize);
            match action.as_str() {
                "created" => (stats.total_created, stats.weekly_created) = (total, weekly),
                "edited" => (stats.total_edited, stats.weekly_edited) = (total, weekly),
                "deleted" => (stats.total_deleted, stats.weekly_deleted) = (total, weekly),
                _ => {}
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::NutritionRecord;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap()
    }

    fn note(text: &str) -> NewEntry {
        NewEntry::Note { text: text.to_string() }
    }

    fn food(description: &str, calories: i64) -> NewEntry {
        NewEntry::Food {
            description: description.to_string(),
            record: NutritionRecord {
                nutrients: Nutrients { calories, protein_g: 10.0, fat_g: 5.0, carbs_g: 20.0 },
                advice: "ok".to_string(),
                provenance: Provenance::FallbackEstimate,
            },
        }
    }

    #[test]
    fn test_list_recent_newest_first() {
        let db = Database::in_memory().unwrap();
        db.add_entry(1, &note("first"), at("2026-03-01 09:00:00")).unwrap();
        db.add_entry(1, &note("second"), at("2026-03-02 09:00:00")).unwrap();
        db.add_entry(1, &note("third"), at("2026-03-03 09:00:00")).unwrap();

        let recent = db.list_recent(1, EntryKind::Note, 2).unwrap();
        let bodies: Vec<_> = recent.iter().map(|e| e.body.as_str()).collect();
        assert_eq!(bodies, ["third", "second"]);
    }

    #[test]
    fn test_find_is_case_insensitive_for_cyrillic() {
        let db = Database::in_memory().unwrap();
        db.add_entry(1, &note("Купить МОЛОКО"), at("2026-03-01 09:00:00")).unwrap();
        db.add_entry(1, &note("позвонить маме"), at("2026-03-01 10:00:00")).unwrap();
        db.add_entry(2, &note("молоко у соседа"), at("2026-03-01 11:00:00")).unwrap();

        let found = db.find(1, "молоко").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].body, "Купить МОЛОКО");
        assert!(db.find(1, "   ").unwrap().is_empty());
    }

    #[test]
    fn test_update_text_rejects_food_entries() {
        let db = Database::in_memory().unwrap();
        let id = db.add_entry(1, &food("гречка", 130), at("2026-03-01 09:00:00")).unwrap();
        let err = db.update_text(1, id, "new", at("2026-03-01 10:00:00")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { id: found } if found == id));
    }

    #[test]
    fn test_delete_food_recomputes_day() {
        let db = Database::in_memory().unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let a = db.add_entry(1, &food("каша", 300), at("2026-03-01 08:00:00")).unwrap();
        let b = db.add_entry(1, &food("суп", 200), at("2026-03-01 13:00:00")).unwrap();

        db.delete(1, a, at("2026-03-01 20:00:00")).unwrap();
        let totals = db.day_totals(1, day).unwrap().unwrap();
        assert_eq!(totals.calories, 200);
        assert!((totals.protein_g - 10.0).abs() < 1e-9);

        db.delete(1, b, at("2026-03-01 20:00:00")).unwrap();
        assert!(db.day_totals(1, day).unwrap().is_none());
        assert!(db.period_summary(1, day, Granularity::Day).unwrap().is_empty());
    }

    #[test]
    fn test_entries_on_filters_by_day() {
        let db = Database::in_memory().unwrap();
        db.add_entry(1, &food("завтрак", 300), at("2026-03-01 08:00:00")).unwrap();
        db.add_entry(1, &food("ужин", 500), at("2026-03-02 19:30:00")).unwrap();

        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let entries = db.entries_on(1, EntryKind::Food, day).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].body, "ужин");
        assert_eq!(entries[0].created_time(), "19:30");
        assert_eq!(entries[0].provenance, Some(Provenance::FallbackEstimate));
    }

    #[test]
    fn test_monthly_summary_groups_days() {
        let db = Database::in_memory().unwrap();
        db.add_entry(1, &food("a", 1000), at("2026-02-27 08:00:00")).unwrap();
        db.add_entry(1, &food("b", 2000), at("2026-02-28 08:00:00")).unwrap();
        db.add_entry(1, &food("c", 1500), at("2026-03-01 08:00:00")).unwrap();
        db.add_entry(1, &food("d", 500), at("2026-03-01 12:00:00")).unwrap();

        let start = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let months = db.period_summary(1, start, Granularity::Month).unwrap();
        assert_eq!(months.len(), 2);
        assert_eq!(months[0].period, "2026-02");
        assert_eq!(months[0].days, 2);
        assert_eq!(months[0].totals.calories, 3000);
        assert_eq!(months[0].daily_average().0, 1500.0);
        assert_eq!(months[1].period, "2026-03");
        assert_eq!(months[1].days, 1);
        assert_eq!(months[1].totals.calories, 2000);
    }

    #[test]
    fn test_note_stats_counts_events() {
        let db = Database::in_memory().unwrap();
        let old = db.add_entry(1, &note("старое"), at("2026-01-01 09:00:00")).unwrap();
        let fresh = db.add_entry(1, &note("новое"), at("2026-03-09 09:00:00")).unwrap();
        db.update_text(1, fresh, "новое!", at("2026-03-09 10:00:00")).unwrap();
        db.delete(1, old, at("2026-03-09 11:00:00")).unwrap();

        let stats = db.note_stats(1, at("2026-03-10 12:00:00")).unwrap();
        assert_eq!(stats.total_notes, 1);
        assert_eq!(stats.total_chars, "новое!".chars().count());
        assert_eq!(stats.total_created, 2);
        assert_eq!(stats.weekly_created, 1);
        assert_eq!(stats.total_edited, 1);
        assert_eq!(stats.weekly_edited, 1);
        assert_eq!(stats.total_deleted, 1);
        assert_eq!(stats.weekly_deleted, 1);
    }
}
