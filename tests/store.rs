//! Store behaviour through the public API, against a file-backed database.
//!
//! Run with: cargo test --test store

use chrono::{NaiveDate, NaiveDateTime};
use diary_bot::nutrition::{Nutrients, NutritionRecord, Provenance};
use diary_bot::store::{Database, ENTRY_CAPACITY, EntryKind, Granularity, NewEntry, StoreError, User};

fn at(date: &str, time: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M:%S").unwrap()
}

fn food(description: &str, calories: i64, protein_g: f64) -> NewEntry {
    NewEntry::Food {
        description: description.to_string(),
        record: NutritionRecord {
            nutrients: Nutrients { calories, protein_g, fat_g: 1.0, carbs_g: 10.0 },
            advice: "ok".to_string(),
            provenance: Provenance::FallbackEstimate,
        },
    }
}

fn note(text: &str) -> NewEntry {
    NewEntry::Note { text: text.to_string() }
}

#[test]
fn test_reopen_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("diary.db");

    {
        let db = Database::open(&path).unwrap();
        db.upsert_user(&User { id: 1, username: Some("u".into()), display_name: "U".into() }, "2025-01-01 10:00:00")
            .unwrap();
        db.add_entry(1, &note("persisted"), at("2025-01-01", "10:00:00")).unwrap();
        db.set_active_model(3).unwrap();
    }

    let db = Database::open(&path).unwrap();
    assert_eq!(db.list_all(1, EntryKind::Note).unwrap()[0].body, "persisted");
    assert_eq!(db.active_model().unwrap().unwrap().id, 3);
    assert_eq!(db.list_models().unwrap().len(), 5);
}

#[test]
fn test_capacity_is_enforced_per_kind() {
    let db = Database::in_memory().unwrap();
    let now = at("2025-02-01", "12:00:00");
    for i in 0..ENTRY_CAPACITY {
        db.add_entry(7, &note(&format!("n{i}")), now).unwrap();
    }

    let err = db.add_entry(7, &note("one too many"), now).unwrap_err();
    assert!(matches!(err, StoreError::CapacityExceeded { limit: ENTRY_CAPACITY }));
    assert_eq!(db.count(7, EntryKind::Note).unwrap(), ENTRY_CAPACITY);

    // Other kinds and other owners are unaffected.
    db.add_entry(7, &food("суп", 200, 5.0), now).unwrap();
    db.add_entry(8, &note("mine"), now).unwrap();
}

#[test]
fn test_full_food_diary_rejects_without_touching_totals() {
    let db = Database::in_memory().unwrap();
    let now = at("2025-02-01", "12:00:00");
    let day = now.date();

    let ids: Vec<i64> = (0..ENTRY_CAPACITY)
        .map(|i| db.add_entry(3, &food(&format!("meal {i}"), 10, 1.0), now).unwrap())
        .collect();
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));

    let before = db.day_totals(3, day).unwrap();
    assert_eq!(before.map(|t| t.calories), Some(500));

    let err = db.add_entry(3, &food("one more", 10, 1.0), now).unwrap_err();
    assert!(matches!(err, StoreError::CapacityExceeded { limit: ENTRY_CAPACITY }));
    assert_eq!(db.day_totals(3, day).unwrap(), before);
    assert_eq!(db.count(3, EntryKind::Food).unwrap(), ENTRY_CAPACITY);
}

#[test]
fn test_daily_totals_follow_entries() {
    let db = Database::in_memory().unwrap();
    let day = NaiveDate::from_ymd_opt(2025, 2, 3).unwrap();

    let first = db.add_entry(1, &food("a", 300, 10.0), at("2025-02-03", "08:00:00")).unwrap();
    db.add_entry(1, &food("b", 450, 20.5), at("2025-02-03", "13:00:00")).unwrap();
    db.add_entry(1, &food("c", 999, 1.0), at("2025-02-04", "09:00:00")).unwrap();

    let totals = db.day_totals(1, day).unwrap().unwrap();
    assert_eq!(totals.calories, 750);
    assert!((totals.protein_g - 30.5).abs() < 1e-9);

    db.delete(1, first, at("2025-02-03", "20:00:00")).unwrap();
    assert_eq!(db.day_totals(1, day).unwrap().unwrap().calories, 450);

    let days = db.period_summary(1, day, Granularity::Day).unwrap();
    let periods: Vec<_> = days.iter().map(|d| d.period.as_str()).collect();
    assert_eq!(periods, ["2025-02-03", "2025-02-04"]);

    let months = db.period_summary(1, day, Granularity::Month).unwrap();
    assert_eq!(months.len(), 1);
    assert_eq!(months[0].days, 2);
    assert_eq!(months[0].totals.calories, 1449);
}

#[test]
fn test_last_food_of_day_removes_totals() {
    let db = Database::in_memory().unwrap();
    let id = db.add_entry(1, &food("a", 300, 10.0), at("2025-02-03", "08:00:00")).unwrap();
    db.delete(1, id, at("2025-02-03", "09:00:00")).unwrap();

    let day = NaiveDate::from_ymd_opt(2025, 2, 3).unwrap();
    assert_eq!(db.day_totals(1, day).unwrap(), None);
    assert!(db.period_summary(1, day, Granularity::Day).unwrap().is_empty());
}

#[test]
fn test_entries_are_private_to_owner() {
    let db = Database::in_memory().unwrap();
    let now = at("2025-02-03", "08:00:00");
    let id = db.add_entry(1, &note("alice only"), now).unwrap();

    assert!(matches!(db.delete(2, id, now), Err(StoreError::NotFound { .. })));
    assert!(matches!(db.update_text(2, id, "hijack", now), Err(StoreError::NotFound { .. })));
    assert!(db.get_entry(2, id).unwrap().is_none());
    assert!(db.find(2, "alice").unwrap().is_empty());
    assert_eq!(db.get_entry(1, id).unwrap().unwrap().body, "alice only");
}

#[test]
fn test_note_history_counts() {
    let db = Database::in_memory().unwrap();
    let old = at("2025-01-01", "10:00:00");
    let now = at("2025-02-01", "10:00:00");

    let a = db.add_entry(1, &note("старая"), old).unwrap();
    db.update_text(1, a, "старая, но правленая", now).unwrap();
    let b = db.add_entry(1, &note("новая"), now).unwrap();
    db.delete(1, b, now).unwrap();

    let stats = db.note_stats(1, now).unwrap();
    assert_eq!(stats.total_notes, 1);
    assert_eq!(stats.total_chars, "старая, но правленая".chars().count());
    assert_eq!((stats.total_created, stats.total_edited, stats.total_deleted), (2, 1, 1));
    assert_eq!((stats.weekly_created, stats.weekly_edited, stats.weekly_deleted), (1, 1, 1));
}
