use circadian_core::model::record::parse_timestamp;
use circadian_core::validation::RecordField;
use circadian_core::{
    CsvMeasurementRepository, MeasurementQuery, MeasurementRecord, MeasurementRepository,
    MetricRange, PersonFilter, RecordKey, StoreError,
};
use chrono::{NaiveDate, Timelike};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const HEADER: &str = "person_id,timestamp,heart_rate,systolic_bp,diastolic_bp,energy_level,notes";

fn record(person: &str, ts: &str, heart_rate: i32, energy: i32) -> MeasurementRecord {
    MeasurementRecord::new(person, parse_timestamp(ts).unwrap(), heart_rate, 120, 80, energy)
}

fn open_store() -> (TempDir, PathBuf, CsvMeasurementRepository) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("circadian_data.csv");
    let repo = CsvMeasurementRepository::new(&path);
    (dir, path, repo)
}

#[test]
fn ensure_initialized_creates_header_only_file() {
    let (_dir, path, repo) = open_store();
    assert!(!path.exists());

    repo.ensure_initialized().unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), format!("{HEADER}\n"));
    assert!(repo.load_all().unwrap().is_empty());
}

#[test]
fn ensure_initialized_twice_never_alters_existing_file() {
    let (_dir, path, repo) = open_store();
    repo.ensure_initialized().unwrap();
    repo.append(&record("alice", "2024-01-01 08:00:00", 65, 7)).unwrap();
    let before = fs::read(&path).unwrap();

    repo.ensure_initialized().unwrap();
    repo.ensure_initialized().unwrap();

    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn ensure_initialized_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("store").join("data.csv");
    let repo = CsvMeasurementRepository::new(&path);

    repo.ensure_initialized().unwrap();

    assert!(path.exists());
}

#[test]
fn load_all_on_missing_file_is_empty() {
    let (_dir, path, repo) = open_store();
    assert!(repo.load_all().unwrap().is_empty());
    assert!(!path.exists());
}

#[test]
fn appended_record_round_trips_through_load_all() {
    let (_dir, _path, repo) = open_store();
    repo.ensure_initialized().unwrap();
    let alice = MeasurementRecord::new(
        "alice",
        parse_timestamp("2024-01-01 08:00:00").unwrap(),
        65,
        120,
        80,
        7,
    )
    .with_notes("fasting");

    repo.append(&alice).unwrap();

    assert_eq!(repo.load_all().unwrap(), vec![alice]);
}

#[test]
fn append_writes_canonical_row() {
    let (_dir, path, repo) = open_store();
    repo.append(
        &record("alice", "2024-01-01 08:00:00", 65, 7).with_notes("after run, tired"),
    )
    .unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    assert_eq!(
        contents,
        format!("{HEADER}\nalice,2024-01-01 08:00:00,65,120,80,7,\"after run, tired\"\n")
    );
}

#[test]
fn notes_with_quotes_and_newlines_survive_reload() {
    let (_dir, _path, repo) = open_store();
    let tricky = record("alice", "2024-01-01 08:00:00", 65, 7)
        .with_notes("said \"fine\"\nslept badly, woke at 3");

    repo.append(&tricky).unwrap();

    assert_eq!(repo.load_all().unwrap(), vec![tricky]);
}

#[test]
fn duplicate_append_fails_and_keeps_one_row() {
    let (_dir, _path, repo) = open_store();
    let first = record("alice", "2024-01-01 08:00:00", 65, 7);
    let same_key = record("alice", "2024-01-01 08:00:00", 90, 3);

    repo.append(&first).unwrap();
    let err = repo.append(&same_key).unwrap_err();

    assert!(matches!(err, StoreError::DuplicateKey(ref key) if *key == first.key()));
    assert!(err.is_recoverable());
    assert_eq!(repo.load_all().unwrap(), vec![first]);
}

#[test]
fn same_timestamp_for_different_people_is_allowed() {
    let (_dir, _path, repo) = open_store();
    repo.append(&record("alice", "2024-01-01 08:00:00", 65, 7)).unwrap();
    repo.append(&record("bob", "2024-01-01 08:00:00", 72, 6)).unwrap();

    assert_eq!(repo.load_all().unwrap().len(), 2);
}

#[test]
fn append_rejects_invalid_record_without_touching_file() {
    let (_dir, path, repo) = open_store();
    repo.ensure_initialized().unwrap();
    let before = fs::read(&path).unwrap();

    let err = repo
        .append(&record("alice", "2024-01-01 08:00:00", 250, 7))
        .unwrap_err();

    match err {
        StoreError::Validation(errors) => assert!(errors.has_field(RecordField::HeartRate)),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn fractional_second_timestamp_cannot_shadow_an_existing_key() {
    let (_dir, path, repo) = open_store();
    let stored = record("alice", "2024-01-01 08:00:00", 65, 7);
    repo.append(&stored).unwrap();
    let before = fs::read(&path).unwrap();

    let mut shadow = record("alice", "2024-01-01 08:00:00", 90, 3);
    shadow.timestamp = shadow.timestamp.with_nanosecond(100_000_000).unwrap();
    let err = repo.append(&shadow).unwrap_err();

    match err {
        StoreError::Validation(errors) => assert!(errors.has_field(RecordField::Timestamp)),
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(
        repo.update(&stored.key(), &shadow),
        Err(StoreError::Validation(_))
    ));
    assert_eq!(fs::read(&path).unwrap(), before);
    assert_eq!(repo.load_all().unwrap(), vec![stored]);
}

#[test]
fn update_by_key_replaces_record_in_place() {
    let (_dir, _path, repo) = open_store();
    repo.append(&record("alice", "2024-01-01 08:00:00", 65, 7)).unwrap();
    repo.append(&record("alice", "2024-01-01 12:00:00", 70, 6)).unwrap();

    let key = RecordKey::new("alice", parse_timestamp("2024-01-01 08:00:00").unwrap());
    let edited = record("alice", "2024-01-01 08:00:00", 68, 5).with_notes("re-measured");
    repo.update(&key, &edited).unwrap();

    let records = repo.load_all().unwrap();
    assert_eq!(records[0], edited);
    assert_eq!(records[1].heart_rate, 70);
}

#[test]
fn update_can_move_record_to_free_key_but_not_onto_taken_key() {
    let (_dir, _path, repo) = open_store();
    let morning = record("alice", "2024-01-01 08:00:00", 65, 7);
    let noon = record("alice", "2024-01-01 12:00:00", 70, 6);
    repo.append(&morning).unwrap();
    repo.append(&noon).unwrap();

    let onto_noon = record("alice", "2024-01-01 12:00:00", 66, 7);
    let err = repo.update(&morning.key(), &onto_noon).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey(_)));

    let moved = record("alice", "2024-01-01 09:30:00", 66, 7);
    repo.update(&morning.key(), &moved).unwrap();
    assert_eq!(repo.load_all().unwrap(), vec![moved, noon]);
}

#[test]
fn update_unknown_key_is_not_found() {
    let (_dir, _path, repo) = open_store();
    repo.ensure_initialized().unwrap();
    let missing = record("alice", "2024-01-01 08:00:00", 65, 7);

    let err = repo.update(&missing.key(), &missing).unwrap_err();

    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn update_at_and_delete_at_use_load_order() {
    let (_dir, _path, repo) = open_store();
    repo.append(&record("alice", "2024-01-01 08:00:00", 65, 7)).unwrap();
    repo.append(&record("bob", "2024-01-01 09:00:00", 72, 6)).unwrap();

    let edited = record("bob", "2024-01-01 09:00:00", 80, 4);
    repo.update_at(1, &edited).unwrap();
    assert_eq!(repo.load_all().unwrap()[1], edited);

    let removed = repo.delete_at(0).unwrap();
    assert_eq!(removed.person_id, "alice");
    assert_eq!(repo.load_all().unwrap(), vec![edited]);

    let err = repo.delete_at(5).unwrap_err();
    assert!(matches!(
        err,
        StoreError::RowIndexOutOfRange { index: 5, len: 1 }
    ));
}

#[test]
fn delete_by_person_removes_only_that_person() {
    let (_dir, _path, repo) = open_store();
    repo.append(&record("alice", "2024-01-01 08:00:00", 65, 7)).unwrap();
    repo.append(&record("bob", "2024-01-01 09:00:00", 72, 6)).unwrap();
    repo.append(&record("alice", "2024-01-02 08:00:00", 66, 8)).unwrap();

    assert_eq!(repo.delete_by_person("alice").unwrap(), 2);

    let records = repo.load_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].person_id, "bob");
}

#[test]
fn delete_by_person_without_matches_leaves_store_unchanged() {
    let (_dir, path, repo) = open_store();
    repo.append(&record("alice", "2024-01-01 08:00:00", 65, 7)).unwrap();
    let before = fs::read(&path).unwrap();

    assert_eq!(repo.delete_by_person("bob").unwrap(), 0);

    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn delete_all_leaves_header_only_file() {
    let (_dir, path, repo) = open_store();
    repo.append(&record("alice", "2024-01-01 08:00:00", 65, 7)).unwrap();
    repo.append(&record("bob", "2024-01-01 09:00:00", 72, 6)).unwrap();

    repo.delete_all().unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), format!("{HEADER}\n"));
    assert!(repo.load_all().unwrap().is_empty());
}

#[test]
fn query_combines_filters() {
    let (_dir, _path, repo) = open_store();
    repo.append(&record("alice", "2024-01-01 08:00:00", 65, 7).with_notes("Fasting")).unwrap();
    repo.append(&record("alice", "2024-01-02 22:00:00", 90, 3)).unwrap();
    repo.append(&record("bob", "2024-01-01 09:00:00", 72, 6)).unwrap();
    repo.append(&record("alice", "2024-01-05 08:00:00", 64, 8)).unwrap();

    let everyone = MeasurementQuery {
        person: PersonFilter::from_selection("All"),
        ..MeasurementQuery::all()
    };
    assert_eq!(repo.query(&everyone).unwrap().len(), 4);

    let alice_early = MeasurementQuery::for_person("alice").between_dates(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
    );
    assert_eq!(repo.query(&alice_early).unwrap().len(), 2);

    let calm = MeasurementQuery {
        heart_rate: Some(MetricRange::new(60, 70)),
        ..alice_early.clone()
    };
    let calm_records = repo.query(&calm).unwrap();
    assert_eq!(calm_records.len(), 1);
    assert_eq!(calm_records[0].heart_rate, 65);

    let notes = MeasurementQuery {
        notes_contains: Some("fast".to_string()),
        ..MeasurementQuery::all()
    };
    assert_eq!(repo.query(&notes).unwrap().len(), 1);

    let search = MeasurementQuery {
        search: Some("BO".to_string()),
        ..MeasurementQuery::all()
    };
    let found = repo.query(&search).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].person_id, "bob");

    let search_notes = MeasurementQuery {
        search: Some("fast".to_string()),
        ..MeasurementQuery::all()
    };
    assert_eq!(repo.query(&search_notes).unwrap()[0].notes.as_deref(), Some("Fasting"));

    assert!(repo
        .query(&MeasurementQuery::for_person("ALICE"))
        .unwrap()
        .is_empty());
}

#[test]
fn person_ids_are_distinct_in_first_seen_order() {
    let (_dir, _path, repo) = open_store();
    repo.append(&record("bob", "2024-01-01 09:00:00", 72, 6)).unwrap();
    repo.append(&record("alice", "2024-01-01 08:00:00", 65, 7)).unwrap();
    repo.append(&record("bob", "2024-01-02 09:00:00", 70, 6)).unwrap();

    assert_eq!(repo.person_ids().unwrap(), vec!["bob", "alice"]);
}

#[test]
fn no_staging_file_is_left_behind() {
    let (dir, _path, repo) = open_store();
    repo.append(&record("alice", "2024-01-01 08:00:00", 65, 7)).unwrap();
    repo.delete_by_person("alice").unwrap();

    let names = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["circadian_data.csv"]);
}
