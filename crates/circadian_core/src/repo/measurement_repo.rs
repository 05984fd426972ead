//! Measurement store contract and CSV file implementation.
//!
//! # Responsibility
//! - Provide load/append/update/delete/query/export/import over one CSV file.
//! - Enforce `(person_id, timestamp)` uniqueness on every write path.
//!
//! # Invariants
//! - Every operation holds the store lock for its whole read-modify-write
//!   cycle.
//! - Writes go to a sibling staging file that is synced and renamed over the
//!   data file, so a write either fully lands or fails.
//! - Malformed rows are hidden from reads but kept by rewrites, moved into
//!   canonical column order without ever becoming decodable; only
//!   `delete_all` discards them.
//! - A row the CSV reader cannot read at all fails the operation instead of
//!   being dropped by the next rewrite.

use crate::model::record::{MeasurementRecord, RecordKey};
use crate::repo::csv_codec::{
    decode_row, encode_record, header_line, reader_builder, records_to_csv, write_rows,
    ColumnMap,
};
use crate::repo::import::{ImportRejection, ImportReport};
use crate::repo::query::MeasurementQuery;
use crate::repo::{StoreError, StoreResult};
use crate::validation::{validate_with_policy, TimestampInput, ValidationPolicy};
use chrono::{Local, NaiveDateTime};
use csv::ByteRecord;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Repository interface for measurement persistence.
///
/// Record positions (`index`) refer to `load_all()` order.
pub trait MeasurementRepository {
    /// Creates the data file with a header row when it does not exist.
    fn ensure_initialized(&self) -> StoreResult<()>;
    /// Returns every parseable record in file order.
    fn load_all(&self) -> StoreResult<Vec<MeasurementRecord>>;
    fn append(&self, record: &MeasurementRecord) -> StoreResult<()>;
    /// Replaces the record identified by `key`.
    fn update(&self, key: &RecordKey, record: &MeasurementRecord) -> StoreResult<()>;
    /// Replaces the record at `index`.
    fn update_at(&self, index: usize, record: &MeasurementRecord) -> StoreResult<()>;
    /// Removes and returns the record at `index`.
    fn delete_at(&self, index: usize) -> StoreResult<MeasurementRecord>;
    /// Removes all records of one person and returns how many were removed.
    fn delete_by_person(&self, person_id: &str) -> StoreResult<usize>;
    /// Leaves a header-only file.
    fn delete_all(&self) -> StoreResult<()>;
    fn query(&self, query: &MeasurementQuery) -> StoreResult<Vec<MeasurementRecord>>;
    /// Filtered records as canonical CSV text, header included.
    fn export(&self, query: &MeasurementQuery) -> StoreResult<String>;
    /// Imports CSV text row by row; bad rows are reported, not fatal.
    fn import_records(&self, raw_csv: &str) -> StoreResult<ImportReport>;
    /// Distinct person ids in first-seen order.
    fn person_ids(&self) -> StoreResult<Vec<String>>;
}

/// One physical data row.
#[derive(Debug, Clone)]
enum StoredRow {
    Record(MeasurementRecord),
    Malformed(ByteRecord),
}

/// Parsed file contents for one read-modify-write cycle.
#[derive(Debug)]
struct Snapshot {
    columns: ColumnMap,
    rows: Vec<StoredRow>,
}

impl Snapshot {
    fn empty() -> Self {
        Self {
            columns: ColumnMap::canonical(),
            rows: Vec::new(),
        }
    }

    fn records(&self) -> impl Iterator<Item = &MeasurementRecord> {
        self.rows.iter().filter_map(|row| match row {
            StoredRow::Record(record) => Some(record),
            StoredRow::Malformed(_) => None,
        })
    }

    fn into_records(self) -> Vec<MeasurementRecord> {
        self.rows
            .into_iter()
            .filter_map(|row| match row {
                StoredRow::Record(record) => Some(record),
                StoredRow::Malformed(_) => None,
            })
            .collect()
    }

    fn record_count(&self) -> usize {
        self.records().count()
    }

    fn malformed_count(&self) -> usize {
        self.rows.len() - self.record_count()
    }

    /// Row position of the first record with `key`, skipping `except`.
    fn find_key(&self, key: &RecordKey, except: Option<usize>) -> Option<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(position, _)| Some(*position) != except)
            .find_map(|(position, row)| match row {
                StoredRow::Record(record) if record.has_key(key) => Some(position),
                _ => None,
            })
    }

    /// Row position of the `index`-th record.
    fn nth_record(&self, index: usize) -> StoreResult<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| matches!(row, StoredRow::Record(_)))
            .nth(index)
            .map(|(position, _)| position)
            .ok_or_else(|| StoreError::RowIndexOutOfRange {
                index,
                len: self.record_count(),
            })
    }

    fn encoded_rows(&self) -> Vec<ByteRecord> {
        self.rows
            .iter()
            .map(|row| match row {
                StoredRow::Record(record) => encode_record(record),
                StoredRow::Malformed(raw) => self.columns.realign(raw),
            })
            .collect()
    }
}

/// CSV-file-backed measurement repository.
///
/// Safe to share across threads; operations serialize on an internal lock.
/// There is no cross-process locking.
#[derive(Debug)]
pub struct CsvMeasurementRepository {
    path: PathBuf,
    policy: ValidationPolicy,
    lock: Mutex<()>,
}

impl CsvMeasurementRepository {
    /// Creates a repository over `path` with the default validation policy.
    ///
    /// Does not touch the file system; call `ensure_initialized` to create it.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_policy(path, ValidationPolicy::default())
    }

    /// Creates a repository that validates writes and imports with `policy`.
    pub fn with_policy(path: impl Into<PathBuf>, policy: ValidationPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Default backup location for a backup taken at `at`:
    /// `<stem>_backup_YYYYMMDD_HHMMSS.csv` next to the data file.
    pub fn backup_path_at(&self, at: NaiveDateTime) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "circadian_data".to_string());
        let file_name = format!("{stem}_backup_{}.csv", at.format("%Y%m%d_%H%M%S"));
        self.path.with_file_name(file_name)
    }

    /// Writes every valid record to a backup CSV and returns its path.
    ///
    /// Uses [`Self::backup_path_at`] with the local time when `destination`
    /// is `None`.
    pub fn backup(&self, destination: Option<&Path>) -> StoreResult<PathBuf> {
        let started_at = Instant::now();
        let result = (|| -> StoreResult<PathBuf> {
            let _guard = self.guard();
            let snapshot = self.read_snapshot()?;
            let target = match destination {
                Some(path) => path.to_path_buf(),
                None => self.backup_path_at(Local::now().naive_local()),
            };
            let contents = records_to_csv(snapshot.records())?;
            write_synced(&target, contents.as_bytes())?;
            Ok(target)
        })();
        log_outcome("store_backup", started_at, result)
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The lock guards no data, so a poisoned lock is still usable.
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_record(&self, record: &MeasurementRecord) -> StoreResult<()> {
        validate_with_policy(record, &self.policy).into_result()?;
        Ok(())
    }

    fn read_snapshot(&self) -> StoreResult<Snapshot> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Snapshot::empty()),
            Err(err) => return Err(StoreError::io("read", &self.path, err)),
        };

        let mut reader = reader_builder().from_reader(bytes.as_slice());
        let header = reader.byte_headers()?.clone();
        if header.is_empty() {
            return Ok(Snapshot::empty());
        }
        let columns = ColumnMap::from_header(&header).map_err(|missing| StoreError::Schema {
            path: self.path.clone(),
            missing,
        })?;

        // Stored rows are checked for ranges only; the time window applies to
        // new input, not to history.
        let load_policy = ValidationPolicy::default();
        let mut rows = Vec::new();
        for (offset, row) in reader.byte_records().enumerate() {
            let row = row.map_err(|err| {
                warn!(
                    "event=row_unreadable module=store status=error row={} error={}",
                    offset + 1,
                    err
                );
                StoreError::Csv(err)
            })?;
            match decode_row(&row, &columns, &load_policy, TimestampInput::CanonicalOnly) {
                Ok(record) => rows.push(StoredRow::Record(record)),
                Err(reason) => {
                    debug!(
                        "event=row_skipped module=store row={} reason={}",
                        offset + 1,
                        reason.code()
                    );
                    rows.push(StoredRow::Malformed(row));
                }
            }
        }

        Ok(Snapshot { columns, rows })
    }

    fn write_snapshot(&self, snapshot: &Snapshot) -> StoreResult<()> {
        if !snapshot.columns.is_canonical() {
            info!(
                "event=schema_normalized module=store status=ok path={}",
                self.path.display()
            );
        }
        let rows = snapshot.encoded_rows();
        let contents = write_rows(Vec::new(), rows.iter())?;
        self.replace_file(&contents)
    }

    fn replace_file(&self, contents: &[u8]) -> StoreResult<()> {
        if let Some(parent) = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            fs::create_dir_all(parent)
                .map_err(|err| StoreError::io("create directory", parent, err))?;
        }

        let staging = self.path.with_extension("csv.tmp");
        let result = write_synced(&staging, contents).and_then(|()| {
            fs::rename(&staging, &self.path)
                .map_err(|err| StoreError::io("replace", &self.path, err))
        });
        if result.is_err() {
            let _ = fs::remove_file(&staging);
        }
        result
    }

    /// Swaps the record at row `position` for `record`, keeping keys unique.
    fn replace_row(
        &self,
        snapshot: &mut Snapshot,
        position: usize,
        record: &MeasurementRecord,
    ) -> StoreResult<()> {
        let new_key = record.key();
        if snapshot.find_key(&new_key, Some(position)).is_some() {
            return Err(StoreError::DuplicateKey(new_key));
        }
        snapshot.rows[position] = StoredRow::Record(record.clone());
        self.write_snapshot(snapshot)
    }
}

impl MeasurementRepository for CsvMeasurementRepository {
    fn ensure_initialized(&self) -> StoreResult<()> {
        let _guard = self.guard();
        let exists = self
            .path
            .try_exists()
            .map_err(|err| StoreError::io("inspect", &self.path, err))?;
        if exists {
            debug!(
                "event=store_init module=store status=ok created=false path={}",
                self.path.display()
            );
            return Ok(());
        }

        let started_at = Instant::now();
        let result = self.replace_file(header_line().as_bytes());
        if result.is_ok() {
            info!(
                "event=store_init module=store status=ok created=true path={}",
                self.path.display()
            );
        }
        log_outcome("store_init", started_at, result)
    }

    fn load_all(&self) -> StoreResult<Vec<MeasurementRecord>> {
        let _guard = self.guard();
        let snapshot = self.read_snapshot()?;
        if snapshot.malformed_count() > 0 {
            warn!(
                "event=store_load module=store status=partial records={} skipped={}",
                snapshot.record_count(),
                snapshot.malformed_count()
            );
        }
        Ok(snapshot.into_records())
    }

    fn append(&self, record: &MeasurementRecord) -> StoreResult<()> {
        let started_at = Instant::now();
        let result = (|| -> StoreResult<()> {
            self.check_record(record)?;
            let _guard = self.guard();
            let mut snapshot = self.read_snapshot()?;
            let key = record.key();
            if snapshot.find_key(&key, None).is_some() {
                return Err(StoreError::DuplicateKey(key));
            }
            snapshot.rows.push(StoredRow::Record(record.clone()));
            self.write_snapshot(&snapshot)
        })();
        log_outcome("record_append", started_at, result)
    }

    fn update(&self, key: &RecordKey, record: &MeasurementRecord) -> StoreResult<()> {
        let started_at = Instant::now();
        let result = (|| -> StoreResult<()> {
            self.check_record(record)?;
            let _guard = self.guard();
            let mut snapshot = self.read_snapshot()?;
            let position = snapshot
                .find_key(key, None)
                .ok_or_else(|| StoreError::NotFound(key.clone()))?;
            self.replace_row(&mut snapshot, position, record)
        })();
        log_outcome("record_update", started_at, result)
    }

    fn update_at(&self, index: usize, record: &MeasurementRecord) -> StoreResult<()> {
        let started_at = Instant::now();
        let result = (|| -> StoreResult<()> {
            self.check_record(record)?;
            let _guard = self.guard();
            let mut snapshot = self.read_snapshot()?;
            let position = snapshot.nth_record(index)?;
            self.replace_row(&mut snapshot, position, record)
        })();
        log_outcome("record_update", started_at, result)
    }

    fn delete_at(&self, index: usize) -> StoreResult<MeasurementRecord> {
        let started_at = Instant::now();
        let result = (|| -> StoreResult<MeasurementRecord> {
            let _guard = self.guard();
            let mut snapshot = self.read_snapshot()?;
            let position = snapshot.nth_record(index)?;
            let StoredRow::Record(removed) = snapshot.rows.remove(position) else {
                return Err(StoreError::RowIndexOutOfRange {
                    index,
                    len: snapshot.record_count(),
                });
            };
            self.write_snapshot(&snapshot)?;
            Ok(removed)
        })();
        log_outcome("record_delete", started_at, result)
    }

    fn delete_by_person(&self, person_id: &str) -> StoreResult<usize> {
        let started_at = Instant::now();
        let result = (|| -> StoreResult<usize> {
            let _guard = self.guard();
            let mut snapshot = self.read_snapshot()?;
            let before = snapshot.rows.len();
            snapshot.rows.retain(|row| match row {
                StoredRow::Record(record) => record.person_id != person_id,
                StoredRow::Malformed(_) => true,
            });
            let removed = before - snapshot.rows.len();
            if removed > 0 {
                self.write_snapshot(&snapshot)?;
            }
            info!("event=person_delete module=store status=ok removed={removed}");
            Ok(removed)
        })();
        log_outcome("person_delete", started_at, result)
    }

    fn delete_all(&self) -> StoreResult<()> {
        let started_at = Instant::now();
        let result = {
            let _guard = self.guard();
            self.replace_file(header_line().as_bytes())
        };
        log_outcome("store_clear", started_at, result)
    }

    fn query(&self, query: &MeasurementQuery) -> StoreResult<Vec<MeasurementRecord>> {
        let records = self.load_all()?;
        Ok(records
            .into_iter()
            .filter(|record| query.matches(record))
            .collect())
    }

    fn export(&self, query: &MeasurementQuery) -> StoreResult<String> {
        let records = self.query(query)?;
        debug!(
            "event=store_export module=store status=ok records={}",
            records.len()
        );
        records_to_csv(&records)
    }

    fn import_records(&self, raw_csv: &str) -> StoreResult<ImportReport> {
        let started_at = Instant::now();
        let result = (|| -> StoreResult<ImportReport> {
            let mut reader = reader_builder().from_reader(raw_csv.as_bytes());
            let header = reader.byte_headers()?.clone();
            if header.is_empty() {
                return Err(StoreError::InvalidImport(
                    "payload has no header row".to_string(),
                ));
            }
            let columns = ColumnMap::from_header(&header).map_err(|missing| {
                StoreError::InvalidImport(format!(
                    "missing required columns: {}",
                    missing.join(", ")
                ))
            })?;

            let mut report = ImportReport::default();
            let mut candidates = Vec::new();
            for (offset, row) in reader.byte_records().enumerate() {
                let row_number = offset + 1;
                let decoded = row.map_err(|err| err.to_string()).and_then(|row| {
                    decode_row(&row, &columns, &self.policy, TimestampInput::AllowShort)
                        .map_err(|reason| reason.to_string())
                });
                match decoded {
                    Ok(record) => candidates.push((row_number, record)),
                    Err(reason) => report.reject(row_number, ImportRejection::Invalid, reason),
                }
            }

            let _guard = self.guard();
            let mut snapshot = self.read_snapshot()?;
            let mut seen = snapshot
                .records()
                .map(MeasurementRecord::key)
                .collect::<HashSet<_>>();
            let mut accepted = Vec::new();
            for (row_number, record) in candidates {
                let key = record.key();
                if seen.insert(key.clone()) {
                    accepted.push((row_number, record));
                } else {
                    report.reject(
                        row_number,
                        ImportRejection::Duplicate,
                        format!("a record for {key} already exists"),
                    );
                }
            }
            report.issues.sort_by_key(|issue| issue.row);

            if !accepted.is_empty() {
                report.imported = accepted.len();
                snapshot.rows.extend(
                    accepted
                        .into_iter()
                        .map(|(_, record)| StoredRow::Record(record)),
                );
                self.write_snapshot(&snapshot)?;
            }
            info!(
                "event=store_import module=store status=ok imported={} invalid={} duplicate={}",
                report.imported, report.skipped_invalid, report.skipped_duplicate
            );
            Ok(report)
        })();
        log_outcome("store_import", started_at, result)
    }

    fn person_ids(&self) -> StoreResult<Vec<String>> {
        let records = self.load_all()?;
        let mut seen = HashSet::new();
        Ok(records
            .into_iter()
            .filter(|record| seen.insert(record.person_id.clone()))
            .map(|record| record.person_id)
            .collect())
    }
}

fn write_synced(path: &Path, contents: &[u8]) -> StoreResult<()> {
    let mut file = File::create(path).map_err(|err| StoreError::io("create", path, err))?;
    file.write_all(contents)
        .map_err(|err| StoreError::io("write", path, err))?;
    file.sync_all()
        .map_err(|err| StoreError::io("sync", path, err))
}

/// Emits the completion event for one store operation and passes `result` on.
fn log_outcome<T>(event: &str, started_at: Instant, result: StoreResult<T>) -> StoreResult<T> {
    let duration_ms = started_at.elapsed().as_millis();
    match &result {
        Ok(_) => debug!("event={event} module=store status=ok duration_ms={duration_ms}"),
        Err(err) if err.is_recoverable() => warn!(
            "event={event} module=store status=rejected duration_ms={duration_ms} error_code={}",
            err.code()
        ),
        Err(err) => error!(
            "event={event} module=store status=error duration_ms={duration_ms} error_code={} error={err}",
            err.code()
        ),
    }
    result
}
