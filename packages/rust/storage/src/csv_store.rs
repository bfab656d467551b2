//! CSV-backed [`RecordStore`] over the connections export format.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use contactfill_shared::{Batch, ContactFillError, Record, Result};

use crate::RecordStore;

/// Column headers, in the order they are written.
pub const COLUMNS: [&str; 7] = [
    "First Name",
    "Last Name",
    "Email Address",
    "Company",
    "Position",
    "Connected On",
    "Fetch Retries",
];

/// One CSV row. Every column may be missing on read. Values are kept verbatim.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CsvRow {
    #[serde(rename = "First Name", default)]
    first_name: String,
    #[serde(rename = "Last Name", default)]
    last_name: String,
    #[serde(rename = "Email Address", default)]
    email: Option<String>,
    #[serde(rename = "Company", default)]
    company: String,
    #[serde(rename = "Position", default)]
    position: String,
    #[serde(rename = "Connected On", default)]
    connected_on: String,
    #[serde(rename = "Fetch Retries", default)]
    retries: String,
}

impl CsvRow {
    /// Convert to a record. A blank retry count reads as 0; `line` is for the error.
    fn into_record(self, line: usize) -> std::result::Result<Record, String> {
        let retries = match self.retries.trim() {
            "" => 0,
            n => n
                .parse()
                .map_err(|_| format!("line {line}: invalid Fetch Retries '{}'", self.retries))?,
        };
        Ok(Record {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email.filter(|e| !e.trim().is_empty()),
            company: self.company,
            position: self.position,
            connected_on: self.connected_on,
            retries,
        })
    }
}

impl From<&Record> for CsvRow {
    fn from(record: &Record) -> Self {
        Self {
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            email: record.email.clone(),
            company: record.company.clone(),
            position: record.position.clone(),
            connected_on: record.connected_on.clone(),
            retries: record.retries.to_string(),
        }
    }
}

/// Record store backed by a single CSV file with a header row.
#[derive(Debug, Clone)]
pub struct CsvRecordStore {
    path: PathBuf,
}

impl CsvRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file the batch is staged in before it replaces the store.
    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl RecordStore for CsvRecordStore {
    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn load(&self) -> Result<Batch> {
        let file = File::open(&self.path).map_err(|e| ContactFillError::io(&self.path, e))?;
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .flexible(true)
            .from_reader(file);

        let headers = reader
            .headers()
            .map_err(|e| ContactFillError::store(format!("{}: {e}", self.path.display())))?;
        if headers.iter().all(|h| h.is_empty()) {
            return Err(ContactFillError::store(format!(
                "{}: missing header row",
                self.path.display()
            )));
        }

        let mut records = Vec::new();
        for (index, row) in reader.deserialize::<CsvRow>().enumerate() {
            let row =
                row.map_err(|e| ContactFillError::store(format!("{}: {e}", self.path.display())))?;
            // Header is line 1.
            let record = row
                .into_record(index + 2)
                .map_err(|e| ContactFillError::store(format!("{}: {e}", self.path.display())))?;
            records.push(record);
        }

        debug!(records = records.len(), "loaded batch");
        Ok(Batch::new(records))
    }

    fn save(&self, batch: &Batch) -> Result<()> {
        let staging = self.staging_path();
        let file = File::create(&staging).map_err(|e| ContactFillError::io(&staging, e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        let write_err =
            |e: csv::Error| ContactFillError::store(format!("{}: {e}", staging.display()));

        writer.write_record(COLUMNS).map_err(write_err)?;
        for record in batch.records() {
            writer.serialize(CsvRow::from(record)).map_err(write_err)?;
        }

        let file = writer
            .into_inner()
            .map_err(|e| ContactFillError::store(format!("{}: {e}", staging.display())))?;
        file.sync_all()
            .map_err(|e| ContactFillError::io(&staging, e))?;
        drop(file);

        std::fs::rename(&staging, &self.path).map_err(|e| ContactFillError::io(&self.path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    /// Create a store under a fresh temp directory, optionally seeded with `content`.
    fn test_store(content: Option<&str>) -> (CsvRecordStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("cf-store-test-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        let path = dir.join("Connections.csv");
        if let Some(content) = content {
            std::fs::write(&path, content).expect("seed csv");
        }
        (CsvRecordStore::new(&path), dir)
    }

    #[test]
    fn loads_export_without_enrichment_columns() {
        let (store, dir) = test_store(Some(
            "First Name,Last Name,Company,Position,Connected On\n\
             Ada,Lovelace,Analytical Engines,Programmer,10 Dec 1842\n\
             Alan,Turing,Bletchley Park,Cryptanalyst,23 Jun 1912\n",
        ));

        let batch = store.load().expect("load");
        assert_eq!(batch.len(), 2);
        let ada = &batch.records()[0];
        assert_eq!(ada.display_name(), "Ada Lovelace");
        assert_eq!(ada.company, "Analytical Engines");
        assert_eq!(ada.email, None);
        assert_eq!(ada.retries, 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn blank_email_and_retries_read_as_unresolved() {
        let (store, dir) = test_store(Some(
            "First Name,Last Name,Email Address,Company,Position,Connected On,Fetch Retries\n\
             Ada,Lovelace,,Analytical Engines,Programmer,10 Dec 1842,\n\
             Alan,Turing,alan@example.com,Bletchley Park,Cryptanalyst,23 Jun 1912,2\n",
        ));

        let batch = store.load().expect("load");
        assert!(!batch.records()[0].is_resolved());
        assert_eq!(batch.records()[0].retries, 0);
        assert_eq!(batch.records()[1].email.as_deref(), Some("alan@example.com"));
        assert_eq!(batch.records()[1].retries, 2);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn save_rewrites_whole_batch_in_fixed_column_order() {
        let (store, dir) = test_store(Some(
            "Company,Last Name,First Name\nBletchley Park,Turing,Alan\n",
        ));

        let mut batch = store.load().expect("load");
        if let Some(record) = batch.get_mut(contactfill_shared::RecordId(0)) {
            record.email = Some("alan@example.com".into());
            record.retries = 1;
        }
        store.save(&batch).expect("save");

        let written = std::fs::read_to_string(store.path()).expect("read back");
        let mut lines = written.lines();
        assert_eq!(lines.next(), Some(COLUMNS.join(",").as_str()));
        assert_eq!(
            lines.next(),
            Some("Alan,Turing,alan@example.com,Bletchley Park,,,1")
        );
        assert_eq!(lines.next(), None);
        assert!(!store.staging_path().exists());

        assert_eq!(store.load().expect("reload"), batch);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn records_without_names_are_kept() {
        let (store, dir) = test_store(Some(
            "First Name,Last Name\n,\nGrace,Hopper\n",
        ));

        let batch = store.load().expect("load");
        assert_eq!(batch.len(), 2);
        assert!(!batch.records()[0].is_queryable());

        store.save(&batch).expect("save");
        assert_eq!(store.load().expect("reload").len(), 2);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_batch_still_writes_header() {
        let (store, dir) = test_store(None);
        store.save(&Batch::default()).expect("save");
        let written = std::fs::read_to_string(store.path()).expect("read back");
        assert_eq!(written.trim_end(), COLUMNS.join(","));
        assert!(store.load().expect("reload").is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let (store, dir) = test_store(None);
        let err = store.load().unwrap_err();
        assert!(matches!(err, ContactFillError::Io { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn malformed_retry_count_is_a_store_error() {
        let (store, dir) = test_store(Some(
            "First Name,Last Name,Fetch Retries\nAda,Lovelace,lots\n",
        ));
        let err = store.load().unwrap_err();
        assert!(matches!(err, ContactFillError::Store { .. }));
        assert!(err.to_string().contains("line 2"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn padded_fields_survive_a_checkpoint() {
        let (store, dir) = test_store(Some(
            " First Name ,Last Name,Email Address,Company,Position,Connected On,Fetch Retries\n\
             Ada,Lovelace,,\"  Engines  \",\" Lead \",10 Dec, 3 \n",
        ));

        let batch = store.load().expect("load");
        let ada = &batch.records()[0];
        assert_eq!(ada.first_name, "Ada");
        assert_eq!(ada.company, "  Engines  ");
        assert_eq!(ada.position, " Lead ");
        assert_eq!(ada.retries, 3);

        store.save(&batch).expect("save");
        let written = std::fs::read_to_string(store.path()).expect("read back");
        assert!(written.contains("  Engines  "));
        assert!(written.contains(" Lead "));
        assert_eq!(store.load().expect("reload"), batch);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
