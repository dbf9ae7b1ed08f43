//! Newest-first observation log backed by a single CSV file

use crate::{decode_lossy, Columns, LogResult, LogRow, SchemaVersion, CURRENT_HEADER};
use csv::{ReaderBuilder, WriterBuilder};
use notch_core::ObservationRecord;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

/// Observation log store
///
/// Single writer: the daemon routes every append through one consumer.
#[derive(Debug, Clone)]
pub struct LogStore {
    path: PathBuf,
}

impl LogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling path the pre-migration copy is written to (`<log>.bak`)
    pub fn backup_path(&self) -> PathBuf {
        let mut backup = self.path.clone().into_os_string();
        backup.push(".bak");
        PathBuf::from(backup)
    }

    /// Schema of the file on disk, or `None` if it is missing or empty
    pub fn schema(&self) -> LogResult<Option<SchemaVersion>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut raw = Vec::new();
        BufReader::new(file).read_until(b'\n', &mut raw)?;
        let first_line = String::from_utf8_lossy(&raw);
        if first_line.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(SchemaVersion::detect(&first_line)))
    }

    /// Write a header-only log if none exists yet
    ///
    /// Returns true when a file was created.
    pub fn create_if_missing(&self) -> LogResult<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        self.replace_contents(&[])?;
        info!(path = %self.path.display(), "Created empty observation log");
        Ok(true)
    }

    /// Insert `record` as the first data row, migrating a legacy file first
    #[instrument(skip(self, record), fields(path = %self.path.display()))]
    pub fn append(&self, record: &ObservationRecord) -> LogResult<()> {
        if self.schema()? == Some(SchemaVersion::Legacy) {
            info!("Legacy log layout detected before append");
            self.migrate()?;
        }

        let existing = self.read_rows()?;
        let mut rows = Vec::with_capacity(existing.len() + 1);
        rows.push(LogRow::from_observation(record));
        rows.extend(existing);

        self.replace_contents(&rows)?;
        debug!(rows = rows.len(), "Observation appended");
        Ok(())
    }

    /// Most recent observation, or `None` if the log is missing or has no rows
    pub fn load_latest(&self) -> LogResult<Option<ObservationRecord>> {
        Ok(self
            .read_rows()?
            .into_iter()
            .next()
            .map(|row| row.to_observation()))
    }

    /// Every stored observation, newest first
    pub fn load_all(&self) -> LogResult<Vec<ObservationRecord>> {
        Ok(self
            .read_rows()?
            .iter()
            .map(LogRow::to_observation)
            .collect())
    }

    /// Read all rows under whatever layout the file has
    pub(crate) fn read_rows(&self) -> LogResult<Vec<LogRow>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = ReaderBuilder::new().flexible(true).from_reader(file);
        let columns = Columns::new(&decode_lossy(reader.byte_headers()?));

        let mut rows = Vec::new();
        for raw in reader.byte_records() {
            let raw = raw?;
            if std::str::from_utf8(raw.as_slice()).is_err() {
                warn!(line = raw.position().map(|p| p.line()), "Replacing invalid UTF-8 in log row");
            }
            let record = decode_lossy(&raw);
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            rows.push(LogRow::from_record(&columns, &record));
        }
        Ok(rows)
    }

    /// Atomically swap the log for one containing `rows` under the current header
    fn replace_contents(&self, rows: &[LogRow]) -> LogResult<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut staged = NamedTempFile::new_in(dir)?;
        write_rows(staged.as_file_mut(), rows)?;
        staged.as_file().sync_all()?;
        staged.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Serialize `rows` under the current header
pub(crate) fn write_rows<W: Write>(writer: W, rows: &[LogRow]) -> LogResult<()> {
    let mut csv = WriterBuilder::new().has_headers(false).from_writer(writer);
    csv.write_record(CURRENT_HEADER)?;
    for row in rows {
        csv.write_record(row.fields())?;
    }
    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(time: &str, temperature: f64) -> ObservationRecord {
        ObservationRecord {
            date: "2024-01-01".into(),
            time: time.into(),
            city: "London".into(),
            description: "overcast clouds".into(),
            temperature: Some(temperature),
            feels_like: Some(temperature - 2.0),
            humidity: Some(70),
            pressure: Some(1009),
            wind_speed: Some(3.6),
            wind_direction: Some(250),
            visibility: Some(10000),
            longitude: Some(-0.1257),
            latitude: Some(51.5085),
        }
    }

    #[test]
    fn test_missing_and_empty_logs_have_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::new(dir.path().join("weather.csv"));

        assert_eq!(store.schema().unwrap(), None);
        assert!(store.load_latest().unwrap().is_none());

        fs::write(store.path(), "").unwrap();
        assert_eq!(store.schema().unwrap(), None);
        assert!(store.load_latest().unwrap().is_none());
    }

    #[test]
    fn test_append_keeps_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::new(dir.path().join("weather.csv"));

        store.append(&record("12:00:00", 5.2)).unwrap();
        store.append(&record("12:02:00", 5.4)).unwrap();
        store.append(&record("12:04:00", 5.1)).unwrap();

        let all = store.load_all().unwrap();
        let times: Vec<_> = all.iter().map(|r| r.time.as_str()).collect();
        assert_eq!(times, ["12:04:00", "12:02:00", "12:00:00"]);
        assert_eq!(store.load_latest().unwrap(), Some(record("12:04:00", 5.1)));
    }

    #[test]
    fn test_append_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::new(dir.path().join("nested/logs/weather.csv"));

        store.append(&record("09:30:00", 1.0)).unwrap();
        assert_eq!(store.load_all().unwrap().len(), 1);
    }

    #[test]
    fn test_create_if_missing_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::new(dir.path().join("weather.csv"));

        assert!(store.create_if_missing().unwrap());
        assert!(!store.create_if_missing().unwrap());

        let content = fs::read_to_string(store.path()).unwrap();
        insta::assert_snapshot!(
            content.trim_end(),
            @"date,time,city,description,temperature,feels_like,humidity,pressure,wind_speed,wind_deg,visibility,longitude,latitude"
        );
        assert!(store.load_latest().unwrap().is_none());
    }

    #[test]
    fn test_backup_path_appends_suffix() {
        let store = LogStore::new("data/weather.csv");
        assert_eq!(store.backup_path(), PathBuf::from("data/weather.csv.bak"));
    }

    #[test]
    fn test_non_numeric_fields_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::new(dir.path().join("weather.csv"));
        fs::write(
            store.path(),
            "date,time,city,description,temperature,feels_like,humidity,pressure,wind_speed,wind_deg,visibility,longitude,latitude\n\
             2024-02-02,07:15:00,Oslo,snow,--,,85,1001,2.2\n",
        )
        .unwrap();

        let latest = store.load_latest().unwrap().unwrap();
        assert_eq!(latest.city, "Oslo");
        assert_eq!(latest.temperature, None);
        assert_eq!(latest.feels_like, None);
        assert_eq!(latest.humidity, Some(85));
        assert_eq!(latest.wind_speed, Some(2.2));
        assert_eq!(latest.visibility, None);
    }
}
