//! Column layouts of the observation log and row conversion

use csv::{ByteRecord, StringRecord};
use notch_core::ObservationRecord;

/// Header of logs written by the current layout
pub const CURRENT_HEADER: [&str; 13] = [
    "date",
    "time",
    "city",
    "description",
    "temperature",
    "feels_like",
    "humidity",
    "pressure",
    "wind_speed",
    "wind_deg",
    "visibility",
    "longitude",
    "latitude",
];

/// Header of logs written before date/time were split and coordinates added
pub const LEGACY_HEADER: [&str; 10] = [
    "timestamp",
    "city",
    "description",
    "temperature",
    "feels_like",
    "humidity",
    "pressure",
    "wind_speed",
    "wind_deg",
    "visibility",
];

/// Layout generation of a log file, decided from its header line alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVersion {
    Legacy,
    Current,
}

impl SchemaVersion {
    pub fn detect(header_line: &str) -> Self {
        let header = header_line.trim();
        if header.starts_with("timestamp,") && !header.contains("longitude") {
            SchemaVersion::Legacy
        } else {
            SchemaVersion::Current
        }
    }
}

/// Split a legacy `YYYY-MM-DD HH:MM:SS` timestamp on its first space
///
/// A timestamp without a space is kept whole as the date.
pub fn split_timestamp(timestamp: &str) -> (String, String) {
    match timestamp.trim().split_once(' ') {
        Some((date, time)) => (date.to_string(), time.trim().to_string()),
        None => (timestamp.trim().to_string(), String::new()),
    }
}

/// Decode a raw CSV record, replacing invalid UTF-8 with U+FFFD
///
/// Logs written under a non-UTF-8 locale codepage stay readable.
pub fn decode_lossy(record: &ByteRecord) -> StringRecord {
    record.iter().map(String::from_utf8_lossy).collect()
}

/// Column lookup by header name; absent columns and short rows read as ""
#[derive(Debug, Clone)]
pub struct Columns {
    names: Vec<String>,
}

impl Columns {
    pub fn new(headers: &StringRecord) -> Self {
        Self {
            names: headers.iter().map(|h| h.trim().to_string()).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn get<'r>(&self, record: &'r StringRecord, name: &str) -> &'r str {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|idx| record.get(idx))
            .unwrap_or("")
    }
}

/// One log row in textual form, laid out under the current header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogRow {
    pub date: String,
    pub time: String,
    pub city: String,
    pub description: String,
    pub temperature: String,
    pub feels_like: String,
    pub humidity: String,
    pub pressure: String,
    pub wind_speed: String,
    pub wind_deg: String,
    pub visibility: String,
    pub longitude: String,
    pub latitude: String,
}

impl LogRow {
    /// Read a row written under either layout
    ///
    /// Legacy rows get `date`/`time` from their combined `timestamp`
    /// column and empty coordinates.
    pub fn from_record(columns: &Columns, record: &StringRecord) -> Self {
        let field = |name: &str| columns.get(record, name).to_string();

        let mut date = field("date");
        let mut time = field("time");
        if date.is_empty() && time.is_empty() {
            let timestamp = columns.get(record, "timestamp");
            if !timestamp.trim().is_empty() {
                (date, time) = split_timestamp(timestamp);
            }
        }

        Self {
            date,
            time,
            city: field("city"),
            description: field("description"),
            temperature: field("temperature"),
            feels_like: field("feels_like"),
            humidity: field("humidity"),
            pressure: field("pressure"),
            wind_speed: field("wind_speed"),
            wind_deg: field("wind_deg"),
            visibility: field("visibility"),
            longitude: field("longitude"),
            latitude: field("latitude"),
        }
    }

    pub fn fields(&self) -> [&str; 13] {
        [
            &self.date,
            &self.time,
            &self.city,
            &self.description,
            &self.temperature,
            &self.feels_like,
            &self.humidity,
            &self.pressure,
            &self.wind_speed,
            &self.wind_deg,
            &self.visibility,
            &self.longitude,
            &self.latitude,
        ]
    }

    pub fn from_observation(record: &ObservationRecord) -> Self {
        Self {
            date: record.date.clone(),
            time: record.time.clone(),
            city: record.city.clone(),
            description: record.description.clone(),
            temperature: text(&record.temperature),
            feels_like: text(&record.feels_like),
            humidity: text(&record.humidity),
            pressure: text(&record.pressure),
            wind_speed: text(&record.wind_speed),
            wind_deg: text(&record.wind_direction),
            visibility: text(&record.visibility),
            longitude: text(&record.longitude),
            latitude: text(&record.latitude),
        }
    }

    /// Typed view of the row; unparseable readings become `None`
    pub fn to_observation(&self) -> ObservationRecord {
        ObservationRecord {
            date: self.date.clone(),
            time: self.time.clone(),
            city: self.city.clone(),
            description: self.description.clone(),
            temperature: decimal(&self.temperature),
            feels_like: decimal(&self.feels_like),
            humidity: integer(&self.humidity),
            pressure: integer(&self.pressure),
            wind_speed: decimal(&self.wind_speed),
            wind_direction: integer(&self.wind_deg),
            visibility: integer(&self.visibility),
            longitude: decimal(&self.longitude),
            latitude: decimal(&self.latitude),
        }
    }
}

fn text<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

fn decimal(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Integers may have been written as "81" or "81.0" depending on the writer
fn integer<T: TryFrom<i64>>(raw: &str) -> Option<T> {
    let raw = raw.trim();
    let value = raw
        .parse::<i64>()
        .ok()
        .or_else(|| decimal(raw).map(|v| v.round() as i64))?;
    T::try_from(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_schema() {
        assert_eq!(
            SchemaVersion::detect(&LEGACY_HEADER.join(",")),
            SchemaVersion::Legacy
        );
        assert_eq!(
            SchemaVersion::detect(&CURRENT_HEADER.join(",")),
            SchemaVersion::Current
        );
        // Already carries coordinates, so it is not treated as legacy
        assert_eq!(
            SchemaVersion::detect("timestamp,city,longitude,latitude\r\n"),
            SchemaVersion::Current
        );
    }

    #[test]
    fn test_split_timestamp() {
        assert_eq!(
            split_timestamp("2023-05-01 08:00:00"),
            ("2023-05-01".to_string(), "08:00:00".to_string())
        );
        assert_eq!(
            split_timestamp("2023-05-01"),
            ("2023-05-01".to_string(), String::new())
        );
    }

    #[test]
    fn test_short_row_reads_missing_fields_as_empty() {
        let headers = StringRecord::from(CURRENT_HEADER.to_vec());
        let record = StringRecord::from(vec!["2024-01-01", "12:00:00", "London"]);
        let row = LogRow::from_record(&Columns::new(&headers), &record);

        assert_eq!(row.city, "London");
        assert_eq!(row.temperature, "");
        assert_eq!(row.latitude, "");
    }

    #[test]
    fn test_legacy_row_derives_date_and_time() {
        let headers = StringRecord::from(LEGACY_HEADER.to_vec());
        let record = StringRecord::from(vec![
            "2023-05-01 08:00:00",
            "Paris",
            "clear sky",
            "14.3",
        ]);
        let row = LogRow::from_record(&Columns::new(&headers), &record);

        assert_eq!(row.date, "2023-05-01");
        assert_eq!(row.time, "08:00:00");
        assert_eq!(row.temperature, "14.3");
        assert_eq!(row.longitude, "");
    }

    #[test]
    fn test_unparseable_readings_become_none() {
        let row = LogRow {
            temperature: "n/a".into(),
            humidity: "81.0".into(),
            pressure: "".into(),
            ..Default::default()
        };
        let record = row.to_observation();

        assert_eq!(record.temperature, None);
        assert_eq!(record.humidity, Some(81));
        assert_eq!(record.pressure, None);
    }
}
