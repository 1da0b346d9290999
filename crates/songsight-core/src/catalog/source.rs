//! Catalog sources: JSON record files and SQLite `track` tables.

use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::feature::FeatureSet;
use crate::model::{FeatureVector, Track};

/// One loosely typed catalog row, as found in a JSON export.
///
/// Every key other than the id and display fields is treated as a candidate
/// feature value; booleans (the dataset's `mode` column) read as 0 or 1.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackRecord {
    pub track_id: String,

    #[serde(default)]
    pub track_name: Option<String>,

    #[serde(default)]
    pub artist_name: Option<String>,

    #[serde(flatten)]
    pub values: HashMap<String, serde_json::Value>,
}

impl TrackRecord {
    /// Convert into a [`Track`] with values in canonical feature order.
    pub fn into_track(self, features: &FeatureSet) -> Result<Track> {
        let values = features
            .names()
            .map(|name| match self.values.get(name) {
                Some(serde_json::Value::Number(n)) => n.as_f64().ok_or_else(|| {
                    Error::CatalogLoad(format!(
                        "track {} has an unrepresentable value for {}",
                        self.track_id, name
                    ))
                }),
                Some(serde_json::Value::Bool(b)) => Ok(if *b { 1.0 } else { 0.0 }),
                Some(serde_json::Value::Null) | None => Err(Error::CatalogLoad(format!(
                    "track {} is missing feature {}",
                    self.track_id, name
                ))),
                Some(other) => Err(Error::CatalogLoad(format!(
                    "track {} has a non-numeric value for {}: {}",
                    self.track_id, name, other
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Track {
            id: self.track_id.into(),
            name: self.track_name,
            artist: self.artist_name,
            features: FeatureVector::new(values),
        })
    }
}

/// Where a catalog is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    /// A JSON array of [`TrackRecord`]s.
    Json(PathBuf),
    /// A SQLite database with a `track` table holding one column per feature.
    Sqlite(PathBuf),
}

impl CatalogSource {
    /// Pick a source kind from the file extension (`.json`, otherwise SQLite).
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::Json(path)
        } else {
            Self::Sqlite(path)
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Json(path) | Self::Sqlite(path) => path,
        }
    }

    /// Read and validate the whole catalog.
    pub fn load(&self, features: FeatureSet) -> Result<Catalog> {
        let catalog = match self {
            Self::Json(path) => load_json(path, features)?,
            Self::Sqlite(path) => load_sqlite(path, features)?,
        };
        log::info!(
            "Loaded {} tracks with {} features from {}",
            catalog.len(),
            catalog.features().len(),
            self.path().display()
        );
        Ok(catalog)
    }
}

/// Load a catalog from a JSON file.
pub fn load_json(path: &Path, features: FeatureSet) -> Result<Catalog> {
    let content = std::fs::read_to_string(path)?;
    from_json_str(&content, features)
}

/// Parse a catalog from a JSON array of records.
pub fn from_json_str(content: &str, features: FeatureSet) -> Result<Catalog> {
    let records: Vec<TrackRecord> = serde_json::from_str(content)
        .map_err(|e| Error::CatalogLoad(format!("malformed catalog JSON: {}", e)))?;
    Catalog::from_records(features, records)
}

/// Load a catalog from the `track` table of a SQLite database, read-only.
pub fn load_sqlite(path: &Path, features: FeatureSet) -> Result<Catalog> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    from_connection(&conn, features)
}

/// Load a catalog from the `track` table of an open connection.
pub fn from_connection(conn: &Connection, features: FeatureSet) -> Result<Catalog> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('track')")?;
    let columns: HashSet<String> = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;

    if columns.is_empty() {
        return Err(Error::CatalogLoad("database has no track table".to_string()));
    }
    if !columns.contains("track_id") {
        return Err(Error::CatalogLoad(
            "track table has no track_id column".to_string(),
        ));
    }
    if let Some(missing) = features.names().find(|name| !columns.contains(*name)) {
        return Err(Error::CatalogLoad(format!(
            "track table has no column for feature {}",
            missing
        )));
    }

    let optional = |column: &str| {
        if columns.contains(column) {
            quote_ident(column)
        } else {
            "NULL".to_string()
        }
    };
    let feature_columns: Vec<String> = features.names().map(quote_ident).collect();
    let sql = format!(
        "SELECT track_id, {}, {}, {} FROM track",
        optional("track_name"),
        optional("artist_name"),
        feature_columns.join(", ")
    );

    let width = 3 + features.len();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            (0..width)
                .map(|i| row.get::<_, Value>(i))
                .collect::<rusqlite::Result<Vec<_>>>()
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let tracks = rows
        .into_iter()
        .enumerate()
        .map(|(n, cells)| row_to_track(n, cells, &features))
        .collect::<Result<Vec<_>>>()?;

    Catalog::new(features, tracks)
}

fn row_to_track(n: usize, cells: Vec<Value>, features: &FeatureSet) -> Result<Track> {
    let mut cells = cells.into_iter();
    let id = match cells.next() {
        Some(Value::Text(id)) => id,
        _ => {
            return Err(Error::CatalogLoad(format!(
                "row {} has a non-text track_id",
                n + 1
            )))
        }
    };
    let name = display_text(cells.next());
    let artist = display_text(cells.next());

    let values = cells
        .zip(features.names())
        .map(|(cell, feature)| match cell {
            #[allow(clippy::cast_precision_loss)]
            Value::Integer(v) => Ok(v as f64),
            Value::Real(v) => Ok(v),
            Value::Null => Err(Error::CatalogLoad(format!(
                "track {} is missing feature {}",
                id, feature
            ))),
            Value::Text(_) | Value::Blob(_) => Err(Error::CatalogLoad(format!(
                "track {} has a non-numeric value for {}",
                id, feature
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Track {
        id: id.into(),
        name,
        artist,
        features: FeatureVector::new(values),
    })
}

/// Display columns are free-form; numbers are shown as written.
fn display_text(cell: Option<Value>) -> Option<String> {
    match cell? {
        Value::Text(text) => Some(text),
        Value::Integer(v) => Some(v.to_string()),
        Value::Real(v) => Some(v.to_string()),
        Value::Null | Value::Blob(_) => None,
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureSpec;

    fn features() -> FeatureSet {
        FeatureSet::new(vec![
            FeatureSpec::at_least("tempo", 0.0),
            FeatureSpec::bounded("energy", 0.0, 1.0),
            FeatureSpec::bounded("mode", 0.0, 1.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_json_str() {
        let json = r#"[
            {"track_id": "A", "track_name": "Alpha", "artist_name": "Ann",
             "tempo": 100, "energy": 0.5, "mode": true, "popularity": 40},
            {"track_id": "B", "tempo": 120.5, "energy": 0.9, "mode": false}
        ]"#;
        let catalog = from_json_str(json, features()).unwrap();

        assert_eq!(catalog.len(), 2);
        let a = catalog.get("A").unwrap();
        assert_eq!(a.features.as_slice(), &[100.0, 0.5, 1.0]);
        assert_eq!(a.label(), "Ann - Alpha");
        assert_eq!(catalog.get("B").unwrap().value(2), 0.0);
    }

    #[test]
    fn test_from_json_str_missing_feature() {
        let json = r#"[{"track_id": "A", "tempo": 100, "mode": 1}]"#;
        let err = from_json_str(json, features()).unwrap_err();
        assert!(matches!(err, Error::CatalogLoad(ref msg) if msg.contains("energy")));
    }

    #[test]
    fn test_from_json_str_non_numeric() {
        let json = r#"[{"track_id": "A", "tempo": "fast", "energy": 0.5, "mode": 1}]"#;
        assert!(matches!(
            from_json_str(json, features()),
            Err(Error::CatalogLoad(_))
        ));
    }

    #[test]
    fn test_from_json_str_malformed() {
        assert!(matches!(
            from_json_str("{not json", features()),
            Err(Error::CatalogLoad(_))
        ));
    }

    #[test]
    fn test_from_connection() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE track (
                id INTEGER PRIMARY KEY,
                track_id TEXT NOT NULL,
                track_name TEXT,
                artist_name TEXT,
                tempo REAL,
                energy REAL,
                mode BOOLEAN
            );
            INSERT INTO track (track_id, track_name, artist_name, tempo, energy, mode)
                VALUES ('A', 'Alpha', 'Ann', 100.0, 0.5, 1),
                       ('B', 'Beta', 'Bob', 120, 0.9, 0);",
        )
        .unwrap();

        let catalog = from_connection(&conn, features()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("B").unwrap().features.as_slice(), &[120.0, 0.9, 0.0]);
        assert_eq!(catalog.get("A").unwrap().label(), "Ann - Alpha");
    }

    #[test]
    fn test_from_connection_null_feature() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE track (track_id TEXT, tempo REAL, energy REAL, mode INTEGER);
             INSERT INTO track VALUES ('A', 100.0, NULL, 1);",
        )
        .unwrap();

        let err = from_connection(&conn, features()).unwrap_err();
        assert!(matches!(err, Error::CatalogLoad(ref msg) if msg.contains("energy")));
    }

    #[test]
    fn test_from_connection_non_numeric() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE track (track_id TEXT, tempo REAL, energy REAL, mode INTEGER);
             INSERT INTO track VALUES ('A', 'fast', 0.5, 1);",
        )
        .unwrap();

        let err = from_connection(&conn, features()).unwrap_err();
        assert!(matches!(err, Error::CatalogLoad(ref msg) if msg.contains("non-numeric") && msg.contains("tempo")));
    }

    #[test]
    fn test_from_connection_non_text_id() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE track (track_id INTEGER, tempo REAL, energy REAL, mode INTEGER);
             INSERT INTO track VALUES (7, 100.0, 0.5, 1);",
        )
        .unwrap();

        let err = from_connection(&conn, features()).unwrap_err();
        assert!(matches!(err, Error::CatalogLoad(ref msg) if msg.contains("track_id")));
    }

    #[test]
    fn test_from_connection_missing_column() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE track (track_id TEXT, tempo REAL);")
            .unwrap();

        let err = from_connection(&conn, features()).unwrap_err();
        assert!(matches!(err, Error::CatalogLoad(ref msg) if msg.contains("energy")));
    }

    #[test]
    fn test_from_connection_no_table() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(matches!(
            from_connection(&conn, features()),
            Err(Error::CatalogLoad(_))
        ));
    }

    #[test]
    fn test_source_from_path() {
        assert!(matches!(
            CatalogSource::from_path("tracks.JSON"),
            CatalogSource::Json(_)
        ));
        assert!(matches!(
            CatalogSource::from_path("songs.db"),
            CatalogSource::Sqlite(_)
        ));
    }

    #[test]
    fn test_source_load_sqlite_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("songs.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE track (track_id TEXT, tempo REAL, energy REAL, mode INTEGER);
                 INSERT INTO track VALUES ('A', 100.0, 0.5, 1);",
            )
            .unwrap();
        }

        let catalog = CatalogSource::from_path(&path).load(features()).unwrap();
        assert_eq!(catalog.len(), 1);
    }
}
