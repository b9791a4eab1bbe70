//! Tabular data store for pipeline-produced CSV files
//!
//! Files are `;`-separated with a header row. Headers are trimmed and
//! upper-cased. Cells are typed on load: `%Y-%m-%d` dates, numbers with
//! either `.` or a single decimal comma (`12,5`), otherwise text. Thousands
//! separators (`1.234,5`) are not recognised and stay text. Every cell keeps
//! its trimmed source text, so keys such as `001` read back unchanged.
//!
//! Input is read as UTF-8 and falls back to Windows-1252 (a superset of the
//! printable Latin-1 range) when the bytes are not valid UTF-8.
//!
//! Loaded tables are cached in the store object until invalidated.

use crate::errors::TableError;
use chrono::NaiveDate;
use encoding_rs::WINDOWS_1252;
use parking_lot::RwLock;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const DELIMITER: u8 = b';';
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A typed cell. Typed variants keep the trimmed text they were parsed from.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number { value: f64, raw: String },
    Date { value: NaiveDate, raw: String },
    Text(String),
}

impl Cell {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Cell::Empty;
        }
        if let Ok(value) = NaiveDate::parse_from_str(raw, DATE_FORMAT) {
            return Cell::Date {
                value,
                raw: raw.to_string(),
            };
        }
        match parse_decimal(raw) {
            Some(value) => Cell::Number {
                value,
                raw: raw.to_string(),
            },
            None => Cell::Text(raw.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Source text of the cell, whatever its type
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Empty => None,
            Cell::Number { raw, .. } | Cell::Date { raw, .. } | Cell::Text(raw) => Some(raw),
        }
    }
}

/// Decode file bytes as UTF-8, or as Windows-1252 when they are not valid UTF-8
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            text
        }
    }
}

/// Parse `12.5` or `12,5`; anything mixing both separators is rejected
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let normalized = match (raw.contains(','), raw.contains('.')) {
        (true, true) => return None,
        (true, false) if raw.matches(',').count() == 1 => raw.replace(',', "."),
        (true, false) => return None,
        _ => raw.to_string(),
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    /// Parse `;`-separated CSV in UTF-8 or Windows-1252
    pub fn from_reader<R: Read>(name: &str, mut reader: R) -> Result<Self, TableError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let text = decode_text(&bytes);
        if matches!(text, Cow::Owned(_)) {
            debug!(table = name, "table is not UTF-8, decoded as Windows-1252");
        }

        let mut csv = csv::ReaderBuilder::new()
            .delimiter(DELIMITER)
            .flexible(true)
            .from_reader(text.as_bytes());

        let columns: Vec<String> = csv
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_uppercase())
            .collect();

        let mut rows = Vec::new();
        for record in csv.records() {
            let record = record?;
            let mut row: Vec<Cell> = record.iter().map(Cell::parse).collect();
            row.resize(columns.len(), Cell::Empty);
            rows.push(row);
        }

        Ok(Self::new(name, columns, rows))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column, case-insensitive
    pub fn column_index(&self, column: &str) -> Option<usize> {
        let wanted = column.trim().to_uppercase();
        self.columns.iter().position(|c| *c == wanted)
    }

    pub fn require_column(&self, column: &str) -> Result<usize, TableError> {
        self.column_index(column)
            .ok_or_else(|| TableError::MissingColumn {
                table: self.name.clone(),
                column: column.to_uppercase(),
            })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().enumerate().map(move |(index, cells)| Row {
            table: self,
            index,
            cells,
        })
    }
}

/// Borrowed view of one table row
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    table: &'a Table,
    index: usize,
    cells: &'a [Cell],
}

impl<'a> Row<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn cell(&self, column: &str) -> Option<&'a Cell> {
        self.table
            .column_index(column)
            .and_then(|i| self.cells.get(i))
    }

    pub fn number(&self, column: &str) -> Option<f64> {
        self.cell(column).and_then(Cell::as_number)
    }

    pub fn date(&self, column: &str) -> Option<NaiveDate> {
        self.cell(column).and_then(Cell::as_date)
    }

    pub fn text(&self, column: &str) -> Option<&'a str> {
        self.cell(column).and_then(Cell::as_text)
    }

    /// Numeric cell that must be present
    pub fn require_number(&self, column: &str) -> Result<f64, TableError> {
        let cell = self.cell(column).ok_or_else(|| TableError::MissingColumn {
            table: self.table.name.clone(),
            column: column.to_uppercase(),
        })?;
        cell.as_number().ok_or_else(|| TableError::NotNumeric {
            table: self.table.name.clone(),
            row: self.index,
            column: column.to_uppercase(),
            value: cell.as_text().unwrap_or_default().to_string(),
        })
    }
}

/// Directory-backed table cache
#[derive(Debug)]
pub struct TableStore {
    root: PathBuf,
    cache: RwLock<HashMap<String, Arc<Table>>>,
}

impl TableStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load `name` (a file under the store root), reading it at most once
    pub fn load_table(&self, name: &str) -> Result<Arc<Table>, TableError> {
        if let Some(table) = self.cache.read().get(name) {
            return Ok(table.clone());
        }

        let path = self.path_for(name)?;
        let file = match std::fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(TableError::NotFound(path)),
            Err(e) => return Err(e.into()),
        };
        let table = Arc::new(Table::from_reader(name, std::io::BufReader::new(file))?);
        info!(
            table = name,
            rows = table.len(),
            columns = table.columns().len(),
            "table loaded"
        );

        // Another caller may have loaded it meanwhile; keep the first copy.
        let mut cache = self.cache.write();
        Ok(cache.entry(name.to_string()).or_insert(table).clone())
    }

    pub fn invalidate(&self, name: &str) -> bool {
        let removed = self.cache.write().remove(name).is_some();
        if removed {
            debug!(table = name, "table evicted");
        }
        removed
    }

    pub fn clear(&self) {
        self.cache.write().clear();
    }

    pub fn cached_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.cache.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, TableError> {
        let path = Path::new(name);
        let plain = path.components().count() == 1
            && matches!(path.components().next(), Some(std::path::Component::Normal(_)));
        if !plain {
            return Err(TableError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_cell_typing() {
        assert_eq!(Cell::parse(" 12,5 ").as_number(), Some(12.5));
        assert_eq!(Cell::parse("12.5").as_number(), Some(12.5));
        assert_eq!(Cell::parse("-3").as_number(), Some(-3.0));
        assert_eq!(
            Cell::parse("2024-02-29").as_date(),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(Cell::parse("1.234,5"), Cell::Text("1.234,5".to_string()));
        assert_eq!(Cell::parse("1,2,3"), Cell::Text("1,2,3".to_string()));
        assert_eq!(Cell::parse("lightgbm"), Cell::Text("lightgbm".to_string()));
        assert_eq!(Cell::parse("  "), Cell::Empty);
    }

    #[test]
    fn test_typed_cells_keep_source_text() {
        let key = Cell::parse(" 001 ");
        assert_eq!(key.as_number(), Some(1.0));
        assert_eq!(key.as_text(), Some("001"));
        assert_eq!(Cell::parse("12,50").as_text(), Some("12,50"));
        assert_eq!(Cell::parse("2024-01-05").as_text(), Some("2024-01-05"));
        assert_eq!(Cell::Empty.as_text(), None);
    }

    #[test]
    fn test_windows_1252_fallback() {
        let bytes = b"V\xc1LVULA;PRESI\xd3N\nV\xc1LVULA_1;12,5\n";
        let table = Table::from_reader("latin.csv", &bytes[..]).unwrap();
        assert_eq!(table.columns(), &["VÁLVULA", "PRESIÓN"]);

        let row = table.rows().next().unwrap();
        assert_eq!(row.text("VÁLVULA"), Some("VÁLVULA_1"));
        assert_eq!(row.number("presión"), Some(12.5));

        // valid UTF-8 is left alone
        assert!(matches!(decode_text("Válvula".as_bytes()), Cow::Borrowed("Válvula")));
    }

    #[test]
    fn test_headers_normalized() {
        let csv = "\u{feff} valvula ;Fecha;volumen\nV1;2024-01-01;10,5\nV2;2024-01-02\n";
        let table = Table::from_reader("t.csv", csv.as_bytes()).unwrap();
        assert_eq!(table.columns(), &["VALVULA", "FECHA", "VOLUMEN"]);
        assert_eq!(table.len(), 2);

        let rows: Vec<_> = table.rows().collect();
        assert_eq!(rows[0].number("volumen"), Some(10.5));
        assert_eq!(rows[0].text("VALVULA"), Some("V1"));
        // short rows are padded
        assert_eq!(rows[1].cell("VOLUMEN"), Some(&Cell::Empty));
        assert!(rows[1].require_number("VOLUMEN").is_err());
        assert!(table.require_column("MISSING").is_err());
    }

    #[test]
    fn test_store_caches_until_invalidated() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("metricas.csv");
        std::fs::write(&path, "A;B\n1;2\n").unwrap();

        let store = TableStore::new(tmp.path());
        let first = store.load_table("metricas.csv").unwrap();

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "3;4").unwrap();

        let cached = store.load_table("metricas.csv").unwrap();
        assert!(Arc::ptr_eq(&first, &cached));
        assert_eq!(cached.len(), 1);
        assert_eq!(store.cached_tables(), vec!["metricas.csv".to_string()]);

        assert!(store.invalidate("metricas.csv"));
        assert_eq!(store.load_table("metricas.csv").unwrap().len(), 2);
    }

    #[test]
    fn test_store_errors() {
        let tmp = TempDir::new().unwrap();
        let store = TableStore::new(tmp.path());
        assert!(matches!(
            store.load_table("absent.csv"),
            Err(TableError::NotFound(_))
        ));
        for name in ["../x.csv", "a/b.csv", ""] {
            assert!(matches!(
                store.load_table(name),
                Err(TableError::InvalidName(_))
            ));
        }
    }
}
