use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::Utc;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, Type as PhysicalType};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field as ParquetField;
use rusqlite::types::ToSqlOutput;
use rusqlite::{Connection, ToSql, params, params_from_iter};
use tracing::info;

use crate::config::{PipelineConfig, validate_table_name};
use crate::error::PersistenceError;
use crate::shots::SHOT_COLUMNS;
use crate::table::{Cell, Table};

pub const RUNS_TABLE: &str = "ingest_runs";

#[derive(Debug, Clone)]
pub struct PersistSummary {
    pub parquet_path: PathBuf,
    pub db_path: PathBuf,
    pub table_name: String,
    pub rows_written: usize,
    /// Rows in the database table after the append.
    pub table_rows: u64,
}

/// Concatenates per-player tables in order and keeps the shot schema columns
/// that are actually present.
pub fn normalize_shots<I>(tables: I) -> Table
where
    I: IntoIterator<Item = Table>,
{
    Table::concat(tables).project(SHOT_COLUMNS)
}

/// Writes the batch to the season file and appends the same rows to the
/// database table.
pub fn persist_batch(batch: &Table, cfg: &PipelineConfig) -> Result<PersistSummary, PersistenceError> {
    let parquet_path = cfg.shots_path();
    let rows_written = write_parquet(batch, &parquet_path)?;
    info!(rows = rows_written, path = %parquet_path.display(), "wrote shots parquet");

    let table_rows = append_parquet_to_db(&parquet_path, &cfg.db_path, &cfg.table_name, &cfg.season)?;
    info!(
        table = %cfg.table_name,
        db = %cfg.db_path.display(),
        table_rows,
        "appended shots to database"
    );

    Ok(PersistSummary {
        parquet_path,
        db_path: cfg.db_path.clone(),
        table_name: cfg.table_name.clone(),
        rows_written,
        table_rows,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int,
    Float,
    Bool,
    Text,
}

fn infer_kind<'a>(cells: impl Iterator<Item = &'a Cell>) -> ColumnKind {
    let (mut ints, mut floats, mut bools, mut texts) = (false, false, false, false);
    for cell in cells {
        match cell {
            Cell::Null => {}
            Cell::Int(_) => ints = true,
            Cell::Float(_) => floats = true,
            Cell::Bool(_) => bools = true,
            Cell::Text(_) => texts = true,
        }
    }
    if texts || (bools && (ints || floats)) {
        ColumnKind::Text
    } else if floats {
        ColumnKind::Float
    } else if ints {
        ColumnKind::Int
    } else if bools {
        ColumnKind::Bool
    } else {
        ColumnKind::Text
    }
}

fn build_column(table: &Table, idx: usize, kind: ColumnKind) -> ArrayRef {
    let cells = table.rows.iter().map(|row| &row[idx]);
    match kind {
        ColumnKind::Int => Arc::new(Int64Array::from(
            cells
                .map(|c| match c {
                    Cell::Int(n) => Some(*n),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        ColumnKind::Float => Arc::new(Float64Array::from(
            cells
                .map(|c| match c {
                    Cell::Int(n) => Some(*n as f64),
                    Cell::Float(f) => Some(*f),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        ColumnKind::Bool => Arc::new(BooleanArray::from(
            cells
                .map(|c| match c {
                    Cell::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        ColumnKind::Text => Arc::new(StringArray::from(
            cells
                .map(|c| (!c.is_null()).then(|| c.render()))
                .collect::<Vec<_>>(),
        )),
    }
}

fn record_batch(table: &Table) -> Result<RecordBatch, PersistenceError> {
    let mut fields = Vec::with_capacity(table.columns.len());
    let mut arrays = Vec::with_capacity(table.columns.len());
    for (idx, name) in table.columns.iter().enumerate() {
        let kind = infer_kind(table.rows.iter().map(|row| &row[idx]));
        let data_type = match kind {
            ColumnKind::Int => DataType::Int64,
            ColumnKind::Float => DataType::Float64,
            ColumnKind::Bool => DataType::Boolean,
            ColumnKind::Text => DataType::Utf8,
        };
        fields.push(Field::new(name.as_str(), data_type, true));
        arrays.push(build_column(table, idx, kind));
    }
    let schema = Arc::new(Schema::new(fields));
    Ok(RecordBatch::try_new(schema, arrays)?)
}

/// Overwrites `path` with `table`. Returns the number of rows written.
pub fn write_parquet(table: &Table, path: &Path) -> Result<usize, PersistenceError> {
    if table.columns.is_empty() {
        return Err(PersistenceError::InvalidTable("no columns to write".to_string()));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| PersistenceError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    let batch = record_batch(table)?;
    let file = File::create(path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_created_by("nba_shot_prob".to_string())
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(table.len())
}

/// Column names and SQLite column types from a parquet file's schema.
pub fn parquet_sql_columns(path: &Path) -> Result<Vec<(String, &'static str)>, PersistenceError> {
    let reader = open_reader(path)?;
    let schema = reader.metadata().file_metadata().schema_descr();
    Ok(schema
        .columns()
        .iter()
        .map(|col| {
            let sql_type = match col.physical_type() {
                PhysicalType::BOOLEAN | PhysicalType::INT32 | PhysicalType::INT64 => "INTEGER",
                PhysicalType::FLOAT | PhysicalType::DOUBLE => "REAL",
                _ => "TEXT",
            };
            (col.name().to_string(), sql_type)
        })
        .collect())
}

pub fn read_parquet(path: &Path) -> Result<Table, PersistenceError> {
    let reader = open_reader(path)?;
    let columns = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect::<Vec<_>>();

    let mut table = Table::new(columns);
    for row in reader.get_row_iter(None)? {
        let row = row?;
        table.push_row(row.get_column_iter().map(|(_, field)| field_to_cell(field)).collect());
    }
    Ok(table)
}

fn open_reader(path: &Path) -> Result<SerializedFileReader<File>, PersistenceError> {
    let file = File::open(path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(SerializedFileReader::new(file)?)
}

fn field_to_cell(field: &ParquetField) -> Cell {
    match field {
        ParquetField::Null => Cell::Null,
        ParquetField::Bool(b) => Cell::Bool(*b),
        ParquetField::Byte(n) => Cell::Int(i64::from(*n)),
        ParquetField::Short(n) => Cell::Int(i64::from(*n)),
        ParquetField::Int(n) => Cell::Int(i64::from(*n)),
        ParquetField::Long(n) => Cell::Int(*n),
        ParquetField::UByte(n) => Cell::Int(i64::from(*n)),
        ParquetField::UShort(n) => Cell::Int(i64::from(*n)),
        ParquetField::UInt(n) => Cell::Int(i64::from(*n)),
        ParquetField::Float(f) => Cell::Float(f64::from(*f)),
        ParquetField::Double(f) => Cell::Float(*f),
        ParquetField::Str(s) => Cell::Text(s.clone()),
        other => Cell::Text(other.to_string()),
    }
}

impl ToSql for Cell {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Cell::Null => ToSqlOutput::from(rusqlite::types::Null),
            Cell::Int(n) => ToSqlOutput::from(*n),
            Cell::Float(f) => ToSqlOutput::from(*f),
            Cell::Text(s) => ToSqlOutput::from(s.as_str()),
            Cell::Bool(b) => ToSqlOutput::from(i64::from(*b)),
        })
    }
}

pub fn open_db(path: &Path) -> Result<Connection, PersistenceError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| PersistenceError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    let conn = Connection::open(path)?;
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS ingest_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            season TEXT NOT NULL,
            table_name TEXT NOT NULL,
            parquet_path TEXT NOT NULL,
            rows_inserted INTEGER NOT NULL,
            finished_at TEXT NOT NULL
        );
        "#,
    )?;
    Ok(conn)
}

/// Creates `table_name` from the parquet schema when absent, then appends
/// every row of the file. Returns the table's row count afterwards. The
/// connection is closed before returning, on every path.
pub fn append_parquet_to_db(
    parquet_path: &Path,
    db_path: &Path,
    table_name: &str,
    season: &str,
) -> Result<u64, PersistenceError> {
    validate_table_name(table_name).map_err(|e| PersistenceError::InvalidTable(e.to_string()))?;
    if table_name.eq_ignore_ascii_case(RUNS_TABLE) {
        return Err(PersistenceError::InvalidTable(format!(
            "`{table_name}` is reserved"
        )));
    }

    let columns = parquet_sql_columns(parquet_path)?;
    let rows = read_parquet(parquet_path)?;

    let mut conn = open_db(db_path)?;
    // On error the connection is dropped here, which rolls back and closes it.
    let count = append_rows(&mut conn, table_name, &columns, &rows, parquet_path, season)?;
    conn.close().map_err(|(_, err)| err)?;
    Ok(count)
}

fn append_rows(
    conn: &mut Connection,
    table_name: &str,
    columns: &[(String, &'static str)],
    rows: &Table,
    parquet_path: &Path,
    season: &str,
) -> Result<u64, PersistenceError> {
    let column_defs = columns
        .iter()
        .map(|(name, sql_type)| format!("{} {sql_type}", quote_ident(name)))
        .collect::<Vec<_>>()
        .join(", ");
    let names = columns
        .iter()
        .map(|(name, _)| quote_ident(name))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let insert = format!(
        "INSERT INTO {} ({names}) VALUES ({placeholders})",
        quote_ident(table_name)
    );

    // Schema changes share the transaction with the rows, so a failed insert
    // leaves the table as it was.
    let tx = conn.transaction()?;
    tx.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} ({column_defs});",
        quote_ident(table_name)
    ))?;

    // Later runs may carry columns the first run did not.
    let existing = existing_columns(&tx, table_name)?;
    for (name, sql_type) in columns {
        if !existing.iter().any(|c| c == name) {
            tx.execute_batch(&format!(
                "ALTER TABLE {} ADD COLUMN {} {sql_type};",
                quote_ident(table_name),
                quote_ident(name)
            ))?;
        }
    }

    {
        let mut stmt = tx.prepare(&insert)?;
        for row in &rows.rows {
            stmt.execute(params_from_iter(row.iter()))?;
        }
    }
    tx.execute(
        "INSERT INTO ingest_runs(season, table_name, parquet_path, rows_inserted, finished_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            season,
            table_name,
            parquet_path.display().to_string(),
            rows.len() as i64,
            Utc::now().to_rfc3339(),
        ],
    )?;
    tx.commit()?;

    table_row_count(conn, table_name)
}

pub fn table_row_count(conn: &Connection, table_name: &str) -> Result<u64, PersistenceError> {
    let count = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", quote_ident(table_name)),
        [],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(u64::try_from(count).unwrap_or_default())
}

fn existing_columns(conn: &Connection, table_name: &str) -> Result<Vec<String>, PersistenceError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table_name)))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut out = Vec::new();
    for name in names {
        out.push(name?);
    }
    Ok(out)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_inference() {
        let cells = [Cell::Int(1), Cell::Null, Cell::Float(2.5)];
        assert_eq!(infer_kind(cells.iter()), ColumnKind::Float);
        let cells = [Cell::Int(1), Cell::Text("a".into())];
        assert_eq!(infer_kind(cells.iter()), ColumnKind::Text);
        let cells = [Cell::Bool(true), Cell::Int(0)];
        assert_eq!(infer_kind(cells.iter()), ColumnKind::Text);
        let cells = [Cell::Null, Cell::Null];
        assert_eq!(infer_kind(cells.iter()), ColumnKind::Text);
        let cells = [Cell::Int(1), Cell::Null];
        assert_eq!(infer_kind(cells.iter()), ColumnKind::Int);
    }

    #[test]
    fn quoting() {
        assert_eq!(quote_ident("shots"), "\"shots\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
