//! Raw ingest reader
//!
//! Streams typed rows out of the bronze directory. Files are discovered
//! by extension and visited in name order so logs are reproducible; each
//! field is coerced to the type its column declares.

use crate::error::{PipelineError, PipelineResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use md_core::config::SourceConfig;
use md_core::{ColumnType, RawRecord, Row, TableSchema, Value};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// One coerced data line and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    /// File name without its directory
    pub file_name: String,
    /// 1-based line number within the file
    pub line: usize,
    pub row: Row,
}

/// List the files in `dir` with the given extension, sorted by name
pub fn discover_files(dir: &Path, extension: &str) -> PipelineResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(PipelineError::SourceNotFound {
            path: dir.display().to_string(),
        });
    }

    let io_err = |source: std::io::Error| PipelineError::Io {
        path: dir.display().to_string(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if path.is_file() && matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

struct OpenFile {
    name: String,
    path: String,
    records: csv::ByteRecordsIntoIter<File>,
}

/// Lazy reader over every source file of a batch
///
/// Yields one `Result` per data line. Coercion failures surface as
/// [`PipelineError::SchemaMismatch`] and leave the reader usable, so the
/// caller decides whether to skip the row or abort.
pub struct RawReader {
    schema: TableSchema,
    has_header: bool,
    delimiter: u8,
    pending: std::vec::IntoIter<PathBuf>,
    current: Option<OpenFile>,
    file_count: usize,
}

impl RawReader {
    /// Discover the files under `dir` and prepare to read them
    pub fn open(dir: &Path, source: &SourceConfig) -> PipelineResult<Self> {
        let files = discover_files(dir, &source.extension)?;
        log::debug!("Found {} source files in {}", files.len(), dir.display());
        Ok(Self {
            schema: enforce_required(&source.columns),
            has_header: source.has_header,
            delimiter: u8::try_from(source.delimiter).unwrap_or(b','),
            file_count: files.len(),
            pending: files.into_iter(),
            current: None,
        })
    }

    /// Number of files the batch covers
    pub fn file_count(&self) -> usize {
        self.file_count
    }

    fn open_file(&self, path: &Path) -> PipelineResult<OpenFile> {
        let display = path.display().to_string();
        let file = File::open(path).map_err(|source| PipelineError::Io {
            path: display.clone(),
            source,
        })?;
        let records = csv::ReaderBuilder::new()
            .has_headers(self.has_header)
            .delimiter(self.delimiter)
            .flexible(true)
            .from_reader(file)
            .into_byte_records();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| display.clone());
        log::debug!("Reading {}", display);
        Ok(OpenFile {
            name,
            path: display,
            records,
        })
    }
}

impl Iterator for RawReader {
    type Item = PipelineResult<SourceRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(file) = self.current.as_mut() {
                match file.records.next() {
                    Some(Ok(record)) => {
                        return Some(coerce_record(&self.schema, &file.name, &record));
                    }
                    Some(Err(source)) => {
                        let path = file.path.clone();
                        self.current = None;
                        return Some(Err(PipelineError::Csv { path, source }));
                    }
                    None => self.current = None,
                }
            }

            let path = self.pending.next()?;
            match self.open_file(&path) {
                Ok(file) => self.current = Some(file),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Mark the columns a raw record cannot do without as non-nullable
fn enforce_required(columns: &TableSchema) -> TableSchema {
    let raw = RawRecord::source_schema();
    let mut schema = columns.clone();
    for col in &mut schema.columns {
        if raw.column(&col.name).is_some_and(|req| !req.nullable) {
            col.nullable = false;
        }
    }
    schema
}

fn coerce_record(
    schema: &TableSchema,
    file_name: &str,
    record: &csv::ByteRecord,
) -> PipelineResult<SourceRow> {
    let line = record
        .position()
        .map(|p| p.line() as usize)
        .unwrap_or_default();
    let mismatch = |column: &str, value: &str, expected: String| PipelineError::SchemaMismatch {
        file: file_name.to_string(),
        line,
        column: column.to_string(),
        value: value.to_string(),
        expected,
    };

    if record.len() != schema.columns.len() {
        return Err(mismatch(
            "*",
            &format!("{} fields", record.len()),
            format!("{} fields", schema.columns.len()),
        ));
    }

    let mut row = Row::new();
    for (col, bytes) in schema.columns.iter().zip(record.iter()) {
        let field = std::str::from_utf8(bytes).map_err(|_| {
            mismatch(
                &col.name,
                &String::from_utf8_lossy(bytes),
                "UTF-8 text".to_string(),
            )
        })?;
        let value = coerce_value(field, col.data_type)
            .ok_or_else(|| mismatch(&col.name, field, col.data_type.to_string()))?;
        if value.is_null() && !col.nullable {
            return Err(mismatch(
                &col.name,
                field,
                format!("non-null {}", col.data_type),
            ));
        }
        row.set(&col.name, value);
    }

    Ok(SourceRow {
        file_name: file_name.to_string(),
        line,
        row,
    })
}

/// Coerce one field to `data_type`
///
/// Blank fields become `Null`. Returns `None` when the text is not a
/// literal of the requested type.
pub fn coerce_value(raw: &str, data_type: ColumnType) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(Value::Null);
    }

    match data_type {
        ColumnType::String => Some(Value::Text(raw.to_string())),
        ColumnType::Integer => trimmed.parse::<i64>().ok().map(Value::Int),
        ColumnType::Decimal => trimmed
            .parse::<f64>()
            .ok()
            .filter(|d| d.is_finite())
            .map(Value::Decimal),
        ColumnType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(Value::Bool(true)),
            "false" | "0" | "no" => Some(Value::Bool(false)),
            _ => None,
        },
        ColumnType::Date => NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
            .ok()
            .map(Value::Date),
        ColumnType::Timestamp => NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT)
            .ok()
            .or_else(|| {
                DateTime::parse_from_rfc3339(trimmed)
                    .ok()
                    .map(|dt| dt.naive_utc())
            })
            .map(Value::Timestamp),
    }
}

#[cfg(test)]
#[path = "ingest_test.rs"]
mod tests;
