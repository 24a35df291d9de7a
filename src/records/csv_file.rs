//! Lazy record extraction from uploaded CSV files.

use std::io::Cursor;

use thiserror::Error;

use crate::error::DomainError;
use crate::pipeline::SourceRecord;
use crate::retry::ErrorTable;

const MULTIPLE_COLUMNS: &str = "Multiple columns found, specify a column value.";
const COLUMN_NOT_FOUND: &str = "Specified column value not found in csv.";
const EMPTY_FILE: &str = "CSV file is empty.";
const ALREADY_READ: &str = "CSV file has already been read.";

/// An uploaded file: its client-side name and raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub content: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }
}

/// A `csv` failure tagged with the file it came from.
#[derive(Debug, Error)]
#[error("failed to read '{file_name}': {source}")]
pub struct CsvReadError {
    pub file_name: String,
    #[source]
    pub source: csv::Error,
}

fn invalid_file(file_name: &str) -> DomainError {
    DomainError::invalid_input(format!("Invalid csv file with name '{}'", file_name))
}

/// Classification of tabular read failures.
pub fn csv_error_table() -> ErrorTable<CsvReadError> {
    ErrorTable::new("csv", |_| {
        DomainError::invalid_input("Error occurred while reading csv file.")
    })
    .on(
        |e| {
            matches!(
                e.source.kind(),
                csv::ErrorKind::UnequalLengths { .. } | csv::ErrorKind::Utf8 { .. }
            )
        },
        |e| invalid_file(&e.file_name),
    )
}

/// An uploaded CSV file opened for a single forward pass.
pub struct CsvFile {
    file_name: String,
    column: Option<String>,
    reader: Option<csv::Reader<Cursor<Vec<u8>>>>,
}

impl CsvFile {
    /// Opens `file` for extraction, optionally restricted to `column`.
    ///
    /// Rejects names that do not end in `.csv`, compared case-insensitively.
    pub fn open(file: UploadedFile, column: Option<String>) -> Result<Self, DomainError> {
        if !file.file_name.to_ascii_lowercase().ends_with(".csv") {
            return Err(invalid_file(&file.file_name));
        }

        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(Cursor::new(file.content));

        Ok(Self {
            file_name: file.file_name,
            column,
            reader: Some(reader),
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The requested column, if one was given.
    pub fn column(&self) -> Option<&str> {
        self.column.as_deref()
    }

    /// Starts the single forward pass over the file's records.
    ///
    /// The pass cannot be restarted: a second call fails with
    /// `ErrorKind::InvalidInput`.
    pub fn records(&mut self) -> Result<Records, DomainError> {
        let mut reader = self
            .reader
            .take()
            .ok_or_else(|| DomainError::invalid_input(ALREADY_READ))?;

        let headers = reader
            .headers()
            .map_err(|source| self.classify(source))?
            .clone();

        let target = match &self.column {
            Some(column) => Some(
                headers
                    .iter()
                    .position(|h| h.trim() == column)
                    .ok_or_else(|| DomainError::invalid_input(COLUMN_NOT_FOUND))?,
            ),
            None => None,
        };

        Ok(Records {
            file_name: self.file_name.clone(),
            reader,
            headers,
            target,
            locked: None,
            row: csv::StringRecord::new(),
            emitted: 0,
            done: false,
        })
    }

    fn classify(&self, source: csv::Error) -> DomainError {
        let err = CsvReadError {
            file_name: self.file_name.clone(),
            source,
        };
        let classified = csv_error_table().classify(&err);
        tracing::error!(file_name = %self.file_name, error = ?err, "Failed to read csv headers");
        classified
    }
}

impl std::fmt::Debug for CsvFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvFile")
            .field("file_name", &self.file_name)
            .field("column", &self.column)
            .field("consumed", &self.reader.is_none())
            .finish()
    }
}

/// Forward-only iterator over the non-blank values of a CSV file.
///
/// Yields `Err(EmptyInput)` as its final item when the file produced no
/// values at all; after any error the iterator is exhausted.
pub struct Records {
    file_name: String,
    reader: csv::Reader<Cursor<Vec<u8>>>,
    headers: csv::StringRecord,
    target: Option<usize>,
    locked: Option<usize>,
    row: csv::StringRecord,
    emitted: usize,
    done: bool,
}

impl Records {
    /// The column values are being taken from: the requested column, or the
    /// column locked by the first single-valued row.
    pub fn column(&self) -> Option<&str> {
        self.target
            .or(self.locked)
            .and_then(|idx| self.headers.get(idx))
            .map(str::trim)
    }

    fn fail(&mut self, err: DomainError) -> Option<Result<SourceRecord, DomainError>> {
        self.done = true;
        Some(Err(err))
    }

    fn record_at(&self, idx: usize) -> Option<SourceRecord> {
        let value = self.row.get(idx)?.trim();
        if value.is_empty() {
            return None;
        }
        let column = self.headers.get(idx).map(str::trim).unwrap_or_default();
        Some(SourceRecord::new(value, column))
    }
}

impl Iterator for Records {
    type Item = Result<SourceRecord, DomainError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let has_row = match self.reader.read_record(&mut self.row) {
                Ok(has_row) => has_row,
                Err(source) => {
                    let err = CsvReadError {
                        file_name: self.file_name.clone(),
                        source,
                    };
                    tracing::error!(file_name = %self.file_name, error = ?err, "Malformed csv row");
                    let classified = csv_error_table().classify(&err);
                    return self.fail(classified);
                }
            };

            if !has_row {
                self.done = true;
                if self.emitted == 0 {
                    return Some(Err(DomainError::empty_input(EMPTY_FILE)));
                }
                return None;
            }

            let idx = match self.target.or(self.locked) {
                Some(idx) => idx,
                None => {
                    let mut filled = self
                        .row
                        .iter()
                        .enumerate()
                        .filter(|(_, value)| !value.trim().is_empty())
                        .map(|(idx, _)| idx);
                    match (filled.next(), filled.next()) {
                        (None, _) => continue,
                        (Some(_), Some(_)) => {
                            return self.fail(DomainError::invalid_input(MULTIPLE_COLUMNS));
                        }
                        (Some(idx), None) => {
                            self.locked = Some(idx);
                            idx
                        }
                    }
                }
            };

            if let Some(record) = self.record_at(idx) {
                self.emitted += 1;
                return Some(Ok(record));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn open(name: &str, body: &str, column: Option<&str>) -> CsvFile {
        CsvFile::open(UploadedFile::new(name, body), column.map(String::from)).unwrap()
    }

    fn collect(file: &mut CsvFile) -> Result<Vec<String>, DomainError> {
        file.records()?
            .map(|r| r.map(|record| record.text))
            .collect()
    }

    #[test]
    fn test_skips_blank_and_whitespace_rows() {
        let mut file = open(
            "faq.csv",
            "text\n\"hello world this is long enough content\"\n\"\"\n\"  \"\n",
            None,
        );
        let values = collect(&mut file).unwrap();
        assert_eq!(values, vec!["hello world this is long enough content"]);
    }

    #[test]
    fn test_only_blank_rows_is_empty_input() {
        let mut file = open("faq.csv", "text\n\"  \"\n", None);
        let err = collect(&mut file).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyInput);
        assert_eq!(err.message(), "CSV file is empty.");
    }

    #[test]
    fn test_header_only_is_empty_input() {
        let mut file = open("faq.csv", "text\n", None);
        assert_eq!(collect(&mut file).unwrap_err().kind(), ErrorKind::EmptyInput);
    }

    #[test]
    fn test_two_filled_columns_without_column_is_ambiguous() {
        let mut file = open("faq.csv", "question,answer\nhow long,three days\n", None);
        let mut records = file.records().unwrap();
        let err = records.next().unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(err.message(), "Multiple columns found, specify a column value.");
        assert!(records.next().is_none());
    }

    #[test]
    fn test_first_single_valued_row_locks_column() {
        let mut file = open("faq.csv", "a,b\n,first\nleft,second\n", None);
        let mut records = file.records().unwrap();
        assert_eq!(records.next().unwrap().unwrap().text, "first");
        assert_eq!(records.column(), Some("b"));
        let second = records.next().unwrap().unwrap();
        assert_eq!(second.text, "second");
        assert_eq!(second.column, "b");
        assert!(records.next().is_none());
    }

    #[test]
    fn test_selected_column() {
        let mut file = open(
            "faq.csv",
            "question,answer\nhow long,three days\nwho,\n",
            Some("answer"),
        );
        assert_eq!(collect(&mut file).unwrap(), vec!["three days"]);
    }

    #[test]
    fn test_missing_selected_column() {
        let mut file = open("faq.csv", "question\nhow long\n", Some("answer"));
        let err = file.records().err().unwrap();
        assert_eq!(err.message(), "Specified column value not found in csv.");
    }

    #[test]
    fn test_rejects_wrong_extension() {
        let err = CsvFile::open(UploadedFile::new("faq.txt", "text\nhi\n"), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(err.message(), "Invalid csv file with name 'faq.txt'");

        assert!(CsvFile::open(UploadedFile::new("FAQ.CSV", "text\n"), None).is_ok());
        assert!(CsvFile::open(UploadedFile::new(".csv", "text\n"), None).is_ok());
        assert!(CsvFile::open(UploadedFile::new("faq.csv.bak", "text\n"), None).is_err());
    }

    #[test]
    fn test_malformed_row_is_invalid_input() {
        let mut file = open("faq.csv", "a,b\n1,2\n3\n", Some("a"));
        let mut records = file.records().unwrap();
        assert_eq!(records.next().unwrap().unwrap().text, "1");
        let err = records.next().unwrap().unwrap_err();
        assert_eq!(err.message(), "Invalid csv file with name 'faq.csv'");
    }

    #[test]
    fn test_second_traversal_is_rejected() {
        let mut file = open("faq.csv", "text\nsome source text\n", None);
        assert_eq!(collect(&mut file).unwrap().len(), 1);
        let err = file.records().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
