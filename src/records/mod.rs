//! Tabular input and output.
//!
//! [`CsvFile`] turns an uploaded file into a lazy, forward-only sequence of
//! [`SourceRecord`](crate::pipeline::SourceRecord)s; [`CsvOutFile`] collects
//! the generated conversations of the records that succeeded.

mod csv_file;
mod output;

pub use csv_file::{csv_error_table, CsvFile, CsvReadError, Records, UploadedFile};
pub use output::{CsvOutFile, OUTPUT_HEADER};
