//! Output buffer of generated conversations.

use crate::error::{DomainError, ObjectStoreKind};
use crate::pipeline::GeneratedData;

/// Header row of every output file.
pub const OUTPUT_HEADER: [&str; 2] = ["customer_support", "sales_agent"];

/// In-memory CSV with one row per succeeded record.
pub struct CsvOutFile {
    writer: csv::Writer<Vec<u8>>,
    rows: usize,
}

fn build_error(err: csv::Error) -> DomainError {
    tracing::error!(error = ?err, "Failed to write output csv");
    DomainError::object_store(ObjectStoreKind::Client, "Failed to prepare output file for upload.")
}

impl CsvOutFile {
    pub fn new() -> Result<Self, DomainError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(OUTPUT_HEADER).map_err(build_error)?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn write(&mut self, data: &GeneratedData) -> Result<(), DomainError> {
        self.writer
            .write_record([data.customer_support.as_str(), data.sales_agent.as_str()])
            .map_err(build_error)?;
        self.rows += 1;
        Ok(())
    }

    /// Number of data rows written so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn finish(self) -> Result<Vec<u8>, DomainError> {
        self.writer
            .into_inner()
            .map_err(|e| build_error(csv::Error::from(e.into_error())))
    }
}
