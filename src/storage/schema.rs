//! Database schema constants and SQL queries.
//!
//! All SQL for the PostgreSQL document store lives here.

/// Table holding one row per processed file.
pub const CREATE_SYNTHETIC_DOCUMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS synthetic_documents (
    id UUID PRIMARY KEY,
    file_name VARCHAR(1024) NOT NULL,
    succeeded BOOLEAN NOT NULL,
    column_name VARCHAR(1024),
    reason TEXT,
    statuses JSONB NOT NULL DEFAULT '[]'::jsonb,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_CREATED_AT_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_synthetic_documents_created_at ON synthetic_documents(created_at DESC)";

pub const CREATE_FILE_NAME_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_synthetic_documents_file_name ON synthetic_documents(file_name)";

pub const INSERT_DOCUMENT: &str = r#"
INSERT INTO synthetic_documents (id, file_name, succeeded, column_name, reason, statuses, created_at)
VALUES ($1, $2, $3, $4, $5, $6, $7)
"#;

pub const SELECT_DOCUMENTS_BY_IDS: &str = r#"
SELECT id, file_name, succeeded, column_name, reason, statuses, created_at
FROM synthetic_documents
WHERE id = ANY($1)
ORDER BY created_at
"#;

/// Write probe used to verify credentials; the temp table vanishes with the session.
pub const CREATE_WRITE_PROBE: &str =
    "CREATE TEMPORARY TABLE IF NOT EXISTS convo_forge_write_probe (ok BOOLEAN NOT NULL)";
pub const INSERT_WRITE_PROBE: &str = "INSERT INTO convo_forge_write_probe (ok) VALUES (TRUE)";
pub const DROP_WRITE_PROBE: &str = "DROP TABLE IF EXISTS convo_forge_write_probe";

/// Returns every schema statement in application order.
pub fn all_schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_SYNTHETIC_DOCUMENTS_TABLE,
        CREATE_CREATED_AT_INDEX,
        CREATE_FILE_NAME_INDEX,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_are_idempotent() {
        for statement in all_schema_statements() {
            assert!(statement.contains("IF NOT EXISTS"));
        }
    }

    #[test]
    fn test_lookup_uses_array_binding() {
        assert!(SELECT_DOCUMENTS_BY_IDS.contains("ANY($1)"));
        assert_eq!(INSERT_DOCUMENT.matches('$').count(), 7);
    }
}
