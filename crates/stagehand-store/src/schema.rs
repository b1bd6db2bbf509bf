//! Schema for the metadata store.
//!
//! All `created_at` columns hold whole seconds since the Unix epoch.
//! `flow_components` is reserved for flow/component association bookkeeping;
//! nothing writes it today but the layout is kept stable for migrations.

/// DDL executed once when a state directory is initialized.
pub const CREATE_TABLES: &str = r"
CREATE TABLE components (
    id TEXT PRIMARY KEY NOT NULL,
    kind TEXT NOT NULL,
    context_path TEXT NOT NULL,
    spec_path TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE flows (
    id TEXT PRIMARY KEY NOT NULL,
    spec_path TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE flow_components (
    flow_id TEXT NOT NULL,
    component_id TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE builds (
    id TEXT PRIMARY KEY NOT NULL,
    component_id TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE executions (
    id TEXT PRIMARY KEY NOT NULL,
    build_id TEXT NOT NULL,
    component_id TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    flow_id TEXT
);
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_all_five_tables() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(CREATE_TABLES).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' \
                 AND name IN ('components', 'flows', 'flow_components', 'builds', 'executions')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 5);
    }

    #[test]
    fn schema_is_not_reapplicable() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(CREATE_TABLES).unwrap();
        assert!(conn.execute_batch(CREATE_TABLES).is_err());
    }
}
