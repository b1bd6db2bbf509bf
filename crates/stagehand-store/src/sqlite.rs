//! SQLite-backed implementation of [`MetadataStore`].
//!
//! Uses a single `Mutex<Connection>` for thread safety. Every mutation runs
//! in its own transaction; concurrent writers serialize on the lock and on
//! SQLite's own file locking.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use stagehand_types::id::{BuildId, ComponentId, ExecutionId, FlowId};
use stagehand_types::record::{
    BuildRecord, ComponentKind, ComponentRecord, ExecutionRecord, FlowRecord,
};

use crate::backend::MetadataStore;
use crate::error::{self, StoreError};
use crate::schema::CREATE_TABLES;

/// Name of the metadata store file inside a state directory. A state
/// directory contains exactly one store file under this name.
pub const STORE_FILE_NAME: &str = "state.sqlite";

/// Initialize a fresh state directory at `state_dir`.
///
/// Creates the directory, the store file inside it, and the schema. The
/// directory must not already exist.
///
/// # Errors
///
/// Returns [`StoreError::AlreadyInitialized`] if anything exists at
/// `state_dir`, [`StoreError::Io`] if the directory cannot be created, or
/// [`StoreError::Sqlite`] if the schema cannot be applied.
pub fn init_store(state_dir: &Path) -> error::Result<PathBuf> {
    if state_dir.symlink_metadata().is_ok() {
        return Err(StoreError::AlreadyInitialized(state_dir.to_path_buf()));
    }
    std::fs::create_dir_all(state_dir)?;

    let store_path = state_dir.join(STORE_FILE_NAME);
    let conn = Connection::open(&store_path)?;
    conn.execute_batch(CREATE_TABLES)?;
    tracing::info!(path = %store_path.display(), "Initialized metadata store");
    Ok(store_path)
}

/// SQLite-backed metadata storage.
///
/// Create with [`SqliteMetadataStore::open`] against an initialized state
/// directory or [`SqliteMetadataStore::in_memory`] for tests.
#[derive(Debug)]
pub struct SqliteMetadataStore {
    conn: Mutex<Connection>,
}

impl SqliteMetadataStore {
    /// Open the store file of an initialized state directory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the store file does not exist and
    /// [`StoreError::Sqlite`] when it cannot be opened.
    pub fn open(state_dir: &Path) -> error::Result<Self> {
        let store_path = state_dir.join(STORE_FILE_NAME);
        if !store_path.is_file() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!(
                    "no metadata store at '{}'; run init first",
                    store_path.display()
                ),
            )));
        }
        let conn = Connection::open(&store_path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store with the schema applied (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the database cannot be initialized.
    pub fn in_memory() -> error::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the connection lock.
    fn lock_conn(&self) -> error::Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

fn component_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ComponentRecord> {
    let kind_raw: String = row.get(1)?;
    let kind = ComponentKind::parse(&kind_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(ComponentRecord {
        id: ComponentId::new(row.get::<_, String>(0)?),
        kind,
        context_path: PathBuf::from(row.get::<_, String>(2)?),
        spec_path: PathBuf::from(row.get::<_, String>(3)?),
        created_at: row.get(4)?,
    })
}

fn flow_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FlowRecord> {
    Ok(FlowRecord {
        id: FlowId::new(row.get::<_, String>(0)?),
        spec_path: PathBuf::from(row.get::<_, String>(1)?),
        created_at: row.get(2)?,
    })
}

fn build_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BuildRecord> {
    Ok(BuildRecord {
        id: BuildId::new(row.get::<_, String>(0)?),
        component_id: ComponentId::new(row.get::<_, String>(1)?),
        created_at: row.get(2)?,
    })
}

fn execution_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExecutionRecord> {
    Ok(ExecutionRecord {
        id: ExecutionId::new(row.get::<_, String>(0)?),
        build_id: BuildId::new(row.get::<_, String>(1)?),
        component_id: ComponentId::new(row.get::<_, String>(2)?),
        created_at: row.get(3)?,
        flow_id: row.get::<_, Option<String>>(4)?.map(FlowId::new),
    })
}

impl MetadataStore for SqliteMetadataStore {
    fn insert_component(&self, component: &ComponentRecord) -> error::Result<()> {
        let conn = self.lock_conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO components (id, kind, context_path, spec_path, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                component.id.as_str(),
                component.kind.as_str(),
                component.context_path.to_string_lossy().into_owned(),
                component.spec_path.to_string_lossy().into_owned(),
                component.created_at,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn select_component(&self, id: &ComponentId) -> error::Result<ComponentRecord> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT id, kind, context_path, spec_path, created_at \
             FROM components WHERE id = ?1",
            params![id.as_str()],
            component_from_row,
        )
        .optional()?
        .ok_or_else(|| StoreError::ComponentNotFound(id.clone()))
    }

    fn list_components(&self) -> error::Result<Vec<ComponentRecord>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, kind, context_path, spec_path, created_at \
             FROM components ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map([], component_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::from)
    }

    fn delete_component(&self, id: &ComponentId) -> error::Result<()> {
        let conn = self.lock_conn()?;
        let tx = conn.unchecked_transaction()?;
        let deleted = tx.execute("DELETE FROM components WHERE id = ?1", params![id.as_str()])?;
        if deleted == 0 {
            return Err(StoreError::ComponentNotFound(id.clone()));
        }
        tx.commit()?;
        Ok(())
    }

    fn insert_flow(&self, flow: &FlowRecord) -> error::Result<()> {
        let conn = self.lock_conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO flows (id, spec_path, created_at) VALUES (?1, ?2, ?3)",
            params![
                flow.id.as_str(),
                flow.spec_path.to_string_lossy().into_owned(),
                flow.created_at,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn select_flow(&self, id: &FlowId) -> error::Result<FlowRecord> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT id, spec_path, created_at FROM flows WHERE id = ?1",
            params![id.as_str()],
            flow_from_row,
        )
        .optional()?
        .ok_or_else(|| StoreError::FlowNotFound(id.clone()))
    }

    fn list_flows(&self) -> error::Result<Vec<FlowRecord>> {
        let conn = self.lock_conn()?;
        let mut stmt =
            conn.prepare("SELECT id, spec_path, created_at FROM flows ORDER BY created_at, id")?;
        let rows = stmt.query_map([], flow_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::from)
    }

    fn insert_build(&self, build: &BuildRecord) -> error::Result<()> {
        let conn = self.lock_conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO builds (id, component_id, created_at) VALUES (?1, ?2, ?3)",
            params![
                build.id.as_str(),
                build.component_id.as_str(),
                build.created_at,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn select_build(&self, id: &BuildId) -> error::Result<BuildRecord> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT id, component_id, created_at FROM builds WHERE id = ?1",
            params![id.as_str()],
            build_from_row,
        )
        .optional()?
        .ok_or_else(|| StoreError::BuildNotFound(id.clone()))
    }

    fn list_builds(&self, component: Option<&ComponentId>) -> error::Result<Vec<BuildRecord>> {
        let conn = self.lock_conn()?;
        let rows = match component {
            Some(component) => {
                let mut stmt = conn.prepare(
                    "SELECT id, component_id, created_at FROM builds \
                     WHERE component_id = ?1 ORDER BY created_at, id",
                )?;
                let rows = stmt.query_map(params![component.as_str()], build_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, component_id, created_at FROM builds ORDER BY created_at, id",
                )?;
                let rows = stmt.query_map([], build_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(rows)
    }

    fn select_latest_build(&self, component: &ComponentId) -> error::Result<BuildRecord> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT id, component_id, created_at FROM builds \
             WHERE component_id = ?1 ORDER BY created_at DESC LIMIT 1",
            params![component.as_str()],
            build_from_row,
        )
        .optional()?
        .ok_or_else(|| StoreError::BuildNotFound(BuildId::new(component.as_str())))
    }

    fn insert_execution(&self, execution: &ExecutionRecord) -> error::Result<()> {
        let conn = self.lock_conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO executions (id, build_id, component_id, created_at, flow_id) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                execution.id.as_str(),
                execution.build_id.as_str(),
                execution.component_id.as_str(),
                execution.created_at,
                execution.flow_id.as_ref().map(FlowId::as_str),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn list_executions(&self, flow: Option<&FlowId>) -> error::Result<Vec<ExecutionRecord>> {
        let conn = self.lock_conn()?;
        let rows = match flow {
            Some(flow) => {
                let mut stmt = conn.prepare(
                    "SELECT id, build_id, component_id, created_at, flow_id FROM executions \
                     WHERE flow_id = ?1 ORDER BY created_at, id",
                )?;
                let rows = stmt.query_map(params![flow.as_str()], execution_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, build_id, component_id, created_at, flow_id FROM executions \
                     ORDER BY created_at, id",
                )?;
                let rows = stmt.query_map([], execution_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(rows)
    }
}
