//! SQLite-backed triple store.
//!
//! Individuals, class assertions, object properties and data properties are
//! kept in separate tables (see [`crate::schema`]). A single connection is
//! shared behind a mutex; a [`SqliteTransaction`] holds the lock from `BEGIN`
//! until it commits, aborts or is dropped, so transactions never interleave.

use std::{
    path::Path,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use parking_lot::{Mutex, MutexGuard};
use rusqlite::{Connection, OptionalExtension, params, types::ValueRef};

use crate::{
    config::StoreConfig,
    errors::{Result, SpatioGraphError},
    fault_injection::{FaultInjector, FaultPoint},
    iri::Iri,
    literal::{Datatype, Literal},
    schema::ensure_schema,
};

use super::{GraphStore, ResultRow, StoreCapabilities, StoreTransaction, functions};

pub struct SqliteStore {
    conn: Mutex<Connection>,
    capabilities: StoreCapabilities,
    faults: FaultInjector,
    next_transaction: AtomicU64,
}

/// In-memory databases report an empty file name in `database_list`.
fn is_in_memory_connection(conn: &Connection) -> bool {
    match conn.pragma_query_value(None, "database_list", |row| {
        let name: String = row.get(2)?;
        Ok(name)
    }) {
        Ok(file) => file.is_empty() || file == ":memory:",
        Err(_) => true,
    }
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P, cfg: &StoreConfig) -> Result<Self> {
        let conn =
            Connection::open(path).map_err(|e| SpatioGraphError::connection(e.to_string()))?;
        Self::from_connection(conn, cfg)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with(&StoreConfig::default())
    }

    pub fn open_in_memory_with(cfg: &StoreConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SpatioGraphError::connection(e.to_string()))?;
        Self::from_connection(conn, cfg)
    }

    /// Opens the database at `cfg.path`, or an in-memory database when unset.
    pub fn from_config(cfg: &StoreConfig) -> Result<Self> {
        match &cfg.path {
            Some(path) => Self::open(path, cfg),
            None => Self::open_in_memory_with(cfg),
        }
    }

    fn from_connection(conn: Connection, cfg: &StoreConfig) -> Result<Self> {
        ensure_schema(&conn)?;
        conn.set_prepared_statement_cache_capacity(128);
        conn.busy_timeout(Duration::from_millis(cfg.busy_timeout_ms))
            .map_err(|e| SpatioGraphError::connection(e.to_string()))?;

        if !is_in_memory_connection(&conn) {
            if let Err(e) = conn.pragma_update(None, "journal_mode", "WAL") {
                tracing::warn!(error = %e, "write-ahead log unavailable, using rollback journal");
                let _ = conn.pragma_update(None, "journal_mode", "DELETE");
            }
            let _ = conn.pragma_update(None, "synchronous", "NORMAL");
        }

        for (key, value) in &cfg.pragma_settings {
            let pragma_sql = format!("PRAGMA {key} = {value}");
            match conn.execute(&pragma_sql, []) {
                // pragmas such as journal_mode echo the new value as a row
                Ok(_) | Err(rusqlite::Error::ExecuteReturnedResults) => {}
                Err(e) => {
                    return Err(SpatioGraphError::connection(format!(
                        "PRAGMA {key} = {value}: {e}"
                    )));
                }
            }
        }

        if cfg.spatial {
            functions::register_spatial_functions(&conn)?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
            capabilities: StoreCapabilities {
                spatial: cfg.spatial,
            },
            faults: FaultInjector::new(),
            next_transaction: AtomicU64::new(1),
        })
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }
}

impl GraphStore for SqliteStore {
    type Transaction<'a> = SqliteTransaction<'a>;

    fn open_transaction(&self, writable: bool) -> Result<SqliteTransaction<'_>> {
        let conn = self.conn.lock();
        let begin = if writable {
            "BEGIN IMMEDIATE"
        } else {
            "BEGIN DEFERRED"
        };
        conn.execute(begin, [])
            .map_err(|e| SpatioGraphError::transaction(e.to_string()))?;
        let id = self.next_transaction.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(transaction = id, writable, "opened transaction");
        Ok(SqliteTransaction {
            conn,
            faults: &self.faults,
            id,
            writable,
            rollback_only: false,
            finished: false,
        })
    }

    fn capabilities(&self) -> StoreCapabilities {
        self.capabilities
    }
}

pub struct SqliteTransaction<'s> {
    conn: MutexGuard<'s, Connection>,
    faults: &'s FaultInjector,
    id: u64,
    writable: bool,
    rollback_only: bool,
    finished: bool,
}

impl SqliteTransaction<'_> {
    fn ensure_writable(&self) -> Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(SpatioGraphError::transaction(format!(
                "transaction {} is read-only",
                self.id
            )))
        }
    }

    fn rollback(&mut self) -> Result<()> {
        self.finished = true;
        self.conn
            .execute("ROLLBACK", [])
            .map_err(|e| SpatioGraphError::transaction(e.to_string()))?;
        tracing::debug!(transaction = self.id, "aborted transaction");
        Ok(())
    }

    fn execute(&self, sql: &str, params: impl rusqlite::Params) -> Result<usize> {
        self.conn
            .prepare_cached(sql)
            .and_then(|mut stmt| stmt.execute(params))
            .map_err(|e| SpatioGraphError::query(e.to_string()))
    }
}

impl StoreTransaction for SqliteTransaction<'_> {
    fn id(&self) -> u64 {
        self.id
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn commit(mut self) -> Result<()> {
        if self.rollback_only {
            self.rollback()?;
            return Err(SpatioGraphError::transaction(format!(
                "transaction {} was marked rollback-only",
                self.id
            )));
        }
        if let Err(err) = self.faults.check(FaultPoint::BeforeCommit) {
            self.rollback()?;
            return Err(err);
        }
        if let Err(e) = self.conn.execute("COMMIT", []) {
            self.rollback()?;
            return Err(SpatioGraphError::transaction(e.to_string()));
        }
        self.finished = true;
        tracing::debug!(transaction = self.id, "committed transaction");
        Ok(())
    }

    fn abort(mut self) -> Result<()> {
        self.rollback()
    }

    fn mark_rollback_only(&mut self) {
        if !self.rollback_only {
            tracing::debug!(transaction = self.id, "transaction marked rollback-only");
        }
        self.rollback_only = true;
    }

    fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    fn create_individual(&mut self, class: &Iri, individual: &Iri) -> Result<()> {
        self.ensure_writable()?;
        self.faults.check(FaultPoint::CreateIndividual)?;
        self.execute(
            "INSERT OR IGNORE INTO individuals(iri) VALUES(?1)",
            params![individual.as_str()],
        )?;
        self.execute(
            "INSERT OR IGNORE INTO class_assertions(individual, class) VALUES(?1, ?2)",
            params![individual.as_str(), class.as_str()],
        )?;
        Ok(())
    }

    fn remove_individual(&mut self, individual: &Iri) -> Result<()> {
        self.ensure_writable()?;
        self.faults.check(FaultPoint::RemoveIndividual)?;
        let affected = self.execute(
            "DELETE FROM individuals WHERE iri=?1",
            params![individual.as_str()],
        )?;
        if affected == 0 {
            return Err(SpatioGraphError::not_found(format!("individual {individual}")));
        }
        let iri = individual.as_str();
        self.execute(
            "DELETE FROM class_assertions WHERE individual=?1",
            params![iri],
        )?;
        self.execute(
            "DELETE FROM object_properties WHERE subject=?1 OR object=?1",
            params![iri],
        )?;
        self.execute("DELETE FROM data_properties WHERE subject=?1", params![iri])?;
        Ok(())
    }

    fn individual_exists(&mut self, individual: &Iri) -> Result<bool> {
        self.conn
            .prepare_cached("SELECT 1 FROM individuals WHERE iri=?1")
            .and_then(|mut stmt| {
                stmt.query_row(params![individual.as_str()], |_| Ok(()))
                    .optional()
            })
            .map(|found| found.is_some())
            .map_err(|e| SpatioGraphError::query(e.to_string()))
    }

    fn write_object_property(&mut self, subject: &Iri, property: &Iri, object: &Iri) -> Result<()> {
        self.ensure_writable()?;
        self.faults.check(FaultPoint::WriteObjectProperty)?;
        self.execute(
            "INSERT OR IGNORE INTO object_properties(subject, property, object) VALUES(?1, ?2, ?3)",
            params![subject.as_str(), property.as_str(), object.as_str()],
        )?;
        self.execute(
            "INSERT OR IGNORE INTO object_properties(subject, property, object)
             SELECT ?3, inverse, ?1 FROM inverse_properties WHERE property=?2",
            params![subject.as_str(), property.as_str(), object.as_str()],
        )?;
        Ok(())
    }

    fn remove_object_property(
        &mut self,
        subject: &Iri,
        property: &Iri,
        object: Option<&Iri>,
    ) -> Result<()> {
        self.ensure_writable()?;
        self.faults.check(FaultPoint::RemoveObjectProperty)?;
        let affected = match object {
            Some(object) => {
                self.execute(
                    "DELETE FROM object_properties
                     WHERE subject=?3 AND object=?1
                       AND property IN (SELECT inverse FROM inverse_properties WHERE property=?2)",
                    params![subject.as_str(), property.as_str(), object.as_str()],
                )?;
                self.execute(
                    "DELETE FROM object_properties WHERE subject=?1 AND property=?2 AND object=?3",
                    params![subject.as_str(), property.as_str(), object.as_str()],
                )?
            }
            None => {
                self.execute(
                    "DELETE FROM object_properties
                     WHERE object=?1
                       AND property IN (SELECT inverse FROM inverse_properties WHERE property=?2)
                       AND subject IN (SELECT object FROM object_properties WHERE subject=?1 AND property=?2)",
                    params![subject.as_str(), property.as_str()],
                )?;
                self.execute(
                    "DELETE FROM object_properties WHERE subject=?1 AND property=?2",
                    params![subject.as_str(), property.as_str()],
                )?
            }
        };
        if affected == 0 {
            return Err(SpatioGraphError::not_found(format!(
                "object property {property} on {subject}"
            )));
        }
        Ok(())
    }

    fn write_data_property(&mut self, subject: &Iri, property: &Iri, value: &Literal) -> Result<()> {
        self.ensure_writable()?;
        self.faults.check(FaultPoint::WriteDataProperty)?;
        self.execute(
            "INSERT OR REPLACE INTO data_properties(subject, property, value, datatype)
             VALUES(?1, ?2, ?3, ?4)",
            params![
                subject.as_str(),
                property.as_str(),
                value.lexical(),
                value.datatype().as_str(),
            ],
        )?;
        Ok(())
    }

    fn remove_data_property(
        &mut self,
        subject: &Iri,
        property: &Iri,
        value: Option<&Literal>,
    ) -> Result<()> {
        self.ensure_writable()?;
        self.faults.check(FaultPoint::RemoveDataProperty)?;
        let affected = match value {
            Some(value) => self.execute(
                "DELETE FROM data_properties WHERE subject=?1 AND property=?2 AND value=?3",
                params![subject.as_str(), property.as_str(), value.lexical()],
            )?,
            None => self.execute(
                "DELETE FROM data_properties WHERE subject=?1 AND property=?2",
                params![subject.as_str(), property.as_str()],
            )?,
        };
        if affected == 0 {
            return Err(SpatioGraphError::not_found(format!(
                "data property {property} on {subject}"
            )));
        }
        Ok(())
    }

    fn get_object_property_values(&mut self, subject: &Iri, property: &Iri) -> Result<Vec<Iri>> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT object FROM object_properties WHERE subject=?1 AND property=?2 ORDER BY object",
            )
            .map_err(|e| SpatioGraphError::query(e.to_string()))?;
        let rows = stmt
            .query_map(params![subject.as_str(), property.as_str()], |row| {
                row.get::<_, String>(0)
            })
            .map_err(|e| SpatioGraphError::query(e.to_string()))?;
        let mut values = Vec::new();
        for row in rows {
            values.push(Iri::from_absolute(
                row.map_err(|e| SpatioGraphError::query(e.to_string()))?,
            ));
        }
        Ok(values)
    }

    fn get_data_property_value(&mut self, subject: &Iri, property: &Iri) -> Result<Option<Literal>> {
        let found = self
            .conn
            .prepare_cached(
                "SELECT value, datatype FROM data_properties WHERE subject=?1 AND property=?2",
            )
            .and_then(|mut stmt| {
                stmt.query_row(params![subject.as_str(), property.as_str()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .optional()
            })
            .map_err(|e| SpatioGraphError::query(e.to_string()))?;
        match found {
            Some((value, datatype)) => Ok(Some(Literal::new(value, Datatype::parse(&datatype)?))),
            None => Ok(None),
        }
    }

    fn get_instances(
        &mut self,
        class: &Iri,
        visit: &mut dyn FnMut(Iri) -> Result<()>,
    ) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT individual FROM class_assertions WHERE class=?1 ORDER BY individual",
            )
            .map_err(|e| SpatioGraphError::query(e.to_string()))?;
        let mut rows = stmt
            .query(params![class.as_str()])
            .map_err(|e| SpatioGraphError::query(e.to_string()))?;
        while let Some(row) = rows
            .next()
            .map_err(|e| SpatioGraphError::query(e.to_string()))?
        {
            let iri: String = row
                .get(0)
                .map_err(|e| SpatioGraphError::query(e.to_string()))?;
            visit(Iri::from_absolute(iri))?;
        }
        Ok(())
    }

    fn execute_query(
        &mut self,
        query: &str,
        visit: &mut dyn FnMut(ResultRow) -> Result<()>,
    ) -> Result<()> {
        self.faults.check(FaultPoint::ExecuteQuery)?;
        tracing::trace!(transaction = self.id, %query, "executing query");
        let mut stmt = self
            .conn
            .prepare(query)
            .map_err(|e| SpatioGraphError::query(e.to_string()))?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt
            .query([])
            .map_err(|e| SpatioGraphError::query(e.to_string()))?;
        while let Some(row) = rows
            .next()
            .map_err(|e| SpatioGraphError::query(e.to_string()))?
        {
            let mut bindings = Vec::with_capacity(names.len());
            for (idx, name) in names.iter().enumerate() {
                let value = match row
                    .get_ref(idx)
                    .map_err(|e| SpatioGraphError::query(e.to_string()))?
                {
                    ValueRef::Null => None,
                    ValueRef::Integer(i) => Some(i.to_string()),
                    ValueRef::Real(f) => Some(f.to_string()),
                    ValueRef::Text(text) => Some(String::from_utf8_lossy(text).into_owned()),
                    ValueRef::Blob(_) => {
                        return Err(SpatioGraphError::query(format!(
                            "binding {name} is a blob"
                        )));
                    }
                };
                bindings.push((name.clone(), value));
            }
            visit(ResultRow::new(bindings))?;
        }
        Ok(())
    }

    fn declare_inverse(&mut self, property: &Iri, inverse: &Iri) -> Result<()> {
        self.ensure_writable()?;
        self.execute(
            "INSERT OR IGNORE INTO inverse_properties(property, inverse) VALUES(?1, ?2), (?2, ?1)",
            params![property.as_str(), inverse.as_str()],
        )?;
        Ok(())
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.conn.execute("ROLLBACK", []);
            tracing::debug!(transaction = self.id, "rolled back unfinished transaction");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iri(local: &str) -> Iri {
        Iri::new("urn:test#", local)
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let store = SqliteStore::open_in_memory().expect("store");
        {
            let mut txn = store.open_transaction(true).expect("txn");
            txn.create_individual(&iri("Thing"), &iri("a")).expect("create");
        }
        let mut txn = store.open_transaction(false).expect("txn");
        assert!(!txn.individual_exists(&iri("a")).expect("exists"));
    }

    #[test]
    fn read_only_transaction_rejects_writes() {
        let store = SqliteStore::open_in_memory().expect("store");
        let mut txn = store.open_transaction(false).expect("txn");
        let err = txn
            .create_individual(&iri("Thing"), &iri("a"))
            .unwrap_err();
        assert!(matches!(err, SpatioGraphError::TransactionError(_)));
    }

    #[test]
    fn inverse_properties_follow_writes_and_removals() {
        let store = SqliteStore::open_in_memory().expect("store");
        let mut txn = store.open_transaction(true).expect("txn");
        txn.declare_inverse(&iri("to"), &iri("by")).expect("declare");
        txn.write_object_property(&iri("r"), &iri("to"), &iri("c"))
            .expect("write");
        assert_eq!(
            txn.get_object_property_values(&iri("c"), &iri("by")).expect("values"),
            vec![iri("r")]
        );
        txn.remove_object_property(&iri("r"), &iri("to"), None)
            .expect("remove");
        assert!(
            txn.get_object_property_values(&iri("c"), &iri("by"))
                .expect("values")
                .is_empty()
        );
        txn.commit().expect("commit");
    }

    #[test]
    fn data_properties_are_single_valued() {
        let store = SqliteStore::open_in_memory().expect("store");
        let mut txn = store.open_transaction(true).expect("txn");
        txn.write_data_property(&iri("r"), &iri("strength"), &Literal::double(0.3))
            .expect("write");
        txn.write_data_property(&iri("r"), &iri("strength"), &Literal::double(0.9))
            .expect("overwrite");
        let value = txn
            .get_data_property_value(&iri("r"), &iri("strength"))
            .expect("read")
            .expect("present");
        assert_eq!(value.as_f64().expect("double"), 0.9);
        txn.commit().expect("commit");
    }

    #[test]
    fn removing_missing_property_is_not_found() {
        let store = SqliteStore::open_in_memory().expect("store");
        let mut txn = store.open_transaction(true).expect("txn");
        let err = txn
            .remove_object_property(&iri("r"), &iri("to"), Some(&iri("c")))
            .unwrap_err();
        assert!(matches!(err, SpatioGraphError::NotFound(_)));
        let err = txn.remove_individual(&iri("r")).unwrap_err();
        assert!(matches!(err, SpatioGraphError::NotFound(_)));
    }

    #[test]
    fn rollback_only_commit_fails() {
        let store = SqliteStore::open_in_memory().expect("store");
        let mut txn = store.open_transaction(true).expect("txn");
        txn.create_individual(&iri("Thing"), &iri("a")).expect("create");
        txn.mark_rollback_only();
        assert!(txn.commit().is_err());
        let mut txn = store.open_transaction(false).expect("txn");
        assert!(!txn.individual_exists(&iri("a")).expect("exists"));
    }

    #[test]
    fn file_databases_use_write_ahead_log() {
        let dir = tempfile::tempdir().expect("dir");
        let store = SqliteStore::open(dir.path().join("graph.db"), &StoreConfig::default())
            .expect("store");
        let conn = store.conn.lock();
        assert!(!is_in_memory_connection(&conn));
        let mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("journal mode");
        assert_eq!(mode, "wal");
    }

    #[test]
    fn configured_pragmas_may_return_rows() {
        let mut cfg = StoreConfig::default();
        cfg.pragma_settings
            .insert("journal_mode".to_string(), "MEMORY".to_string());
        cfg.pragma_settings
            .insert("cache_size".to_string(), "-2000".to_string());
        let store = SqliteStore::open_in_memory_with(&cfg).expect("store");
        assert!(is_in_memory_connection(&store.conn.lock()));

        cfg.pragma_settings
            .insert("cache_size".to_string(), "(".to_string());
        assert!(matches!(
            SqliteStore::open_in_memory_with(&cfg),
            Err(SpatioGraphError::ConnectionError(_))
        ));
    }
}
