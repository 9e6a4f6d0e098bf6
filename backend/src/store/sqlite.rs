//! SQLite implementation of every store trait.
//!
//! A connection is opened per operation against the configured file; WAL
//! mode plus a busy timeout lets the HTTP workers, the archive workers and
//! the job updater share the database without a pool.

use super::{
    ContractRecord, ContractStore, FieldRegistry, JobRecord, JobStore, TemplateRecord,
    TemplateRegistry,
};
use crate::error::{ServiceError, ServiceResult};
use common::jobs::{FileType, JobStatus};
use common::model::field::{Field, FieldType};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS fields (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE,
    field_type  TEXT NOT NULL DEFAULT 'STRING',
    deleted     INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS templates (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    file_path   TEXT NOT NULL,
    checksum    TEXT NOT NULL,
    deleted     INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS template_fields (
    template_id INTEGER NOT NULL REFERENCES templates(id),
    field_id    INTEGER NOT NULL REFERENCES fields(id),
    position    INTEGER NOT NULL,
    PRIMARY KEY (template_id, field_id)
);
CREATE TABLE IF NOT EXISTS contracts (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    template_id     INTEGER NOT NULL REFERENCES templates(id),
    client_passport TEXT,
    docx_path       TEXT,
    pdf_path        TEXT,
    created_by      INTEGER NOT NULL,
    deleted         INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_contracts_created_by ON contracts (created_by);
CREATE INDEX IF NOT EXISTS idx_contracts_client ON contracts (client_passport);
CREATE TABLE IF NOT EXISTS contract_field_values (
    contract_id INTEGER NOT NULL REFERENCES contracts(id),
    field_id    INTEGER NOT NULL REFERENCES fields(id),
    value       TEXT NOT NULL,
    PRIMARY KEY (contract_id, field_id)
);
CREATE TABLE IF NOT EXISTS contract_allowed_users (
    contract_id INTEGER NOT NULL REFERENCES contracts(id),
    user_id     INTEGER NOT NULL,
    PRIMARY KEY (contract_id, user_id)
);
CREATE TABLE IF NOT EXISTS jobs (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    file_type    TEXT NOT NULL,
    status       TEXT NOT NULL DEFAULT 'PENDING',
    archive_path TEXT NOT NULL,
    hash         TEXT UNIQUE,
    created_by   INTEGER NOT NULL,
    error        TEXT,
    created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    deleted      INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_jobs_created_by ON jobs (created_by, deleted);
-- contract ids are kept for audit only, a job may name contracts that never existed
CREATE TABLE IF NOT EXISTS job_contracts (
    job_id      INTEGER NOT NULL REFERENCES jobs(id),
    position    INTEGER NOT NULL,
    contract_id INTEGER NOT NULL,
    PRIMARY KEY (job_id, position)
);
";

#[derive(Clone, Debug)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Opens (or creates) the database file and brings the schema up to date.
    pub fn open(path: impl Into<PathBuf>) -> ServiceResult<SqliteStore> {
        let store = SqliteStore { path: path.into() };
        let conn = store.connection()?;
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        log::debug!("SQLite journal mode for {}: {}", store.path.display(), mode);
        conn.execute_batch(SCHEMA)?;
        Ok(store)
    }

    fn connection(&self) -> ServiceResult<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }
}

fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn parse_column<T: FromStr<Err = String>>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn field_from_row(row: &Row) -> rusqlite::Result<Field> {
    Ok(Field {
        id: row.get(0)?,
        name: row.get(1)?,
        field_type: parse_column(row, 2)?,
    })
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

fn template_fields(conn: &Connection, template_id: i64) -> rusqlite::Result<Vec<Field>> {
    let mut stmt = conn.prepare(
        "SELECT f.id, f.name, f.field_type
         FROM template_fields tf JOIN fields f ON f.id = tf.field_id
         WHERE tf.template_id = ?1 AND f.deleted = 0
         ORDER BY tf.position",
    )?;
    let fields = stmt
        .query_map(params![template_id], field_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(fields)
}

fn insert_template_fields(conn: &Connection, template_id: i64, field_ids: &[i64]) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO template_fields (template_id, field_id, position) VALUES (?1, ?2, ?3)",
    )?;
    for (position, field_id) in field_ids.iter().enumerate() {
        stmt.execute(params![template_id, field_id, position as i64])?;
    }
    Ok(())
}

impl TemplateRegistry for SqliteStore {
    fn get_by_id(&self, id: i64) -> ServiceResult<Option<TemplateRecord>> {
        let conn = self.connection()?;
        let row = conn
            .query_row(
                "SELECT id, name, file_path, checksum FROM templates WHERE id = ?1 AND deleted = 0",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;
        match row {
            Some((id, name, file_path, checksum)) => Ok(Some(TemplateRecord {
                id,
                name,
                file_path: PathBuf::from(file_path),
                checksum,
                fields: template_fields(&conn, id)?,
            })),
            None => Ok(None),
        }
    }

    fn save(&self, name: &str, file_path: &Path, checksum: &str, field_ids: &[i64]) -> ServiceResult<i64> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO templates (name, file_path, checksum) VALUES (?1, ?2, ?3)",
            params![name, path_text(file_path), checksum],
        )?;
        let id = tx.last_insert_rowid();
        insert_template_fields(&tx, id, field_ids)?;
        tx.commit()?;
        Ok(id)
    }

    fn replace(&self, id: i64, file_path: &Path, checksum: &str, field_ids: &[i64]) -> ServiceResult<()> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let updated = tx.execute(
            "UPDATE templates SET file_path = ?2, checksum = ?3 WHERE id = ?1 AND deleted = 0",
            params![id, path_text(file_path), checksum],
        )?;
        if updated == 0 {
            return Err(ServiceError::TemplateNotFound(id));
        }
        tx.execute("DELETE FROM template_fields WHERE template_id = ?1", params![id])?;
        insert_template_fields(&tx, id, field_ids)?;
        tx.commit()?;
        Ok(())
    }

    fn list(&self) -> ServiceResult<Vec<TemplateRecord>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, file_path, checksum FROM templates WHERE deleted = 0 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(TemplateRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    file_path: PathBuf::from(row.get::<_, String>(2)?),
                    checksum: row.get(3)?,
                    fields: Vec::new(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|mut t| {
                t.fields = template_fields(&conn, t.id)?;
                Ok(t)
            })
            .collect()
    }

    fn tombstone(&self, id: i64) -> ServiceResult<()> {
        let conn = self.connection()?;
        let updated = conn.execute(
            "UPDATE templates SET deleted = 1 WHERE id = ?1 AND deleted = 0",
            params![id],
        )?;
        if updated == 0 {
            return Err(ServiceError::TemplateNotFound(id));
        }
        Ok(())
    }

    fn replace_field(&self, template_id: i64, old_field: i64, new_field: i64) -> ServiceResult<()> {
        let conn = self.connection()?;
        let updated = conn.execute(
            "UPDATE template_fields SET field_id = ?3 WHERE template_id = ?1 AND field_id = ?2",
            params![template_id, old_field, new_field],
        )?;
        if updated == 0 {
            return Err(ServiceError::FieldNotBelongToTemplate {
                field: old_field.to_string(),
                template_id,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

impl SqliteStore {
    fn live_field_by_name(conn: &Connection, name: &str) -> rusqlite::Result<Option<Field>> {
        conn.query_row(
            "SELECT id, name, field_type FROM fields WHERE name = ?1 AND deleted = 0",
            params![name],
            field_from_row,
        )
        .optional()
    }
}

impl FieldRegistry for SqliteStore {
    fn find_by_name(&self, name: &str) -> ServiceResult<Option<Field>> {
        let conn = self.connection()?;
        Ok(Self::live_field_by_name(&conn, name)?)
    }

    fn find_by_id(&self, id: i64) -> ServiceResult<Option<Field>> {
        let conn = self.connection()?;
        Ok(conn
            .query_row(
                "SELECT id, name, field_type FROM fields WHERE id = ?1 AND deleted = 0",
                params![id],
                field_from_row,
            )
            .optional()?)
    }

    fn upsert(&self, name: &str, field_type: FieldType) -> ServiceResult<Field> {
        let conn = self.connection()?;
        // a tombstoned field of the same name comes back to life
        conn.execute(
            "INSERT INTO fields (name, field_type) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET deleted = 0 WHERE fields.deleted = 1",
            params![name, field_type.as_str()],
        )?;
        Self::live_field_by_name(&conn, name)?
            .ok_or_else(|| ServiceError::FieldNotFound(name.to_string()))
    }

    fn create(&self, name: &str, field_type: FieldType) -> ServiceResult<Field> {
        let conn = self.connection()?;
        let inserted = conn.execute(
            "INSERT INTO fields (name, field_type) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET deleted = 0, field_type = excluded.field_type
             WHERE fields.deleted = 1",
            params![name, field_type.as_str()],
        )?;
        if inserted == 0 {
            return Err(ServiceError::FieldExists(name.to_string()));
        }
        Self::live_field_by_name(&conn, name)?
            .ok_or_else(|| ServiceError::FieldNotFound(name.to_string()))
    }

    fn list(&self) -> ServiceResult<Vec<Field>> {
        let conn = self.connection()?;
        let mut stmt =
            conn.prepare("SELECT id, name, field_type FROM fields WHERE deleted = 0 ORDER BY id")?;
        let fields = stmt
            .query_map([], field_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(fields)
    }

    fn tombstone(&self, id: i64) -> ServiceResult<()> {
        let conn = self.connection()?;
        let updated = conn.execute(
            "UPDATE fields SET deleted = 1 WHERE id = ?1 AND deleted = 0",
            params![id],
        )?;
        if updated == 0 {
            return Err(ServiceError::FieldNotFound(id.to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Contracts
// ---------------------------------------------------------------------------

const CONTRACT_COLUMNS: &str = "c.id, c.template_id, t.name, c.client_passport, c.docx_path, c.pdf_path, c.created_by
     FROM contracts c JOIN templates t ON t.id = c.template_id";

fn contract_from_row(row: &Row) -> rusqlite::Result<ContractRecord> {
    Ok(ContractRecord {
        id: row.get(0)?,
        template_id: row.get(1)?,
        template_name: row.get(2)?,
        client_passport: row.get(3)?,
        docx_path: row.get::<_, Option<String>>(4)?.map(PathBuf::from),
        pdf_path: row.get::<_, Option<String>>(5)?.map(PathBuf::from),
        created_by: row.get(6)?,
        allowed_users: Vec::new(),
    })
}

fn allowed_users(conn: &Connection, contract_id: i64) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM contract_allowed_users WHERE contract_id = ?1 ORDER BY user_id",
    )?;
    let users = stmt
        .query_map(params![contract_id], |row| row.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(users)
}

impl SqliteStore {
    fn contracts_where(&self, filter: &str, args: &[&dyn rusqlite::ToSql]) -> ServiceResult<Vec<ContractRecord>> {
        let conn = self.connection()?;
        let sql = format!(
            "SELECT {} WHERE c.deleted = 0 {} ORDER BY c.id DESC",
            CONTRACT_COLUMNS, filter
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(args, contract_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|mut c| {
                c.allowed_users = allowed_users(&conn, c.id)?;
                Ok(c)
            })
            .collect()
    }
}

impl ContractStore for SqliteStore {
    fn get_by_id(&self, id: i64) -> ServiceResult<Option<ContractRecord>> {
        Ok(self.contracts_where("AND c.id = ?1", &[&id])?.into_iter().next())
    }

    fn create(&self, template_id: i64, client_passport: Option<&str>, created_by: i64) -> ServiceResult<i64> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO contracts (template_id, client_passport, created_by) VALUES (?1, ?2, ?3)",
            params![template_id, client_passport, created_by],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn set_paths(&self, id: i64, docx_path: &Path, pdf_path: Option<&Path>) -> ServiceResult<()> {
        self.set_paths_many(&[(id, docx_path, pdf_path)])
    }

    fn set_paths_many(&self, paths: &[(i64, &Path, Option<&Path>)]) -> ServiceResult<()> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE contracts SET docx_path = ?2, pdf_path = ?3 WHERE id = ?1 AND deleted = 0",
            )?;
            for &(id, docx_path, pdf_path) in paths {
                let updated = stmt.execute(params![id, path_text(docx_path), pdf_path.map(path_text)])?;
                if updated == 0 {
                    return Err(ServiceError::ContractNotFound(id));
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn save_field_values(&self, id: i64, values: &[(i64, String)]) -> ServiceResult<()> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO contract_field_values (contract_id, field_id, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(contract_id, field_id) DO UPDATE SET value = excluded.value",
            )?;
            for (field_id, value) in values {
                stmt.execute(params![id, field_id, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn find_field_values(&self, id: i64) -> ServiceResult<HashMap<String, String>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT f.name, v.value
             FROM contract_field_values v JOIN fields f ON f.id = v.field_id
             WHERE v.contract_id = ?1 AND f.deleted = 0",
        )?;
        let values = stmt
            .query_map(params![id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<HashMap<String, String>, _>>()?;
        Ok(values)
    }

    fn list_by_creator(&self, user_id: i64) -> ServiceResult<Vec<ContractRecord>> {
        self.contracts_where("AND c.created_by = ?1", &[&user_id])
    }

    fn list_by_client(&self, client_passport: &str) -> ServiceResult<Vec<ContractRecord>> {
        self.contracts_where("AND c.client_passport = ?1", &[&client_passport])
    }

    fn list(&self) -> ServiceResult<Vec<ContractRecord>> {
        self.contracts_where("", &[])
    }

    fn grant_access(&self, id: i64, user_id: i64) -> ServiceResult<()> {
        let conn = self.connection()?;
        let exists: Option<i64> = conn
            .query_row(
                "SELECT id FROM contracts WHERE id = ?1 AND deleted = 0",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(ServiceError::ContractNotFound(id));
        }
        conn.execute(
            "INSERT OR IGNORE INTO contract_allowed_users (contract_id, user_id) VALUES (?1, ?2)",
            params![id, user_id],
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

const JOB_COLUMNS: &str =
    "id, file_type, status, archive_path, hash, created_by, error, created_at FROM jobs";

fn job_from_row(row: &Row) -> rusqlite::Result<JobRecord> {
    Ok(JobRecord {
        id: row.get(0)?,
        file_type: parse_column::<FileType>(row, 1)?,
        status: parse_column::<JobStatus>(row, 2)?,
        archive_path: PathBuf::from(row.get::<_, String>(3)?),
        hash: row.get(4)?,
        contract_ids: Vec::new(),
        created_by: row.get(5)?,
        error: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn job_contract_ids(conn: &Connection, job_id: i64) -> rusqlite::Result<Vec<i64>> {
    let mut stmt =
        conn.prepare("SELECT contract_id FROM job_contracts WHERE job_id = ?1 ORDER BY position")?;
    let ids = stmt
        .query_map(params![job_id], |row| row.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}

impl SqliteStore {
    fn jobs_where(&self, filter: &str, args: &[&dyn rusqlite::ToSql]) -> ServiceResult<Vec<JobRecord>> {
        let conn = self.connection()?;
        let sql = format!("SELECT {} WHERE {} ORDER BY id DESC", JOB_COLUMNS, filter);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(args, job_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|mut job| {
                job.contract_ids = job_contract_ids(&conn, job.id)?;
                Ok(job)
            })
            .collect()
    }
}

impl JobStore for SqliteStore {
    fn create(
        &self,
        file_type: FileType,
        archive_path: &Path,
        contract_ids: &[i64],
        created_by: i64,
    ) -> ServiceResult<JobRecord> {
        let id = {
            let mut conn = self.connection()?;
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO jobs (file_type, status, archive_path, created_by) VALUES (?1, ?2, ?3, ?4)",
                params![
                    file_type.as_str(),
                    JobStatus::Pending.as_str(),
                    path_text(archive_path),
                    created_by
                ],
            )?;
            let id = tx.last_insert_rowid();
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO job_contracts (job_id, position, contract_id) VALUES (?1, ?2, ?3)",
                )?;
                for (position, contract_id) in contract_ids.iter().enumerate() {
                    stmt.execute(params![id, position as i64, contract_id])?;
                }
            }
            tx.commit()?;
            id
        };
        JobStore::find_by_id(self, id)?
            .ok_or_else(|| ServiceError::Internal(format!("job {} vanished after insert", id)))
    }

    fn update_status(
        &self,
        id: i64,
        status: JobStatus,
        hash: Option<&str>,
        error: Option<&str>,
    ) -> ServiceResult<bool> {
        if !status.is_terminal() {
            return Err(ServiceError::Internal(format!(
                "job {} cannot move back to {}",
                id, status
            )));
        }
        let conn = self.connection()?;
        let updated = conn.execute(
            "UPDATE jobs SET status = ?2, hash = ?3, error = ?4 WHERE id = ?1 AND status = 'PENDING'",
            params![id, status.as_str(), hash, error],
        )?;
        Ok(updated == 1)
    }

    fn find_by_id(&self, id: i64) -> ServiceResult<Option<JobRecord>> {
        Ok(self.jobs_where("id = ?1", &[&id])?.into_iter().next())
    }

    fn find_by_hash(&self, hash: &str) -> ServiceResult<Option<JobRecord>> {
        Ok(self
            .jobs_where("hash = ?1 AND deleted = 0 AND status = 'FINISHED'", &[&hash])?
            .into_iter()
            .next())
    }

    fn find_all_by_creator(&self, user_id: i64) -> ServiceResult<Vec<JobRecord>> {
        self.jobs_where("created_by = ?1 AND deleted = 0", &[&user_id])
    }

    fn tombstone_by_hash(&self, hash: &str) -> ServiceResult<bool> {
        let conn = self.connection()?;
        let updated = conn.execute(
            "UPDATE jobs SET deleted = 1 WHERE hash = ?1 AND deleted = 0 AND status = 'FINISHED'",
            params![hash],
        )?;
        Ok(updated == 1)
    }

    fn fail_pending(&self, reason: &str) -> ServiceResult<usize> {
        let conn = self.connection()?;
        let updated = conn.execute(
            "UPDATE jobs SET status = 'FAILED', error = ?1 WHERE status = 'PENDING'",
            params![reason],
        )?;
        Ok(updated)
    }
}
