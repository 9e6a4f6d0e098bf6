//! # Persistence seams
//!
//! The engine and the job pipeline only talk to these traits. `sqlite`
//! provides the single production implementation; every trait object is
//! shared between actix workers and blocking threads, hence `Send + Sync`.
//!
//! Deletion is always a tombstone: rows keep existing with `deleted = 1` and
//! stop being returned by lookups.

pub mod sqlite;

use crate::error::ServiceResult;
use common::jobs::{FileType, JobStatus, JobSummary};
use common::model::contract::Contract;
use common::model::field::{Field, FieldType};
use common::model::template::Template;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub use sqlite::SqliteStore;

#[derive(Clone, Debug)]
pub struct TemplateRecord {
    pub id: i64,
    pub name: String,
    pub file_path: PathBuf,
    /// md5 of the uploaded bytes, lowercase hex.
    pub checksum: String,
    pub fields: Vec<Field>,
}

impl TemplateRecord {
    pub fn to_model(&self) -> Template {
        Template {
            id: self.id,
            name: self.name.clone(),
            fields: self.fields.clone(),
        }
    }

    pub fn has_field(&self, field_id: i64) -> bool {
        self.fields.iter().any(|f| f.id == field_id)
    }
}

#[derive(Clone, Debug)]
pub struct ContractRecord {
    pub id: i64,
    pub template_id: i64,
    pub template_name: String,
    pub client_passport: Option<String>,
    pub docx_path: Option<PathBuf>,
    pub pdf_path: Option<PathBuf>,
    pub created_by: i64,
    pub allowed_users: Vec<i64>,
}

impl ContractRecord {
    pub fn to_model(&self) -> Contract {
        Contract {
            contract_id: self.id,
            template_id: self.template_id,
            template_name: self.template_name.clone(),
            client_passport: self.client_passport.clone(),
            has_docx: self.docx_path.is_some(),
            has_pdf: self.pdf_path.is_some(),
            created_by: self.created_by,
        }
    }
}

#[derive(Clone, Debug)]
pub struct JobRecord {
    pub id: i64,
    pub file_type: FileType,
    pub status: JobStatus,
    pub archive_path: PathBuf,
    pub hash: Option<String>,
    pub contract_ids: Vec<i64>,
    pub created_by: i64,
    pub error: Option<String>,
    pub created_at: String,
}

impl JobRecord {
    pub fn to_summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            file_type: self.file_type,
            status: self.status,
            hash: match self.status {
                JobStatus::Finished => self.hash.clone(),
                _ => None,
            },
            contract_ids: self.contract_ids.clone(),
            error: self.error.clone(),
            created_at: self.created_at.clone(),
        }
    }
}

pub trait TemplateRegistry: Send + Sync {
    fn get_by_id(&self, id: i64) -> ServiceResult<Option<TemplateRecord>>;

    fn save(&self, name: &str, file_path: &Path, checksum: &str, field_ids: &[i64])
        -> ServiceResult<i64>;

    /// Swaps in a new file and field list. `TemplateNotFound` if absent.
    fn replace(&self, id: i64, file_path: &Path, checksum: &str, field_ids: &[i64])
        -> ServiceResult<()>;

    fn list(&self) -> ServiceResult<Vec<TemplateRecord>>;

    fn tombstone(&self, id: i64) -> ServiceResult<()>;

    /// Puts `new_field` at the position `old_field` held in the template.
    fn replace_field(&self, template_id: i64, old_field: i64, new_field: i64)
        -> ServiceResult<()>;
}

pub trait FieldRegistry: Send + Sync {
    fn find_by_name(&self, name: &str) -> ServiceResult<Option<Field>>;

    fn find_by_id(&self, id: i64) -> ServiceResult<Option<Field>>;

    /// Returns the live field called `name`, creating it when missing.
    /// Safe against a concurrent upsert of the same name.
    fn upsert(&self, name: &str, field_type: FieldType) -> ServiceResult<Field>;

    /// Like `upsert` but a live field of that name is `FieldExists`.
    fn create(&self, name: &str, field_type: FieldType) -> ServiceResult<Field>;

    fn list(&self) -> ServiceResult<Vec<Field>>;

    fn tombstone(&self, id: i64) -> ServiceResult<()>;
}

pub trait ContractStore: Send + Sync {
    fn get_by_id(&self, id: i64) -> ServiceResult<Option<ContractRecord>>;

    fn create(&self, template_id: i64, client_passport: Option<&str>, created_by: i64)
        -> ServiceResult<i64>;

    fn set_paths(&self, id: i64, docx_path: &Path, pdf_path: Option<&Path>) -> ServiceResult<()>;

    /// `set_paths` for several contracts in one transaction. When any of them
    /// is missing nothing is updated and the error names that contract.
    fn set_paths_many(&self, paths: &[(i64, &Path, Option<&Path>)]) -> ServiceResult<()>;

    /// Stores `(field_id, value)` pairs; a second value for the same field
    /// overwrites the first.
    fn save_field_values(&self, id: i64, values: &[(i64, String)]) -> ServiceResult<()>;

    /// Field name to value, for fields that are still live.
    fn find_field_values(&self, id: i64) -> ServiceResult<HashMap<String, String>>;

    fn list_by_creator(&self, user_id: i64) -> ServiceResult<Vec<ContractRecord>>;

    fn list_by_client(&self, client_passport: &str) -> ServiceResult<Vec<ContractRecord>>;

    fn list(&self) -> ServiceResult<Vec<ContractRecord>>;

    fn grant_access(&self, id: i64, user_id: i64) -> ServiceResult<()>;
}

pub trait JobStore: Send + Sync {
    fn create(
        &self,
        file_type: FileType,
        archive_path: &Path,
        contract_ids: &[i64],
        created_by: i64,
    ) -> ServiceResult<JobRecord>;

    /// Moves a `Pending` job to a terminal status. Returns `false` when the
    /// job was not pending any more, leaving it unchanged.
    fn update_status(
        &self,
        id: i64,
        status: JobStatus,
        hash: Option<&str>,
        error: Option<&str>,
    ) -> ServiceResult<bool>;

    fn find_by_id(&self, id: i64) -> ServiceResult<Option<JobRecord>>;

    /// A finished, not yet consumed job.
    fn find_by_hash(&self, hash: &str) -> ServiceResult<Option<JobRecord>>;

    /// Newest first.
    fn find_all_by_creator(&self, user_id: i64) -> ServiceResult<Vec<JobRecord>>;

    /// Consumes the job behind `hash`. Only one caller ever gets `true`.
    fn tombstone_by_hash(&self, hash: &str) -> ServiceResult<bool>;

    /// Fails every pending job; used when a previous process died mid-job.
    fn fail_pending(&self, reason: &str) -> ServiceResult<usize>;
}
