//! # Archive job pipeline
//!
//! ## Workflow:
//!
//! 1.  **Submission**: `submit` validates the requested file type and contract
//!     ids, reserves a slot on the bounded queue, records a `PENDING` job with
//!     a unique archive path and pushes its `ArchiveTask` into the slot. The
//!     caller gets the job id back immediately and polls `list_jobs`. When the
//!     queue is full the submission is refused with `JobQueueFull` and no job
//!     is recorded.
//!
//! 2.  **Dispatch**: `start_dispatcher` drains the queue. Each task runs on the
//!     blocking pool through `tokio::task::spawn_blocking`, with at most
//!     `max_concurrent_jobs` tasks in progress. A task whose job is already
//!     being built is dropped.
//!
//! 3.  **Build**: `ArchiveBuilder::build` walks the contract ids in order,
//!     checks each contract exists and is accessible, materializes a fresh
//!     `.docx`/`.pdf` pair from the stored field values and zips the requested
//!     members. Any error fails the whole job and removes what it produced.
//!
//! 4.  **Outcome**: the worker reports `Finished { hash }` or `Failed(reason)`
//!     to the job updater in `state`, which writes it to the store.
//!
//! 5.  **Retrieval**: `retrieve` exchanges the hash for the archive bytes
//!     exactly once.

use crate::auth::{can_access_contract, Caller};
use crate::error::{ServiceError, ServiceResult};
use crate::job_controller::archive::write_archive;
use crate::job_controller::state::{InFlight, JobOutcome, JobUpdate, JobsState};
use crate::materializer::{read_file, MaterializedFiles, Materializer};
use crate::store::{ContractStore, JobStore, TemplateRegistry};
use actix_web::web;
use common::jobs::{FileType, JobSummary};
use md5::Context;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

/// File name offered to clients for every archive.
pub const ARCHIVE_DOWNLOAD_NAME: &str = "contracts.zip";

/// Reason recorded on jobs a previous process left unfinished.
pub const INTERRUPTED_REASON: &str = "interrupted by restart";

/// One queued archive build.
#[derive(Debug, Clone)]
pub struct ArchiveTask {
    pub job_id: i64,
    pub caller: Caller,
    pub contract_ids: Vec<i64>,
    pub file_type: FileType,
    pub archive_path: PathBuf,
}

/// Creates a job for `contract_ids` and queues it.
///
/// The file type and the queue capacity are checked before anything is
/// written, so neither an unsupported type nor a full queue leaves a job row
/// behind. Never waits for queue space.
pub async fn submit(
    state: &JobsState,
    caller: Caller,
    contract_ids: Vec<i64>,
    file_type: &str,
) -> ServiceResult<JobSummary> {
    let file_type: FileType = file_type
        .parse()
        .map_err(|_| ServiceError::InvalidFileType(file_type.to_string()))?;
    if contract_ids.is_empty() {
        return Err(ServiceError::Validation("contract_ids must not be empty".into()));
    }

    let slot = state.queue.try_reserve().map_err(|e| match e {
        TrySendError::Full(()) => ServiceError::JobQueueFull,
        TrySendError::Closed(()) => ServiceError::Internal("job queue is closed".into()),
    })?;

    let archive_path = state.zips_dir.join(format!("{}.zip", Uuid::new_v4()));
    let jobs = state.jobs.clone();
    let job = {
        let archive_path = archive_path.clone();
        let contract_ids = contract_ids.clone();
        web::block(move || jobs.create(file_type, &archive_path, &contract_ids, caller.user_id))
            .await??
    };
    log::info!(
        "Job {} queued by user {}: {} contracts as {}",
        job.id,
        caller.user_id,
        contract_ids.len(),
        file_type
    );

    slot.send(ArchiveTask {
        job_id: job.id,
        caller,
        contract_ids,
        file_type,
        archive_path,
    });

    Ok(job.to_summary())
}

/// Exchanges a finished job's hash for its archive. The first successful
/// call consumes the job; every later one is `JobNotFound`.
pub async fn retrieve(state: &JobsState, hash: String) -> ServiceResult<(Vec<u8>, &'static str)> {
    let jobs = state.jobs.clone();
    let bytes = web::block(move || -> ServiceResult<Vec<u8>> {
        let job = jobs.find_by_hash(&hash)?.ok_or(ServiceError::JobNotFound)?;
        let bytes = read_file(&job.archive_path)?;
        if !jobs.tombstone_by_hash(&hash)? {
            return Err(ServiceError::JobNotFound);
        }
        if let Err(e) = fs::remove_file(&job.archive_path) {
            log::warn!("Could not remove consumed archive {}: {}", job.archive_path.display(), e);
        }
        log::info!("Job {} archive retrieved", job.id);
        Ok(bytes)
    })
    .await??;
    Ok((bytes, ARCHIVE_DOWNLOAD_NAME))
}

/// The caller's jobs, newest first.
pub async fn list_jobs(state: &JobsState, caller: Caller) -> ServiceResult<Vec<JobSummary>> {
    let jobs = state.jobs.clone();
    let records = web::block(move || jobs.find_all_by_creator(caller.user_id)).await??;
    Ok(records.iter().map(|j| j.to_summary()).collect())
}

/// Marks jobs left `PENDING` by a previous process as failed.
pub fn fail_interrupted_jobs(jobs: &dyn JobStore) -> ServiceResult<usize> {
    let failed = jobs.fail_pending(INTERRUPTED_REASON)?;
    if failed > 0 {
        log::warn!("Marked {} interrupted jobs as failed", failed);
    }
    Ok(failed)
}

/// Runs queued tasks on the blocking pool until the queue closes.
pub async fn start_dispatcher(
    mut rx: mpsc::Receiver<ArchiveTask>,
    builder: Arc<ArchiveBuilder>,
    in_flight: InFlight,
    tx: mpsc::Sender<JobUpdate>,
    max_concurrent_jobs: usize,
) {
    let permits = Arc::new(Semaphore::new(max_concurrent_jobs));
    while let Some(task) = rx.recv().await {
        let Some(guard) = in_flight.claim(task.job_id) else {
            log::warn!("Job {} is already being built, dropping duplicate task", task.job_id);
            continue;
        };
        let permit = match permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        let builder = builder.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let job_id = task.job_id;
            let handle = tokio::task::spawn_blocking(move || {
                let _guard = guard;
                builder.build(&task)
            });

            let outcome = match handle.await {
                Ok(Ok(hash)) => {
                    log::info!("Job {} finished", job_id);
                    JobOutcome::Finished { hash }
                }
                Ok(Err(e)) => {
                    log::warn!("Job {} failed: {}", job_id, e);
                    JobOutcome::Failed(e.to_string())
                }
                Err(e) => {
                    log::error!("Job {} worker join error: {}", job_id, e);
                    JobOutcome::Failed(format!("Task join error: {}", e))
                }
            };
            drop(permit);

            if tx.send(JobUpdate { job_id, outcome }).await.is_err() {
                log::error!("Job updater is gone, outcome of job {} lost", job_id);
            }
        });
    }
}

/// Builds the archive of one task. Synchronous; run it on a blocking thread.
pub struct ArchiveBuilder {
    templates: Arc<dyn TemplateRegistry>,
    contracts: Arc<dyn ContractStore>,
    materializer: Arc<Materializer>,
}

impl ArchiveBuilder {
    pub fn new(
        templates: Arc<dyn TemplateRegistry>,
        contracts: Arc<dyn ContractStore>,
        materializer: Arc<Materializer>,
    ) -> ArchiveBuilder {
        ArchiveBuilder {
            templates,
            contracts,
            materializer,
        }
    }

    /// Returns the retrieval hash of the written archive.
    pub fn build(&self, task: &ArchiveTask) -> ServiceResult<String> {
        let mut produced = Vec::new();
        let result = self
            .materialize_members(task, &mut produced)
            .and_then(|(members, materialized)| {
                write_archive(&task.archive_path, &members)?;
                let paths: Vec<(i64, &Path, Option<&Path>)> = materialized
                    .iter()
                    .map(|(id, files)| (*id, files.docx_path.as_path(), files.pdf_path.as_deref()))
                    .collect();
                // all or nothing: the files are removed below if this fails
                self.contracts.set_paths_many(&paths)
            });

        if let Err(e) = result {
            remove_quietly(&produced);
            remove_quietly(std::slice::from_ref(&task.archive_path));
            return Err(e);
        }
        Ok(archive_hash(task.job_id, &task.archive_path))
    }

    /// Archive members in contract order, plus the files behind each.
    fn materialize_members(
        &self,
        task: &ArchiveTask,
        produced: &mut Vec<PathBuf>,
    ) -> ServiceResult<(Vec<PathBuf>, Vec<(i64, MaterializedFiles)>)> {
        let mut members = Vec::with_capacity(task.contract_ids.len());
        let mut materialized = Vec::with_capacity(task.contract_ids.len());

        for &contract_id in &task.contract_ids {
            let contract = self
                .contracts
                .get_by_id(contract_id)?
                .ok_or(ServiceError::ContractNotFound(contract_id))?;
            self.templates
                .get_by_id(contract.template_id)?
                .ok_or(ServiceError::TemplateNotFound(contract.template_id))?;
            if !can_access_contract(&task.caller, &contract) {
                return Err(ServiceError::AccessDenied);
            }

            let values = self.contracts.find_field_values(contract_id)?;
            let files = self.materializer.materialize(contract.template_id, &values)?;
            produced.push(files.docx_path.clone());
            produced.extend(files.pdf_path.clone());

            let member = match task.file_type {
                FileType::Docx => files.docx_path.clone(),
                FileType::Pdf => files.pdf_path.clone().ok_or_else(|| {
                    ServiceError::FileNotFound(format!("PDF of contract {}", contract_id))
                })?,
            };
            members.push(member);
            materialized.push((contract_id, files));
        }

        Ok((members, materialized))
    }
}

fn remove_quietly(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Could not remove {}: {}", path.display(), e);
            }
        }
    }
}

/// Unguessable single-use token for a finished archive.
fn archive_hash(job_id: i64, archive_path: &Path) -> String {
    let mut ctx = Context::new();
    ctx.consume(job_id.to_string());
    ctx.consume(archive_path.to_string_lossy().as_bytes());
    ctx.consume(Uuid::new_v4().as_bytes());
    format!("{:x}", ctx.finalize())
}
