//! Shared state of the archive jobs and the task that records their outcome.
//!
//! The main components are:
//! - `JobsState`: a clonable handle injected into the Actix application as
//!   `web::Data`. It reaches the job store and the archive queue feeding the
//!   worker pool.
//! - `JobUpdate`: the message a worker sends once a job has finished or failed.
//! - `start_job_updater`: a long-running task that receives `JobUpdate`s and
//!   writes them to the job store. It is the only writer of job statuses, so
//!   a job leaves `PENDING` exactly once.
//! - `InFlight`: the set of job ids currently being built. A task for a job
//!   that is already in flight is dropped.

use crate::job_controller::pipeline::ArchiveTask;
use crate::store::JobStore;
use common::jobs::JobStatus;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A thread-safe, shareable handle to the job system.
#[derive(Clone)]
pub struct JobsState {
    /// Durable record of every job; the single source of truth for statuses.
    pub jobs: Arc<dyn JobStore>,

    /// Bounded queue of archive tasks, drained by the dispatcher in
    /// `pipeline::start_dispatcher`. Submissions never wait on it: a full
    /// queue is `JobQueueFull`.
    pub queue: mpsc::Sender<ArchiveTask>,

    /// Directory every job archive is written to.
    pub zips_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Finished { hash: String },
    Failed(String),
}

/// Terminal status report for one job.
#[derive(Debug)]
pub struct JobUpdate {
    pub(crate) job_id: i64,
    pub(crate) outcome: JobOutcome,
}

/// Applies `JobUpdate`s to the store until every sender is gone.
///
/// Store calls are blocking, so each one runs on the blocking pool. An update
/// for a job that already left `PENDING` is ignored by the store and logged
/// here.
pub async fn start_job_updater(jobs: Arc<dyn JobStore>, mut rx: mpsc::Receiver<JobUpdate>) {
    while let Some(update) = rx.recv().await {
        let jobs = jobs.clone();
        let job_id = update.job_id;
        let result = tokio::task::spawn_blocking(move || match &update.outcome {
            JobOutcome::Finished { hash } => {
                jobs.update_status(job_id, JobStatus::Finished, Some(hash.as_str()), None)
            }
            JobOutcome::Failed(reason) => {
                jobs.update_status(job_id, JobStatus::Failed, None, Some(reason.as_str()))
            }
        })
        .await;

        match result {
            Ok(Ok(true)) => log::debug!("Job {} status recorded", job_id),
            Ok(Ok(false)) => log::warn!("Job {} was no longer pending, update ignored", job_id),
            Ok(Err(e)) => log::error!("Failed to record status of job {}: {}", job_id, e),
            Err(e) => log::error!("Job updater task join error for job {}: {}", job_id, e),
        }
    }
}

/// Job ids that a worker is currently building.
#[derive(Clone, Default)]
pub struct InFlight(Arc<Mutex<HashSet<i64>>>);

impl InFlight {
    /// Claims `job_id`; `None` if another worker already holds it. The claim
    /// is released when the guard drops.
    pub fn claim(&self, job_id: i64) -> Option<InFlightGuard> {
        let mut ids = self.0.lock().unwrap_or_else(|e| e.into_inner());
        if ids.insert(job_id) {
            Some(InFlightGuard {
                set: self.clone(),
                job_id,
            })
        } else {
            None
        }
    }
}

pub struct InFlightGuard {
    set: InFlight,
    job_id: i64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set
            .0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.job_id);
    }
}
