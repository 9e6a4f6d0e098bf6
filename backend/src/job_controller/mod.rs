pub mod archive;
pub mod pipeline;
pub mod state;

use crate::job_controller::pipeline::ArchiveBuilder;
use crate::job_controller::state::{InFlight, JobsState};
use crate::store::JobStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Spawns the job updater and the archive dispatcher on the current runtime
/// and returns the handle the HTTP layer submits through.
pub fn start(
    jobs: Arc<dyn JobStore>,
    builder: Arc<ArchiveBuilder>,
    zips_dir: PathBuf,
    max_concurrent_jobs: usize,
    queue_capacity: usize,
) -> JobsState {
    let (tx, rx) = mpsc::channel(queue_capacity);
    let (queue, queue_rx) = mpsc::channel(queue_capacity);
    let in_flight = InFlight::default();

    tokio::spawn(state::start_job_updater(jobs.clone(), rx));
    tokio::spawn(pipeline::start_dispatcher(
        queue_rx,
        builder,
        in_flight,
        tx,
        max_concurrent_jobs,
    ));

    JobsState {
        jobs,
        queue,
        zips_dir,
    }
}
