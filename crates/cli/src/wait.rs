//! Caller-side polling for async jobs.
//!
//! [`metadata::Job::poll`] queries the remote status exactly once; the loop
//! and its cadence live here so the domain crate never sleeps.

use anyhow::{bail, Result};
use metadata::{Job, PollOutcome};
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::config::PollingConfig;

/// Polls a `Tracking` job until it completes, fails, or `polling.timeout`
/// elapses.
///
/// Returns immediately for a job that is already terminal. A remote failure
/// is returned as the job's own error; the job is left `Failed`.
pub async fn wait_for_completion(job: &mut Job, polling: &PollingConfig) -> Result<()> {
    if job.is_terminal() {
        return Ok(());
    }
    let deadline = Instant::now() + polling.timeout();
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match job.poll().await? {
            PollOutcome::Completed => {
                info!(job_id = %job.id(), attempts, "Async job finished");
                return Ok(());
            }
            PollOutcome::InProgress(status) => {
                debug!(job_id = %job.id(), attempts, state = ?status.state, "Still waiting");
            }
        }
        if Instant::now() + polling.interval() > deadline {
            bail!(
                "job {} did not finish within {:?} ({attempts} polls)",
                job.id(),
                polling.timeout()
            );
        }
        sleep(polling.interval()).await;
    }
}
