//! Historical Backfill Job
//!
//! Recomputes snapshots and net worth for every month from a user's earliest
//! transaction through the current month, off the request path. One job per
//! user at a time: start is a check-and-set under a single mutex, and callers
//! poll the state rather than blocking on the work.

use anyhow::Result;
use chrono::Local;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

use crate::db;
use crate::error::EngineError;
use crate::snapshots;
use crate::utils::YearMonth;

/// Job lifecycle: idle -> running -> {completed, failed}; terminal states
/// return to idle only via an explicit clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Pollable job state. Progress survives a failure so callers can see how
/// far the job got.
#[derive(Debug, Clone, Serialize)]
pub struct JobState {
    pub status: JobStatus,
    pub processed: usize,
    pub total: usize,
    pub error: Option<String>,
}

impl JobState {
    fn idle() -> Self {
        Self {
            status: JobStatus::Idle,
            processed: 0,
            total: 0,
            error: None,
        }
    }
}

type JobTable = Arc<Mutex<HashMap<i64, JobState>>>;

/// Owns the per-user job table and spawns backfill workers.
#[derive(Clone)]
pub struct BackfillCoordinator {
    db_path: PathBuf,
    jobs: JobTable,
}

impl BackfillCoordinator {
    pub fn new(db_path: PathBuf) -> Self {
        Self {
            db_path,
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start a backfill through the current month. Rejected with a conflict
    /// while a job for the same user is running; the running job's progress
    /// is left untouched.
    pub fn start(&self, user_id: i64) -> Result<()> {
        let end_month = YearMonth::from_date(Local::now().date_naive());
        self.start_through(user_id, end_month)
    }

    /// Start a backfill with an explicit final month.
    pub fn start_through(&self, user_id: i64, end_month: YearMonth) -> Result<()> {
        {
            let mut jobs = self.jobs.lock().expect("job table lock");
            let state = jobs.entry(user_id).or_insert_with(JobState::idle);
            if state.status == JobStatus::Running {
                return Err(EngineError::Conflict(format!(
                    "backfill already running for user {}",
                    user_id
                ))
                .into());
            }
            *state = JobState {
                status: JobStatus::Running,
                processed: 0,
                total: 0,
                error: None,
            };
        }

        let db_path = self.db_path.clone();
        let jobs = Arc::clone(&self.jobs);
        tokio::task::spawn_blocking(move || {
            run_backfill(db_path, user_id, end_month, jobs);
        });

        info!(user_id, "Backfill started");
        Ok(())
    }

    /// Current state for polling. Unknown users read as idle.
    pub fn status(&self, user_id: i64) -> JobState {
        self.jobs
            .lock()
            .expect("job table lock")
            .get(&user_id)
            .cloned()
            .unwrap_or_else(JobState::idle)
    }

    /// Reset a terminal job back to idle. Rejected while running.
    pub fn clear(&self, user_id: i64) -> Result<()> {
        let mut jobs = self.jobs.lock().expect("job table lock");
        if let Some(state) = jobs.get(&user_id) {
            if state.status == JobStatus::Running {
                return Err(EngineError::Conflict(format!(
                    "cannot clear a running backfill for user {}",
                    user_id
                ))
                .into());
            }
        }
        jobs.insert(user_id, JobState::idle());
        Ok(())
    }
}

fn set_state(jobs: &JobTable, user_id: i64, update: impl FnOnce(&mut JobState)) {
    let mut table = jobs.lock().expect("job table lock");
    let state = table.entry(user_id).or_insert_with(JobState::idle);
    update(state);
}

/// Worker body. Every month runs builder then aggregator; a storage failure
/// transitions to failed with progress retained. Re-running recomputes every
/// month, which is safe because each upsert is idempotent.
fn run_backfill(db_path: PathBuf, user_id: i64, end_month: YearMonth, jobs: JobTable) {
    let outcome = (|| -> Result<(usize, usize)> {
        let conn = db::open_db(Some(db_path))?;

        let earliest = db::earliest_transaction_date(&conn, user_id)?;
        let months = match earliest {
            Some(date) => YearMonth::from_date(date).range_through(end_month),
            None => Vec::new(),
        };
        let total = months.len();
        set_state(&jobs, user_id, |s| s.total = total);

        let mut processed = 0;
        for month in months {
            snapshots::build_snapshots(&conn, user_id, month)?;
            snapshots::aggregate_net_worth(&conn, user_id, month)?;
            processed += 1;
            set_state(&jobs, user_id, |s| s.processed = processed);
        }
        Ok((processed, total))
    })();

    match outcome {
        Ok((processed, total)) => {
            set_state(&jobs, user_id, |s| s.status = JobStatus::Completed);
            info!(user_id, processed, total, "Backfill completed");
        }
        Err(e) => {
            let message = format!("{:#}", e);
            error!(user_id, error = %message, "Backfill failed");
            set_state(&jobs, user_id, |s| {
                s.status = JobStatus::Failed;
                s.error = Some(message);
            });
        }
    }
}
