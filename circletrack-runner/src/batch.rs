//! Batch dispatch of tracker jobs across a fixed-size rayon pool.
//!
//! Instruments are independent: each job touches only its own archive, so
//! jobs run in any order. Callers order the collected results afterwards.

use chrono::NaiveDate;
use circletrack_core::domain::{EvaluationResult, State};
use rayon::prelude::*;
use thiserror::Error;
use tracing::info;

use crate::tracker::Tracker;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// One unit of tracker work.
#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    Daily { code: String, pre_state: State },
    Weekly { code: String },
    Historical { code: String },
}

impl Job {
    pub fn code(&self) -> &str {
        match self {
            Job::Daily { code, .. } | Job::Weekly { code } | Job::Historical { code } => code,
        }
    }

    fn run(&self, tracker: &Tracker<'_>, date: NaiveDate) -> EvaluationResult {
        match self {
            Job::Daily { code, pre_state } => tracker.daily(code, *pre_state, date),
            Job::Weekly { code } => tracker.weekly(code, date),
            Job::Historical { code } => tracker.historical(code, date),
        }
    }
}

pub struct BatchRunner {
    pool: rayon::ThreadPool,
}

impl BatchRunner {
    /// `workers == 0` lets rayon pick the thread count.
    pub fn new(workers: usize) -> Result<Self, BatchError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("circletrack-worker-{i}"))
            .build()?;
        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run every job as of `date`. The result order is unspecified.
    pub fn run(&self, tracker: &Tracker<'_>, jobs: &[Job], date: NaiveDate) -> Vec<EvaluationResult> {
        let results: Vec<EvaluationResult> = self
            .pool
            .install(|| jobs.par_iter().map(|job| job.run(tracker, date)).collect());

        let failed = results.iter().filter(|r| r.state.bucket().is_none()).count();
        info!(
            %date,
            jobs = jobs.len(),
            unreported = failed,
            workers = self.workers(),
            "batch finished"
        );
        results
    }
}
