//! In-process aggregation scheduling.
//!
//! Ingestion and the manual trigger enqueue jobs; a single worker task
//! drains the queue and runs the aggregation engine. One consumer means
//! runs for the same (project, day) key never overlap, and a full rebuild
//! makes redundant queued jobs harmless.

use chrono::NaiveDate;
use sqlx::PgPool;
use tokio::sync::mpsc;

use crate::aggregate;

// ---

/// One unit of aggregation work.
///
/// `project_slug` of `None` targets every registered project; `date` of
/// `None` targets yesterday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationJob {
    // ---
    pub project_slug: Option<String>,
    pub date: Option<NaiveDate>,
}

impl AggregationJob {
    /// Job covering one project on one specific day.
    pub fn for_project(slug: &str, date: NaiveDate) -> Self {
        AggregationJob {
            project_slug: Some(slug.to_string()),
            date: Some(date),
        }
    }

    /// Job covering all projects for the default day (yesterday).
    pub fn sweep() -> Self {
        AggregationJob {
            project_slug: None,
            date: None,
        }
    }
}

/// Handle for submitting jobs to the aggregation worker.
#[derive(Debug, Clone)]
pub struct JobQueue {
    // ---
    tx: mpsc::UnboundedSender<AggregationJob>,
}

impl JobQueue {
    /// Submit a job. Never blocks the caller.
    ///
    /// A send failure means the worker task is gone, which only happens
    /// during shutdown; the job is dropped with a warning.
    pub fn enqueue(&self, job: AggregationJob) {
        // ---
        if self.tx.send(job).is_err() {
            tracing::warn!("aggregation worker unavailable; job dropped");
        }
    }
}

/// Spawn the single aggregation worker and return its submission handle.
///
/// The worker runs until every `JobQueue` clone is dropped. A failed run is
/// logged and the worker moves on to the next job; the next enqueue for the
/// same key repeats the full rebuild anyway.
pub fn spawn_worker(pool: PgPool) -> JobQueue {
    // ---
    let (tx, mut rx) = mpsc::unbounded_channel::<AggregationJob>();

    tokio::spawn(async move {
        tracing::info!("aggregation worker started");

        while let Some(job) = rx.recv().await {
            let slug = job.project_slug.as_deref();
            tracing::debug!(
                "aggregation job: project={} date={}",
                slug.unwrap_or("<all>"),
                job.date.map_or_else(|| "<yesterday>".to_string(), |d| d.to_string()),
            );

            if let Err(e) = aggregate::run(&pool, slug, job.date).await {
                tracing::error!("aggregation run failed: {}", e);
            }
        }

        tracing::info!("aggregation worker stopped");
    });

    JobQueue { tx }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_job_constructors() {
        // ---
        let date: NaiveDate = "2025-03-26".parse().unwrap();
        let scoped = AggregationJob::for_project("demo", date);
        assert_eq!(scoped.project_slug.as_deref(), Some("demo"));
        assert_eq!(scoped.date, Some(date));

        let sweep = AggregationJob::sweep();
        assert_eq!(sweep.project_slug, None);
        assert_eq!(sweep.date, None);
    }
}
