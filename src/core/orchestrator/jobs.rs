//! Launch job store
//!
//! In-memory job table with write-through persistence. Each job carries a
//! per-job mutex so stage transitions serialize, and a cancellation token
//! that the launch task observes.

use crate::core::models::LaunchJob;
use crate::storage::database::Database;
use crate::utils::error::Result;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

/// Launch job table
pub struct JobStore {
    db: Arc<Database>,
    jobs: DashMap<Uuid, Arc<Mutex<LaunchJob>>>,
    tokens: DashMap<Uuid, CancellationToken>,
}

impl JobStore {
    /// Create a job store backed by the database
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            jobs: DashMap::new(),
            tokens: DashMap::new(),
        }
    }

    /// Track a new job and persist its initial row
    pub async fn create(&self, job: LaunchJob) -> Result<CancellationToken> {
        self.db.save_launch_job(&job).await?;
        let token = CancellationToken::new();
        self.tokens.insert(job.id, token.clone());
        self.jobs.insert(job.id, Arc::new(Mutex::new(job)));
        Ok(token)
    }

    /// Apply a mutation under the job's mutex and write it through
    ///
    /// Persistence failures are logged, not propagated: the in-memory job
    /// remains authoritative for the running launch, and the next
    /// transition retries the write.
    pub async fn update<F>(&self, job_id: Uuid, mutate: F)
    where
        F: FnOnce(&mut LaunchJob),
    {
        let Some(slot) = self.jobs.get(&job_id).map(|j| j.clone()) else {
            warn!(job = %job_id, "update for unknown launch job");
            return;
        };
        let mut job = slot.lock().await;
        mutate(&mut job);
        if let Err(e) = self.db.save_launch_job(&job).await {
            warn!(job = %job_id, "launch job persistence failed: {}", e);
        }
    }

    /// Fetch a job, falling back to the store after a restart
    pub async fn get(&self, job_id: Uuid) -> Result<Option<LaunchJob>> {
        if let Some(slot) = self.jobs.get(&job_id).map(|j| j.clone()) {
            return Ok(Some(slot.lock().await.clone()));
        }
        self.db.get_launch_job(job_id).await
    }

    /// Cancellation token for a running job
    pub fn token(&self, job_id: Uuid) -> Option<CancellationToken> {
        self.tokens.get(&job_id).map(|t| t.clone())
    }

    /// Drop in-memory state for a terminal job; the row stays until GC
    pub async fn finish(&self, job_id: Uuid) {
        let terminal = match self.jobs.get(&job_id).map(|j| j.clone()) {
            Some(slot) => slot.lock().await.status.is_terminal(),
            None => true,
        };
        if terminal {
            self.jobs.remove(&job_id);
            self.tokens.remove(&job_id);
        }
    }

    /// Delete terminal rows older than the retention window
    pub async fn gc(&self, retention_hours: u64) -> Result<u64> {
        self.db.gc_launch_jobs(retention_hours).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::LaunchJobStatus;
    use chrono::Utc;

    async fn store() -> JobStore {
        let db = Database::new(&crate::config::DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Default::default()
        })
        .await
        .unwrap();
        db.migrate().await.unwrap();
        JobStore::new(Arc::new(db))
    }

    #[tokio::test]
    async fn jobs_survive_in_memory_eviction() {
        let store = store().await;
        let job = LaunchJob::new(Uuid::new_v4(), Utc::now() + chrono::Duration::minutes(20));
        let job_id = job.id;
        store.create(job).await.unwrap();

        store
            .update(job_id, |j| {
                j.advance(LaunchJobStatus::Provisioning, "Launching cluster");
            })
            .await;
        store
            .update(job_id, |j| {
                j.advance(LaunchJobStatus::Completed, "verified healthy");
            })
            .await;
        store.finish(job_id).await;

        // The in-memory entry is gone; the persisted row still answers.
        let restored = store.get(job_id).await.unwrap().unwrap();
        assert_eq!(restored.status, LaunchJobStatus::Completed);
        assert_eq!(restored.stages.len(), 2);
    }

    #[tokio::test]
    async fn finish_keeps_running_jobs() {
        let store = store().await;
        let job = LaunchJob::new(Uuid::new_v4(), Utc::now() + chrono::Duration::minutes(20));
        let job_id = job.id;
        store.create(job).await.unwrap();

        store.finish(job_id).await;
        assert!(store.token(job_id).is_some());
    }
}
