use crate::jobs::{JobId, JobMutator, JobStore, ResearchJob};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use libsql::{Builder, Connection, Database};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Durable job store on libsql: a local SQLite file, an in-memory database,
/// or a remote Turso database.
///
/// Each job is one row holding the full record as JSON next to the indexed
/// columns. Updates to the same job are serialized with a per-job async lock,
/// held only while the job can still change. Every id ever created is kept in
/// `research_job_ids`, so a removed id is never accepted again.
pub struct SqlJobStore {
    _db: Database,
    conn: Connection,
    locks: Mutex<HashMap<JobId, Arc<tokio::sync::Mutex<()>>>>,
}

fn db_err(context: &str) -> impl Fn(libsql::Error) -> AppError + '_ {
    move |e| AppError::Database(format!("{}: {}", context, e))
}

impl SqlJobStore {
    pub async fn new_remote(url: String, auth_token: String) -> Result<Self> {
        let db = Builder::new_remote(url, auth_token)
            .build()
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Turso: {}", e)))?;

        Self::from_database(db).await
    }

    pub async fn new_local<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::Database(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| AppError::Database(format!("Failed to open local database: {}", e)))?;

        Self::from_database(db).await
    }

    /// Ephemeral database, mostly for tests.
    pub async fn new_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| AppError::Database(format!("Failed to open in-memory database: {}", e)))?;

        Self::from_database(db).await
    }

    async fn from_database(db: Database) -> Result<Self> {
        // One connection for the lifetime of the store; an in-memory database
        // only exists for the connection that created it.
        let conn = db
            .connect()
            .map_err(|e| AppError::Database(format!("Failed to get connection: {}", e)))?;

        let store = Self {
            _db: db,
            conn,
            locks: Mutex::new(HashMap::new()),
        };
        store.initialize_schema().await?;

        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<()> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS research_jobs (
                    id TEXT PRIMARY KEY,
                    seq INTEGER NOT NULL,
                    state TEXT NOT NULL,
                    record TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )",
                (),
            )
            .await
            .map_err(db_err("Failed to create research_jobs table"))?;

        self.conn
            .execute(
                "CREATE INDEX IF NOT EXISTS idx_research_jobs_seq ON research_jobs(seq)",
                (),
            )
            .await
            .map_err(db_err("Failed to create research_jobs index"))?;

        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS research_job_ids (id TEXT PRIMARY KEY)",
                (),
            )
            .await
            .map_err(db_err("Failed to create research_job_ids table"))?;

        // Databases created before the id ledger existed.
        self.conn
            .execute(
                "INSERT OR IGNORE INTO research_job_ids (id) SELECT id FROM research_jobs",
                (),
            )
            .await
            .map_err(db_err("Failed to backfill research_job_ids"))?;

        Ok(())
    }

    fn job_lock(&self, id: &JobId) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn release_lock(&self, id: &JobId) {
        self.locks.lock().remove(id);
    }

    async fn load(&self, id: &JobId) -> Result<Option<ResearchJob>> {
        let mut rows = self
            .conn
            .query("SELECT record FROM research_jobs WHERE id = ?", [id.as_str()])
            .await
            .map_err(db_err("Failed to query research job"))?;

        match rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            Some(row) => {
                let record: String = row.get(0).map_err(|e| AppError::Database(e.to_string()))?;
                Ok(Some(decode(&record)?))
            }
            None => Ok(None),
        }
    }
}

fn encode(job: &ResearchJob) -> Result<String> {
    serde_json::to_string(job)
        .map_err(|e| AppError::Database(format!("Failed to encode job {}: {}", job.id(), e)))
}

fn decode(record: &str) -> Result<ResearchJob> {
    serde_json::from_str(record)
        .map_err(|e| AppError::Database(format!("Failed to decode stored job: {}", e)))
}

#[async_trait]
impl JobStore for SqlJobStore {
    async fn create(&self, job: ResearchJob) -> Result<()> {
        let record = encode(&job)?;
        let issued = self
            .conn
            .execute(
                "INSERT INTO research_job_ids (id) VALUES (?)",
                [job.id().as_str()],
            )
            .await;
        match issued {
            Ok(_) => {}
            Err(e) if e.to_string().contains("UNIQUE constraint failed") => {
                return Err(AppError::DuplicateId(job.id().to_string()));
            }
            Err(e) => return Err(AppError::Database(format!("Failed to reserve job id: {}", e))),
        }

        let result = self
            .conn
            .execute(
                "INSERT INTO research_jobs (id, seq, state, record, created_at, updated_at)
                 VALUES (?, (SELECT COALESCE(MAX(seq), 0) + 1 FROM research_jobs), ?, ?, ?, ?)",
                (
                    job.id().as_str(),
                    job.state().as_str(),
                    record,
                    job.created_at().to_rfc3339(),
                    job.updated_at().to_rfc3339(),
                ),
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("UNIQUE constraint failed") => {
                Err(AppError::DuplicateId(job.id().to_string()))
            }
            Err(e) => Err(AppError::Database(format!("Failed to insert job: {}", e))),
        }
    }

    async fn get(&self, id: &JobId) -> Result<ResearchJob> {
        self.load(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Research job {} not found", id)))
    }

    async fn update(&self, id: &JobId, mutator: JobMutator) -> Result<ResearchJob> {
        let lock = self.job_lock(id);
        let _guard = lock.lock().await;

        let mut job = match self.load(id).await? {
            Some(job) => job,
            None => {
                self.release_lock(id);
                return Err(AppError::NotFound(format!("Research job {} not found", id)));
            }
        };
        mutator(&mut job)?;

        let record = encode(&job)?;
        let changed = self
            .conn
            .execute(
                "UPDATE research_jobs SET state = ?, record = ?, updated_at = ? WHERE id = ?",
                (
                    job.state().as_str(),
                    record,
                    job.updated_at().to_rfc3339(),
                    id.as_str(),
                ),
            )
            .await
            .map_err(db_err("Failed to update research job"))?;

        if changed == 0 {
            self.release_lock(id);
            return Err(AppError::NotFound(format!("Research job {} not found", id)));
        }
        // Terminal records are immutable.
        if job.state().is_terminal() {
            self.release_lock(id);
        }
        Ok(job)
    }

    async fn list(&self) -> Result<Vec<ResearchJob>> {
        let mut rows = self
            .conn
            .query("SELECT record FROM research_jobs ORDER BY seq DESC", ())
            .await
            .map_err(db_err("Failed to list research jobs"))?;

        let mut jobs = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            let record: String = row.get(0).map_err(|e| AppError::Database(e.to_string()))?;
            jobs.push(decode(&record)?);
        }
        Ok(jobs)
    }

    async fn remove(&self, id: &JobId) -> Result<()> {
        let lock = self.job_lock(id);
        let _guard = lock.lock().await;

        let deleted = self
            .conn
            .execute("DELETE FROM research_jobs WHERE id = ?", [id.as_str()])
            .await
            .map_err(db_err("Failed to delete research job"))?;

        self.release_lock(id);

        if deleted == 0 {
            return Err(AppError::NotFound(format!("Research job {} not found", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{mutator, ComponentError, JobError};
    use crate::research::ReportOptions;
    use crate::retrieval::{RetrievalComponent, SearchFilters};

    fn job() -> ResearchJob {
        ResearchJob::new(
            JobId::generate(),
            "Massachusetts rent escrow",
            SearchFilters::default(),
            vec![RetrievalComponent::Web],
            ReportOptions::default(),
            vec![],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_lock_released_once_job_is_terminal() {
        let store = SqlJobStore::new_memory().await.unwrap();
        let job = job();
        let id = job.id().clone();
        store.create(job).await.unwrap();

        store
            .update(&id, mutator(|job| job.begin_retrieval()))
            .await
            .unwrap();
        assert!(store.locks.lock().contains_key(&id));

        store
            .update(
                &id,
                mutator(|job| {
                    let error = ComponentError::failed(RetrievalComponent::Web, "down");
                    job.record_component_error(error.clone())?;
                    job.fail(JobError::all_components_failed(vec![error]))
                }),
            )
            .await
            .unwrap();
        assert!(store.locks.lock().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_id_leaves_no_lock() {
        let store = SqlJobStore::new_memory().await.unwrap();
        let result = store
            .update(&JobId::from("research_missing"), mutator(|job| job.begin_retrieval()))
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(store.locks.lock().is_empty());
    }
}
