//! Job storage
//!
//! The store owns every job record. Writers go through [`JobStore::update`],
//! which applies a mutator to a private copy of the record and publishes it only
//! when the mutator succeeds, so readers always see a consistent snapshot.

use super::{JobId, ResearchJob};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Read-modify-write step applied by [`JobStore::update`].
pub type JobMutator = Box<dyn FnOnce(&mut ResearchJob) -> Result<()> + Send>;

/// Box a closure as a [`JobMutator`].
pub fn mutator<F>(f: F) -> JobMutator
where
    F: FnOnce(&mut ResearchJob) -> Result<()> + Send + 'static,
{
    Box::new(f)
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Register a new job. Fails with `DuplicateId` if the id is known.
    async fn create(&self, job: ResearchJob) -> Result<()>;

    /// Snapshot of a job. Fails with `NotFound`.
    async fn get(&self, id: &JobId) -> Result<ResearchJob>;

    /// Atomically apply `mutator` and return the updated snapshot.
    ///
    /// Updates to the same job are serialized. If the mutator fails the
    /// stored record is left untouched and the error is returned.
    async fn update(&self, id: &JobId, mutator: JobMutator) -> Result<ResearchJob>;

    /// All jobs, most recently created first.
    async fn list(&self) -> Result<Vec<ResearchJob>>;

    /// Evict a job. Fails with `NotFound`.
    async fn remove(&self, id: &JobId) -> Result<()>;
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, Arc<Mutex<ResearchJob>>>,
    order: Vec<JobId>,
    /// Every id ever registered, so removed ids are never reused
    issued: HashSet<JobId>,
}

/// Process-local job store.
#[derive(Default)]
pub struct InMemoryJobStore {
    inner: RwLock<Inner>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, id: &JobId) -> Result<Arc<Mutex<ResearchJob>>> {
        self.inner
            .read()
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Research job {} not found", id)))
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: ResearchJob) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.issued.contains(job.id()) {
            return Err(AppError::DuplicateId(job.id().to_string()));
        }
        let id = job.id().clone();
        inner.issued.insert(id.clone());
        inner.order.push(id.clone());
        inner.jobs.insert(id, Arc::new(Mutex::new(job)));
        Ok(())
    }

    async fn get(&self, id: &JobId) -> Result<ResearchJob> {
        let cell = self.cell(id)?;
        let job = cell.lock().clone();
        Ok(job)
    }

    async fn update(&self, id: &JobId, mutator: JobMutator) -> Result<ResearchJob> {
        let cell = self.cell(id)?;
        let mut guard = cell.lock();
        let mut draft = guard.clone();
        mutator(&mut draft)?;
        *guard = draft.clone();
        Ok(draft)
    }

    async fn list(&self) -> Result<Vec<ResearchJob>> {
        let cells: Vec<Arc<Mutex<ResearchJob>>> = {
            let inner = self.inner.read();
            inner
                .order
                .iter()
                .rev()
                .filter_map(|id| inner.jobs.get(id).cloned())
                .collect()
        };
        Ok(cells.iter().map(|cell| cell.lock().clone()).collect())
    }

    async fn remove(&self, id: &JobId) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.jobs.remove(id).is_none() {
            return Err(AppError::NotFound(format!("Research job {} not found", id)));
        }
        inner.order.retain(|existing| existing != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::report::ReportOptions;
    use crate::retrieval::{RetrievalComponent, SearchFilters};

    fn job(query: &str) -> ResearchJob {
        ResearchJob::new(
            JobId::generate(),
            query,
            SearchFilters::default(),
            vec![RetrievalComponent::CaseLaw, RetrievalComponent::Web],
            ReportOptions::default(),
            vec![],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_get_and_duplicate() {
        let store = InMemoryJobStore::new();
        let job = job("first");
        let id = job.id().clone();

        store.create(job.clone()).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap(), job);
        assert!(matches!(
            store.create(job).await,
            Err(AppError::DuplicateId(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let store = InMemoryJobStore::new();
        let id = JobId::from("research_missing");

        assert!(matches!(store.get(&id).await, Err(AppError::NotFound(_))));
        assert!(matches!(
            store.update(&id, mutator(|_| Ok(()))).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(store.remove(&id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_failed_mutator_leaves_record_untouched() {
        let store = InMemoryJobStore::new();
        let job = job("q");
        let id = job.id().clone();
        store.create(job.clone()).await.unwrap();

        let result = store
            .update(
                &id,
                mutator(|job| {
                    job.begin_retrieval()?;
                    Err(AppError::Internal("abort after partial write".to_string()))
                }),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(store.get(&id).await.unwrap(), job);
    }

    #[tokio::test]
    async fn test_update_returns_snapshot() {
        let store = InMemoryJobStore::new();
        let job = job("q");
        let id = job.id().clone();
        store.create(job).await.unwrap();

        let updated = store
            .update(&id, mutator(|job| job.begin_retrieval()))
            .await
            .unwrap();
        assert_eq!(updated.state(), crate::jobs::JobState::Retrieving);
        assert_eq!(store.get(&id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_list_most_recent_first_and_remove() {
        let store = InMemoryJobStore::new();
        let ids: Vec<JobId> = {
            let mut ids = Vec::new();
            for query in ["one", "two", "three"] {
                let job = job(query);
                ids.push(job.id().clone());
                store.create(job).await.unwrap();
            }
            ids
        };

        let listed: Vec<String> = store
            .list()
            .await
            .unwrap()
            .iter()
            .map(|j| j.query().to_string())
            .collect();
        assert_eq!(listed, vec!["three", "two", "one"]);

        store.remove(&ids[1]).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 2);
        assert!(matches!(store.get(&ids[1]).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_removed_id_is_never_reused() {
        let store = InMemoryJobStore::new();
        let job = job("q");
        let id = job.id().clone();
        store.create(job.clone()).await.unwrap();
        store.remove(&id).await.unwrap();

        assert!(matches!(
            store.create(job).await,
            Err(AppError::DuplicateId(_))
        ));
    }
}
