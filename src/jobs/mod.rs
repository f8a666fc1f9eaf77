//! Research jobs
//!
//! - [`job`]: the [`ResearchJob`] record, its state machine and event types
//! - [`store`]: the [`JobStore`] trait and the in-memory implementation
//!
//! The durable libsql implementation lives in [`crate::db`].

pub mod job;
pub mod store;

pub use job::{
    ComponentError, ComponentErrorKind, JobError, JobErrorKind, JobEvent, JobEventKind, JobId,
    JobState, JobSummary, ResearchJob,
};
pub use store::{mutator, InMemoryJobStore, JobMutator, JobStore};
