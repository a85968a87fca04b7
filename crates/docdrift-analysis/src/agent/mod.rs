//! Tier-4 agent work: the leased task queue, executors that run tasks,
//! the async worker pool and the applier that folds results back in.

pub mod applier;
pub mod executor;
pub mod queue;
pub mod worker;

pub use applier::{AppliedEffect, ResultApplier};
pub use docdrift_storage::queries::agent_tasks::{ExpiryCounts, TaskScope};
pub use executor::{AgentExecutor, HttpAgentExecutor};
pub use queue::{AgentQueue, Enqueued};
pub use worker::{AgentWorkerPool, WorkerPoolReport};
