pub mod handlers;
pub mod model;
pub mod processor;
pub mod registry;
pub mod store;

pub use model::{Job, JobKind};
pub use processor::{HandlerOutcome, JobDeps, JobWorker, JobWorkerConfig};
pub use registry::JobRegistry;
pub use store::{JobStore, PostgresJobStore};
