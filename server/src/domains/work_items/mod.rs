pub mod model;
pub mod repo;

pub use model::{WorkItem, WorkItemKind, WorkItemStatus};
