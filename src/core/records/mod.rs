pub mod records_models;
pub mod record_stores;

pub use record_stores::{LeadStore, ProjectStore, StoreError, TaskStore};
pub use records_models::{Lead, NewTask, Project, SalesStage, Task, TaskStage};
