pub mod aggregate;
pub mod backend;
pub mod chart;
pub mod config;
pub mod error;
pub mod intake;
pub mod metrics_server;
pub mod observability;
pub mod store;
pub mod submission;
pub mod summary;
pub mod validation;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use error::EngineError;
pub use store::ReadingStore;
pub use submission::{settle_all, Outcome, SubmissionCoordinator};
pub use validation::ReadingValidator;
pub use workflow::{ReadingWorkflow, SubmitReport};
