//! Business logic services.
//!
//! Services combine the catalog, the commit history, and the classifier into
//! the operations the command line exposes.

mod cancel;
mod cleanup;
mod deletion;
mod publication;

pub use cancel::CancellationToken;
pub use cleanup::{CleanupOutcome, CleanupService, DEFAULT_SCAN_DEPTH};
pub use deletion::DeletionExecutor;
pub use publication::{PublicationPlan, PublicationService};
