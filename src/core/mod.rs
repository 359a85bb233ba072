pub mod engine;
pub mod staging;

pub use engine::{SyncEngine, SyncReport, TransferOutcome};
pub use staging::StagingFile;
