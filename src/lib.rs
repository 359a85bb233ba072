pub mod config;
pub mod core;
pub mod logging;
pub mod mime;
pub mod storage;

pub use config::{Settings, StoreConfig, TransferConfig};
pub use core::{StagingFile, SyncEngine, SyncReport, TransferOutcome};
pub use storage::{ObjectInfo, Storage};
