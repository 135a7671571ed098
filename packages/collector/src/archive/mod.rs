//! Statistics archive: manifest, monthly stats and the day-sharded store.

pub mod manifest;
pub mod stats;
pub mod store;

pub use manifest::{DayShard, Manifest, MonthEntry};
pub use stats::{salary_band, salary_period, MonthlyStats};
pub use store::{ArchiveStore, FsObjectStore, MemoryObjectStore, ObjectStore};
