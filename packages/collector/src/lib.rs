//! Job Collection & Archival Pipeline
//!
//! Crawls public job listings across keyword × country search targets,
//! enriches each discovered posting from its detail page, deduplicates
//! across three tiers (in-run set, 48-hour TTL cache, permanent archive
//! index) and commits survivors to a manifest-driven, day-sharded gzip
//! archive with monthly statistics.
//!
//! # Modules
//!
//! - [`targets`] - keyword × country × page target expansion
//! - [`list_page`] - search-result page fetching and card parsing
//! - [`enrich`] - batched detail-page enrichment with a fixed session pool
//! - [`dedup`] - the in-run set and the persistent TTL cache
//! - [`archive`] - manifest, monthly stats and the day-sharded store
//! - [`dispatch`] - rate-limited outbound notification delivery
//! - [`export`] - CSV export shaping
//! - [`pipeline`] - the orchestrator tying the stages together

pub mod archive;
pub mod config;
pub mod dedup;
pub mod dispatch;
pub mod enrich;
pub mod error;
pub mod export;
pub mod list_page;
pub mod pipeline;
pub mod session;
pub mod targets;
pub mod types;

pub use archive::{ArchiveStore, FsObjectStore, MemoryObjectStore, ObjectStore};
pub use config::CollectorConfig;
pub use dedup::{RunCache, TtlCache};
pub use dispatch::{NotificationSink, OutboundMessage, RateLimitedDispatcher};
pub use enrich::{DetailBatcher, EnrichOutcome, FailureKind};
pub use error::{CollectError, DispatchError, FetchError, StoreError};
pub use pipeline::Collector;
pub use session::{HttpSession, NavigatedPage, Session};
pub use types::{CrawlTarget, JobRecord, ProgressEvent, RunSummary, SearchRequest};
