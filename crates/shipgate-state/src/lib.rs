//! shipgate-state: persisted run history
//!
//! - `RunLog`: append-only store of sealed `RunRecord`s, keyed by task id and
//!   seal timestamp
//! - `FileRunLog`: JSON-lines backend with per-entry SHA-256 digests
//! - `MemoryRunLog` (in `fakes`): store-free backend for tests
//! - `bench_summary`: the `ci/BENCH_SUMMARY.txt` benchmark line

pub mod bench_summary;
mod error;
pub mod fakes;
pub mod file_log;
pub mod storage_traits;

pub use bench_summary::BenchSummary;
pub use error::StorageError;
pub use file_log::{FileRunLog, DEFAULT_LOG_PATH};
pub use storage_traits::{ContentDigest, RunKey, RunLog, StorageResult};
