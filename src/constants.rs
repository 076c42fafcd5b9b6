// src/constants.rs
//
// Centralized constants for caboodle to avoid hardcoded values throughout the codebase

use std::time::Duration;

/// Default upper bound on concurrently in-flight fetches during a concurrent sync
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Default chunk-count hint used by the batch scheduler.
///
/// The scheduler carves a listing of `N` objects into `N / hint + 1` chunks,
/// so this is a divisor, not a per-chunk item count.
pub const DEFAULT_CHUNK_COUNT_HINT: usize = 20;

/// Default per-fetch timeout (seconds). Generous on purpose: large blobs over
/// slow links must not trip it.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30 * 60;

/// Default per-fetch timeout as a `Duration`
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS);

/// Maximum number of attempts for a single fetch (one retry, corruption only)
pub const MAX_FETCH_ATTEMPTS: u8 = 2;

// ============================================================================
// URI schemes
// ============================================================================

/// Google Cloud Storage URI prefix
pub const GCS_SCHEME: &str = "gs://";

/// Alternate Google Cloud Storage URI prefix
pub const GCS_SCHEME_ALT: &str = "gcs://";

/// Local filesystem URI prefix
pub const FILE_SCHEME: &str = "file://";

// ============================================================================
// Environment Variable Names
// ============================================================================

/// Environment variable for a custom GCS endpoint (e.g. http://localhost:4443)
pub const ENV_GCS_ENDPOINT_URL: &str = "GCS_ENDPOINT_URL";

/// Environment variable used by GCS emulators (host:port)
pub const ENV_STORAGE_EMULATOR_HOST: &str = "STORAGE_EMULATOR_HOST";
