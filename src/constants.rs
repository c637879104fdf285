//! Collection, index, and pagination constants.

/// Service name reported to the host.
pub const SERVICE_NAME: &str = "scheduler_store_provider";

/// Default collection holding periodic task documents.
pub const DEFAULT_COLLECTION: &str = "scheduler";

/// Default number of records fetched per page when building a snapshot.
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Default upper bound for a single index provisioning attempt, in milliseconds.
pub const DEFAULT_INDEX_TIMEOUT_MS: u64 = 10_000;

/// Name of the compound lookup index over the periodic task collection.
pub const LOOKUP_INDEX_NAME: &str = "periodic_tasks_lookup";

/// Fields covered by the lookup index, in key order (all ascending).
pub const LOOKUP_INDEX_FIELDS: [&str; 5] =
    ["job_code", "payload", "created_at", "updated_at", "enabled"];
