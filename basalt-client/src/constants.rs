//! Wire-format keys, header names, and server limits shared across the crate.

/// Reserved server-managed field: record identifier.
pub const FIELD_OBJECT_ID: &str = "objectId";
/// Reserved server-managed field: creation timestamp.
pub const FIELD_CREATED_AT: &str = "createdAt";
/// Reserved server-managed field: last-write timestamp.
pub const FIELD_UPDATED_AT: &str = "updatedAt";
/// Reserved server-managed field: access-control list.
pub const FIELD_ACL: &str = "ACL";

/// Tag key identifying typed wire values.
pub const KEY_TYPE: &str = "__type";
/// Class-name key inside pointer and sub-query descriptors.
pub const KEY_CLASS_NAME: &str = "className";

/// `__type` tag for record references.
pub const TYPE_POINTER: &str = "Pointer";
/// `__type` tag for date values.
pub const TYPE_DATE: &str = "Date";
/// `__type` tag for geographic coordinates.
pub const TYPE_GEOPOINT: &str = "GeoPoint";

/// ISO-8601 with millisecond precision, the only date format the server accepts.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Default REST API mount point on the server. Every relative path inside a
/// batch request must carry this prefix.
pub const DEFAULT_MOUNT_PATH: &str = "/1";

/// Class name of the authenticating principal.
pub const USER_CLASS: &str = "_User";

/// Smallest response body worth caching; anything shorter is cheaper to refetch.
pub const MIN_CACHEABLE_BODY: usize = 20;

/// Default cap on operations per batch request.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 50;

/// Default resolution of `Limit::Max`. Servers have moved this cap across
/// versions, so it is configuration rather than protocol.
pub const DEFAULT_MAX_LIMIT: u64 = 11_000;

/// Page size used by full-collection iteration.
pub const ITERATION_PAGE_SIZE: u64 = 100;

/// Server error code for a webhook handler that signalled failure.
pub const SCRIPT_FAILED_CODE: i64 = 141;
/// Server error code for an unexpected fault inside a webhook handler.
pub const INTERNAL_FAULT_CODE: i64 = 1;

/// Application identifier header sent with every request.
pub const HEADER_APPLICATION_ID: &str = "X-Basalt-Application-Id";
/// REST API key header.
pub const HEADER_API_KEY: &str = "X-Basalt-REST-API-Key";
/// Master credential header; replaces the API key when present.
pub const HEADER_MASTER_KEY: &str = "X-Basalt-Master-Key";
/// Session token header for user-scoped requests.
pub const HEADER_SESSION_TOKEN: &str = "X-Basalt-Session-Token";
