//! Stable diagnostic codes.
//!
//! Codes are part of the output contract: reports are snapshot-tested and
//! downstream tooling matches on them, so existing codes never change.

pub const INVALID_DIRECTIVE: &str = "quarry::invalid_directive";
pub const SOURCE_UNREADABLE: &str = "quarry::source_unreadable";

pub const INVALID_MIGRATION_FILENAME: &str = "quarry::invalid_migration_filename";
pub const INVALID_MIGRATION_NUMBER: &str = "quarry::invalid_migration_number";
pub const DUPLICATE_MIGRATION: &str = "quarry::duplicate_migration";
pub const MISSING_MIGRATION: &str = "quarry::missing_migration";
pub const MIGRATIONS_UNREADABLE: &str = "quarry::migrations_unreadable";

pub const INVALID_ENDPOINT_SIGNATURE: &str = "quarry::invalid_endpoint_signature";
pub const INVALID_ENDPOINT_PATH: &str = "quarry::invalid_endpoint_path";
pub const INVALID_ENDPOINT_METHOD: &str = "quarry::invalid_endpoint_method";
pub const PATH_PARAM_MISMATCH: &str = "quarry::path_param_mismatch";
pub const RAW_ENDPOINT_PRIVATE: &str = "quarry::raw_endpoint_private";

pub const CRON_ILLEGAL_CALL_SITE: &str = "quarry::cron_illegal_call_site";
pub const INVALID_CRON_SCHEDULE: &str = "quarry::invalid_cron_schedule";

pub const INVALID_CALL_OPTION: &str = "quarry::invalid_call_option";
pub const INVALID_CORS: &str = "quarry::invalid_cors";

pub const UNKNOWN_ENDPOINT: &str = "quarry::unknown_endpoint";
pub const ENDPOINT_CALLED: &str = "quarry::endpoint_called";
