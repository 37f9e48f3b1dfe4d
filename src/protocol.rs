//! ClickHouse Native Protocol Constants
//!
//! Packet codes and revision thresholds for the native TCP protocol.
//!
//! Every optional wire field is gated by a server revision: a field whose
//! threshold is `R` is present for every negotiated revision `>= R` and
//! absent below it. The negotiated revision is the minimum of
//! [`CLIENT_REVISION`] and the revision the server reports in its Hello.

/// Client packet codes.
pub mod client {
    pub const HELLO: u64 = 0;
    pub const QUERY: u64 = 1;
    pub const DATA: u64 = 2;
    #[allow(unused)] // cancellation is intentionally unimplemented
    pub const CANCEL: u64 = 3;
    pub const PING: u64 = 4;
}

/// Server packet codes.
pub mod server {
    pub const HELLO: u64 = 0;
    pub const DATA: u64 = 1;
    pub const EXCEPTION: u64 = 2;
    pub const PROGRESS: u64 = 3;
    pub const PONG: u64 = 4;
    pub const END_OF_STREAM: u64 = 5;
    pub const PROFILE_INFO: u64 = 6;
    pub const TOTALS: u64 = 7;
    pub const EXTREMES: u64 = 8;
    pub const TABLES_STATUS: u64 = 9;
    pub const LOG: u64 = 10;
    pub const TABLE_COLUMNS: u64 = 11;
    pub const PART_UUIDS: u64 = 12;
    pub const READ_TASK_REQUEST: u64 = 13;
    pub const PROFILE_EVENTS: u64 = 14;
}

// Revision thresholds, in protocol order.
pub const MIN_REVISION_WITH_TEMPORARY_TABLES: u64 = 50264;
pub const MIN_REVISION_WITH_TOTAL_ROWS_IN_PROGRESS: u64 = 51554;
pub const MIN_REVISION_WITH_BLOCK_INFO: u64 = 51903;
pub const MIN_REVISION_WITH_CLIENT_INFO: u64 = 54032;
pub const MIN_REVISION_WITH_SERVER_TIMEZONE: u64 = 54058;
pub const MIN_REVISION_WITH_QUOTA_KEY_IN_CLIENT_INFO: u64 = 54060;
pub const MIN_REVISION_WITH_SERVER_DISPLAY_NAME: u64 = 54372;
pub const MIN_REVISION_WITH_VERSION_PATCH: u64 = 54401;
pub const MIN_REVISION_WITH_CLIENT_WRITE_INFO: u64 = 54420;
pub const MIN_REVISION_WITH_SETTINGS_SERIALIZED_AS_STRINGS: u64 = 54429;
pub const MIN_REVISION_WITH_INTERSERVER_SECRET: u64 = 54441;
pub const MIN_REVISION_WITH_OPENTELEMETRY: u64 = 54442;
pub const MIN_REVISION_WITH_DISTRIBUTED_DEPTH: u64 = 54448;
pub const MIN_REVISION_WITH_INITIAL_QUERY_START_TIME: u64 = 54449;
pub const MIN_REVISION_WITH_INCREMENTAL_PROFILE_EVENTS: u64 = 54451;

/// Client identity sent in Hello and in the query client-info section.
pub const CLIENT_NAME: &str = "klick";
pub const CLIENT_VERSION_MAJOR: u64 = 1;
pub const CLIENT_VERSION_MINOR: u64 = 0;
pub const CLIENT_REVISION: u64 = MIN_REVISION_WITH_INCREMENTAL_PROFILE_EVENTS;

/// Query processing stage: run to completion.
pub const STAGE_COMPLETE: u64 = 2;
/// Compression is negotiated off for the whole session.
pub const COMPRESSION_DISABLE: u64 = 0;
