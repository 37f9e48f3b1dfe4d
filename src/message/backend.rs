//! Server-to-client packets.
//!
//! Parsers for the non-data packets. Each one assumes the packet code
//! has already been read off the stream and consumes exactly the packet
//! body, since the protocol has no length framing to resynchronize on.
use crate::{
    Result,
    error::ServerError,
    io::{self, Stream},
    protocol,
};

/// Server identity from the Hello reply.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version_major: u64,
    pub version_minor: u64,
    /// Revision the server reported, before negotiation.
    pub revision: u64,
    /// Server timezone name, empty below revision 54058.
    pub timezone: String,
    /// Operator-configured display name, empty below revision 54372.
    pub display_name: String,
    /// Patch version, zero below revision 54401.
    pub version_patch: u64,
}

/// Parse the server Hello body. Field presence is gated on the revision
/// carried inside the packet itself.
pub(crate) fn read_hello<S: Stream>(io: &mut S) -> Result<ServerInfo> {
    let name = io::read_str(io)?;
    let version_major = io::read_uvarint(io)?;
    let version_minor = io::read_uvarint(io)?;
    let revision = io::read_uvarint(io)?;

    let mut info = ServerInfo {
        name,
        version_major,
        version_minor,
        revision,
        timezone: String::new(),
        display_name: String::new(),
        version_patch: 0,
    };
    if revision >= protocol::MIN_REVISION_WITH_SERVER_TIMEZONE {
        info.timezone = io::read_str(io)?;
    }
    if revision >= protocol::MIN_REVISION_WITH_SERVER_DISPLAY_NAME {
        info.display_name = io::read_str(io)?;
    }
    if revision >= protocol::MIN_REVISION_WITH_VERSION_PATCH {
        info.version_patch = io::read_uvarint(io)?;
    }
    Ok(info)
}

/// Parse an exception body into a [`ServerError`].
///
/// The wire message starts with `"{name}: "`; that prefix is stripped so
/// the text is not duplicated next to the name field. Nested exceptions
/// and the stack trace are consumed and dropped.
pub(crate) fn read_exception<S: Stream>(io: &mut S) -> Result<ServerError> {
    let code = io::read_i32(io)?;
    let name = io::read_str(io)?;
    let raw = io::read_str(io)?;
    let message = raw.get(name.len() + 1..).unwrap_or("").trim_start().to_owned();

    let _stack_trace = io::read_str(io)?;
    let has_nested = {
        let mut byte = [0u8; 1];
        io::read_exact(io, &mut byte)?;
        byte[0] != 0
    };
    if has_nested {
        // consume and discard the cause chain
        read_exception(io)?;
    }
    Ok(ServerError { code, name, message })
}

/// Query progress counters. Later packets supersede earlier ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct Progress {
    pub rows: u64,
    pub bytes: u64,
    /// Estimated total rows to read, zero below revision 51554.
    pub total_rows: u64,
    /// Rows written so far, zero below revision 54420.
    pub written_rows: u64,
    /// Bytes written so far, zero below revision 54420.
    pub written_bytes: u64,
}

pub(crate) fn read_progress<S: Stream>(io: &mut S, revision: u64) -> Result<Progress> {
    let mut progress = Progress {
        rows: io::read_uvarint(io)?,
        bytes: io::read_uvarint(io)?,
        ..Progress::default()
    };
    if revision >= protocol::MIN_REVISION_WITH_TOTAL_ROWS_IN_PROGRESS {
        progress.total_rows = io::read_uvarint(io)?;
    }
    if revision >= protocol::MIN_REVISION_WITH_CLIENT_WRITE_INFO {
        progress.written_rows = io::read_uvarint(io)?;
        progress.written_bytes = io::read_uvarint(io)?;
    }
    Ok(progress)
}

/// Execution profile counters sent once a query finishes reading.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileInfo {
    pub rows: u64,
    pub blocks: u64,
    pub bytes: u64,
    pub applied_limit: bool,
    pub rows_before_limit: u64,
    pub calculated_rows_before_limit: bool,
}

pub(crate) fn read_profile_info<S: Stream>(io: &mut S) -> Result<ProfileInfo> {
    Ok(ProfileInfo {
        rows: io::read_uvarint(io)?,
        blocks: io::read_uvarint(io)?,
        bytes: io::read_uvarint(io)?,
        applied_limit: io::read_uvarint(io)? != 0,
        rows_before_limit: io::read_uvarint(io)?,
        calculated_rows_before_limit: io::read_uvarint(io)? != 0,
    })
}

/// Consume a TableColumns body: the external table name and the columns
/// description text, both unused here.
pub(crate) fn read_table_columns<S: Stream>(io: &mut S) -> Result<()> {
    io::read_str(io)?;
    io::read_str(io)?;
    Ok(())
}
