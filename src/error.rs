//! `klick` error types.
use std::io;

/// A specialized [`Result`] type for `klick` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All possible errors from the `klick` library.
///
/// Every error aborts the in-flight operation; nothing is retried
/// internally. A [`Error::Server`] leaves the session usable, the
/// remaining variants close it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to establish the underlying stream.
    #[error("failed to connect: {0}")]
    Connect(#[source] io::Error),

    /// The stream errored while reading, or ended mid-packet.
    #[error("failed to read from server: {0}")]
    Read(#[source] io::Error),

    /// The stream errored while writing, or consumed a short count.
    #[error("failed to write to server: {0}")]
    Write(#[source] io::Error),

    /// The server sent bytes this client cannot interpret.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The server reported an exception.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// The caller used the API out of order or with unusable values.
    #[error(transparent)]
    Usage(#[from] UsageError),
}

/// Protocol-level decode failure.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Server sent a packet code this client does not know.
    #[error("unknown server packet code {0}")]
    UnknownPacket(u64),

    /// Server sent a packet this client deliberately refuses to parse,
    /// to surface protocol drift rather than mis-parse it.
    #[error("unsupported server packet: {0}")]
    UnsupportedPacket(&'static str),

    /// No codec exists for a column type string.
    #[error("unsupported column type: {0:?}")]
    UnsupportedType(String),

    /// Nesting of the values handed to an array column does not match
    /// the declared `Array(...)` depth.
    #[error("array depth mismatch: column declares {expected}, values nest {found}")]
    ArrayDepth { expected: usize, found: usize },

    /// A decoded value does not fit its domain (e.g. a timestamp outside
    /// the representable calendar range).
    #[error("value out of range for {0}")]
    OutOfRange(&'static str),

    /// A known packet arrived where the exchange does not allow it.
    #[error("unexpected packet code {got} during {phase}")]
    Unexpected { phase: &'static str, got: u64 },
}

/// An exception reported by the server.
///
/// `message` carries the server text with the redundant `name: ` prefix
/// already stripped.
#[derive(Debug, thiserror::Error)]
#[error("server exception code {code}: {message}")]
pub struct ServerError {
    pub code: i32,
    pub name: String,
    pub message: String,
}

/// Caller-side misuse of the insert/query API.
#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    /// [`insert_block`][crate::Connection::insert_block] was called before
    /// [`insert_start`][crate::Connection::insert_start] registered the
    /// column types.
    #[error("insert block written before insert_start registered the columns")]
    InsertNotStarted,

    /// Insert called with no rows; column names cannot be derived.
    #[error("insert requires at least one row")]
    EmptyInsert,

    /// A row carries a field the target table did not describe.
    #[error("column {0:?} is not part of the insert target")]
    UnknownColumn(String),

    /// A value cannot be encoded into its column type.
    #[error("unusable value: {0}")]
    Value(String),

    /// The session is closed, either explicitly or after a fatal error.
    #[error("session is closed")]
    SessionClosed,

    /// A new operation was started while an insert was in flight.
    #[error("another operation is in flight; finish the insert first")]
    OperationInFlight,
}
