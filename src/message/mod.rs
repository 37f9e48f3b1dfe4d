//! Protocol messages.
//!
//! [`frontend`] covers client-to-server packets, assembled into a byte
//! buffer; [`backend`] covers server-to-client packets, parsed straight
//! off the stream.
pub(crate) mod backend;
pub(crate) mod frontend;

pub use backend::{ProfileInfo, Progress, ServerInfo};
