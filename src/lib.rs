//! # klick
//!
//! Synchronous ClickHouse client speaking the native TCP protocol.
//!
//! One [`Connection`] is one protocol session: connect, handshake, then
//! run queries, pings, and inserts back to back on the same stream.
//! Everything blocks; there is no pooling, no compression, and no TLS,
//! though any transport implementing [`Stream`] can be supplied in place
//! of the built-in `TcpStream`.
//!
//! ```no_run
//! use klick::{Config, Connection, Row};
//!
//! fn main() -> klick::Result<()> {
//!     let config = Config::new().host("127.0.0.1").database("default");
//!     let mut conn = Connection::connect(&config)?;
//!
//!     conn.query("CREATE TABLE t (id UInt32, name String) ENGINE = Memory")?;
//!     conn.insert("t", &[
//!         Row::new().with("id", 1u32).with("name", "one"),
//!         Row::new().with("id", 2u32).with("name", "two"),
//!     ])?;
//!
//!     for row in conn.query("SELECT id, name FROM t ORDER BY id")? {
//!         println!("{} {}", row.get("id").unwrap(), row.get("name").unwrap());
//!     }
//!     Ok(())
//! }
//! ```
mod block;
mod connection;
mod error;
mod io;
mod message;
pub mod protocol;
mod row;
mod types;
mod value;

pub use block::{Block, Column};
pub use connection::{Config, Connection, ParseError};
pub use error::{Error, ProtocolError, Result, ServerError, UsageError};
pub use io::Stream;
pub use message::{ProfileInfo, Progress, ServerInfo};
pub use row::Row;
pub use types::{ScalarKind, TypeDesc};
pub use value::Value;
