//! Client-to-server packets.
//!
//! Each packet type knows how to append itself to the outbound buffer.
//! Fields gated on a revision threshold are written only when the
//! negotiated revision reaches it; [`Hello`] alone always writes its
//! full shape, since it is what negotiation starts from.
use bytes::{BufMut, BytesMut};

use crate::{io::WireWrite, protocol};

fn write_client_identity(buf: &mut BytesMut) {
    buf.put_str(protocol::CLIENT_NAME.as_bytes());
    buf.put_uvarint(protocol::CLIENT_VERSION_MAJOR);
    buf.put_uvarint(protocol::CLIENT_VERSION_MINOR);
    buf.put_uvarint(protocol::CLIENT_REVISION);
}

/// Session opener. Carries the client identity and credentials.
pub(crate) struct Hello<'a> {
    pub database: &'a str,
    pub user: &'a str,
    pub password: &'a str,
}

impl Hello<'_> {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_uvarint(protocol::client::HELLO);
        write_client_identity(buf);
        buf.put_str(self.database.as_bytes());
        buf.put_str(self.user.as_bytes());
        buf.put_str(self.password.as_bytes());
    }
}

/// Liveness probe. The server answers with Pong.
pub(crate) struct Ping;

impl Ping {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_uvarint(protocol::client::PING);
    }
}

/// Query execution request.
///
/// The client-info section repeats the identity from [`Hello`] together
/// with placeholder tracing fields; the server fills most of them in
/// itself for directly connected clients. Settings ride in front of the
/// SQL as name/flag/value triples with an empty-name terminator.
pub(crate) struct Query<'a> {
    pub sql: &'a str,
    pub revision: u64,
    pub settings: &'a [(String, String)],
}

impl Query<'_> {
    pub fn encode(&self, buf: &mut BytesMut) {
        let rev = self.revision;

        buf.put_uvarint(protocol::client::QUERY);
        buf.put_str(b""); // query id, server-assigned

        if rev >= protocol::MIN_REVISION_WITH_CLIENT_INFO {
            buf.put_uvarint(1); // initial query
            buf.put_str(b""); // initial user
            buf.put_str(b""); // initial query id
            buf.put_str(b"[::ffff:127.0.0.1]:0"); // initial address
            if rev >= protocol::MIN_REVISION_WITH_INITIAL_QUERY_START_TIME {
                buf.put_i64_le(0);
            }
            buf.put_uvarint(1); // interface: tcp
            buf.put_str(b""); // os user
            buf.put_str(b""); // client hostname
            write_client_identity(buf);
            if rev >= protocol::MIN_REVISION_WITH_QUOTA_KEY_IN_CLIENT_INFO {
                buf.put_str(b"");
            }
            if rev >= protocol::MIN_REVISION_WITH_DISTRIBUTED_DEPTH {
                buf.put_uvarint(0);
            }
            if rev >= protocol::MIN_REVISION_WITH_VERSION_PATCH {
                buf.put_uvarint(0);
            }
            if rev >= protocol::MIN_REVISION_WITH_OPENTELEMETRY {
                buf.put_uvarint(0); // no trace context
            }
        }

        if rev >= protocol::MIN_REVISION_WITH_SETTINGS_SERIALIZED_AS_STRINGS {
            for (name, value) in self.settings {
                buf.put_str(name.as_bytes());
                buf.put_uvarint(1); // important flag
                buf.put_str(value.as_bytes());
            }
        }
        buf.put_str(b""); // settings terminator

        if rev >= protocol::MIN_REVISION_WITH_INTERSERVER_SECRET {
            buf.put_str(b"");
        }

        buf.put_uvarint(protocol::STAGE_COMPLETE);
        buf.put_uvarint(protocol::COMPRESSION_DISABLE);
        buf.put_str(self.sql.as_bytes());
    }
}
