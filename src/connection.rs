//! ClickHouse session.
//!
//! [`Connection`] owns the stream, the outbound buffer, and the session
//! state. All operations are synchronous: each one writes its packets,
//! then reads server packets until the exchange completes. Between
//! operations the stream is quiet, so the session is always at a packet
//! boundary when an operation starts.
mod config;

use std::net::{TcpStream, ToSocketAddrs};

use bytes::BytesMut;

pub use config::{Config, ParseError};

use crate::{
    Error, Result, Row,
    block::{self, Block, Column},
    error::{ProtocolError, UsageError},
    io::{self, Stream},
    message::{
        backend::{self, ProfileInfo, Progress, ServerInfo},
        frontend,
    },
    protocol::{self, server},
    types::TypeDesc,
};

/// Session lifecycle.
///
/// `Inserting` spans the window between [`Connection::insert_start`] and
/// [`Connection::insert_end`], when the server expects data blocks and
/// nothing else. `Closed` is terminal: it is entered by
/// [`Connection::close`] and by any error other than a server exception
/// or caller misuse, since those leave the stream position unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Ready,
    Inserting,
    Closed,
}

/// What ended a packet-dispatch loop.
enum Outcome {
    Pong,
    EndOfStream,
}

/// A synchronous ClickHouse session over one stream.
///
/// ```no_run
/// # fn main() -> klick::Result<()> {
/// let mut conn = klick::Connection::connect(&klick::Config::new())?;
/// for row in conn.query("SELECT number FROM system.numbers LIMIT 3")? {
///     println!("{:?}", row.get("number"));
/// }
/// # Ok(())
/// # }
/// ```
pub struct Connection<S = TcpStream> {
    io: S,
    wbuf: BytesMut,
    server: ServerInfo,
    revision: u64,
    state: SessionState,
    /// Destination table structure captured by `insert_start`:
    /// name, type string, resolved descriptor.
    insert_columns: Option<Vec<(String, String, TypeDesc)>>,
    last_progress: Progress,
    last_profile: Option<ProfileInfo>,
}

impl Connection<TcpStream> {
    /// Connect over TCP and perform the Hello exchange.
    pub fn connect(config: &Config) -> Result<Self> {
        let mut last_err = None;
        let addrs = config.addr().to_socket_addrs().map_err(Error::Connect)?;
        let stream = addrs
            .into_iter()
            .find_map(|addr| {
                match TcpStream::connect_timeout(&addr, config.connect_timeout) {
                    Ok(stream) => Some(stream),
                    Err(e) => {
                        last_err = Some(e);
                        None
                    }
                }
            })
            .ok_or_else(|| {
                Error::Connect(last_err.take().unwrap_or_else(|| {
                    std::io::Error::new(
                        std::io::ErrorKind::AddrNotAvailable,
                        "address resolved to nothing",
                    )
                }))
            })?;
        if config.tcp_nodelay {
            stream.set_nodelay(true).map_err(Error::Connect)?;
        }
        Self::with_stream(stream, config)
    }
}

impl<S: Stream> Connection<S> {
    /// Perform the Hello exchange over a caller-supplied stream.
    pub fn with_stream(mut stream: S, config: &Config) -> Result<Self> {
        let mut wbuf = BytesMut::with_capacity(1024);
        frontend::Hello {
            database: &config.database,
            user: &config.user,
            password: &config.pass,
        }
        .encode(&mut wbuf);
        io::flush(&mut stream, &mut wbuf)?;

        let code = io::read_uvarint(&mut stream)?;
        let server = match code {
            server::HELLO => backend::read_hello(&mut stream)?,
            server::EXCEPTION => return Err(backend::read_exception(&mut stream)?.into()),
            got => return Err(ProtocolError::Unexpected { phase: "handshake", got }.into()),
        };
        let revision = protocol::CLIENT_REVISION.min(server.revision);
        log::debug!(
            "connected to {} {}.{}.{} rev {} (negotiated {revision})",
            server.name,
            server.version_major,
            server.version_minor,
            server.version_patch,
            server.revision,
        );

        Ok(Self {
            io: stream,
            wbuf,
            server,
            revision,
            state: SessionState::Ready,
            insert_columns: None,
            last_progress: Progress::default(),
            last_profile: None,
        })
    }

    /// Identity the server reported in its Hello.
    pub fn server_info(&self) -> &ServerInfo {
        &self.server
    }

    /// Revision both sides agreed to speak.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Progress counters from the most recent Progress packet.
    pub fn last_progress(&self) -> Progress {
        self.last_progress
    }

    /// Profile counters from the most recent ProfileInfo packet, if any
    /// query produced one yet.
    pub fn last_profile(&self) -> Option<ProfileInfo> {
        self.last_profile
    }

    /// Execute a statement and collect every result row.
    pub fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        self.query_with_settings(sql, &[])
    }

    /// [`query`][Connection::query] with per-query server settings,
    /// serialized as strings ahead of the statement.
    pub fn query_with_settings(
        &mut self,
        sql: &str,
        settings: &[(String, String)],
    ) -> Result<Vec<Row>> {
        self.ready()?;
        let result = self.query_inner(sql, settings);
        self.fatal_guard(result)
    }

    /// Round-trip a Ping.
    pub fn ping(&mut self) -> Result<()> {
        self.ready()?;
        let result = self.ping_inner();
        self.fatal_guard(result)
    }

    /// Insert rows into `table` in one block.
    ///
    /// Column names come from the first row; every row must carry the
    /// same fields. Equivalent to the
    /// [`insert_start`][Connection::insert_start] /
    /// [`insert_block`][Connection::insert_block] /
    /// [`insert_end`][Connection::insert_end] triple.
    pub fn insert(&mut self, table: &str, rows: &[Row]) -> Result<()> {
        let Some(first) = rows.first() else {
            return Err(UsageError::EmptyInsert.into());
        };
        let columns: Vec<&str> = first.names().collect();
        self.insert_start(table, &columns)?;
        self.insert_block(rows)?;
        self.insert_end()
    }

    /// Open a streaming insert into `table` for the named columns.
    ///
    /// Sends the INSERT statement and captures the destination table
    /// structure the server replies with; the session then accepts
    /// [`insert_block`][Connection::insert_block] calls until
    /// [`insert_end`][Connection::insert_end].
    pub fn insert_start(&mut self, table: &str, columns: &[&str]) -> Result<()> {
        self.ready()?;
        let result = self.insert_start_inner(table, columns);
        self.fatal_guard(result)
    }

    /// Write one block of rows into the open insert.
    ///
    /// The block's columns come from the first row's field names; types
    /// come from the structure captured at
    /// [`insert_start`][Connection::insert_start], matched by exact name.
    pub fn insert_block(&mut self, rows: &[Row]) -> Result<()> {
        match self.state {
            SessionState::Inserting => {}
            SessionState::Ready => return Err(UsageError::InsertNotStarted.into()),
            SessionState::Closed => return Err(UsageError::SessionClosed.into()),
        }
        let result = self.insert_block_inner(rows);
        self.fatal_guard(result)
    }

    /// Terminate the open insert and drain the server's reply.
    pub fn insert_end(&mut self) -> Result<()> {
        match self.state {
            SessionState::Inserting => {}
            SessionState::Ready => return Err(UsageError::InsertNotStarted.into()),
            SessionState::Closed => return Err(UsageError::SessionClosed.into()),
        }
        let result = self.insert_end_inner();
        let result = self.fatal_guard(result);
        self.insert_columns = None;
        if self.state == SessionState::Inserting {
            // the insert is over either way; a server exception here
            // aborted it without desyncing the stream
            self.state = SessionState::Ready;
        }
        result
    }

    /// Close the session. Further operations fail with
    /// [`UsageError::SessionClosed`].
    pub fn close(&mut self) -> Result<()> {
        self.state = SessionState::Closed;
        self.io.close().map_err(Error::Write)
    }

    fn ready(&self) -> Result<()> {
        match self.state {
            SessionState::Ready => Ok(()),
            SessionState::Inserting => Err(UsageError::OperationInFlight.into()),
            SessionState::Closed => Err(UsageError::SessionClosed.into()),
        }
    }

    /// Server exceptions and caller misuse leave the stream at a packet
    /// boundary; everything else leaves it in an unknown position, so
    /// the session closes.
    fn fatal_guard<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if !matches!(e, Error::Server(_) | Error::Usage(_)) {
                log::debug!("closing session: {e}");
                self.state = SessionState::Closed;
            }
        }
        result
    }

    fn query_inner(&mut self, sql: &str, settings: &[(String, String)]) -> Result<Vec<Row>> {
        log::debug!("query: {sql}");
        frontend::Query { sql, revision: self.revision, settings }.encode(&mut self.wbuf);
        block::write_block(&mut self.wbuf, self.revision, None)?;
        io::flush(&mut self.io, &mut self.wbuf)?;

        let mut rows = Vec::new();
        match self.dispatch("query", &mut rows)? {
            Outcome::EndOfStream => Ok(rows),
            Outcome::Pong => {
                Err(ProtocolError::Unexpected { phase: "query", got: server::PONG }.into())
            }
        }
    }

    fn ping_inner(&mut self) -> Result<()> {
        frontend::Ping.encode(&mut self.wbuf);
        io::flush(&mut self.io, &mut self.wbuf)?;

        let mut rows = Vec::new();
        match self.dispatch("ping", &mut rows)? {
            Outcome::Pong => Ok(()),
            Outcome::EndOfStream => {
                Err(ProtocolError::Unexpected { phase: "ping", got: server::END_OF_STREAM }.into())
            }
        }
    }

    fn insert_start_inner(&mut self, table: &str, columns: &[&str]) -> Result<()> {
        let sql = format!("INSERT INTO {table} ({}) VALUES", columns.join(", "));
        log::debug!("insert: {sql}");
        frontend::Query { sql: &sql, revision: self.revision, settings: &[] }
            .encode(&mut self.wbuf);
        block::write_block(&mut self.wbuf, self.revision, None)?;
        io::flush(&mut self.io, &mut self.wbuf)?;

        // the server answers with a zero-row block describing the
        // destination table
        loop {
            let code = io::read_uvarint(&mut self.io)?;
            match code {
                server::DATA => {
                    let description = block::read_block(&mut self.io, self.revision)?;
                    log::trace!(
                        "insert target described with {} columns",
                        description.columns.len(),
                    );
                    self.insert_columns = Some(
                        description
                            .columns
                            .into_iter()
                            .map(|col| (col.name, col.type_name, col.desc))
                            .collect(),
                    );
                    self.state = SessionState::Inserting;
                    return Ok(());
                }
                server::PROGRESS => {
                    self.last_progress = backend::read_progress(&mut self.io, self.revision)?;
                }
                server::LOG | server::PROFILE_EVENTS => {
                    block::read_block(&mut self.io, self.revision)?;
                }
                server::TABLE_COLUMNS => backend::read_table_columns(&mut self.io)?,
                server::EXCEPTION => {
                    return Err(backend::read_exception(&mut self.io)?.into());
                }
                got => {
                    return Err(ProtocolError::Unexpected { phase: "insert start", got }.into());
                }
            }
        }
    }

    fn insert_block_inner(&mut self, rows: &[Row]) -> Result<()> {
        let Some(first) = rows.first() else {
            return Err(UsageError::EmptyInsert.into());
        };
        let registered = self.insert_columns.as_deref().unwrap_or(&[]);

        let mut columns = Vec::with_capacity(first.len());
        for name in first.names() {
            let (name, type_name, desc) = registered
                .iter()
                .find(|(registered_name, _, _)| registered_name.as_str() == name)
                .ok_or_else(|| UsageError::UnknownColumn(name.to_owned()))?;
            let mut values = Vec::with_capacity(rows.len());
            for row in rows {
                let value = row.get(name).ok_or_else(|| {
                    UsageError::Value(format!("row is missing column {name:?}"))
                })?;
                values.push(value.clone());
            }
            columns.push(Column {
                name: name.clone(),
                type_name: type_name.clone(),
                desc: desc.clone(),
                values,
            });
        }

        let data = Block { columns, rows: rows.len() };
        block::write_block(&mut self.wbuf, self.revision, Some(&data))?;
        io::flush(&mut self.io, &mut self.wbuf)
    }

    fn insert_end_inner(&mut self) -> Result<()> {
        block::write_block(&mut self.wbuf, self.revision, None)?;
        io::flush(&mut self.io, &mut self.wbuf)?;

        let mut rows = Vec::new();
        match self.dispatch("insert end", &mut rows)? {
            Outcome::EndOfStream => Ok(()),
            Outcome::Pong => {
                Err(ProtocolError::Unexpected { phase: "insert end", got: server::PONG }.into())
            }
        }
    }

    /// Read server packets until the exchange completes, folding data
    /// blocks into `rows`.
    fn dispatch(&mut self, phase: &'static str, rows: &mut Vec<Row>) -> Result<Outcome> {
        loop {
            let code = io::read_uvarint(&mut self.io)?;
            log::trace!("server packet {code} during {phase}");
            match code {
                server::DATA => {
                    let data = block::read_block(&mut self.io, self.revision)?;
                    self.merge(data, rows);
                }
                server::EXCEPTION => {
                    return Err(backend::read_exception(&mut self.io)?.into());
                }
                server::PROGRESS => {
                    self.last_progress = backend::read_progress(&mut self.io, self.revision)?;
                }
                server::PONG => return Ok(Outcome::Pong),
                server::END_OF_STREAM => return Ok(Outcome::EndOfStream),
                server::PROFILE_INFO => {
                    self.last_profile = Some(backend::read_profile_info(&mut self.io)?);
                }
                // server logs and profile events ride in data blocks;
                // consumed to stay at a packet boundary, not surfaced
                server::LOG | server::PROFILE_EVENTS => {
                    block::read_block(&mut self.io, self.revision)?;
                }
                server::TABLE_COLUMNS => backend::read_table_columns(&mut self.io)?,
                server::TOTALS => {
                    return Err(ProtocolError::UnsupportedPacket("Totals").into());
                }
                server::EXTREMES => {
                    return Err(ProtocolError::UnsupportedPacket("Extremes").into());
                }
                server::TABLES_STATUS => {
                    return Err(ProtocolError::UnsupportedPacket("TablesStatus").into());
                }
                server::PART_UUIDS => {
                    return Err(ProtocolError::UnsupportedPacket("PartUUIDs").into());
                }
                server::READ_TASK_REQUEST => {
                    return Err(ProtocolError::UnsupportedPacket("ReadTaskRequest").into());
                }
                server::HELLO => {
                    return Err(ProtocolError::Unexpected { phase, got: code }.into());
                }
                unknown => return Err(ProtocolError::UnknownPacket(unknown).into()),
            }
        }
    }

    /// Append a data block's rows, one [`Row`] per block row with every
    /// column's value under its column name.
    fn merge(&self, data: Block, rows: &mut Vec<Row>) {
        if data.rows == 0 {
            return;
        }
        let mut incoming: Vec<Row> = (0..data.rows).map(|_| Row::new()).collect();
        for column in data.columns {
            for (row, value) in incoming.iter_mut().zip(column.values) {
                row.push(column.name.clone(), value);
            }
        }
        rows.extend(incoming);
    }
}

#[cfg(test)]
mod test {
    use bytes::BufMut;

    use super::*;
    use crate::Value;
    use crate::error::ServerError;
    use crate::io::WireWrite;
    use crate::io::test::MockStream;
    use crate::protocol::CLIENT_REVISION;

    fn server_hello(revision: u64) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_uvarint(server::HELLO);
        buf.put_str(b"ClickHouse");
        buf.put_uvarint(23);
        buf.put_uvarint(8);
        buf.put_uvarint(revision);
        if revision >= protocol::MIN_REVISION_WITH_SERVER_TIMEZONE {
            buf.put_str(b"UTC");
        }
        if revision >= protocol::MIN_REVISION_WITH_SERVER_DISPLAY_NAME {
            buf.put_str(b"test");
        }
        if revision >= protocol::MIN_REVISION_WITH_VERSION_PATCH {
            buf.put_uvarint(3);
        }
        buf
    }

    /// Serialize a block as the server would: client framing with the
    /// server Data packet code in front.
    fn server_block(revision: u64, block: Option<&Block>) -> BytesMut {
        let mut buf = BytesMut::new();
        block::write_block(&mut buf, revision, block).unwrap();
        buf[0] = server::DATA as u8;
        buf
    }

    fn server_exception() -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_uvarint(server::EXCEPTION);
        buf.put_i32_le(60);
        buf.put_str(b"DB::Exception");
        buf.put_str(b"DB::Exception: Table default.t does not exist");
        buf.put_str(b"");
        buf.put_u8(0);
        buf
    }

    fn end_of_stream() -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_uvarint(server::END_OF_STREAM);
        buf
    }

    fn connect(script: BytesMut) -> Connection<MockStream> {
        Connection::with_stream(MockStream::new(script.to_vec()), &Config::default()).unwrap()
    }

    fn data_block(rows: &[u32]) -> Block {
        Block {
            columns: vec![Column {
                name: "n".into(),
                type_name: "UInt32".into(),
                desc: TypeDesc::resolve("UInt32"),
                values: rows.iter().map(|&n| Value::UInt32(n)).collect(),
            }],
            rows: rows.len(),
        }
    }

    #[test]
    fn handshake_negotiates_minimum_revision() {
        let conn = connect(server_hello(54460));
        assert_eq!(conn.revision(), CLIENT_REVISION);
        assert_eq!(conn.server_info().revision, 54460);
        assert_eq!(conn.server_info().timezone, "UTC");

        let conn = connect(server_hello(54058));
        assert_eq!(conn.revision(), 54058);
        assert_eq!(conn.server_info().display_name, "");
    }

    #[test]
    fn handshake_sends_hello_packet() {
        let conn = connect(server_hello(54451));

        let mut expect = BytesMut::new();
        frontend::Hello { database: "default", user: "default", password: "" }
            .encode(&mut expect);
        assert_eq!(conn.io.output, &expect[..]);
    }

    #[test]
    fn handshake_surfaces_server_exception() {
        let result =
            Connection::with_stream(MockStream::new(server_exception().to_vec()), &Config::default());
        match result {
            Err(Error::Server(ServerError { code: 60, .. })) => {}
            other => panic!("expected server error, got {:?}", other.err()),
        }
    }

    #[test]
    fn query_collects_rows_across_blocks() {
        let mut script = server_hello(54451);
        script.extend_from_slice(&server_block(CLIENT_REVISION, Some(&data_block(&[1, 2]))));
        script.extend_from_slice(&server_block(CLIENT_REVISION, Some(&data_block(&[3]))));
        script.extend_from_slice(&server_block(CLIENT_REVISION, None));
        script.extend_from_slice(&end_of_stream());

        let mut conn = connect(script);
        let rows = conn.query("SELECT n FROM t").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("n"), Some(&Value::UInt32(1)));
        assert_eq!(rows[2].get("n"), Some(&Value::UInt32(3)));
        assert!(conn.io.input.is_empty(), "full reply consumed");
    }

    #[test]
    fn log_and_profile_events_blocks_are_discarded() {
        let chatter = Block {
            columns: vec![Column {
                name: "text".into(),
                type_name: "String".into(),
                desc: TypeDesc::resolve("String"),
                values: vec![Value::String("MemoryTracker: peak 1.00 MiB".into())],
            }],
            rows: 1,
        };
        let mut log = BytesMut::new();
        block::write_block(&mut log, CLIENT_REVISION, Some(&chatter)).unwrap();
        log[0] = server::LOG as u8;
        let mut events = BytesMut::new();
        block::write_block(&mut events, CLIENT_REVISION, Some(&chatter)).unwrap();
        events[0] = server::PROFILE_EVENTS as u8;

        let mut script = server_hello(54451);
        script.extend_from_slice(&server_block(CLIENT_REVISION, Some(&data_block(&[1]))));
        script.extend_from_slice(&log);
        script.extend_from_slice(&events);
        script.extend_from_slice(&server_block(CLIENT_REVISION, Some(&data_block(&[2]))));
        script.extend_from_slice(&end_of_stream());

        let mut conn = connect(script);
        let rows = conn.query("SELECT n FROM t").unwrap();
        assert_eq!(rows.len(), 2, "server chatter must not leak into results");
        assert_eq!(rows[0].get("n"), Some(&Value::UInt32(1)));
        assert_eq!(rows[1].get("n"), Some(&Value::UInt32(2)));
        assert!(conn.io.input.is_empty(), "chatter blocks fully consumed");
    }

    #[test]
    fn query_exception_leaves_session_usable() {
        let mut script = server_hello(54451);
        script.extend_from_slice(&server_exception());
        script.extend_from_slice(&end_of_stream());

        let mut conn = connect(script);
        match conn.query("SELECT broken") {
            Err(Error::Server(e)) => {
                assert_eq!(e.code, 60);
                assert_eq!(e.message, "Table default.t does not exist");
            }
            other => panic!("expected server error, got {:?}", other.err()),
        }
        // next operation still runs
        assert!(conn.query("SELECT 1").unwrap().is_empty());
    }

    #[test]
    fn query_progress_is_retained() {
        let mut script = server_hello(54451);
        script.put_uvarint(server::PROGRESS);
        script.put_uvarint(100);
        script.put_uvarint(4096);
        script.put_uvarint(1000);
        script.put_uvarint(0);
        script.put_uvarint(0);
        script.extend_from_slice(&end_of_stream());

        let mut conn = connect(script);
        conn.query("SELECT 1").unwrap();
        assert_eq!(conn.last_progress().rows, 100);
        assert_eq!(conn.last_progress().total_rows, 1000);
    }

    #[test]
    fn totals_packet_is_fatal() {
        let mut script = server_hello(54451);
        script.put_uvarint(server::TOTALS);

        let mut conn = connect(script);
        match conn.query("SELECT sum(n) FROM t WITH TOTALS") {
            Err(Error::Protocol(ProtocolError::UnsupportedPacket("Totals"))) => {}
            other => panic!("expected protocol error, got {:?}", other.err()),
        }
        // the session closed; the stream position is unknown
        match conn.query("SELECT 1") {
            Err(Error::Usage(UsageError::SessionClosed)) => {}
            other => panic!("expected closed session, got {:?}", other.err()),
        }
    }

    #[test]
    fn unknown_packet_code_is_fatal() {
        let mut script = server_hello(54451);
        script.put_uvarint(99);

        let mut conn = connect(script);
        match conn.query("SELECT 1") {
            Err(Error::Protocol(ProtocolError::UnknownPacket(99))) => {}
            other => panic!("expected protocol error, got {:?}", other.err()),
        }
    }

    #[test]
    fn ping_pong() {
        let mut script = server_hello(54451);
        script.put_uvarint(server::PONG);

        let mut conn = connect(script);
        conn.ping().unwrap();
        // ping packet code went out after the hello
        assert_eq!(conn.io.output.last(), Some(&(protocol::client::PING as u8)));
    }

    #[test]
    fn query_packet_goes_out_with_terminator_block() {
        let mut script = server_hello(54451);
        script.extend_from_slice(&end_of_stream());

        let mut conn = connect(script);
        conn.query("SELECT 1").unwrap();

        let mut expect = BytesMut::new();
        frontend::Hello { database: "default", user: "default", password: "" }
            .encode(&mut expect);
        frontend::Query { sql: "SELECT 1", revision: CLIENT_REVISION, settings: &[] }
            .encode(&mut expect);
        block::write_block(&mut expect, CLIENT_REVISION, None).unwrap();
        assert_eq!(conn.io.output, &expect[..]);
    }

    fn description_block() -> Block {
        Block {
            columns: vec![
                Column {
                    name: "id".into(),
                    type_name: "UInt32".into(),
                    desc: TypeDesc::resolve("UInt32"),
                    values: vec![],
                },
                Column {
                    name: "name".into(),
                    type_name: "String".into(),
                    desc: TypeDesc::resolve("String"),
                    values: vec![],
                },
            ],
            rows: 0,
        }
    }

    #[test]
    fn insert_round_trip() {
        let mut script = server_hello(54451);
        script.extend_from_slice(&server_block(CLIENT_REVISION, Some(&description_block())));
        script.extend_from_slice(&end_of_stream());

        let mut conn = connect(script);
        let rows = vec![
            Row::new().with("id", 1u32).with("name", "a"),
            Row::new().with("id", 2u32).with("name", "b"),
        ];
        conn.insert("t", &rows).unwrap();
        assert!(conn.io.input.is_empty());

        // wire: hello, insert query + terminator, data block, terminator
        let mut expect = BytesMut::new();
        frontend::Hello { database: "default", user: "default", password: "" }
            .encode(&mut expect);
        frontend::Query {
            sql: "INSERT INTO t (id, name) VALUES",
            revision: CLIENT_REVISION,
            settings: &[],
        }
        .encode(&mut expect);
        block::write_block(&mut expect, CLIENT_REVISION, None).unwrap();
        let data = Block {
            columns: vec![
                Column {
                    name: "id".into(),
                    type_name: "UInt32".into(),
                    desc: TypeDesc::resolve("UInt32"),
                    values: vec![Value::UInt32(1), Value::UInt32(2)],
                },
                Column {
                    name: "name".into(),
                    type_name: "String".into(),
                    desc: TypeDesc::resolve("String"),
                    values: vec![Value::String("a".into()), Value::String("b".into())],
                },
            ],
            rows: 2,
        };
        block::write_block(&mut expect, CLIENT_REVISION, Some(&data)).unwrap();
        block::write_block(&mut expect, CLIENT_REVISION, None).unwrap();
        assert_eq!(conn.io.output, &expect[..]);
    }

    #[test]
    fn insert_block_requires_insert_start() {
        let mut conn = connect(server_hello(54451));
        let rows = vec![Row::new().with("id", 1u32)];
        match conn.insert_block(&rows) {
            Err(Error::Usage(UsageError::InsertNotStarted)) => {}
            other => panic!("expected usage error, got {:?}", other.err()),
        }
    }

    #[test]
    fn insert_rejects_unregistered_column() {
        let mut script = server_hello(54451);
        script.extend_from_slice(&server_block(CLIENT_REVISION, Some(&description_block())));

        let mut conn = connect(script);
        conn.insert_start("t", &["id"]).unwrap();
        let rows = vec![Row::new().with("nope", 1u32)];
        match conn.insert_block(&rows) {
            Err(Error::Usage(UsageError::UnknownColumn(name))) => assert_eq!(name, "nope"),
            other => panic!("expected usage error, got {:?}", other.err()),
        }
    }

    #[test]
    fn query_during_insert_is_rejected() {
        let mut script = server_hello(54451);
        script.extend_from_slice(&server_block(CLIENT_REVISION, Some(&description_block())));

        let mut conn = connect(script);
        conn.insert_start("t", &["id"]).unwrap();
        match conn.query("SELECT 1") {
            Err(Error::Usage(UsageError::OperationInFlight)) => {}
            other => panic!("expected usage error, got {:?}", other.err()),
        }
    }

    #[test]
    fn empty_insert_is_rejected() {
        let mut conn = connect(server_hello(54451));
        match conn.insert("t", &[]) {
            Err(Error::Usage(UsageError::EmptyInsert)) => {}
            other => panic!("expected usage error, got {:?}", other.err()),
        }
    }

    #[test]
    fn closed_session_rejects_operations() {
        let mut conn = connect(server_hello(54451));
        conn.close().unwrap();
        match conn.ping() {
            Err(Error::Usage(UsageError::SessionClosed)) => {}
            other => panic!("expected usage error, got {:?}", other.err()),
        }
    }
}
