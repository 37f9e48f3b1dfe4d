//! Data blocks.
//!
//! Both directions of the protocol carry column data in blocks: a
//! column/row count header followed by each column's name, type string,
//! and serialized values. Revision gates decide whether the external
//! table name and the block info fields frame the payload.
use bytes::{BufMut, BytesMut};

use crate::{
    Result,
    io::{self, Stream, WireWrite},
    protocol,
    types::{TypeDesc, decode_column, encode_column},
    value::Value,
};

/// One decoded column of a block.
#[derive(Debug, Clone)]
pub struct Column {
    /// Column name as sent by the server.
    pub name: String,
    /// Type string as sent by the server, verbatim.
    pub type_name: String,
    /// Resolved descriptor for `type_name`.
    pub desc: TypeDesc,
    /// One value per row.
    pub values: Vec<Value>,
}

/// A decoded data block.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub columns: Vec<Column>,
    pub rows: usize,
}

impl Block {
    /// Returns `true` for the zero-column zero-row terminator block.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.rows == 0
    }
}

/// Read a block body. The packet code has already been consumed.
pub(crate) fn read_block<S: Stream>(io: &mut S, revision: u64) -> Result<Block> {
    if revision >= protocol::MIN_REVISION_WITH_TEMPORARY_TABLES {
        let _table_name = io::read_str(io)?;
    }
    if revision >= protocol::MIN_REVISION_WITH_BLOCK_INFO {
        // field id, is_overflows, field id, bucket num, terminator
        io::read_uvarint(io)?;
        io::read_uvarint(io)?;
        io::read_uvarint(io)?;
        io::read_i32(io)?;
        io::read_uvarint(io)?;
    }

    let cols = io::read_uvarint(io)? as usize;
    let rows = io::read_uvarint(io)? as usize;

    let mut columns = Vec::with_capacity(cols);
    for _ in 0..cols {
        let name = io::read_str(io)?;
        let type_name = io::read_str(io)?;
        let desc = TypeDesc::resolve(&type_name);
        let values = if rows > 0 {
            decode_column(io, &desc, rows)?
        } else {
            Vec::new()
        };
        columns.push(Column { name, type_name, desc, values });
    }
    Ok(Block { columns, rows })
}

/// Append a client data packet. `None` writes the zero-column zero-row
/// block that terminates queries and inserts.
pub(crate) fn write_block(
    buf: &mut BytesMut,
    revision: u64,
    block: Option<&Block>,
) -> Result<()> {
    buf.put_uvarint(protocol::client::DATA);
    if revision >= protocol::MIN_REVISION_WITH_TEMPORARY_TABLES {
        buf.put_str(b"");
    }
    if revision >= protocol::MIN_REVISION_WITH_BLOCK_INFO {
        buf.put_uvarint(1); // is_overflows field
        buf.put_uvarint(0);
        buf.put_uvarint(2); // bucket num field
        buf.put_i32_le(-1);
        buf.put_uvarint(0);
    }

    let Some(block) = block else {
        buf.put_uvarint(0);
        buf.put_uvarint(0);
        return Ok(());
    };

    buf.put_uvarint(block.columns.len() as u64);
    buf.put_uvarint(block.rows as u64);
    for column in &block.columns {
        buf.put_str(column.name.as_bytes());
        buf.put_str(column.type_name.as_bytes());
        if block.rows > 0 {
            encode_column(buf, &column.desc, &column.values)?;
        }
    }
    Ok(())
}
