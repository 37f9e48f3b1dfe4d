//! Column-level codec: nullable bitmaps and array offset framing on top
//! of the scalar engine.
//!
//! Arrays serialize breadth-first. For each nesting level the column
//! carries one cumulative `u64` end offset per cell of that level, then
//! the next level follows; scalar data for the fully flattened elements
//! comes last. A nullable backing kind places its bitmap between the
//! offsets and the scalar data, one byte per flattened element, with
//! scalar bytes present for null slots too.
use bytes::{BufMut, BytesMut};

use crate::{
    Result, Value,
    error::ProtocolError,
    io::{self, Stream},
    types::{TypeDesc, scalar},
};

/// Decode one column of `rows` cells.
pub(crate) fn decode_column<S: Stream>(
    io: &mut S,
    desc: &TypeDesc,
    rows: usize,
) -> Result<Vec<Value>> {
    // offsets[level] holds the end offset of every cell at that level
    let mut offsets: Vec<Vec<u64>> = Vec::with_capacity(desc.array_depth);
    let mut cells = rows;
    for _ in 0..desc.array_depth {
        let ends: Vec<u64> = (0..cells).map(|_| io::read_u64(io)).collect::<Result<_>>()?;
        cells = ends.last().copied().unwrap_or(0) as usize;
        offsets.push(ends);
    }

    let mut values = decode_flat(io, desc, cells)?;

    // regroup inner-out: each level's offsets slice the flat values into
    // per-cell arrays, which become the flat values of the level above
    for ends in offsets.iter().rev() {
        let mut drained = values.into_iter();
        let mut grouped = Vec::with_capacity(ends.len());
        let mut prev = 0u64;
        for &end in ends {
            let take = end
                .checked_sub(prev)
                .ok_or(ProtocolError::OutOfRange("array offsets"))?;
            grouped.push(Value::Array(drained.by_ref().take(take as usize).collect()));
            prev = end;
        }
        values = grouped;
    }
    Ok(values)
}

fn decode_flat<S: Stream>(io: &mut S, desc: &TypeDesc, count: usize) -> Result<Vec<Value>> {
    if !desc.nullable {
        return scalar::decode(io, &desc.kind, count);
    }
    let bitmap = io::read_bytes(io, count)?;
    let mut values = scalar::decode(io, &desc.kind, count)?;
    for (value, flag) in values.iter_mut().zip(bitmap) {
        if flag != 0 {
            *value = Value::Null;
        }
    }
    Ok(values)
}

/// Encode one column of cells.
pub(crate) fn encode_column(buf: &mut BytesMut, desc: &TypeDesc, values: &[Value]) -> Result<()> {
    let mut level: Vec<&Value> = values.iter().collect();
    for depth in 0..desc.array_depth {
        let mut flat = Vec::new();
        let mut end = 0u64;
        for cell in &level {
            let items = cell.as_array().ok_or(ProtocolError::ArrayDepth {
                expected: desc.array_depth,
                found: depth,
            })?;
            end += items.len() as u64;
            buf.put_u64_le(end);
            flat.extend(items);
        }
        level = flat;
    }
    if let Some(extra) = level.iter().find(|v| v.as_array().is_some()) {
        let mut found = desc.array_depth + 1;
        let mut probe = *extra;
        while let Some(items) = probe.as_array() {
            match items.first() {
                Some(inner) if inner.as_array().is_some() => {
                    found += 1;
                    probe = inner;
                }
                _ => break,
            }
        }
        return Err(ProtocolError::ArrayDepth { expected: desc.array_depth, found }.into());
    }
    encode_flat(buf, desc, &level)
}

fn encode_flat(buf: &mut BytesMut, desc: &TypeDesc, values: &[&Value]) -> Result<()> {
    if desc.nullable {
        for v in values {
            buf.put_u8(v.is_null() as u8);
        }
    }
    scalar::encode(buf, &desc.kind, values)
}
