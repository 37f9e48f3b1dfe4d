//! Scalar encode/decode engine.
//!
//! Per [`ScalarKind`], batch `decode(count) -> values` and
//! `encode(values) -> bytes`. Fixed-width numeric kinds transcode
//! little-endian in one pass; the remaining kinds run per value.
//! Value-level formatting (calendar dates, decimal points, network
//! addresses, UUID text) happens here, post-decode and pre-encode.
use bytes::{Buf, BufMut, BytesMut};

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use crate::{
    Result, Value,
    error::{ProtocolError, UsageError},
    io::{self, Stream, WireWrite},
    types::ScalarKind,
};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const DATETIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

const SECS_PER_DAY: i64 = 86_400;

/// Total byte size of `rows` fixed-width values. A corrupt row count
/// whose product overflows `usize` is rejected before any allocation.
fn byte_len(rows: usize, width: usize) -> Result<usize> {
    rows.checked_mul(width)
        .ok_or_else(|| ProtocolError::OutOfRange("row count").into())
}

/// Decode `rows` values of one scalar kind.
pub(crate) fn decode<S: Stream>(io: &mut S, kind: &ScalarKind, rows: usize) -> Result<Vec<Value>> {
    macro_rules! fixed {
        ($width:literal, $get:ident, $variant:ident) => {{
            let raw = io::read_bytes(io, byte_len(rows, $width)?)?;
            let mut buf = &raw[..];
            Ok((0..rows).map(|_| Value::$variant(buf.$get())).collect())
        }};
    }

    match kind {
        ScalarKind::Int8 => fixed!(1, get_i8, Int8),
        ScalarKind::Int16 => fixed!(2, get_i16_le, Int16),
        ScalarKind::Int32 => fixed!(4, get_i32_le, Int32),
        ScalarKind::Int64 => fixed!(8, get_i64_le, Int64),
        ScalarKind::Int128 => fixed!(16, get_i128_le, Int128),
        ScalarKind::UInt8 => fixed!(1, get_u8, UInt8),
        ScalarKind::UInt16 => fixed!(2, get_u16_le, UInt16),
        ScalarKind::UInt32 => fixed!(4, get_u32_le, UInt32),
        ScalarKind::UInt64 => fixed!(8, get_u64_le, UInt64),
        ScalarKind::Float32 => fixed!(4, get_f32_le, Float32),
        ScalarKind::Float64 => fixed!(8, get_f64_le, Float64),
        ScalarKind::String => {
            let mut values = Vec::with_capacity(rows);
            let mut scratch = Vec::new();
            for _ in 0..rows {
                io::read_str_bytes(io, &mut scratch)?;
                values.push(match String::from_utf8(scratch.clone()) {
                    Ok(s) => Value::String(s),
                    Err(e) => Value::Bytes(e.into_bytes()),
                });
            }
            Ok(values)
        }
        // raw bytes, untrimmed
        ScalarKind::FixedString(n) => {
            (0..rows).map(|_| Ok(Value::Bytes(io::read_bytes(io, *n)?))).collect()
        }
        ScalarKind::Uuid => (0..rows)
            .map(|_| {
                let raw = io::read_bytes(io, 16)?;
                Ok(Value::String(format_uuid(&raw)))
            })
            .collect(),
        ScalarKind::Date => (0..rows)
            .map(|_| {
                let mut day = [0u8; 2];
                io::read_exact(io, &mut day)?;
                decode_date(u16::from_le_bytes(day)).map(Value::String)
            })
            .collect(),
        ScalarKind::DateTime => (0..rows)
            .map(|_| {
                let mut ts = [0u8; 4];
                io::read_exact(io, &mut ts)?;
                decode_datetime(u32::from_le_bytes(ts)).map(Value::String)
            })
            .collect(),
        ScalarKind::DateTime64(_) => (0..rows)
            .map(|_| decode_datetime64(io::read_u64(io)?).map(Value::String))
            .collect(),
        ScalarKind::Decimal32(scale) => {
            let raw = io::read_bytes(io, byte_len(rows, 4)?)?;
            let mut buf = &raw[..];
            let div = 10f64.powi(*scale as i32);
            Ok((0..rows).map(|_| Value::Float64(f64::from(buf.get_i32_le()) / div)).collect())
        }
        ScalarKind::Decimal64(scale) => {
            let raw = io::read_bytes(io, byte_len(rows, 8)?)?;
            let mut buf = &raw[..];
            let div = 10f64.powi(*scale as i32);
            Ok((0..rows).map(|_| Value::Float64(buf.get_i64_le() as f64 / div)).collect())
        }
        ScalarKind::Decimal128(scale) => {
            let raw = io::read_bytes(io, byte_len(rows, 16)?)?;
            let mut buf = &raw[..];
            Ok((0..rows)
                .map(|_| Value::String(format_decimal128(buf.get_i128_le(), *scale)))
                .collect())
        }
        ScalarKind::Ipv4 => {
            let raw = io::read_bytes(io, byte_len(rows, 4)?)?;
            let mut buf = &raw[..];
            Ok((0..rows).map(|_| Value::String(format_ipv4(buf.get_u32_le()))).collect())
        }
        ScalarKind::Ipv6 => (0..rows)
            .map(|_| {
                let raw = io::read_bytes(io, 16)?;
                Ok(Value::String(format_ipv6(&raw)))
            })
            .collect(),
        ScalarKind::Unsupported(name) => {
            Err(ProtocolError::UnsupportedType(name.clone()).into())
        }
    }
}

/// Encode values of one scalar kind.
///
/// Null entries encode as the kind's zero; the surrounding column codec
/// has already recorded them in the null bitmap when the column is
/// nullable.
pub(crate) fn encode(buf: &mut BytesMut, kind: &ScalarKind, values: &[&Value]) -> Result<()> {
    macro_rules! int {
        ($as:ident, $ty:ty, $put:ident, $name:literal) => {{
            for v in values {
                let n: $ty = match v {
                    Value::Null => 0,
                    v => v
                        .$as()
                        .and_then(|n| n.try_into().ok())
                        .ok_or_else(|| mismatch($name, v))?,
                };
                buf.$put(n);
            }
            Ok(())
        }};
    }

    match kind {
        ScalarKind::Int8 => int!(as_i64, i8, put_i8, "int8"),
        ScalarKind::Int16 => int!(as_i64, i16, put_i16_le, "int16"),
        ScalarKind::Int32 => int!(as_i64, i32, put_i32_le, "int32"),
        ScalarKind::Int64 => int!(as_i64, i64, put_i64_le, "int64"),
        ScalarKind::Int128 => int!(as_i128, i128, put_i128_le, "int128"),
        ScalarKind::UInt8 => int!(as_u64, u8, put_u8, "uint8"),
        ScalarKind::UInt16 => int!(as_u64, u16, put_u16_le, "uint16"),
        ScalarKind::UInt32 => int!(as_u64, u32, put_u32_le, "uint32"),
        ScalarKind::UInt64 => int!(as_u64, u64, put_u64_le, "uint64"),
        ScalarKind::Float32 => {
            for v in values {
                let n = match v {
                    Value::Null => 0.0,
                    v => v.as_f64().ok_or_else(|| mismatch("float32", v))?,
                };
                buf.put_f32_le(n as f32);
            }
            Ok(())
        }
        ScalarKind::Float64 => {
            for v in values {
                let n = match v {
                    Value::Null => 0.0,
                    v => v.as_f64().ok_or_else(|| mismatch("float64", v))?,
                };
                buf.put_f64_le(n);
            }
            Ok(())
        }
        ScalarKind::String => {
            for v in values {
                let bytes = match v {
                    Value::Null => &[][..],
                    v => v.as_bytes().ok_or_else(|| mismatch("string", v))?,
                };
                buf.put_str(bytes);
            }
            Ok(())
        }
        ScalarKind::FixedString(n) => {
            for v in values {
                let bytes = match v {
                    Value::Null => &[][..],
                    v => v.as_bytes().ok_or_else(|| mismatch("fixedstring", v))?,
                };
                if bytes.len() > *n {
                    return Err(UsageError::Value(format!(
                        "value of {} bytes exceeds FixedString({n})",
                        bytes.len()
                    ))
                    .into());
                }
                buf.put_slice(bytes);
                buf.put_bytes(0, n - bytes.len());
            }
            Ok(())
        }
        ScalarKind::Uuid => {
            for v in values {
                match v {
                    Value::Null => buf.put_bytes(0, 16),
                    v => {
                        let s = v.as_str().ok_or_else(|| mismatch("uuid", v))?;
                        buf.put_slice(&parse_uuid(s)?);
                    }
                }
            }
            Ok(())
        }
        ScalarKind::Date => {
            for v in values {
                buf.put_u16_le(encode_date(v)?);
            }
            Ok(())
        }
        ScalarKind::DateTime => {
            for v in values {
                buf.put_u32_le(encode_datetime(v)?);
            }
            Ok(())
        }
        ScalarKind::DateTime64(digits) => {
            for v in values {
                buf.put_u64_le(encode_datetime64(v, *digits)?);
            }
            Ok(())
        }
        ScalarKind::Decimal32(scale) => {
            let mul = 10f64.powi(*scale as i32);
            for v in values {
                buf.put_i32_le((decimal_input(v, "decimal32")? * mul) as i32);
            }
            Ok(())
        }
        ScalarKind::Decimal64(scale) => {
            let mul = 10f64.powi(*scale as i32);
            for v in values {
                buf.put_i64_le((decimal_input(v, "decimal64")? * mul) as i64);
            }
            Ok(())
        }
        ScalarKind::Decimal128(scale) => {
            for v in values {
                buf.put_i128_le(encode_decimal128(v, *scale)?);
            }
            Ok(())
        }
        ScalarKind::Ipv4 => {
            for v in values {
                let n = match v {
                    Value::Null => 0,
                    v => match v.as_str() {
                        Some(s) => parse_ipv4(s)?,
                        None => v.as_u64().and_then(|n| n.try_into().ok())
                            .ok_or_else(|| mismatch("ipv4", v))?,
                    },
                };
                buf.put_u32_le(n);
            }
            Ok(())
        }
        ScalarKind::Ipv6 => {
            for v in values {
                match v {
                    Value::Null => buf.put_bytes(0, 16),
                    v => {
                        let s = v.as_str().ok_or_else(|| mismatch("ipv6", v))?;
                        buf.put_slice(&parse_ipv6(s)?);
                    }
                }
            }
            Ok(())
        }
        ScalarKind::Unsupported(name) => {
            Err(ProtocolError::UnsupportedType(name.clone()).into())
        }
    }
}

fn mismatch(expected: &str, got: &Value) -> crate::Error {
    UsageError::Value(format!("cannot encode {} value as {expected}", got.kind_name())).into()
}

// ===== Temporal =====

fn decode_date(days: u16) -> Result<String> {
    let ts = i64::from(days) * SECS_PER_DAY;
    let date = OffsetDateTime::from_unix_timestamp(ts)
        .map_err(|_| ProtocolError::OutOfRange("date"))?
        .date();
    date.format(DATE_FORMAT).map_err(|_| ProtocolError::OutOfRange("date").into())
}

/// Calendar date to epoch days, ceiling-rounded.
///
/// The division only has a remainder for intra-day timestamps, which a
/// plain `YYYY-MM-DD` input never produces; the rounding direction is
/// kept stable on the wire.
fn encode_date(v: &Value) -> Result<u16> {
    let ts = match v {
        Value::Null => return Ok(0),
        v => match v.as_str() {
            Some(s) => Date::parse(s, DATE_FORMAT)
                .map_err(|e| UsageError::Value(format!("bad date {s:?}: {e}")))?
                .midnight()
                .assume_utc()
                .unix_timestamp(),
            // integers pass through as raw epoch days
            None => return v.as_u64().and_then(|n| n.try_into().ok())
                .ok_or_else(|| mismatch("date", v)),
        },
    };
    let days = ts.div_euclid(SECS_PER_DAY) + i64::from(ts.rem_euclid(SECS_PER_DAY) != 0);
    days.try_into().map_err(|_| UsageError::Value(format!("date out of range: {v}")).into())
}

fn decode_datetime(ts: u32) -> Result<String> {
    OffsetDateTime::from_unix_timestamp(i64::from(ts))
        .map_err(|_| ProtocolError::OutOfRange("datetime"))?
        .format(DATETIME_FORMAT)
        .map_err(|_| ProtocolError::OutOfRange("datetime").into())
}

fn parse_datetime_secs(s: &str) -> Result<i64> {
    Ok(PrimitiveDateTime::parse(s, DATETIME_FORMAT)
        .map_err(|e| UsageError::Value(format!("bad datetime {s:?}: {e}")))?
        .assume_utc()
        .unix_timestamp())
}

fn encode_datetime(v: &Value) -> Result<u32> {
    let ts = match v {
        Value::Null => return Ok(0),
        v => match v.as_str() {
            Some(s) => parse_datetime_secs(s)?,
            None => return v.as_u64().and_then(|n| n.try_into().ok())
                .ok_or_else(|| mismatch("datetime", v)),
        },
    };
    ts.try_into().map_err(|_| UsageError::Value(format!("datetime out of range: {v}")).into())
}

/// Split a `DateTime64` integer: the first 10 digits are whole seconds,
/// the rest the fractional part. Valid while epoch seconds are 10
/// digits wide (2001..2286).
fn decode_datetime64(v: u64) -> Result<String> {
    let mut itoa = itoa::Buffer::new();
    let digits = itoa.format(v);
    let (secs, frac) = digits.split_at(digits.len().min(10));
    let secs: i64 = secs.parse().map_err(|_| ProtocolError::OutOfRange("datetime64"))?;
    OffsetDateTime::from_unix_timestamp(secs)
        .map_err(|_| ProtocolError::OutOfRange("datetime64"))?
        .format(DATETIME_FORMAT)
        .map(|dt| format!("{dt}.{frac}"))
        .map_err(|_| ProtocolError::OutOfRange("datetime64").into())
}

/// Whole seconds concatenated with the fractional digits, zero-padded
/// to `digits` places (capped at 9), as one integer.
fn encode_datetime64(v: &Value, digits: u32) -> Result<u64> {
    let s = match v {
        Value::Null => return Ok(0),
        v => match v.as_str() {
            Some(s) => s,
            None => return v.as_u64().ok_or_else(|| mismatch("datetime64", v)),
        },
    };
    let (whole, frac) = match s.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (s, ""),
    };
    let secs = parse_datetime_secs(whole)?;
    let pad = (digits as usize).saturating_sub(frac.len()).min(9);
    let mut itoa = itoa::Buffer::new();
    let joined = format!("{}{}{}", itoa.format(secs), frac, "0".repeat(pad));
    joined
        .parse()
        .map_err(|_| UsageError::Value(format!("datetime64 out of range: {s:?}")).into())
}

// ===== Decimal128 =====

/// Insert the decimal point `scale` digits from the right, at the
/// string level. A magnitude shorter than the scale yields an empty
/// integer part, e.g. `.123`.
fn format_decimal128(v: i128, scale: u32) -> String {
    let mut itoa = itoa::Buffer::new();
    let digits = itoa.format(v);
    let scale = scale as usize;
    if scale == 0 {
        return digits.to_owned();
    }
    if digits.len() > scale {
        let (whole, frac) = digits.split_at(digits.len() - scale);
        format!("{whole}.{frac}")
    } else {
        format!(".{digits}")
    }
}

/// Drop the decimal point and right-pad the fraction to `scale` digits.
fn encode_decimal128(v: &Value, scale: u32) -> Result<i128> {
    let s = match v {
        Value::Null => return Ok(0),
        v => match v.as_str() {
            Some(s) => s.to_owned(),
            None => match v.as_i128() {
                Some(n) => n.to_string(),
                None => v.as_f64().ok_or_else(|| mismatch("decimal", v))?.to_string(),
            },
        },
    };
    let (whole, frac) = match s.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (s.as_str(), ""),
    };
    let pad = (scale as usize).saturating_sub(frac.len());
    format!("{}{}{}", whole, frac, "0".repeat(pad))
        .parse()
        .map_err(|_| UsageError::Value(format!("bad decimal {s:?}")).into())
}

fn decimal_input(v: &Value, name: &str) -> Result<f64> {
    match v {
        Value::Null => Ok(0.0),
        v => match v.as_str() {
            Some(s) => s
                .parse()
                .map_err(|_| UsageError::Value(format!("bad decimal {s:?}")).into()),
            None => v.as_f64().ok_or_else(|| mismatch(name, v)),
        },
    }
}

// ===== Network addresses =====

fn format_ipv4(n: u32) -> String {
    format!("{}.{}.{}.{}", n >> 24, n >> 16 & 0xff, n >> 8 & 0xff, n & 0xff)
}

fn parse_ipv4(s: &str) -> Result<u32> {
    let mut octets = s.splitn(4, '.');
    let mut n = 0u32;
    for _ in 0..4 {
        let octet: u8 = octets
            .next()
            .and_then(|o| o.parse().ok())
            .ok_or_else(|| UsageError::Value(format!("bad ipv4 address {s:?}")))?;
        n = n << 8 | u32::from(octet);
    }
    Ok(n)
}

/// Expand `::` shorthand to 8 groups of 4 hex digits and pack 16 bytes.
fn parse_ipv6(s: &str) -> Result<[u8; 16]> {
    let bad = || UsageError::Value(format!("bad ipv6 address {s:?}"));

    let mut groups: Vec<u16> = Vec::with_capacity(8);
    let (head, tail) = match s.split_once("::") {
        Some(pair) => pair,
        None => (s, ""),
    };
    let parse_side = |side: &str, out: &mut Vec<u16>| -> Result<()> {
        for group in side.split(':').filter(|g| !g.is_empty()) {
            out.push(u16::from_str_radix(group, 16).map_err(|_| bad())?);
        }
        Ok(())
    };

    parse_side(head, &mut groups)?;
    if s.contains("::") {
        let mut rest = Vec::new();
        parse_side(tail, &mut rest)?;
        if groups.len() + rest.len() > 8 {
            return Err(bad().into());
        }
        groups.resize(8 - rest.len(), 0);
        groups.extend(rest);
    }
    if groups.len() != 8 {
        return Err(bad().into());
    }

    let mut bytes = [0u8; 16];
    for (chunk, group) in bytes.chunks_exact_mut(2).zip(groups) {
        chunk.copy_from_slice(&group.to_be_bytes());
    }
    Ok(bytes)
}

/// Hex groups with leading zeros trimmed, then colon runs collapsed to
/// `::`. Every zero run collapses, even when that yields more than one
/// `::` in the text.
fn format_ipv6(raw: &[u8]) -> String {
    let mut out = String::with_capacity(39);
    for (i, pair) in raw.chunks_exact(2).enumerate() {
        if i > 0 {
            out.push(':');
        }
        let group = u16::from_be_bytes([pair[0], pair[1]]);
        if group != 0 {
            out.push_str(&format!("{group:x}"));
        }
    }
    while out.contains(":::") {
        out = out.replace(":::", "::");
    }
    out
}

// ===== UUID =====

/// 16 wire bytes to canonical text. Each 8-byte half is byte-reversed
/// before hex encoding.
fn format_uuid(raw: &[u8]) -> String {
    let mut hex = String::with_capacity(32);
    for half in raw.chunks_exact(8) {
        for b in half.iter().rev() {
            hex.push_str(&format!("{b:02x}"));
        }
    }
    format!("{}-{}-{}-{}-{}", &hex[..8], &hex[8..12], &hex[12..16], &hex[16..20], &hex[20..])
}

fn parse_uuid(s: &str) -> Result<[u8; 16]> {
    let bad = || UsageError::Value(format!("bad uuid {s:?}"));

    let hex: String = s.chars().filter(|c| *c != '-').collect();
    if hex.len() != 32 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(bad().into());
    }
    let mut bytes = [0u8; 16];
    for (i, b) in bytes.iter_mut().enumerate() {
        *b = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| bad())?;
    }
    let mut wire = [0u8; 16];
    for i in 0..8 {
        wire[i] = bytes[7 - i];
        wire[8 + i] = bytes[15 - i];
    }
    Ok(wire)
}
