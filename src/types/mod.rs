//! Column type resolution.
//!
//! The server describes every column with a textual type such as
//! `Nullable(Array(Decimal(20, 4)))`. [`TypeDesc::resolve`] runs one pass
//! over that string and produces a canonical descriptor: a terminal
//! [`ScalarKind`], a nullable flag, and an array depth. The scalar and
//! column codecs dispatch on the descriptor alone; the type string itself
//! is only kept to echo back verbatim on the insert path.
mod column;
mod scalar;

pub(crate) use column::{decode_column, encode_column};

/// Canonical form of a column type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDesc {
    /// Terminal element kind, aliases already collapsed.
    pub kind: ScalarKind,
    /// Whether elements carry a null bitmap.
    pub nullable: bool,
    /// Number of `Array(...)` wrappers.
    pub array_depth: usize,
}

/// Terminal column element kind.
///
/// Aliases collapse into their backing kind where the wire bytes are all
/// that matters (`Enum8` is an `Int8`, bare `Decimal32` a `Float32`,
/// `Nothing` an `Int8`). Kinds with value-level formatting (dates,
/// parameterized decimals, network addresses, UUID) stay distinct so the
/// scalar codec can apply the textual transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarKind {
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    String,
    FixedString(usize),
    Uuid,
    Date,
    DateTime,
    /// Fractional digit count.
    DateTime64(u32),
    /// Scale; backing width `i32` (precision < 10).
    Decimal32(u32),
    /// Scale; backing width `i64` (precision < 19).
    Decimal64(u32),
    /// Scale; backing width `i128`.
    Decimal128(u32),
    Ipv4,
    Ipv6,
    /// Unrecognized type string, kept verbatim. The codec rejects it
    /// with [`ProtocolError::UnsupportedType`][crate::ProtocolError].
    Unsupported(std::string::String),
}

impl TypeDesc {
    /// Resolve a type string into its canonical descriptor.
    ///
    /// Unrecognized strings resolve to [`ScalarKind::Unsupported`]
    /// rather than failing here; the error surfaces once data for the
    /// column actually has to move.
    pub fn resolve(type_name: &str) -> TypeDesc {
        let lowered = type_name.trim().to_lowercase();
        let mut desc = TypeDesc {
            kind: ScalarKind::Unsupported(lowered.clone()),
            nullable: false,
            array_depth: 0,
        };
        desc.kind = resolve_kind(&lowered, &mut desc);
        desc
    }
}

fn resolve_kind(s: &str, desc: &mut TypeDesc) -> ScalarKind {
    use ScalarKind::*;

    match s {
        "int8" => return Int8,
        "int16" => return Int16,
        "int32" => return Int32,
        "int64" => return Int64,
        "int128" => return Int128,
        "uint8" => return UInt8,
        "uint16" => return UInt16,
        "uint32" => return UInt32,
        "uint64" => return UInt64,
        "float32" => return Float32,
        "float64" => return Float64,
        "string" => return String,
        "uuid" => return Uuid,
        "date" => return Date,
        "datetime" => return DateTime,
        "ipv4" => return Ipv4,
        "ipv6" => return Ipv6,
        // aliases with no value-level formatting
        "decimal32" => return Float32,
        "decimal64" => return Float64,
        "enum8" => return Int8,
        "enum16" => return Int16,
        "nothing" => return Int8,
        _ => {}
    }

    if let Some(inner) = param(s, "nullable(") {
        desc.nullable = true;
        return resolve_kind(inner, desc);
    }

    if let Some(inner) = param(s, "fixedstring(") {
        if let Ok(n) = inner.trim().parse() {
            return FixedString(n);
        }
    }

    if let Some(inner) = param(s, "decimal(") {
        if let Some((precision, scale)) = split_params(inner) {
            return if precision < 10 {
                Decimal32(scale)
            } else if precision < 19 {
                Decimal64(scale)
            } else {
                Decimal128(scale)
            };
        }
    }

    if let Some(inner) = param(s, "datetime64(") {
        // a timezone may follow the digit count
        let digits = inner.split(',').next().unwrap_or(inner).trim();
        if let Ok(n) = digits.parse() {
            return DateTime64(n);
        }
    }

    if let Some(inner) = param(s, "simpleaggregatefunction(") {
        // the aggregate function name is irrelevant to the wire format
        if let Some((_fn_name, inner)) = inner.split_once(',') {
            return resolve_kind(inner.trim(), desc);
        }
    }

    if s.contains("enum") {
        let head = s.split('(').next().unwrap_or(s);
        if head != s {
            return resolve_kind(head, desc);
        }
    }

    if let Some(inner) = param(s, "lowcardinality(") {
        // dictionary framing is not modeled; the column travels as its
        // inner type
        return resolve_kind(inner.trim(), desc);
    }

    if let Some(mut inner) = param(s, "array(") {
        desc.array_depth += 1;
        while let Some(next) = param(inner, "array(") {
            desc.array_depth += 1;
            inner = next;
        }
        return resolve_kind(inner, desc);
    }

    Unsupported(s.to_owned())
}

/// Strip `prefix` and the closing parenthesis, returning the parameter
/// body of `prefix(body)`.
fn param<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.starts_with(prefix) && s.ends_with(')') {
        Some(&s[prefix.len()..s.len() - 1])
    } else {
        None
    }
}

fn split_params(s: &str) -> Option<(u32, u32)> {
    let (precision, scale) = s.split_once(',')?;
    Some((precision.trim().parse().ok()?, scale.trim().parse().ok()?))
}

#[cfg(test)]
mod test {
    use super::ScalarKind::*;
    use super::*;

    fn kind(s: &str) -> ScalarKind {
        TypeDesc::resolve(s).kind
    }

    #[test]
    fn direct_kinds() {
        assert_eq!(kind("Int32"), Int32);
        assert_eq!(kind("UInt64"), UInt64);
        assert_eq!(kind("Float64"), Float64);
        assert_eq!(kind("String"), String);
        assert_eq!(kind("UUID"), Uuid);
    }

    #[test]
    fn aliases_collapse() {
        assert_eq!(kind("Date"), Date);
        assert_eq!(kind("Enum8('a' = 1)"), Int8);
        assert_eq!(kind("Enum16('a' = 1)"), Int16);
        assert_eq!(kind("Decimal32"), Float32);
        assert_eq!(kind("Nothing"), Int8);
        assert_eq!(kind("IPv6"), Ipv6);
    }

    #[test]
    fn parameterized() {
        assert_eq!(kind("FixedString(16)"), FixedString(16));
        assert_eq!(kind("DateTime64(3)"), DateTime64(3));
        assert_eq!(kind("DateTime64(6, 'UTC')"), DateTime64(6));
        assert_eq!(kind("Decimal(9, 2)"), Decimal32(2));
        assert_eq!(kind("Decimal(18, 4)"), Decimal64(4));
        assert_eq!(kind("Decimal(38, 10)"), Decimal128(10));
        assert_eq!(kind("SimpleAggregateFunction(sum, Int64)"), Int64);
        assert_eq!(kind("LowCardinality(String)"), String);
    }

    #[test]
    fn nullable_and_arrays() {
        let desc = TypeDesc::resolve("Nullable(Int32)");
        assert!(desc.nullable);
        assert_eq!(desc.kind, Int32);
        assert_eq!(desc.array_depth, 0);

        let desc = TypeDesc::resolve("Array(Array(Int32))");
        assert!(!desc.nullable);
        assert_eq!(desc.kind, Int32);
        assert_eq!(desc.array_depth, 2);

        let desc = TypeDesc::resolve("Array(Nullable(String))");
        assert!(desc.nullable);
        assert_eq!(desc.array_depth, 1);
    }

    #[test]
    fn nested_decimal_descriptor() {
        let desc = TypeDesc::resolve("Nullable(Array(Decimal(20,4)))");
        assert!(desc.nullable);
        assert_eq!(desc.array_depth, 1);
        assert_eq!(desc.kind, Decimal128(4));
    }

    #[test]
    fn unrecognized_passes_through() {
        assert_eq!(kind("Map(String, UInt64)"), Unsupported("map(string, uint64)".into()));
        assert_eq!(kind("Tuple(Int8, Int8)"), Unsupported("tuple(int8, int8)".into()));
    }
}
