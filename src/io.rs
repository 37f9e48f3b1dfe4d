//! Byte-stream primitives.
//!
//! The native protocol has no per-packet length framing: packets are
//! parsed incrementally, one varint or fixed-width field at a time,
//! straight off the stream. The read side therefore works against the
//! [`Stream`] directly, while the write side assembles whole packets in a
//! [`BytesMut`] and flushes them in one write.
use std::io;

use bytes::{BufMut, BytesMut};

use crate::{Error, Result, error::ProtocolError};

/// An opaque bidirectional byte stream carrying one session.
///
/// Establishing the stream (addressing, TLS, timeouts) is the caller's
/// responsibility; any `io::Read + io::Write` value qualifies, including
/// [`std::net::TcpStream`].
pub trait Stream {
    /// Read into `buf`, returning the number of bytes read.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write from `buf`, returning the number of bytes consumed.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Release the underlying transport.
    fn close(&mut self) -> io::Result<()>;
}

impl<S> Stream for S
where
    S: io::Read + io::Write,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(self, buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(self, buf)
    }

    fn close(&mut self) -> io::Result<()> {
        // dropping the value releases the transport
        Ok(())
    }
}

/// Read exactly `buf.len()` bytes, retrying on short reads.
pub(crate) fn read_exact<S: Stream>(io: &mut S, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match io.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(Error::Read(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream ended mid packet",
                )));
            }
            Ok(n) => filled += n,
            Err(e) => return Err(Error::Read(e)),
        }
    }
    Ok(())
}

/// Read `n` raw bytes.
pub(crate) fn read_bytes<S: Stream>(io: &mut S, n: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    read_exact(io, &mut buf)?;
    Ok(buf)
}

/// Read an unsigned varint: 7 payload bits per byte, little-endian bit
/// order, high bit set on every byte but the last.
pub(crate) fn read_uvarint<S: Stream>(io: &mut S) -> Result<u64> {
    let mut value = 0u64;
    let mut byte = [0u8; 1];
    for shift in (0..64).step_by(7) {
        read_exact(io, &mut byte)?;
        value |= u64::from(byte[0] & 0x7f) << shift;
        if byte[0] < 0x80 {
            return Ok(value);
        }
    }
    Err(ProtocolError::OutOfRange("varint").into())
}

/// Read a little-endian two's complement `i32`.
pub(crate) fn read_i32<S: Stream>(io: &mut S) -> Result<i32> {
    let mut buf = [0u8; 4];
    read_exact(io, &mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

/// Read a little-endian `u64`.
pub(crate) fn read_u64<S: Stream>(io: &mut S) -> Result<u64> {
    let mut buf = [0u8; 8];
    read_exact(io, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read a length-prefixed byte sequence: varint length `n`, then `n`
/// raw bytes. A zero length consumes nothing further.
pub(crate) fn read_str_bytes<S: Stream>(io: &mut S, scratch: &mut Vec<u8>) -> Result<()> {
    let len = read_uvarint(io)? as usize;
    scratch.clear();
    scratch.resize(len, 0);
    if len > 0 {
        read_exact(io, scratch)?;
    }
    Ok(())
}

/// Read a length-prefixed string.
///
/// ClickHouse strings are raw bytes; non-utf8 content is replaced
/// lossily here because every protocol-level string (type names, server
/// identity, exception text) is ascii in practice. Column data goes
/// through the scalar codec instead, which keeps raw bytes intact.
pub(crate) fn read_str<S: Stream>(io: &mut S) -> Result<String> {
    let mut buf = Vec::new();
    read_str_bytes(io, &mut buf)?;
    Ok(match String::from_utf8(buf) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

/// Write the whole buffer in one operation.
///
/// The buffer clears only on success; a short count from the underlying
/// write surfaces as [`Error::Write`].
pub(crate) fn flush<S: Stream>(io: &mut S, buf: &mut BytesMut) -> Result<()> {
    if buf.is_empty() {
        return Ok(());
    }
    let n = io.write(buf).map_err(Error::Write)?;
    if n != buf.len() {
        return Err(Error::Write(io::Error::new(
            io::ErrorKind::WriteZero,
            "stream consumed a partial buffer",
        )));
    }
    buf.clear();
    Ok(())
}

/// Outbound packet assembly over [`BytesMut`].
pub(crate) trait WireWrite {
    /// Append an unsigned varint using the minimal byte count.
    fn put_uvarint(&mut self, n: u64);
    /// Append a length-prefixed byte sequence.
    fn put_str(&mut self, s: &[u8]);
}

impl WireWrite for BytesMut {
    fn put_uvarint(&mut self, mut n: u64) {
        while n >= 0x80 {
            self.put_u8(n as u8 | 0x80);
            n >>= 7;
        }
        self.put_u8(n as u8);
    }

    fn put_str(&mut self, s: &[u8]) {
        self.put_uvarint(s.len() as u64);
        self.put_slice(s);
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::collections::VecDeque;
    use std::io;

    use bytes::BytesMut;

    use super::*;

    /// In-memory stream: serves scripted inbound bytes, records outbound.
    pub(crate) struct MockStream {
        pub input: VecDeque<u8>,
        pub output: Vec<u8>,
    }

    impl MockStream {
        pub fn new(input: impl Into<Vec<u8>>) -> Self {
            Self { input: input.into().into(), output: Vec::new() }
        }
    }

    impl io::Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.input.len());
            for b in buf.iter_mut().take(n) {
                *b = self.input.pop_front().unwrap();
            }
            Ok(n)
        }
    }

    impl io::Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn varint_roundtrip_minimal_width() {
        for (n, width) in [
            (0u64, 1usize),
            (1, 1),
            (127, 1),
            (128, 2),
            (16383, 2),
            (16384, 3),
            (54451, 3),
            (u32::MAX as u64, 5),
            (u64::MAX, 10),
        ] {
            let mut buf = BytesMut::new();
            buf.put_uvarint(n);
            assert_eq!(buf.len(), width, "width of {n}");

            let mut io = MockStream::new(buf.to_vec());
            assert_eq!(read_uvarint(&mut io).unwrap(), n);
            assert!(io.input.is_empty());
        }
    }

    #[test]
    fn length_prefixed_roundtrip() {
        for s in [&b""[..], b"x", b"hello world", &[0u8, 255, 7][..]] {
            let mut buf = BytesMut::new();
            buf.put_str(s);

            let mut io = MockStream::new(buf.to_vec());
            let mut out = Vec::new();
            read_str_bytes(&mut io, &mut out).unwrap();
            assert_eq!(out, s);
            assert!(io.input.is_empty(), "no trailing bytes consumed");
        }
    }

    #[test]
    fn read_exact_retries_short_reads() {
        // VecDeque-backed read returns at most the buffered amount; feed
        // the reader through a wrapper that yields one byte at a time.
        struct OneByte(MockStream);
        impl io::Read for OneByte {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                let n = 1.min(buf.len());
                io::Read::read(&mut self.0, &mut buf[..n])
            }
        }
        impl io::Write for OneByte {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                io::Write::write(&mut self.0, buf)
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut io = OneByte(MockStream::new(b"abcdef".to_vec()));
        let mut buf = [0u8; 6];
        read_exact(&mut io, &mut buf).unwrap();
        assert_eq!(&buf, b"abcdef");
    }

    #[test]
    fn read_past_end_is_read_error() {
        let mut io = MockStream::new(b"ab".to_vec());
        let mut buf = [0u8; 4];
        match read_exact(&mut io, &mut buf) {
            Err(crate::Error::Read(e)) => {
                assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof)
            }
            other => panic!("expected read error, got {other:?}"),
        }
    }

    #[test]
    fn flush_clears_only_on_success() {
        struct Half(Vec<u8>);
        impl io::Read for Half {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Ok(0)
            }
        }
        impl io::Write for Half {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                let n = buf.len() / 2;
                self.0.extend_from_slice(&buf[..n]);
                Ok(n)
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut io = Half(Vec::new());
        let mut buf = BytesMut::from(&b"0123456789"[..]);
        assert!(matches!(flush(&mut io, &mut buf), Err(crate::Error::Write(_))));
        assert!(!buf.is_empty(), "buffer must survive a failed flush");

        let mut ok = MockStream::new(vec![]);
        flush(&mut ok, &mut buf).unwrap();
        assert!(buf.is_empty());
        assert_eq!(ok.output, b"0123456789");
    }
}
