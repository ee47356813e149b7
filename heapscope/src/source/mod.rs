//! # Capture byte sources
//!
//! A capture can arrive from a plain file, a gzip-compressed file, or an
//! in-memory buffer (test fixtures, bytes already pulled off a socket).
//! [`RecordSource`] is the capability set the reader needs from all of
//! them: exact sequential reads, NUL-terminated strings, and a close that
//! makes later reads fail. Sources are one-way; there is no seeking.
//!
//! The integer helpers decode the little-endian widths used on the wire,
//! so record decoders read fields instead of byte arrays.

use std::io;

pub mod buffer;
pub mod file;
pub mod gzip;

pub use buffer::BufferSource;
pub use file::FileSource;
pub use gzip::GzipSource;

/// Error returned when reading from a source that has been closed.
pub(crate) fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "capture source is closed")
}

/// Sequential, blocking byte source for a capture stream.
pub trait RecordSource: Send {
    /// Fill `buf` completely, or fail. A short read at end of stream is
    /// reported as [`io::ErrorKind::UnexpectedEof`].
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()>;

    /// Read bytes up to (and consuming) the next NUL and return them as a
    /// UTF-8 string. Fails on end of stream before the delimiter.
    fn read_nul_string(&mut self) -> io::Result<String> {
        let mut bytes = Vec::new();
        loop {
            let byte = self.read_u8()?;
            if byte == 0 {
                break;
            }
            bytes.push(byte);
        }
        String::from_utf8(bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Release the underlying transport. Closing a source already at end
    /// of stream is not an error; reads after close fail.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    fn read_u8(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_u32(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_i32(&mut self) -> io::Result<i32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    fn read_u64(&mut self) -> io::Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_helpers_are_little_endian() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0xdead_beefu32.to_le_bytes());
        bytes.extend_from_slice(&(-5i32).to_le_bytes());
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        let mut source = BufferSource::new(bytes);

        assert_eq!(source.read_u32().unwrap(), 0xdead_beef);
        assert_eq!(source.read_i32().unwrap(), -5);
        assert_eq!(source.read_u64().unwrap(), u64::MAX);
    }

    #[test]
    fn nul_string_stops_at_delimiter() {
        let mut source = BufferSource::new(b"hello\0world\0".to_vec());
        assert_eq!(source.read_nul_string().unwrap(), "hello");
        assert_eq!(source.read_nul_string().unwrap(), "world");
        assert!(source.read_nul_string().is_err());
    }

    #[test]
    fn nul_string_rejects_invalid_utf8() {
        let mut source = BufferSource::new(vec![0xff, 0xfe, 0]);
        let err = source.read_nul_string().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn nul_string_fails_on_eof_before_delimiter() {
        let mut source = BufferSource::new(b"dangling".to_vec());
        let err = source.read_nul_string().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
