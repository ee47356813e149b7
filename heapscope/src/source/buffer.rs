//! In-memory capture source.

use std::io::{self, Read};

use super::{closed, RecordSource};

/// Capture source over a byte vector already in memory.
///
/// Used by test fixtures, and by callers that receive capture bytes over
/// a transport the reader does not know about (a socket, a pipe).
pub struct BufferSource {
    data: io::Cursor<Vec<u8>>,
    open: bool,
}

impl BufferSource {
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self { data: io::Cursor::new(data), open: true }
    }
}

impl RecordSource for BufferSource {
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        if !self.open {
            return Err(closed());
        }
        self.data.read_exact(buf)
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_reads_consume_in_order() {
        let mut source = BufferSource::new(vec![1, 2, 3, 4]);
        let mut first = [0u8; 2];
        let mut second = [0u8; 2];
        RecordSource::read_exact(&mut source, &mut first).unwrap();
        RecordSource::read_exact(&mut source, &mut second).unwrap();
        assert_eq!(first, [1, 2]);
        assert_eq!(second, [3, 4]);
    }

    #[test]
    fn eof_then_close_then_read() {
        let mut source = BufferSource::new(vec![9]);
        assert_eq!(source.read_u8().unwrap(), 9);
        assert!(source.read_u8().is_err());

        // closing at EOF is not an error
        source.close();
        assert!(!source.is_open());
        assert!(source.read_u8().is_err());
    }
}
