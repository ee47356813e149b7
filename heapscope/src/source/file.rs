//! Plain-file capture source.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use super::{closed, RecordSource};

/// Buffered reader over an uncompressed capture file.
pub struct FileSource {
    inner: Option<BufReader<File>>,
}

impl FileSource {
    /// Open a capture file for sequential reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self { inner: Some(BufReader::new(file)) })
    }
}

impl RecordSource for FileSource {
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        match self.inner.as_mut() {
            Some(reader) => reader.read_exact(buf),
            None => Err(closed()),
        }
    }

    // BufReader already holds the bytes; scan for the NUL in place
    // instead of pulling them out one at a time.
    fn read_nul_string(&mut self) -> io::Result<String> {
        let Some(reader) = self.inner.as_mut() else {
            return Err(closed());
        };
        let mut bytes = Vec::new();
        let n = reader.read_until(0, &mut bytes)?;
        if n == 0 || bytes.last() != Some(&0) {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "end of capture inside a string field",
            ));
        }
        bytes.pop();
        String::from_utf8(bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn close(&mut self) {
        self.inner = None;
    }

    fn is_open(&self) -> bool {
        self.inner.is_some()
    }
}
