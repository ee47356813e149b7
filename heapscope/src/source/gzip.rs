//! Gzip-compressed capture source.
//!
//! The tracer can write captures through gzip to cut disk traffic on
//! allocation-heavy workloads; this source makes those files look exactly
//! like plain ones to the reader.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;

use super::{closed, RecordSource};

/// Streaming reader over a gzip-wrapped capture file.
pub struct GzipSource {
    inner: Option<BufReader<GzDecoder<BufReader<File>>>>,
}

impl GzipSource {
    /// Open a gzip-compressed capture file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened. A corrupt gzip
    /// stream surfaces later, on the first read that hits it.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        let decoder = GzDecoder::new(BufReader::new(file));
        Ok(Self { inner: Some(BufReader::new(decoder)) })
    }
}

impl RecordSource for GzipSource {
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        match self.inner.as_mut() {
            Some(reader) => reader.read_exact(buf),
            None => Err(closed()),
        }
    }

    fn close(&mut self) {
        self.inner = None;
    }

    fn is_open(&self) -> bool {
        self.inner.is_some()
    }
}
