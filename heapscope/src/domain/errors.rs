//! Structured error types for the capture reader
//!
//! Using thiserror for automatic Display implementation and error chaining.
//!
//! The reader is deliberately forgiving about truncation (a capture cut
//! short mid-record is a normal end of stream, because the traced process
//! may have been killed) and strict about invariant violations inside
//! well-formed bytes, which always mean the capture or the tracer is
//! broken.

use heapscope_common::CURRENT_HEADER_VERSION;
use thiserror::Error;

use super::types::{FrameId, ThreadId};

/// Failure to validate the fixed capture header at open time.
#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("the input does not look like a heapscope capture")]
    BadMagic,

    #[error("capture version {found} is not supported by this reader (expected {CURRENT_HEADER_VERSION})")]
    UnsupportedVersion { found: u32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors surfaced while replaying records.
///
/// Short reads never show up here: they terminate the stream as a clean
/// end-of-capture. Every variant below means the bytes were readable but
/// the capture violated a format invariant.
#[derive(Error, Debug)]
pub enum ReaderError {
    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error("two frame records with id {0}")]
    DuplicateFrameId(FrameId),

    #[error("frame pop of {count} on thread {tid} holding only {depth} frames")]
    PopOnShortStack { tid: ThreadId, count: u32, depth: usize },

    #[error("record references frame id {0}, which was never defined")]
    UnknownFrameId(FrameId),

    #[error("unknown record tag {0:#04x}")]
    UnknownRecordTag(u8),

    #[error("unknown allocator id {0}")]
    UnknownAllocator(u8),

    #[error("segment record outside a segment table")]
    StraySegment,

    #[error("segment table interrupted by record tag {0:#04x}")]
    InterruptedSegmentTable(u8),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
