//! Shared data definitions for the heapscope allocation profiler.
//!
//! The in-process tracer and the offline record reader both speak the
//! capture format defined here: the record tags, the record payload
//! structs, and the little-endian encoder ([`writer::LogWriter`]) that
//! lays records out on the wire. The reader crate (`heapscope`) owns the
//! decoding side.
//!
//! Integers in a capture are little-endian and use the widths fixed in
//! [`records`]. Captures are not portable across hosts with different
//! native integer widths; the reader enforces nothing beyond a strict
//! magic + version check.

pub mod records;
pub mod writer;

pub use records::{
    Allocator, AllocationRecord, Frame, FramePush, FramePop, HeaderRecord, RecordType, Segment,
    TrackerStats, UnresolvedNativeFrame, CURRENT_HEADER_VERSION, MAGIC,
};
pub use writer::LogWriter;
