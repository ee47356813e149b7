//! Capture record types and wire constants.
//!
//! A capture is a fixed header followed by a stream of tagged records.
//! Every record starts with a one-byte [`RecordType`] tag; the payload
//! widths below are the exact on-wire widths (little-endian).

/// Magic bytes at the start of every capture file.
pub const MAGIC: [u8; 9] = *b"heapscope";

/// Capture format version understood by this crate. The reader rejects
/// captures written with any other version.
pub const CURRENT_HEADER_VERSION: u32 = 1;

/// One-byte tag selecting the record shape that follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    Allocation = 1,
    FramePush = 2,
    FramePop = 3,
    FrameIndex = 4,
    NativeTraceIndex = 5,
    MemoryMapStart = 6,
    SegmentHeader = 7,
    /// Only valid nested inside a [`RecordType::SegmentHeader`] record.
    Segment = 8,
    ThreadRecord = 9,
}

impl TryFrom<u8> for RecordType {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, u8> {
        match tag {
            1 => Ok(Self::Allocation),
            2 => Ok(Self::FramePush),
            3 => Ok(Self::FramePop),
            4 => Ok(Self::FrameIndex),
            5 => Ok(Self::NativeTraceIndex),
            6 => Ok(Self::MemoryMapStart),
            7 => Ok(Self::SegmentHeader),
            8 => Ok(Self::Segment),
            9 => Ok(Self::ThreadRecord),
            other => Err(other),
        }
    }
}

/// Allocator entry point that produced an allocation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Allocator {
    Malloc = 1,
    Free = 2,
    Calloc = 3,
    Realloc = 4,
    PosixMemalign = 5,
    Memalign = 6,
    Valloc = 7,
    Pvalloc = 8,
    Mmap = 9,
    Munmap = 10,
}

impl Allocator {
    /// Human-readable name, as shown by the record dump.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Malloc => "malloc",
            Self::Free => "free",
            Self::Calloc => "calloc",
            Self::Realloc => "realloc",
            Self::PosixMemalign => "posix_memalign",
            Self::Memalign => "memalign",
            Self::Valloc => "valloc",
            Self::Pvalloc => "pvalloc",
            Self::Mmap => "mmap",
            Self::Munmap => "munmap",
        }
    }

    /// Whether this entry point releases memory rather than acquiring it.
    #[must_use]
    pub fn is_deallocation(self) -> bool {
        matches!(self, Self::Free | Self::Munmap)
    }
}

impl TryFrom<u8> for Allocator {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            1 => Ok(Self::Malloc),
            2 => Ok(Self::Free),
            3 => Ok(Self::Calloc),
            4 => Ok(Self::Realloc),
            5 => Ok(Self::PosixMemalign),
            6 => Ok(Self::Memalign),
            7 => Ok(Self::Valloc),
            8 => Ok(Self::Pvalloc),
            9 => Ok(Self::Mmap),
            10 => Ok(Self::Munmap),
            other => Err(other),
        }
    }
}

/// Aggregate statistics written into the capture header when the tracer
/// shuts down cleanly. A killed tracer leaves whatever was last flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackerStats {
    pub n_allocations: u64,
    pub n_frames: u64,
    /// Wall-clock start of the capture, milliseconds since the epoch.
    pub start_time: u64,
    /// Wall-clock end of the capture, milliseconds since the epoch.
    pub end_time: u64,
}

/// Fixed capture header: magic, version, native-trace flag, statistics,
/// the traced command line, and the traced process id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRecord {
    pub version: u32,
    pub native_traces: bool,
    pub stats: TrackerStats,
    pub command_line: String,
    pub pid: i32,
}

/// One allocation or deallocation event.
///
/// `py_lineno` is the source line live in the innermost frame of `tid`
/// when the event fired. `native_frame_id` indexes the native frame
/// table built from [`RecordType::NativeTraceIndex`] records; `0` means
/// no native stack was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationRecord {
    pub tid: u64,
    pub address: u64,
    pub size: u64,
    pub allocator: Allocator,
    pub py_lineno: i32,
    pub native_frame_id: u64,
}

/// A frame pushed onto a thread's call stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePush {
    pub tid: u64,
    pub frame_id: u64,
}

/// `count` frames popped off a thread's call stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePop {
    pub tid: u64,
    pub count: u32,
}

/// Descriptor of one managed call-stack level.
///
/// The tracer knows only the call-site line (`parent_lineno`) when a
/// frame is pushed, so frames arriving via [`RecordType::FrameIndex`]
/// carry `lineno = 0`. The reader fills in `lineno` for the innermost
/// frame of each allocation from the event's `py_lineno`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    pub function_name: String,
    pub filename: String,
    pub parent_lineno: i32,
    pub lineno: i32,
}

/// A loaded range within a native binary: link-time virtual address and
/// size in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub vaddr: u64,
    pub memsz: u64,
}

/// One entry of the native frame table: a return address plus the index
/// of its caller's entry (`0` for the bottom of the stack).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnresolvedNativeFrame {
    pub ip: u64,
    pub parent_index: u32,
}
