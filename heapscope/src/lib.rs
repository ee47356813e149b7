//! # Heapscope allocation capture reader
//!
//! Heapscope's tracer runs inside the traced process and streams a binary
//! capture of every allocation and deallocation, together with the records
//! needed to rebuild each thread's call stack at any point of the stream.
//! This crate is the offline half: it replays a capture and hands every
//! allocation back annotated with the call stack that was live when it
//! happened.
//!
//! ## Architecture
//!
//! ```text
//! capture bytes
//!      │
//!      ▼
//! ┌──────────────┐     ┌─────────────────────────────────────────┐
//! │ RecordSource │────▶│ RecordReader                            │
//! │ file / gzip /│     │  per-thread shadow stacks               │
//! │ memory       │     │  ┌───────────────┐  ┌────────────────┐ │
//! └──────────────┘     │  │ FrameRegistry │  │ FrameTree      │ │
//!                      │  │ (interned     │  │ (prefix-shared │ │
//!                      │  │  frames)      │  │  stack traces) │ │
//!                      │  └───────────────┘  └────────────────┘ │
//!                      │  ┌────────────────────────────────────┐ │
//!                      │  │ SymbolResolver (segments, DWARF)   │ │
//!                      │  └────────────────────────────────────┘ │
//!                      └──────────────────┬──────────────────────┘
//!                                         │
//!                                         ▼
//!                              Allocation { frame_index, … }
//! ```
//!
//! Most records in a capture do not produce output: frame pushes and pops
//! mutate the shadow stacks, frame-index records fill the frame registry,
//! and segment records feed the symbol resolver. Only allocation records
//! come back out of [`RecordReader::next_allocation`], each carrying a
//! trace index into the interned call-stack tree and the native segment
//! generation in effect when it was decoded.
//!
//! Streaming is single-consumer, but the query surface
//! ([`RecordReader::stack_frames`], [`RecordReader::native_stack_frames`],
//! [`RecordReader::thread_name`]) may be driven from another thread while
//! the stream advances.
//!
//! ```no_run
//! use heapscope::RecordReader;
//!
//! # fn main() -> Result<(), heapscope::ReaderError> {
//! let reader = RecordReader::from_path("app.heapscope")?;
//! while let Some(allocation) = reader.next_allocation()? {
//!     let stack = reader.stack_frames(allocation.frame_index, 64)?;
//!     println!("{} bytes, {} frames deep", allocation.record.size, stack.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod domain;
pub mod reader;
pub mod source;
pub mod stacks;
pub mod symbols;

pub use domain::errors::{HeaderError, ReaderError};
pub use domain::types::{FrameId, Generation, NativeFrameId, ThreadId, TraceIndex};
pub use reader::{Allocation, RecordReader};
pub use source::{BufferSource, FileSource, GzipSource, RecordSource};
pub use symbols::{ResolvedFrame, ResolvedFrames, SymbolResolver};

pub use heapscope_common::{
    Allocator, AllocationRecord, Frame, HeaderRecord, RecordType, TrackerStats,
    CURRENT_HEADER_VERSION, MAGIC,
};
