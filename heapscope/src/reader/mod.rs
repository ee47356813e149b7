//! # Capture replay
//!
//! [`RecordReader`] consumes a capture stream and rebuilds, record by
//! record, the state the tracer had when it wrote it: per-thread call
//! stacks, the interned frame table, the call-stack tree, the native
//! frame table, and the generational segment map. Allocation records are
//! the only records that produce output; everything else mutates replay
//! state.
//!
//! ## Line patching
//!
//! Frame descriptors arrive knowing only the line of their *call site*
//! (the line in the caller where the call happened). The line currently
//! executing inside the innermost frame is known only when an event
//! fires, carried by the allocation record itself. On every allocation
//! the reader clones the innermost frame with that concrete line,
//! interns the clone, and swaps it in at the top of the shadow stack
//! before the stack is folded into the trace tree. Consecutive
//! allocations from the same line therefore share one frame id and one
//! trace index, while the stack's prefix stays shared across lines.
//!
//! ## Threading
//!
//! One consumer drives [`RecordReader::next_allocation`]; the query
//! methods may be called concurrently from other threads. The stream
//! side (byte source + shadow stacks) and the shared tables (frames,
//! tree, native frames, thread names, symbols) live behind separate
//! locks, and the streaming path acquires them in the order
//! stream → shared.

mod dump;

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use heapscope_common::{
    Allocator, AllocationRecord, Frame, FramePop, FramePush, HeaderRecord, RecordType, Segment,
    TrackerStats, UnresolvedNativeFrame, CURRENT_HEADER_VERSION, MAGIC,
};
use log::{error, warn};

use crate::domain::errors::{HeaderError, ReaderError};
use crate::domain::types::{FrameId, Generation, NativeFrameId, ThreadId, TraceIndex};
use crate::source::{FileSource, GzipSource, RecordSource};
use crate::stacks::{FrameRegistry, FrameTree};
use crate::symbols::{ResolvedFrame, SymbolResolver};

/// An allocation event recovered from the capture, annotated with the
/// call stack and segment-map generation that were live when it fired.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub record: AllocationRecord,
    /// Index into the call-stack tree; [`TraceIndex::ROOT`] for an
    /// allocation observed with no managed frames on its thread.
    pub frame_index: TraceIndex,
    /// Segment-map generation current when this record was decoded.
    /// Pass it back to [`RecordReader::native_stack_frames`].
    pub native_segment_generation: Generation,
}

impl Allocation {
    #[must_use]
    pub fn tid(&self) -> ThreadId {
        ThreadId(self.record.tid)
    }

    #[must_use]
    pub fn address(&self) -> u64 {
        self.record.address
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.record.size
    }

    #[must_use]
    pub fn allocator(&self) -> Allocator {
        self.record.allocator
    }

    /// Source line live in the innermost managed frame.
    #[must_use]
    pub fn lineno(&self) -> i32 {
        self.record.py_lineno
    }

    #[must_use]
    pub fn native_frame_id(&self) -> NativeFrameId {
        NativeFrameId(self.record.native_frame_id as usize)
    }
}

/// State owned by the streaming thread: the byte source cursor and the
/// per-thread shadow stacks it replays push/pop records into.
struct StreamState {
    input: Box<dyn RecordSource>,
    stacks: HashMap<ThreadId, Vec<FrameId>>,
}

/// Tables shared between the streaming thread and concurrent queries.
struct SharedState {
    frames: FrameRegistry,
    tree: FrameTree,
    native_frames: Vec<UnresolvedNativeFrame>,
    thread_names: HashMap<ThreadId, String>,
    symbols: SymbolResolver,
}

/// Offline reader for a heapscope capture.
pub struct RecordReader {
    header: HeaderRecord,
    stream: Mutex<StreamState>,
    shared: Mutex<SharedState>,
}

impl RecordReader {
    /// Read and validate the capture header from `source`.
    ///
    /// # Errors
    /// Fails with a [`HeaderError`] (wrapped in [`ReaderError::Header`])
    /// on bad magic, an unsupported version, or a header cut short.
    pub fn open(mut source: Box<dyn RecordSource>) -> Result<Self, ReaderError> {
        let header = read_header(source.as_mut())?;
        Ok(Self {
            header,
            stream: Mutex::new(StreamState { input: source, stacks: HashMap::new() }),
            shared: Mutex::new(SharedState {
                frames: FrameRegistry::new(),
                tree: FrameTree::new(),
                native_frames: Vec::new(),
                thread_names: HashMap::new(),
                symbols: SymbolResolver::new(),
            }),
        })
    }

    /// Open a capture file, picking the gzip source for `.gz` paths.
    ///
    /// # Errors
    /// Fails if the file cannot be opened or its header is invalid.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ReaderError> {
        let path = path.as_ref();
        let source: Box<dyn RecordSource> = if path.extension().is_some_and(|ext| ext == "gz") {
            Box::new(GzipSource::open(path).map_err(HeaderError::Io)?)
        } else {
            Box::new(FileSource::open(path).map_err(HeaderError::Io)?)
        };
        Self::open(source)
    }

    /// Advance the stream until the next allocation record.
    ///
    /// Returns `Ok(None)` at the end of the capture, including a capture
    /// cut short mid-record, since the traced process may have been
    /// killed. Truncation while the source is still open is logged
    /// before being reported as a clean end of stream.
    ///
    /// # Errors
    /// Returns an error only for invariant violations inside well-formed
    /// bytes: duplicate frame ids, pops past the bottom of a stack,
    /// unknown tags, stray segment records.
    pub fn next_allocation(&self) -> Result<Option<Allocation>, ReaderError> {
        let mut stream = lock(&self.stream);
        let stream = &mut *stream;
        loop {
            let tag = match stream.input.read_u8() {
                Ok(tag) => tag,
                Err(_) => return Ok(None),
            };
            let record_type = match RecordType::try_from(tag) {
                Ok(record_type) => record_type,
                Err(tag) => {
                    error!("unknown record tag {tag:#04x} in capture stream");
                    return Err(ReaderError::UnknownRecordTag(tag));
                }
            };

            match record_type {
                RecordType::Allocation => {
                    let raw = match parse_allocation(stream.input.as_mut()) {
                        Ok(raw) => raw,
                        Err(_) => return truncated(stream.input.as_ref(), "allocation record"),
                    };
                    let allocator = match Allocator::try_from(raw.allocator) {
                        Ok(allocator) => allocator,
                        Err(id) => {
                            error!("allocation record names unknown allocator {id}");
                            return Err(ReaderError::UnknownAllocator(id));
                        }
                    };
                    let record = AllocationRecord {
                        tid: raw.tid,
                        address: raw.address,
                        size: raw.size,
                        allocator,
                        py_lineno: raw.py_lineno,
                        native_frame_id: raw.native_frame_id,
                    };

                    let mut shared = lock(&self.shared);
                    let frame_index =
                        allocation_frame_index(&mut stream.stacks, &mut shared, &record)?;
                    let native_segment_generation = shared.symbols.current_generation();
                    return Ok(Some(Allocation { record, frame_index, native_segment_generation }));
                }
                RecordType::FramePush => {
                    let record = match parse_frame_push(stream.input.as_mut()) {
                        Ok(record) => record,
                        Err(_) => return truncated(stream.input.as_ref(), "frame push"),
                    };
                    stream
                        .stacks
                        .entry(ThreadId(record.tid))
                        .or_default()
                        .push(FrameId(record.frame_id));
                }
                RecordType::FramePop => {
                    let record = match parse_frame_pop(stream.input.as_mut()) {
                        Ok(record) => record,
                        Err(_) => return truncated(stream.input.as_ref(), "frame pop"),
                    };
                    let tid = ThreadId(record.tid);
                    let stack = stream.stacks.entry(tid).or_default();
                    let depth = stack.len();
                    if record.count as usize > depth {
                        error!("frame pop of {} on thread {tid} holding {depth} frames", record.count);
                        return Err(ReaderError::PopOnShortStack {
                            tid,
                            count: record.count,
                            depth,
                        });
                    }
                    stack.truncate(depth - record.count as usize);
                }
                RecordType::FrameIndex => {
                    let (frame_id, frame) = match parse_frame_index(stream.input.as_mut()) {
                        Ok(entry) => entry,
                        Err(_) => return truncated(stream.input.as_ref(), "frame index"),
                    };
                    let mut shared = lock(&self.shared);
                    if let Err(err) = shared.frames.insert(frame_id, frame) {
                        error!("capture redefines frame id {frame_id}");
                        return Err(err);
                    }
                }
                RecordType::NativeTraceIndex => {
                    let record = match parse_native_frame(stream.input.as_mut()) {
                        Ok(record) => record,
                        Err(_) => return truncated(stream.input.as_ref(), "native frame index"),
                    };
                    lock(&self.shared).native_frames.push(record);
                }
                RecordType::MemoryMapStart => {
                    lock(&self.shared).symbols.clear_segments();
                }
                RecordType::SegmentHeader => {
                    let (filename, count, load_address) =
                        match parse_segment_header_prefix(stream.input.as_mut()) {
                            Ok(prefix) => prefix,
                            Err(_) => return truncated(stream.input.as_ref(), "segment header"),
                        };
                    let mut segments = Vec::new();
                    for _ in 0..count {
                        let tag = match stream.input.read_u8() {
                            Ok(tag) => tag,
                            Err(_) => return truncated(stream.input.as_ref(), "segment table"),
                        };
                        if RecordType::try_from(tag) != Ok(RecordType::Segment) {
                            error!("segment table of {filename} interrupted by tag {tag:#04x}");
                            return Err(ReaderError::InterruptedSegmentTable(tag));
                        }
                        match parse_segment_body(stream.input.as_mut()) {
                            Ok(segment) => segments.push(segment),
                            Err(_) => return truncated(stream.input.as_ref(), "segment record"),
                        }
                    }
                    lock(&self.shared).symbols.add_segments(filename, load_address, segments);
                }
                RecordType::Segment => {
                    error!("segment record outside a segment table");
                    return Err(ReaderError::StraySegment);
                }
                RecordType::ThreadRecord => {
                    let (tid, name) = match parse_thread_record(stream.input.as_mut()) {
                        Ok(record) => record,
                        Err(_) => return truncated(stream.input.as_ref(), "thread record"),
                    };
                    lock(&self.shared).thread_names.insert(ThreadId(tid), name);
                }
            }
        }
    }

    /// Walk the call-stack tree from `index` towards the root, returning
    /// at most `max_depth` frames, innermost first.
    ///
    /// Each frame's `lineno` is the call-site line recorded by its
    /// callee; the innermost frame keeps the line patched in from the
    /// allocation event.
    ///
    /// # Errors
    /// Fails if a tree node references a frame id the capture never
    /// defined.
    pub fn stack_frames(
        &self,
        index: TraceIndex,
        max_depth: usize,
    ) -> Result<Vec<Frame>, ReaderError> {
        let shared = lock(&self.shared);
        let mut frames = Vec::new();
        let mut current = index;
        let mut lineno_override: Option<i32> = None;
        while !current.is_root() && frames.len() < max_depth {
            let Some((frame_id, parent)) = shared.tree.next_node(current) else {
                warn!("trace index {current} beyond the interned tree");
                break;
            };
            let frame =
                shared.frames.get(frame_id).ok_or(ReaderError::UnknownFrameId(frame_id))?;
            frames.push(Frame {
                function_name: frame.function_name.clone(),
                filename: frame.filename.clone(),
                parent_lineno: frame.parent_lineno,
                lineno: lineno_override.unwrap_or(frame.lineno),
            });
            lineno_override = Some(frame.parent_lineno);
            current = parent;
        }
        Ok(frames)
    }

    /// Walk the native frame table from `native_index` towards the root,
    /// resolving each return address under `generation`. Entries that do
    /// not resolve are skipped, not truncated; inlined functions expand
    /// to multiple frames.
    #[must_use]
    pub fn native_stack_frames(
        &self,
        native_index: NativeFrameId,
        generation: Generation,
        max_depth: usize,
    ) -> Vec<ResolvedFrame> {
        let mut shared = lock(&self.shared);
        let shared = &mut *shared;
        let mut frames = Vec::new();
        let mut current = native_index;
        let mut visited = 0;
        while !current.is_root() && visited < max_depth {
            visited += 1;
            let Some(entry) = shared.native_frames.get(current.0 - 1).copied() else {
                warn!("native frame id {current} beyond the native frame table");
                break;
            };
            current = NativeFrameId(entry.parent_index as usize);
            let Some(resolved) = shared.symbols.resolve(entry.ip, generation) else {
                continue;
            };
            frames.extend(resolved.frames);
        }
        frames
    }

    /// Name recorded for `tid`, or an empty string for unnamed threads.
    #[must_use]
    pub fn thread_name(&self, tid: ThreadId) -> String {
        lock(&self.shared).thread_names.get(&tid).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn header(&self) -> &HeaderRecord {
        &self.header
    }

    /// Close the byte source. The next stream advance reports a clean
    /// end of capture.
    pub fn close(&self) {
        lock(&self.stream).input.close();
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        lock(&self.stream).input.is_open()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Truncation mid-record: log it while the source is still open, then
/// report a clean end of stream.
fn truncated<T>(input: &dyn RecordSource, what: &str) -> Result<Option<T>, ReaderError> {
    if input.is_open() {
        error!("capture ended inside a {what}");
    }
    Ok(None)
}

/// Compute the trace index for an allocation, patching the innermost
/// frame of its thread's shadow stack with the event's concrete line.
fn allocation_frame_index(
    stacks: &mut HashMap<ThreadId, Vec<FrameId>>,
    shared: &mut SharedState,
    record: &AllocationRecord,
) -> Result<TraceIndex, ReaderError> {
    let Some(stack) = stacks.get_mut(&ThreadId(record.tid)) else {
        return Ok(TraceIndex::ROOT);
    };
    let Some(&top) = stack.last() else {
        return Ok(TraceIndex::ROOT);
    };
    let base = shared.frames.get(top).ok_or(ReaderError::UnknownFrameId(top))?;
    let patched = Frame {
        function_name: base.function_name.clone(),
        filename: base.filename.clone(),
        parent_lineno: base.parent_lineno,
        lineno: record.py_lineno,
    };
    let (patched_id, _is_new) = shared.frames.get_or_assign(patched);
    if let Some(slot) = stack.last_mut() {
        *slot = patched_id;
    }
    Ok(shared.tree.get_trace_index(stack))
}

fn read_header(input: &mut dyn RecordSource) -> Result<HeaderRecord, HeaderError> {
    let mut magic = [0u8; MAGIC.len()];
    input.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(HeaderError::BadMagic);
    }
    let version = input.read_u32()?;
    if version != CURRENT_HEADER_VERSION {
        return Err(HeaderError::UnsupportedVersion { found: version });
    }
    let native_traces = input.read_u8()? != 0;
    let stats = TrackerStats {
        n_allocations: input.read_u64()?,
        n_frames: input.read_u64()?,
        start_time: input.read_u64()?,
        end_time: input.read_u64()?,
    };
    let command_line = input.read_nul_string()?;
    let pid = input.read_i32()?;
    Ok(HeaderRecord { version, native_traces, stats, command_line, pid })
}

/// Allocation payload with the allocator byte still raw, so the dump can
/// print unknown allocators instead of failing on them.
struct RawAllocation {
    tid: u64,
    address: u64,
    size: u64,
    allocator: u8,
    py_lineno: i32,
    native_frame_id: u64,
}

fn parse_allocation(input: &mut dyn RecordSource) -> io::Result<RawAllocation> {
    Ok(RawAllocation {
        tid: input.read_u64()?,
        address: input.read_u64()?,
        size: input.read_u64()?,
        allocator: input.read_u8()?,
        py_lineno: input.read_i32()?,
        native_frame_id: input.read_u64()?,
    })
}

fn parse_frame_push(input: &mut dyn RecordSource) -> io::Result<FramePush> {
    Ok(FramePush { tid: input.read_u64()?, frame_id: input.read_u64()? })
}

fn parse_frame_pop(input: &mut dyn RecordSource) -> io::Result<FramePop> {
    Ok(FramePop { tid: input.read_u64()?, count: input.read_u32()? })
}

fn parse_frame_index(input: &mut dyn RecordSource) -> io::Result<(FrameId, Frame)> {
    let frame_id = FrameId(input.read_u64()?);
    let function_name = input.read_nul_string()?;
    let filename = input.read_nul_string()?;
    let parent_lineno = input.read_i32()?;
    // the line inside the frame is unknown until an event is patched in
    Ok((frame_id, Frame { function_name, filename, parent_lineno, lineno: 0 }))
}

fn parse_native_frame(input: &mut dyn RecordSource) -> io::Result<UnresolvedNativeFrame> {
    Ok(UnresolvedNativeFrame { ip: input.read_u64()?, parent_index: input.read_u32()? })
}

fn parse_segment_header_prefix(input: &mut dyn RecordSource) -> io::Result<(String, u64, u64)> {
    let filename = input.read_nul_string()?;
    let count = input.read_u64()?;
    let load_address = input.read_u64()?;
    Ok((filename, count, load_address))
}

fn parse_segment_body(input: &mut dyn RecordSource) -> io::Result<Segment> {
    Ok(Segment { vaddr: input.read_u64()?, memsz: input.read_u64()? })
}

fn parse_thread_record(input: &mut dyn RecordSource) -> io::Result<(u64, String)> {
    Ok((input.read_u64()?, input.read_nul_string()?))
}
