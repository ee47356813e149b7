//! Little-endian record encoder.
//!
//! [`LogWriter`] is the writing half of the capture format: the tracer
//! drives it from its allocation hooks, and the reader's tests use it to
//! build fixtures. Field order here is the single source of truth; the
//! reader decodes exactly these bytes in exactly this order.

use std::io::{self, Write};

use crate::records::{
    AllocationRecord, FramePop, FramePush, Frame, HeaderRecord, RecordType, Segment,
    UnresolvedNativeFrame, MAGIC,
};

/// Streaming encoder for capture records.
pub struct LogWriter<W> {
    out: W,
}

impl<W: Write> LogWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Write the fixed capture header. Must be called exactly once,
    /// before any record.
    pub fn write_header(&mut self, header: &HeaderRecord) -> io::Result<()> {
        self.out.write_all(&MAGIC)?;
        self.out.write_all(&header.version.to_le_bytes())?;
        self.out.write_all(&[u8::from(header.native_traces)])?;
        self.out.write_all(&header.stats.n_allocations.to_le_bytes())?;
        self.out.write_all(&header.stats.n_frames.to_le_bytes())?;
        self.out.write_all(&header.stats.start_time.to_le_bytes())?;
        self.out.write_all(&header.stats.end_time.to_le_bytes())?;
        self.write_cstring(&header.command_line)?;
        self.out.write_all(&header.pid.to_le_bytes())
    }

    pub fn write_allocation(&mut self, record: &AllocationRecord) -> io::Result<()> {
        self.tag(RecordType::Allocation)?;
        self.out.write_all(&record.tid.to_le_bytes())?;
        self.out.write_all(&record.address.to_le_bytes())?;
        self.out.write_all(&record.size.to_le_bytes())?;
        self.out.write_all(&[record.allocator as u8])?;
        self.out.write_all(&record.py_lineno.to_le_bytes())?;
        self.out.write_all(&record.native_frame_id.to_le_bytes())
    }

    pub fn write_frame_push(&mut self, record: &FramePush) -> io::Result<()> {
        self.tag(RecordType::FramePush)?;
        self.out.write_all(&record.tid.to_le_bytes())?;
        self.out.write_all(&record.frame_id.to_le_bytes())
    }

    pub fn write_frame_pop(&mut self, record: &FramePop) -> io::Result<()> {
        self.tag(RecordType::FramePop)?;
        self.out.write_all(&record.tid.to_le_bytes())?;
        self.out.write_all(&record.count.to_le_bytes())
    }

    /// Bind `frame_id` to a frame descriptor. The `lineno` field is not
    /// on the wire; the tracer does not know it at push time.
    pub fn write_frame_index(&mut self, frame_id: u64, frame: &Frame) -> io::Result<()> {
        self.tag(RecordType::FrameIndex)?;
        self.out.write_all(&frame_id.to_le_bytes())?;
        self.write_cstring(&frame.function_name)?;
        self.write_cstring(&frame.filename)?;
        self.out.write_all(&frame.parent_lineno.to_le_bytes())
    }

    pub fn write_native_frame(&mut self, record: &UnresolvedNativeFrame) -> io::Result<()> {
        self.tag(RecordType::NativeTraceIndex)?;
        self.out.write_all(&record.ip.to_le_bytes())?;
        self.out.write_all(&record.parent_index.to_le_bytes())
    }

    /// Announce that the process memory map is about to be re-described
    /// by a fresh batch of segment headers.
    pub fn write_memory_map_start(&mut self) -> io::Result<()> {
        self.tag(RecordType::MemoryMapStart)
    }

    /// Write a segment header followed by its nested SEGMENT records.
    pub fn write_segment_header(
        &mut self,
        filename: &str,
        load_address: u64,
        segments: &[Segment],
    ) -> io::Result<()> {
        self.tag(RecordType::SegmentHeader)?;
        self.write_cstring(filename)?;
        self.out.write_all(&(segments.len() as u64).to_le_bytes())?;
        self.out.write_all(&load_address.to_le_bytes())?;
        for segment in segments {
            self.tag(RecordType::Segment)?;
            self.out.write_all(&segment.vaddr.to_le_bytes())?;
            self.out.write_all(&segment.memsz.to_le_bytes())?;
        }
        Ok(())
    }

    pub fn write_thread_record(&mut self, tid: u64, name: &str) -> io::Result<()> {
        self.tag(RecordType::ThreadRecord)?;
        self.out.write_all(&tid.to_le_bytes())?;
        self.write_cstring(name)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn tag(&mut self, record_type: RecordType) -> io::Result<()> {
        self.out.write_all(&[record_type as u8])
    }

    fn write_cstring(&mut self, value: &str) -> io::Result<()> {
        debug_assert!(!value.as_bytes().contains(&0), "NUL inside a wire string");
        self.out.write_all(value.as_bytes())?;
        self.out.write_all(&[0])
    }
}
