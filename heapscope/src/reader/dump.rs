//! Textual record dump for capture diagnostics.

use std::io::Write;

use heapscope_common::{Allocator, RecordType, MAGIC};

use super::{
    lock, parse_allocation, parse_frame_index, parse_frame_pop, parse_frame_push,
    parse_native_frame, parse_segment_body, parse_segment_header_prefix, parse_thread_record,
    RecordReader,
};
use crate::domain::errors::ReaderError;

impl RecordReader {
    /// Print the header and every remaining record, one line each, in
    /// stream order. Diagnostic output only: nothing is interned, no
    /// stacks are replayed, and the cursor is consumed.
    ///
    /// A short read or an unknown tag ends the dump quietly, the same
    /// way the streaming path treats a truncated capture. A SEGMENT
    /// record outside a segment table is the one malformation reported
    /// as an error.
    ///
    /// # Errors
    /// Returns a write error from `out`, or
    /// [`ReaderError::StraySegment`].
    pub fn dump_all_records<W: Write>(&self, out: &mut W) -> Result<(), ReaderError> {
        let mut stream = lock(&self.stream);
        let header = &self.header;
        writeln!(
            out,
            "HEADER magic={} version={} native_traces={} n_allocations={} n_frames={} \
             start_time={} end_time={} pid={} command_line={}",
            String::from_utf8_lossy(&MAGIC),
            header.version,
            header.native_traces,
            header.stats.n_allocations,
            header.stats.n_frames,
            header.stats.start_time,
            header.stats.end_time,
            header.pid,
            header.command_line,
        )?;

        // SEGMENT children still owed to the last SEGMENT_HEADER
        let mut pending_segments: u64 = 0;

        loop {
            let tag = match stream.input.read_u8() {
                Ok(tag) => tag,
                Err(_) => return Ok(()),
            };
            let Ok(record_type) = RecordType::try_from(tag) else {
                writeln!(out, "UNKNOWN RECORD TYPE {tag}")?;
                return Ok(());
            };
            if record_type != RecordType::Segment {
                pending_segments = 0;
            }

            match record_type {
                RecordType::Allocation => {
                    let Ok(raw) = parse_allocation(stream.input.as_mut()) else {
                        return Ok(());
                    };
                    let allocator = match Allocator::try_from(raw.allocator) {
                        Ok(allocator) => allocator.name().to_string(),
                        Err(id) => format!("<unknown allocator {id}>"),
                    };
                    writeln!(
                        out,
                        "ALLOCATION tid={} address={:#x} size={} allocator={} py_lineno={} \
                         native_frame_id={}",
                        raw.tid, raw.address, raw.size, allocator, raw.py_lineno,
                        raw.native_frame_id,
                    )?;
                }
                RecordType::FramePush => {
                    let Ok(record) = parse_frame_push(stream.input.as_mut()) else {
                        return Ok(());
                    };
                    writeln!(out, "FRAME_PUSH tid={} frame_id={}", record.tid, record.frame_id)?;
                }
                RecordType::FramePop => {
                    let Ok(record) = parse_frame_pop(stream.input.as_mut()) else {
                        return Ok(());
                    };
                    writeln!(out, "FRAME_POP tid={} count={}", record.tid, record.count)?;
                }
                RecordType::FrameIndex => {
                    let Ok((frame_id, frame)) = parse_frame_index(stream.input.as_mut()) else {
                        return Ok(());
                    };
                    writeln!(
                        out,
                        "FRAME_INDEX frame_id={} function_name={} filename={} parent_lineno={}",
                        frame_id, frame.function_name, frame.filename, frame.parent_lineno,
                    )?;
                }
                RecordType::NativeTraceIndex => {
                    let Ok(record) = parse_native_frame(stream.input.as_mut()) else {
                        return Ok(());
                    };
                    writeln!(
                        out,
                        "NATIVE_FRAME_INDEX ip={:#x} parent_index={}",
                        record.ip, record.parent_index,
                    )?;
                }
                RecordType::MemoryMapStart => {
                    writeln!(out, "MEMORY_MAP_START")?;
                }
                RecordType::SegmentHeader => {
                    let Ok((filename, count, load_address)) =
                        parse_segment_header_prefix(stream.input.as_mut())
                    else {
                        return Ok(());
                    };
                    pending_segments = count;
                    writeln!(
                        out,
                        "SEGMENT_HEADER filename={filename} num_segments={count} \
                         addr={load_address:#x}",
                    )?;
                }
                RecordType::Segment => {
                    if pending_segments == 0 {
                        writeln!(out, "BAD SEGMENT: no segment table open")?;
                        return Err(ReaderError::StraySegment);
                    }
                    pending_segments -= 1;
                    let Ok(segment) = parse_segment_body(stream.input.as_mut()) else {
                        return Ok(());
                    };
                    writeln!(out, "SEGMENT {:#x} {}", segment.vaddr, segment.memsz)?;
                }
                RecordType::ThreadRecord => {
                    let Ok((tid, name)) = parse_thread_record(stream.input.as_mut()) else {
                        return Ok(());
                    };
                    writeln!(out, "THREAD tid={tid} name={name}")?;
                }
            }
        }
    }
}
