//! Shared fixture helpers: build capture byte streams with the wire
//! writer and open readers over them in memory.

use heapscope::{BufferSource, RecordReader};
use heapscope_common::{
    Allocator, AllocationRecord, HeaderRecord, LogWriter, TrackerStats, CURRENT_HEADER_VERSION,
};

pub fn test_header() -> HeaderRecord {
    HeaderRecord {
        version: CURRENT_HEADER_VERSION,
        native_traces: false,
        stats: TrackerStats {
            n_allocations: 2,
            n_frames: 4,
            start_time: 1_690_000_000_000,
            end_time: 1_690_000_009_000,
        },
        command_line: "python app.py --serve".to_string(),
        pid: 4242,
    }
}

/// A wire writer over a byte vector, with the default header already
/// written.
pub fn capture() -> LogWriter<Vec<u8>> {
    let mut writer = LogWriter::new(Vec::new());
    writer.write_header(&test_header()).unwrap();
    writer
}

pub fn reader_for(writer: LogWriter<Vec<u8>>) -> RecordReader {
    reader_over(writer.into_inner())
}

pub fn reader_over(bytes: Vec<u8>) -> RecordReader {
    RecordReader::open(Box::new(BufferSource::new(bytes))).expect("fixture header must parse")
}

/// A malloc of 8 bytes at a fixed address, with no native stack.
pub fn alloc(tid: u64, py_lineno: i32) -> AllocationRecord {
    AllocationRecord {
        tid,
        address: 0x1000,
        size: 8,
        allocator: Allocator::Malloc,
        py_lineno,
        native_frame_id: 0,
    }
}
