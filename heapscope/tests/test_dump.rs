//! Tests for the textual record dump.

mod common;

use common::{alloc, capture, reader_for, reader_over};
use heapscope::ReaderError;
use heapscope_common::{FramePop, FramePush, Segment, UnresolvedNativeFrame};

fn dump_to_string(reader: &heapscope::RecordReader) -> (String, Result<(), ReaderError>) {
    let mut out = Vec::new();
    let result = reader.dump_all_records(&mut out);
    (String::from_utf8(out).unwrap(), result)
}

#[test]
fn dumps_one_line_per_record() {
    let mut writer = capture();
    writer
        .write_frame_index(
            1,
            &heapscope_common::Frame {
                function_name: "handler".to_string(),
                filename: "srv.py".to_string(),
                parent_lineno: 30,
                lineno: 0,
            },
        )
        .unwrap();
    writer.write_frame_push(&FramePush { tid: 7, frame_id: 1 }).unwrap();
    writer.write_allocation(&alloc(7, 42)).unwrap();
    writer.write_frame_pop(&FramePop { tid: 7, count: 1 }).unwrap();
    writer.write_native_frame(&UnresolvedNativeFrame { ip: 0xabc0, parent_index: 0 }).unwrap();
    writer.write_memory_map_start().unwrap();
    writer
        .write_segment_header("/usr/lib/libc.so.6", 0x7000, &[Segment { vaddr: 0x1000, memsz: 64 }])
        .unwrap();
    writer.write_thread_record(7, "main").unwrap();
    let reader = reader_for(writer);

    let (text, result) = dump_to_string(&reader);
    result.unwrap();

    assert!(text.starts_with("HEADER magic=heapscope version=1 native_traces=false"));
    assert!(text.contains("command_line=python app.py --serve"));
    assert!(text.contains("FRAME_INDEX frame_id=1 function_name=handler filename=srv.py parent_lineno=30"));
    assert!(text.contains("FRAME_PUSH tid=7 frame_id=1"));
    assert!(text.contains("ALLOCATION tid=7 address=0x1000 size=8 allocator=malloc py_lineno=42 native_frame_id=0"));
    assert!(text.contains("FRAME_POP tid=7 count=1"));
    assert!(text.contains("NATIVE_FRAME_INDEX ip=0xabc0 parent_index=0"));
    assert!(text.contains("MEMORY_MAP_START"));
    assert!(text.contains("SEGMENT_HEADER filename=/usr/lib/libc.so.6 num_segments=1 addr=0x7000"));
    assert!(text.contains("SEGMENT 0x1000 64"));
    assert!(text.contains("THREAD tid=7 name=main"));

    // one line per record plus the header line
    assert_eq!(text.lines().count(), 10);
}

#[test]
fn unknown_allocator_is_printed_not_fatal() {
    let mut bytes = capture().into_inner();
    bytes.push(1); // ALLOCATION tag
    bytes.extend_from_slice(&7u64.to_le_bytes());
    bytes.extend_from_slice(&0x1000u64.to_le_bytes());
    bytes.extend_from_slice(&8u64.to_le_bytes());
    bytes.push(200); // allocator id from the future
    bytes.extend_from_slice(&42i32.to_le_bytes());
    bytes.extend_from_slice(&0u64.to_le_bytes());
    let reader = reader_over(bytes);

    let (text, result) = dump_to_string(&reader);
    result.unwrap();
    assert!(text.contains("allocator=<unknown allocator 200>"));
}

#[test]
fn unknown_tag_stops_the_dump() {
    let mut bytes = capture().into_inner();
    bytes.push(77);
    let reader = reader_over(bytes);

    let (text, result) = dump_to_string(&reader);
    result.unwrap();
    assert!(text.trim_end().ends_with("UNKNOWN RECORD TYPE 77"));
}

#[test]
fn bare_segment_is_reported_malformed() {
    let mut bytes = capture().into_inner();
    bytes.push(8); // SEGMENT with no table open
    bytes.extend_from_slice(&0x1000u64.to_le_bytes());
    bytes.extend_from_slice(&64u64.to_le_bytes());
    let reader = reader_over(bytes);

    let (text, result) = dump_to_string(&reader);
    assert!(matches!(result, Err(ReaderError::StraySegment)));
    assert!(text.contains("BAD SEGMENT"));
}

#[test]
fn truncated_record_ends_the_dump_quietly() {
    let mut bytes = capture().into_inner();
    bytes.push(2); // FRAME_PUSH missing its payload
    bytes.extend_from_slice(&7u64.to_le_bytes());
    let reader = reader_over(bytes);

    let (text, result) = dump_to_string(&reader);
    result.unwrap();
    assert_eq!(text.lines().count(), 1); // just the header line
}
