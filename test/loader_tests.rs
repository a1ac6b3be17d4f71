//! Input loader integration tests

use std::io::{BufReader, Write};

use sealvm::input::{load_file, load_from, InputBuffer, LoadError, MAX_STRING};
use tempfile::NamedTempFile;

fn write_temp(content: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn file_and_stream_loads_agree() {
    let content = b"print('hello')\nprint('world')\n";
    let file = write_temp(content);

    let mut from_file = InputBuffer::large();
    load_file(&mut from_file, file.path()).unwrap();

    let mut from_stream = InputBuffer::large();
    let mut reader = BufReader::new(&content[..]);
    load_from(&mut from_stream, &mut reader, None).unwrap();

    assert_eq!(from_file.as_bytes(), from_stream.as_bytes());
    assert_eq!(from_file.as_bytes(), content);
}

#[test]
fn shebang_line_is_dropped() {
    let file = write_temp(b"#!/usr/bin/env sealvm\nprint('x')\n");
    let mut buf = InputBuffer::large();
    load_file(&mut buf, file.path()).unwrap();
    assert_eq!(buf.as_bytes(), b"print('x')\n");
}

#[test]
fn hash_comment_is_not_a_shebang() {
    let file = write_temp(b"# just a comment\nprint('x')\n");
    let mut buf = InputBuffer::large();
    load_file(&mut buf, file.path()).unwrap();
    assert_eq!(buf.as_bytes(), b"# just a comment\nprint('x')\n");
}

#[test]
fn empty_file_is_an_error() {
    let file = write_temp(b"");
    let mut buf = InputBuffer::large();
    assert!(matches!(
        load_file(&mut buf, file.path()),
        Err(LoadError::Empty)
    ));
}

#[test]
fn missing_file_reports_its_path() {
    let mut buf = InputBuffer::large();
    let err = load_file(&mut buf, std::path::Path::new("/no/such/script.zn")).unwrap_err();
    assert!(err.to_string().contains("/no/such/script.zn"));
}

#[test]
fn oversized_input_truncates_without_error() {
    let mut buf = InputBuffer::with_capacity(64);
    let big = vec![b'a'; 1000];
    let mut reader = BufReader::new(&big[..]);
    let kept = load_from(&mut buf, &mut reader, None).unwrap();
    assert_eq!(kept, buf.max_content());
    assert!(buf.is_full());
}

#[test]
fn long_first_line_is_loaded_in_chunks() {
    // A first line longer than the line-probe window must still arrive whole.
    let mut content = vec![b'x'; MAX_STRING * 2];
    content.push(b'\n');
    let mut buf = InputBuffer::large();
    let mut reader = BufReader::new(&content[..]);
    let kept = load_from(&mut buf, &mut reader, None).unwrap();
    assert_eq!(kept, content.len());
    assert_eq!(buf.as_bytes(), &content[..]);
}

#[test]
fn short_read_from_sized_source_is_not_fatal() {
    // A seekable source shrinking underneath us warns but keeps what was
    // actually read.
    let content = b"print('partial')\n";
    let mut buf = InputBuffer::large();
    let mut reader = BufReader::new(&content[..]);
    let kept = load_from(&mut buf, &mut reader, Some(content.len() as u64 + 500)).unwrap();
    assert_eq!(kept, content.len());
    assert_eq!(buf.as_bytes(), content);
}

#[test]
fn buffer_reuse_after_clear() {
    let file_a = write_temp(b"first\n");
    let file_b = write_temp(b"second script\n");
    let mut buf = InputBuffer::large();

    load_file(&mut buf, file_a.path()).unwrap();
    assert_eq!(buf.as_bytes(), b"first\n");

    buf.clear();
    load_file(&mut buf, file_b.path()).unwrap();
    assert_eq!(buf.as_bytes(), b"second script\n");
}
