//! Bounded input loading
//!
//! Scripts, key material and auxiliary data all enter the runtime through
//! this module. Input lands in fixed-capacity buffers: a read can truncate
//! (with a warning) but can never overflow, and the buffer stays
//! terminator-safe at all times.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use log::{debug, warn};
use thiserror::Error;

/// Capacity for short inputs: filenames, identifiers, single lines.
/// Also the chunk size for bulk reads.
pub const MAX_STRING: usize = 4096;

/// Capacity for large inputs: script bodies, key and data documents.
pub const MAX_FILE: usize = 2_048_000;

/// Loader errors. Open/read failures on startup inputs are treated as fatal
/// by the caller; truncation is not an error.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("read error: {0}")]
    Io(#[from] io::Error),

    #[error("input is empty")]
    Empty,
}

/// An owned byte buffer with a fixed capacity and a logical length.
///
/// Invariants: `len < capacity` and the byte at `len` is always zero, so the
/// content can be handed to terminator-expecting consumers. Writes past the
/// usable capacity are truncated, never out of bounds.
pub struct InputBuffer {
    buf: Box<[u8]>,
    len: usize,
}

impl InputBuffer {
    /// Buffer sized for filenames and identifiers.
    pub fn short() -> Self {
        Self::with_capacity(MAX_STRING)
    }

    /// Buffer sized for file contents.
    pub fn large() -> Self {
        Self::with_capacity(MAX_FILE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity >= 2, "buffer capacity too small to hold content");
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Usable content bytes: one slot is reserved for the terminator.
    pub fn max_content(&self) -> usize {
        self.buf.len() - 1
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.max_content()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Content as UTF-8, lossy. Script and key material is expected to be
    /// text; invalid sequences are replaced rather than rejected here.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }

    pub fn clear(&mut self) {
        self.buf[..=self.len].fill(0);
        self.len = 0;
    }

    /// Append bytes, truncating at capacity. Returns how many bytes were
    /// actually retained.
    pub fn push_bytes(&mut self, data: &[u8]) -> usize {
        let room = self.max_content() - self.len;
        let take = room.min(data.len());
        self.buf[self.len..self.len + take].copy_from_slice(&data[..take]);
        self.len += take;
        self.buf[self.len] = 0;
        take
    }
}

impl std::fmt::Debug for InputBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len)
            .finish()
    }
}

/// Load a file into `dst`, stripping an optional shebang line.
///
/// The file size is probed up front for diagnostics only; sizing of `dst`
/// never depends on it. Returns the number of content bytes retained.
pub fn load_file(dst: &mut InputBuffer, path: &Path) -> Result<usize, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let mut file = file;
    let size = probe_size(&mut file)?;
    debug!("size of file {}: {} bytes", path.display(), size);
    let mut reader = BufReader::new(file);
    load_from(dst, &mut reader, Some(size))
}

/// Load the standard input stream into `dst`, stripping an optional shebang.
pub fn load_stdin(dst: &mut InputBuffer) -> Result<usize, LoadError> {
    let stdin = io::stdin();
    let mut reader = stdin.lock();
    load_from(dst, &mut reader, None)
}

/// Shared loading engine over any buffered reader.
///
/// `expected` is the size reported by a seekable source, used only to warn
/// about short reads. Empty input is an error; truncation is not.
pub fn load_from<R: BufRead>(
    dst: &mut InputBuffer,
    reader: &mut R,
    expected: Option<u64>,
) -> Result<usize, LoadError> {
    let mut consumed: u64 = 0;

    // First line: bounded read, dropped entirely if it is a shebang.
    let mut firstline = Vec::with_capacity(MAX_STRING);
    let n = reader
        .by_ref()
        .take(MAX_STRING as u64)
        .read_until(b'\n', &mut firstline)?;
    if n == 0 {
        return Err(LoadError::Empty);
    }
    consumed += n as u64;
    if firstline.starts_with(b"#!") {
        debug!("skipping shebang line");
    } else {
        dst.push_bytes(&firstline);
    }

    let mut chunk = [0u8; MAX_STRING];
    loop {
        if dst.is_full() {
            warn!("input too big, truncated at maximum supported size");
            break;
        }
        let want = chunk.len().min(dst.max_content() - dst.len());
        let got = reader.read(&mut chunk[..want])?;
        if got == 0 {
            match expected {
                Some(size) if consumed != size => {
                    warn!("incomplete read ({} of {} bytes)", consumed, size);
                }
                _ => debug!("EOF after {} bytes", consumed),
            }
            break;
        }
        consumed += got as u64;
        dst.push_bytes(&chunk[..got]);
    }

    debug!("loaded input ({} bytes)", dst.len());
    Ok(dst.len())
}

fn probe_size(file: &mut File) -> Result<u64, LoadError> {
    let size = file.seek(SeekFrom::End(0))?;
    file.seek(SeekFrom::Start(0))?;
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn push_truncates_at_capacity() {
        let mut buf = InputBuffer::with_capacity(8);
        let taken = buf.push_bytes(b"0123456789");
        assert_eq!(taken, 7);
        assert_eq!(buf.len(), 7);
        assert!(buf.is_full());
        assert_eq!(buf.as_bytes(), b"0123456");
    }

    #[test]
    fn clear_resets_terminator() {
        let mut buf = InputBuffer::with_capacity(8);
        buf.push_bytes(b"abc");
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.push_bytes(b"xy"), 2);
        assert_eq!(buf.as_bytes(), b"xy");
    }

    #[test]
    fn shebang_is_stripped() {
        let mut buf = InputBuffer::large();
        let mut src = Cursor::new(b"#!/usr/bin/env sealvm\nprint('ok')\n".to_vec());
        let n = load_from(&mut buf, &mut src, None).unwrap();
        assert_eq!(buf.as_bytes(), b"print('ok')\n");
        assert_eq!(n, buf.len());
    }

    #[test]
    fn non_shebang_first_line_is_kept() {
        let mut buf = InputBuffer::large();
        let mut src = Cursor::new(b"-- comment\nprint('ok')\n".to_vec());
        load_from(&mut buf, &mut src, None).unwrap();
        assert_eq!(buf.as_bytes(), b"-- comment\nprint('ok')\n");
    }

    #[test]
    fn empty_source_is_an_error() {
        let mut buf = InputBuffer::large();
        let mut src = Cursor::new(Vec::new());
        assert!(matches!(
            load_from(&mut buf, &mut src, None),
            Err(LoadError::Empty)
        ));
    }

    #[test]
    fn oversized_input_truncates_to_capacity_minus_one() {
        let mut buf = InputBuffer::with_capacity(64);
        let payload = vec![b'a'; 1024];
        let mut src = Cursor::new(payload);
        let n = load_from(&mut buf, &mut src, None).unwrap();
        assert_eq!(n, 63);
        assert!(buf.is_full());
        assert!(buf.as_bytes().iter().all(|&b| b == b'a'));
    }
}
