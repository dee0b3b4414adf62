//! In-memory flash filesystem.
//!
//! A per-node map from normalized path to byte vector. Directories are
//! implicit: `mkdir` reports success without doing anything, and path
//! normalization strips all leading `/`.
//!
//! Open handles carry their own copy of the file contents; closing a handle
//! flushes it back into the map. Readers observe only flushed state, and when
//! several handles to the same path are open the last one closed wins.

use std::collections::HashMap;
use std::sync::Mutex;

/// Fixed simulated flash capacity.
pub const TOTAL_BYTES: usize = 1 << 20;

/// Open mode for [`SimFilesystem::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Fails if the file is absent; cursor at 0.
    Read,
    /// Creates or truncates; cursor at 0.
    Write,
    /// Creates if absent; cursor at end.
    Append,
}

impl OpenMode {
    /// Parse the Arduino-style mode string (`"r"`, `"w"`, `"a"`).
    pub fn from_str(mode: &str) -> Option<Self> {
        match mode {
            "r" => Some(OpenMode::Read),
            "w" => Some(OpenMode::Write),
            "a" => Some(OpenMode::Append),
            _ => None,
        }
    }
}

pub struct SimFilesystem {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

fn normalize(path: &str) -> &str {
    path.trim_start_matches('/')
}

impl SimFilesystem {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        self.files.lock().unwrap().contains_key(normalize(path))
    }

    pub fn remove(&self, path: &str) -> bool {
        self.files.lock().unwrap().remove(normalize(path)).is_some()
    }

    /// Directories are implicit.
    pub fn mkdir(&self, _path: &str) -> bool {
        true
    }

    pub fn rmdir(&self, _path: &str) -> bool {
        true
    }

    /// Clear all entries. Handles still open keep their private copies and
    /// flush on close as usual.
    pub fn format(&self) {
        self.files.lock().unwrap().clear();
    }

    pub fn used_bytes(&self) -> usize {
        self.files.lock().unwrap().values().map(Vec::len).sum()
    }

    pub fn total_bytes(&self) -> usize {
        TOTAL_BYTES
    }

    /// Open a file handle, or `None` for a read of an absent path.
    pub fn open(&self, path: &str, mode: OpenMode) -> Option<File<'_>> {
        let normalized = normalize(path).to_string();
        let mut files = self.files.lock().unwrap();
        let (data, pos) = match mode {
            OpenMode::Read => {
                let data = files.get(&normalized)?.clone();
                (data, 0)
            }
            OpenMode::Write => {
                files.insert(normalized.clone(), Vec::new());
                (Vec::new(), 0)
            }
            OpenMode::Append => {
                let data = files.entry(normalized.clone()).or_default().clone();
                let pos = data.len();
                (data, pos)
            }
        };
        drop(files);
        Some(File {
            fs: self,
            path: normalized,
            data,
            pos,
            flushed: false,
        })
    }

    /// Coordinator-side whole-file write. Returns the byte count actually
    /// stored; out-of-space is a short write.
    pub fn write_file(&self, path: &str, data: &[u8]) -> usize {
        let normalized = normalize(path).to_string();
        let mut files = self.files.lock().unwrap();
        let used_other: usize = files
            .iter()
            .filter(|(name, _)| **name != normalized)
            .map(|(_, contents)| contents.len())
            .sum();
        let room = TOTAL_BYTES.saturating_sub(used_other);
        let len = data.len().min(room);
        if len < data.len() {
            log::warn!("filesystem full: short write of {normalized} ({len}/{} bytes)", data.len());
        }
        files.insert(normalized, data[..len].to_vec());
        len
    }

    /// Coordinator-side whole-file read, truncated to `max_len`.
    pub fn read_file(&self, path: &str, max_len: usize) -> Option<Vec<u8>> {
        let files = self.files.lock().unwrap();
        let data = files.get(normalize(path))?;
        let len = data.len().min(max_len);
        Some(data[..len].to_vec())
    }

    fn flush(&self, path: &str, data: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), data.to_vec());
    }

    /// Space a handle on `path` may grow into: total capacity minus every
    /// other flushed file.
    fn room_for(&self, path: &str) -> usize {
        let files = self.files.lock().unwrap();
        let used_other: usize = files
            .iter()
            .filter(|(name, _)| name.as_str() != path)
            .map(|(_, contents)| contents.len())
            .sum();
        TOTAL_BYTES.saturating_sub(used_other)
    }
}

impl Default for SimFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

/// An open file handle.
///
/// Holds a private copy of the contents; [`File::close`] (or drop) flushes it
/// back into the filesystem. Handles are not thread-safe: each belongs to the
/// strand that opened it.
pub struct File<'a> {
    fs: &'a SimFilesystem,
    path: String,
    data: Vec<u8>,
    pos: usize,
    flushed: bool,
}

impl<'a> File<'a> {
    pub fn name(&self) -> &str {
        &self.path
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes remaining between the cursor and the end of the handle's copy.
    pub fn available(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    /// Read up to `buf.len()` bytes at the cursor; returns the count.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let len = buf.len().min(self.available());
        buf[..len].copy_from_slice(&self.data[self.pos..self.pos + len]);
        self.pos += len;
        len
    }

    pub fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8];
        if self.read(&mut byte) == 1 {
            Some(byte[0])
        } else {
            None
        }
    }

    pub fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Write at the cursor, overwriting then extending. Growth past the
    /// filesystem capacity is clipped: the return value is the byte count
    /// actually written.
    pub fn write(&mut self, buf: &[u8]) -> usize {
        let room = self.fs.room_for(&self.path);
        let max_end = room.max(self.data.len());
        let len = buf.len().min(max_end.saturating_sub(self.pos));
        if len < buf.len() {
            log::warn!("filesystem full: short write of {} ({len}/{} bytes)", self.path, buf.len());
        }
        let end = self.pos + len;
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.pos..end].copy_from_slice(&buf[..len]);
        self.pos = end;
        len
    }

    /// Flush the handle's buffer back into the filesystem map.
    pub fn close(mut self) {
        self.flush_inner();
    }

    fn flush_inner(&mut self) {
        if !self.flushed {
            self.fs.flush(&self.path, &self.data);
            self.flushed = true;
        }
    }
}

impl Drop for File<'_> {
    fn drop(&mut self) {
        self.flush_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_roundtrip() {
        let fs = SimFilesystem::new();
        let mut file = fs.open("/cfg/node", OpenMode::Write).unwrap();
        file.write(b"payload");
        file.close();

        let mut file = fs.open("cfg/node", OpenMode::Read).unwrap();
        assert_eq!(file.size(), 7);
        let mut buf = [0u8; 16];
        let n = file.read(&mut buf);
        assert_eq!(&buf[..n], b"payload");
    }

    #[test]
    fn read_absent_fails() {
        let fs = SimFilesystem::new();
        assert!(fs.open("missing", OpenMode::Read).is_none());
    }

    #[test]
    fn write_truncates_append_extends() {
        let fs = SimFilesystem::new();
        fs.write_file("f", b"0123456789");

        let file = fs.open("f", OpenMode::Write).unwrap();
        file.close();
        assert_eq!(fs.read_file("f", 64).unwrap(), b"");

        let mut file = fs.open("f", OpenMode::Append).unwrap();
        file.write(b"ab");
        file.close();
        let mut file = fs.open("f", OpenMode::Append).unwrap();
        assert_eq!(file.position(), 2);
        file.write(b"cd");
        file.close();
        assert_eq!(fs.read_file("f", 64).unwrap(), b"abcd");
    }

    #[test]
    fn readers_see_only_flushed_state() {
        let fs = SimFilesystem::new();
        let mut writer = fs.open("state", OpenMode::Write).unwrap();
        writer.write(b"new");
        assert_eq!(fs.read_file("state", 64).unwrap(), b"");
        writer.close();
        assert_eq!(fs.read_file("state", 64).unwrap(), b"new");
    }

    #[test]
    fn last_close_wins() {
        let fs = SimFilesystem::new();
        let mut first = fs.open("shared", OpenMode::Write).unwrap();
        let mut second = fs.open("shared", OpenMode::Write).unwrap();
        first.write(b"first");
        second.write(b"second");
        first.close();
        second.close();
        assert_eq!(fs.read_file("shared", 64).unwrap(), b"second");
    }

    #[test]
    fn drop_flushes() {
        let fs = SimFilesystem::new();
        {
            let mut file = fs.open("dropped", OpenMode::Write).unwrap();
            file.write(b"x");
        }
        assert!(fs.exists("dropped"));
    }

    #[test]
    fn seek_and_overwrite() {
        let fs = SimFilesystem::new();
        let mut file = fs.open("s", OpenMode::Write).unwrap();
        file.write(b"abcdef");
        file.seek(2);
        file.write(b"XY");
        assert_eq!(file.position(), 4);
        file.close();
        assert_eq!(fs.read_file("s", 64).unwrap(), b"abXYef");
    }

    #[test]
    fn format_clears() {
        let fs = SimFilesystem::new();
        fs.write_file("a", b"1");
        fs.write_file("b", b"2");
        assert_eq!(fs.used_bytes(), 2);
        fs.format();
        assert_eq!(fs.used_bytes(), 0);
        assert!(!fs.exists("a"));
        assert_eq!(fs.total_bytes(), TOTAL_BYTES);
    }

    #[test]
    fn capacity_is_a_short_write() {
        let fs = SimFilesystem::new();
        let big = vec![0xAB; TOTAL_BYTES + 100];
        let written = fs.write_file("big", &big);
        assert_eq!(written, TOTAL_BYTES);
        assert_eq!(fs.used_bytes(), TOTAL_BYTES);
    }

    #[test]
    fn mkdir_is_implicit() {
        let fs = SimFilesystem::new();
        assert!(fs.mkdir("/some/dir"));
        assert!(fs.rmdir("/some/dir"));
        assert!(!fs.exists("/some/dir"));
    }
}
