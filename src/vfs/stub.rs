//! Stub filesystem
//!
//! For modules that keep their own file tree and only need the host for
//! console output. Writes to stdout/stderr are captured (and echoed line by
//! line to the console); metadata calls succeed without effect; anything that
//! would need real file content reports "not implemented".

use super::{
    DirEntry, FileHandle, FileSystem, Metadata, OpenOptions, STDERR, STDERR_PATH, STDIN, STDIN_PATH,
    STDOUT, STDOUT_PATH, bad_handle, unsupported,
};
use crate::console_log;
use std::io;

/// A captured output stream
#[derive(Default)]
struct Capture {
    data: Vec<u8>,
    /// Bytes since the last newline, not yet echoed
    pending_line: Vec<u8>,
}

impl Capture {
    fn push(&mut self, label: &str, buf: &[u8]) {
        self.data.extend_from_slice(buf);
        self.pending_line.extend_from_slice(buf);
        while let Some(nl) = self.pending_line.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending_line.drain(..=nl).collect();
            console_log!("[fs] {}: {}", label, String::from_utf8_lossy(&line[..nl]));
        }
    }

    fn take(&mut self) -> String {
        self.pending_line.clear();
        String::from_utf8_lossy(&std::mem::take(&mut self.data)).into_owned()
    }
}

/// Stub filesystem: stdio capture only
#[derive(Default)]
pub struct StubFs {
    stdout: Capture,
    stderr: Capture,
}

impl StubFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captured stdout so far
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.stdout.data).into_owned()
    }

    /// Captured stderr so far
    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.stderr.data).into_owned()
    }

    /// Drain captured stdout
    pub fn take_stdout(&mut self) -> String {
        self.stdout.take()
    }

    /// Drain captured stderr
    pub fn take_stderr(&mut self) -> String {
        self.stderr.take()
    }
}

impl FileSystem for StubFs {
    fn can_open(&self) -> bool {
        false
    }

    fn open(&mut self, _path: &str, _options: OpenOptions) -> io::Result<FileHandle> {
        Err(unsupported("open"))
    }

    fn close(&mut self, _handle: FileHandle) -> io::Result<()> {
        Ok(())
    }

    fn read(&mut self, _handle: FileHandle, _buf: &mut [u8]) -> io::Result<usize> {
        Err(unsupported("read"))
    }

    fn write(&mut self, handle: FileHandle, buf: &[u8]) -> io::Result<usize> {
        match handle {
            STDOUT => self.stdout.push("stdout", buf),
            STDERR => self.stderr.push("stderr", buf),
            _ => return Err(bad_handle()),
        }
        Ok(buf.len())
    }

    fn seek(&mut self, _handle: FileHandle, _pos: io::SeekFrom) -> io::Result<u64> {
        Err(unsupported("seek"))
    }

    fn sync(&mut self, _handle: FileHandle) -> io::Result<()> {
        Ok(())
    }

    fn fstat(&self, _handle: FileHandle) -> io::Result<Metadata> {
        Err(unsupported("fstat"))
    }

    fn handle_path(&self, handle: FileHandle) -> io::Result<String> {
        match handle {
            STDIN => Ok(STDIN_PATH.to_string()),
            STDOUT => Ok(STDOUT_PATH.to_string()),
            STDERR => Ok(STDERR_PATH.to_string()),
            _ => Err(bad_handle()),
        }
    }

    fn metadata(&self, _path: &str) -> io::Result<Metadata> {
        Err(unsupported("stat"))
    }

    fn symlink_metadata(&self, _path: &str) -> io::Result<Metadata> {
        Err(unsupported("lstat"))
    }

    fn create_dir(&mut self, _path: &str) -> io::Result<()> {
        Ok(())
    }

    fn read_dir(&self, _path: &str) -> io::Result<Vec<DirEntry>> {
        Err(unsupported("readdir"))
    }

    fn remove_file(&mut self, _path: &str) -> io::Result<()> {
        Err(unsupported("unlink"))
    }

    fn remove_dir(&mut self, _path: &str) -> io::Result<()> {
        Err(unsupported("rmdir"))
    }

    fn rename(&mut self, _from: &str, _to: &str) -> io::Result<()> {
        Err(unsupported("rename"))
    }

    fn set_len(&mut self, _handle: FileHandle, _len: u64) -> io::Result<()> {
        Err(unsupported("ftruncate"))
    }

    fn truncate(&mut self, _path: &str, _len: u64) -> io::Result<()> {
        Err(unsupported("truncate"))
    }

    fn symlink(&mut self, _target: &str, _link_path: &str) -> io::Result<()> {
        Err(unsupported("symlink"))
    }

    fn read_link(&self, _path: &str) -> io::Result<String> {
        Err(unsupported("readlink"))
    }

    fn link(&mut self, _source: &str, _dest: &str) -> io::Result<()> {
        Err(unsupported("link"))
    }

    fn chmod(&mut self, _path: &str, _mode: u16) -> io::Result<()> {
        Ok(())
    }

    fn chown(&mut self, _path: &str, _uid: u32, _gid: u32) -> io::Result<()> {
        Ok(())
    }

    fn utimes(&mut self, _path: &str, _atime: f64, _mtime: f64) -> io::Result<()> {
        Ok(())
    }

    fn exists(&self, _path: &str) -> bool {
        false
    }
}
