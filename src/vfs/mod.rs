//! Virtual File System
//!
//! The storage the toolchain module sees through the fs shim. One trait, two
//! providers picked when a runtime is constructed:
//! - [`MemoryFs`]: a full in-memory volume, seeded per compile and exported
//!   back afterwards
//! - [`StubFs`]: owns only the stdio descriptors; everything else either
//!   succeeds as a no-op or reports "not implemented"
//!
//! Design: trait-based abstraction, keeping it simple.

pub mod memory;
pub mod stub;

pub use memory::{MemoryFs, Snapshot};
pub use stub::StubFs;

use std::io;

/// A file handle. Handles 0, 1 and 2 are stdin, stdout and stderr.
pub type FileHandle = usize;

/// Standard stream handles
pub const STDIN: FileHandle = 0;
pub const STDOUT: FileHandle = 1;
pub const STDERR: FileHandle = 2;

/// Paths backing the standard streams
pub const STDIN_PATH: &str = "/dev/stdin";
pub const STDOUT_PATH: &str = "/dev/stdout";
pub const STDERR_PATH: &str = "/dev/stderr";

/// File open modes
#[derive(Debug, Clone, Copy)]
pub struct OpenOptions {
    pub read: bool,
    pub write: bool,
    pub append: bool,
    pub create: bool,
    pub create_new: bool,
    pub truncate: bool,
    pub directory: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            read: true,
            write: false,
            append: false,
            create: false,
            create_new: false,
            truncate: false,
            directory: false,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    pub fn write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }

    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Fail with `AlreadyExists` if the path is present
    pub fn create_new(mut self, create_new: bool) -> Self {
        self.create_new = create_new;
        self
    }

    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    /// Fail with `NotADirectory` unless the path is a directory
    pub fn directory(mut self, directory: bool) -> Self {
        self.directory = directory;
        self
    }
}

/// File metadata
#[derive(Debug, Clone)]
pub struct Metadata {
    pub size: u64,
    pub is_dir: bool,
    pub is_file: bool,
    pub is_symlink: bool,
    /// Inode number, stable for the life of the node
    pub ino: u64,
    /// Unix permission bits (rwxrwxrwx)
    pub mode: u16,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u32,
    /// Times in milliseconds since epoch
    pub atime: f64,
    pub mtime: f64,
    pub ctime: f64,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            size: 0,
            is_dir: false,
            is_file: true,
            is_symlink: false,
            ino: 0,
            mode: 0o644,
            uid: 0,
            gid: 0,
            nlink: 1,
            atime: 0.0,
            mtime: 0.0,
            ctime: 0.0,
        }
    }
}

/// Directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// The FileSystem trait - the capability set the fs shim forwards to
pub trait FileSystem {
    /// Whether arbitrary paths can be opened. Stub providers only own the
    /// stdio handles.
    fn can_open(&self) -> bool {
        true
    }

    /// Open a file or directory, returning a handle
    fn open(&mut self, path: &str, options: OpenOptions) -> io::Result<FileHandle>;

    /// Close a file handle
    fn close(&mut self, handle: FileHandle) -> io::Result<()>;

    /// Read from the handle's current position
    fn read(&mut self, handle: FileHandle, buf: &mut [u8]) -> io::Result<usize>;

    /// Write at the handle's current position (or the end, in append mode)
    fn write(&mut self, handle: FileHandle, buf: &[u8]) -> io::Result<usize>;

    /// Seek within a file
    fn seek(&mut self, handle: FileHandle, pos: io::SeekFrom) -> io::Result<u64>;

    /// Flush a handle to storage
    fn sync(&mut self, handle: FileHandle) -> io::Result<()>;

    /// Metadata for an open handle
    fn fstat(&self, handle: FileHandle) -> io::Result<Metadata>;

    /// Path an open handle refers to
    fn handle_path(&self, handle: FileHandle) -> io::Result<String>;

    /// Metadata for a path, following symlinks
    fn metadata(&self, path: &str) -> io::Result<Metadata>;

    /// Metadata for a path, not following a final symlink
    fn symlink_metadata(&self, path: &str) -> io::Result<Metadata>;

    /// Create a directory (parent must exist)
    fn create_dir(&mut self, path: &str) -> io::Result<()>;

    /// Read directory contents
    fn read_dir(&self, path: &str) -> io::Result<Vec<DirEntry>>;

    /// Remove a file
    fn remove_file(&mut self, path: &str) -> io::Result<()>;

    /// Remove an empty directory
    fn remove_dir(&mut self, path: &str) -> io::Result<()>;

    /// Rename/move a file or directory
    fn rename(&mut self, from: &str, to: &str) -> io::Result<()>;

    /// Resize the file behind a handle
    fn set_len(&mut self, handle: FileHandle, len: u64) -> io::Result<()>;

    /// Resize the file at a path
    fn truncate(&mut self, path: &str, len: u64) -> io::Result<()>;

    /// Create a symbolic link
    fn symlink(&mut self, target: &str, link_path: &str) -> io::Result<()>;

    /// Read the target of a symbolic link
    fn read_link(&self, path: &str) -> io::Result<String>;

    /// Create a hard link
    fn link(&mut self, source: &str, dest: &str) -> io::Result<()>;

    /// Change file mode (permissions)
    fn chmod(&mut self, path: &str, mode: u16) -> io::Result<()>;

    /// Change file owner
    fn chown(&mut self, path: &str, uid: u32, gid: u32) -> io::Result<()>;

    /// Update access and modification times
    fn utimes(&mut self, path: &str, atime: f64, mtime: f64) -> io::Result<()>;

    /// Check if path exists
    fn exists(&self, path: &str) -> bool;
}

/// Marker carried by errors for handles that are not open
#[derive(Debug)]
pub struct BadHandle;

impl std::fmt::Display for BadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid file handle")
    }
}

impl std::error::Error for BadHandle {}

/// Error for a handle that is not open
pub fn bad_handle() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, BadHandle)
}

/// Whether an error came from [`bad_handle`]
pub fn is_bad_handle(err: &io::Error) -> bool {
    err.get_ref().is_some_and(|e| e.is::<BadHandle>())
}

/// Error for operations a provider deliberately does not support
pub fn unsupported(op: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, format!("{} not implemented", op))
}

/// Normalize a path: leading slash, no trailing slash, `.` and `..` resolved
pub fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Parent directory of a normalized path (`None` for the root)
pub fn parent_path(path: &str) -> Option<String> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/".to_string()),
        Some(idx) => Some(path[..idx].to_string()),
        None => None,
    }
}

/// Join a path under a directory, keeping absolute paths as they are
pub fn resolve_under(root: &str, path: &str) -> String {
    if path.starts_with('/') {
        normalize_path(path)
    } else {
        normalize_path(&format!("{}/{}", root, path))
    }
}

/// Convenience wrapper for reading an entire file to a string (lossy UTF-8)
pub fn read_to_string<F: FileSystem + ?Sized>(fs: &mut F, path: &str) -> io::Result<String> {
    let handle = fs.open(path, OpenOptions::new().read(true))?;
    let meta = fs.fstat(handle)?;
    let mut buf = vec![0u8; meta.size as usize];
    let mut filled = 0;
    while filled < buf.len() {
        let n = fs.read(handle, &mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    fs.close(handle)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Convenience wrapper for writing a string to a file
pub fn write_string<F: FileSystem + ?Sized>(fs: &mut F, path: &str, content: &str) -> io::Result<()> {
    let handle = fs.open(
        path,
        OpenOptions::new().write(true).create(true).truncate(true),
    )?;
    fs.write(handle, content.as_bytes())?;
    fs.close(handle)?;
    Ok(())
}

/// Create a directory and all missing parents
pub fn create_dir_all<F: FileSystem + ?Sized>(fs: &mut F, path: &str) -> io::Result<()> {
    let path = normalize_path(path);
    let mut current = String::new();
    for part in path.split('/').filter(|p| !p.is_empty()) {
        current.push('/');
        current.push_str(part);
        match fs.metadata(&current) {
            Ok(meta) if meta.is_dir => {}
            Ok(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::NotADirectory,
                    format!("Not a directory: {}", current),
                ));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => fs.create_dir(&current)?,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
