//! Host ABI types and constants
//!
//! The contract between the worker and the toolchain module's host runtime:
//! the fs descriptor-constant table, errno codes, stat mode bits, and the
//! reserved keys used in compile output.

use std::io;

/// Reserved output keys. Angle brackets keep them apart from any relative
/// file path the bridge emits.
pub mod keys {
    /// Captured standard output
    pub const STDOUT: &str = "<stdout>";
    /// Diagnostic summary (stderr text, exit-code marker)
    pub const STDERR: &str = "<stderr>";
}

/// File type bits for `Stats.mode`
pub mod mode {
    pub const S_IFMT: u32 = 0o170000;
    pub const S_IFREG: u32 = 0o100000;
    pub const S_IFDIR: u32 = 0o040000;
    pub const S_IFLNK: u32 = 0o120000;
}

/// Open-flag constants published on the shim as `fs.constants`
///
/// The host runtime reads this table while it initializes, before any file
/// is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsConstants {
    pub o_wronly: i32,
    pub o_rdwr: i32,
    pub o_creat: i32,
    pub o_trunc: i32,
    pub o_append: i32,
    pub o_excl: i32,
    pub o_directory: i32,
}

impl FsConstants {
    /// Linux values, as Node reports them
    pub const LINUX: FsConstants = FsConstants {
        o_wronly: 0o1,
        o_rdwr: 0o2,
        o_creat: 0o100,
        o_trunc: 0o1000,
        o_append: 0o2000,
        o_excl: 0o200,
        o_directory: 0o200000,
    };

    /// Every flag unsupported: the host runtime's "no real filesystem" table
    pub const UNSUPPORTED: FsConstants = FsConstants {
        o_wronly: -1,
        o_rdwr: -1,
        o_creat: -1,
        o_trunc: -1,
        o_append: -1,
        o_excl: -1,
        o_directory: -1,
    };

    /// `(name, value)` pairs in the order they are published
    pub fn entries(&self) -> [(&'static str, i32); 7] {
        [
            ("O_WRONLY", self.o_wronly),
            ("O_RDWR", self.o_rdwr),
            ("O_CREAT", self.o_creat),
            ("O_TRUNC", self.o_trunc),
            ("O_APPEND", self.o_append),
            ("O_EXCL", self.o_excl),
            ("O_DIRECTORY", self.o_directory),
        ]
    }
}

/// Errno codes reported through the shim's error objects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Errno {
    /// No such file or directory
    Enoent,
    /// File exists
    Eexist,
    /// Not a directory
    Enotdir,
    /// Is a directory
    Eisdir,
    /// Directory not empty
    Enotempty,
    /// Bad file descriptor
    Ebadf,
    /// Invalid argument
    Einval,
    /// Permission denied
    Eacces,
    /// Function not implemented
    Enosys,
    /// Generic I/O error
    Eio,
}

impl Errno {
    /// The string a Node-style error carries in `err.code`
    pub fn code(&self) -> &'static str {
        match self {
            Self::Enoent => "ENOENT",
            Self::Eexist => "EEXIST",
            Self::Enotdir => "ENOTDIR",
            Self::Eisdir => "EISDIR",
            Self::Enotempty => "ENOTEMPTY",
            Self::Ebadf => "EBADF",
            Self::Einval => "EINVAL",
            Self::Eacces => "EACCES",
            Self::Enosys => "ENOSYS",
            Self::Eio => "EIO",
        }
    }

    pub fn from_io(err: &io::Error) -> Self {
        if crate::vfs::is_bad_handle(err) {
            return Self::Ebadf;
        }
        match err.kind() {
            io::ErrorKind::NotFound => Self::Enoent,
            io::ErrorKind::AlreadyExists => Self::Eexist,
            io::ErrorKind::NotADirectory => Self::Enotdir,
            io::ErrorKind::IsADirectory => Self::Eisdir,
            io::ErrorKind::DirectoryNotEmpty => Self::Enotempty,
            io::ErrorKind::InvalidInput => Self::Einval,
            io::ErrorKind::PermissionDenied => Self::Eacces,
            io::ErrorKind::Unsupported => Self::Enosys,
            _ => Self::Eio,
        }
    }
}
