//! Node-style fs shim
//!
//! The host runtime expects a Node `fs` object in global scope. `FsShim`
//! implements each method it calls against a [`FileSystem`] provider; the
//! platform layer wraps these in JS functions and reports results through
//! Node's `(err, result)` callback convention.
//!
//! Descriptors are the provider's handles. Positional reads and writes
//! (`position` not null) leave the descriptor's own offset untouched.

use super::abi::{Errno, FsConstants, mode};
use crate::vfs::{FileHandle, FileSystem, Metadata, OpenOptions, bad_handle};
use std::cell::RefCell;
use std::fmt;
use std::io::{self, SeekFrom};
use std::rc::Rc;

/// A provider shared between the shim and the runtime that owns it
pub type SharedFs = Rc<RefCell<dyn FileSystem>>;

/// Block size reported in stats
const BLOCK_SIZE: u64 = 4096;

/// An fs error as the host runtime sees it: errno code plus message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsError {
    pub code: Errno,
    pub message: String,
}

impl FsError {
    pub fn new(code: Errno, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<io::Error> for FsError {
    fn from(err: io::Error) -> Self {
        Self {
            code: Errno::from_io(&err),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for FsError {}

pub type FsResult<T> = Result<T, FsError>;

/// Node `fs.Stats`, flattened
#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub dev: u64,
    pub ino: u64,
    /// File type bits plus permissions
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u64,
    pub size: u64,
    pub blksize: u64,
    pub blocks: u64,
    pub atime_ms: f64,
    pub mtime_ms: f64,
    pub ctime_ms: f64,
}

impl Stats {
    pub fn from_metadata(meta: &Metadata) -> Self {
        let kind = if meta.is_dir {
            mode::S_IFDIR
        } else if meta.is_symlink {
            mode::S_IFLNK
        } else {
            mode::S_IFREG
        };
        Self {
            dev: 0,
            ino: meta.ino,
            mode: kind | u32::from(meta.mode & 0o7777),
            nlink: meta.nlink,
            uid: meta.uid,
            gid: meta.gid,
            rdev: 0,
            size: meta.size,
            blksize: BLOCK_SIZE,
            blocks: meta.size.div_ceil(512),
            atime_ms: meta.atime,
            mtime_ms: meta.mtime,
            ctime_ms: meta.ctime,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.mode & mode::S_IFMT == mode::S_IFDIR
    }
}

/// The fs object handed to the host runtime
pub struct FsShim {
    fs: SharedFs,
    constants: FsConstants,
}

impl FsShim {
    /// Wrap a provider. Providers that cannot open paths publish the
    /// all-unsupported constants table.
    pub fn new(fs: SharedFs) -> Self {
        let constants = if fs.borrow().can_open() {
            FsConstants::LINUX
        } else {
            FsConstants::UNSUPPORTED
        };
        Self { fs, constants }
    }

    pub fn constants(&self) -> FsConstants {
        self.constants
    }

    /// `fs.writeSync(fd, buf)`: the whole buffer is written
    pub fn write_sync(&self, fd: i32, data: &[u8]) -> FsResult<usize> {
        self.write(fd, data, None)
    }

    /// `fs.write(fd, buf, offset, length, position, cb)`
    pub fn write(&self, fd: i32, data: &[u8], position: Option<u64>) -> FsResult<usize> {
        let handle = descriptor(fd)?;
        let mut fs = self.fs.borrow_mut();
        match position {
            None => Ok(fs.write(handle, data)?),
            Some(pos) => {
                let saved = fs.seek(handle, SeekFrom::Current(0))?;
                fs.seek(handle, SeekFrom::Start(pos))?;
                let written = fs.write(handle, data);
                fs.seek(handle, SeekFrom::Start(saved))?;
                Ok(written?)
            }
        }
    }

    /// `fs.open(path, flags, mode, cb)`
    pub fn open(&self, path: &str, flags: i32, perm: u32) -> FsResult<i32> {
        let options = self.open_options(flags);
        let mut fs = self.fs.borrow_mut();
        let existed = fs.exists(path);
        let handle = fs.open(path, options)?;
        if options.create && !existed {
            // Honor the requested permissions on files this call created
            fs.chmod(path, (perm & 0o7777) as u16)?;
        }
        i32::try_from(handle).map_err(|_| FsError::new(Errno::Einval, "descriptor out of range"))
    }

    /// `fs.read(fd, buffer, offset, length, position, cb)`
    pub fn read(&self, fd: i32, buf: &mut [u8], position: Option<u64>) -> FsResult<usize> {
        let handle = descriptor(fd)?;
        let mut fs = self.fs.borrow_mut();
        match position {
            None => Ok(fs.read(handle, buf)?),
            Some(pos) => {
                let saved = fs.seek(handle, SeekFrom::Current(0))?;
                fs.seek(handle, SeekFrom::Start(pos))?;
                let read = fs.read(handle, buf);
                fs.seek(handle, SeekFrom::Start(saved))?;
                Ok(read?)
            }
        }
    }

    pub fn close(&self, fd: i32) -> FsResult<()> {
        Ok(self.fs.borrow_mut().close(descriptor(fd)?)?)
    }

    pub fn fstat(&self, fd: i32) -> FsResult<Stats> {
        let meta = self.fs.borrow().fstat(descriptor(fd)?)?;
        Ok(Stats::from_metadata(&meta))
    }

    pub fn stat(&self, path: &str) -> FsResult<Stats> {
        let meta = self.fs.borrow().metadata(path)?;
        Ok(Stats::from_metadata(&meta))
    }

    pub fn lstat(&self, path: &str) -> FsResult<Stats> {
        let meta = self.fs.borrow().symlink_metadata(path)?;
        Ok(Stats::from_metadata(&meta))
    }

    /// `fs.mkdir(path, perm, cb)`
    pub fn mkdir(&self, path: &str, perm: u32) -> FsResult<()> {
        let mut fs = self.fs.borrow_mut();
        fs.create_dir(path)?;
        fs.chmod(path, (perm & 0o7777) as u16)?;
        Ok(())
    }

    /// `fs.readdir(path, cb)`: entry names only
    pub fn readdir(&self, path: &str) -> FsResult<Vec<String>> {
        let entries = self.fs.borrow().read_dir(path)?;
        Ok(entries.into_iter().map(|e| e.name).collect())
    }

    pub fn unlink(&self, path: &str) -> FsResult<()> {
        Ok(self.fs.borrow_mut().remove_file(path)?)
    }

    pub fn rmdir(&self, path: &str) -> FsResult<()> {
        Ok(self.fs.borrow_mut().remove_dir(path)?)
    }

    pub fn rename(&self, from: &str, to: &str) -> FsResult<()> {
        Ok(self.fs.borrow_mut().rename(from, to)?)
    }

    pub fn chmod(&self, path: &str, perm: u32) -> FsResult<()> {
        Ok(self.fs.borrow_mut().chmod(path, (perm & 0o7777) as u16)?)
    }

    pub fn fchmod(&self, fd: i32, perm: u32) -> FsResult<()> {
        let path = self.fs.borrow().handle_path(descriptor(fd)?)?;
        self.chmod(&path, perm)
    }

    pub fn chown(&self, path: &str, uid: u32, gid: u32) -> FsResult<()> {
        Ok(self.fs.borrow_mut().chown(path, uid, gid)?)
    }

    pub fn fchown(&self, fd: i32, uid: u32, gid: u32) -> FsResult<()> {
        let path = self.fs.borrow().handle_path(descriptor(fd)?)?;
        self.chown(&path, uid, gid)
    }

    /// Ownership of the link itself; links carry no owner of their own here
    pub fn lchown(&self, path: &str, uid: u32, gid: u32) -> FsResult<()> {
        self.chown(path, uid, gid)
    }

    /// `fs.utimes(path, atime, mtime, cb)`, times in seconds
    pub fn utimes(&self, path: &str, atime: f64, mtime: f64) -> FsResult<()> {
        Ok(self
            .fs
            .borrow_mut()
            .utimes(path, atime * 1000.0, mtime * 1000.0)?)
    }

    pub fn fsync(&self, fd: i32) -> FsResult<()> {
        Ok(self.fs.borrow_mut().sync(descriptor(fd)?)?)
    }

    pub fn ftruncate(&self, fd: i32, len: u64) -> FsResult<()> {
        Ok(self.fs.borrow_mut().set_len(descriptor(fd)?, len)?)
    }

    pub fn truncate(&self, path: &str, len: u64) -> FsResult<()> {
        Ok(self.fs.borrow_mut().truncate(path, len)?)
    }

    pub fn link(&self, existing: &str, new_path: &str) -> FsResult<()> {
        Ok(self.fs.borrow_mut().link(existing, new_path)?)
    }

    pub fn symlink(&self, target: &str, link_path: &str) -> FsResult<()> {
        Ok(self.fs.borrow_mut().symlink(target, link_path)?)
    }

    pub fn readlink(&self, path: &str) -> FsResult<String> {
        Ok(self.fs.borrow().read_link(path)?)
    }

    /// Decode Node open flags against the published constants
    fn open_options(&self, flags: i32) -> OpenOptions {
        let c = self.constants;
        let has = |bit: i32| bit > 0 && flags & bit == bit;
        let write = has(c.o_wronly) || has(c.o_rdwr);
        OpenOptions::new()
            .read(!has(c.o_wronly))
            .write(write)
            .append(has(c.o_append))
            .create(has(c.o_creat))
            .create_new(has(c.o_creat) && has(c.o_excl))
            .truncate(has(c.o_trunc))
            .directory(has(c.o_directory))
    }
}

fn descriptor(fd: i32) -> FsResult<FileHandle> {
    FileHandle::try_from(fd).map_err(|_| FsError::from(bad_handle()))
}
