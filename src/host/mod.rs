//! Toolchain Module Host
//!
//! This module provides the infrastructure for loading the toolchain's
//! WebAssembly artifact and running it under its host runtime inside a
//! background worker.
//!
//! # Host ABI
//!
//! ## Overview
//!
//! The artifact is built for a JS host runtime (the Go `js/wasm` runtime
//! script, loaded into the worker before this crate starts). That runtime
//! does no I/O of its own: it forwards every file operation to a Node-style
//! `fs` object found in global scope. This crate supplies that object.
//!
//! ## Required Exports
//!
//! | Export | Type     | Description                        |
//! |--------|----------|------------------------------------|
//! | `mem`  | Memory   | Linear memory shared with the host |
//! | `run`  | Function | Program entry, driven by the host  |
//!
//! The list is configurable; the loader rejects artifacts missing any of
//! them before compiling.
//!
//! ## The `fs` Object
//!
//! Installed on `globalThis.fs` before the host runtime is constructed,
//! because the runtime captures it while it initializes. Methods follow
//! Node's callback convention, the callback's first argument being the
//! error (or null):
//!
//! ```text
//! constants                          { O_WRONLY, O_RDWR, O_CREAT, O_TRUNC,
//!                                      O_APPEND, O_EXCL, O_DIRECTORY }
//! writeSync(fd, buf) -> n            synchronous, whole buffer
//! write(fd, buf, off, len, pos, cb)  cb(err, n)
//! open(path, flags, mode, cb)        cb(err, fd)
//! read(fd, buf, off, len, pos, cb)   cb(err, n)
//! close(fd, cb)
//! fstat(fd, cb) / stat(path, cb) / lstat(path, cb)   cb(err, stats)
//! mkdir(path, perm, cb)
//! readdir(path, cb)                  cb(err, names)
//! unlink / rmdir / rename / link / symlink / readlink
//! chmod / fchmod / chown / fchown / lchown / utimes
//! fsync / ftruncate / truncate
//! ```
//!
//! `pos` null means "at the descriptor's offset"; a number reads or writes
//! there without moving it. Errors carry a Node errno string in `err.code`
//! (`ENOENT`, `EEXIST`, `ENOTDIR`, `EISDIR`, `ENOTEMPTY`, `EBADF`, `EINVAL`,
//! `EACCES`, `ENOSYS`, `EIO`).
//!
//! A provider that cannot open arbitrary paths publishes `-1` for every
//! constant, which the host runtime treats as "no real filesystem".
//!
//! ## Stats
//!
//! ```text
//! dev ino mode nlink uid gid rdev size blksize blocks
//! atimeMs mtimeMs ctimeMs isDirectory()
//! ```
//!
//! `mode` carries the file type bits (`S_IFDIR`, `S_IFREG`, `S_IFLNK`)
//! above the permission bits.
//!
//! ## Program Launch
//!
//! Each launch builds a fresh host runtime, sets `argv` to
//! `[program_name, ...args]` and an `exit(code)` hook, instantiates the
//! module against the runtime's import object and starts it.
//!
//! ## Resident Handshake
//!
//! A resident module stays running after boot and signals through two
//! globals:
//!
//! ```text
//! globalThis.<ready_flag>  = true                 set once, never cleared
//! globalThis.<entry_point> = ({files, args}) =>   {exitCode, stdout, files}
//! ```
//!
//! `files` in the input maps absolute paths to content; in the output it
//! maps paths to content, or null for deleted paths.

pub mod abi;
pub mod engine;
pub mod handshake;
pub mod lifecycle;
pub mod loader;
pub mod shim;

#[cfg(test)]
mod tests;

pub use abi::{Errno, FsConstants, keys};
pub use engine::{Engine, ExitHook, ExitStatus, Launch};
pub use handshake::{EntryPoint, Handshake, ResidentInput, ResidentOutput};
pub use lifecycle::{
    AnyRuntime, CompileJob, CompileRuntime, OneShotRuntime, Phase, RawRun, ResidentRuntime,
};
pub use loader::{ArtifactSource, ModuleLoader, ModuleValidator};
pub use shim::{FsError, FsResult, FsShim, SharedFs, Stats};
