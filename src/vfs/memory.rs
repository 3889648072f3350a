//! In-memory filesystem implementation
//!
//! Simple, fast, ephemeral. One volume per compile: seeded from the request's
//! files, handed to the module, then exported back to a path map.

use super::{
    DirEntry, FileHandle, FileSystem, Metadata, OpenOptions, STDERR_PATH, STDIN_PATH, STDOUT_PATH,
    bad_handle, normalize_path, parent_path, resolve_under,
};
use slab::Slab;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, SeekFrom};

/// Exported subtree: absolute path to content, `None` for an empty
/// directory or a file removed during the run
pub type Snapshot = BTreeMap<String, Option<String>>;

/// Symlink hops before giving up
const MAX_SYMLINK_DEPTH: usize = 40;

/// An open handle and its position
struct OpenFile {
    path: String,
    position: u64,
    readable: bool,
    writable: bool,
    append: bool,
}

/// What a node holds
#[derive(Clone)]
enum NodeKind {
    File(Vec<u8>),
    Directory,
    Symlink(String),
}

/// A stored file, directory or link
#[derive(Clone)]
struct Inode {
    kind: NodeKind,
    ino: u64,
    mode: u16,
    uid: u32,
    gid: u32,
    atime: f64,
    mtime: f64,
    ctime: f64,
}

/// In-memory filesystem
pub struct MemoryFs {
    /// All nodes, keyed by normalized path
    nodes: BTreeMap<String, Inode>,
    /// Open file handles
    handles: Slab<OpenFile>,
    /// Paths removed since they were last written
    removed: BTreeSet<String>,
    next_ino: u64,
    /// Timestamp applied to modifications
    clock: f64,
}

impl MemoryFs {
    /// Create a volume with `/dev/stdin`, `/dev/stdout` and `/dev/stderr`
    /// opened as handles 0, 1 and 2.
    pub fn new() -> Self {
        let mut fs = Self {
            nodes: BTreeMap::new(),
            handles: Slab::new(),
            removed: BTreeSet::new(),
            next_ino: 1,
            clock: 0.0,
        };
        fs.insert_node("/", NodeKind::Directory, 0o755);
        fs.insert_node("/dev", NodeKind::Directory, 0o755);
        for (path, readable) in [(STDIN_PATH, true), (STDOUT_PATH, false), (STDERR_PATH, false)] {
            fs.insert_node(path, NodeKind::File(Vec::new()), 0o666);
            fs.handles.insert(OpenFile {
                path: path.to_string(),
                position: 0,
                readable,
                writable: !readable,
                append: !readable,
            });
        }
        fs
    }

    /// Set the timestamp used for subsequent modifications
    pub fn set_clock(&mut self, now: f64) {
        self.clock = now;
    }

    /// Write every `(path, content)` pair under `root`, creating parent
    /// directories. Relative paths are resolved against `root`.
    pub fn seed<'a, I>(&mut self, files: I, root: &str) -> io::Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        super::create_dir_all(self, root)?;
        for (path, content) in files {
            let path = resolve_under(root, path);
            if let Some(parent) = parent_path(&path) {
                super::create_dir_all(self, &parent)?;
            }
            super::write_string(self, &path, content)?;
        }
        // Seeding is not a deletion history
        self.removed.clear();
        Ok(())
    }

    /// Export the subtree under `root` as absolute path -> content.
    ///
    /// Files map to their text (lossy UTF-8). Empty directories and files
    /// removed during the run map to `None`.
    pub fn snapshot(&self, root: &str) -> Snapshot {
        let root = normalize_path(root);
        let prefix = if root == "/" {
            "/".to_string()
        } else {
            format!("{}/", root)
        };
        let under = |p: &str| p == root || p.starts_with(&prefix);

        let mut out = Snapshot::new();
        let nodes = self
            .nodes
            .range(root.clone()..)
            .take_while(|(p, _)| p.starts_with(&root))
            .filter(|(p, _)| under(p.as_str()));
        for (path, node) in nodes {
            match &node.kind {
                NodeKind::File(data) => {
                    out.insert(path.clone(), Some(String::from_utf8_lossy(data).into_owned()));
                }
                NodeKind::Directory => {
                    if path != &root && !self.has_children(path) {
                        out.insert(path.clone(), None);
                    }
                }
                NodeKind::Symlink(_) => {}
            }
        }
        for path in self.removed.iter().filter(|p| **p != root && under(p.as_str())) {
            if !self.nodes.contains_key(path) {
                out.insert(path.clone(), None);
            }
        }
        out
    }

    /// Read a whole file without going through a handle
    pub fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        let path = self.resolve(path, true)?;
        match self.nodes.get(&path).map(|n| &n.kind) {
            Some(NodeKind::File(data)) => Ok(data.clone()),
            Some(_) => Err(is_a_directory(&path)),
            None => Err(not_found(&path)),
        }
    }

    fn insert_node(&mut self, path: &str, kind: NodeKind, mode: u16) {
        let ino = self.next_ino;
        self.next_ino += 1;
        self.removed.remove(path);
        self.nodes.insert(
            path.to_string(),
            Inode {
                kind,
                ino,
                mode,
                uid: 0,
                gid: 0,
                atime: self.clock,
                mtime: self.clock,
                ctime: self.clock,
            },
        );
    }

    fn has_children(&self, dir: &str) -> bool {
        let prefix = if dir == "/" {
            "/".to_string()
        } else {
            format!("{}/", dir)
        };
        self.nodes
            .range(prefix.clone()..)
            .find(|(p, _)| p.as_str() != dir)
            .is_some_and(|(p, _)| p.starts_with(&prefix))
    }

    /// Ensure parent directory exists
    fn ensure_parent(&self, path: &str) -> io::Result<()> {
        if let Some(parent) = parent_path(path) {
            match self.nodes.get(&parent).map(|n| &n.kind) {
                Some(NodeKind::Directory) => {}
                Some(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::NotADirectory,
                        format!("Not a directory: {}", parent),
                    ));
                }
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("Parent directory not found: {}", parent),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Normalize and, if asked, follow a chain of symlinks at the final
    /// component
    fn resolve(&self, path: &str, follow: bool) -> io::Result<String> {
        let mut path = normalize_path(path);
        if !follow {
            return Ok(path);
        }
        for _ in 0..MAX_SYMLINK_DEPTH {
            match self.nodes.get(&path).map(|n| &n.kind) {
                Some(NodeKind::Symlink(target)) => {
                    let base = parent_path(&path).unwrap_or_else(|| "/".to_string());
                    path = resolve_under(&base, target);
                }
                _ => return Ok(path),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Too many levels of symbolic links: {}", path),
        ))
    }

    fn node_metadata(node: &Inode) -> Metadata {
        let (size, is_dir, is_file, is_symlink) = match &node.kind {
            NodeKind::File(data) => (data.len() as u64, false, true, false),
            NodeKind::Directory => (0, true, false, false),
            NodeKind::Symlink(target) => (target.len() as u64, false, false, true),
        };
        Metadata {
            size,
            is_dir,
            is_file,
            is_symlink,
            ino: node.ino,
            mode: node.mode,
            uid: node.uid,
            gid: node.gid,
            nlink: 1,
            atime: node.atime,
            mtime: node.mtime,
            ctime: node.ctime,
        }
    }

    fn file_mut(&mut self, path: &str) -> io::Result<&mut Inode> {
        match self.nodes.get_mut(path) {
            Some(node) if matches!(node.kind, NodeKind::File(_)) => Ok(node),
            Some(_) => Err(is_a_directory(path)),
            None => Err(not_found(path)),
        }
    }

    fn resize(&mut self, path: &str, len: u64) -> io::Result<()> {
        let now = self.clock;
        let node = self.file_mut(path)?;
        if let NodeKind::File(data) = &mut node.kind {
            data.resize(len as usize, 0);
        }
        node.mtime = now;
        node.ctime = now;
        Ok(())
    }

    fn handle(&self, handle: FileHandle) -> io::Result<&OpenFile> {
        self.handles.get(handle).ok_or_else(bad_handle)
    }
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("No such file or directory: {}", path))
}

fn is_a_directory(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::IsADirectory, format!("Is a directory: {}", path))
}

impl FileSystem for MemoryFs {
    fn open(&mut self, path: &str, options: OpenOptions) -> io::Result<FileHandle> {
        let path = self.resolve(path, true)?;
        let exists = self.nodes.contains_key(&path);

        if exists && options.create_new {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("File exists: {}", path),
            ));
        }

        if !exists {
            if !(options.create || options.create_new) || options.directory {
                return Err(not_found(&path));
            }
            self.ensure_parent(&path)?;
            self.insert_node(&path, NodeKind::File(Vec::new()), 0o644);
        }

        let writable = options.write || options.append;
        match self.nodes.get(&path).map(|n| &n.kind) {
            Some(NodeKind::Directory) if writable => return Err(is_a_directory(&path)),
            Some(NodeKind::Directory) => {}
            Some(_) if options.directory => {
                return Err(io::Error::new(
                    io::ErrorKind::NotADirectory,
                    format!("Not a directory: {}", path),
                ));
            }
            Some(_) => {
                if exists && options.truncate && writable {
                    self.resize(&path, 0)?;
                }
            }
            None => return Err(not_found(&path)),
        }

        Ok(self.handles.insert(OpenFile {
            path,
            position: 0,
            readable: options.read,
            writable,
            append: options.append,
        }))
    }

    fn close(&mut self, handle: FileHandle) -> io::Result<()> {
        if self.handles.contains(handle) {
            self.handles.remove(handle);
            Ok(())
        } else {
            Err(bad_handle())
        }
    }

    fn read(&mut self, handle: FileHandle, buf: &mut [u8]) -> io::Result<usize> {
        let file = self.handle(handle)?;
        if !file.readable {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "File not opened for reading",
            ));
        }
        let path = file.path.clone();
        let position = file.position as usize;

        let data = match self.nodes.get(&path).map(|n| &n.kind) {
            Some(NodeKind::File(data)) => data,
            Some(_) => return Err(is_a_directory(&path)),
            None => return Err(not_found(&path)),
        };

        let available = data.len().saturating_sub(position);
        let to_read = buf.len().min(available);
        if to_read > 0 {
            buf[..to_read].copy_from_slice(&data[position..position + to_read]);
        }

        if let Some(file) = self.handles.get_mut(handle) {
            file.position += to_read as u64;
        }
        Ok(to_read)
    }

    fn write(&mut self, handle: FileHandle, buf: &[u8]) -> io::Result<usize> {
        let file = self.handle(handle)?;
        if !file.writable {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "File not opened for writing",
            ));
        }
        let path = file.path.clone();
        let append = file.append;
        let current = file.position as usize;
        let now = self.clock;

        let node = self.file_mut(&path)?;
        let NodeKind::File(data) = &mut node.kind else {
            return Err(is_a_directory(&path));
        };
        let position = if append { data.len() } else { current };

        // Extend file if necessary
        if position + buf.len() > data.len() {
            data.resize(position + buf.len(), 0);
        }
        data[position..position + buf.len()].copy_from_slice(buf);
        node.mtime = now;
        node.ctime = now;

        if let Some(file) = self.handles.get_mut(handle) {
            file.position = (position + buf.len()) as u64;
        }
        Ok(buf.len())
    }

    fn seek(&mut self, handle: FileHandle, pos: SeekFrom) -> io::Result<u64> {
        let file = self.handle(handle)?;
        let current = file.position;
        let size = match self.nodes.get(&file.path).map(|n| &n.kind) {
            Some(NodeKind::File(data)) => data.len() as u64,
            Some(_) => 0,
            None => return Err(not_found(&file.path)),
        };

        let new_pos = match pos {
            SeekFrom::Start(n) => n,
            SeekFrom::End(n) => size.saturating_add_signed(n),
            SeekFrom::Current(n) => current.saturating_add_signed(n),
        };

        if let Some(file) = self.handles.get_mut(handle) {
            file.position = new_pos;
        }
        Ok(new_pos)
    }

    fn sync(&mut self, handle: FileHandle) -> io::Result<()> {
        self.handle(handle).map(|_| ())
    }

    fn fstat(&self, handle: FileHandle) -> io::Result<Metadata> {
        let file = self.handle(handle)?;
        self.nodes
            .get(&file.path)
            .map(Self::node_metadata)
            .ok_or_else(|| not_found(&file.path))
    }

    fn handle_path(&self, handle: FileHandle) -> io::Result<String> {
        self.handle(handle).map(|f| f.path.clone())
    }

    fn metadata(&self, path: &str) -> io::Result<Metadata> {
        let path = self.resolve(path, true)?;
        self.nodes
            .get(&path)
            .map(Self::node_metadata)
            .ok_or_else(|| not_found(&path))
    }

    fn symlink_metadata(&self, path: &str) -> io::Result<Metadata> {
        let path = normalize_path(path);
        self.nodes
            .get(&path)
            .map(Self::node_metadata)
            .ok_or_else(|| not_found(&path))
    }

    fn create_dir(&mut self, path: &str) -> io::Result<()> {
        let path = normalize_path(path);
        if self.nodes.contains_key(&path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("File exists: {}", path),
            ));
        }
        self.ensure_parent(&path)?;
        self.insert_node(&path, NodeKind::Directory, 0o755);
        Ok(())
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<DirEntry>> {
        let path = self.resolve(path, true)?;
        match self.nodes.get(&path).map(|n| &n.kind) {
            Some(NodeKind::Directory) => {}
            Some(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::NotADirectory,
                    format!("Not a directory: {}", path),
                ));
            }
            None => return Err(not_found(&path)),
        }

        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{}/", path)
        };

        let entries = self
            .nodes
            .range(prefix.clone()..)
            .take_while(|(p, _)| p.starts_with(&prefix))
            .filter_map(|(p, node)| {
                let relative = &p[prefix.len()..];
                // Skip self and anything that is not a direct child
                if relative.is_empty() || relative.contains('/') {
                    return None;
                }
                Some(DirEntry {
                    name: relative.to_string(),
                    is_dir: matches!(node.kind, NodeKind::Directory),
                })
            })
            .collect();

        Ok(entries)
    }

    fn remove_file(&mut self, path: &str) -> io::Result<()> {
        let path = normalize_path(path);
        match self.nodes.get(&path).map(|n| &n.kind) {
            Some(NodeKind::Directory) => Err(is_a_directory(&path)),
            Some(_) => {
                self.nodes.remove(&path);
                self.removed.insert(path);
                Ok(())
            }
            None => Err(not_found(&path)),
        }
    }

    fn remove_dir(&mut self, path: &str) -> io::Result<()> {
        let path = normalize_path(path);
        if path == "/" {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "Cannot remove root directory",
            ));
        }

        match self.nodes.get(&path).map(|n| &n.kind) {
            Some(NodeKind::Directory) => {
                if self.has_children(&path) {
                    return Err(io::Error::new(
                        io::ErrorKind::DirectoryNotEmpty,
                        format!("Directory not empty: {}", path),
                    ));
                }
                self.nodes.remove(&path);
                Ok(())
            }
            Some(_) => Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("Not a directory: {}", path),
            )),
            None => Err(not_found(&path)),
        }
    }

    fn rename(&mut self, from: &str, to: &str) -> io::Result<()> {
        let from = normalize_path(from);
        let to = normalize_path(to);
        if from == to {
            return if self.nodes.contains_key(&from) {
                Ok(())
            } else {
                Err(not_found(&from))
            };
        }
        if !self.nodes.contains_key(&from) {
            return Err(not_found(&from));
        }
        if to.starts_with(&format!("{}/", from)) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Cannot move a directory into itself",
            ));
        }
        self.ensure_parent(&to)?;

        let from_is_dir = self.nodes.get(&from).is_some_and(|n| matches!(n.kind, NodeKind::Directory));
        if let Some(existing) = self.nodes.get(&to) {
            let to_is_dir = matches!(existing.kind, NodeKind::Directory);
            if to_is_dir && !from_is_dir {
                return Err(is_a_directory(&to));
            }
            if from_is_dir && !to_is_dir {
                return Err(io::Error::new(
                    io::ErrorKind::NotADirectory,
                    format!("Not a directory: {}", to),
                ));
            }
            if to_is_dir && self.has_children(&to) {
                return Err(io::Error::new(
                    io::ErrorKind::DirectoryNotEmpty,
                    format!("Directory not empty: {}", to),
                ));
            }
            self.nodes.remove(&to);
        }

        // Move the node and, for directories, everything beneath it
        let prefix = format!("{}/", from);
        let moved: Vec<String> = self
            .nodes
            .range(from.clone()..)
            .take_while(|(p, _)| p.starts_with(&from))
            .filter(|(p, _)| **p == from || p.starts_with(&prefix))
            .map(|(p, _)| p.clone())
            .collect();

        for old in moved {
            if let Some(node) = self.nodes.remove(&old) {
                let new = format!("{}{}", to, &old[from.len()..]);
                self.removed.remove(&new);
                self.nodes.insert(new, node);
                self.removed.insert(old);
            }
        }

        // Keep open handles pointing at the moved nodes
        for (_, file) in self.handles.iter_mut() {
            if file.path == from || file.path.starts_with(&prefix) {
                file.path = format!("{}{}", to, &file.path[from.len()..]);
            }
        }
        Ok(())
    }

    fn set_len(&mut self, handle: FileHandle, len: u64) -> io::Result<()> {
        let file = self.handle(handle)?;
        if !file.writable {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "File not opened for writing",
            ));
        }
        let path = file.path.clone();
        self.resize(&path, len)
    }

    fn truncate(&mut self, path: &str, len: u64) -> io::Result<()> {
        let path = self.resolve(path, true)?;
        self.resize(&path, len)
    }

    fn symlink(&mut self, target: &str, link_path: &str) -> io::Result<()> {
        let link_path = normalize_path(link_path);
        if self.nodes.contains_key(&link_path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("File exists: {}", link_path),
            ));
        }
        self.ensure_parent(&link_path)?;
        self.insert_node(&link_path, NodeKind::Symlink(target.to_string()), 0o777);
        Ok(())
    }

    fn read_link(&self, path: &str) -> io::Result<String> {
        let path = normalize_path(path);
        match self.nodes.get(&path).map(|n| &n.kind) {
            Some(NodeKind::Symlink(target)) => Ok(target.clone()),
            Some(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Not a symbolic link: {}", path),
            )),
            None => Err(not_found(&path)),
        }
    }

    fn link(&mut self, _source: &str, _dest: &str) -> io::Result<()> {
        Err(super::unsupported("link"))
    }

    fn chmod(&mut self, path: &str, mode: u16) -> io::Result<()> {
        let path = self.resolve(path, true)?;
        let now = self.clock;
        let node = self.nodes.get_mut(&path).ok_or_else(|| not_found(&path))?;
        node.mode = mode & 0o7777;
        node.ctime = now;
        Ok(())
    }

    fn chown(&mut self, path: &str, uid: u32, gid: u32) -> io::Result<()> {
        let path = self.resolve(path, true)?;
        let now = self.clock;
        let node = self.nodes.get_mut(&path).ok_or_else(|| not_found(&path))?;
        node.uid = uid;
        node.gid = gid;
        node.ctime = now;
        Ok(())
    }

    fn utimes(&mut self, path: &str, atime: f64, mtime: f64) -> io::Result<()> {
        let path = self.resolve(path, true)?;
        let now = self.clock;
        let node = self.nodes.get_mut(&path).ok_or_else(|| not_found(&path))?;
        node.atime = atime;
        node.mtime = mtime;
        node.ctime = now;
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path, true)
            .map(|p| self.nodes.contains_key(&p))
            .unwrap_or(false)
    }
}
