//! The filesystem effect used by the job directory builder.
//!
//! Every mutation the builder performs goes through [`FileSystem`], so a build can
//! run against the real disk ([`LocalFileSystem`]) or be captured in memory
//! ([`MemoryFileSystem`]) for dry runs and tests.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Creates or truncates `path` with the given contents.
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Makes `link` refer to the existing file or directory `target`.
    fn link(&self, target: &Path, link: &Path) -> io::Result<()>;
}

/// How [`LocalFileSystem`] materialises links to shared input files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkMode {
    #[default]
    Symlink,
    Copy,
}

#[derive(Debug, Clone, Default)]
pub struct LocalFileSystem {
    link_mode: LinkMode,
}

impl LocalFileSystem {
    pub fn new(link_mode: LinkMode) -> Self {
        Self { link_mode }
    }
}

impl FileSystem for LocalFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.symlink_metadata().is_ok()
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        fs::write(path, contents)
    }

    fn link(&self, target: &Path, link: &Path) -> io::Result<()> {
        match self.link_mode {
            #[cfg(unix)]
            LinkMode::Symlink => std::os::unix::fs::symlink(target, link),
            #[cfg(not(unix))]
            LinkMode::Symlink => copy_recursively(target, link),
            LinkMode::Copy => copy_recursively(target, link),
        }
    }
}

fn copy_recursively(source: &Path, dest: &Path) -> io::Result<()> {
    if source.is_dir() {
        fs::create_dir_all(dest)?;
        for entry in fs::read_dir(source)? {
            let entry = entry?;
            copy_recursively(&entry.path(), &dest.join(entry.file_name()))?;
        }
        Ok(())
    } else {
        fs::copy(source, dest).map(|_| ())
    }
}

/// A node of the in-memory tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Dir,
    File(Vec<u8>),
    Link(PathBuf),
}

/// Captures every mutation in memory instead of touching the disk.
///
/// Writes and links require their parent directory to exist, mirroring the
/// behaviour of the real filesystem.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    entries: Mutex<BTreeMap<PathBuf, Entry>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<PathBuf, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn entry(&self, path: &Path) -> Option<Entry> {
        self.lock().get(path).cloned()
    }

    pub fn read(&self, path: &Path) -> Option<Vec<u8>> {
        match self.entry(path)? {
            Entry::File(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// A sorted snapshot of every path and its entry.
    pub fn snapshot(&self) -> BTreeMap<PathBuf, Entry> {
        self.lock().clone()
    }

    /// Renders the captured tree, one path per line, for dry-run output.
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        for (path, entry) in self.lock().iter() {
            let line = match entry {
                Entry::Dir => format!("{}/\n", path.display()),
                Entry::File(bytes) => format!("{} ({} bytes)\n", path.display(), bytes.len()),
                Entry::Link(target) => format!("{} -> {}\n", path.display(), target.display()),
            };
            out.push_str(&line);
        }
        out
    }

    fn ensure_parent(entries: &BTreeMap<PathBuf, Entry>, path: &Path) -> io::Result<()> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => match entries.get(parent) {
                Some(Entry::Dir) => Ok(()),
                _ => Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("parent directory {} does not exist", parent.display()),
                )),
            },
            _ => Ok(()),
        }
    }

    fn ensure_vacant(entries: &BTreeMap<PathBuf, Entry>, path: &Path) -> io::Result<()> {
        if entries.contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            ));
        }
        Ok(())
    }
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.lock().contains_key(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut entries = self.lock();
        if !matches!(entries.get(path), Some(Entry::Dir)) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a directory", path.display()),
            ));
        }
        entries.retain(|p, _| !p.starts_with(path));
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut entries = self.lock();
        for ancestor in path.ancestors().filter(|a| !a.as_os_str().is_empty()) {
            match entries.get(ancestor) {
                Some(Entry::Dir) | None => {}
                Some(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("{} exists and is not a directory", ancestor.display()),
                    ));
                }
            }
        }
        for ancestor in path.ancestors().filter(|a| !a.as_os_str().is_empty()) {
            entries.entry(ancestor.to_path_buf()).or_insert(Entry::Dir);
        }
        Ok(())
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut entries = self.lock();
        Self::ensure_parent(&entries, path)?;
        if matches!(entries.get(path), Some(Entry::Dir)) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} is a directory", path.display()),
            ));
        }
        entries.insert(path.to_path_buf(), Entry::File(contents.to_vec()));
        Ok(())
    }

    fn link(&self, target: &Path, link: &Path) -> io::Result<()> {
        let mut entries = self.lock();
        Self::ensure_parent(&entries, link)?;
        Self::ensure_vacant(&entries, link)?;
        entries.insert(link.to_path_buf(), Entry::Link(target.to_path_buf()));
        Ok(())
    }
}
