//! Embedding interface (spec.md §6 "Embedding interface"). The host core
//! never talks to a real OS filesystem or a real clock/RNG directly — it is
//! handed trait objects by the editor-integrated runtime that embeds it,
//! exactly as spec.md's Non-goals exclude "executing the guest module
//! itself" and scope the VFS to whatever device drivers are mounted over
//! these seams.

use crate::errno::Result;
use crate::types::{Filesize, Filetype, Timestamp};
use std::io;

/// Metadata the embedding's `stat` call returns, independent of any WASI
/// wire format.
#[derive(Debug, Clone)]
pub struct HostMetadata {
    pub file_type: Filetype,
    pub size: Filesize,
    pub atim: Timestamp,
    pub mtim: Timestamp,
    pub ctim: Timestamp,
}

#[derive(Debug, Clone)]
pub struct HostDirEntry {
    pub name: String,
    pub file_type: Filetype,
}

/// The host filesystem abstraction the read-write passthrough driver
/// (spec.md §4.4) delegates to: "a host filesystem abstraction with URI
/// joining and `readFile`/`writeFile`/`stat`/`readDirectory`/
/// `createDirectory`/`delete`/`rename`". Paths passed to this trait are
/// already joined/normalized by the driver; implementations need not do
/// their own `..`-walking.
pub trait HostFileSystem: Send + Sync {
    fn read_file(&self, path: &str) -> io::Result<Vec<u8>>;
    fn write_file(&self, path: &str, contents: &[u8], append: bool) -> io::Result<()>;
    fn stat(&self, path: &str) -> io::Result<HostMetadata>;
    fn read_directory(&self, path: &str) -> io::Result<Vec<HostDirEntry>>;
    fn create_directory(&self, path: &str) -> io::Result<()>;
    fn delete(&self, path: &str, recursive: bool) -> io::Result<()>;
    fn rename(&self, from: &str, to: &str) -> io::Result<()>;
    fn set_times(&self, path: &str, atim: Option<Timestamp>, mtim: Option<Timestamp>) -> io::Result<()>;
    fn truncate(&self, path: &str, size: Filesize) -> io::Result<()>;
}

/// Backing store for the read-only snapshot driver's lazily-fetched file
/// content (spec.md §3 "File/Directory node (VFS snapshot driver)" — "an
/// optional cached byte blob populated on first read").
pub trait AssetSource: Send + Sync {
    fn read_asset(&self, path: &str) -> io::Result<Vec<u8>>;
}

/// An in-process `AssetSource`/`HostFileSystem` pair backed by a
/// `HashMap`, useful for tests and for embeddings that just want to bundle
/// a fixed set of files without standing up a real filesystem.
pub struct InMemoryAssets {
    files: std::collections::HashMap<String, Vec<u8>>,
}

impl InMemoryAssets {
    pub fn new(files: std::collections::HashMap<String, Vec<u8>>) -> Self {
        Self { files }
    }
}

impl AssetSource for InMemoryAssets {
    fn read_asset(&self, path: &str) -> io::Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }
}

/// A synchronous notification primitive used for cross-context dispatch
/// (spec.md §4.5 "Cross-context execution"): the guest-side dispatcher
/// blocks on `wait()` until the host side calls `notify()` once the driver
/// call staged into the shared buffer has completed.
pub trait Notifier: Send + Sync {
    fn notify(&self);
    fn wait(&self);
}

/// Default same-process notifier backed by a condvar; adequate when guest
/// and host run as different threads sharing one address space rather than
/// genuinely separate workers.
pub struct CondvarNotifier {
    inner: parking_lot::Mutex<bool>,
    cond: parking_lot::Condvar,
}

impl Default for CondvarNotifier {
    fn default() -> Self {
        Self {
            inner: parking_lot::Mutex::new(false),
            cond: parking_lot::Condvar::new(),
        }
    }
}

impl Notifier for CondvarNotifier {
    fn notify(&self) {
        let mut ready = self.inner.lock();
        *ready = true;
        self.cond.notify_one();
    }

    fn wait(&self) {
        let mut ready = self.inner.lock();
        while !*ready {
            self.cond.wait(&mut ready);
        }
        *ready = false;
    }
}

/// Translates an embedding I/O failure into the nearest WASI errno, the
/// generalized form of the teacher's `From<io::Error> for Errno` (which
/// only had to handle `libc` codes; this handles the embedding's own
/// `io::Error` shape, which may not carry a raw OS error at all).
pub fn translate_io_error(err: &io::Error) -> crate::Errno {
    crate::errno::from_io_error(err)
}

pub(crate) fn ok_or_translate<T>(r: io::Result<T>) -> Result<T> {
    r.map_err(|e| translate_io_error(&e))
}
