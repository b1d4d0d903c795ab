//! Shared scaffolding for the black-box scenario tests (spec.md §8,
//! SPEC_FULL.md §D). Every scenario drives a `WasiCtx` purely through the
//! `dispatch` entry points against a fake guest linear memory, never
//! reaching into driver internals, per Testable Property 1.

use std::cell::Cell;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use wasi_host_core::{HostDirEntry, HostFileSystem, HostMetadata};

/// A flat byte buffer standing in for a guest instance's linear memory.
pub struct GuestBuffer {
    cells: Vec<Cell<u8>>,
}

impl GuestBuffer {
    pub fn new(size: usize) -> Self {
        Self {
            cells: vec![Cell::new(0); size],
        }
    }

    pub fn memory(&self) -> wasi_host_core::GuestMemory<'_> {
        wasi_host_core::GuestMemory::new(&self.cells)
    }

    pub fn read_bytes(&self, ptr: u32, len: u32) -> Vec<u8> {
        self.memory().read_bytes(ptr, len).unwrap()
    }

    pub fn read_cstring(&self, ptr: u32) -> String {
        let mut out = Vec::new();
        let mut p = ptr;
        loop {
            let b = self.memory().read_u8(p).unwrap();
            if b == 0 {
                break;
            }
            out.push(b);
            p += 1;
        }
        String::from_utf8(out).unwrap()
    }
}

/// A `HostFileSystem` backed by a real temporary directory on disk, per
/// SPEC_FULL.md §D ("`tempfile` backs tests of the read-write passthrough
/// driver that need a real filesystem"). Guest-relative paths (already
/// joined/normalized by the driver) are resolved under the tempdir root.
pub struct TempFs {
    dir: tempfile::TempDir,
    // Guards against two test threads racing `set_times`/`truncate` on the
    // same path; real filesystems serialize this themselves but our
    // in-process fake doesn't need to model that subtlety beyond avoiding
    // flakiness.
    lock: Mutex<()>,
}

impl TempFs {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            lock: Mutex::new(()),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.dir.path().join(path.trim_start_matches('/'))
    }

    pub fn dir_path(&self) -> &Path {
        self.dir.path()
    }
}

impl HostFileSystem for TempFs {
    fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(path))
    }

    fn write_file(&self, path: &str, contents: &[u8], append: bool) -> io::Result<()> {
        let _guard = self.lock.lock().unwrap();
        use std::io::Write;
        let full = self.resolve(path);
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(full)?;
        file.write_all(contents)
    }

    fn stat(&self, path: &str) -> io::Result<HostMetadata> {
        let meta = std::fs::metadata(self.resolve(path))?;
        Ok(HostMetadata {
            file_type: meta.file_type().into(),
            size: meta.len(),
            atim: 0,
            mtim: 0,
            ctim: 0,
        })
    }

    fn read_directory(&self, path: &str) -> io::Result<Vec<HostDirEntry>> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(self.resolve(path))? {
            let entry = entry?;
            out.push(HostDirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                file_type: entry.file_type()?.into(),
            });
        }
        Ok(out)
    }

    fn create_directory(&self, path: &str) -> io::Result<()> {
        std::fs::create_dir_all(self.resolve(path))
    }

    fn delete(&self, path: &str, recursive: bool) -> io::Result<()> {
        let full = self.resolve(path);
        if recursive {
            std::fs::remove_dir_all(full)
        } else if full.is_dir() {
            std::fs::remove_dir(full)
        } else {
            std::fs::remove_file(full)
        }
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        std::fs::rename(self.resolve(from), self.resolve(to))
    }

    fn set_times(&self, _path: &str, _atim: Option<u64>, _mtim: Option<u64>) -> io::Result<()> {
        Ok(())
    }

    fn truncate(&self, path: &str, size: u64) -> io::Result<()> {
        let _guard = self.lock.lock().unwrap();
        let file = std::fs::OpenOptions::new().write(true).open(self.resolve(path))?;
        file.set_len(size)
    }
}

/// Seeds `dir/name` with `contents` before the driver is mounted over it.
pub fn seed_file(dir: &Path, name: &str, contents: &[u8]) {
    std::fs::write(dir.join(name), contents).unwrap();
}

/// Builds an `AssetSource` + manifest pair from a flat name→bytes map, for
/// the read-only snapshot driver scenarios (S2, S7).
pub fn in_memory_assets(
    files: &[(&str, &[u8])],
) -> (
    std::sync::Arc<dyn wasi_host_core::AssetSource>,
    Vec<(String, u64)>,
) {
    let mut map = HashMap::new();
    let mut manifest = Vec::new();
    for (name, contents) in files {
        map.insert(name.to_string(), contents.to_vec());
        manifest.push((name.to_string(), contents.len() as u64));
    }
    (
        std::sync::Arc::new(wasi_host_core::InMemoryAssets::new(map)),
        manifest,
    )
}
