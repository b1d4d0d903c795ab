//! The root/mount-composing driver (spec.md §4.4 "Root driver"): holds a
//! mount table of path prefix → driver and dispatches `path_*` calls to
//! whichever mounted driver owns the longest matching prefix, stripping
//! that prefix before delegating. Cross-device `path_rename`/`path_link`
//! (a source and destination resolving through different mounts) return
//! `Errno::Xdev`, matching the real-OS convention the teacher's own
//! virtual-fs layer follows for cross-filesystem operations.

use crate::driver::{Driver, DriverRights};
use crate::errno::{Errno, Result};
use crate::types::{Dircookie, Dirent, Filestat, Filetype, Fstflags, Oflags, RightsExt, Timestamp};
use std::any::Any;
use std::io;
use std::sync::Arc;

struct Mount {
    prefix: String,
    driver: Arc<dyn Driver>,
}

/// Composes mounted drivers by longest-prefix match, per spec.md §4.4
/// "Root/mount driver: mounts are matched by longest path prefix; a path
/// under no mount resolves against the innermost enclosing mount or fails
/// with `enoent` if none is mounted at all."
pub struct RootDriver {
    mounts: Vec<Mount>,
}

impl RootDriver {
    pub fn new() -> Self {
        Self { mounts: Vec::new() }
    }

    pub fn mount(&mut self, prefix: impl Into<String>, driver: Arc<dyn Driver>) {
        let prefix = prefix.into();
        let prefix = prefix.trim_matches('/').to_string();
        self.mounts.push(Mount { prefix, driver });
        self.mounts
            .sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
    }

    /// Resolves `path` against the mount table. `path` is treated the same
    /// way every other driver in this crate treats the path it's handed by
    /// the dispatcher: relative to whatever root it's being resolved
    /// against (no meaning is attached to a leading `/`, it's simply
    /// stripped), never pre-qualified with a mount's own prefix.
    fn resolve(&self, path: &str) -> Result<(&Arc<dyn Driver>, String)> {
        let path = path.trim_matches('/');
        for mount in &self.mounts {
            if mount.prefix.is_empty() {
                return Ok((&mount.driver, path.to_string()));
            }
            if path == mount.prefix {
                return Ok((&mount.driver, String::new()));
            }
            if let Some(rel) = path.strip_prefix(&mount.prefix) {
                if let Some(rel) = rel.strip_prefix('/') {
                    return Ok((&mount.driver, rel.to_string()));
                }
            }
        }
        Err(Errno::Noent)
    }
}

impl Default for RootDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for RootDriver {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn try_clone(&self) -> io::Result<Box<dyn Driver>> {
        Ok(Box::new(Self {
            mounts: self
                .mounts
                .iter()
                .map(|m| Mount {
                    prefix: m.prefix.clone(),
                    driver: Arc::clone(&m.driver),
                })
                .collect(),
        }))
    }

    fn file_type(&self) -> Filetype {
        Filetype::Directory
    }

    fn rights(&self) -> DriverRights {
        DriverRights::new(crate::types::Rights::directory_base(), crate::types::Rights::directory_inheriting())
    }

    fn path_open(
        &self,
        path: &str,
        oflags: Oflags,
        fd_flags: crate::types::Fdflags,
        read: bool,
        write: bool,
    ) -> Result<Box<dyn Driver>> {
        let (driver, rel) = self.resolve(path)?;
        driver.path_open(&rel, oflags, fd_flags, read, write)
    }

    fn path_create_directory(&self, path: &str) -> Result<()> {
        let (driver, rel) = self.resolve(path)?;
        driver.path_create_directory(&rel)
    }

    fn path_remove_directory(&self, path: &str) -> Result<()> {
        let (driver, rel) = self.resolve(path)?;
        driver.path_remove_directory(&rel)
    }

    fn path_unlink_file(&self, path: &str) -> Result<()> {
        let (driver, rel) = self.resolve(path)?;
        driver.path_unlink_file(&rel)
    }

    fn path_rename(&self, old_path: &str, new_dir: &dyn Driver, new_path: &str) -> Result<()> {
        let (old_driver, old_rel) = self.resolve(old_path)?;
        // Renaming within the same mount is the only case this root can
        // honor directly; renaming into a different top-level mount is a
        // cross-device move from the guest's point of view.
        if let Some(root) = new_dir.as_any().downcast_ref::<RootDriver>() {
            let (new_driver, new_rel) = root.resolve(new_path)?;
            if !Arc::ptr_eq(old_driver, new_driver) {
                return Err(Errno::Xdev);
            }
            return old_driver.path_rename(&old_rel, new_driver.as_ref(), &new_rel);
        }
        Err(Errno::Xdev)
    }

    fn path_link(&self, old_path: &str, new_dir: &dyn Driver, new_path: &str) -> Result<()> {
        let (old_driver, old_rel) = self.resolve(old_path)?;
        if let Some(root) = new_dir.as_any().downcast_ref::<RootDriver>() {
            let (new_driver, new_rel) = root.resolve(new_path)?;
            if !Arc::ptr_eq(old_driver, new_driver) {
                return Err(Errno::Xdev);
            }
            return old_driver.path_link(&old_rel, new_driver.as_ref(), &new_rel);
        }
        Err(Errno::Xdev)
    }

    fn path_symlink(&self, old_path: &str, new_path: &str) -> Result<()> {
        let (driver, rel) = self.resolve(new_path)?;
        driver.path_symlink(old_path, &rel)
    }

    fn path_readlink(&self, path: &str) -> Result<String> {
        let (driver, rel) = self.resolve(path)?;
        driver.path_readlink(&rel)
    }

    fn path_filestat_get(&self, path: &str, follow: bool) -> Result<Filestat> {
        let (driver, rel) = self.resolve(path)?;
        driver.path_filestat_get(&rel, follow)
    }

    fn path_filestat_set_times(
        &self,
        path: &str,
        atim: Timestamp,
        mtim: Timestamp,
        fst_flags: Fstflags,
        follow: bool,
    ) -> Result<()> {
        let (driver, rel) = self.resolve(path)?;
        driver.path_filestat_set_times(&rel, atim, mtim, fst_flags, follow)
    }

    fn fd_readdir<'a>(
        &'a self,
        _cookie: Dircookie,
    ) -> Result<Box<dyn Iterator<Item = Result<(Dirent, String)>> + 'a>> {
        // Listing the synthetic root directory itself (its entries are the
        // mount points) isn't needed by any guest-visible path in this
        // spec's preopen model, where guests always open a specific mount.
        Err(Errno::Nosys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::InMemoryAssets;
    use crate::vfs::node::Arena;
    use crate::vfs::readonly::ReadOnlySnapshotDriver;
    use std::collections::HashMap;

    #[test]
    fn resolves_by_longest_prefix() {
        let arena = Arena::new();
        arena.populate(&[("hello.txt", 2)]);
        let mut files = HashMap::new();
        files.insert("hello.txt".to_string(), b"hi".to_vec());
        let assets: Arc<dyn crate::embed::AssetSource> = Arc::new(InMemoryAssets::new(files));
        let driver: Arc<dyn Driver> = ReadOnlySnapshotDriver::new(arena.clone(), assets, arena.root());

        let mut root = RootDriver::new();
        root.mount("/project", driver);

        let stat = root.path_filestat_get("/project/hello.txt", true).unwrap();
        assert_eq!(stat.filetype, Filetype::RegularFile);
    }

    #[test]
    fn unmounted_path_is_noent() {
        let root = RootDriver::new();
        assert_eq!(
            root.path_filestat_get("/nowhere", true).unwrap_err(),
            Errno::Noent
        );
    }
}
