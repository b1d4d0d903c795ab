//! The device-driver capability set (spec.md §4.4). Every open file
//! descriptor's driver-local handle implements this trait; a concrete
//! driver variant (read-only snapshot, read-write passthrough, root/mount,
//! character/stdio) implements only the operations it supports and
//! inherits `nosys` for the rest, matching spec.md's "prefer tagged
//! variants over deep hierarchies" design note (§9).

use crate::errno::{Errno, Result};
use crate::types::{
    Advice, Dircookie, Dirent, Fdflags, Filesize, Filestat, Fstflags, Oflags, Rights, Timestamp,
};
use std::any::Any;
use std::io;

/// Rights a driver-local handle currently holds, mirroring the fd table
/// entry's own rights but queryable from the handle itself (useful for
/// `is_tty`-style introspection the way the teacher's `Handle::is_tty`
/// does).
#[derive(Debug, Copy, Clone)]
pub struct DriverRights {
    pub base: Rights,
    pub inheriting: Rights,
}

impl DriverRights {
    pub fn new(base: Rights, inheriting: Rights) -> Self {
        Self { base, inheriting }
    }

    pub fn empty() -> Self {
        Self {
            base: Rights::empty(),
            inheriting: Rights::empty(),
        }
    }
}

/// A driver-local open handle: a VFS node reference, an embedding-backed
/// file/directory, or a stream endpoint. Fd-class operations and path-class
/// operations (resolved relative to an open directory handle) share one
/// trait, as spec.md §4.4 describes them as a single "common surface".
pub trait Driver: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn try_clone(&self) -> io::Result<Box<dyn Driver>>;
    fn file_type(&self) -> crate::types::Filetype;
    fn rights(&self) -> DriverRights {
        DriverRights::empty()
    }
    fn set_rights(&self, _rights: DriverRights) {}

    fn is_directory(&self) -> bool {
        self.file_type() == crate::types::Filetype::Directory
    }

    // --- fd-class operations ------------------------------------------
    fn fd_close(&self) -> Result<()> {
        Ok(())
    }
    fn fd_advise(&self, _advice: Advice, _offset: Filesize, _len: Filesize) -> Result<()> {
        Err(Errno::Nosys)
    }
    fn fd_allocate(&self, _offset: Filesize, _len: Filesize) -> Result<()> {
        Err(Errno::Nosys)
    }
    fn fd_datasync(&self) -> Result<()> {
        Err(Errno::Nosys)
    }
    fn fd_sync(&self) -> Result<()> {
        Err(Errno::Nosys)
    }
    fn fd_fdstat_flags(&self) -> Result<Fdflags> {
        Ok(Fdflags::empty())
    }
    fn fd_fdstat_set_flags(&self, _flags: Fdflags) -> Result<()> {
        Err(Errno::Nosys)
    }
    fn fd_filestat_get(&self) -> Result<Filestat> {
        Err(Errno::Nosys)
    }
    fn fd_filestat_set_size(&self, _size: Filesize) -> Result<()> {
        Err(Errno::Nosys)
    }
    fn fd_filestat_set_times(
        &self,
        _atim: Timestamp,
        _mtim: Timestamp,
        _fst_flags: Fstflags,
    ) -> Result<()> {
        Err(Errno::Nosys)
    }
    fn fd_read(&self, _bufs: &mut [&mut [u8]]) -> Result<usize> {
        Err(Errno::Nosys)
    }
    fn fd_pread(&self, _bufs: &mut [&mut [u8]], _offset: Filesize) -> Result<usize> {
        Err(Errno::Nosys)
    }
    fn fd_write(&self, _bufs: &[&[u8]]) -> Result<usize> {
        Err(Errno::Nosys)
    }
    fn fd_pwrite(&self, _bufs: &[&[u8]], _offset: Filesize) -> Result<usize> {
        Err(Errno::Nosys)
    }
    fn fd_seek(&self, _offset: i64, _whence: crate::types::Whence) -> Result<Filesize> {
        Err(Errno::Nosys)
    }
    fn fd_tell(&self) -> Result<Filesize> {
        Err(Errno::Nosys)
    }
    fn fd_readdir<'a>(
        &'a self,
        _cookie: Dircookie,
    ) -> Result<Box<dyn Iterator<Item = Result<(Dirent, String)>> + 'a>> {
        Err(Errno::Nosys)
    }
    fn fd_bytes_available(&self) -> Result<Filesize> {
        Err(Errno::Nosys)
    }

    // --- path-class operations (self must be a directory handle) ------
    fn path_open(
        &self,
        _path: &str,
        _oflags: Oflags,
        _fd_flags: Fdflags,
        _read: bool,
        _write: bool,
    ) -> Result<Box<dyn Driver>> {
        Err(Errno::Nosys)
    }
    fn path_create_directory(&self, _path: &str) -> Result<()> {
        Err(Errno::Nosys)
    }
    fn path_remove_directory(&self, _path: &str) -> Result<()> {
        Err(Errno::Nosys)
    }
    fn path_unlink_file(&self, _path: &str) -> Result<()> {
        Err(Errno::Nosys)
    }
    fn path_rename(&self, _old_path: &str, _new_dir: &dyn Driver, _new_path: &str) -> Result<()> {
        Err(Errno::Nosys)
    }
    fn path_link(&self, _old_path: &str, _new_dir: &dyn Driver, _new_path: &str) -> Result<()> {
        Err(Errno::Nosys)
    }
    fn path_symlink(&self, _old_path: &str, _new_path: &str) -> Result<()> {
        Err(Errno::Notsup)
    }
    fn path_readlink(&self, _path: &str) -> Result<String> {
        Err(Errno::Notsup)
    }
    fn path_filestat_get(&self, _path: &str, _follow: bool) -> Result<Filestat> {
        Err(Errno::Nosys)
    }
    fn path_filestat_set_times(
        &self,
        _path: &str,
        _atim: Timestamp,
        _mtim: Timestamp,
        _fst_flags: Fstflags,
        _follow: bool,
    ) -> Result<()> {
        Err(Errno::Nosys)
    }
}
