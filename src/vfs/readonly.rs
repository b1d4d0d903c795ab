//! The read-only snapshot driver (spec.md §4.4 "Read-only snapshot driver"):
//! serves an immutable tree of assets bundled by the embedding, resolved
//! through the arena in [`crate::vfs::node`]. Every write-class operation
//! fails with [`Errno::Rofs`].

use crate::driver::{Driver, DriverRights};
use crate::embed::AssetSource;
use crate::errno::{Errno, Result};
use crate::types::{
    Dircookie, Dirent, Filestat, Filetype, Fstflags, Oflags, RightsExt, Timestamp, DIRCOOKIE_START,
};
use crate::vfs::node::{Arena, NodeId};
use parking_lot::Mutex;
use std::any::Any;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One open handle into a read-only snapshot tree: either a file cursor or
/// a directory iteration cursor.
pub struct ReadOnlySnapshotDriver {
    arena: Arc<Arena>,
    assets: Arc<dyn AssetSource>,
    node: NodeId,
    offset: AtomicU64,
    rights: Mutex<DriverRights>,
}

impl ReadOnlySnapshotDriver {
    pub fn new(arena: Arc<Arena>, assets: Arc<dyn AssetSource>, node: NodeId) -> Arc<Self> {
        arena.incref(node);
        let file_type = arena.file_type(node);
        Arc::new(Self {
            arena,
            assets,
            node,
            offset: AtomicU64::new(0),
            rights: Mutex::new(DriverRights::new(
                crate::types::Rights::kind_mask(file_type),
                crate::types::Rights::empty(),
            )),
        })
    }

    fn filestat_for(&self, node: NodeId) -> Filestat {
        let (atim, mtim, ctim) = self.arena.times(node);
        Filestat {
            dev: 0,
            ino: self.arena.inode(node),
            filetype: self.arena.file_type(node),
            nlink: 1,
            size: self.arena.size(node),
            atim,
            mtim,
            ctim,
        }
    }
}

impl Drop for ReadOnlySnapshotDriver {
    fn drop(&mut self) {
        self.arena.decref(self.node);
    }
}

impl Driver for ReadOnlySnapshotDriver {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn try_clone(&self) -> io::Result<Box<dyn Driver>> {
        self.arena.incref(self.node);
        Ok(Box::new(Self {
            arena: Arc::clone(&self.arena),
            assets: Arc::clone(&self.assets),
            node: self.node,
            offset: AtomicU64::new(self.offset.load(Ordering::Relaxed)),
            rights: Mutex::new(*self.rights.lock()),
        }))
    }

    fn file_type(&self) -> Filetype {
        self.arena.file_type(self.node)
    }

    fn rights(&self) -> DriverRights {
        *self.rights.lock()
    }

    fn set_rights(&self, rights: DriverRights) {
        *self.rights.lock() = rights;
    }

    fn fd_filestat_get(&self) -> Result<Filestat> {
        self.arena.touch_atim(self.node);
        Ok(self.filestat_for(self.node))
    }

    fn fd_filestat_set_size(&self, _size: crate::types::Filesize) -> Result<()> {
        Err(Errno::Rofs)
    }

    fn fd_filestat_set_times(
        &self,
        _atim: Timestamp,
        _mtim: Timestamp,
        _fst_flags: Fstflags,
    ) -> Result<()> {
        Err(Errno::Rofs)
    }

    fn fd_read(&self, bufs: &mut [&mut [u8]]) -> Result<usize> {
        let mut total = 0;
        let mut offset = self.offset.load(Ordering::Relaxed);
        for buf in bufs.iter_mut() {
            let n = self.arena.pread(self.node, &*self.assets, buf, offset)?;
            offset += n as u64;
            total += n;
            if n < buf.len() {
                break;
            }
        }
        self.offset.store(offset, Ordering::Relaxed);
        self.arena.touch_atim(self.node);
        Ok(total)
    }

    fn fd_pread(&self, bufs: &mut [&mut [u8]], offset: crate::types::Filesize) -> Result<usize> {
        let mut total = 0;
        let mut offset = offset;
        for buf in bufs.iter_mut() {
            let n = self.arena.pread(self.node, &*self.assets, buf, offset)?;
            offset += n as u64;
            total += n;
            if n < buf.len() {
                break;
            }
        }
        self.arena.touch_atim(self.node);
        Ok(total)
    }

    fn fd_write(&self, _bufs: &[&[u8]]) -> Result<usize> {
        Err(Errno::Rofs)
    }

    fn fd_pwrite(&self, _bufs: &[&[u8]], _offset: crate::types::Filesize) -> Result<usize> {
        Err(Errno::Rofs)
    }

    fn fd_seek(&self, offset: i64, whence: crate::types::Whence) -> Result<crate::types::Filesize> {
        let size = self.arena.size(self.node) as i64;
        let cur = self.offset.load(Ordering::Relaxed) as i64;
        let base = match whence {
            crate::types::Whence::Set => 0,
            crate::types::Whence::Cur => cur,
            crate::types::Whence::End => size,
        };
        let new_offset = base
            .checked_add(offset)
            .filter(|n| *n >= 0)
            .ok_or(Errno::Inval)?;
        self.offset.store(new_offset as u64, Ordering::Relaxed);
        Ok(new_offset as u64)
    }

    fn fd_tell(&self) -> Result<crate::types::Filesize> {
        Ok(self.offset.load(Ordering::Relaxed))
    }

    fn fd_readdir<'a>(
        &'a self,
        cookie: Dircookie,
    ) -> Result<Box<dyn Iterator<Item = Result<(Dirent, String)>> + 'a>> {
        if !self.is_directory() {
            return Err(Errno::Notdir);
        }
        let entries = self.arena.children(self.node)?;
        let skip = if cookie == DIRCOOKIE_START {
            0
        } else {
            cookie as usize
        };
        let arena = Arc::clone(&self.arena);
        let iter = entries
            .into_iter()
            .enumerate()
            .skip(skip)
            .map(move |(i, (name, id))| {
                Ok((
                    Dirent {
                        d_next: (i + 1) as Dircookie,
                        d_ino: arena.inode(id),
                        d_namlen: name.len() as u32,
                        d_type: arena.file_type(id),
                    },
                    name,
                ))
            });
        Ok(Box::new(iter))
    }

    fn fd_bytes_available(&self) -> Result<crate::types::Filesize> {
        let size = self.arena.size(self.node);
        let offset = self.offset.load(Ordering::Relaxed);
        Ok(size.saturating_sub(offset))
    }

    fn path_open(
        &self,
        path: &str,
        oflags: Oflags,
        _fd_flags: crate::types::Fdflags,
        _read: bool,
        write: bool,
    ) -> Result<Box<dyn Driver>> {
        if write || oflags.contains(Oflags::CREAT) || oflags.contains(Oflags::TRUNC) {
            return Err(Errno::Rofs);
        }
        let node = self.arena.lookup(self.node, path)?;
        if oflags.contains(Oflags::DIRECTORY) && !self.arena.is_directory(node) {
            return Err(Errno::Notdir);
        }
        let driver = ReadOnlySnapshotDriver::new(Arc::clone(&self.arena), Arc::clone(&self.assets), node);
        Ok(Box::new(ArcDriver(driver)) as Box<dyn Driver>)
    }

    fn path_create_directory(&self, _path: &str) -> Result<()> {
        Err(Errno::Rofs)
    }
    fn path_remove_directory(&self, _path: &str) -> Result<()> {
        Err(Errno::Rofs)
    }
    fn path_unlink_file(&self, _path: &str) -> Result<()> {
        Err(Errno::Rofs)
    }
    fn path_rename(&self, _old_path: &str, _new_dir: &dyn Driver, _new_path: &str) -> Result<()> {
        Err(Errno::Rofs)
    }
    fn path_link(&self, _old_path: &str, _new_dir: &dyn Driver, _new_path: &str) -> Result<()> {
        Err(Errno::Rofs)
    }

    fn path_filestat_get(&self, path: &str, _follow: bool) -> Result<Filestat> {
        let node = self.arena.lookup(self.node, path)?;
        Ok(self.filestat_for(node))
    }

    fn path_filestat_set_times(
        &self,
        _path: &str,
        _atim: Timestamp,
        _mtim: Timestamp,
        _fst_flags: Fstflags,
        _follow: bool,
    ) -> Result<()> {
        Err(Errno::Rofs)
    }
}

/// Shares one `Arc<ReadOnlySnapshotDriver>` behind the `Box<dyn Driver>`
/// signature every other driver variant returns, so `path_open` doesn't
/// need its own return type.
struct ArcDriver(Arc<ReadOnlySnapshotDriver>);

impl Driver for ArcDriver {
    fn as_any(&self) -> &dyn Any {
        self.0.as_any()
    }
    fn try_clone(&self) -> io::Result<Box<dyn Driver>> {
        self.0.try_clone()
    }
    fn file_type(&self) -> Filetype {
        self.0.file_type()
    }
    fn rights(&self) -> DriverRights {
        self.0.rights()
    }
    fn set_rights(&self, rights: DriverRights) {
        self.0.set_rights(rights)
    }
    fn fd_close(&self) -> Result<()> {
        self.0.fd_close()
    }
    fn fd_filestat_get(&self) -> Result<Filestat> {
        self.0.fd_filestat_get()
    }
    fn fd_filestat_set_size(&self, size: crate::types::Filesize) -> Result<()> {
        self.0.fd_filestat_set_size(size)
    }
    fn fd_filestat_set_times(&self, atim: Timestamp, mtim: Timestamp, fst_flags: Fstflags) -> Result<()> {
        self.0.fd_filestat_set_times(atim, mtim, fst_flags)
    }
    fn fd_read(&self, bufs: &mut [&mut [u8]]) -> Result<usize> {
        self.0.fd_read(bufs)
    }
    fn fd_pread(&self, bufs: &mut [&mut [u8]], offset: crate::types::Filesize) -> Result<usize> {
        self.0.fd_pread(bufs, offset)
    }
    fn fd_write(&self, bufs: &[&[u8]]) -> Result<usize> {
        self.0.fd_write(bufs)
    }
    fn fd_pwrite(&self, bufs: &[&[u8]], offset: crate::types::Filesize) -> Result<usize> {
        self.0.fd_pwrite(bufs, offset)
    }
    fn fd_seek(&self, offset: i64, whence: crate::types::Whence) -> Result<crate::types::Filesize> {
        self.0.fd_seek(offset, whence)
    }
    fn fd_tell(&self) -> Result<crate::types::Filesize> {
        self.0.fd_tell()
    }
    fn fd_readdir<'a>(
        &'a self,
        cookie: Dircookie,
    ) -> Result<Box<dyn Iterator<Item = Result<(Dirent, String)>> + 'a>> {
        self.0.fd_readdir(cookie)
    }
    fn fd_bytes_available(&self) -> Result<crate::types::Filesize> {
        self.0.fd_bytes_available()
    }
    fn path_open(
        &self,
        path: &str,
        oflags: Oflags,
        fd_flags: crate::types::Fdflags,
        read: bool,
        write: bool,
    ) -> Result<Box<dyn Driver>> {
        self.0.path_open(path, oflags, fd_flags, read, write)
    }
    fn path_filestat_get(&self, path: &str, follow: bool) -> Result<Filestat> {
        self.0.path_filestat_get(path, follow)
    }
}
