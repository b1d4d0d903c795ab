//! The read-write passthrough driver (spec.md §4.4 "Read-write passthrough
//! driver"): delegates every operation to the embedding's
//! [`HostFileSystem`], tracking only the open-handle state (path, cursor
//! offset, directory-ness) that the embedding's whole-file
//! `read_file`/`write_file` API doesn't carry for us.

use crate::driver::{Driver, DriverRights};
use crate::embed::{ok_or_translate, HostFileSystem};
use crate::errno::{Errno, Result};
use crate::types::{
    Dircookie, Dirent, Filestat, Filetype, Fstflags, Oflags, RightsExt, Timestamp, DIRCOOKIE_START,
};
use parking_lot::Mutex;
use std::any::Any;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct ReadWritePassthroughDriver {
    fs: Arc<dyn HostFileSystem>,
    path: String,
    is_dir: bool,
    append: bool,
    offset: AtomicU64,
    rights: Mutex<DriverRights>,
}

impl ReadWritePassthroughDriver {
    pub fn new(fs: Arc<dyn HostFileSystem>, path: String, is_dir: bool) -> Arc<Self> {
        let file_type = if is_dir {
            Filetype::Directory
        } else {
            Filetype::RegularFile
        };
        Arc::new(Self {
            fs,
            path,
            is_dir,
            append: false,
            offset: AtomicU64::new(0),
            rights: Mutex::new(DriverRights::new(
                crate::types::Rights::kind_mask(file_type),
                crate::types::Rights::empty(),
            )),
        })
    }

    fn joined(&self, rel: &str) -> String {
        // Normalize `.`/`..` out of the guest-supplied path before handing
        // it to the embedding's filesystem; `join` alone would pass a raw
        // `..` through and let it walk above `self.path`.
        let components = crate::vfs::path::normalize_components(rel);
        crate::vfs::path::join(&self.path, &components.join("/"))
    }
}

impl Driver for ReadWritePassthroughDriver {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn try_clone(&self) -> io::Result<Box<dyn Driver>> {
        Ok(Box::new(Self {
            fs: Arc::clone(&self.fs),
            path: self.path.clone(),
            is_dir: self.is_dir,
            append: self.append,
            offset: AtomicU64::new(self.offset.load(Ordering::Relaxed)),
            rights: Mutex::new(*self.rights.lock()),
        }))
    }

    fn file_type(&self) -> Filetype {
        if self.is_dir {
            Filetype::Directory
        } else {
            Filetype::RegularFile
        }
    }

    fn rights(&self) -> DriverRights {
        *self.rights.lock()
    }

    fn set_rights(&self, rights: DriverRights) {
        *self.rights.lock() = rights;
    }

    fn fd_advise(&self, _advice: crate::types::Advice, _offset: crate::types::Filesize, _len: crate::types::Filesize) -> Result<()> {
        // Advisory only; the embedding has no readahead/caching knob to
        // plumb this to, so it's accepted and ignored (spec.md §4.4).
        Ok(())
    }

    fn fd_allocate(&self, offset: crate::types::Filesize, len: crate::types::Filesize) -> Result<()> {
        let meta = ok_or_translate(self.fs.stat(&self.path))?;
        let needed = offset + len;
        if needed > meta.size {
            ok_or_translate(self.fs.truncate(&self.path, needed))?;
        }
        Ok(())
    }

    fn fd_sync(&self) -> Result<()> {
        Ok(())
    }
    fn fd_datasync(&self) -> Result<()> {
        Ok(())
    }

    fn fd_filestat_get(&self) -> Result<Filestat> {
        let meta = ok_or_translate(self.fs.stat(&self.path))?;
        Ok(Filestat {
            dev: 0,
            ino: 0,
            filetype: meta.file_type,
            nlink: 1,
            size: meta.size,
            atim: meta.atim,
            mtim: meta.mtim,
            ctim: meta.ctim,
        })
    }

    fn fd_filestat_set_size(&self, size: crate::types::Filesize) -> Result<()> {
        ok_or_translate(self.fs.truncate(&self.path, size))
    }

    fn fd_filestat_set_times(
        &self,
        atim: Timestamp,
        mtim: Timestamp,
        fst_flags: Fstflags,
    ) -> Result<()> {
        set_times(&*self.fs, &self.path, atim, mtim, fst_flags)
    }

    fn fd_read(&self, bufs: &mut [&mut [u8]]) -> Result<usize> {
        let contents = ok_or_translate(self.fs.read_file(&self.path))?;
        let mut offset = self.offset.load(Ordering::Relaxed) as usize;
        let mut total = 0;
        for buf in bufs.iter_mut() {
            if offset >= contents.len() {
                break;
            }
            let avail = &contents[offset..];
            let n = avail.len().min(buf.len());
            buf[..n].copy_from_slice(&avail[..n]);
            offset += n;
            total += n;
            if n < buf.len() {
                break;
            }
        }
        self.offset.store(offset as u64, Ordering::Relaxed);
        Ok(total)
    }

    fn fd_pread(&self, bufs: &mut [&mut [u8]], offset: crate::types::Filesize) -> Result<usize> {
        let contents = ok_or_translate(self.fs.read_file(&self.path))?;
        let mut offset = offset as usize;
        let mut total = 0;
        for buf in bufs.iter_mut() {
            if offset >= contents.len() {
                break;
            }
            let avail = &contents[offset..];
            let n = avail.len().min(buf.len());
            buf[..n].copy_from_slice(&avail[..n]);
            offset += n;
            total += n;
            if n < buf.len() {
                break;
            }
        }
        Ok(total)
    }

    fn fd_write(&self, bufs: &[&[u8]]) -> Result<usize> {
        // spec.md §4.4 path_open tie-break: append ignores the seek cursor
        // entirely; otherwise a plain fd_write is a positioned write at the
        // cursor, same splice-rewrite fd_pwrite uses, followed by advancing
        // the cursor to just past the written bytes.
        if self.append {
            let mut total = 0;
            for buf in bufs {
                ok_or_translate(self.fs.write_file(&self.path, buf, true))?;
                total += buf.len();
            }
            let size = ok_or_translate(self.fs.stat(&self.path))?.size;
            self.offset.store(size, Ordering::Relaxed);
            Ok(total)
        } else {
            let offset = self.offset.load(Ordering::Relaxed);
            let total = self.fd_pwrite(bufs, offset)?;
            self.offset.store(offset + total as u64, Ordering::Relaxed);
            Ok(total)
        }
    }

    fn fd_pwrite(&self, bufs: &[&[u8]], offset: crate::types::Filesize) -> Result<usize> {
        // No true positioned write in the embedding's whole-file API: read,
        // splice, and rewrite the whole file.
        let mut contents = ok_or_translate(self.fs.read_file(&self.path)).unwrap_or_default();
        let mut pos = offset as usize;
        let mut total = 0;
        for buf in bufs {
            if contents.len() < pos + buf.len() {
                contents.resize(pos + buf.len(), 0);
            }
            contents[pos..pos + buf.len()].copy_from_slice(buf);
            pos += buf.len();
            total += buf.len();
        }
        ok_or_translate(self.fs.write_file(&self.path, &contents, false))?;
        Ok(total)
    }

    fn fd_seek(&self, offset: i64, whence: crate::types::Whence) -> Result<crate::types::Filesize> {
        let size = ok_or_translate(self.fs.stat(&self.path))?.size as i64;
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
        if !self.is_dir {
            return Err(Errno::Notdir);
        }
        let mut entries = ok_or_translate(self.fs.read_directory(&self.path))?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        let skip = if cookie == DIRCOOKIE_START {
            0
        } else {
            cookie as usize
        };
        let iter = entries
            .into_iter()
            .enumerate()
            .skip(skip)
            .map(|(i, entry)| {
                Ok((
                    Dirent {
                        d_next: (i + 1) as Dircookie,
                        d_ino: 0,
                        d_namlen: entry.name.len() as u32,
                        d_type: entry.file_type,
                    },
                    entry.name,
                ))
            });
        Ok(Box::new(iter))
    }

    fn path_open(
        &self,
        path: &str,
        oflags: Oflags,
        fd_flags: crate::types::Fdflags,
        _read: bool,
        write: bool,
    ) -> Result<Box<dyn Driver>> {
        if !self.is_dir {
            return Err(Errno::Notdir);
        }
        let full = self.joined(path);
        let exists = self.fs.stat(&full).is_ok();
        if !exists {
            if !oflags.contains(Oflags::CREAT) {
                return Err(Errno::Noent);
            }
            ok_or_translate(self.fs.write_file(&full, &[], false))?;
        } else if oflags.contains(Oflags::EXCL) && oflags.contains(Oflags::CREAT) {
            return Err(Errno::Exist);
        }
        let meta = ok_or_translate(self.fs.stat(&full))?;
        let is_dir = meta.file_type == Filetype::Directory;
        if oflags.contains(Oflags::DIRECTORY) && !is_dir {
            return Err(Errno::Notdir);
        }
        let mut size = meta.size;
        if oflags.contains(Oflags::TRUNC) && write && !is_dir {
            ok_or_translate(self.fs.truncate(&full, 0))?;
            size = 0;
        }
        let append = fd_flags.contains(crate::types::Fdflags::APPEND);
        let start_offset = if append { size } else { 0 };
        Ok(Box::new(ReadWritePassthroughDriver {
            fs: Arc::clone(&self.fs),
            is_dir,
            append,
            rights: Mutex::new(DriverRights::new(
                crate::types::Rights::kind_mask(if is_dir {
                    Filetype::Directory
                } else {
                    Filetype::RegularFile
                }),
                crate::types::Rights::empty(),
            )),
            offset: AtomicU64::new(start_offset),
            path: full,
        }))
    }

    fn path_create_directory(&self, path: &str) -> Result<()> {
        ok_or_translate(self.fs.create_directory(&self.joined(path)))
    }

    fn path_remove_directory(&self, path: &str) -> Result<()> {
        ok_or_translate(self.fs.delete(&self.joined(path), false))
    }

    fn path_unlink_file(&self, path: &str) -> Result<()> {
        ok_or_translate(self.fs.delete(&self.joined(path), false))
    }

    fn path_rename(&self, old_path: &str, new_dir: &dyn Driver, new_path: &str) -> Result<()> {
        let new_full = match new_dir.as_any().downcast_ref::<ReadWritePassthroughDriver>() {
            Some(other) => other.joined(new_path),
            None => return Err(Errno::Xdev),
        };
        ok_or_translate(self.fs.rename(&self.joined(old_path), &new_full))
    }

    fn path_link(&self, _old_path: &str, _new_dir: &dyn Driver, _new_path: &str) -> Result<()> {
        // The embedding's abstraction has no hardlink primitive.
        Err(Errno::Notsup)
    }

    fn path_filestat_get(&self, path: &str, _follow: bool) -> Result<Filestat> {
        let meta = ok_or_translate(self.fs.stat(&self.joined(path)))?;
        Ok(Filestat {
            dev: 0,
            ino: 0,
            filetype: meta.file_type,
            nlink: 1,
            size: meta.size,
            atim: meta.atim,
            mtim: meta.mtim,
            ctim: meta.ctim,
        })
    }

    fn path_filestat_set_times(
        &self,
        path: &str,
        atim: Timestamp,
        mtim: Timestamp,
        fst_flags: Fstflags,
        _follow: bool,
    ) -> Result<()> {
        set_times(&*self.fs, &self.joined(path), atim, mtim, fst_flags)
    }
}

fn set_times(
    fs: &dyn HostFileSystem,
    path: &str,
    atim: Timestamp,
    mtim: Timestamp,
    fst_flags: Fstflags,
) -> Result<()> {
    let atim = if fst_flags.contains(Fstflags::ATIM_NOW) {
        Some(0)
    } else if fst_flags.contains(Fstflags::ATIM) {
        Some(atim)
    } else {
        None
    };
    let mtim = if fst_flags.contains(Fstflags::MTIM_NOW) {
        Some(0)
    } else if fst_flags.contains(Fstflags::MTIM) {
        Some(mtim)
    } else {
        None
    };
    ok_or_translate(fs.set_times(path, atim, mtim))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HostMetadata;
    use parking_lot::Mutex as PMutex;
    use std::collections::HashMap;

    struct MemFs(PMutex<HashMap<String, Vec<u8>>>);

    impl HostFileSystem for MemFs {
        fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
            self.0
                .lock()
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "missing"))
        }
        fn write_file(&self, path: &str, contents: &[u8], append: bool) -> io::Result<()> {
            let mut map = self.0.lock();
            if append {
                map.entry(path.to_string()).or_default().extend_from_slice(contents);
            } else {
                map.insert(path.to_string(), contents.to_vec());
            }
            Ok(())
        }
        fn stat(&self, path: &str) -> io::Result<HostMetadata> {
            self.0
                .lock()
                .get(path)
                .map(|c| HostMetadata {
                    file_type: Filetype::RegularFile,
                    size: c.len() as u64,
                    atim: 0,
                    mtim: 0,
                    ctim: 0,
                })
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "missing"))
        }
        fn read_directory(&self, _path: &str) -> io::Result<Vec<crate::embed::HostDirEntry>> {
            Ok(Vec::new())
        }
        fn create_directory(&self, _path: &str) -> io::Result<()> {
            Ok(())
        }
        fn delete(&self, path: &str, _recursive: bool) -> io::Result<()> {
            self.0.lock().remove(path);
            Ok(())
        }
        fn rename(&self, from: &str, to: &str) -> io::Result<()> {
            let v = self.0.lock().remove(from).unwrap_or_default();
            self.0.lock().insert(to.to_string(), v);
            Ok(())
        }
        fn set_times(&self, _path: &str, _atim: Option<Timestamp>, _mtim: Option<Timestamp>) -> io::Result<()> {
            Ok(())
        }
        fn truncate(&self, path: &str, size: Filesize) -> io::Result<()> {
            let mut map = self.0.lock();
            let entry = map.entry(path.to_string()).or_default();
            entry.resize(size as usize, 0);
            Ok(())
        }
    }

    #[test]
    fn write_then_read_roundtrips_through_embedding() {
        let fs: Arc<dyn HostFileSystem> = Arc::new(MemFs(PMutex::new(HashMap::new())));
        fs.write_file("/a.txt", b"abc", false).unwrap();
        let driver = ReadWritePassthroughDriver::new(fs, "/a.txt".to_string(), false);
        let mut buf = [0u8; 3];
        let mut bufs: Vec<&mut [u8]> = vec![&mut buf];
        let n = driver.fd_read(&mut bufs).unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf, b"abc");
    }

    #[test]
    fn fd_write_without_append_overwrites_at_cursor() {
        let fs: Arc<dyn HostFileSystem> = Arc::new(MemFs(PMutex::new(HashMap::new())));
        fs.write_file("/c.txt", b"AAAA", false).unwrap();
        let driver = ReadWritePassthroughDriver::new(fs.clone(), "/c.txt".to_string(), false);
        driver.fd_write(&[b"BB"]).unwrap();
        driver.fd_write(&[b"CC"]).unwrap();
        let contents = fs.read_file("/c.txt").unwrap();
        assert_eq!(&contents, b"BBCC", "plain writes should advance the cursor, not append");
    }

    #[test]
    fn fd_write_with_append_ignores_cursor() {
        let fs: Arc<dyn HostFileSystem> = Arc::new(MemFs(PMutex::new(HashMap::new())));
        fs.write_file("/d.txt", b"Hello", false).unwrap();
        let driver = ReadWritePassthroughDriver {
            fs: fs.clone(),
            path: "/d.txt".to_string(),
            is_dir: false,
            append: true,
            offset: AtomicU64::new(0),
            rights: Mutex::new(DriverRights::new(crate::types::Rights::all(), crate::types::Rights::empty())),
        };
        driver.fd_write(&[b" World"]).unwrap();
        let contents = fs.read_file("/d.txt").unwrap();
        assert_eq!(&contents, b"Hello World");
    }

    #[test]
    fn pwrite_extends_and_zero_fills() {
        let fs: Arc<dyn HostFileSystem> = Arc::new(MemFs(PMutex::new(HashMap::new())));
        fs.write_file("/b.txt", b"ab", false).unwrap();
        let driver = ReadWritePassthroughDriver::new(fs.clone(), "/b.txt".to_string(), false);
        driver.fd_pwrite(&[b"Z"], 4).unwrap();
        let contents = fs.read_file("/b.txt").unwrap();
        assert_eq!(contents, vec![b'a', b'b', 0, 0, b'Z']);
    }
}
