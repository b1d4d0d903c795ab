//! The process-wide file descriptor table (spec.md §3 "File descriptor",
//! §5 "Shared-resource policy": "allocation uses lowest-free-index with an
//! internal mutex"). Fds 0/1/2 are always stdio; 3 and above are allocated
//! on demand.

use crate::driver::Driver;
use crate::errno::{Errno, Result};
use crate::types::{Fd, Fdflags, Filetype, Inode, Preopentype, Rights};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// One live file descriptor: a driver-local handle plus the rights and
/// flags the spec says the table itself (not the driver) owns.
pub struct Entry {
    pub driver: Box<dyn Driver>,
    pub rights_base: Rights,
    pub rights_inheriting: Rights,
    pub fdflags: Fdflags,
    pub inode: Inode,
    pub preopen_path: Option<String>,
}

impl Entry {
    pub fn filetype(&self) -> Filetype {
        self.driver.file_type()
    }
}

/// Lowest-free-index allocator plus the map from fd number to [`Entry`],
/// guarded by one mutex per spec.md §5 ("the fd table is shared among all
/// threads of one process").
pub struct FdTable {
    inner: Mutex<BTreeMap<Fd, Entry>>,
}

impl FdTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BTreeMap::new()),
        }
    }

    /// Inserts `entry` at an explicit fd number (used for stdio 0/1/2 and
    /// preopens, which must land at predictable numbers).
    pub fn insert_at(&self, fd: Fd, entry: Entry) {
        self.inner.lock().insert(fd, entry);
    }

    /// Allocates the lowest free fd number starting at 3 and inserts
    /// `entry` there, per spec.md §3 "3 and above are allocated by the
    /// table (lowest free index...)".
    pub fn insert(&self, entry: Entry) -> Fd {
        let mut table = self.inner.lock();
        let mut candidate: Fd = 3;
        for &fd in table.keys() {
            if fd < candidate {
                continue;
            }
            if fd == candidate {
                candidate += 1;
            } else {
                break;
            }
        }
        table.insert(candidate, entry);
        candidate
    }

    pub fn remove(&self, fd: Fd) -> Result<Entry> {
        self.inner.lock().remove(&fd).ok_or(Errno::Badf)
    }

    pub fn with<R>(&self, fd: Fd, f: impl FnOnce(&Entry) -> Result<R>) -> Result<R> {
        let table = self.inner.lock();
        let entry = table.get(&fd).ok_or(Errno::Badf)?;
        f(entry)
    }

    pub fn with_mut<R>(&self, fd: Fd, f: impl FnOnce(&mut Entry) -> Result<R>) -> Result<R> {
        let mut table = self.inner.lock();
        let entry = table.get_mut(&fd).ok_or(Errno::Badf)?;
        f(entry)
    }

    /// Accesses two fds' entries under a single critical section, for
    /// operations like `path_rename`/`path_link` that span two directory
    /// descriptors — taking the table's mutex twice (once per fd) would
    /// deadlock if the two fds happened to be the same.
    pub fn with2<R>(&self, fd_a: Fd, fd_b: Fd, f: impl FnOnce(&Entry, &Entry) -> Result<R>) -> Result<R> {
        let table = self.inner.lock();
        let a = table.get(&fd_a).ok_or(Errno::Badf)?;
        let b = table.get(&fd_b).ok_or(Errno::Badf)?;
        f(a, b)
    }

    /// Checks that `fd`'s `rights_base` contains every bit in `needed`,
    /// per spec.md §3 "an operation requires that its rights be present
    /// in the descriptor's rights_base."
    pub fn check_rights(&self, fd: Fd, needed: Rights) -> Result<()> {
        self.with(fd, |entry| {
            if entry.rights_base.contains(needed) {
                Ok(())
            } else {
                Err(Errno::Notcapable)
            }
        })
    }

    pub fn preopens(&self) -> Vec<(Fd, String)> {
        self.inner
            .lock()
            .iter()
            .filter_map(|(fd, e)| e.preopen_path.clone().map(|p| (*fd, p)))
            .collect()
    }

    pub fn renumber(&self, from: Fd, to: Fd) -> Result<()> {
        let mut table = self.inner.lock();
        let entry = table.remove(&from).ok_or(Errno::Badf)?;
        // spec.md §3 "fd_renumber (the target slot is replaced)": whatever
        // already occupies `to` is closed first, same as an explicit
        // fd_close, so its driver releases any waiters/refcounts before
        // the slot is overwritten.
        if let Some(old) = table.insert(to, entry) {
            let _ = old.driver.fd_close();
        }
        Ok(())
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the rights a newly opened descriptor receives, per spec.md §3:
/// `(parent.rights_inheriting & requested) & kind_mask`.
pub fn derive_rights(
    parent_inheriting: Rights,
    requested_base: Rights,
    requested_inheriting: Rights,
    filetype: Filetype,
) -> (Rights, Rights) {
    use crate::types::RightsExt;
    let mask = Rights::kind_mask(filetype);
    (
        parent_inheriting & requested_base & mask,
        parent_inheriting & requested_inheriting & mask,
    )
}

pub const PREOPEN_TYPE_DIR: Preopentype = Preopentype::Dir;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::stdio::CharDriver;
    use std::sync::Arc;

    fn dummy_entry() -> Entry {
        Entry {
            driver: Box::new(CharDriver::new(Arc::new(crate::stream::Stream::new()), true, true)),
            rights_base: Rights::empty(),
            rights_inheriting: Rights::empty(),
            fdflags: Fdflags::empty(),
            inode: 0,
            preopen_path: None,
        }
    }

    #[test]
    fn allocates_lowest_free_index_starting_at_three() {
        let table = FdTable::new();
        let a = table.insert(dummy_entry());
        let b = table.insert(dummy_entry());
        assert_eq!(a, 3);
        assert_eq!(b, 4);
        table.remove(a).unwrap();
        let c = table.insert(dummy_entry());
        assert_eq!(c, 3);
    }

    #[test]
    fn check_rights_rejects_missing_bits() {
        let table = FdTable::new();
        let mut entry = dummy_entry();
        entry.rights_base = Rights::FD_READ;
        table.insert_at(3, entry);
        assert!(table.check_rights(3, Rights::FD_READ).is_ok());
        assert_eq!(
            table.check_rights(3, Rights::FD_WRITE).unwrap_err(),
            Errno::Notcapable
        );
    }
}
