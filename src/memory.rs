//! Linear memory view and the per-syscall *transfer plan* machinery (spec.md
//! §4.1). A [`GuestMemory`] is a non-owning, bounds-checked typed view over
//! the guest's linear memory; it never assumes host and guest share an
//! address space, so every access goes through an explicit offset and is
//! checked against the buffer length before any read or write happens.
//!
//! The dispatcher (`crate::dispatch`) builds a transfer plan per call out of
//! the primitives here: read every **param** region before invoking a
//! driver, hand the driver host-native buffers, then write every **result**
//! region back. For scatter/gather calls the reverse-mapping step (patching
//! staging offsets back to the guest's original iovec-pointed addresses) is
//! exactly what [`write_iovecs_from_buffers`] does.

use crate::errno::{Errno, Result};
use crate::types::{Dirent, Event, Fdstat, Filestat, Iovec, Prestat};
use std::cell::Cell;
use std::convert::TryInto;

/// A non-owning, bounds-checked view over the guest's linear memory. Cheap
/// to copy; it borrows the backing bytes for the lifetime of a single
/// syscall. `Cell<u8>` lets the dispatcher write results back without a
/// `&mut` borrow, mirroring how `wiggle`'s generated `GuestMemory` lets a
/// single shared view serve both param reads and result writes within one
/// call.
#[derive(Copy, Clone)]
pub struct GuestMemory<'a> {
    base: &'a [Cell<u8>],
}

impl<'a> GuestMemory<'a> {
    pub fn new(base: &'a [Cell<u8>]) -> Self {
        Self { base }
    }

    pub fn len(&self) -> u32 {
        self.base.len() as u32
    }

    fn region(&self, ptr: u32, len: u32) -> Result<&'a [Cell<u8>]> {
        let start = ptr as usize;
        let end = start.checked_add(len as usize).ok_or(Errno::Fault)?;
        self.base.get(start..end).ok_or(Errno::Fault)
    }

    pub fn read_bytes(&self, ptr: u32, len: u32) -> Result<Vec<u8>> {
        let region = self.region(ptr, len)?;
        Ok(region.iter().map(Cell::get).collect())
    }

    pub fn write_bytes(&self, ptr: u32, data: &[u8]) -> Result<()> {
        let region = self.region(ptr, data.len() as u32)?;
        for (cell, byte) in region.iter().zip(data.iter()) {
            cell.set(*byte);
        }
        Ok(())
    }

    pub fn read_u8(&self, ptr: u32) -> Result<u8> {
        Ok(self.region(ptr, 1)?[0].get())
    }

    pub fn write_u8(&self, ptr: u32, v: u8) -> Result<()> {
        self.region(ptr, 1)?[0].set(v);
        Ok(())
    }

    pub fn read_u16(&self, ptr: u32) -> Result<u16> {
        let b = self.read_bytes(ptr, 2)?;
        Ok(u16::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn write_u16(&self, ptr: u32, v: u16) -> Result<()> {
        self.write_bytes(ptr, &v.to_le_bytes())
    }

    pub fn read_u32(&self, ptr: u32) -> Result<u32> {
        let b = self.read_bytes(ptr, 4)?;
        Ok(u32::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn write_u32(&self, ptr: u32, v: u32) -> Result<()> {
        self.write_bytes(ptr, &v.to_le_bytes())
    }

    pub fn read_u64(&self, ptr: u32) -> Result<u64> {
        let b = self.read_bytes(ptr, 8)?;
        Ok(u64::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn write_u64(&self, ptr: u32, v: u64) -> Result<()> {
        self.write_bytes(ptr, &v.to_le_bytes())
    }

    /// Reads a (ptr, len) path argument as UTF-8 with no trailing NUL, per
    /// spec.md §4.1 "Paths".
    pub fn read_string(&self, ptr: u32, len: u32) -> Result<String> {
        let bytes = self.read_bytes(ptr, len)?;
        Ok(String::from_utf8(bytes)?)
    }

    pub fn write_string(&self, ptr: u32, s: &str) -> Result<()> {
        self.write_bytes(ptr, s.as_bytes())
    }
}

// --- iovec / ciovec scatter-gather -----------------------------------------

pub const IOVEC_SIZE: u32 = 8;

pub fn read_iovec_array(mem: GuestMemory, ptr: u32, n: u32) -> Result<Vec<Iovec>> {
    let mut out = Vec::with_capacity(n as usize);
    for i in 0..n {
        let entry_ptr = ptr
            .checked_add(i.checked_mul(IOVEC_SIZE).ok_or(Errno::Overflow)?)
            .ok_or(Errno::Overflow)?;
        let buf = mem.read_u32(entry_ptr)?;
        let buf_len = mem.read_u32(entry_ptr + 4)?;
        out.push(Iovec { buf, buf_len });
    }
    Ok(out)
}

/// Stages the guest buffers pointed to by a `ciovec` array into one
/// contiguous host buffer, for `fd_write`/`fd_pwrite`-style gather writes.
pub fn stage_write_buffers(mem: GuestMemory, iovecs: &[Iovec]) -> Result<Vec<u8>> {
    let mut staging = Vec::new();
    for iov in iovecs {
        staging.extend(mem.read_bytes(iov.buf, iov.buf_len)?);
    }
    Ok(staging)
}

/// Splits `iovecs` into host-native scratch buffers sized for a scatter
/// read, to be filled in by the driver and then copied back to the guest's
/// original addresses by [`write_iovecs_from_buffers`].
pub fn alloc_read_buffers(iovecs: &[Iovec]) -> Vec<Vec<u8>> {
    iovecs
        .iter()
        .map(|iov| vec![0u8; iov.buf_len as usize])
        .collect()
}

/// The reverse-mapping copy-back step: writes each staging buffer to the
/// guest address its iovec originally pointed at, stopping once `total`
/// bytes have been distributed (a short read fills only a prefix of the
/// buffers). Returns the number of bytes actually copied.
pub fn write_iovecs_from_buffers(
    mem: GuestMemory,
    iovecs: &[Iovec],
    buffers: &[Vec<u8>],
    total: u32,
) -> Result<u32> {
    let mut remaining = total;
    let mut written = 0u32;
    for (iov, buf) in iovecs.iter().zip(buffers.iter()) {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(iov.buf_len).min(buf.len() as u32);
        mem.write_bytes(iov.buf, &buf[..take as usize])?;
        written += take;
        remaining -= take;
    }
    Ok(written)
}

// --- args_get / environ_get special case -----------------------------------

/// Implements the `args_get`/`environ_get` transfer plan from spec.md §4.1:
/// the guest passes a pointer-array region and a character-buffer region;
/// the plan fills the character buffer with NUL-terminated strings and
/// patches each pointer-array entry to point into that buffer, rebased to
/// the guest's own address space, before the call returns.
pub fn write_string_table(
    mem: GuestMemory,
    ptrs_ptr: u32,
    buf_ptr: u32,
    strings: &[impl AsRef<str>],
) -> Result<()> {
    let mut cursor = buf_ptr;
    for (i, s) in strings.iter().enumerate() {
        let entry_ptr = ptrs_ptr
            .checked_add((i as u32).checked_mul(4).ok_or(Errno::Overflow)?)
            .ok_or(Errno::Overflow)?;
        mem.write_u32(entry_ptr, cursor)?;
        let bytes = s.as_ref().as_bytes();
        mem.write_bytes(cursor, bytes)?;
        mem.write_u8(cursor + bytes.len() as u32, 0)?;
        cursor = cursor
            .checked_add(bytes.len() as u32 + 1)
            .ok_or(Errno::Overflow)?;
    }
    Ok(())
}

pub fn string_table_buf_size(strings: &[impl AsRef<str>]) -> u32 {
    strings
        .iter()
        .map(|s| s.as_ref().as_bytes().len() as u32 + 1)
        .sum()
}

// --- fixed-size struct encode/decode ---------------------------------------

pub fn write_fdstat(mem: GuestMemory, ptr: u32, stat: Fdstat) -> Result<()> {
    mem.write_u8(ptr, stat.filetype as u8)?;
    mem.write_u16(ptr + 2, stat.flags.bits())?;
    mem.write_u64(ptr + 8, stat.rights_base.bits())?;
    mem.write_u64(ptr + 16, stat.rights_inheriting.bits())?;
    Ok(())
}

pub fn write_filestat(mem: GuestMemory, ptr: u32, stat: Filestat) -> Result<()> {
    mem.write_u64(ptr, stat.dev)?;
    mem.write_u64(ptr + 8, stat.ino)?;
    mem.write_u8(ptr + 16, stat.filetype as u8)?;
    mem.write_u64(ptr + 24, stat.nlink)?;
    mem.write_u64(ptr + 32, stat.size)?;
    mem.write_u64(ptr + 40, stat.atim)?;
    mem.write_u64(ptr + 48, stat.mtim)?;
    mem.write_u64(ptr + 56, stat.ctim)?;
    Ok(())
}

pub fn write_prestat(mem: GuestMemory, ptr: u32, stat: Prestat) -> Result<()> {
    match stat {
        Prestat::Dir(d) => {
            mem.write_u8(ptr, 0)?;
            mem.write_u32(ptr + 4, d.pr_name_len)?;
        }
    }
    Ok(())
}

pub const DIRENT_SIZE: u32 = 24;

pub fn write_dirent(mem: GuestMemory, ptr: u32, d: &Dirent) -> Result<()> {
    mem.write_u64(ptr, d.d_next)?;
    mem.write_u64(ptr + 8, d.d_ino)?;
    mem.write_u32(ptr + 16, d.d_namlen)?;
    mem.write_u8(ptr + 20, d.d_type as u8)?;
    Ok(())
}

pub const EVENT_SIZE: u32 = 32;

pub fn write_event(mem: GuestMemory, ptr: u32, e: &Event) -> Result<()> {
    mem.write_u64(ptr, e.userdata)?;
    mem.write_u16(ptr + 8, e.error.map(Errno::as_u16).unwrap_or(0))?;
    mem.write_u8(ptr + 10, e.r#type as u8)?;
    mem.write_u64(ptr + 16, e.fd_readwrite.nbytes)?;
    mem.write_u16(ptr + 24, e.fd_readwrite.flags.bits())?;
    Ok(())
}

pub const SUBSCRIPTION_SIZE: u32 = 48;

pub fn read_subscription(mem: GuestMemory, ptr: u32) -> Result<crate::types::Subscription> {
    use crate::types::*;
    use std::convert::TryFrom;

    let userdata = mem.read_u64(ptr)?;
    let tag = mem.read_u8(ptr + 8)?;
    let payload = ptr + 16;
    let u = match tag {
        0 => {
            let id = Clockid::try_from(mem.read_u8(payload)? as u8)?;
            let timeout = mem.read_u64(payload + 8)?;
            let precision = mem.read_u64(payload + 16)?;
            let flags = Subclockflags::from_bits_truncate(mem.read_u16(payload + 24)?);
            SubscriptionU::Clock(SubscriptionClock {
                id,
                timeout,
                precision,
                flags,
            })
        }
        1 => SubscriptionU::FdRead(SubscriptionFdReadwrite {
            file_descriptor: mem.read_u32(payload)?,
        }),
        2 => SubscriptionU::FdWrite(SubscriptionFdReadwrite {
            file_descriptor: mem.read_u32(payload)?,
        }),
        _ => return Err(Errno::Inval),
    };
    Ok(Subscription { userdata, u })
}
