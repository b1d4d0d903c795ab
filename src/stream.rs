//! Bounded, back-pressured byte streams (spec.md §3 "Stream", §4.3 "Bounded
//! stream contract"). A [`Stream`] backs stdio and socket file descriptors;
//! readers and writers block on a `Condvar` rather than busy-polling, and
//! destroying a stream wakes every waiter with an empty result so pending
//! `fd_read`/`fd_write` calls unwind cleanly (spec.md §5 "Cancellation and
//! timeouts").

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::Duration;

/// Default back-pressure limit, spec.md §3.
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mode {
    Initial,
    Flowing,
    Paused,
}

struct Inner {
    chunks: VecDeque<u8>,
    capacity: usize,
    write_closed: bool,
    destroyed: bool,
    mode: Mode,
}

/// A FIFO byte stream with a bounded fill level. Shared between the fd
/// table entry that owns the writable end and whichever driver/dispatcher
/// thread is reading or writing it; internally synchronized per spec.md §5
/// "Streams serialize all ops."
pub struct Stream {
    inner: Mutex<Inner>,
    not_empty: Condvar,
    not_full: Condvar,
}

/// Returned when a blocked reader/writer is released because the stream
/// was destroyed out from under it; callers convert this to an empty
/// buffer at the syscall boundary (spec.md §4.3).
#[derive(Debug)]
pub struct Destroyed;

impl Stream {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                chunks: VecDeque::new(),
                capacity,
                write_closed: false,
                destroyed: false,
                mode: Mode::Initial,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    pub fn fill_level(&self) -> usize {
        self.inner.lock().chunks.len()
    }

    /// Appends `chunk`, blocking until there is room (`fill_level <=
    /// capacity - chunk.len()`) unless the chunk is larger than the whole
    /// capacity, in which case it is admitted once the buffer is fully
    /// drained. Destroying the stream while blocked returns `Destroyed`.
    pub fn write(&self, chunk: &[u8]) -> Result<(), Destroyed> {
        if chunk.is_empty() {
            return Ok(());
        }
        let mut inner = self.inner.lock();
        loop {
            if inner.destroyed {
                return Err(Destroyed);
            }
            let budget = inner.capacity.saturating_sub(chunk.len());
            if inner.chunks.len() <= budget || inner.chunks.is_empty() {
                inner.chunks.extend(chunk.iter().copied());
                self.not_empty.notify_one();
                return Ok(());
            }
            self.not_full.wait(&mut inner);
        }
    }

    /// Drains all currently buffered bytes. Blocks if empty and not
    /// write-closed; returns immediately (with an empty vec) once the
    /// write side has been closed and drained, per spec.md §3 "Stream
    /// live as long as their endpoint".
    pub fn read_all(&self) -> Result<Vec<u8>, Destroyed> {
        self.read(usize::MAX)
    }

    /// Returns at most `max` bytes, per spec.md §4.3 `read(max, n)`.
    pub fn read(&self, max: usize) -> Result<Vec<u8>, Destroyed> {
        let mut inner = self.inner.lock();
        loop {
            if inner.destroyed {
                return Err(Destroyed);
            }
            if !inner.chunks.is_empty() {
                let take = max.min(inner.chunks.len());
                let out: Vec<u8> = inner.chunks.drain(..take).collect();
                self.not_full.notify_one();
                return Ok(out);
            }
            if inner.write_closed {
                return Ok(Vec::new());
            }
            self.not_empty.wait(&mut inner);
        }
    }

    /// Non-blocking variant used by `fd_bytes_available`/poll readiness
    /// checks.
    pub fn try_read(&self, max: usize) -> Vec<u8> {
        let mut inner = self.inner.lock();
        let take = max.min(inner.chunks.len());
        inner.chunks.drain(..take).collect()
    }

    pub fn is_readable(&self) -> bool {
        let inner = self.inner.lock();
        inner.destroyed || !inner.chunks.is_empty() || inner.write_closed
    }

    pub fn is_writable(&self) -> bool {
        let inner = self.inner.lock();
        inner.destroyed || inner.chunks.len() < inner.capacity
    }

    pub fn bytes_available(&self) -> u64 {
        self.inner.lock().chunks.len() as u64
    }

    /// Bytes of room left before a writer would block, per the §4.3 "write
    /// suspends until `fill_level <= capacity - chunk.byteLength`" contract.
    pub fn write_capacity(&self) -> u64 {
        let inner = self.inner.lock();
        inner.capacity.saturating_sub(inner.chunks.len()) as u64
    }

    /// Closes the write side; further reads drain the remaining bytes then
    /// return empty (spec.md §3).
    pub fn end(&self) {
        let mut inner = self.inner.lock();
        inner.write_closed = true;
        self.not_empty.notify_all();
    }

    /// Immediately releases all waiters with `Destroyed` (spec.md §3, §5).
    pub fn destroy(&self) {
        let mut inner = self.inner.lock();
        inner.destroyed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn mode(&self) -> Mode {
        self.inner.lock().mode
    }

    /// Transition to `flowing` on first subscription to "on data", per
    /// spec.md §4.3 "Readable modes".
    pub fn resume(&self) {
        self.inner.lock().mode = Mode::Flowing;
    }

    pub fn pause(&self) {
        self.inner.lock().mode = Mode::Paused;
    }

    /// Blocks until readable or a timeout elapses, for `poll_oneoff`'s
    /// `fd_read` subscriptions. Returns `true` if it woke due to
    /// readiness, `false` on timeout.
    pub fn wait_readable(&self, timeout: Duration) -> bool {
        let mut inner = self.inner.lock();
        if inner.destroyed || !inner.chunks.is_empty() || inner.write_closed {
            return true;
        }
        let result = self.not_empty.wait_for(&mut inner, timeout);
        !result.timed_out()
    }
}

impl Default for Stream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn write_then_read_roundtrip() {
        let s = Stream::new();
        s.write(b"hello").unwrap();
        assert_eq!(s.read_all().unwrap(), b"hello");
    }

    #[test]
    fn fill_level_invariant() {
        let s = Stream::new();
        s.write(b"abc").unwrap();
        s.write(b"de").unwrap();
        assert_eq!(s.fill_level(), 5);
        let got = s.read(2).unwrap();
        assert_eq!(got, b"ab");
        assert_eq!(s.fill_level(), 3);
    }

    #[test]
    fn destroy_wakes_blocked_reader() {
        let s = Arc::new(Stream::new());
        let reader = {
            let s = Arc::clone(&s);
            thread::spawn(move || s.read_all())
        };
        thread::sleep(Duration::from_millis(20));
        s.destroy();
        assert!(reader.join().unwrap().is_err());
    }

    #[test]
    fn end_drains_then_returns_empty() {
        let s = Stream::new();
        s.write(b"x").unwrap();
        s.end();
        assert_eq!(s.read_all().unwrap(), b"x");
        assert_eq!(s.read_all().unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn writer_blocks_until_drained_when_full() {
        let s = Arc::new(Stream::with_capacity(4));
        s.write(b"abcd").unwrap();
        assert!(!s.is_writable());
        let writer = {
            let s = Arc::clone(&s);
            thread::spawn(move || s.write(b"ef"))
        };
        thread::sleep(Duration::from_millis(20));
        assert_eq!(s.read(4).unwrap(), b"abcd");
        writer.join().unwrap().unwrap();
        assert_eq!(s.fill_level(), 2);
    }
}
