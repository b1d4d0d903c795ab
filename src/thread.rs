//! Guest thread lifecycle (spec.md §4.5 "Thread spawn", "Scheduling
//! model"). The host never runs guest code itself; `thread_spawn` hands the
//! embedding a callback that schedules the guest module's thread
//! entrypoint on a fresh execution context sharing the same linear memory,
//! and records the resulting tid so `thread_exit` can look it up again.

use crate::errno::{Errno, Result};
use crate::types::{Exitcode, Tid};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

/// What the embedding does to actually schedule a guest thread; the host
/// core only decides tids and tracks liveness (spec.md §4.5: "schedules
/// the guest module's thread entrypoint ... on a fresh execution context
/// that shares the same linear memory").
pub trait ThreadSpawner: Send + Sync {
    fn spawn(&self, tid: Tid, start_arg: u32);
}

enum ThreadState {
    Running,
    Exited(Exitcode),
}

/// Tracks every guest thread spawned from this process, per spec.md §4.5
/// "Scheduling model": "multiple guest threads ... may be executing
/// syscalls concurrently against a single shared file-descriptor table".
pub struct ThreadTable {
    next_tid: AtomicU32,
    threads: Mutex<HashMap<Tid, ThreadState>>,
}

impl ThreadTable {
    pub fn new() -> Self {
        Self {
            next_tid: AtomicU32::new(1),
            threads: Mutex::new(HashMap::new()),
        }
    }

    pub fn thread_spawn(&self, spawner: &dyn ThreadSpawner, start_arg: u32) -> Result<Tid> {
        let tid = self.next_tid.fetch_add(1, Ordering::SeqCst);
        self.threads.lock().insert(tid, ThreadState::Running);
        spawner.spawn(tid, start_arg);
        Ok(tid)
    }

    pub fn thread_exit(&self, tid: Tid, rval: Exitcode) -> Result<()> {
        let mut threads = self.threads.lock();
        match threads.get_mut(&tid) {
            Some(state) => {
                *state = ThreadState::Exited(rval);
                Ok(())
            }
            None => Err(Errno::Srch),
        }
    }

    pub fn is_running(&self, tid: Tid) -> bool {
        matches!(self.threads.lock().get(&tid), Some(ThreadState::Running))
    }
}

impl Default for ThreadTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    struct RecordingSpawner {
        called: Arc<AtomicBool>,
    }

    impl ThreadSpawner for RecordingSpawner {
        fn spawn(&self, _tid: Tid, _start_arg: u32) {
            self.called.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn spawn_allocates_increasing_tids_and_invokes_spawner() {
        let table = ThreadTable::new();
        let called = Arc::new(AtomicBool::new(false));
        let spawner = RecordingSpawner {
            called: Arc::clone(&called),
        };
        let a = table.thread_spawn(&spawner, 0).unwrap();
        let b = table.thread_spawn(&spawner, 0).unwrap();
        assert!(b > a);
        assert!(called.load(Ordering::SeqCst));
        assert!(table.is_running(a));
    }

    #[test]
    fn exit_of_unknown_tid_is_esrch() {
        let table = ThreadTable::new();
        assert_eq!(table.thread_exit(99, 0).unwrap_err(), Errno::Srch);
    }

    #[test]
    fn exit_marks_thread_not_running() {
        let table = ThreadTable::new();
        struct NoopSpawner;
        impl ThreadSpawner for NoopSpawner {
            fn spawn(&self, _tid: Tid, _start_arg: u32) {}
        }
        let tid = table.thread_spawn(&NoopSpawner, 0).unwrap();
        table.thread_exit(tid, 0).unwrap();
        assert!(!table.is_running(tid));
    }
}
