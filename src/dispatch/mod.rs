//! The WASI syscall dispatcher (spec.md §4.1 "syscall dispatcher and memory
//! marshalling layer", §6 "Guest-facing ABI"). Each function here is one
//! `wasi_snapshot_preview1` import: it stages guest-memory params into
//! host-native values, drives the fd table / driver / clock / rng, and
//! writes results back, returning the numeric errno the guest sees (`0` on
//! success), per spec.md §7 "only `proc_exit`/`thread_exit` do not return;
//! all other calls return an errno in place of trapping the instance."

mod calls;

pub use calls::*;
