//! Regression coverage alongside S6 (spec.md §8, §6 `poll_oneoff`): a ready
//! `fd_read`/`fd_write` subscription's event must report the actual byte
//! count available/writable, not a hardcoded zero.

mod support;

use std::sync::Arc;
use support::GuestBuffer;
use wasi_host_core::{dispatch, Stream, WasiCtxBuilder};

#[test]
fn ready_fd_read_event_reports_bytes_available() {
    let stdin = Arc::new(Stream::new());
    stdin.write(b"hi!").unwrap();
    let ctx = WasiCtxBuilder::new().stdin(stdin).build().unwrap();

    let buf = GuestBuffer::new(4096);
    let mem = buf.memory();

    let sub_ptr = 0u32;
    mem.write_u64(sub_ptr, 42).unwrap(); // userdata
    mem.write_u8(sub_ptr + 8, 1).unwrap(); // tag 1 = fd_read
    mem.write_u32(sub_ptr + 16, 0).unwrap(); // fd 0 (stdin)

    let event_ptr = 256u32;
    let nevents_ptr = 512u32;
    let errno = dispatch::poll_oneoff(&ctx, mem, sub_ptr, event_ptr, 1, nevents_ptr);
    assert_eq!(errno, wasi_host_core::SUCCESS);
    assert_eq!(mem.read_u32(nevents_ptr).unwrap(), 1);
    assert_eq!(
        mem.read_u64(event_ptr + 16).unwrap(),
        3,
        "fd_readwrite.nbytes must reflect the stream's actual bytes_available, not 0"
    );
}

#[test]
fn ready_fd_write_event_reports_remaining_capacity() {
    let stdout = Arc::new(Stream::with_capacity(64));
    let ctx = WasiCtxBuilder::new().stdout(Arc::clone(&stdout)).build().unwrap();

    let buf = GuestBuffer::new(4096);
    let mem = buf.memory();

    let sub_ptr = 0u32;
    mem.write_u64(sub_ptr, 7).unwrap(); // userdata
    mem.write_u8(sub_ptr + 8, 2).unwrap(); // tag 2 = fd_write
    mem.write_u32(sub_ptr + 16, 1).unwrap(); // fd 1 (stdout)

    let event_ptr = 256u32;
    let nevents_ptr = 512u32;
    let errno = dispatch::poll_oneoff(&ctx, mem, sub_ptr, event_ptr, 1, nevents_ptr);
    assert_eq!(errno, wasi_host_core::SUCCESS);
    assert_eq!(mem.read_u32(nevents_ptr).unwrap(), 1);
    assert_eq!(
        mem.read_u64(event_ptr + 16).unwrap(),
        64,
        "an empty stream's fd_write nbytes should report its full write capacity"
    );
}
