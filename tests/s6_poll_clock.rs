//! S6 (spec.md §8): subscribe to a relative monotonic-duration pollable of
//! 50ms and confirm `poll_oneoff` reports exactly one ready clock event
//! after at least that long.

mod support;

use support::GuestBuffer;
use std::time::Instant;
use wasi_host_core::{dispatch, WasiCtxBuilder};

#[test]
fn monotonic_duration_subscription_fires_after_delay() {
    let ctx = WasiCtxBuilder::new().build().unwrap();

    let buf = GuestBuffer::new(4096);
    let mem = buf.memory();

    let sub_ptr = 0u32;
    let userdata = 0xC0FFEEu64;
    mem.write_u64(sub_ptr, userdata).unwrap();
    mem.write_u8(sub_ptr + 8, 0).unwrap(); // tag 0 = clock
    let payload = sub_ptr + 16;
    mem.write_u8(payload, wasi_host_core::Clockid::Monotonic as u8).unwrap();
    mem.write_u64(payload + 8, 50_000_000).unwrap(); // 50ms in ns, relative
    mem.write_u64(payload + 16, 0).unwrap(); // precision
    mem.write_u16(payload + 24, 0).unwrap(); // flags: no abstime bit set

    let event_ptr = 256u32;
    let nevents_ptr = 512u32;

    let start = Instant::now();
    let errno = dispatch::poll_oneoff(&ctx, mem, sub_ptr, event_ptr, 1, nevents_ptr);
    let elapsed = start.elapsed();

    assert_eq!(errno, wasi_host_core::SUCCESS);
    assert!(elapsed.as_millis() >= 45, "poll_oneoff returned too early: {elapsed:?}");
    assert_eq!(mem.read_u32(nevents_ptr).unwrap(), 1);

    assert_eq!(mem.read_u64(event_ptr).unwrap(), userdata);
    assert_eq!(mem.read_u16(event_ptr + 8).unwrap(), 0, "error field should be 0 (success)");
    assert_eq!(
        mem.read_u8(event_ptr + 10).unwrap(),
        wasi_host_core::Eventtype::Clock as u8
    );
}
