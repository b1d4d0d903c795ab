//! S1 (spec.md §8): args_sizes_get/args_get round-trip four argv entries.

mod support;

use support::GuestBuffer;
use wasi_host_core::{dispatch, WasiCtxBuilder};

#[test]
fn args_sizes_get_and_args_get_report_four_entries() {
    let ctx = WasiCtxBuilder::new()
        .arg("testApp")
        .arg("arg1")
        .arg("arg22")
        .arg("arg333")
        .build()
        .unwrap();

    let buf = GuestBuffer::new(256);
    let mem = buf.memory();

    let count_ptr = 0;
    let bufsize_ptr = 4;
    let errno = dispatch::args_sizes_get(&ctx, mem, count_ptr, bufsize_ptr);
    assert_eq!(errno, wasi_host_core::SUCCESS);
    assert_eq!(mem.read_u32(count_ptr).unwrap(), 4);
    assert_eq!(mem.read_u32(bufsize_ptr).unwrap(), 30);

    let argv_ptr = 16;
    let strbuf_ptr = 64;
    let errno = dispatch::args_get(&ctx, mem, argv_ptr, strbuf_ptr);
    assert_eq!(errno, wasi_host_core::SUCCESS);

    let expected = ["testApp", "arg1", "arg22", "arg333"];
    for (i, want) in expected.iter().enumerate() {
        let entry_ptr = mem.read_u32(argv_ptr + i as u32 * 4).unwrap();
        assert_eq!(buf.read_cstring(entry_ptr), *want);
    }
}
