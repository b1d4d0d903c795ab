//! S7 (spec.md §8): a directory of 11 files, read through a 128-byte
//! `fd_readdir` buffer repeatedly, resuming at each call's returned cookie,
//! must enumerate every name exactly once.

mod support;

use std::collections::HashSet;
use support::{in_memory_assets, GuestBuffer};
use wasi_host_core::{dispatch, Oflags, Rights, WasiCtxBuilder};

#[test]
fn readdir_collects_all_entries_across_truncated_pages() {
    let names: Vec<String> = (1..=11).map(|i| format!("test{i}.txt")).collect();
    let files: Vec<(&str, &[u8])> = names.iter().map(|n| (n.as_str(), b"x" as &[u8])).collect();
    let (assets, manifest) = in_memory_assets(&files);

    let ctx = WasiCtxBuilder::new()
        .preopened_readonly("/", assets, manifest)
        .build()
        .unwrap();
    let preopen_fd = ctx.preopens()[0].0;

    let buf = GuestBuffer::new(8192);
    let mem = buf.memory();

    // The preopen fd itself is backed by the mount-composing root driver,
    // which doesn't serve `fd_readdir` directly; open "." through it to
    // get a directory fd backed by the mounted snapshot driver.
    let path_ptr = 1024u32;
    mem.write_bytes(path_ptr, b".").unwrap();
    let dir_fd_ptr = 1536u32;
    let errno = dispatch::path_open(
        &ctx,
        mem,
        preopen_fd,
        0,
        path_ptr,
        1,
        Oflags::DIRECTORY.bits(),
        (Rights::FD_READDIR | Rights::FD_FILESTAT_GET).bits(),
        0,
        0,
        dir_fd_ptr,
    );
    assert_eq!(errno, wasi_host_core::SUCCESS);
    let root_fd = mem.read_u32(dir_fd_ptr).unwrap();

    let dir_buf_ptr = 2048u32;
    let bufused_ptr = 4096u32;
    let mut cookie: u64 = 0;
    let mut seen = HashSet::new();
    let mut iterations = 0;

    loop {
        iterations += 1;
        assert!(iterations < 100, "readdir looped without converging");

        let errno = dispatch::fd_readdir(&ctx, mem, root_fd, dir_buf_ptr, 128, cookie, bufused_ptr);
        assert_eq!(errno, wasi_host_core::SUCCESS);
        let used = mem.read_u32(bufused_ptr).unwrap();
        if used == 0 {
            break;
        }

        let mut cursor = dir_buf_ptr;
        let end = dir_buf_ptr + used;
        let mut last_next = cookie;
        while cursor < end {
            let d_next = mem.read_u64(cursor).unwrap();
            let d_namlen = mem.read_u32(cursor + 16).unwrap();
            let name_ptr = cursor + 24;
            let name = String::from_utf8(buf.read_bytes(name_ptr, d_namlen)).unwrap();
            seen.insert(name);
            last_next = d_next;
            cursor = name_ptr + d_namlen;
        }
        assert!(last_next > cookie, "cookie must advance to avoid an infinite loop");
        cookie = last_next;
    }

    let expected: HashSet<String> = names.into_iter().collect();
    assert_eq!(seen, expected);
}
