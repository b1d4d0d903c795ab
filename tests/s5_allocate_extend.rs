//! S5 (spec.md §8): `fd_allocate` past the current end of file zero-fills
//! the extension.

mod support;

use std::sync::Arc;
use support::{seed_file, GuestBuffer, TempFs};
use wasi_host_core::{dispatch, Oflags, Rights, WasiCtxBuilder};

#[test]
fn allocate_extends_and_zero_fills() {
    let fs = TempFs::new();
    seed_file(fs.dir_path(), "b", b"Hello World");
    let ctx = WasiCtxBuilder::new()
        .preopened_readwrite("/", Arc::new(fs), "")
        .build()
        .unwrap();
    let root_fd = ctx.preopens()[0].0;

    let buf = GuestBuffer::new(4096);
    let mem = buf.memory();

    let path = b"b";
    mem.write_bytes(0, path).unwrap();
    let fd_out_ptr = 64;
    let errno = dispatch::path_open(
        &ctx,
        mem,
        root_fd,
        0,
        0,
        path.len() as u32,
        Oflags::empty().bits(),
        (Rights::FD_READ | Rights::FD_ALLOCATE | Rights::FD_SEEK).bits(),
        0,
        0,
        fd_out_ptr,
    );
    assert_eq!(errno, wasi_host_core::SUCCESS);
    let fd = mem.read_u32(fd_out_ptr).unwrap();

    let errno = dispatch::fd_allocate(&ctx, mem, fd, 11, 7);
    assert_eq!(errno, wasi_host_core::SUCCESS);

    let read_ptr = 256;
    let iov_ptr = 384;
    mem.write_u32(iov_ptr, read_ptr).unwrap();
    mem.write_u32(iov_ptr + 4, 1024).unwrap();
    let nread_ptr = 392;
    let errno = dispatch::fd_read(&ctx, mem, fd, iov_ptr, 1, nread_ptr);
    assert_eq!(errno, wasi_host_core::SUCCESS);
    assert_eq!(mem.read_u32(nread_ptr).unwrap(), 18);
    let bytes = buf.read_bytes(read_ptr, 18);
    assert_eq!(&bytes[..11], b"Hello World");
    assert_eq!(&bytes[11..], &[0u8; 7]);
}
