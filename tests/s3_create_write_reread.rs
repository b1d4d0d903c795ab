//! S3 (spec.md §8): create a file through `path_open(creat)`, write to it,
//! close, reopen, and read back the same bytes.

mod support;

use std::sync::Arc;
use support::{GuestBuffer, TempFs};
use wasi_host_core::{dispatch, Oflags, Rights, WasiCtxBuilder};

#[test]
fn create_then_write_then_reread() {
    let fs = Arc::new(TempFs::new());
    let ctx = WasiCtxBuilder::new()
        .preopened_readwrite("/", fs, "")
        .build()
        .unwrap();
    let root_fd = ctx.preopens()[0].0;

    let buf = GuestBuffer::new(4096);
    let mem = buf.memory();

    let path = b"x";
    mem.write_bytes(0, path).unwrap();
    let fd_out_ptr = 64;
    let errno = dispatch::path_open(
        &ctx,
        mem,
        root_fd,
        0,
        0,
        path.len() as u32,
        Oflags::CREAT.bits(),
        (Rights::FD_WRITE | Rights::FD_READ | Rights::FD_SEEK).bits(),
        0,
        0,
        fd_out_ptr,
    );
    assert_eq!(errno, wasi_host_core::SUCCESS);
    let fd = mem.read_u32(fd_out_ptr).unwrap();

    let data_ptr = 128;
    buf.memory().write_bytes(data_ptr, b"Hello World").unwrap();
    let iov_ptr = 256;
    mem.write_u32(iov_ptr, data_ptr).unwrap();
    mem.write_u32(iov_ptr + 4, 11).unwrap();
    let nwritten_ptr = 264;
    let errno = dispatch::fd_write(&ctx, mem, fd, iov_ptr, 1, nwritten_ptr);
    assert_eq!(errno, wasi_host_core::SUCCESS);
    assert_eq!(mem.read_u32(nwritten_ptr).unwrap(), 11);

    assert_eq!(dispatch::fd_close(&ctx, mem, fd), wasi_host_core::SUCCESS);

    let fd_out_ptr2 = 320;
    let errno = dispatch::path_open(
        &ctx,
        mem,
        root_fd,
        0,
        0,
        path.len() as u32,
        Oflags::empty().bits(),
        Rights::FD_READ.bits(),
        0,
        0,
        fd_out_ptr2,
    );
    assert_eq!(errno, wasi_host_core::SUCCESS);
    let fd2 = mem.read_u32(fd_out_ptr2).unwrap();

    let read_ptr = 384;
    let iov2_ptr = 448;
    mem.write_u32(iov2_ptr, read_ptr).unwrap();
    mem.write_u32(iov2_ptr + 4, 1024).unwrap();
    let nread_ptr = 456;
    let errno = dispatch::fd_read(&ctx, mem, fd2, iov2_ptr, 1, nread_ptr);
    assert_eq!(errno, wasi_host_core::SUCCESS);
    assert_eq!(mem.read_u32(nread_ptr).unwrap(), 11);
    assert_eq!(buf.read_bytes(read_ptr, 11), b"Hello World");
}
