//! S2 (spec.md §8): open a read-only-mounted file, stat it, and read its
//! full contents through one iovec.

mod support;

use support::{in_memory_assets, GuestBuffer};
use wasi_host_core::{dispatch, Filetype, Oflags, Rights, WasiCtxBuilder};

#[test]
fn open_stat_and_read_helloworld() {
    let (assets, manifest) = in_memory_assets(&[("fixture/read/helloWorld.txt", b"Hello World")]);
    let ctx = WasiCtxBuilder::new()
        .preopened_readonly("/", assets, manifest)
        .build()
        .unwrap();

    let root_fd = ctx.preopens()[0].0;

    let buf = GuestBuffer::new(4096);
    let mem = buf.memory();

    let path = b"fixture/read/helloWorld.txt";
    let path_ptr = 0u32;
    mem.write_bytes(path_ptr, path).unwrap();

    let fd_out_ptr = 64;
    let errno = dispatch::path_open(
        &ctx,
        mem,
        root_fd,
        0,
        path_ptr,
        path.len() as u32,
        Oflags::empty().bits(),
        (Rights::FD_READ | Rights::FD_SEEK | Rights::FD_FILESTAT_GET).bits(),
        0,
        0,
        fd_out_ptr,
    );
    assert_eq!(errno, wasi_host_core::SUCCESS);
    let fd = mem.read_u32(fd_out_ptr).unwrap();
    assert_eq!(fd, 4, "first fd allocated past stdio (0-2) and the preopen root (3)");

    let stat_ptr = 128;
    let errno = dispatch::fd_filestat_get(&ctx, mem, fd, stat_ptr);
    assert_eq!(errno, wasi_host_core::SUCCESS);
    assert_eq!(mem.read_u8(stat_ptr + 16).unwrap(), Filetype::RegularFile as u8);
    assert_eq!(mem.read_u64(stat_ptr + 32).unwrap(), 11);
    assert_eq!(mem.read_u64(stat_ptr + 24).unwrap(), 1);

    let data_ptr = 256;
    let iov_ptr = 512;
    mem.write_u32(iov_ptr, data_ptr).unwrap();
    mem.write_u32(iov_ptr + 4, 1024).unwrap();

    let nread_ptr = 520;
    let errno = dispatch::fd_read(&ctx, mem, fd, iov_ptr, 1, nread_ptr);
    assert_eq!(errno, wasi_host_core::SUCCESS);
    assert_eq!(mem.read_u32(nread_ptr).unwrap(), 11);
    assert_eq!(buf.read_bytes(data_ptr, 11), b"Hello World");
}
