//! Regression coverage for a preopen mounted somewhere other than the
//! guest-namespace root, and for two preopens mounted side by side. Every
//! other scenario test mounts exclusively at `"/"`, where a preopen's own
//! prefix degenerates to a no-op and can't catch a driver that forgets
//! paths are resolved relative to the dirfd they're opened through rather
//! than the mount's own prefix.

mod support;

use support::{in_memory_assets, GuestBuffer};
use wasi_host_core::{dispatch, Oflags, Rights, WasiCtxBuilder};

#[test]
fn relative_open_succeeds_through_a_non_root_preopen() {
    let (assets, manifest) = in_memory_assets(&[("hello.txt", b"hi")]);
    let ctx = WasiCtxBuilder::new()
        .preopened_readonly("/project", assets, manifest)
        .build()
        .unwrap();
    let project_fd = ctx.preopens()[0].0;
    assert_eq!(ctx.preopens()[0].1, "/project");

    let buf = GuestBuffer::new(4096);
    let mem = buf.memory();

    let path = b"hello.txt";
    let path_ptr = 0u32;
    mem.write_bytes(path_ptr, path).unwrap();

    let fd_out_ptr = 64;
    let errno = dispatch::path_open(
        &ctx,
        mem,
        project_fd,
        0,
        path_ptr,
        path.len() as u32,
        Oflags::empty().bits(),
        (Rights::FD_READ | Rights::FD_FILESTAT_GET).bits(),
        0,
        0,
        fd_out_ptr,
    );
    assert_eq!(
        errno,
        wasi_host_core::SUCCESS,
        "a path opened relative to its own preopen's dirfd must not need the mount's own prefix in front of it"
    );
}

#[test]
fn two_preopens_each_resolve_only_their_own_subtree() {
    let (project_assets, project_manifest) = in_memory_assets(&[("hello.txt", b"project")]);
    let (lib_assets, lib_manifest) = in_memory_assets(&[("util.txt", b"lib")]);
    let ctx = WasiCtxBuilder::new()
        .preopened_readonly("/project", project_assets, project_manifest)
        .preopened_readonly("/lib", lib_assets, lib_manifest)
        .build()
        .unwrap();

    let preopens = ctx.preopens();
    assert_eq!(preopens.len(), 2);
    let project_fd = preopens.iter().find(|(_, p)| p == "/project").unwrap().0;
    let lib_fd = preopens.iter().find(|(_, p)| p == "/lib").unwrap().0;

    let buf = GuestBuffer::new(4096);
    let mem = buf.memory();

    let open = |fd: u32, name: &[u8]| {
        let path_ptr = 1024u32;
        mem.write_bytes(path_ptr, name).unwrap();
        let fd_out_ptr = 2048u32;
        let errno = dispatch::path_open(
            &ctx,
            mem,
            fd,
            0,
            path_ptr,
            name.len() as u32,
            Oflags::empty().bits(),
            Rights::FD_READ.bits(),
            0,
            0,
            fd_out_ptr,
        );
        (errno, mem.read_u32(fd_out_ptr).unwrap())
    };

    let (errno, _) = open(project_fd, b"hello.txt");
    assert_eq!(errno, wasi_host_core::SUCCESS);

    let (errno, _) = open(lib_fd, b"util.txt");
    assert_eq!(errno, wasi_host_core::SUCCESS);

    // Each preopen must only see its own mounted subtree, not the other
    // preopen's files, even though both were registered on the same
    // builder and neither driver shares state with the other's clone.
    let (errno, _) = open(project_fd, b"util.txt");
    assert_eq!(errno, wasi_host_core::Errno::Noent as u16);

    let (errno, _) = open(lib_fd, b"hello.txt");
    assert_eq!(errno, wasi_host_core::Errno::Noent as u16);
}
