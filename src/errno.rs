//! The flat preview-1 errno enumeration (spec.md §7) and the `Result` alias
//! every driver and dispatcher method returns.

/// A WASI preview-1 error code. `0` (`Success`) is never constructed by this
/// type; syscalls that succeed return `Ok(())` and the dispatcher encodes
/// that as `0` at the ABI boundary.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, thiserror::Error)]
#[repr(u16)]
pub enum Errno {
    #[error("argument list too long")]
    TooBig = 1,
    #[error("permission denied")]
    Acces = 2,
    #[error("address in use")]
    Addrinuse = 3,
    #[error("address not available")]
    Addrnotavail = 4,
    #[error("address family not supported")]
    Afnosupport = 5,
    #[error("resource unavailable, try again")]
    Again = 6,
    #[error("connection already in progress")]
    Already = 7,
    #[error("bad file descriptor")]
    Badf = 8,
    #[error("bad message")]
    Badmsg = 9,
    #[error("device or resource busy")]
    Busy = 10,
    #[error("operation canceled")]
    Canceled = 11,
    #[error("no child processes")]
    Child = 12,
    #[error("connection aborted")]
    Connaborted = 13,
    #[error("connection refused")]
    Connrefused = 14,
    #[error("connection reset")]
    Connreset = 15,
    #[error("resource deadlock would occur")]
    Deadlk = 16,
    #[error("destination address required")]
    Destaddrreq = 17,
    #[error("mathematics argument out of domain of function")]
    Dom = 18,
    #[error("reserved")]
    Dquot = 19,
    #[error("file exists")]
    Exist = 20,
    #[error("bad address")]
    Fault = 21,
    #[error("file too large")]
    Fbig = 22,
    #[error("host is unreachable")]
    Hostunreach = 23,
    #[error("identifier removed")]
    Idrm = 24,
    #[error("illegal byte sequence")]
    Ilseq = 25,
    #[error("operation in progress")]
    Inprogress = 26,
    #[error("interrupted function")]
    Intr = 27,
    #[error("invalid argument")]
    Inval = 28,
    #[error("I/O error")]
    Io = 29,
    #[error("socket is connected")]
    Isconn = 30,
    #[error("is a directory")]
    Isdir = 31,
    #[error("too many levels of symbolic links")]
    Loop = 32,
    #[error("file descriptor value too large")]
    Mfile = 33,
    #[error("too many links")]
    Mlink = 34,
    #[error("message too large")]
    Msgsize = 35,
    #[error("reserved")]
    Multihop = 36,
    #[error("filename too long")]
    Nametoolong = 37,
    #[error("network is down")]
    Netdown = 38,
    #[error("connection aborted by network")]
    Netreset = 39,
    #[error("network unreachable")]
    Netunreach = 40,
    #[error("too many files open in system")]
    Nfile = 41,
    #[error("no buffer space available")]
    Nobufs = 42,
    #[error("no such device")]
    Nodev = 43,
    #[error("no such file or directory")]
    Noent = 44,
    #[error("executable file format error")]
    Noexec = 45,
    #[error("no locks available")]
    Nolck = 46,
    #[error("reserved")]
    Nolink = 47,
    #[error("not enough space")]
    Nomem = 48,
    #[error("no message of the desired type")]
    Nomsg = 49,
    #[error("protocol not available")]
    Noprotoopt = 50,
    #[error("no space left on device")]
    Nospc = 51,
    #[error("function not supported")]
    Nosys = 52,
    #[error("the socket is not connected")]
    Notconn = 53,
    #[error("not a directory or a symbolic link to a directory")]
    Notdir = 54,
    #[error("directory not empty")]
    Notempty = 55,
    #[error("state not recoverable")]
    Notrecoverable = 56,
    #[error("not a socket")]
    Notsock = 57,
    #[error("not supported, or operation not supported on socket")]
    Notsup = 58,
    #[error("inappropriate I/O control operation")]
    Notty = 59,
    #[error("no such device or address")]
    Nxio = 60,
    #[error("value too large to be stored in data type")]
    Overflow = 61,
    #[error("operation not permitted")]
    Perm = 62,
    #[error("broken pipe")]
    Pipe = 63,
    #[error("protocol error")]
    Proto = 64,
    #[error("protocol not supported")]
    Protonosupport = 65,
    #[error("protocol wrong type for socket")]
    Prototype = 66,
    #[error("result too large")]
    Range = 67,
    #[error("read-only file system")]
    Rofs = 68,
    #[error("invalid seek")]
    Spipe = 69,
    #[error("no such process")]
    Srch = 70,
    #[error("reserved")]
    Stale = 71,
    #[error("connection timed out")]
    Timedout = 72,
    #[error("text file busy")]
    Txtbsy = 73,
    #[error("cross-device link")]
    Xdev = 74,
    #[error("extension: capabilities insufficient")]
    Notcapable = 75,
}

impl Errno {
    /// The numeric code written back to the guest as a syscall's return value.
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// `0` on the wire; the success case is represented as `Ok(())` everywhere
/// inside the host and only flattened to a `u16` at the dispatcher boundary.
pub const SUCCESS: u16 = 0;

pub type Result<T, E = Errno> = std::result::Result<T, E>;

impl From<std::num::TryFromIntError> for Errno {
    fn from(_: std::num::TryFromIntError) -> Self {
        Errno::Overflow
    }
}

impl From<std::string::FromUtf8Error> for Errno {
    fn from(_: std::string::FromUtf8Error) -> Self {
        Errno::Ilseq
    }
}

impl From<std::str::Utf8Error> for Errno {
    fn from(_: std::str::Utf8Error) -> Self {
        Errno::Ilseq
    }
}

/// Translate an opaque error coming out of the embedding's host filesystem
/// abstraction (or any other uncaught host-side failure) into the nearest
/// WASI errno, per spec.md §4.4 "Failure semantics" and §7 "Propagation".
/// Anything the host doesn't recognize becomes `Errno::Io`, never a trap.
pub fn from_io_error(err: &std::io::Error) -> Errno {
    use std::io::ErrorKind::*;
    match err.kind() {
        NotFound => Errno::Noent,
        PermissionDenied => Errno::Acces,
        AlreadyExists => Errno::Exist,
        InvalidInput | InvalidData => Errno::Inval,
        WouldBlock => Errno::Again,
        TimedOut => Errno::Timedout,
        Interrupted => Errno::Intr,
        UnexpectedEof => Errno::Io,
        _ => {
            if let Some(code) = err.raw_os_error() {
                from_raw_os_error(code)
            } else {
                log::debug!("unclassified host I/O error: {}", err);
                Errno::Io
            }
        }
    }
}

#[cfg(unix)]
fn from_raw_os_error(code: i32) -> Errno {
    match code {
        libc::EPERM => Errno::Perm,
        libc::ENOENT => Errno::Noent,
        libc::ESRCH => Errno::Srch,
        libc::EINTR => Errno::Intr,
        libc::EIO => Errno::Io,
        libc::ENXIO => Errno::Nxio,
        libc::E2BIG => Errno::TooBig,
        libc::ENOEXEC => Errno::Noexec,
        libc::EBADF => Errno::Badf,
        libc::ECHILD => Errno::Child,
        libc::EAGAIN => Errno::Again,
        libc::ENOMEM => Errno::Nomem,
        libc::EACCES => Errno::Acces,
        libc::EFAULT => Errno::Fault,
        libc::EBUSY => Errno::Busy,
        libc::EEXIST => Errno::Exist,
        libc::EXDEV => Errno::Xdev,
        libc::ENODEV => Errno::Nodev,
        libc::ENOTDIR => Errno::Notdir,
        libc::EISDIR => Errno::Isdir,
        libc::EINVAL => Errno::Inval,
        libc::ENFILE => Errno::Nfile,
        libc::EMFILE => Errno::Mfile,
        libc::ENOTTY => Errno::Notty,
        libc::ETXTBSY => Errno::Txtbsy,
        libc::EFBIG => Errno::Fbig,
        libc::ENOSPC => Errno::Nospc,
        libc::ESPIPE => Errno::Spipe,
        libc::EROFS => Errno::Rofs,
        libc::EMLINK => Errno::Mlink,
        libc::EPIPE => Errno::Pipe,
        libc::ENAMETOOLONG => Errno::Nametoolong,
        libc::ENOTEMPTY => Errno::Notempty,
        libc::ELOOP => Errno::Loop,
        x => {
            log::debug!("unmapped raw os error: {}", x);
            Errno::Io
        }
    }
}

#[cfg(not(unix))]
fn from_raw_os_error(_code: i32) -> Errno {
    Errno::Io
}
