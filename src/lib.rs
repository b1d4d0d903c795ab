//! A host-side implementation of the WASI preview-1 syscall surface for
//! WebAssembly guests running inside an editor-integrated runtime. This
//! crate does not run guest code; it provides the imports a guest linked
//! against `wasi_snapshot_preview1` calls into, marshalling every syscall
//! through a uniform pointer/length ABI against the guest's linear memory.
//!
//! [`WasiCtxBuilder`] assembles a [`WasiCtx`] from args, env, stdio streams,
//! and one or more preopened directories (either a [`vfs::ReadOnlySnapshotDriver`]
//! over embedding-supplied assets, or a [`vfs::ReadWritePassthroughDriver`]
//! over an embedding-supplied [`embed::HostFileSystem`]). Once built, the
//! free functions in [`dispatch`] are the crate's entry points: one per
//! `wasi_snapshot_preview1` import, each taking the `WasiCtx`, a
//! [`memory::GuestMemory`] view, and the call's raw ABI arguments.

#![deny(
    // missing_docs,
    trivial_numeric_casts,
    unused_extern_crates,
    unstable_features,
    clippy::use_self
)]
#![warn(unused_import_braces)]

mod clock;
mod ctx;
pub mod dispatch;
mod driver;
mod embed;
mod errno;
mod fdtable;
mod memory;
mod poll;
mod random;
mod stream;
mod thread;
mod types;
pub mod vfs;

pub use clock::{ClockSource, SystemClock};
pub use ctx::{WasiCtx, WasiCtxBuilder, WasiCtxBuilderError};
pub use driver::{Driver, DriverRights};
pub use embed::{
    translate_io_error, AssetSource, CondvarNotifier, HostDirEntry, HostFileSystem, HostMetadata,
    InMemoryAssets, Notifier,
};
pub use errno::{Errno, Result, SUCCESS};
pub use fdtable::{derive_rights, Entry, FdTable};
pub use memory::GuestMemory;
pub use poll::Pollable;
pub use random::{CapRng, RngSource};
pub use stream::{Destroyed, Mode, Stream};
pub use thread::{ThreadSpawner, ThreadTable};
pub use types::*;
