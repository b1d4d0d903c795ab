//! Process-wide WASI context (spec.md §6 "Embedding interface", SPEC_FULL.md
//! §C "Configuration"). `WasiCtxBuilder` is kept from the teacher almost
//! verbatim in shape: a builder gathering args/env/preopens/stdio, producing
//! an immutable `WasiCtx` whose only interior-mutable part is the fd table.

use crate::clock::{ClockSource, SystemClock};
use crate::driver::Driver;
use crate::embed::{AssetSource, HostFileSystem, Notifier};
use crate::fdtable::{derive_rights, Entry, FdTable};
use crate::random::{CapRng, RngSource};
use crate::stream::Stream;
use crate::thread::ThreadTable;
use crate::types::{Fd, Fdflags, Filetype, Rights, RightsExt};
use crate::vfs::{CharDriver, ReadOnlySnapshotDriver, ReadWritePassthroughDriver};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while *configuring* a `WasiCtx`, never while a guest is
/// running. These never surface as an `Errno` — they're a Rust `Result`
/// returned to the embedding at `build()` time.
#[derive(Debug, Error)]
pub enum WasiCtxBuilderError {
    #[error("argument is not valid UTF-8: {0:?}")]
    InvalidArgument(Vec<u8>),
    #[error("environment variable is not valid UTF-8: {0:?}")]
    InvalidEnvironmentVariable(Vec<u8>),
    #[error("too many preopened directories")]
    TooManyPreopens,
    #[error("no such asset path for read-only preopen: {0}")]
    MissingAsset(String),
}

type Result<T> = std::result::Result<T, WasiCtxBuilderError>;

enum PendingPreopen {
    ReadOnly {
        guest_path: String,
        assets: Arc<dyn AssetSource>,
        manifest: Vec<(String, u64)>,
    },
    ReadWrite {
        guest_path: String,
        fs: Arc<dyn HostFileSystem>,
        host_root: String,
    },
}

/// Gathers the pieces of a guest process's environment before committing
/// them to an immutable [`WasiCtx`].
pub struct WasiCtxBuilder {
    args: Vec<String>,
    env: Vec<(String, String)>,
    stdin: Option<Arc<Stream>>,
    stdout: Option<Arc<Stream>>,
    stderr: Option<Arc<Stream>>,
    preopens: Vec<PendingPreopen>,
    clock: Arc<dyn ClockSource>,
    rng: Arc<dyn RngSource>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl WasiCtxBuilder {
    pub fn new() -> Self {
        Self {
            args: Vec::new(),
            env: Vec::new(),
            stdin: None,
            stdout: None,
            stderr: None,
            preopens: Vec::new(),
            clock: Arc::new(SystemClock::default()),
            rng: Arc::new(CapRng::default()),
            notifier: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I: IntoIterator<Item = S>, S: Into<String>>(mut self, args: I) -> Self {
        for a in args {
            self.args.push(a.into());
        }
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn envs<I, K, V>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in envs {
            self.env.push((k.into(), v.into()));
        }
        self
    }

    pub fn stdin(mut self, stream: Arc<Stream>) -> Self {
        self.stdin = Some(stream);
        self
    }

    pub fn stdout(mut self, stream: Arc<Stream>) -> Self {
        self.stdout = Some(stream);
        self
    }

    pub fn stderr(mut self, stream: Arc<Stream>) -> Self {
        self.stderr = Some(stream);
        self
    }

    /// Mounts a read-only snapshot of `manifest` (path, size pairs), served
    /// lazily from `assets`, at `guest_path` (spec.md §4.4 "Read-only
    /// snapshot driver").
    pub fn preopened_readonly(
        mut self,
        guest_path: impl Into<String>,
        assets: Arc<dyn AssetSource>,
        manifest: Vec<(String, u64)>,
    ) -> Self {
        self.preopens.push(PendingPreopen::ReadOnly {
            guest_path: guest_path.into(),
            assets,
            manifest,
        });
        self
    }

    /// Mounts a read-write passthrough directory backed by the embedding's
    /// `HostFileSystem`, rooted at `host_root`, at `guest_path` (spec.md
    /// §4.4 "Read-write passthrough driver").
    pub fn preopened_readwrite(
        mut self,
        guest_path: impl Into<String>,
        fs: Arc<dyn HostFileSystem>,
        host_root: impl Into<String>,
    ) -> Self {
        self.preopens.push(PendingPreopen::ReadWrite {
            guest_path: guest_path.into(),
            fs,
            host_root: host_root.into(),
        });
        self
    }

    pub fn clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.clock = clock;
        self
    }

    pub fn rng(mut self, rng: Arc<dyn RngSource>) -> Self {
        self.rng = rng;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn build(self) -> Result<WasiCtx> {
        tracing::debug!(
            args = self.args.len(),
            env = self.env.len(),
            preopens = self.preopens.len(),
            "building WasiCtx"
        );
        if self.preopens.len() > u32::MAX as usize - 3 {
            return Err(WasiCtxBuilderError::TooManyPreopens);
        }

        let fds = FdTable::new();
        let stdin = self.stdin.unwrap_or_else(|| Arc::new(Stream::new()));
        let stdout = self.stdout.unwrap_or_else(|| Arc::new(Stream::new()));
        let stderr = self.stderr.unwrap_or_else(|| Arc::new(Stream::new()));

        insert_stdio(&fds, 0, stdin, true, false);
        insert_stdio(&fds, 1, stdout, false, true);
        insert_stdio(&fds, 2, stderr, false, true);

        // Each preopen gets its own driver clone, scoped to exactly the
        // subtree that was mounted for it. A guest resolves every path it
        // opens through a preopen fd *relative to that fd's own root*
        // (spec.md §4.4 `path_open`'s dirfd-relative resolution); wiring
        // every preopen to a shared clone of a merged mount table would
        // make a perfectly ordinary relative `path_open("hello.txt")` miss
        // because the shared driver still expects the mount's own prefix
        // ("/project/hello.txt") in front of it.
        for pending in &self.preopens {
            let (guest_path, driver): (&str, Arc<dyn Driver>) = match pending {
                PendingPreopen::ReadOnly {
                    guest_path,
                    assets,
                    manifest,
                } => {
                    let arena = crate::vfs::node::Arena::new();
                    let refs: Vec<(&str, u64)> =
                        manifest.iter().map(|(p, s)| (p.as_str(), *s)).collect();
                    arena.populate(&refs);
                    let root_node = arena.root();
                    let driver: Arc<dyn Driver> =
                        ReadOnlySnapshotDriver::new(arena, Arc::clone(assets), root_node);
                    (guest_path.as_str(), driver)
                }
                PendingPreopen::ReadWrite {
                    guest_path,
                    fs,
                    host_root,
                } => {
                    let driver: Arc<dyn Driver> = ReadWritePassthroughDriver::new(
                        Arc::clone(fs),
                        host_root.clone(),
                        true,
                    );
                    (guest_path.as_str(), driver)
                }
            };
            let rights_base = Rights::directory_base();
            let rights_inheriting = Rights::directory_inheriting();
            fds.insert(Entry {
                driver: driver
                    .try_clone()
                    .map_err(|_| WasiCtxBuilderError::TooManyPreopens)?,
                rights_base,
                rights_inheriting,
                fdflags: Fdflags::empty(),
                inode: 0,
                preopen_path: Some(guest_path.to_string()),
            });
        }

        Ok(WasiCtx {
            args: self.args,
            env: self.env,
            fds,
            threads: ThreadTable::new(),
            clock: self.clock,
            rng: self.rng,
            notifier: self
                .notifier
                .unwrap_or_else(|| Arc::new(crate::embed::CondvarNotifier::default())),
        })
    }
}

impl Default for WasiCtxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn insert_stdio(fds: &FdTable, fd: Fd, stream: Arc<Stream>, readable: bool, writable: bool) {
    let driver = CharDriver::new(stream, readable, writable);
    let (rights_base, rights_inheriting) = derive_rights(
        Rights::all(),
        Rights::all(),
        Rights::empty(),
        Filetype::CharacterDevice,
    );
    fds.insert_at(
        fd,
        Entry {
            driver: Box::new(driver),
            rights_base,
            rights_inheriting,
            fdflags: Fdflags::empty(),
            inode: 0,
            preopen_path: None,
        },
    );
}

/// The live, per-guest-process WASI state: the args/env snapshot taken at
/// build time, the fd table (the only interior-mutable part), and the
/// clock/rng/notifier seams an embedding may have substituted.
pub struct WasiCtx {
    args: Vec<String>,
    env: Vec<(String, String)>,
    pub(crate) fds: FdTable,
    pub(crate) threads: ThreadTable,
    pub(crate) clock: Arc<dyn ClockSource>,
    pub(crate) rng: Arc<dyn RngSource>,
    pub(crate) notifier: Arc<dyn Notifier>,
}

impl WasiCtx {
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    pub fn preopens(&self) -> Vec<(Fd, String)> {
        self.fds.preopens()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_installs_stdio_at_fds_zero_one_two() {
        let ctx = WasiCtxBuilder::new().build().unwrap();
        assert!(ctx.fds.with(0, |_| Ok(())).is_ok());
        assert!(ctx.fds.with(1, |_| Ok(())).is_ok());
        assert!(ctx.fds.with(2, |_| Ok(())).is_ok());
    }

    #[test]
    fn args_and_env_are_preserved() {
        let ctx = WasiCtxBuilder::new()
            .arg("prog")
            .arg("--flag")
            .env("KEY", "value")
            .build()
            .unwrap();
        assert_eq!(ctx.args(), &["prog".to_string(), "--flag".to_string()]);
        assert_eq!(ctx.env(), &[("KEY".to_string(), "value".to_string())]);
    }

    #[test]
    fn readonly_preopen_is_mounted_and_listed() {
        let mut files = std::collections::HashMap::new();
        files.insert("a.txt".to_string(), b"hi".to_vec());
        let assets: Arc<dyn AssetSource> = Arc::new(crate::embed::InMemoryAssets::new(files));
        let ctx = WasiCtxBuilder::new()
            .preopened_readonly("/project", assets, vec![("a.txt".to_string(), 2)])
            .build()
            .unwrap();
        let preopens = ctx.preopens();
        assert_eq!(preopens.len(), 1);
        assert_eq!(preopens[0].1, "/project");
    }
}
