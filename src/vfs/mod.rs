//! Virtual filesystem: device-driver variants and the mount table that
//! composes them (spec.md §4.4 "Device drivers / VFS", the largest single
//! component in this crate).

pub mod node;
pub mod path;
pub mod readonly;
pub mod readwrite;
pub mod root;
pub mod stdio;

pub use node::{Arena, NodeId};
pub use readonly::ReadOnlySnapshotDriver;
pub use readwrite::ReadWritePassthroughDriver;
pub use root::RootDriver;
pub use stdio::CharDriver;
