//! The arena-allocated VFS node tree backing the read-only snapshot driver
//! (spec.md §3 "File/Directory node (VFS snapshot driver)", §9 "Cyclic
//! structures" — "Represent as arena-allocated node indices rather than
//! owning pointers; back-references are plain indices.").

use crate::embed::AssetSource;
use crate::errno::{Errno, Result};
use crate::types::{Filesize, Filetype, Inode, Timestamp};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

enum Kind {
    File {
        /// Full path used to fetch content from the `AssetSource` on first
        /// read; released (set back to `None`) once `refcount` drops to
        /// zero (spec.md Testable Property 4).
        source_path: String,
        content: RwLock<Option<Arc<Vec<u8>>>>,
        size: AtomicU64,
    },
    Directory {
        children: RwLock<HashMap<String, NodeId>>,
    },
}

struct Node {
    parent: Option<NodeId>,
    name: String,
    inode: Inode,
    kind: Kind,
    atim: AtomicU64,
    mtim: AtomicU64,
    ctim: AtomicU64,
    refcount: AtomicU32,
}

fn now_ns() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as Timestamp)
        .unwrap_or(0)
}

/// Owns every node in one mounted snapshot tree. Nodes are never removed
/// from the arena (the read-only driver has no delete operations); a slot
/// index is stable for the arena's lifetime.
pub struct Arena {
    nodes: RwLock<Vec<Node>>,
    next_inode: AtomicU64,
}

impl Arena {
    pub fn new() -> Arc<Self> {
        let arena = Arc::new(Self {
            nodes: RwLock::new(Vec::new()),
            next_inode: AtomicU64::new(1),
        });
        let root_inode = arena.alloc_inode();
        arena.nodes.write().push(Node {
            parent: None,
            name: String::new(),
            inode: root_inode,
            kind: Kind::Directory {
                children: RwLock::new(HashMap::new()),
            },
            atim: AtomicU64::new(now_ns()),
            mtim: AtomicU64::new(now_ns()),
            ctim: AtomicU64::new(now_ns()),
            refcount: AtomicU32::new(0),
        });
        arena
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn alloc_inode(&self) -> Inode {
        self.next_inode.fetch_add(1, Ordering::Relaxed)
    }

    /// Builds the tree for a manifest of `(path, size)` pairs, eagerly
    /// creating directories along the way. Content is never read here;
    /// it's fetched lazily through the `AssetSource` on first `pread`.
    pub fn populate(&self, entries: &[(&str, Filesize)]) {
        for (path, size) in entries {
            let components = crate::vfs::path::normalize_components(path);
            if components.is_empty() {
                continue;
            }
            let (dirs, file_name) = components.split_at(components.len() - 1);
            let dir = self.mkdirs(self.root(), dirs);
            self.add_file(dir, &file_name[0], path, *size);
        }
    }

    fn mkdirs(&self, mut at: NodeId, components: &[String]) -> NodeId {
        for name in components {
            at = self.ensure_dir_child(at, name);
        }
        at
    }

    fn ensure_dir_child(&self, parent: NodeId, name: &str) -> NodeId {
        {
            let nodes = self.nodes.read();
            if let Kind::Directory { children } = &nodes[parent.0 as usize].kind {
                if let Some(&id) = children.read().get(name) {
                    return id;
                }
            }
        }
        let inode = self.alloc_inode();
        let mut nodes = self.nodes.write();
        let id = NodeId(nodes.len() as u32);
        nodes.push(Node {
            parent: Some(parent),
            name: name.to_string(),
            inode,
            kind: Kind::Directory {
                children: RwLock::new(HashMap::new()),
            },
            atim: AtomicU64::new(now_ns()),
            mtim: AtomicU64::new(now_ns()),
            ctim: AtomicU64::new(now_ns()),
            refcount: AtomicU32::new(0),
        });
        if let Kind::Directory { children } = &nodes[parent.0 as usize].kind {
            children.write().insert(name.to_string(), id);
        }
        id
    }

    fn add_file(&self, parent: NodeId, name: &str, source_path: &str, size: Filesize) -> NodeId {
        let inode = self.alloc_inode();
        let mut nodes = self.nodes.write();
        let id = NodeId(nodes.len() as u32);
        nodes.push(Node {
            parent: Some(parent),
            name: name.to_string(),
            inode,
            kind: Kind::File {
                source_path: source_path.to_string(),
                content: RwLock::new(None),
                size: AtomicU64::new(size),
            },
            atim: AtomicU64::new(now_ns()),
            mtim: AtomicU64::new(now_ns()),
            ctim: AtomicU64::new(now_ns()),
            refcount: AtomicU32::new(0),
        });
        if let Kind::Directory { children } = &nodes[parent.0 as usize].kind {
            children.write().insert(name.to_string(), id);
        }
        id
    }

    pub fn lookup(&self, from: NodeId, path: &str) -> Result<NodeId> {
        let components = crate::vfs::path::normalize_components(path);
        let mut at = from;
        for name in &components {
            at = self.child(at, name)?;
        }
        Ok(at)
    }

    fn child(&self, dir: NodeId, name: &str) -> Result<NodeId> {
        let nodes = self.nodes.read();
        match &nodes[dir.0 as usize].kind {
            Kind::Directory { children } => {
                children.read().get(name).copied().ok_or(Errno::Noent)
            }
            Kind::File { .. } => Err(Errno::Notdir),
        }
    }

    pub fn is_directory(&self, id: NodeId) -> bool {
        matches!(self.nodes.read()[id.0 as usize].kind, Kind::Directory { .. })
    }

    pub fn file_type(&self, id: NodeId) -> Filetype {
        if self.is_directory(id) {
            Filetype::Directory
        } else {
            Filetype::RegularFile
        }
    }

    pub fn inode(&self, id: NodeId) -> Inode {
        self.nodes.read()[id.0 as usize].inode
    }

    pub fn size(&self, id: NodeId) -> Filesize {
        match &self.nodes.read()[id.0 as usize].kind {
            Kind::File { size, .. } => size.load(Ordering::Relaxed),
            Kind::Directory { .. } => 0,
        }
    }

    pub fn times(&self, id: NodeId) -> (Timestamp, Timestamp, Timestamp) {
        let nodes = self.nodes.read();
        let n = &nodes[id.0 as usize];
        (
            n.atim.load(Ordering::Relaxed),
            n.mtim.load(Ordering::Relaxed),
            n.ctim.load(Ordering::Relaxed),
        )
    }

    pub fn touch_atim(&self, id: NodeId) {
        self.nodes.read()[id.0 as usize]
            .atim
            .store(now_ns(), Ordering::Relaxed);
    }

    pub fn incref(&self, id: NodeId) {
        self.nodes.read()[id.0 as usize]
            .refcount
            .fetch_add(1, Ordering::AcqRel);
    }

    /// Decrements the node's live-fd refcount; releases the cached content
    /// blob once it reaches zero (spec.md Testable Property 4).
    pub fn decref(&self, id: NodeId) {
        let nodes = self.nodes.read();
        let node = &nodes[id.0 as usize];
        if node.refcount.fetch_sub(1, Ordering::AcqRel) == 1 {
            if let Kind::File { content, .. } = &node.kind {
                *content.write() = None;
            }
        }
    }

    pub fn name(&self, id: NodeId) -> String {
        self.nodes.read()[id.0 as usize].name.clone()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.read()[id.0 as usize].parent
    }

    pub fn children(&self, id: NodeId) -> Result<Vec<(String, NodeId)>> {
        let nodes = self.nodes.read();
        match &nodes[id.0 as usize].kind {
            Kind::Directory { children } => {
                let mut v: Vec<_> = children
                    .read()
                    .iter()
                    .map(|(k, v)| (k.clone(), *v))
                    .collect();
                v.sort_by(|a, b| a.0.cmp(&b.0));
                Ok(v)
            }
            Kind::File { .. } => Err(Errno::Notdir),
        }
    }

    /// Reads `len` bytes at `offset` from a file node, fetching and caching
    /// the full blob from `backend` on first access.
    pub fn pread(
        &self,
        id: NodeId,
        backend: &dyn AssetSource,
        buf: &mut [u8],
        offset: u64,
    ) -> Result<usize> {
        let nodes = self.nodes.read();
        let (source_path, content_lock) = match &nodes[id.0 as usize].kind {
            Kind::File {
                source_path,
                content,
                ..
            } => (source_path.clone(), content),
            Kind::Directory { .. } => return Err(Errno::Isdir),
        };

        {
            let cached = content_lock.read();
            if let Some(bytes) = cached.as_ref() {
                return Ok(copy_from(bytes, buf, offset));
            }
        }

        let fetched = backend
            .read_asset(&source_path)
            .map_err(|e| crate::errno::from_io_error(&e))?;
        let arc = Arc::new(fetched);
        let n = copy_from(&arc, buf, offset);
        *content_lock.write() = Some(arc);
        Ok(n)
    }
}

fn copy_from(bytes: &[u8], buf: &mut [u8], offset: u64) -> usize {
    let offset = offset as usize;
    if offset >= bytes.len() {
        return 0;
    }
    let avail = &bytes[offset..];
    let n = avail.len().min(buf.len());
    buf[..n].copy_from_slice(&avail[..n]);
    n
}
