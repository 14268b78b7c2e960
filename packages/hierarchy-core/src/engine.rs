use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use crate::closure::{attach_to_parent, is_ancestor, rebuild_subtree, remove_subtree, require_node};
use crate::config::HierarchyConfig;
use crate::error::{Error, Result};
use crate::ids::Node;
use crate::traits::{Backend, NodeLookup, NodeStore, RelationshipIndex, RelationshipLookup, UnitOfWork};
use crate::validate::check_closure;

fn validate_name(name: &str) -> Result<&str> {
    if name.trim().is_empty() {
        return Err(Error::InvalidName("name can not be empty".into()));
    }
    Ok(name)
}

/// Stateless orchestrator maintaining a closure table over a [`Backend`].
///
/// Every mutation runs in exactly one unit of work: it either commits in full or leaves
/// both stores untouched.
pub struct HierarchyEngine<B: Backend> {
    backend: B,
    config: HierarchyConfig,
}

impl<B: Backend> HierarchyEngine<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, HierarchyConfig::default())
    }

    pub fn with_config(backend: B, config: HierarchyConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &HierarchyConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Create the configured root node unless it already exists.
    ///
    /// Fails with `InconsistentState` when the store holds nodes but not the root, since a
    /// second parentless node would split the tree.
    pub fn ensure_root(&mut self) -> Result<Node> {
        let root_name = validate_name(&self.config.root_name)?;
        let mut uow = self.backend.begin()?;
        if let Some(root) = uow.find_by_name(root_name)? {
            return Ok(root);
        }
        if !uow.all_nodes()?.is_empty() {
            return Err(Error::InconsistentState(format!(
                "store is populated but root '{root_name}' is missing"
            )));
        }
        let root = uow.create(root_name)?;
        uow.commit()?;
        info!(root = %root.name, "created root node");
        Ok(root)
    }

    /// Insert `child_name` as a new immediate child of `parent_name`.
    pub fn add_child(&mut self, parent_name: &str, child_name: &str) -> Result<Node> {
        info!(parent = parent_name, child = child_name, "adding child node");
        let child_name = validate_name(child_name)?;

        let mut uow = self.backend.begin()?;
        let parent = require_node(&uow, parent_name)?;
        if uow.find_by_name(child_name)?.is_some() {
            debug!(child = child_name, "child name already taken");
            return Err(Error::already_exists(child_name));
        }
        let child = uow.create(child_name)?;
        let rows = attach_to_parent(&mut uow, &child, &parent)?;
        uow.commit()?;

        info!(parent = %parent.name, child = %child.name, rows, "added child node");
        Ok(child)
    }

    /// Remove `child_name` and its whole subtree, detaching it from `parent_name`.
    ///
    /// The two nodes need not be directly related; the direct edge delete is then a no-op.
    pub fn delete_subtree(&mut self, parent_name: &str, child_name: &str) -> Result<()> {
        info!(parent = parent_name, child = child_name, "deleting subtree");

        let mut uow = self.backend.begin()?;
        let parent = require_node(&uow, parent_name)?;
        let child = require_node(&uow, child_name)?;

        let detached = uow.delete_by_ancestor_and_descendant(parent.id, child.id)?;
        debug!(parent = %parent.name, child = %child.name, detached, "deleted direct relationship");
        let removed = remove_subtree(&mut uow, &child)?;
        uow.commit()?;

        info!(child = %child.name, removed, "deleted subtree");
        Ok(())
    }

    /// Re-parent `child_name`, with its whole subtree, under `new_parent_name`.
    pub fn move_subtree(&mut self, child_name: &str, new_parent_name: &str) -> Result<()> {
        info!(child = child_name, new_parent = new_parent_name, "moving subtree");

        let mut uow = self.backend.begin()?;
        let child = require_node(&uow, child_name)?;
        let new_parent = require_node(&uow, new_parent_name)?;

        let current = uow.find_direct_parent(child.id)?.ok_or_else(|| {
            warn!(child = %child.name, "refusing to move the root");
            Error::InvalidMove(format!("'{}' is the root and has no parent", child.name))
        })?;
        if current.ancestor.id == new_parent.id {
            warn!(child = %child.name, parent = %new_parent.name, "node is already under parent");
            return Err(Error::AlreadyPositioned {
                node: child.name,
                parent: new_parent.name,
            });
        }
        if child.id == new_parent.id || is_ancestor(&uow, &child, &new_parent)? {
            warn!(child = %child.name, new_parent = %new_parent.name, "move would create a cycle");
            return Err(Error::InvalidMove(format!(
                "'{}' can not be moved under its own subtree node '{}'",
                child.name, new_parent.name
            )));
        }

        uow.delete_by_descendant(child.id)?;
        attach_to_parent(&mut uow, &child, &new_parent)?;
        let rebased = rebuild_subtree(&mut uow, &child)?;
        uow.commit()?;

        info!(child = %child.name, new_parent = %new_parent.name, rebased, "moved subtree");
        Ok(())
    }

    /// Names of every descendant of `ancestor_name` at any depth, oldest relationship first.
    pub fn list_descendants(&self, ancestor_name: &str) -> Result<Vec<String>> {
        let snapshot = self.backend.snapshot()?;
        let ancestor = require_node(&snapshot, ancestor_name)?;
        let names: Vec<String> = snapshot
            .find_by_ancestor(ancestor.id)?
            .into_iter()
            .map(|rel| rel.descendant.name)
            .collect();
        info!(ancestor = %ancestor.name, count = names.len(), "listed descendants");
        Ok(names)
    }

    pub fn find_node(&self, name: &str) -> Result<Node> {
        let snapshot = self.backend.snapshot()?;
        require_node(&snapshot, name)
    }

    /// Check every closure-table invariant against the committed state.
    pub fn validate(&self) -> Result<()> {
        let snapshot = self.backend.snapshot()?;
        check_closure(&snapshot)
    }
}

/// Lock-guarded handle for sharing one engine between threads.
///
/// Mutations take the write lock and reads share the read lock. The handle is `Sync` only
/// when the backend is, which holds for [`MemoryBackend`](crate::MemoryBackend). SQLite and
/// PostgreSQL connections are not `Sync`: give each thread its own connection and let the
/// database transactions serialize the writers.
pub struct SharedHierarchy<B: Backend> {
    inner: RwLock<HierarchyEngine<B>>,
}

impl<B: Backend> SharedHierarchy<B> {
    pub fn new(engine: HierarchyEngine<B>) -> Self {
        Self {
            inner: RwLock::new(engine),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HierarchyEngine<B>>> {
        self.inner
            .read()
            .map_err(|_| Error::Storage("hierarchy lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HierarchyEngine<B>>> {
        self.inner
            .write()
            .map_err(|_| Error::Storage("hierarchy lock poisoned".into()))
    }

    pub fn ensure_root(&self) -> Result<Node> {
        self.write()?.ensure_root()
    }

    pub fn add_child(&self, parent_name: &str, child_name: &str) -> Result<Node> {
        self.write()?.add_child(parent_name, child_name)
    }

    pub fn delete_subtree(&self, parent_name: &str, child_name: &str) -> Result<()> {
        self.write()?.delete_subtree(parent_name, child_name)
    }

    pub fn move_subtree(&self, child_name: &str, new_parent_name: &str) -> Result<()> {
        self.write()?.move_subtree(child_name, new_parent_name)
    }

    pub fn list_descendants(&self, ancestor_name: &str) -> Result<Vec<String>> {
        self.read()?.list_descendants(ancestor_name)
    }

    pub fn validate(&self) -> Result<()> {
        self.read()?.validate()
    }

    pub fn into_inner(self) -> Result<HierarchyEngine<B>> {
        self.inner
            .into_inner()
            .map_err(|_| Error::Storage("hierarchy lock poisoned".into()))
    }
}
