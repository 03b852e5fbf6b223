use crate::{walk, ObjectRef, ObjectStatus, Vertex, Visitor};
use std::collections::BTreeMap;

/// The result of a build: the graph's root vertices and the status of each object that was
/// considered as a source of virtual hosts.
#[derive(Clone, Debug, Default)]
pub struct Dag {
    roots: Vec<Vertex>,
    statuses: BTreeMap<ObjectRef, ObjectStatus>,
}

// === impl Dag ===

impl Dag {
    pub fn new(roots: Vec<Vertex>, statuses: BTreeMap<ObjectRef, ObjectStatus>) -> Self {
        Self { roots, statuses }
    }

    pub fn roots(&self) -> &[Vertex] {
        &self.roots
    }

    /// Walks the whole graph. See [`walk`].
    pub fn walk<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        walk(&self.roots, visitor)
    }

    pub fn statuses(&self) -> &BTreeMap<ObjectRef, ObjectStatus> {
        &self.statuses
    }

    pub fn status(&self, kind: &'static str, namespace: &str, name: &str) -> Option<&ObjectStatus> {
        self.statuses.get(&ObjectRef::new(kind, namespace, name))
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}
