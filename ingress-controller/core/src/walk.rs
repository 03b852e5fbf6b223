use crate::{Vertex, VertexId};
use ahash::AHashSet as HashSet;

/// Receives the vertices and edges of a graph walk.
pub trait Visitor {
    /// Called once for each distinct vertex, before any of its children.
    fn vertex(&mut self, vertex: &Vertex);

    /// Called once for each distinct parent/child pair, after the child has been entered.
    fn edge(&mut self, _parent: &Vertex, _child: &Vertex) {}
}

/// Walks the graph reachable from `roots` depth-first.
///
/// Vertices are tracked by identity: a vertex shared by several parents is entered (and its
/// children expanded) only once, while each distinct parent/child relationship is still
/// reported. Children are visited in the order [`Vertex::visit`] yields them.
pub fn walk<'a, V>(roots: impl IntoIterator<Item = &'a Vertex>, visitor: &mut V)
where
    V: Visitor + ?Sized,
{
    let mut walk = Walk {
        visitor,
        entered: HashSet::default(),
        edges: HashSet::default(),
    };
    for root in roots {
        walk.enter(root);
    }
}

struct Walk<'v, V: ?Sized> {
    visitor: &'v mut V,
    entered: HashSet<VertexId>,
    edges: HashSet<(VertexId, VertexId)>,
}

// === impl Walk ===

impl<V: Visitor + ?Sized> Walk<'_, V> {
    fn enter(&mut self, parent: &Vertex) {
        // A vertex that has already been entered is either shared or, if the builder has produced
        // a cycle, an ancestor. Either way its sub-graph has been or is being expanded.
        if !self.entered.insert(parent.id()) {
            return;
        }
        self.visitor.vertex(parent);

        let mut children = Vec::new();
        parent.visit(|child| children.push(child.clone()));
        for child in &children {
            self.enter(child);
            if self.edges.insert((parent.id(), child.id())) {
                self.visitor.edge(parent, child);
            }
        }
    }
}
