//! Rooted phylogenetic tree with a fixed node-id convention.
//!
//! Provides [PhyloTree], an arena of [Node]s referenced by [NodeId], and
//! [PhyloTreeBuilder] used by the Newick parser to construct it.
//!
//! # Node ids
//! * Leaves occupy ids `0..num_leaves`; the id of a leaf equals the
//!   [TaxonIndex](crate::model::TaxonIndex) of its taxon.
//! * Internal nodes (including the root) occupy ids
//!   `num_leaves..num_leaves + num_internal`.
//!
//! External reconstruction collaborators rely on this: row `i` of a
//! per-internal-node matrix belongs to node `num_leaves + i`.

use std::collections::HashSet;
use thiserror::Error;

/// Index of a node in a [PhyloTree] (arena).
pub type NodeId = usize;

/// Length of the branch leading to a node.
pub type BranchLength = f64;

/// Structural problems of a tree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    #[error("leaf {0} added more than once")]
    DuplicateLeaf(NodeId),
    #[error("leaf {0} is missing")]
    MissingLeaf(NodeId),
    #[error("node {0} is out of range")]
    NodeOutOfRange(NodeId),
    #[error("node {0} has more than one parent")]
    MultipleParents(NodeId),
    #[error("leaf {0} has children")]
    LeafWithChildren(NodeId),
    #[error("internal node {0} has no children")]
    ChildlessInternal(NodeId),
    #[error("expected exactly one root, found {0}")]
    RootCount(usize),
    #[error("node {0} is not reachable from the root")]
    Unreachable(NodeId),
}

// =#========================================================================#=
// NODE
// =#========================================================================$=
/// A node of a [PhyloTree].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    branch_length: Option<BranchLength>,
    label: Option<String>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn branch_length(&self) -> Option<BranchLength> {
        self.branch_length
    }

    /// Label of an internal node as given in the Newick string, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

// =$========================================================================$=
// TREE
// =$========================================================================$=
/// A rooted phylogenetic tree, possibly with multifurcations.
///
/// Read-only once constructed; see the module docs for the id convention.
#[derive(Debug, Clone, PartialEq)]
pub struct PhyloTree {
    num_leaves: usize,
    nodes: Vec<Node>,
    root: NodeId,
    name: Option<String>,
}

impl PhyloTree {
    /// Builds a tree from a list of directed `(parent, child)` edges.
    ///
    /// Ids `0..num_leaves` are leaves, ids `num_leaves..num_leaves + num_internal`
    /// internal nodes.
    ///
    /// # Errors
    /// Returns a [TreeError] unless the edges form a single rooted tree over
    /// all nodes in which exactly the leaves are childless.
    pub fn from_edges(
        num_leaves: usize,
        num_internal: usize,
        edges: &[(NodeId, NodeId)],
    ) -> Result<Self, TreeError> {
        let num_nodes = num_leaves + num_internal;
        let mut nodes = vec![Node::default(); num_nodes];

        for &(parent, child) in edges {
            if parent >= num_nodes {
                return Err(TreeError::NodeOutOfRange(parent));
            }
            if child >= num_nodes {
                return Err(TreeError::NodeOutOfRange(child));
            }
            if parent < num_leaves {
                return Err(TreeError::LeafWithChildren(parent));
            }
            if nodes[child].parent.replace(parent).is_some() {
                return Err(TreeError::MultipleParents(child));
            }
            nodes[parent].children.push(child);
        }

        let roots: Vec<NodeId> = (0..num_nodes).filter(|&i| nodes[i].parent.is_none()).collect();
        if roots.len() != 1 {
            return Err(TreeError::RootCount(roots.len()));
        }

        let tree = Self {
            num_leaves,
            nodes,
            root: roots[0],
            name: None,
        };
        tree.validate()?;
        Ok(tree)
    }

    /// Checks that every internal node has children and every node is
    /// reachable from the root.
    fn validate(&self) -> Result<(), TreeError> {
        let childless = (self.num_leaves..self.num_nodes()).find(|&i| self.nodes[i].children.is_empty());
        if let Some(id) = childless {
            return Err(TreeError::ChildlessInternal(id));
        }
        let reached: HashSet<NodeId> = self.post_order().into_iter().collect();
        match (0..self.num_nodes()).find(|id| !reached.contains(id)) {
            Some(id) => Err(TreeError::Unreachable(id)),
            None => Ok(()),
        }
    }

    /// Attaches a name to this tree.
    pub fn with_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    /// Returns name of this tree, or `None` if not set.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn num_leaves(&self) -> usize {
        self.num_leaves
    }

    pub fn num_internal(&self) -> usize {
        self.nodes.len() - self.num_leaves
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        id < self.num_leaves
    }

    /// Returns the node with the given id.
    ///
    /// # Panics
    /// Panics if `id` is out of bounds.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Iterates over all directed `(parent, child)` edges.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(child, node)| node.parent.map(|parent| (parent, child)))
    }

    pub fn num_edges(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    /// Returns all node ids in post-order (children before parents, root last).
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        // (node, whether its children were already pushed)
        let mut stack = vec![(self.root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
            } else {
                stack.push((id, true));
                for &child in self.nodes[id].children.iter().rev() {
                    stack.push((child, false));
                }
            }
        }
        order
    }
}

// =#========================================================================#=
// TREE BUILDER
// =#========================================================================$=
/// Bottom-up constructor for a [PhyloTree] as used while parsing Newick strings.
///
/// Leaves are placed at their taxon index; internal nodes get consecutive ids
/// from `num_leaves` onward in the order they are added, so adding a node
/// after its children yields post-order ids with the root last.
#[derive(Debug)]
pub struct PhyloTreeBuilder {
    num_leaves: usize,
    leaves: Vec<Option<Node>>,
    internals: Vec<Node>,
}

impl PhyloTreeBuilder {
    pub fn new(num_leaves: usize) -> Self {
        Self {
            num_leaves,
            leaves: vec![None; num_leaves],
            internals: Vec::with_capacity(num_leaves.saturating_sub(1)),
        }
    }

    /// Adds the leaf of taxon `taxon` and returns its id (equal to `taxon`).
    pub fn add_leaf(
        &mut self,
        taxon: NodeId,
        branch_length: Option<BranchLength>,
    ) -> Result<NodeId, TreeError> {
        let slot = self
            .leaves
            .get_mut(taxon)
            .ok_or(TreeError::NodeOutOfRange(taxon))?;
        if slot.is_some() {
            return Err(TreeError::DuplicateLeaf(taxon));
        }
        *slot = Some(Node {
            branch_length,
            ..Node::default()
        });
        Ok(taxon)
    }

    /// Adds an internal node above `children` and returns its id.
    pub fn add_internal(
        &mut self,
        children: Vec<NodeId>,
        branch_length: Option<BranchLength>,
        label: Option<String>,
    ) -> Result<NodeId, TreeError> {
        let id = self.num_leaves + self.internals.len();
        if children.is_empty() {
            return Err(TreeError::ChildlessInternal(id));
        }
        for &child in &children {
            let node = self.node_mut(child)?;
            if node.parent.replace(id).is_some() {
                return Err(TreeError::MultipleParents(child));
            }
        }
        self.internals.push(Node {
            parent: None,
            children,
            branch_length,
            label,
        });
        Ok(id)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, TreeError> {
        if id < self.num_leaves {
            self.leaves[id].as_mut().ok_or(TreeError::MissingLeaf(id))
        } else {
            self.internals
                .get_mut(id - self.num_leaves)
                .ok_or(TreeError::NodeOutOfRange(id))
        }
    }

    /// Finishes the tree rooted at `root`.
    ///
    /// # Errors
    /// Returns a [TreeError] if a leaf was never added or the nodes do not
    /// form a single tree under `root`.
    pub fn finish(self, root: NodeId) -> Result<PhyloTree, TreeError> {
        let mut nodes = Vec::with_capacity(self.num_leaves + self.internals.len());
        for (id, leaf) in self.leaves.into_iter().enumerate() {
            nodes.push(leaf.ok_or(TreeError::MissingLeaf(id))?);
        }
        nodes.extend(self.internals);

        if root >= nodes.len() {
            return Err(TreeError::NodeOutOfRange(root));
        }
        let num_roots = nodes.iter().filter(|n| n.parent.is_none()).count();
        if num_roots != 1 || nodes[root].parent.is_some() {
            return Err(TreeError::RootCount(num_roots));
        }

        let tree = PhyloTree {
            num_leaves: self.num_leaves,
            nodes,
            root,
            name: None,
        };
        tree.validate()?;
        Ok(tree)
    }
}

// =#========================================================================#=
// TESTS
// =#========================================================================$=
#[cfg(test)]
mod tests {
    use super::*;

    /// `((0,1),(2,3))` with internal ids 4 = (2,3), 5 = (0,1), 6 = root
    fn balanced_four() -> PhyloTree {
        PhyloTree::from_edges(4, 3, &[(6, 5), (6, 4), (5, 0), (5, 1), (4, 2), (4, 3)]).unwrap()
    }

    #[test]
    fn test_from_edges() {
        let tree = balanced_four();
        assert_eq!(tree.num_leaves(), 4);
        assert_eq!(tree.num_internal(), 3);
        assert_eq!(tree.root(), 6);
        assert_eq!(tree.edges().count(), 6);
        assert_eq!(tree.node(5).children(), &[0, 1]);
        assert_eq!(tree.node(2).parent(), Some(4));
    }

    #[test]
    fn test_post_order_children_first() {
        let tree = balanced_four();
        let order = tree.post_order();
        assert_eq!(order.len(), 7);
        assert_eq!(*order.last().unwrap(), 6);
        let pos = |id| order.iter().position(|&x| x == id).unwrap();
        for (parent, child) in tree.edges() {
            assert!(pos(child) < pos(parent));
        }
    }

    #[test]
    fn test_from_edges_rejects_malformed() {
        // two roots
        assert_eq!(
            PhyloTree::from_edges(2, 2, &[(2, 0), (3, 1)]),
            Err(TreeError::RootCount(2))
        );
        // child with two parents
        assert_eq!(
            PhyloTree::from_edges(2, 2, &[(2, 0), (2, 1), (3, 2), (3, 0)]),
            Err(TreeError::MultipleParents(0))
        );
        // leaf as parent
        assert_eq!(
            PhyloTree::from_edges(2, 1, &[(0, 1)]),
            Err(TreeError::LeafWithChildren(0))
        );
        // cycle detached from the root
        assert_eq!(
            PhyloTree::from_edges(1, 3, &[(1, 0), (2, 3), (3, 2)]),
            Err(TreeError::Unreachable(2))
        );
    }

    #[test]
    fn test_builder_ids() {
        let mut builder = PhyloTreeBuilder::new(3);
        let a = builder.add_leaf(2, Some(1.0)).unwrap();
        let b = builder.add_leaf(0, None).unwrap();
        let inner = builder.add_internal(vec![a, b], Some(0.5), None).unwrap();
        let c = builder.add_leaf(1, None).unwrap();
        let root = builder
            .add_internal(vec![inner, c], None, Some("root".to_string()))
            .unwrap();
        assert_eq!((inner, root), (3, 4));

        let tree = builder.finish(root).unwrap().with_name("t".to_string());
        assert_eq!(tree.name(), Some("t"));
        assert_eq!(tree.node(2).branch_length(), Some(1.0));
        assert_eq!(tree.node(4).label(), Some("root"));
        assert_eq!(tree.node(0).parent(), Some(3));
    }

    #[test]
    fn test_builder_missing_and_duplicate_leaf() {
        let mut builder = PhyloTreeBuilder::new(2);
        builder.add_leaf(0, None).unwrap();
        assert_eq!(builder.add_leaf(0, None), Err(TreeError::DuplicateLeaf(0)));
        let root = builder.add_internal(vec![0], None, None).unwrap();
        assert_eq!(builder.finish(root), Err(TreeError::MissingLeaf(1)));
    }
}
