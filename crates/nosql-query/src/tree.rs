//! Generic navigable tree built from a [`SearchResult`]
//!
//! Nodes live in an arena owned by [`ResultTree`]; parents hold the indices
//! of their children. A tree is built in one pass and is read-only after.

use crate::descriptor::{Descriptor, NodeDescriptor, NodeDescriptorFactory, ValueKind};
use crate::element::DatabaseElement;
use crate::types::SearchResult;
use crate::wrapper::Record;
use serde::Serialize;

/// Index of a node in its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One node: a descriptor and its ordered children
#[derive(Debug, Clone)]
pub struct TreeNode {
    descriptor: NodeDescriptor,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl TreeNode {
    pub fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Structural summary of a subtree, for comparing trees built separately
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeShape {
    pub key: String,
    pub kind: Option<ValueKind>,
    pub children: Vec<NodeShape>,
}

/// Arena-backed result tree. The root is always present.
#[derive(Debug, Clone)]
pub struct ResultTree {
    nodes: Vec<TreeNode>,
}

impl ResultTree {
    fn with_root(descriptor: NodeDescriptor) -> Self {
        Self {
            nodes: vec![TreeNode {
                descriptor,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    fn push_child(&mut self, parent: NodeId, descriptor: NodeDescriptor) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(TreeNode {
            descriptor,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn root_node(&self) -> &TreeNode {
        &self.nodes[0]
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.0)
    }

    /// Children of a node, empty for an unknown id
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(TreeNode::children).unwrap_or(&[])
    }

    /// Number of nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Depth of a node, 0 for the root
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.get(id).and_then(TreeNode::parent);
        while let Some(parent) = current {
            depth += 1;
            current = self.nodes[parent.0].parent;
        }
        depth
    }

    /// Pre-order walk yielding each node with its depth
    pub fn walk(&self) -> Vec<(NodeId, usize)> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root(), 0)];

        while let Some((id, depth)) = stack.pop() {
            order.push((id, depth));
            for child in self.nodes[id.0].children.iter().rev() {
                stack.push((*child, depth + 1));
            }
        }

        order
    }

    /// Shape of the whole tree
    pub fn shape(&self) -> NodeShape {
        self.shape_of(self.root())
    }

    fn shape_of(&self, id: NodeId) -> NodeShape {
        // Bottom-up over a post-order so deep trees do not recurse
        let mut post_order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            post_order.push(current);
            stack.extend(self.nodes[current.0].children.iter().copied());
        }

        let mut shapes: Vec<Option<NodeShape>> = vec![None; self.nodes.len()];
        for current in post_order.into_iter().rev() {
            let node = &self.nodes[current.0];
            let children = node
                .children
                .iter()
                .filter_map(|child| shapes[child.0].take())
                .collect();
            shapes[current.0] = Some(NodeShape {
                key: node.descriptor.formatted_key(),
                kind: node.descriptor.kind().cloned(),
                children,
            });
        }

        shapes[id.0].take().unwrap_or(NodeShape {
            key: String::new(),
            kind: None,
            children: Vec::new(),
        })
    }
}

enum Pending {
    Record(Record),
    Array(Vec<DatabaseElement>),
}

/// Build a fresh tree for `result`.
///
/// Every field becomes a key-value node and every array element an indexed
/// node. Composites are expanded with an explicit worklist, so nesting depth
/// is bounded only by memory. Children keep the order of `names()` and of
/// array iteration.
pub fn build_tree(result: &SearchResult, factory: &dyn NodeDescriptorFactory) -> ResultTree {
    let mut tree = ResultTree::with_root(factory.create_result_descriptor(result));
    let root = tree.root();

    let mut worklist: Vec<(NodeId, Pending)> = result
        .records()
        .iter()
        .rev()
        .map(|record| (root, Pending::Record(record.clone())))
        .collect();

    while let Some((parent, pending)) = worklist.pop() {
        let mut expand = Vec::new();

        match pending {
            Pending::Record(record) => {
                for name in record.names() {
                    let value = record.get(&name).unwrap_or_else(DatabaseElement::null);
                    let next = pending_of(&value);
                    let id =
                        tree.push_child(parent, factory.create_key_value_descriptor(&name, value));
                    if let Some(next) = next {
                        expand.push((id, next));
                    }
                }
            }
            Pending::Array(items) => {
                for (index, value) in items.into_iter().enumerate() {
                    let next = pending_of(&value);
                    let descriptor = factory.create_index_value_descriptor(index, value);
                    let id = tree.push_child(parent, descriptor);
                    if let Some(next) = next {
                        expand.push((id, next));
                    }
                }
            }
        }

        // Reversed so siblings are expanded in order
        worklist.extend(expand.into_iter().rev());
    }

    tree
}

fn pending_of(value: &DatabaseElement) -> Option<Pending> {
    match value {
        DatabaseElement::Array(items) => Some(Pending::Array(items.clone())),
        other => other.as_record().cloned().map(Pending::Record),
    }
}
