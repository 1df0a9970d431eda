//! Arena representation of resolved documents.
//!
//! Nodes live in a flat vector and refer to their children by [`NodeId`].
//! A circular `$ref` becomes a [`Node::BackRef`] pointing at the node that
//! was under construction when the cycle closed, so cyclic documents are
//! representable without shared ownership. Rendered output shows such a
//! link as a local `$ref` to the position of its target.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

use crate::document::escape_segment;
use crate::reference::REF_KEY;
use crate::resolver::PendingRef;

/// Stable index of a node in a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A node of the resolved tree.
#[derive(Debug, Clone)]
pub enum Node {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Sequence(Vec<NodeId>),
    Mapping(IndexMap<String, NodeId>),
    /// A circular reference, linking back to a node already in the tree.
    BackRef { target: NodeId, reference: String },
    /// A reference whose expansion was deferred (lazy mode).
    Pending(Box<PendingRef>),
}

/// Arena of nodes with a designated root.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Create a tree whose root is a placeholder `Null` node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::Null],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate a placeholder node to be filled in with [`Tree::set`].
    pub fn reserve(&mut self) -> NodeId {
        self.nodes.push(Node::Null);
        NodeId(self.nodes.len() - 1)
    }

    pub fn set(&mut self, id: NodeId, node: Node) {
        if let Some(slot) = self.nodes.get_mut(id.0) {
            *slot = node;
        }
    }

    /// Swap in `node` at `id`, returning the previous node.
    pub(crate) fn replace(&mut self, id: NodeId, node: Node) -> Option<Node> {
        self.nodes
            .get_mut(id.0)
            .map(|slot| std::mem::replace(slot, node))
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Follow back-reference links to the node they stand for.
    ///
    /// A back-reference that only leads to itself resolves to the link.
    pub fn follow(&self, id: NodeId) -> NodeId {
        let mut current = id;
        for _ in 0..self.nodes.len() {
            match self.node(current) {
                Some(Node::BackRef { target, .. }) if *target != current => current = *target,
                _ => return current,
            }
        }
        current
    }

    /// Child of a mapping (by key) or sequence (by index), following
    /// back-references first.
    pub fn child(&self, id: NodeId, segment: &str) -> Option<NodeId> {
        match self.node(self.follow(id))? {
            Node::Mapping(map) => map.get(segment).copied(),
            Node::Sequence(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).copied()),
            _ => None,
        }
    }

    /// Direct children of a node, not following back-references.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        match self.node(id) {
            Some(Node::Mapping(map)) => map.values().copied().collect(),
            Some(Node::Sequence(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    /// Ids of all unexpanded references reachable from `id`.
    pub fn pending_under(&self, id: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            match self.node(current) {
                Some(Node::Pending(_)) => found.push(current),
                Some(Node::Mapping(_)) | Some(Node::Sequence(_)) => {
                    // Reverse so that pending nodes come out in document order.
                    stack.extend(self.children(current).into_iter().rev());
                }
                _ => {}
            }
        }
        found
    }

    /// Whether any reference is still unexpanded.
    pub fn has_pending(&self) -> bool {
        self.nodes.iter().any(|n| matches!(n, Node::Pending(_)))
    }

    /// Whether the tree contains a circular reference.
    pub fn has_cycles(&self) -> bool {
        self.nodes.iter().any(|n| matches!(n, Node::BackRef { .. }))
    }

    /// Render the whole tree as a JSON value.
    pub fn to_value(&self) -> Value {
        self.value_of(self.root)
    }

    /// Render the subtree at `id` as a JSON value.
    ///
    /// A back-reference renders as `{"$ref": "#/..."}` holding the JSON
    /// Pointer of its target within the rendered value, so the output can be
    /// resolved again on its own. A link whose target lies outside the
    /// rendered subtree, and an unexpanded reference, keep the original
    /// reference string.
    pub fn value_of(&self, id: NodeId) -> Value {
        self.value_under(id, "")
    }

    /// Render the subtree at `id` as if it were placed at `prefix` inside a
    /// larger document. `prefix` is an escaped JSON Pointer such as
    /// `/apis~1pets.yaml`; back-reference pointers start with it.
    pub fn value_under(&self, id: NodeId, prefix: &str) -> Value {
        let mut positions = HashMap::new();
        self.render(id, prefix.to_string(), &mut positions)
    }

    fn render(
        &self,
        id: NodeId,
        pointer: String,
        positions: &mut HashMap<NodeId, String>,
    ) -> Value {
        match self.node(id) {
            None | Some(Node::Null) => Value::Null,
            Some(Node::Bool(b)) => Value::Bool(*b),
            Some(Node::Number(n)) => Value::Number(n.clone()),
            Some(Node::String(s)) => Value::String(s.clone()),
            Some(Node::Sequence(items)) => {
                positions.insert(id, pointer.clone());
                let mut rendered = Vec::with_capacity(items.len());
                for (index, child) in items.iter().enumerate() {
                    let child_pointer = format!("{}/{}", pointer, index);
                    rendered.push(self.render(*child, child_pointer, positions));
                }
                Value::Array(rendered)
            }
            Some(Node::Mapping(map)) => {
                positions.insert(id, pointer.clone());
                let mut rendered = Map::new();
                for (key, child) in map {
                    let child_pointer = format!("{}/{}", pointer, escape_segment(key));
                    rendered.insert(key.clone(), self.render(*child, child_pointer, positions));
                }
                Value::Object(rendered)
            }
            Some(Node::BackRef { target, reference }) => {
                // A link to itself points at its own position.
                positions.entry(id).or_insert_with(|| pointer.clone());
                match positions.get(target) {
                    Some(position) => ref_value(&format!("#{}", position)),
                    None => ref_value(reference),
                }
            }
            Some(Node::Pending(pending)) => ref_value(&pending.reference.raw),
        }
    }
}

fn ref_value(reference: &str) -> Value {
    let mut map = Map::new();
    map.insert(REF_KEY.to_string(), Value::String(reference.to_string()));
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Tree {
        let mut tree = Tree::new();
        let name = tree.reserve();
        tree.set(name, Node::String("pet".into()));
        let tags = tree.reserve();
        let first = tree.reserve();
        tree.set(first, Node::Number(7.into()));
        tree.set(tags, Node::Sequence(vec![first]));
        let mut map = IndexMap::new();
        map.insert("name".to_string(), name);
        map.insert("tags".to_string(), tags);
        let root = tree.root();
        tree.set(root, Node::Mapping(map));
        tree
    }

    #[test]
    fn renders_to_value() {
        assert_eq!(sample().to_value(), json!({ "name": "pet", "tags": [7] }));
    }

    #[test]
    fn child_lookup() {
        let tree = sample();
        let tags = tree.child(tree.root(), "tags").unwrap();
        let first = tree.child(tags, "0").unwrap();
        assert_eq!(tree.value_of(first), json!(7));
        assert!(tree.child(tags, "1").is_none());
        assert!(tree.child(tree.root(), "missing").is_none());
    }

    #[test]
    fn back_reference_renders_as_ref() {
        let mut tree = Tree::new();
        let link = tree.reserve();
        tree.set(
            link,
            Node::BackRef {
                target: tree.root(),
                reference: "#".into(),
            },
        );
        let mut map = IndexMap::new();
        map.insert("self".to_string(), link);
        let root = tree.root();
        tree.set(root, Node::Mapping(map));

        assert!(tree.has_cycles());
        assert_eq!(tree.to_value(), json!({ "self": { "$ref": "#" } }));
        // Lookups see through the link.
        let through = tree.child(link, "self").unwrap();
        assert_eq!(through, link);
    }

    #[test]
    fn self_link_terminates() {
        let mut tree = Tree::new();
        let root = tree.root();
        tree.set(
            root,
            Node::BackRef {
                target: root,
                reference: "#/a".into(),
            },
        );
        assert_eq!(tree.follow(root), root);
        assert!(tree.child(root, "a").is_none());
    }

    /// `{"defs": {"Node": {"next": <link to Node>}}}`
    fn nested_cycle() -> (Tree, NodeId) {
        let mut tree = Tree::new();
        let defs = tree.reserve();
        let node = tree.reserve();
        let next = tree.reserve();
        tree.set(
            next,
            Node::BackRef {
                target: node,
                reference: "common.yaml#/Node".into(),
            },
        );
        tree.set(node, Node::Mapping(IndexMap::from([("next".to_string(), next)])));
        tree.set(defs, Node::Mapping(IndexMap::from([("Node".to_string(), node)])));
        let root = tree.root();
        tree.set(root, Node::Mapping(IndexMap::from([("defs".to_string(), defs)])));
        (tree, node)
    }

    #[test]
    fn back_reference_points_at_rendered_target() {
        let (tree, _) = nested_cycle();
        assert_eq!(
            tree.to_value(),
            json!({ "defs": { "Node": { "next": { "$ref": "#/defs/Node" } } } })
        );
    }

    #[test]
    fn subtree_rendering_is_relative_to_the_subtree() {
        let (tree, node) = nested_cycle();
        assert_eq!(tree.value_of(node), json!({ "next": { "$ref": "#" } }));

        let next = tree.child(node, "next").unwrap();
        // The target is outside the rendered subtree.
        assert_eq!(
            tree.value_of(next),
            json!({ "$ref": "common.yaml#/Node" })
        );
    }

    #[test]
    fn prefixed_rendering_nests_pointers() {
        let (tree, _) = nested_cycle();
        assert_eq!(
            tree.value_under(tree.root(), "/a~1api.yaml"),
            json!({ "defs": { "Node": { "next": { "$ref": "#/a~1api.yaml/defs/Node" } } } })
        );
    }
}
