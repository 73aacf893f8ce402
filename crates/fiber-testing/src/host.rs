//! In-memory host that records every operation the reconciler performs.

use std::fmt::Write as _;
use std::rc::Rc;

use fiber_core::{FiberId, HostConfig, Object, Props, Value};

pub type NodeId = usize;

#[derive(Clone, Debug)]
pub enum MemoryNode {
    Element { tag: Rc<str>, attrs: Object },
    Text(String),
}

#[derive(Debug)]
struct NodeRecord {
    node: MemoryNode,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    fiber: FiberId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostOp {
    CreateInstance { id: NodeId, tag: String },
    CreateText { id: NodeId, text: String },
    Append { parent: NodeId, child: NodeId },
    InsertBefore { parent: NodeId, child: NodeId, before: NodeId },
    Remove { parent: NodeId, child: NodeId },
    CommitUpdate { id: NodeId },
    CommitText { id: NodeId, text: String },
    UpdateContainer { children: Vec<NodeId> },
}

/// Top level content of a mounted tree.
#[derive(Clone, Debug, Default)]
pub struct MemContainer {
    children: Vec<NodeId>,
}

impl MemContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: Vec<NodeRecord>, // FUTURE(no_std): migrate to arena-backed node storage.
    ops: Vec<HostOp>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes ever created.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn node(&self, id: NodeId) -> Option<&MemoryNode> {
        self.nodes.get(id).map(|record| &record.node)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|record| record.children.as_slice())
            .unwrap_or_default()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|record| record.parent)
    }

    /// Fiber that created the node.
    pub fn fiber(&self, id: NodeId) -> Option<FiberId> {
        self.nodes.get(id).map(|record| record.fiber)
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&Value> {
        match self.node(id)? {
            MemoryNode::Element { attrs, .. } => attrs.get(name),
            MemoryNode::Text(_) => None,
        }
    }

    /// Concatenated text of the node and its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut text = String::new();
        self.collect_text(id, &mut text);
        text
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.node(id) {
            Some(MemoryNode::Text(text)) => out.push_str(text),
            Some(MemoryNode::Element { .. }) => {
                for &child in self.children(id) {
                    self.collect_text(child, out);
                }
            }
            None => {}
        }
    }

    /// Markup for a list of top level nodes, e.g. `<ul><li>a</li></ul>`.
    /// Attributes are written in insertion order.
    pub fn markup(&self, roots: &[NodeId]) -> String {
        let mut output = String::new();
        for &root in roots {
            self.write_node(&mut output, root);
        }
        output
    }

    fn write_node(&self, output: &mut String, id: NodeId) {
        match self.node(id) {
            Some(MemoryNode::Text(text)) => output.push_str(text),
            Some(MemoryNode::Element { tag, attrs }) => {
                let _ = write!(output, "<{tag}");
                for (name, value) in attrs.iter() {
                    let _ = write!(output, " {name}=\"{}\"", format_value(value));
                }
                output.push('>');
                for &child in self.children(id) {
                    self.write_node(output, child);
                }
                let _ = write!(output, "</{tag}>");
            }
            None => output.push_str("(missing)"),
        }
    }

    pub fn dump_tree(&self, roots: &[NodeId]) -> String {
        let mut output = String::new();
        for &root in roots {
            self.dump_node(&mut output, root, 0);
        }
        output
    }

    fn dump_node(&self, output: &mut String, id: NodeId, depth: usize) {
        let indent = "  ".repeat(depth);
        match self.node(id) {
            Some(MemoryNode::Text(text)) => {
                let _ = writeln!(output, "{indent}[{id}] {text:?}");
            }
            Some(MemoryNode::Element { tag, .. }) => {
                let _ = writeln!(output, "{indent}[{id}] <{tag}>");
                for &child in self.children(id) {
                    self.dump_node(output, child, depth + 1);
                }
            }
            None => {
                let _ = writeln!(output, "{indent}[{id}] (missing)");
            }
        }
    }

    fn create(&mut self, node: MemoryNode, fiber: FiberId) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(NodeRecord {
            node,
            children: Vec::new(),
            parent: None,
            fiber,
        });
        id
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.parent(child) {
            self.nodes[parent].children.retain(|&existing| existing != child);
            self.nodes[child].parent = None;
        }
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_owned(),
        Value::Bool(flag) => flag.to_string(),
        Value::Int(number) => number.to_string(),
        Value::Float(number) => number.to_string(),
        Value::Str(text) => text.to_string(),
        other => format!("{other:?}"),
    }
}

impl HostConfig for MemoryHost {
    type HostNode = NodeId;
    type Container = MemContainer;

    fn create_instance(&mut self, ty: &str, props: &Props, children: &[NodeId], fiber: FiberId) -> NodeId {
        let id = self.create(
            MemoryNode::Element {
                tag: Rc::from(ty),
                attrs: props.attrs().clone(),
            },
            fiber,
        );
        for &child in children {
            self.detach(child);
            self.nodes[child].parent = Some(id);
            self.nodes[id].children.push(child);
        }
        log::trace!("created <{ty}> as node {id}");
        self.ops.push(HostOp::CreateInstance {
            id,
            tag: ty.to_owned(),
        });
        id
    }

    fn create_text_instance(&mut self, text: &str, fiber: FiberId) -> NodeId {
        let id = self.create(MemoryNode::Text(text.to_owned()), fiber);
        self.ops.push(HostOp::CreateText {
            id,
            text: text.to_owned(),
        });
        id
    }

    fn prepare_update(&mut self, _node: &NodeId, old_props: &Props, new_props: &Props) -> bool {
        !old_props.attrs().shallow_eq(new_props.attrs())
    }

    fn commit_update(&mut self, node: &NodeId, _old_props: &Props, new_props: &Props) {
        if let Some(MemoryNode::Element { attrs, .. }) = self.nodes.get_mut(*node).map(|record| &mut record.node) {
            *attrs = new_props.attrs().clone();
        }
        self.ops.push(HostOp::CommitUpdate { id: *node });
    }

    fn commit_text_update(&mut self, node: &NodeId, _old_text: &str, new_text: &str) {
        if let Some(record) = self.nodes.get_mut(*node) {
            record.node = MemoryNode::Text(new_text.to_owned());
        }
        self.ops.push(HostOp::CommitText {
            id: *node,
            text: new_text.to_owned(),
        });
    }

    fn append_child(&mut self, parent: &NodeId, child: &NodeId) {
        self.detach(*child);
        self.nodes[*child].parent = Some(*parent);
        self.nodes[*parent].children.push(*child);
        self.ops.push(HostOp::Append {
            parent: *parent,
            child: *child,
        });
    }

    fn insert_before(&mut self, parent: &NodeId, child: &NodeId, before: &NodeId) {
        self.detach(*child);
        let siblings = &mut self.nodes[*parent].children;
        match siblings.iter().position(|&existing| existing == *before) {
            Some(position) => siblings.insert(position, *child),
            None => siblings.push(*child),
        }
        self.nodes[*child].parent = Some(*parent);
        self.ops.push(HostOp::InsertBefore {
            parent: *parent,
            child: *child,
            before: *before,
        });
    }

    fn remove_child(&mut self, parent: &NodeId, child: &NodeId) {
        self.nodes[*parent].children.retain(|&existing| existing != *child);
        self.nodes[*child].parent = None;
        self.ops.push(HostOp::Remove {
            parent: *parent,
            child: *child,
        });
    }

    fn update_container(&mut self, container: &mut MemContainer, children: &[NodeId]) {
        for &child in children {
            self.detach(child);
        }
        container.children = children.to_vec();
        self.ops.push(HostOp::UpdateContainer {
            children: children.to_vec(),
        });
    }
}

#[cfg(test)]
mod tests {
    use fiber_core::{FiberStore, Node, RootId};

    use super::*;

    fn fiber() -> FiberId {
        let mut store: FiberStore<MemoryHost> = FiberStore::new();
        store.create_root_fiber(RootId::from_index(0))
    }

    fn props(attrs: Object) -> Props {
        Props::new(attrs, Node::Empty)
    }

    #[test]
    fn insert_before_moves_an_attached_child() {
        let mut host = MemoryHost::new();
        let owner = fiber();
        let a = host.create_text_instance("a", owner);
        let b = host.create_text_instance("b", owner);
        let list = host.create_instance("ul", &props(Object::new()), &[a, b], owner);

        host.insert_before(&list, &b, &a);
        assert_eq!(host.children(list), &[b, a]);
        assert_eq!(host.markup(&[list]), "<ul>ba</ul>");
    }

    #[test]
    fn attribute_changes_require_commit() {
        let mut host = MemoryHost::new();
        let owner = fiber();
        let old = props(Object::new().with("class", "a"));
        let same = props(Object::new().with("class", "a"));
        let new = props(Object::new().with("class", "b"));
        let node = host.create_instance("div", &old, &[], owner);

        assert!(!host.prepare_update(&node, &old, &same));
        assert!(host.prepare_update(&node, &old, &new));
        host.commit_update(&node, &old, &new);
        assert_eq!(host.markup(&[node]), "<div class=\"b\"></div>");
    }
}
