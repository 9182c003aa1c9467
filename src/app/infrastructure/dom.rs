//! Minimal document model that page styles are injected into.
//!
//! Nodes live in an arena owned by the [`Document`] and are addressed by
//! [`NodeId`]. A node is *connected* when its ancestor chain reaches the root
//! element. Detached nodes stay in the arena and can be re-attached;
//! [`Document::drop_node`] frees a node's slot for reuse by the next
//! [`Document::create_element`].
//!
//! A document may start without a root element, as a page does at the very
//! beginning of parsing. [`Document::ready_signal`] hands out a one-shot
//! receiver that completes at the first structural change after which a head
//! or root element exists.

use indexmap::IndexMap;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Default)]
struct Node {
    tag: String,
    attributes: IndexMap<String, String>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Default)]
pub struct Document {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
    root: Option<NodeId>,
    ready_waiters: Vec<oneshot::Sender<()>>,
}

impl Document {
    /// A document with no root element yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// `<html><head></head><body></body></html>`
    pub fn with_skeleton() -> Self {
        let mut doc = Self::new();
        let html = doc.create_element("html");
        let head = doc.create_element("head");
        let body = doc.create_element("body");
        doc.set_document_element(html);
        doc.append_child(html, head);
        doc.append_child(html, body);
        doc
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let node = Node {
            tag: tag.to_ascii_lowercase(),
            attributes: IndexMap::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
        };
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.0] = node;
                id
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    /// Detaches `node` and releases it and its subtree. Their ids become
    /// invalid and may be handed out again by `create_element`.
    pub fn drop_node(&mut self, node: NodeId) {
        self.remove(node);
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let released = std::mem::take(&mut self.nodes[id.0]);
            stack.extend(released.children);
            self.free.push(id);
        }
    }

    /// Number of live nodes, attached or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Slots held by the arena, including released ones awaiting reuse.
    pub fn allocated_nodes(&self) -> usize {
        self.nodes.len()
    }

    // --- Tree structure ---

    pub fn document_element(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_document_element(&mut self, node: NodeId) {
        self.detach(node);
        self.root = Some(node);
        self.notify_structure_changed();
    }

    pub fn head(&self) -> Option<NodeId> {
        self.child_by_tag("head")
    }

    pub fn body(&self) -> Option<NodeId> {
        self.child_by_tag("body")
    }

    /// Where injected nodes go: the head, else the root element.
    pub fn injection_target(&self) -> Option<NodeId> {
        self.head().or(self.root)
    }

    fn child_by_tag(&self, tag: &str) -> Option<NodeId> {
        let root = self.root?;
        self.nodes[root.0]
            .children
            .iter()
            .copied()
            .find(|child| self.nodes[child.0].tag == tag)
    }

    /// Appends `child` as the last child of `parent`, moving it if it was attached elsewhere.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        self.notify_structure_changed();
    }

    /// Detaches `node` from its parent. Removing the root element empties the document.
    pub fn remove(&mut self, node: NodeId) {
        self.detach(node);
        self.notify_structure_changed();
    }

    fn detach(&mut self, node: NodeId) {
        if self.root == Some(node) {
            self.root = None;
        }
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != node);
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if self.root == Some(id) {
                return true;
            }
            current = self.nodes[id.0].parent;
        }
        false
    }

    /// Connected elements in tree order.
    pub fn descendants(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        out
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants()
            .into_iter()
            .find(|&node| self.attribute(node, "id") == Some(id))
    }

    // --- Element data ---

    pub fn tag_name(&self, node: NodeId) -> &str {
        &self.nodes[node.0].tag
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes[node.0].attributes.get(name).map(String::as_str)
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        self.nodes[node.0]
            .attributes
            .insert(name.to_string(), value.to_string());
    }

    pub fn text_content(&self, node: NodeId) -> &str {
        &self.nodes[node.0].text
    }

    pub fn set_text_content(&mut self, node: NodeId, text: &str) {
        self.nodes[node.0].text = text.to_string();
    }

    // --- Class list ---

    pub fn class_list(&self, node: NodeId) -> Vec<&str> {
        self.attribute(node, "class")
            .map(|classes| classes.split_ascii_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.class_list(node).contains(&class)
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        if self.has_class(node, class) {
            return;
        }
        let mut classes = self.class_list(node).join(" ");
        if !classes.is_empty() {
            classes.push(' ');
        }
        classes.push_str(class);
        self.set_attribute(node, "class", &classes);
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        if !self.has_class(node, class) {
            return;
        }
        let classes = self
            .class_list(node)
            .into_iter()
            .filter(|&c| c != class)
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attribute(node, "class", &classes);
    }

    // --- Readiness ---

    /// Completes once the document has a head or root element. If it already
    /// has one the receiver is completed immediately.
    pub fn ready_signal(&mut self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.ready_waiters.push(tx);
        self.notify_structure_changed();
        rx
    }

    pub fn is_ready(&self) -> bool {
        self.injection_target().is_some()
    }

    fn notify_structure_changed(&mut self) {
        if !self.is_ready() {
            return;
        }
        for waiter in self.ready_waiters.drain(..) {
            // The receiver may have been dropped; nothing to do then.
            let _ = waiter.send(());
        }
    }
}
