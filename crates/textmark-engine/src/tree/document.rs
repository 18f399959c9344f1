use super::{DocumentTree, NodeKind};

/// Handle into a [`Document`] arena. Stays valid after the node is detached.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Debug)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq)]
enum NodeData {
    Document,
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeSlot {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed document tree.
///
/// Nodes are never freed: detaching only unlinks them, so handles held by
/// overlay markers survive remove/re-insert cycles.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeSlot>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document containing only the root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeSlot {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Create an element and append it to `parent`.
    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let node = self.create_element(tag);
        self.append_child(parent, node);
        node
    }

    /// Create a text node and append it to `parent`.
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let node = self.create_text(text);
        self.append_child(parent, node);
        node
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let end = self.slot(parent).children.len();
        self.insert_child(parent, end, child);
    }

    /// The first element child of the root (`<html>` for a full page).
    pub fn document_element(&self) -> Option<NodeId> {
        self.slot(self.root())
            .children
            .iter()
            .copied()
            .find(|&child| matches!(self.slot(child).data, NodeData::Element { .. }))
    }

    /// Attributes of an element in insertion order.
    pub fn attributes(&self, node: NodeId) -> &[(String, String)] {
        match &self.slot(node).data {
            NodeData::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    /// Number of nodes ever allocated, attached or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn slot(&self, node: NodeId) -> &NodeSlot {
        &self.nodes[node.0]
    }

    fn slot_mut(&mut self, node: NodeId) -> &mut NodeSlot {
        &mut self.nodes[node.0]
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeSlot {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }
}

impl DocumentTree for Document {
    type Node = NodeId;

    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn kind(&self, node: NodeId) -> NodeKind {
        match self.slot(node).data {
            NodeData::Document => NodeKind::Document,
            NodeData::Element { .. } => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.slot(node).parent
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        &self.slot(node).children
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        match &self.slot(node).data {
            NodeData::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        match &self.slot(node).data {
            NodeData::Text(text) => Some(text),
            _ => None,
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.attributes(node)
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element {
            tag: tag.to_string(),
            attributes: Vec::new(),
        })
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    fn set_text(&mut self, node: NodeId, text: &str) {
        if let NodeData::Text(current) = &mut self.slot_mut(node).data {
            *current = text.to_string();
        }
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeData::Element { attributes, .. } = &mut self.slot_mut(node).data {
            match attributes
                .iter_mut()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
            {
                Some((_, existing)) => *existing = value.to_string(),
                None => attributes.push((name.to_string(), value.to_string())),
            }
        }
    }

    fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let children = &mut self.slot_mut(parent).children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.slot_mut(child).parent = Some(parent);
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.slot_mut(node).parent.take() {
            self.slot_mut(parent).children.retain(|&child| child != node);
        }
    }
}
