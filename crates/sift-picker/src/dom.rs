//! Element access
//!
//! Selector synthesis only needs to read a handful of element properties, so
//! it is written against [`ElementNode`] instead of a live browser DOM. The
//! wasm bindings implement it for `web_sys::Element`; [`DomTree`] implements it
//! for fixtures and tests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Read-only view of a DOM element.
pub trait ElementNode: Clone {
    /// Tag name as the document reports it (upper case for HTML).
    fn tag_name(&self) -> String;

    fn attribute(&self, name: &str) -> Option<String>;

    /// All attributes in document order.
    fn attributes(&self) -> Vec<(String, String)>;

    /// Parent element, `None` at the root.
    fn parent(&self) -> Option<Self>;

    /// Number of element siblings before this one. Text and comment nodes
    /// do not count.
    fn preceding_element_siblings(&self) -> usize;

    fn child_element_count(&self) -> usize;

    fn id(&self) -> String {
        self.attribute("id").unwrap_or_default()
    }

    fn class_name(&self) -> String {
        self.attribute("class").unwrap_or_default()
    }

    fn class_list(&self) -> Vec<String> {
        self.class_name().split_whitespace().map(str::to_string).collect()
    }
}

// =============================================================================
// In-memory Tree
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
enum NodeKind {
    Element { tag: String, attributes: Vec<(String, String)> },
    Text,
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed DOM with element and text nodes.
#[derive(Debug, Default)]
pub struct DomTree {
    nodes: Vec<NodeData>,
}

impl DomTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an element under `parent`, or as a root when `parent` is `None`.
    pub fn append_element(&mut self, parent: Option<NodeId>, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        let attributes = attributes
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        self.push(
            parent,
            NodeKind::Element {
                tag: tag.to_ascii_uppercase(),
                attributes,
            },
        )
    }

    pub fn append_text(&mut self, parent: NodeId) -> NodeId {
        self.push(Some(parent), NodeKind::Text)
    }

    fn push(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    /// Element handle for `id`, `None` for text nodes.
    pub fn element(&self, id: NodeId) -> Option<NodeRef<'_>> {
        match self.nodes.get(id.0)?.kind {
            NodeKind::Element { .. } => Some(NodeRef { tree: self, id }),
            NodeKind::Text => None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn is_element(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].kind, NodeKind::Element { .. })
    }

    /// Build a tree from a fixture. Returns the tree and the node marked
    /// `"target": true`, if any.
    pub fn from_fixture(root: &FixtureNode) -> (Self, Option<NodeId>) {
        let mut tree = Self::new();
        let mut target = None;
        tree.add_fixture(None, root, &mut target);
        (tree, target)
    }

    fn add_fixture(&mut self, parent: Option<NodeId>, node: &FixtureNode, target: &mut Option<NodeId>) {
        match node {
            FixtureNode::Text { .. } => {
                // A text root has nothing to attach to
                if let Some(parent) = parent {
                    self.append_text(parent);
                }
            }
            FixtureNode::Element {
                tag,
                attributes,
                children,
                target: is_target,
            } => {
                let attrs: Vec<(&str, &str)> = attributes.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
                let id = self.append_element(parent, tag, &attrs);
                if *is_target && target.is_none() {
                    *target = Some(id);
                }
                for child in children {
                    self.add_fixture(Some(id), child, target);
                }
            }
        }
    }
}

/// Element handle into a [`DomTree`].
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a DomTree,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub fn node_id(&self) -> NodeId {
        self.id
    }

    fn data(&self) -> &'a NodeData {
        &self.tree.nodes[self.id.0]
    }
}

impl ElementNode for NodeRef<'_> {
    fn tag_name(&self) -> String {
        match &self.data().kind {
            NodeKind::Element { tag, .. } => tag.clone(),
            NodeKind::Text => String::new(),
        }
    }

    fn attribute(&self, name: &str) -> Option<String> {
        match &self.data().kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone()),
            NodeKind::Text => None,
        }
    }

    fn attributes(&self) -> Vec<(String, String)> {
        match &self.data().kind {
            NodeKind::Element { attributes, .. } => attributes.clone(),
            NodeKind::Text => Vec::new(),
        }
    }

    fn parent(&self) -> Option<Self> {
        self.data().parent.and_then(|id| self.tree.element(id))
    }

    fn preceding_element_siblings(&self) -> usize {
        let Some(parent) = self.data().parent else {
            return 0;
        };
        self.tree.nodes[parent.0]
            .children
            .iter()
            .take_while(|&&sibling| sibling != self.id)
            .filter(|&&sibling| self.tree.is_element(sibling))
            .count()
    }

    fn child_element_count(&self) -> usize {
        self.data()
            .children
            .iter()
            .filter(|&&child| self.tree.is_element(child))
            .count()
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// JSON description of a DOM subtree.
///
/// ```json
/// { "tag": "body", "children": [
///     { "text": "\n" },
///     { "tag": "div", "attributes": { "class": "ad" }, "target": true }
/// ] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FixtureNode {
    Text {
        text: String,
    },
    Element {
        tag: String,
        #[serde(default)]
        attributes: BTreeMap<String, String>,
        #[serde(default)]
        children: Vec<FixtureNode>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        target: bool,
    },
}
