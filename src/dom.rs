use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::types::{Marker, NodeId, StyleProperty};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("element {0} is no longer attached to the document")]
    Detached(NodeId),

    #[error("page evaluation failed: {0}")]
    Backend(String),
}

/// The slice of a live document the page agent reads and writes.
///
/// Implementations must treat every `NodeId` as possibly stale: methods that
/// touch a detached element return `DomError::Detached` instead of panicking.
pub trait Dom {
    /// True while the element is still connected to the document.
    fn is_attached(&self, node: NodeId) -> bool;

    /// True for the document's root elements (`<html>` and `<body>`).
    fn is_root(&self, node: NodeId) -> bool;

    /// Inline value of `property`, or an empty string when unset.
    fn inline_style(&self, node: NodeId, property: StyleProperty) -> Result<String, DomError>;

    fn set_inline_style(
        &mut self,
        node: NodeId,
        property: StyleProperty,
        value: &str,
    ) -> Result<(), DomError>;

    fn set_marker(&mut self, node: NodeId, marker: Marker) -> Result<(), DomError>;

    fn clear_marker(&mut self, node: NodeId) -> Result<(), DomError>;

    /// Every element currently carrying a marker.
    fn marked(&self) -> Result<Vec<NodeId>, DomError>;

    /// Identifies the document currently loaded. Changes whenever the page is
    /// replaced, after which ids handed out earlier must be treated as stale
    /// even if the new document reuses them.
    fn document(&self) -> u64 {
        0
    }

    /// Whether clicks inside the page are swallowed before the page sees them.
    /// Backends that suppress clicks out-of-band track the agent's enabled flag here.
    fn set_click_interception(&mut self, enabled: bool) -> Result<(), DomError> {
        let _ = enabled;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct MemoryNode {
    tag: String,
    attached: bool,
    root: bool,
    styles: BTreeMap<StyleProperty, String>,
    marker: Option<Marker>,
}

/// In-process document used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryDom {
    nodes: HashMap<NodeId, MemoryNode>,
    next_id: u64,
    document: u64,
    intercepting: bool,
}

impl MemoryDom {
    /// A document holding only its `<html>` and `<body>` roots.
    pub fn new() -> Self {
        let mut dom = Self::default();
        dom.insert_node("html", true);
        dom.insert_node("body", true);
        dom
    }

    pub fn insert(&mut self, tag: &str) -> NodeId {
        self.insert_node(tag, false)
    }

    fn insert_node(&mut self, tag: &str, root: bool) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.nodes.insert(
            id,
            MemoryNode {
                tag: tag.to_string(),
                attached: true,
                root,
                ..Default::default()
            },
        );
        id
    }

    pub fn html(&self) -> NodeId {
        NodeId(1)
    }

    pub fn body(&self) -> NodeId {
        NodeId(2)
    }

    /// Writes an inline style without going through the agent.
    pub fn with_style(&mut self, node: NodeId, property: StyleProperty, value: &str) -> &mut Self {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.styles.insert(property, value.to_string());
        }
        self
    }

    /// Simulates the page's own scripts removing an element.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.attached = false;
        }
    }

    /// Simulates a navigation: every element is replaced and numbering
    /// restarts, so the next inserts reuse ids from the previous document.
    pub fn reload(&mut self) {
        self.nodes.clear();
        self.next_id = 0;
        self.document += 1;
        self.insert_node("html", true);
        self.insert_node("body", true);
    }

    pub fn marker(&self, node: NodeId) -> Option<Marker> {
        self.nodes.get(&node).and_then(|n| n.marker)
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(&node).map(|n| n.tag.as_str())
    }

    pub fn style(&self, node: NodeId, property: StyleProperty) -> &str {
        self.nodes
            .get(&node)
            .and_then(|n| n.styles.get(&property))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn is_intercepting(&self) -> bool {
        self.intercepting
    }

    fn attached_mut(&mut self, node: NodeId) -> Result<&mut MemoryNode, DomError> {
        self.nodes
            .get_mut(&node)
            .filter(|n| n.attached)
            .ok_or(DomError::Detached(node))
    }
}

impl Dom for MemoryDom {
    fn is_attached(&self, node: NodeId) -> bool {
        self.nodes.get(&node).is_some_and(|n| n.attached)
    }

    fn is_root(&self, node: NodeId) -> bool {
        self.nodes.get(&node).is_some_and(|n| n.root)
    }

    fn inline_style(&self, node: NodeId, property: StyleProperty) -> Result<String, DomError> {
        if !self.is_attached(node) {
            return Err(DomError::Detached(node));
        }
        Ok(self.style(node, property).to_string())
    }

    fn set_inline_style(
        &mut self,
        node: NodeId,
        property: StyleProperty,
        value: &str,
    ) -> Result<(), DomError> {
        let n = self.attached_mut(node)?;
        // Assigning "" to element.style removes the declaration.
        if value.is_empty() {
            n.styles.remove(&property);
        } else {
            n.styles.insert(property, value.to_string());
        }
        Ok(())
    }

    fn set_marker(&mut self, node: NodeId, marker: Marker) -> Result<(), DomError> {
        self.attached_mut(node)?.marker = Some(marker);
        Ok(())
    }

    fn clear_marker(&mut self, node: NodeId) -> Result<(), DomError> {
        self.attached_mut(node)?.marker = None;
        Ok(())
    }

    fn marked(&self) -> Result<Vec<NodeId>, DomError> {
        let mut ids: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.attached && n.marker.is_some())
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn document(&self) -> u64 {
        self.document
    }

    fn set_click_interception(&mut self, enabled: bool) -> Result<(), DomError> {
        self.intercepting = enabled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roots_are_flagged() {
        let mut dom = MemoryDom::new();
        let p = dom.insert("p");
        assert!(dom.is_root(dom.html()));
        assert!(dom.is_root(dom.body()));
        assert!(!dom.is_root(p));
        assert_eq!(dom.tag(p), Some("p"));
    }

    #[test]
    fn unset_inline_style_reads_empty() {
        let mut dom = MemoryDom::new();
        let p = dom.insert("p");
        assert_eq!(dom.inline_style(p, StyleProperty::Color).unwrap(), "");
    }

    #[test]
    fn detached_nodes_refuse_mutation() {
        let mut dom = MemoryDom::new();
        let p = dom.insert("p");
        dom.detach(p);
        assert_eq!(
            dom.set_marker(p, Marker::Hover),
            Err(DomError::Detached(p))
        );
        assert_eq!(
            dom.set_inline_style(p, StyleProperty::Color, "red"),
            Err(DomError::Detached(p))
        );
        assert!(dom.marked().unwrap().is_empty());
    }

    #[test]
    fn reload_reuses_ids_in_a_new_document() {
        let mut dom = MemoryDom::new();
        let old = dom.insert("p");
        let before = dom.document();
        dom.reload();
        assert!(!dom.is_attached(old));
        assert_ne!(dom.document(), before);
        assert_eq!(dom.insert("span"), old);
        assert_eq!(dom.tag(old), Some("span"));
    }

    #[test]
    fn unknown_ids_are_detached() {
        let dom = MemoryDom::new();
        assert!(!dom.is_attached(NodeId(999)));
    }
}
