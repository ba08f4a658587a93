//! In-memory document
//!
//! An arena-backed element tree implementing [`Document`]. It records every
//! write as a [`MutationRecord`], the way a browser's mutation observer
//! would report it, so tests and the replay tool can feed the change
//! detector exactly what a live host would.

use std::collections::HashMap;

use super::{Document, HostError, MutationKind, MutationRecord, NodeId, Position, VElement, VNode};

enum NodeKind {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    click_label: Option<String>,
}

/// In-memory implementation of [`Document`]
pub struct MemoryDocument {
    nodes: HashMap<NodeId, NodeData>,
    root: NodeId,
    next_id: u64,
    /// Records not yet handed to an observer
    pending: Vec<MutationRecord>,
    /// Total records ever produced
    mutation_count: usize,
}

impl MemoryDocument {
    /// Create a document with an empty `body` root
    pub fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            NodeData {
                kind: NodeKind::Element {
                    tag: "body".to_string(),
                    attributes: Vec::new(),
                },
                parent: None,
                children: Vec::new(),
                click_label: None,
            },
        );
        Self {
            nodes,
            root,
            next_id: 1,
            pending: Vec::new(),
            mutation_count: 0,
        }
    }

    /// Append a fragment as the last child of `parent`
    pub fn append(&mut self, parent: NodeId, fragment: &VElement) -> Result<NodeId, HostError> {
        self.ensure_attached(parent)?;
        let node = self.build_element(fragment, parent);
        self.node_mut(parent)?.children.push(node);
        self.record(parent, MutationKind::ChildList);
        Ok(node)
    }

    /// Replace an element's content with a single text node
    pub fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), HostError> {
        self.replace_children(node, &[VNode::text(text)])
    }

    /// Resolve a click on `node` to the label bound on it or an ancestor
    pub fn click(&self, node: NodeId) -> Option<String> {
        let mut current = Some(node);
        while let Some(n) = current {
            let data = self.nodes.get(&n)?;
            if let Some(label) = &data.click_label {
                return Some(label.clone());
            }
            current = data.parent;
        }
        None
    }

    /// Drain the records produced since the last call
    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.pending)
    }

    /// Total number of writes ever recorded
    pub fn mutation_count(&self) -> usize {
        self.mutation_count
    }

    /// Serialized subtree, for debugging output
    pub fn outer_html(&self, node: NodeId) -> String {
        self.snapshot_element(node)
            .map(|e| e.to_html())
            .unwrap_or_default()
    }

    fn record(&mut self, target: NodeId, kind: MutationKind) {
        self.pending.push(MutationRecord { target, kind });
        self.mutation_count += 1;
    }

    fn ensure_attached(&self, node: NodeId) -> Result<(), HostError> {
        if self.contains(node) {
            Ok(())
        } else {
            Err(HostError::Detached(node))
        }
    }

    fn node_mut(&mut self, node: NodeId) -> Result<&mut NodeData, HostError> {
        self.nodes.get_mut(&node).ok_or(HostError::Detached(node))
    }

    fn allocate(&mut self, kind: NodeKind, parent: NodeId) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            NodeData {
                kind,
                parent: Some(parent),
                children: Vec::new(),
                click_label: None,
            },
        );
        id
    }

    /// Create the nodes for a fragment without linking it into `parent`'s children
    fn build_element(&mut self, fragment: &VElement, parent: NodeId) -> NodeId {
        let id = self.allocate(
            NodeKind::Element {
                tag: fragment.tag.to_ascii_lowercase(),
                attributes: fragment.attributes.clone(),
            },
            parent,
        );
        let children: Vec<NodeId> = fragment
            .children
            .iter()
            .map(|child| self.build_node(child, id))
            .collect();
        if let Some(data) = self.nodes.get_mut(&id) {
            data.children = children;
        }
        id
    }

    fn build_node(&mut self, node: &VNode, parent: NodeId) -> NodeId {
        match node {
            VNode::Element(e) => self.build_element(e, parent),
            VNode::Text(t) => self.allocate(NodeKind::Text(t.clone()), parent),
        }
    }

    fn drop_subtree(&mut self, node: NodeId) {
        if let Some(data) = self.nodes.remove(&node) {
            for child in data.children {
                self.drop_subtree(child);
            }
        }
    }

    fn element_attributes_mut(
        &mut self,
        node: NodeId,
    ) -> Result<&mut Vec<(String, String)>, HostError> {
        self.ensure_attached(node)?;
        match &mut self.node_mut(node)?.kind {
            NodeKind::Element { attributes, .. } => Ok(attributes),
            NodeKind::Text(_) => Err(HostError::NotAnElement(node)),
        }
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl Document for MemoryDocument {
    fn root(&self) -> NodeId {
        self.root
    }

    fn contains(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            if current == self.root {
                return true;
            }
            match self.nodes.get(&current).and_then(|d| d.parent) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node).and_then(|d| d.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&node)
            .map(|d| d.children.clone())
            .unwrap_or_default()
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        match &self.nodes.get(&node)?.kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            NodeKind::Text(_) => None,
        }
    }

    fn own_text(&self, node: NodeId) -> Option<String> {
        match &self.nodes.get(&node)?.kind {
            NodeKind::Text(t) => Some(t.clone()),
            NodeKind::Element { .. } => None,
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        match &self.nodes.get(&node)?.kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone()),
            NodeKind::Text(_) => None,
        }
    }

    fn attribute_list(&self, node: NodeId) -> Vec<(String, String)> {
        match self.nodes.get(&node).map(|d| &d.kind) {
            Some(NodeKind::Element { attributes, .. }) => attributes.clone(),
            _ => Vec::new(),
        }
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), HostError> {
        let attributes = self.element_attributes_mut(node)?;
        match attributes.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some(slot) => slot.1 = value.to_string(),
            None => attributes.push((name.to_string(), value.to_string())),
        }
        self.record(node, MutationKind::Attributes);
        Ok(())
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), HostError> {
        let attributes = self.element_attributes_mut(node)?;
        let before = attributes.len();
        attributes.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        if attributes.len() != before {
            self.record(node, MutationKind::Attributes);
        }
        Ok(())
    }

    fn insert(&mut self, position: Position, fragment: &VElement) -> Result<NodeId, HostError> {
        let reference = position.reference();
        self.ensure_attached(reference)?;
        let parent = self.parent(reference).ok_or(HostError::Detached(reference))?;
        let node = self.build_element(fragment, parent);
        let siblings = &mut self.node_mut(parent)?.children;
        let index = siblings
            .iter()
            .position(|&s| s == reference)
            .ok_or(HostError::Detached(reference))?;
        match position {
            Position::Before(_) => siblings.insert(index, node),
            Position::After(_) => siblings.insert(index + 1, node),
        }
        self.record(parent, MutationKind::ChildList);
        Ok(node)
    }

    fn remove(&mut self, node: NodeId) -> Result<(), HostError> {
        self.ensure_attached(node)?;
        let parent = self.parent(node).ok_or(HostError::Detached(node))?;
        self.node_mut(parent)?.children.retain(|&c| c != node);
        self.drop_subtree(node);
        self.record(parent, MutationKind::ChildList);
        Ok(())
    }

    fn replace_children(&mut self, node: NodeId, content: &[VNode]) -> Result<(), HostError> {
        self.ensure_attached(node)?;
        if self.tag_name(node).is_none() {
            return Err(HostError::NotAnElement(node));
        }
        let old = std::mem::take(&mut self.node_mut(node)?.children);
        for child in old {
            self.drop_subtree(child);
        }
        let children: Vec<NodeId> = content
            .iter()
            .map(|child| self.build_node(child, node))
            .collect();
        self.node_mut(node)?.children = children;
        self.record(node, MutationKind::ChildList);
        Ok(())
    }

    fn add_click_listener(&mut self, node: NodeId, label: &str) -> Result<(), HostError> {
        self.ensure_attached(node)?;
        self.node_mut(node)?.click_label = Some(label.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Selector;

    fn list_doc() -> (MemoryDocument, NodeId, Vec<NodeId>) {
        let mut doc = MemoryDocument::new();
        let root = doc.root();
        let list = doc.append(root, &VElement::new("tbody")).unwrap();
        let rows = (0..3)
            .map(|i| {
                doc.append(
                    list,
                    &VElement::new("tr")
                        .attr("class", "row")
                        .child(VElement::new("td").text(format!("row {}", i))),
                )
                .unwrap()
            })
            .collect();
        (doc, list, rows)
    }

    #[test]
    fn test_insert_before_and_after() {
        let (mut doc, list, rows) = list_doc();
        let before = doc.insert(Position::Before(rows[1]), &VElement::new("div")).unwrap();
        let after = doc.insert(Position::After(rows[1]), &VElement::new("div")).unwrap();

        assert_eq!(doc.children(list), vec![rows[0], before, rows[1], after, rows[2]]);
        assert_eq!(doc.previous_element_sibling(rows[1]), Some(before));
        assert_eq!(doc.next_element_sibling(rows[1]), Some(after));
    }

    #[test]
    fn test_remove_detaches_subtree() {
        let (mut doc, list, rows) = list_doc();
        let cell = doc.children(rows[0])[0];
        doc.remove(rows[0]).unwrap();

        assert!(!doc.contains(rows[0]));
        assert!(!doc.contains(cell));
        assert_eq!(doc.children(list), vec![rows[1], rows[2]]);
        assert_eq!(doc.remove(rows[0]), Err(HostError::Detached(rows[0])));
        assert_eq!(
            doc.set_attribute(rows[0], "class", "x"),
            Err(HostError::Detached(rows[0]))
        );
    }

    #[test]
    fn test_writes_are_recorded() {
        let (mut doc, list, rows) = list_doc();
        doc.take_mutations();

        doc.add_class(rows[0], "hidden").unwrap();
        doc.add_class(rows[0], "hidden").unwrap();
        doc.remove(rows[2]).unwrap();

        let records = doc.take_mutations();
        assert_eq!(
            records,
            vec![
                MutationRecord { target: rows[0], kind: MutationKind::Attributes },
                MutationRecord { target: list, kind: MutationKind::ChildList },
            ]
        );
        assert!(doc.take_mutations().is_empty());
    }

    #[test]
    fn test_text_content_and_query() {
        let (doc, list, rows) = list_doc();
        assert_eq!(doc.text_content(rows[1]), "row 1");
        assert_eq!(doc.text_content(list), "row 0row 1row 2");

        let sel: Selector = "tr.row".parse().unwrap();
        assert_eq!(doc.query_all(doc.root(), &sel), rows);
    }

    #[test]
    fn test_style_helpers_and_rendering() {
        let (mut doc, list, rows) = list_doc();
        doc.set_style(rows[0], "display", Some("none")).unwrap();
        assert_eq!(doc.style(rows[0], "display").as_deref(), Some("none"));
        assert!(!doc.is_rendered(rows[0]));
        assert!(doc.is_rendered(rows[1]));

        doc.set_style(list, "display", Some("none")).unwrap();
        assert!(!doc.is_rendered(rows[1]));

        doc.set_style(rows[0], "display", None).unwrap();
        assert_eq!(doc.attribute(rows[0], "style"), None);
    }

    #[test]
    fn test_click_resolves_through_ancestors() {
        let (mut doc, _list, rows) = list_doc();
        let cell = doc.children(rows[0])[0];
        doc.add_click_listener(rows[0], "Work").unwrap();

        assert_eq!(doc.click(cell).as_deref(), Some("Work"));
        assert_eq!(doc.click(rows[1]), None);
    }

    #[test]
    fn test_replace_children_and_inner_markup() {
        let (mut doc, _list, rows) = list_doc();
        let cell = doc.children(rows[0])[0];
        doc.replace_children(
            cell,
            &[VNode::Element(VElement::new("b").text("Work [2]"))],
        )
        .unwrap();
        assert_eq!(doc.inner_markup(cell), "<b>Work [2]</b>");
        assert_eq!(doc.text_content(cell), "Work [2]");
    }
}
