//! Boundary to the host application's element tree
//!
//! The host owns the tree and mutates it whenever it likes. The engine only
//! reaches it through the [`Document`] trait and must re-read state every
//! cycle rather than trusting handles from a previous one.

mod inbox;
mod markup;
mod memory;
mod selector;

pub use inbox::{FixtureLabel, FixtureRow, InboxBuilder, InboxFixture, InboxHandles};
pub use markup::{VElement, VNode, children_html, format_style, html_escape, parse_style};
pub use memory::MemoryDocument;
pub use selector::{AttributeTest, Selector, SelectorError};

use serde::{Deserialize, Serialize};

/// Opaque handle to a node in the host tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where to insert a new fragment relative to an existing node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Before(NodeId),
    After(NodeId),
}

impl Position {
    pub fn reference(self) -> NodeId {
        match self {
            Position::Before(n) | Position::After(n) => n,
        }
    }
}

/// Kind of change reported by the host's mutation observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// Children were added or removed; the target is the parent
    ChildList,
    /// An attribute of the target changed
    Attributes,
    /// A text node changed
    CharacterData,
}

/// One observed change in the host tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub kind: MutationKind,
}

/// Failures at the host boundary
///
/// None of these are fatal: callers log them and move on to the next row
/// or the next cycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("Node {0} is no longer attached to the document")]
    Detached(NodeId),
    #[error("Node {node} is missing expected structure: {what}")]
    MissingStructure { node: NodeId, what: String },
    #[error("Node {0} is not an element")]
    NotAnElement(NodeId),
    #[error("No message row available to derive a bundle template from")]
    NoTemplateSource,
}

/// Read/write access to the host's element tree
///
/// Writes return `HostError::Detached` when the target has left the
/// document. Reads on detached nodes return empty values.
pub trait Document {
    fn root(&self) -> NodeId;

    /// Whether the node is still attached under the root
    fn contains(&self, node: NodeId) -> bool;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Child nodes in order, text nodes included
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Lowercase tag name, `None` for text nodes
    fn tag_name(&self, node: NodeId) -> Option<String>;

    /// Text of a text node, `None` for elements
    fn own_text(&self, node: NodeId) -> Option<String>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    /// All attributes of an element in order
    fn attribute_list(&self, node: NodeId) -> Vec<(String, String)>;

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), HostError>;

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), HostError>;

    /// Insert a fragment as a sibling of the reference node
    fn insert(&mut self, position: Position, fragment: &VElement) -> Result<NodeId, HostError>;

    /// Detach a node and its subtree
    fn remove(&mut self, node: NodeId) -> Result<(), HostError>;

    /// Replace all children of an element with the given content
    fn replace_children(&mut self, node: NodeId, content: &[VNode]) -> Result<(), HostError>;

    /// Route clicks on the node (and its descendants) to the bundle `label`
    fn add_click_listener(&mut self, node: NodeId, label: &str) -> Result<(), HostError>;

    // === Provided navigation and queries ===

    fn is_element(&self, node: NodeId) -> bool {
        self.tag_name(node).is_some()
    }

    fn child_elements(&self, node: NodeId) -> Vec<NodeId> {
        self.children(node)
            .into_iter()
            .filter(|&c| self.is_element(c))
            .collect()
    }

    fn previous_element_sibling(&self, node: NodeId) -> Option<NodeId> {
        let siblings = self.child_elements(self.parent(node)?);
        let index = siblings.iter().position(|&s| s == node)?;
        index.checked_sub(1).map(|i| siblings[i])
    }

    fn next_element_sibling(&self, node: NodeId) -> Option<NodeId> {
        let siblings = self.child_elements(self.parent(node)?);
        let index = siblings.iter().position(|&s| s == node)?;
        siblings.get(index + 1).copied()
    }

    /// Concatenated text of all descendant text nodes
    fn text_content(&self, node: NodeId) -> String {
        if let Some(text) = self.own_text(node) {
            return text;
        }
        self.children(node)
            .into_iter()
            .map(|c| self.text_content(c))
            .collect()
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }

    fn add_class(&mut self, node: NodeId, class: &str) -> Result<(), HostError> {
        if self.has_class(node, class) {
            return Ok(());
        }
        let current = self.attribute(node, "class").unwrap_or_default();
        let updated = if current.trim().is_empty() {
            class.to_string()
        } else {
            format!("{} {}", current.trim(), class)
        };
        self.set_attribute(node, "class", &updated)
    }

    fn remove_class(&mut self, node: NodeId, class: &str) -> Result<(), HostError> {
        if !self.has_class(node, class) {
            return Ok(());
        }
        let current = self.attribute(node, "class").unwrap_or_default();
        let updated: Vec<&str> = current.split_whitespace().filter(|c| *c != class).collect();
        self.set_attribute(node, "class", &updated.join(" "))
    }

    /// Inline style property value
    fn style(&self, node: NodeId, property: &str) -> Option<String> {
        let style = self.attribute(node, "style")?;
        parse_style(&style)
            .into_iter()
            .find(|(p, _)| p.eq_ignore_ascii_case(property))
            .map(|(_, v)| v)
    }

    /// Set (or clear, with `None`) an inline style property
    fn set_style(
        &mut self,
        node: NodeId,
        property: &str,
        value: Option<&str>,
    ) -> Result<(), HostError> {
        let current = self.attribute(node, "style").unwrap_or_default();
        let mut decls = parse_style(&current);
        let property = property.to_ascii_lowercase();
        let existing = decls.iter().position(|(p, _)| *p == property);
        match (existing, value) {
            (Some(i), Some(v)) if decls[i].1 == v => return Ok(()),
            (Some(i), Some(v)) => decls[i].1 = v.to_string(),
            (None, Some(v)) => decls.push((property, v.to_string())),
            (Some(i), None) => {
                decls.remove(i);
            }
            (None, None) => return Ok(()),
        }
        if decls.is_empty() {
            self.remove_attribute(node, "style")
        } else {
            self.set_attribute(node, "style", &format_style(&decls))
        }
    }

    fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        match self.tag_name(node) {
            Some(tag) => selector.matches_with(&tag, |name| self.attribute(node, name)),
            None => false,
        }
    }

    /// Descendants of `scope` matching the selector, in document order
    fn query_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            if self.matches(node, selector) {
                found.push(node);
            }
            stack.extend(self.children(node).into_iter().rev());
        }
        found
    }

    /// First descendant of `scope` matching the selector
    fn query(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.query_all(scope, selector).into_iter().next()
    }

    /// Whether `node` is `ancestor` or lies beneath it
    fn is_within(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    /// Attached and not hidden by `display: none` on itself or an ancestor
    fn is_rendered(&self, node: NodeId) -> bool {
        if !self.contains(node) {
            return false;
        }
        let mut current = Some(node);
        while let Some(n) = current {
            if self.style(n, "display").as_deref() == Some("none") {
                return false;
            }
            current = self.parent(n);
        }
        true
    }

    /// Deep clone of an element subtree into owned markup
    fn snapshot_element(&self, node: NodeId) -> Option<VElement> {
        let tag = self.tag_name(node)?;
        let mut element = VElement::new(tag);
        for (name, value) in self.attribute_list(node) {
            element.attributes.push((name, value));
        }
        for child in self.children(node) {
            if let Some(text) = self.own_text(child) {
                element.children.push(VNode::Text(text));
            } else if let Some(e) = self.snapshot_element(child) {
                element.children.push(VNode::Element(e));
            }
        }
        Some(element)
    }

    /// Serialized children of an element
    fn inner_markup(&self, node: NodeId) -> String {
        self.snapshot_element(node)
            .map(|e| children_html(&e.children))
            .unwrap_or_default()
    }
}
