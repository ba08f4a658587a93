//! Owned markup fragments
//!
//! `VElement` is what the engine hands to the host when it inserts or
//! rewrites content, and what the host hands back when a subtree is cloned.

use serde::{Deserialize, Serialize};

/// A node in an owned markup fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VNode {
    Element(VElement),
    Text(String),
}

impl VNode {
    pub fn text(text: impl Into<String>) -> Self {
        VNode::Text(text.into())
    }

    /// Concatenated text of this node and its descendants
    pub fn text_content(&self) -> String {
        match self {
            VNode::Text(t) => t.clone(),
            VNode::Element(e) => e.text_content(),
        }
    }

    pub fn to_html(&self) -> String {
        match self {
            VNode::Text(t) => html_escape(t),
            VNode::Element(e) => e.to_html(),
        }
    }
}

impl From<VElement> for VNode {
    fn from(element: VElement) -> Self {
        VNode::Element(element)
    }
}

/// An element with ordered attributes and children
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VElement {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<VNode>,
}

impl VElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder method to set an attribute
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder method to append a child element
    pub fn child(mut self, child: VElement) -> Self {
        self.children.push(VNode::Element(child));
        self
    }

    /// Builder method to append a text child
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(VNode::Text(text.into()));
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) {
        self.attributes.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attribute("class").unwrap_or_default().split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Child elements, skipping text
    pub fn child_elements(&self) -> impl Iterator<Item = &VElement> {
        self.children.iter().filter_map(|c| match c {
            VNode::Element(e) => Some(e),
            VNode::Text(_) => None,
        })
    }

    /// Visit this element and every descendant element, parents first
    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut VElement)) {
        f(self);
        for child in &mut self.children {
            if let VNode::Element(e) = child {
                e.walk_mut(f);
            }
        }
    }

    /// Drop every descendant element for which `remove` returns true
    pub fn remove_descendants(&mut self, remove: &impl Fn(&VElement) -> bool) {
        self.children.retain(|c| match c {
            VNode::Element(e) => !remove(e),
            VNode::Text(_) => true,
        });
        for child in &mut self.children {
            if let VNode::Element(e) = child {
                e.remove_descendants(remove);
            }
        }
    }

    /// First element (self included) matching the predicate, depth first
    pub fn find_mut(&mut self, pred: &impl Fn(&VElement) -> bool) -> Option<&mut VElement> {
        if pred(self) {
            return Some(self);
        }
        for child in &mut self.children {
            if let VNode::Element(e) = child
                && let Some(found) = e.find_mut(pred)
            {
                return Some(found);
            }
        }
        None
    }

    pub fn text_content(&self) -> String {
        self.children.iter().map(VNode::text_content).collect()
    }

    pub fn to_html(&self) -> String {
        let mut html = format!("<{}", self.tag);
        for (name, value) in &self.attributes {
            html.push_str(&format!(" {}=\"{}\"", name, html_escape(value)));
        }
        html.push('>');
        html.push_str(&children_html(&self.children));
        html.push_str(&format!("</{}>", self.tag));
        html
    }
}

/// Serialize a list of nodes, the equivalent of an element's inner HTML
pub fn children_html(children: &[VNode]) -> String {
    children.iter().map(VNode::to_html).collect()
}

/// Simple HTML escape for text and attribute values
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Parse an inline `style` attribute into ordered declarations
pub fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            let prop = prop.trim();
            if prop.is_empty() {
                return None;
            }
            Some((prop.to_ascii_lowercase(), value.trim().to_string()))
        })
        .collect()
}

/// Inverse of [`parse_style`]
pub fn format_style(declarations: &[(String, String)]) -> String {
    declarations
        .iter()
        .map(|(p, v)| format!("{}: {};", p, v))
        .collect::<Vec<_>>()
        .join(" ")
}
