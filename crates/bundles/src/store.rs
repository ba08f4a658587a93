//! Bundle state store
//!
//! Membership is replaced wholesale every cycle. Only the open label
//! survives from one cycle to the next.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::host::NodeId;
use crate::models::Bundle;

/// Freshly computed bundles for one cycle
#[derive(Debug, Clone, Default)]
pub struct Grouping {
    pub bundles: HashMap<String, Bundle>,
    /// Labels by first appearance, most recent first
    pub order: Vec<String>,
}

/// Process-wide bundle state
#[derive(Debug, Default)]
pub struct BundleStore {
    bundles: HashMap<String, Bundle>,
    order: Vec<String>,
    bundled: HashSet<NodeId>,
    /// At most one label is open
    open: Option<String>,
}

impl BundleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace membership with a new grouping
    ///
    /// Returns the open label if it no longer has any members; it is closed.
    pub fn apply(&mut self, grouping: Grouping) -> Option<String> {
        self.bundled = grouping
            .bundles
            .values()
            .flat_map(|b| b.members.iter().map(|m| m.node))
            .collect();
        self.bundles = grouping.bundles;
        self.order = grouping.order;

        let vanished = self
            .open
            .as_ref()
            .is_some_and(|label| !self.bundles.contains_key(label));
        if !vanished {
            return None;
        }
        let label = self.open.take();
        debug!("Open bundle {:?} has no members left", label);
        label
    }

    pub fn get(&self, label: &str) -> Option<&Bundle> {
        self.bundles.get(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.bundles.contains_key(label)
    }

    /// Labels by recency of their most recent member
    pub fn labels(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether the row belongs to at least one bundle
    pub fn is_bundled(&self, node: NodeId) -> bool {
        self.bundled.contains(&node)
    }

    pub fn open_label(&self) -> Option<&str> {
        self.open.as_deref()
    }

    pub fn is_open(&self, label: &str) -> bool {
        self.open.as_deref() == Some(label)
    }

    /// Open `label`, closing whatever was open; returns the closed label
    pub fn open(&mut self, label: &str) -> Option<String> {
        let previous = self.open.replace(label.to_string());
        previous.filter(|p| p != label)
    }

    pub fn close(&mut self, label: &str) {
        if self.is_open(label) {
            self.open = None;
        }
    }

    /// Labels ordered after `label`
    pub fn labels_after(&self, label: &str) -> &[String] {
        match self.order.iter().position(|l| l == label) {
            Some(i) => &self.order[i + 1..],
            None => &[],
        }
    }

    /// Labels ordered up to and including `label`
    pub fn labels_until(&self, label: &str) -> &[String] {
        match self.order.iter().position(|l| l == label) {
            Some(i) => &self.order[..=i],
            None => &self.order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageRow;

    fn grouping(labels: &[&str]) -> Grouping {
        let mut grouping = Grouping::default();
        for (i, label) in labels.iter().enumerate() {
            let row = MessageRow::new(NodeId(i as u64 + 1), "A", "10:00").with_label(*label);
            grouping
                .bundles
                .insert(label.to_string(), Bundle::new(*label, row));
            grouping.order.push(label.to_string());
        }
        grouping
    }

    #[test]
    fn test_open_is_exclusive() {
        let mut store = BundleStore::new();
        store.apply(grouping(&["Work", "Personal"]));

        assert_eq!(store.open("Work"), None);
        assert_eq!(store.open("Personal"), Some("Work".to_string()));
        assert!(store.is_open("Personal"));
        assert!(!store.is_open("Work"));
        assert_eq!(store.open("Personal"), None);
    }

    #[test]
    fn test_open_flag_survives_regrouping() {
        let mut store = BundleStore::new();
        store.apply(grouping(&["Work", "Personal"]));
        store.open("Work");

        assert_eq!(store.apply(grouping(&["Personal", "Work"])), None);
        assert!(store.is_open("Work"));
    }

    #[test]
    fn test_vanished_open_label_is_closed() {
        let mut store = BundleStore::new();
        store.apply(grouping(&["Work", "Personal"]));
        store.open("Work");

        assert_eq!(store.apply(grouping(&["Personal"])), Some("Work".to_string()));
        assert_eq!(store.open_label(), None);
        assert!(store.is_bundled(NodeId(1)));
        assert!(!store.is_bundled(NodeId(2)));
    }

    #[test]
    fn test_label_ranges() {
        let mut store = BundleStore::new();
        store.apply(grouping(&["A", "B", "C"]));

        assert_eq!(store.labels_after("A"), ["B".to_string(), "C".to_string()]);
        assert_eq!(store.labels_until("B"), ["A".to_string(), "B".to_string()]);
        assert!(store.labels_after("C").is_empty());
        assert!(store.labels_after("Z").is_empty());
    }
}
