//! Snapshot of a single message row

use serde::{Deserialize, Serialize};

use crate::host::NodeId;

/// Colors the host paints a label chip with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelColors {
    pub background: String,
    pub foreground: String,
}

impl Default for LabelColors {
    fn default() -> Self {
        Self {
            background: "#dddddd".to_string(),
            foreground: "#666666".to_string(),
        }
    }
}

/// A label as read from one of a row's chips
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelChip {
    /// Displayed text, compared exactly
    pub name: String,
    pub colors: LabelColors,
}

impl LabelChip {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            colors: LabelColors::default(),
        }
    }
}

/// What the engine read from one real row during a cycle
///
/// The `node` handle is only trusted for the cycle that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRow {
    pub node: NodeId,
    /// Labels in chip order, no duplicate names
    pub labels: Vec<LabelChip>,
    pub unread: bool,
    pub sender: String,
    pub subject: String,
    pub date: String,
}

impl MessageRow {
    pub fn new(node: NodeId, sender: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            node,
            labels: Vec::new(),
            unread: false,
            sender: sender.into(),
            subject: String::new(),
            date: date.into(),
        }
    }

    /// Builder method to add a label with default colors
    pub fn with_label(mut self, name: impl Into<String>) -> Self {
        self.push_label(LabelChip::new(name));
        self
    }

    /// Builder method to mark the row unread
    pub fn with_unread(mut self, unread: bool) -> Self {
        self.unread = unread;
        self
    }

    /// Add a label unless one with the same name is already present
    pub fn push_label(&mut self, chip: LabelChip) {
        if !self.has_label(&chip.name) {
            self.labels.push(chip);
        }
    }

    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l.name == name)
    }

    /// The chip for `name`, if this row carries it
    pub fn chip(&self, name: &str) -> Option<&LabelChip> {
        self.labels.iter().find(|l| l.name == name)
    }

    pub fn label_names(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(|l| l.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_labels_keep_first() {
        let mut row = MessageRow::new(NodeId(1), "Alice", "10:00");
        row.push_label(LabelChip {
            name: "Work".to_string(),
            colors: LabelColors {
                background: "#ff0000".to_string(),
                foreground: "#ffffff".to_string(),
            },
        });
        row.push_label(LabelChip::new("Work"));

        assert_eq!(row.labels.len(), 1);
        assert_eq!(row.chip("Work").unwrap().colors.background, "#ff0000");
    }

    #[test]
    fn test_label_names_are_case_and_whitespace_sensitive() {
        let row = MessageRow::new(NodeId(1), "Alice", "10:00")
            .with_label("Work")
            .with_label("work")
            .with_label("Work ");

        assert_eq!(row.label_names().collect::<Vec<_>>(), vec!["Work", "work", "Work "]);
        assert!(!row.has_label("WORK"));
    }
}
