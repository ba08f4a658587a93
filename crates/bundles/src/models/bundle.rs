//! A bundle: every visible message sharing one label

use crate::host::NodeId;

use super::{LabelColors, MessageRow};

/// Messages grouped under one label for a single cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    /// Label name, the bundle's identity
    pub label: String,
    /// Members in host order, most recent first; never empty
    pub members: Vec<MessageRow>,
    /// True if any member is unread
    pub unread: bool,
}

impl Bundle {
    pub fn new(label: impl Into<String>, first: MessageRow) -> Self {
        let unread = first.unread;
        Self {
            label: label.into(),
            members: vec![first],
            unread,
        }
    }

    pub fn push(&mut self, row: MessageRow) {
        self.unread |= row.unread;
        self.members.push(row);
    }

    pub fn count(&self) -> usize {
        self.members.len()
    }

    /// Most recent member; the bundle row is anchored to it
    pub fn latest(&self) -> &MessageRow {
        &self.members[0]
    }

    /// Least recent member
    pub fn oldest(&self) -> &MessageRow {
        &self.members[self.members.len() - 1]
    }

    pub fn member_nodes(&self) -> Vec<NodeId> {
        self.members.iter().map(|m| m.node).collect()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.members.iter().any(|m| m.node == node)
    }

    /// Chip colors taken from the most recent member
    pub fn colors(&self) -> LabelColors {
        self.latest()
            .chip(&self.label)
            .map(|c| c.colors.clone())
            .unwrap_or_default()
    }

    /// Up to `limit` senders, most recent first
    pub fn recent_senders(&self, limit: usize) -> Vec<&str> {
        self.members
            .iter()
            .take(limit)
            .map(|m| m.sender.as_str())
            .collect()
    }
}
