//! Snapshot reader
//!
//! Reads the current rows of the visible message list. Nothing here writes
//! to the host.

use log::{debug, warn};

use crate::config::HostSelectors;
use crate::host::{Document, HostError, NodeId, Selector};
use crate::markers;
use crate::models::{LabelChip, LabelColors, MessageRow};

/// Rows of the visible list as read at the start of a cycle
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// The visible list container, if the host is showing one
    pub list: Option<NodeId>,
    /// Readable rows in host order
    pub rows: Vec<MessageRow>,
    /// Rows that could not be read this cycle
    pub skipped: usize,
}

/// The rendered list container, ignoring hidden copies the host keeps mounted
pub fn visible_list(doc: &dyn Document, selectors: &HostSelectors) -> Option<NodeId> {
    let scope = doc
        .query(doc.root(), &selectors.message_region)
        .unwrap_or_else(|| doc.root());
    doc.query_all(scope, &selectors.list_container)
        .into_iter()
        .find(|&list| doc.is_rendered(list))
}

/// Real message rows of a list in host order, bundle rows excluded
pub fn row_nodes(doc: &dyn Document, list: NodeId, selectors: &HostSelectors) -> Vec<NodeId> {
    doc.query_all(list, &selectors.row)
        .into_iter()
        .filter(|&row| !is_bundle_row(doc, row))
        .collect()
}

/// Whether a node is one of the engine's synthetic rows
pub fn is_bundle_row(doc: &dyn Document, node: NodeId) -> bool {
    doc.attribute(node, markers::LABEL_ATTRIBUTE).is_some()
}

/// Read one row
///
/// Sender and date are required; a row missing either has usually just
/// left the document.
pub fn read_row(
    doc: &dyn Document,
    node: NodeId,
    selectors: &HostSelectors,
) -> Result<MessageRow, HostError> {
    if !doc.contains(node) {
        return Err(HostError::Detached(node));
    }

    let senders: Vec<String> = doc
        .query_all(node, &selectors.sender)
        .into_iter()
        .map(|s| doc.text_content(s))
        .filter(|s| !s.trim().is_empty())
        .collect();
    if senders.is_empty() {
        return Err(missing(node, "sender"));
    }

    let date_cell = doc
        .query(node, &selectors.date)
        .ok_or_else(|| missing(node, "date"))?;
    let date = doc.text_content(date_cell);

    let subject = doc
        .query(node, &selectors.subject)
        .map(|s| doc.text_content(s))
        .unwrap_or_default();

    let mut row = MessageRow::new(node, senders.join(", "), date);
    row.subject = subject;
    row.unread = doc.has_class(node, &selectors.unread_class);
    for chip in doc.query_all(node, &selectors.label_chip) {
        row.push_label(read_chip(doc, chip));
    }
    Ok(row)
}

fn read_chip(doc: &dyn Document, chip: NodeId) -> LabelChip {
    let defaults = LabelColors::default();
    LabelChip {
        name: doc.text_content(chip),
        colors: LabelColors {
            background: doc
                .style(chip, "background-color")
                .unwrap_or(defaults.background),
            foreground: doc.style(chip, "color").unwrap_or(defaults.foreground),
        },
    }
}

fn missing(node: NodeId, what: &str) -> HostError {
    HostError::MissingStructure {
        node,
        what: what.to_string(),
    }
}

/// Read every row of the visible list; unreadable rows are logged and skipped
pub fn read_snapshot(doc: &dyn Document, selectors: &HostSelectors) -> Snapshot {
    let Some(list) = visible_list(doc, selectors) else {
        debug!("No visible message list");
        return Snapshot::default();
    };

    let mut snapshot = Snapshot {
        list: Some(list),
        ..Snapshot::default()
    };
    for node in row_nodes(doc, list, selectors) {
        match read_row(doc, node, selectors) {
            Ok(row) => snapshot.rows.push(row),
            Err(e) => {
                warn!("Skipping unreadable row: {}", e);
                snapshot.skipped += 1;
            }
        }
    }
    snapshot
}

/// Find the synthetic row bound to `label`
pub fn find_bundle_row(doc: &dyn Document, label: &str) -> Option<NodeId> {
    doc.query(
        doc.root(),
        &Selector::attribute_equals(markers::LABEL_ATTRIBUTE, label),
    )
}

/// Every synthetic row in the document with its bound label
pub fn bundle_rows(doc: &dyn Document) -> Vec<(String, NodeId)> {
    doc.query_all(doc.root(), &Selector::attribute_present(markers::LABEL_ATTRIBUTE))
        .into_iter()
        .filter_map(|node| {
            doc.attribute(node, markers::LABEL_ATTRIBUTE)
                .map(|label| (label, node))
        })
        .collect()
}
