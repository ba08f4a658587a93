//! Visibility engine
//!
//! Hides and shows real message rows. A row is only ever shown again if
//! this engine hid it, so rows the host hides for its own reasons stay
//! hidden. Synthetic rows are never hidden.

use log::{debug, warn};

use crate::context::Context;
use crate::host::{Document, NodeId};
use crate::markers::{BUNDLED_CLASS, HIDDEN_CLASS};
use crate::snapshot;

/// Hide rows; returns how many were not hidden already
pub fn hide(doc: &mut dyn Document, rows: &[NodeId]) -> usize {
    let mut changed = 0;
    for &row in rows {
        if !doc.contains(row) || snapshot::is_bundle_row(&*doc, row) {
            continue;
        }
        // Already hidden, by us or by the host
        if doc.has_class(row, HIDDEN_CLASS) || doc.style(row, "display").as_deref() == Some("none") {
            continue;
        }
        let result = doc
            .add_class(row, HIDDEN_CLASS)
            .and_then(|()| doc.set_style(row, "display", Some("none")));
        match result {
            Ok(()) => changed += 1,
            Err(e) => warn!("Failed to hide row {}: {}", row, e),
        }
    }
    changed
}

/// Show rows this engine hid; returns how many changed
pub fn show(doc: &mut dyn Document, rows: &[NodeId]) -> usize {
    let mut changed = 0;
    for &row in rows {
        if !doc.contains(row) || !doc.has_class(row, HIDDEN_CLASS) {
            continue;
        }
        let result = doc
            .remove_class(row, HIDDEN_CLASS)
            .and_then(|()| doc.set_style(row, "display", None));
        match result {
            Ok(()) => changed += 1,
            Err(e) => warn!("Failed to show row {}: {}", row, e),
        }
    }
    changed
}

fn visible_rows(ctx: &Context, doc: &dyn Document) -> Vec<NodeId> {
    match snapshot::visible_list(doc, &ctx.settings.selectors) {
        Some(list) => snapshot::row_nodes(doc, list, &ctx.settings.selectors),
        None => Vec::new(),
    }
}

/// Show every row of the visible list that belongs to no bundle
pub fn show_unbundled(ctx: &Context, doc: &mut dyn Document) -> usize {
    let rows: Vec<NodeId> = visible_rows(ctx, &*doc)
        .into_iter()
        .filter(|&row| !ctx.store.is_bundled(row))
        .collect();
    show(doc, &rows)
}

/// Show the members of `label` and hide every other row of the list
pub fn show_bundle(ctx: &Context, doc: &mut dyn Document, label: &str) -> usize {
    let Some(bundle) = ctx.store.get(label) else {
        warn!("Cannot show unknown bundle {:?}", label);
        return 0;
    };
    let (members, others): (Vec<NodeId>, Vec<NodeId>) = visible_rows(ctx, &*doc)
        .into_iter()
        .partition(|&row| bundle.contains(row));
    show(doc, &members) + hide(doc, &others)
}

/// Tag bundled rows and untag rows that left every bundle
pub fn mark_bundled(ctx: &Context, doc: &mut dyn Document) {
    for row in visible_rows(ctx, &*doc) {
        let result = if ctx.store.is_bundled(row) {
            doc.add_class(row, BUNDLED_CLASS)
        } else {
            doc.remove_class(row, BUNDLED_CLASS)
        };
        if let Err(e) = result {
            warn!("Failed to mark row {}: {}", row, e);
        }
    }
}

/// Make the visible list agree with the store after a regrouping
///
/// With a bundle open only its members are shown. Otherwise bundled rows
/// are hidden behind their bundle rows and everything else is shown.
pub fn reconcile(ctx: &Context, doc: &mut dyn Document) -> usize {
    mark_bundled(ctx, doc);
    let changed = match ctx.store.open_label() {
        Some(open) => show_bundle(ctx, doc, open),
        None => {
            let (bundled, loose): (Vec<NodeId>, Vec<NodeId>) = visible_rows(ctx, &*doc)
                .into_iter()
                .partition(|&row| ctx.store.is_bundled(row));
            hide(doc, &bundled) + show(doc, &loose)
        }
    };
    if changed > 0 {
        debug!("Visibility changed for {} rows", changed);
    }
    changed
}
