//! Bundle renderer
//!
//! Owns the synthetic rows: creates them from the template, keeps their
//! slots in sync with the store, keeps them at their anchors and removes
//! the ones whose label is gone.
//!
//! Every write here shows up in the host's mutation stream and schedules
//! another cycle, so nothing is written unless the tree actually differs.

use std::collections::HashSet;

use anyhow::{Context as _, Result};
use log::{debug, info, warn};

use crate::context::Context;
use crate::host::{Document, NodeId, Position, VElement, VNode, children_html};
use crate::markers::LABEL_ATTRIBUTE;
use crate::models::Bundle;
use crate::snapshot;
use crate::template::Slot;
use crate::visibility;

/// Slot content of one bundle row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleContent {
    pub name: Vec<VNode>,
    pub senders: Vec<VNode>,
    pub date: Vec<VNode>,
}

impl BundleContent {
    /// `Label [count]`, bold while unread, underlined while open
    pub fn for_bundle(bundle: &Bundle, open: bool, max_senders: usize, separator: &str) -> Self {
        let mut name = VNode::text(format!("{} [{}]", bundle.label, bundle.count()));
        if open {
            name = wrap("u", name);
        }
        if bundle.unread {
            name = wrap("b", name);
        }

        Self {
            name: vec![name],
            senders: vec![VNode::text(
                bundle.recent_senders(max_senders).join(separator),
            )],
            date: vec![VNode::text(bundle.latest().date.clone())],
        }
    }

    pub fn slot(&self, slot: Slot) -> &[VNode] {
        match slot {
            Slot::Name => &self.name,
            Slot::Subject => &self.senders,
            Slot::Date => &self.date,
        }
    }
}

fn wrap(tag: &str, node: VNode) -> VNode {
    let mut element = VElement::new(tag);
    element.children.push(node);
    element.into()
}

/// The host renders `&nbsp;` back as U+00A0; both compare equal to a space
fn normalize(markup: &str) -> String {
    markup.replace("&nbsp;", " ").replace('\u{a0}', " ")
}

/// Create the synthetic row for `label` right before its most recent member
///
/// Returns `None` when a row for the label already exists anywhere.
pub fn insert(ctx: &mut Context, doc: &mut dyn Document, label: &str) -> Result<Option<NodeId>> {
    if snapshot::find_bundle_row(&*doc, label).is_some() {
        return Ok(None);
    }
    let anchor = ctx
        .store
        .get(label)
        .with_context(|| format!("Unknown bundle {:?}", label))?
        .latest()
        .node;
    let node = place(ctx, doc, label, Position::Before(anchor))?;
    info!("Inserted bundle {:?} before row {}", label, anchor);
    Ok(Some(node))
}

/// Materialize a fresh row for `label` at `position` and fill its slots
pub fn place(
    ctx: &mut Context,
    doc: &mut dyn Document,
    label: &str,
    position: Position,
) -> Result<NodeId> {
    let colors = ctx
        .store
        .get(label)
        .with_context(|| format!("Unknown bundle {:?}", label))?
        .colors();
    let list = snapshot::visible_list(&*doc, &ctx.settings.selectors)
        .context("No visible message list to take a template from")?;
    let element = ctx
        .templates
        .ensure(&*doc, list, &ctx.settings)?
        .instantiate(label, &colors);

    let node = doc.insert(position, &element)?;
    doc.add_click_listener(node, label)?;
    update(ctx, doc, label)?;
    Ok(node)
}

/// Bring the row's slots in line with the store
///
/// Only slots whose markup differs are rewritten. Returns whether anything
/// was written.
pub fn update(ctx: &Context, doc: &mut dyn Document, label: &str) -> Result<bool> {
    let Some(row) = snapshot::find_bundle_row(&*doc, label) else {
        warn!("No row for bundle {:?}; skipping update", label);
        return Ok(false);
    };
    let Some(bundle) = ctx.store.get(label) else {
        warn!("Bundle {:?} is not in the store; skipping update", label);
        return Ok(false);
    };

    let content = BundleContent::for_bundle(
        bundle,
        ctx.store.is_open(label),
        ctx.settings.max_recent_senders,
        &ctx.settings.sender_separator,
    );

    let mut wrote = false;
    for slot in Slot::ALL {
        let Some(target) = doc.query(row, &slot.selector()) else {
            warn!("Bundle row {:?} lost its {} slot", label, slot.key());
            continue;
        };
        let wanted = content.slot(slot);
        if normalize(&doc.inner_markup(target)) != normalize(&children_html(wanted)) {
            doc.replace_children(target, wanted)?;
            wrote = true;
        }
    }
    if wrote {
        debug!("Updated bundle row {:?}", label);
    }
    Ok(wrote)
}

/// Labels of the synthetic rows directly before `node`, in document order
fn run_before(doc: &dyn Document, node: NodeId) -> Vec<String> {
    let mut run = Vec::new();
    let mut current = doc.previous_element_sibling(node);
    while let Some(n) = current {
        let Some(label) = doc.attribute(n, LABEL_ATTRIBUTE) else {
            break;
        };
        run.push(label);
        current = doc.previous_element_sibling(n);
    }
    run.reverse();
    run
}

/// Labels of the synthetic rows directly after `node`, in document order
fn run_after(doc: &dyn Document, node: NodeId) -> Vec<String> {
    let mut run = Vec::new();
    let mut current = doc.next_element_sibling(node);
    while let Some(n) = current {
        let Some(label) = doc.attribute(n, LABEL_ATTRIBUTE) else {
            break;
        };
        run.push(label);
        current = doc.next_element_sibling(n);
    }
    run
}

fn detach_rows(doc: &mut dyn Document, labels: &[String]) -> Result<()> {
    for label in labels {
        if let Some(row) = snapshot::find_bundle_row(&*doc, label) {
            doc.remove(row)?;
        }
    }
    Ok(())
}

/// Move every synthetic row to where it belongs
///
/// With nothing open each row sits directly before its most recent member,
/// rows sharing that member in label order. With a bundle open, the labels
/// ordered after it sit directly below its last member so the expanded
/// members stay together under their bundle row.
///
/// Returns how many rows were moved. Rows already in place are not touched.
pub fn reposition(ctx: &mut Context, doc: &mut dyn Document) -> usize {
    let mut moved = 0;
    let anchored = match ctx.store.open_label().map(str::to_string) {
        Some(open) => {
            let below = ctx.store.labels_after(&open).to_vec();
            moved += place_below_open(ctx, doc, &open, &below);
            ctx.store.labels_until(&open).to_vec()
        }
        None => ctx.store.labels().to_vec(),
    };
    moved += place_at_anchors(ctx, doc, &anchored);
    if moved > 0 {
        debug!("Repositioned {} bundle rows", moved);
    }
    moved
}

fn place_at_anchors(ctx: &mut Context, doc: &mut dyn Document, labels: &[String]) -> usize {
    let mut groups: Vec<(NodeId, Vec<String>)> = Vec::new();
    for label in labels {
        let Some(bundle) = ctx.store.get(label) else {
            continue;
        };
        let anchor = bundle.latest().node;
        match groups.iter_mut().find(|(a, _)| *a == anchor) {
            Some((_, group)) => group.push(label.clone()),
            None => groups.push((anchor, vec![label.clone()])),
        }
    }

    let mut moved = 0;
    for (anchor, wanted) in groups {
        if run_before(&*doc, anchor) == wanted {
            continue;
        }
        if !doc.contains(anchor) {
            warn!("Anchor row {} for {:?} is gone; leaving rows in place", anchor, wanted);
            continue;
        }
        if let Err(e) = detach_rows(doc, &wanted) {
            warn!("Failed to detach bundle rows {:?}: {:#}", wanted, e);
            continue;
        }
        for label in &wanted {
            match place(ctx, doc, label, Position::Before(anchor)) {
                Ok(_) => moved += 1,
                Err(e) => warn!("Failed to place bundle {:?}: {:#}", label, e),
            }
        }
    }
    moved
}

fn place_below_open(
    ctx: &mut Context,
    doc: &mut dyn Document,
    open: &str,
    labels: &[String],
) -> usize {
    // Members the host hides itself are skipped as anchors
    let Some(last) = ctx.store.get(open).map(|b| {
        b.member_nodes()
            .into_iter()
            .rev()
            .find(|&n| doc.is_rendered(n))
            .unwrap_or(b.oldest().node)
    }) else {
        return 0;
    };
    if run_after(&*doc, last) == labels {
        return 0;
    }
    if !doc.contains(last) {
        warn!("Last member {} of open bundle {:?} is gone", last, open);
        return 0;
    }
    if let Err(e) = detach_rows(doc, labels) {
        warn!("Failed to detach bundle rows {:?}: {:#}", labels, e);
        return 0;
    }

    // Each placement lands directly after the member, so go in reverse
    let mut moved = 0;
    for label in labels.iter().rev() {
        match place(ctx, doc, label, Position::After(last)) {
            Ok(_) => moved += 1,
            Err(e) => warn!("Failed to place bundle {:?}: {:#}", label, e),
        }
    }
    moved
}

/// Remove synthetic rows whose label is no longer in the store
///
/// If the open bundle vanished this cycle, the rows it was keeping hidden
/// are shown again first. Duplicate rows for one label are removed too.
pub fn remove_orphans(ctx: &Context, doc: &mut dyn Document, vanished_open: Option<&str>) -> usize {
    if let Some(label) = vanished_open {
        let shown = visibility::show_unbundled(ctx, doc);
        info!("Open bundle {:?} vanished; restored {} rows", label, shown);
    }

    let mut seen = HashSet::new();
    let mut removed = 0;
    for (label, node) in snapshot::bundle_rows(&*doc) {
        if ctx.store.contains(&label) && seen.insert(label.clone()) {
            continue;
        }
        match doc.remove(node) {
            Ok(()) => {
                removed += 1;
                info!("Removed bundle row {:?}", label);
            }
            Err(e) => warn!("Failed to remove bundle row {:?}: {}", label, e),
        }
    }
    removed
}
