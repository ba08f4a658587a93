//! Bundling engine
//!
//! Ties the components together. The host drives it from its event loop:
//! feed every batch of mutation records to [`Bundler::observe`], call
//! [`Bundler::tick`] when the debounce deadline passes, and route clicks on
//! bundle rows to [`Bundler::on_bundle_click`].
//!
//! Each cycle re-reads the list, regroups, then reconciles the tree:
//! orphans out, rows in or updated, visibility, positions. Its own writes
//! trigger one more cycle, which finds nothing to change.

use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::config::BundlerSettings;
use crate::context::Context;
use crate::detector::{ChangeDetector, Trigger};
use crate::grouping;
use crate::host::{Document, MutationRecord, NodeId};
use crate::markers::LABEL_ATTRIBUTE;
use crate::render;
use crate::snapshot;
use crate::store::BundleStore;
use crate::visibility;

/// Statistics from one cycle
#[derive(Debug, Default, Clone)]
pub struct CycleStats {
    /// Rows read from the visible list
    pub rows: usize,
    /// Rows that could not be read
    pub skipped_rows: usize,
    /// Bundles after regrouping
    pub bundles: usize,
    /// Bundle rows created
    pub inserted: usize,
    /// Bundle rows whose content changed
    pub updated: usize,
    /// Orphaned bundle rows removed
    pub removed: usize,
    /// Bundle rows moved to a new position
    pub repositioned: usize,
    /// Rows whose visibility changed
    pub visibility_changed: usize,
    /// Number of errors encountered
    pub errors: usize,
    /// Duration of the cycle
    pub duration_ms: u64,
}

impl CycleStats {
    /// Whether the cycle left the tree untouched
    pub fn is_quiet(&self) -> bool {
        self.inserted == 0
            && self.updated == 0
            && self.removed == 0
            && self.repositioned == 0
            && self.visibility_changed == 0
    }
}

/// The inbox bundling engine for one page
#[derive(Debug)]
pub struct Bundler {
    ctx: Context,
    detector: ChangeDetector,
}

impl Bundler {
    pub fn new(settings: BundlerSettings) -> Self {
        let detector = ChangeDetector::new(settings.debounce_window());
        Self {
            ctx: Context::new(settings),
            detector,
        }
    }

    pub fn settings(&self) -> &BundlerSettings {
        &self.ctx.settings
    }

    pub fn store(&self) -> &BundleStore {
        &self.ctx.store
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn detector(&self) -> &ChangeDetector {
        &self.detector
    }

    /// Attach to the host; runs the first cycle if it is already loaded
    pub fn start(&mut self, doc: &mut dyn Document) -> Option<CycleStats> {
        match self.detector.attach(&*doc, &self.ctx.settings.selectors) {
            Trigger::Immediate => Some(self.run_cycle(doc)),
            _ => None,
        }
    }

    /// Feed the mutation records the host observed at `now`
    ///
    /// Runs a cycle right away only when the host has just become ready.
    /// Otherwise changes are debounced and picked up by [`Bundler::tick`].
    pub fn observe(
        &mut self,
        doc: &mut dyn Document,
        records: &[MutationRecord],
        now: DateTime<Utc>,
    ) -> Option<CycleStats> {
        match self
            .detector
            .observe(&*doc, &self.ctx.settings.selectors, records, now)
        {
            Trigger::Immediate => Some(self.run_cycle(doc)),
            Trigger::Scheduled | Trigger::Idle => None,
        }
    }

    /// Run the scheduled cycle if its deadline has passed
    pub fn tick(&mut self, doc: &mut dyn Document, now: DateTime<Utc>) -> Option<CycleStats> {
        if self.detector.poll(now) {
            Some(self.run_cycle(doc))
        } else {
            None
        }
    }

    /// When the next scheduled cycle is due, if any
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.detector.next_deadline()
    }

    /// Run one full cycle
    ///
    /// Failures on individual rows or bundles are logged and counted; the
    /// rest of the cycle carries on.
    pub fn run_cycle(&mut self, doc: &mut dyn Document) -> CycleStats {
        let start = Instant::now();
        let mut stats = CycleStats::default();

        // 1. Read the visible list
        let snapshot = snapshot::read_snapshot(&*doc, &self.ctx.settings.selectors);
        stats.rows = snapshot.rows.len();
        stats.skipped_rows = snapshot.skipped;
        if snapshot.list.is_none() {
            debug!("No visible message list; skipping cycle");
            stats.duration_ms = start.elapsed().as_millis() as u64;
            return stats;
        }

        // 2. Regroup
        let vanished = grouping::recompute(&mut self.ctx.store, &snapshot);
        stats.bundles = self.ctx.store.len();

        // 3. Drop rows for labels that are gone
        stats.removed = render::remove_orphans(&self.ctx, doc, vanished.as_deref());

        // 4. Create or refresh a row per bundle
        let labels = self.ctx.store.labels().to_vec();
        for label in &labels {
            if snapshot::find_bundle_row(&*doc, label).is_some() {
                match render::update(&self.ctx, doc, label) {
                    Ok(true) => stats.updated += 1,
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Failed to update bundle {:?}: {:#}", label, e);
                        stats.errors += 1;
                    }
                }
            } else {
                match render::insert(&mut self.ctx, doc, label) {
                    Ok(Some(_)) => stats.inserted += 1,
                    Ok(None) => {}
                    Err(e) => {
                        warn!("Failed to insert bundle {:?}: {:#}", label, e);
                        stats.errors += 1;
                    }
                }
            }
        }

        // 5. Hide and show rows to match the store
        stats.visibility_changed = visibility::reconcile(&self.ctx, doc);

        // 6. Keep bundle rows at their anchors
        stats.repositioned = render::reposition(&mut self.ctx, doc);

        stats.duration_ms = start.elapsed().as_millis() as u64;
        if stats.is_quiet() {
            debug!("Cycle complete, nothing changed: {:?}", stats);
        } else {
            info!(
                "Cycle complete: {} bundles over {} rows ({} inserted, {} updated, {} removed, {} moved)",
                stats.bundles,
                stats.rows,
                stats.inserted,
                stats.updated,
                stats.removed,
                stats.repositioned
            );
        }
        stats
    }

    /// Toggle the bundle bound to `label`
    ///
    /// Opening a bundle closes whichever one was open. An open bundle shows
    /// only its own members; closing it restores the collapsed view.
    pub fn on_bundle_click(&mut self, doc: &mut dyn Document, label: &str) -> Result<()> {
        if !self.ctx.store.contains(label) {
            warn!("Click on unknown bundle {:?}; ignoring", label);
            return Ok(());
        }

        if let Some(other) = self
            .ctx
            .store
            .open_label()
            .filter(|open| *open != label)
            .map(str::to_string)
        {
            self.ctx.store.close(&other);
            self.collapse(doc, &other);
            render::reposition(&mut self.ctx, doc);
            render::update(&self.ctx, doc, &other)?;
            debug!("Closed bundle {:?}", other);
        }

        let opened = if self.ctx.store.is_open(label) {
            self.ctx.store.close(label);
            self.collapse(doc, label);
            false
        } else {
            self.ctx.store.open(label);
            visibility::show_bundle(&self.ctx, doc, label);
            true
        };
        render::reposition(&mut self.ctx, doc);
        render::update(&self.ctx, doc, label)?;

        info!("Bundle {:?} {}", label, if opened { "opened" } else { "closed" });
        Ok(())
    }

    /// Route a click on any node; returns whether it hit a bundle row
    pub fn on_click_node(&mut self, doc: &mut dyn Document, node: NodeId) -> Result<bool> {
        let mut current = Some(node);
        while let Some(n) = current {
            if let Some(label) = doc.attribute(n, LABEL_ATTRIBUTE) {
                self.on_bundle_click(doc, &label)?;
                return Ok(true);
            }
            current = doc.parent(n);
        }
        Ok(false)
    }

    /// Hide a closed bundle's members and bring back everything else
    fn collapse(&self, doc: &mut dyn Document, label: &str) {
        if let Some(bundle) = self.ctx.store.get(label) {
            visibility::hide(doc, &bundle.member_nodes());
        }
        visibility::show_unbundled(&self.ctx, doc);
    }
}
