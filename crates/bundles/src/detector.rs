//! Change detection
//!
//! Decides when a cycle should run. Until the host finishes booting, the
//! detector watches its loading marker. After that it watches the message
//! region and coalesces bursts of child list changes into one cycle after a
//! quiet period.
//!
//! Time is passed in by the caller, which keeps the detector free of any
//! timer machinery and makes it deterministic to drive.

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};

use crate::config::HostSelectors;
use crate::host::{Document, MutationKind, MutationRecord, NodeId};

/// Trailing-edge debouncer
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<DateTime<Utc>>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// Record an event; pushes the deadline back to `now + window`
    ///
    /// A deadline past the end of representable time saturates.
    pub fn trigger(&mut self, now: DateTime<Utc>) {
        let deadline = now
            .checked_add_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.deadline = Some(deadline);
    }

    /// True once, when the quiet period has elapsed
    pub fn fire_due(&mut self, now: DateTime<Utc>) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

/// What the detector is currently waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The host is still booting
    AwaitingReady,
    /// The message region exists and is being watched
    Watching { region: NodeId },
}

/// What the caller should do after feeding the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Nothing to do
    Idle,
    /// The host just became ready; run a cycle now
    Immediate,
    /// A cycle is scheduled for the debounce deadline
    Scheduled,
}

#[derive(Debug, Clone)]
pub struct ChangeDetector {
    phase: Phase,
    debouncer: Debouncer,
}

impl ChangeDetector {
    pub fn new(window: Duration) -> Self {
        Self {
            phase: Phase::AwaitingReady,
            debouncer: Debouncer::new(window),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.debouncer.deadline()
    }

    /// Check whether the host is already past booting
    ///
    /// A missing or hidden loading marker means it is.
    pub fn attach(&mut self, doc: &dyn Document, selectors: &HostSelectors) -> Trigger {
        if self.phase != Phase::AwaitingReady {
            return Trigger::Idle;
        }
        let booting = doc
            .query(doc.root(), &selectors.loading_marker)
            .is_some_and(|marker| doc.is_rendered(marker));
        if booting {
            debug!("Host still loading; waiting for {}", selectors.loading_marker);
            return Trigger::Idle;
        }
        self.become_ready(doc, selectors)
    }

    /// Feed a batch of mutation records observed at `now`
    pub fn observe(
        &mut self,
        doc: &dyn Document,
        selectors: &HostSelectors,
        records: &[MutationRecord],
        now: DateTime<Utc>,
    ) -> Trigger {
        if records.is_empty() {
            return Trigger::Idle;
        }
        match self.phase {
            Phase::AwaitingReady => {
                let signalled = match doc.query(doc.root(), &selectors.loading_marker) {
                    Some(marker) => records.iter().any(|r| doc.is_within(r.target, marker)),
                    // The marker was removed outright
                    None => true,
                };
                if !signalled {
                    return Trigger::Idle;
                }
                // Any change to the marker means the host is done booting
                self.become_ready(doc, selectors)
            }
            Phase::Watching { region } => {
                let region = if doc.contains(region) {
                    region
                } else {
                    match doc.query(doc.root(), &selectors.message_region) {
                        Some(found) => {
                            info!("Message region replaced; now watching {}", found);
                            self.phase = Phase::Watching { region: found };
                            found
                        }
                        None => return Trigger::Idle,
                    }
                };
                let relevant = records
                    .iter()
                    .any(|r| r.kind == MutationKind::ChildList && doc.is_within(r.target, region));
                if !relevant {
                    return Trigger::Idle;
                }
                self.debouncer.trigger(now);
                Trigger::Scheduled
            }
        }
    }

    /// Whether a scheduled cycle is due at `now`; consumes the deadline
    pub fn poll(&mut self, now: DateTime<Utc>) -> bool {
        self.debouncer.fire_due(now)
    }

    fn become_ready(&mut self, doc: &dyn Document, selectors: &HostSelectors) -> Trigger {
        match doc.query(doc.root(), &selectors.message_region) {
            Some(region) => {
                info!("Host ready; watching message region {}", region);
                self.phase = Phase::Watching { region };
                Trigger::Immediate
            }
            None => {
                warn!("Host finished loading but {} was not found", selectors.message_region);
                Trigger::Idle
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{FixtureRow, InboxBuilder, InboxFixture, VNode};

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::milliseconds(ms)
    }

    #[test]
    fn test_debouncer_fires_once_after_quiet_period() {
        let mut debouncer = Debouncer::new(Duration::milliseconds(100));
        debouncer.trigger(at(0));
        debouncer.trigger(at(60));
        debouncer.trigger(at(120));

        assert!(!debouncer.fire_due(at(200)));
        assert!(debouncer.fire_due(at(220)));
        assert!(!debouncer.fire_due(at(400)));
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn test_debouncer_cancel() {
        let mut debouncer = Debouncer::new(Duration::milliseconds(100));
        debouncer.trigger(at(0));
        debouncer.cancel();
        assert!(!debouncer.fire_due(at(1000)));
    }

    #[test]
    fn test_waits_for_loading_marker() {
        let (mut doc, handles) = InboxBuilder::build(&InboxFixture::default()).unwrap();
        let selectors = HostSelectors::default();
        let mut detector = ChangeDetector::new(Duration::milliseconds(100));

        assert_eq!(detector.attach(&doc, &selectors), Trigger::Idle);
        assert_eq!(detector.phase(), Phase::AwaitingReady);

        handles.finish_loading(&mut doc).unwrap();
        let records = doc.take_mutations();
        assert_eq!(detector.observe(&doc, &selectors, &records, at(0)), Trigger::Immediate);
        assert_eq!(detector.phase(), Phase::Watching { region: handles.region });
    }

    #[test]
    fn test_any_loading_marker_change_signals_ready() {
        let (mut doc, handles) = InboxBuilder::build(&InboxFixture::default()).unwrap();
        let selectors = HostSelectors::default();
        let mut detector = ChangeDetector::new(Duration::milliseconds(100));
        assert_eq!(detector.attach(&doc, &selectors), Trigger::Idle);

        // The marker stays rendered; only its class changes
        doc.set_attribute(handles.loading, "class", "done").unwrap();
        let records = doc.take_mutations();
        assert!(doc.is_rendered(handles.loading));
        assert_eq!(detector.observe(&doc, &selectors, &records, at(0)), Trigger::Immediate);
        assert_eq!(detector.phase(), Phase::Watching { region: handles.region });
    }

    #[test]
    fn test_loading_marker_text_change_signals_ready() {
        let (mut doc, handles) = InboxBuilder::build(&InboxFixture::default()).unwrap();
        let selectors = HostSelectors::default();
        let mut detector = ChangeDetector::new(Duration::milliseconds(100));

        doc.replace_children(handles.loading, &[VNode::Text("Ready".to_string())])
            .unwrap();
        let records = doc.take_mutations();
        assert_eq!(detector.observe(&doc, &selectors, &records, at(0)), Trigger::Immediate);
    }

    #[test]
    fn test_debouncer_saturates_huge_window() {
        let mut debouncer = Debouncer::new(Duration::days(365 * 1_000_000));
        debouncer.trigger(at(0));
        assert_eq!(debouncer.deadline(), Some(DateTime::<Utc>::MAX_UTC));
        assert!(!debouncer.fire_due(at(1_000_000)));
    }

    #[test]
    fn test_attach_when_already_loaded() {
        let (mut doc, handles) = InboxBuilder::build(&InboxFixture::default()).unwrap();
        handles.finish_loading(&mut doc).unwrap();
        let mut detector = ChangeDetector::new(Duration::milliseconds(100));

        assert_eq!(detector.attach(&doc, &HostSelectors::default()), Trigger::Immediate);
        assert_eq!(detector.attach(&doc, &HostSelectors::default()), Trigger::Idle);
    }

    #[test]
    fn test_unrelated_changes_while_booting_are_ignored() {
        let (mut doc, mut handles) = InboxBuilder::build(&InboxFixture::default()).unwrap();
        let selectors = HostSelectors::default();
        let mut detector = ChangeDetector::new(Duration::milliseconds(100));

        handles.prepend_row(&mut doc, &FixtureRow::new("A", "a", "10:00")).unwrap();
        let records = doc.take_mutations();
        assert_eq!(detector.observe(&doc, &selectors, &records, at(0)), Trigger::Idle);
        assert_eq!(detector.phase(), Phase::AwaitingReady);
    }

    #[test]
    fn test_row_changes_are_debounced() {
        let (mut doc, mut handles) = InboxBuilder::build(&InboxFixture::default()).unwrap();
        let selectors = HostSelectors::default();
        handles.finish_loading(&mut doc).unwrap();
        doc.take_mutations();
        let mut detector = ChangeDetector::new(Duration::milliseconds(100));
        detector.attach(&doc, &selectors);

        for (i, ms) in [0, 30, 60].into_iter().enumerate() {
            handles
                .prepend_row(&mut doc, &FixtureRow::new(format!("S{}", i), "s", "10:00"))
                .unwrap();
            let records = doc.take_mutations();
            assert_eq!(detector.observe(&doc, &selectors, &records, at(ms)), Trigger::Scheduled);
        }

        assert!(!detector.poll(at(150)));
        assert!(detector.poll(at(160)));
        assert!(!detector.poll(at(1000)));
    }

    #[test]
    fn test_attribute_changes_do_not_schedule() {
        let (mut doc, handles) = InboxBuilder::build(&InboxFixture {
            rows: vec![FixtureRow::new("A", "a", "10:00")],
            ..Default::default()
        })
        .unwrap();
        let selectors = HostSelectors::default();
        handles.finish_loading(&mut doc).unwrap();
        doc.take_mutations();
        let mut detector = ChangeDetector::new(Duration::milliseconds(100));
        detector.attach(&doc, &selectors);

        handles.set_unread(&mut doc, handles.rows[0], true).unwrap();
        let records = doc.take_mutations();
        assert_eq!(detector.observe(&doc, &selectors, &records, at(0)), Trigger::Idle);
        assert!(!detector.is_pending());
    }
}
