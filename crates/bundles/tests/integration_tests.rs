//! Integration tests for the bundles crate
//!
//! These drive the engine against an in-memory inbox the way a host would:
//! mutation batches in, ticks on the debounce deadline, clicks on bundle rows.

use bundles::host::Document;
use bundles::{
    Bundler, BundlerSettings, CycleStats, FixtureLabel, FixtureRow, InboxBuilder, InboxFixture,
    InboxHandles, MemoryDocument, NodeId, Slot, snapshot,
};
use chrono::{DateTime, Duration, Utc};

/// Helper to build a loaded inbox with the engine attached
fn start(fixture: InboxFixture) -> (MemoryDocument, InboxHandles, Bundler) {
    let (mut doc, handles) = InboxBuilder::build(&fixture).unwrap();
    handles.finish_loading(&mut doc).unwrap();
    doc.take_mutations();
    let mut bundler = Bundler::new(BundlerSettings::default());
    bundler.start(&mut doc).unwrap();
    (doc, handles, bundler)
}

fn rows(rows: Vec<FixtureRow>) -> InboxFixture {
    InboxFixture {
        rows,
        ..Default::default()
    }
}

fn at(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::milliseconds(ms)
}

/// Feed pending records and tick until the engine stops writing
///
/// Returns the stats of every cycle that ran.
fn settle(doc: &mut MemoryDocument, bundler: &mut Bundler, mut now: i64) -> Vec<CycleStats> {
    let mut cycles = Vec::new();
    for _ in 0..10 {
        let records = doc.take_mutations();
        if let Some(stats) = bundler.observe(doc, &records, at(now)) {
            cycles.push(stats);
        }
        let Some(deadline) = bundler.next_deadline() else {
            break;
        };
        now = deadline.timestamp_millis();
        if let Some(stats) = bundler.tick(doc, at(now)) {
            cycles.push(stats);
        }
    }
    cycles
}

fn slot_text(doc: &MemoryDocument, label: &str, slot: Slot) -> String {
    let row = snapshot::find_bundle_row(doc, label).unwrap();
    let node = doc.query(row, &slot.selector()).unwrap();
    doc.inner_markup(node)
}

fn visible(doc: &MemoryDocument, nodes: &[NodeId]) -> Vec<bool> {
    nodes.iter().map(|&n| doc.is_rendered(n)).collect()
}

#[test]
fn test_recency_ordering_scenario() {
    let (doc, handles, bundler) = start(rows(vec![
        FixtureRow::new("R1", "first", "Mar 9").label("Work"),
        FixtureRow::new("R2", "second", "Mar 8").label("Work"),
        FixtureRow::new("R3", "third", "Mar 7").label("Work").unread(),
    ]));

    let work = bundler.store().get("Work").unwrap();
    assert_eq!(work.member_nodes(), handles.rows);
    assert_eq!(slot_text(&doc, "Work", Slot::Name), "<b>Work [3]</b>");
    assert_eq!(slot_text(&doc, "Work", Slot::Subject), "R1, R2, R3");
    assert_eq!(slot_text(&doc, "Work", Slot::Date), "Mar 9");

    let row = snapshot::find_bundle_row(&doc, "Work").unwrap();
    assert_eq!(doc.next_element_sibling(row), Some(handles.rows[0]));
}

#[test]
fn test_label_colors_come_from_the_latest_member() {
    let (doc, _, _) = start(rows(vec![
        FixtureRow::new("A", "a", "10:00")
            .colored_label(FixtureLabel::colored("Work", "#16a765", "#ffffff")),
        FixtureRow::new("B", "b", "09:00")
            .colored_label(FixtureLabel::colored("Work", "#000000", "#000000")),
    ]));

    let row = snapshot::find_bundle_row(&doc, "Work").unwrap();
    let name = doc.query(row, &Slot::Name.selector()).unwrap();
    assert_eq!(doc.style(name, "background-color").as_deref(), Some("#16a765"));
    assert_eq!(doc.style(name, "color").as_deref(), Some("#ffffff"));
}

#[test]
fn test_visibility_toggle_scenario() {
    let (mut doc, handles, mut bundler) = start(rows(vec![
        FixtureRow::new("R1", "a", "10:00").label("Work"),
        FixtureRow::new("X", "x", "09:30"),
        FixtureRow::new("R2", "b", "09:00").label("Work"),
        FixtureRow::new("Y", "y", "08:00"),
    ]));
    let bundle_row = snapshot::find_bundle_row(&doc, "Work").unwrap();
    assert_eq!(visible(&doc, &handles.rows), vec![false, true, false, true]);

    bundler.on_bundle_click(&mut doc, "Work").unwrap();
    assert_eq!(visible(&doc, &handles.rows), vec![true, false, true, false]);
    assert!(doc.is_rendered(bundle_row));
    assert_eq!(slot_text(&doc, "Work", Slot::Name), "<u>Work [2]</u>");

    bundler.on_bundle_click(&mut doc, "Work").unwrap();
    assert_eq!(visible(&doc, &handles.rows), vec![false, true, false, true]);
    assert_eq!(slot_text(&doc, "Work", Slot::Name), "Work [2]");
}

#[test]
fn test_clicks_keep_at_most_one_bundle_open() {
    let (mut doc, _, mut bundler) = start(rows(vec![
        FixtureRow::new("A", "a", "10:00").label("Work"),
        FixtureRow::new("B", "b", "09:00").label("Personal"),
        FixtureRow::new("C", "c", "08:00").label("Travel").label("Work"),
    ]));

    let clicks = ["Work", "Personal", "Personal", "Travel", "Work", "Work", "Travel"];
    for (i, label) in clicks.into_iter().enumerate() {
        bundler.on_bundle_click(&mut doc, label).unwrap();
        settle(&mut doc, &mut bundler, i as i64 * 1000);

        let open: Vec<&String> = bundler
            .store()
            .labels()
            .iter()
            .filter(|l| bundler.store().is_open(l))
            .collect();
        assert!(open.len() <= 1, "after clicking {}: {:?}", label, open);

        let underlined = ["Work", "Personal", "Travel"]
            .into_iter()
            .filter(|l| slot_text(&doc, l, Slot::Name).contains("<u>"))
            .count();
        assert_eq!(underlined, open.len());
    }
}

#[test]
fn test_multi_label_row_stays_visible_while_its_bundle_is_open() {
    let (mut doc, handles, mut bundler) = start(rows(vec![
        FixtureRow::new("A", "a", "10:00").label("Personal"),
        FixtureRow::new("B", "b", "09:00").label("Work").label("Personal"),
        FixtureRow::new("C", "c", "08:00").label("Work"),
    ]));

    bundler.on_bundle_click(&mut doc, "Work").unwrap();
    settle(&mut doc, &mut bundler, 0);

    assert_eq!(visible(&doc, &handles.rows), vec![false, true, true]);
    assert!(!bundler.store().is_open("Personal"));
}

#[test]
fn test_open_bundle_keeps_later_bundles_below_its_members() {
    let (mut doc, handles, mut bundler) = start(rows(vec![
        FixtureRow::new("A", "a", "10:00").label("Work"),
        FixtureRow::new("B", "b", "09:00").label("Travel"),
        FixtureRow::new("C", "c", "08:00").label("Work"),
    ]));

    bundler.on_bundle_click(&mut doc, "Work").unwrap();
    settle(&mut doc, &mut bundler, 0);

    let travel = snapshot::find_bundle_row(&doc, "Travel").unwrap();
    assert_eq!(doc.previous_element_sibling(travel), Some(handles.rows[2]));
    assert!(doc.is_rendered(travel));
}

#[test]
fn test_orphaned_bundle_is_removed() {
    let (mut doc, handles, mut bundler) = start(rows(vec![
        FixtureRow::new("A", "a", "10:00").label("Work"),
        FixtureRow::new("B", "b", "09:00").label("Travel"),
    ]));

    handles.set_labels(&mut doc, handles.rows[1], &[]).unwrap();
    settle(&mut doc, &mut bundler, 0);

    assert!(snapshot::find_bundle_row(&doc, "Travel").is_none());
    assert!(snapshot::find_bundle_row(&doc, "Work").is_some());
    assert!(doc.is_rendered(handles.rows[1]));
}

#[test]
fn test_orphaned_open_bundle_restores_unbundled_rows() {
    let (mut doc, handles, mut bundler) = start(rows(vec![
        FixtureRow::new("A", "a", "10:00").label("Work"),
        FixtureRow::new("B", "b", "09:00"),
        FixtureRow::new("C", "c", "08:00").label("Travel"),
    ]));
    bundler.on_bundle_click(&mut doc, "Work").unwrap();
    assert!(!doc.is_rendered(handles.rows[1]));

    doc.remove(handles.rows[0]).unwrap();
    settle(&mut doc, &mut bundler, 0);

    assert!(snapshot::find_bundle_row(&doc, "Work").is_none());
    assert_eq!(bundler.store().open_label(), None);
    assert!(doc.is_rendered(handles.rows[1]));
    assert!(!doc.is_rendered(handles.rows[2]));
}

#[test]
fn test_new_mail_moves_bundle_and_updates_content() {
    let (mut doc, mut handles, mut bundler) = start(rows(vec![
        FixtureRow::new("A", "a", "10:00"),
        FixtureRow::new("B", "b", "09:00").label("Work"),
    ]));

    let fresh = handles
        .prepend_row(&mut doc, &FixtureRow::new("N", "n", "11:00").label("Work").unread())
        .unwrap();
    let cycles = settle(&mut doc, &mut bundler, 0);

    assert!(!cycles.is_empty());
    let row = snapshot::find_bundle_row(&doc, "Work").unwrap();
    assert_eq!(doc.next_element_sibling(row), Some(fresh));
    assert_eq!(slot_text(&doc, "Work", Slot::Name), "<b>Work [2]</b>");
    assert_eq!(slot_text(&doc, "Work", Slot::Subject), "N, B");
    assert_eq!(slot_text(&doc, "Work", Slot::Date), "11:00");
    assert!(!doc.is_rendered(fresh));
    assert_eq!(snapshot::bundle_rows(&doc).len(), 1);
}

#[test]
fn test_self_triggered_cycles_converge() {
    let (mut doc, mut handles, mut bundler) = start(rows(vec![
        FixtureRow::new("A", "a", "10:00").label("Work"),
        FixtureRow::new("B", "b", "09:00").label("Travel"),
    ]));
    handles
        .prepend_row(&mut doc, &FixtureRow::new("N", "n", "11:00").label("Travel"))
        .unwrap();

    let cycles = settle(&mut doc, &mut bundler, 0);
    assert!(cycles.len() >= 2, "{:?}", cycles);
    assert!(cycles.last().unwrap().is_quiet());
    assert!(doc.take_mutations().is_empty());
    assert!(bundler.next_deadline().is_none());
}

#[test]
fn test_debounce_coalesces_a_burst_into_one_cycle() {
    let (mut doc, mut handles, mut bundler) = start(rows(vec![
        FixtureRow::new("A", "a", "10:00").label("Work"),
    ]));
    doc.take_mutations();

    for (i, ms) in [0, 40, 80].into_iter().enumerate() {
        handles
            .prepend_row(&mut doc, &FixtureRow::new(format!("S{}", i), "s", "11:00").label("Work"))
            .unwrap();
        let records = doc.take_mutations();
        assert!(bundler.observe(&mut doc, &records, at(ms)).is_none());
        assert!(bundler.tick(&mut doc, at(ms + 10)).is_none());
    }

    let stats = bundler.tick(&mut doc, at(180)).unwrap();
    assert_eq!(stats.rows, 4);
    assert!(bundler.tick(&mut doc, at(1000)).is_none());
    assert_eq!(slot_text(&doc, "Work", Slot::Name), "Work [4]");
}

#[test]
fn test_template_is_derived_once_per_engine() {
    let (mut doc, mut handles, mut bundler) = start(rows(vec![
        FixtureRow::new("A", "a", "10:00").label("Work"),
    ]));
    handles
        .prepend_row(&mut doc, &FixtureRow::new("B", "b", "11:00").label("Travel"))
        .unwrap();
    settle(&mut doc, &mut bundler, 0);

    assert_eq!(snapshot::bundle_rows(&doc).len(), 2);
    assert_eq!(bundler.context().templates.derivations(), 1);
}

#[test]
fn test_offscreen_list_is_ignored() {
    let (doc, _, bundler) = start(InboxFixture {
        rows: vec![FixtureRow::new("A", "a", "10:00").label("Work")],
        offscreen_rows: vec![FixtureRow::new("M", "m", "Jan 1").label("Spam")],
    });

    assert_eq!(bundler.store().labels(), ["Work".to_string()]);
    assert!(snapshot::find_bundle_row(&doc, "Spam").is_none());
}

#[test]
fn test_unreadable_rows_are_skipped() {
    let (mut doc, handles, mut bundler) = start(rows(vec![
        FixtureRow::new("A", "a", "10:00").label("Work"),
        FixtureRow::new("B", "b", "09:00").label("Work"),
    ]));
    let selectors = bundler.settings().selectors.clone();
    let date = doc.query(handles.rows[1], &selectors.date).unwrap();
    doc.remove(date).unwrap();

    let stats = bundler.run_cycle(&mut doc);
    assert_eq!(stats.skipped_rows, 1);
    assert_eq!(stats.errors, 0);
    assert_eq!(slot_text(&doc, "Work", Slot::Name), "Work [1]");
}

#[test]
fn test_settings_change_sender_listing() {
    let settings = BundlerSettings::from_json(
        r#"{ "max_recent_senders": 1, "sender_separator": " / " }"#,
    )
    .unwrap();
    let (mut doc, handles) = InboxBuilder::build(&rows(vec![
        FixtureRow::new("A", "a", "10:00").label("Work"),
        FixtureRow::new("B", "b", "09:00").label("Work"),
    ]))
    .unwrap();
    handles.finish_loading(&mut doc).unwrap();
    let mut bundler = Bundler::new(settings);
    bundler.start(&mut doc).unwrap();

    assert_eq!(slot_text(&doc, "Work", Slot::Subject), "A");
}

#[test]
fn test_demo_fixture() {
    let fixture: InboxFixture =
        serde_json::from_str(include_str!("../../../demos/inbox.json")).unwrap();
    let (doc, handles, bundler) = start(fixture);

    assert_eq!(
        bundler.store().labels(),
        ["Work".to_string(), "Travel".to_string(), "Finance".to_string()]
    );
    assert_eq!(slot_text(&doc, "Work", Slot::Name), "<b>Work [3]</b>");
    assert_eq!(slot_text(&doc, "Travel", Slot::Name), "<b>Travel [2]</b>");
    assert_eq!(slot_text(&doc, "Finance", Slot::Name), "Finance [2]");

    let shown: Vec<usize> = (0..handles.rows.len())
        .filter(|&i| doc.is_rendered(handles.rows[i]))
        .collect();
    assert_eq!(shown, vec![2, 6]);
}
