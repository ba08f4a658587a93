//! bundle-replay - Replay a recorded inbox through the bundling engine
//!
//! Builds an in-memory inbox from a fixture, attaches the engine, lets the
//! host finish loading, applies bundle clicks and prints the resulting list.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use bundles::host::Document;
use bundles::{
    Bundler, BundlerSettings, CycleStats, InboxBuilder, InboxFixture, InboxHandles, MemoryDocument,
    Slot, snapshot,
};
use chrono::{DateTime, Utc};
use clap::Parser;
use log::{debug, error, info, warn};

/// Upper bound on debounce rounds before giving up on quiescence
const MAX_ROUNDS: usize = 16;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Inbox fixture (JSON) to replay
    #[arg(long)]
    fixture: PathBuf,

    /// Click a bundle row; repeat to click several in order
    #[arg(long = "click", value_name = "LABEL")]
    clicks: Vec<String>,

    /// Override the debounce window in milliseconds
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Settings file to use instead of the config directory
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = run(Args::parse()) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut settings = load_settings(&args)?;
    if let Some(ms) = args.debounce_ms {
        settings.debounce_ms = ms;
    }

    let fixture: InboxFixture = config::load_json_file(&args.fixture)
        .with_context(|| format!("Failed to load fixture {}", args.fixture.display()))?;
    info!(
        "Replaying {} rows ({} offscreen) from {}",
        fixture.rows.len(),
        fixture.offscreen_rows.len(),
        args.fixture.display()
    );

    let (mut doc, handles) = InboxBuilder::build(&fixture)?;
    let mut bundler = Bundler::new(settings);
    let mut clock = Utc::now();
    let mut cycles = Vec::new();

    if bundler.start(&mut doc).is_some() {
        bail!("Engine ran before the host finished loading");
    }
    handles.finish_loading(&mut doc)?;
    cycles.extend(settle(&mut doc, &mut bundler, &mut clock)?);

    for label in &args.clicks {
        if !bundler.store().contains(label) {
            warn!("No bundle named {:?}; skipping click", label);
            continue;
        }
        let Some(row) = snapshot::find_bundle_row(&doc, label) else {
            warn!("Bundle {:?} has no row; skipping click", label);
            continue;
        };
        let Some(bound) = doc.click(row) else {
            warn!("Bundle row {:?} has no click binding", label);
            continue;
        };
        info!("Clicking bundle {:?}", bound);
        bundler.on_bundle_click(&mut doc, &bound)?;
        cycles.extend(settle(&mut doc, &mut bundler, &mut clock)?);
    }

    print_list(&doc, &handles, &bundler);
    print_cycles(&cycles);
    Ok(())
}

fn load_settings(args: &Args) -> Result<BundlerSettings> {
    match &args.config {
        Some(path) => Ok(BundlerSettings::from_file(path)?.with_env_overrides()),
        None => {
            if let Err(e) = config::init() {
                warn!("Failed to initialize config directory: {}", e);
            }
            BundlerSettings::load()
        }
    }
}

/// Deliver pending mutations and fire due cycles until the engine is idle
fn settle(
    doc: &mut MemoryDocument,
    bundler: &mut Bundler,
    clock: &mut DateTime<Utc>,
) -> Result<Vec<CycleStats>> {
    let mut cycles = Vec::new();
    for round in 0..MAX_ROUNDS {
        let records = doc.take_mutations();
        debug!("Round {}: {} mutation records", round, records.len());
        if let Some(stats) = bundler.observe(doc, &records, *clock) {
            cycles.push(stats);
        }
        let Some(deadline) = bundler.next_deadline() else {
            return Ok(cycles);
        };
        *clock = deadline;
        if let Some(stats) = bundler.tick(doc, *clock) {
            cycles.push(stats);
        }
    }
    bail!("Engine still writing after {} rounds", MAX_ROUNDS)
}

fn print_list(doc: &MemoryDocument, handles: &InboxHandles, bundler: &Bundler) {
    let selectors = &bundler.settings().selectors;
    println!();
    for node in doc.child_elements(handles.body) {
        if let Some(label) = snapshot::bundle_rows(doc)
            .into_iter()
            .find(|(_, row)| *row == node)
            .map(|(label, _)| label)
        {
            let slot = |slot: Slot| {
                doc.query(node, &slot.selector())
                    .map(|n| doc.text_content(n))
                    .unwrap_or_default()
            };
            let marker = if bundler.store().is_open(&label) { "v" } else { ">" };
            println!(
                "{} {:<24} {:<40} {}",
                marker,
                slot(Slot::Name),
                slot(Slot::Subject),
                slot(Slot::Date)
            );
            continue;
        }

        let state = if doc.is_rendered(node) { " " } else { "-" };
        match snapshot::read_row(doc, node, selectors) {
            Ok(row) => {
                let labels: Vec<&str> = row.label_names().collect();
                println!(
                    "{}   {:<22} {:<40} {} [{}]",
                    state,
                    row.sender,
                    row.subject,
                    row.date,
                    labels.join(", ")
                );
            }
            Err(e) => println!("{}   <unreadable row: {}>", state, e),
        }
    }
    println!();
}

fn print_cycles(cycles: &[CycleStats]) {
    println!("{} cycles:", cycles.len());
    for (i, stats) in cycles.iter().enumerate() {
        println!(
            "  #{:<2} rows={} skipped={} bundles={} inserted={} updated={} removed={} moved={} visibility={} errors={} ({}ms)",
            i + 1,
            stats.rows,
            stats.skipped_rows,
            stats.bundles,
            stats.inserted,
            stats.updated,
            stats.removed,
            stats.repositioned,
            stats.visibility_changed,
            stats.errors,
            stats.duration_ms
        );
    }
}
