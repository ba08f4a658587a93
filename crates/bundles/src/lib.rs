//! Bundles crate - Inbox bundling for a webmail client's message list
//!
//! This crate groups the messages visible in a webmail inbox by label and
//! presents each group as a single collapsible bundle row inserted into the
//! host's own list:
//! - Host boundary (the `Document` trait, an in-memory implementation and
//!   inbox fixtures)
//! - Snapshot reading and grouping by label
//! - Bundle row templating and rendering
//! - Row visibility and open/close toggling
//! - Debounced change detection
//!
//! The crate never owns the host tree. Every cycle re-reads it and writes
//! back only what differs, so the host stays free to re-render at any time.

pub mod config;
pub mod context;
pub mod detector;
pub mod engine;
pub mod grouping;
pub mod host;
pub mod markers;
pub mod models;
pub mod render;
pub mod snapshot;
pub mod store;
pub mod template;
pub mod visibility;

pub use crate::config::{BundlerSettings, HostSelectors, TemplateRules};
pub use context::Context;
pub use detector::{ChangeDetector, Debouncer, Phase, Trigger};
pub use engine::{Bundler, CycleStats};
pub use host::{
    Document, FixtureLabel, FixtureRow, HostError, InboxBuilder, InboxFixture, InboxHandles,
    MemoryDocument, MutationKind, MutationRecord, NodeId, Position, Selector, VElement, VNode,
};
pub use models::{Bundle, LabelChip, LabelColors, MessageRow};
pub use snapshot::Snapshot;
pub use store::BundleStore;
pub use template::{Slot, Template, TemplateCache};
