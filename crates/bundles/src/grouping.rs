//! Grouping engine
//!
//! Rebuilds every bundle from scratch out of a snapshot. Nothing is patched
//! incrementally, so no row handle outlives the cycle that read it.

use std::collections::HashMap;

use crate::models::{Bundle, MessageRow};
use crate::snapshot::Snapshot;
use crate::store::{BundleStore, Grouping};

/// Group rows by label
///
/// Rows without labels join nothing; a row with several labels joins each
/// of their bundles. Member and label order follow row order.
pub fn group_rows(rows: &[MessageRow]) -> Grouping {
    let mut bundles: HashMap<String, Bundle> = HashMap::new();
    let mut order = Vec::new();

    for row in rows {
        for label in row.label_names() {
            match bundles.get_mut(label) {
                Some(bundle) => bundle.push(row.clone()),
                None => {
                    bundles.insert(label.to_string(), Bundle::new(label, row.clone()));
                    order.push(label.to_string());
                }
            }
        }
    }

    Grouping { bundles, order }
}

/// Replace the store's membership with the snapshot's grouping
///
/// Returns the open label if it lost all its members.
pub fn recompute(store: &mut BundleStore, snapshot: &Snapshot) -> Option<String> {
    store.apply(group_rows(&snapshot.rows))
}
