//! Classes and attributes the engine writes into the host tree

/// Class on every synthetic bundle row
pub const BUNDLE_CLASS: &str = "gb-bundle";

/// Attribute holding the label a synthetic row is bound to
pub const LABEL_ATTRIBUTE: &str = "data-bundle";

/// Attribute naming a template slot inside a synthetic row
pub const SLOT_ATTRIBUTE: &str = "data-bundle-slot";

/// Class on real rows that belong to at least one bundle
pub const BUNDLED_CLASS: &str = "gb-bundled";

/// Class on real rows hidden by the visibility engine
pub const HIDDEN_CLASS: &str = "gb-hidden";

/// Class suffix for a label: lowercase alphanumerics, everything else `-`
pub fn label_class(label: &str) -> String {
    let slug: String = label
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    format!("{}-{}", BUNDLE_CLASS, slug)
}
