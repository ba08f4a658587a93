//! Domain models for bundling

mod bundle;
mod row;

pub use bundle::Bundle;
pub use row::{LabelChip, LabelColors, MessageRow};
