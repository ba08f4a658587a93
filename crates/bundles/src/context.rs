//! Engine context
//!
//! Everything the engine keeps between cycles lives here and is passed by
//! reference to the components. It is created once per page and mutated
//! only by the cycle and the click handler.

use crate::config::BundlerSettings;
use crate::store::BundleStore;
use crate::template::TemplateCache;

/// Shared state of one bundling engine instance
#[derive(Debug, Default)]
pub struct Context {
    pub settings: BundlerSettings,
    pub store: BundleStore,
    pub templates: TemplateCache,
}

impl Context {
    pub fn new(settings: BundlerSettings) -> Self {
        Self {
            settings,
            store: BundleStore::new(),
            templates: TemplateCache::new(),
        }
    }
}
