//! Template synthesizer
//!
//! Bundle rows are built from a copy of a real message row so they pick up
//! the host's layout and styling for free. The copy is taken once, scrubbed
//! of anything the host could mistake for a real message, and kept for the
//! rest of the page lifetime.

use log::info;

use crate::config::{BundlerSettings, HostSelectors, TemplateRules};
use crate::host::{Document, HostError, NodeId, Selector, VElement, format_style, parse_style};
use crate::markers::{self, BUNDLE_CLASS, LABEL_ATTRIBUTE, SLOT_ATTRIBUTE};
use crate::models::LabelColors;
use crate::snapshot;

/// Named content slots of a bundle row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Label name and member count
    Name,
    /// Most recent senders
    Subject,
    /// Date of the most recent member
    Date,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::Name, Slot::Subject, Slot::Date];

    /// Value of the slot attribute
    pub fn key(self) -> &'static str {
        match self {
            Slot::Name => "name",
            Slot::Subject => "subject",
            Slot::Date => "date",
        }
    }

    pub fn selector(self) -> Selector {
        Selector::attribute_equals(SLOT_ATTRIBUTE, self.key())
    }

    /// Host structure the slot replaces
    fn source(self, selectors: &HostSelectors) -> &Selector {
        match self {
            Slot::Name => &selectors.sender_region,
            Slot::Subject => &selectors.subject_region,
            Slot::Date => &selectors.date,
        }
    }
}

/// Skeleton of a bundle row with its slots marked and emptied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    skeleton: VElement,
}

impl Template {
    /// Build a template from a deep copy of the real row `source`
    pub fn derive(
        source: NodeId,
        mut row: VElement,
        selectors: &HostSelectors,
        rules: &TemplateRules,
    ) -> Result<Self, HostError> {
        row.walk_mut(&mut |element| {
            element.attributes.retain(|(name, _)| !strips_attribute(rules, name));
        });

        row.remove_descendants(&|element: &VElement| {
            rules
                .strip_classes
                .iter()
                .any(|class| element.has_class(class))
        });

        for slot in Slot::ALL {
            let source_selector = slot.source(selectors);
            let target = row
                .find_mut(&|element: &VElement| source_selector.matches_element(element))
                .ok_or_else(|| HostError::MissingStructure {
                    node: source,
                    what: format!("{} slot ({})", slot.key(), source_selector),
                })?;
            target.set_attribute(SLOT_ATTRIBUTE, slot.key());
            target.children.clear();
        }

        row.walk_mut(&mut |element| {
            if rules
                .cell_tags
                .iter()
                .any(|tag| tag.eq_ignore_ascii_case(&element.tag))
            {
                element.tag = "div".to_string();
            }
        });
        row.tag = "div".to_string();
        row.set_attribute("class", BUNDLE_CLASS);

        // The source row may currently be hidden
        let mut style = parse_style(row.attribute("style").unwrap_or_default());
        style.retain(|(prop, _)| prop != "display");
        if style.is_empty() {
            row.remove_attribute("style");
        } else {
            row.set_attribute("style", format_style(&style));
        }

        Ok(Self { skeleton: row })
    }

    pub fn skeleton(&self) -> &VElement {
        &self.skeleton
    }

    /// A fresh bundle row for `label`, slots still empty
    pub fn instantiate(&self, label: &str, colors: &LabelColors) -> VElement {
        let mut row = self.skeleton.clone();
        row.set_attribute(
            "class",
            format!("{} {}", BUNDLE_CLASS, markers::label_class(label)),
        );
        row.set_attribute(LABEL_ATTRIBUTE, label);

        let name_slot = Slot::Name.selector();
        if let Some(name) = row.find_mut(&|element: &VElement| name_slot.matches_element(element)) {
            let mut style = parse_style(name.attribute("style").unwrap_or_default());
            style.retain(|(prop, _)| prop != "background-color" && prop != "color");
            style.push(("background-color".to_string(), colors.background.clone()));
            style.push(("color".to_string(), colors.foreground.clone()));
            name.set_attribute("style", format_style(&style));
        }
        row
    }
}

fn strips_attribute(rules: &TemplateRules, name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    rules.strip_attributes.iter().any(|a| a.eq_ignore_ascii_case(&name))
        || rules
            .strip_attribute_prefixes
            .iter()
            .any(|prefix| name.starts_with(&prefix.to_ascii_lowercase()))
}

/// Process-wide cache of the derived template
#[derive(Debug, Default)]
pub struct TemplateCache {
    template: Option<Template>,
    derivations: usize,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&Template> {
        self.template.as_ref()
    }

    /// How many times a template was actually derived
    pub fn derivations(&self) -> usize {
        self.derivations
    }

    /// Derive the template from the last row of `list` unless already cached
    ///
    /// A failed derivation caches nothing and is retried on the next call.
    pub fn ensure(
        &mut self,
        doc: &dyn Document,
        list: NodeId,
        settings: &BundlerSettings,
    ) -> Result<&Template, HostError> {
        if self.template.is_none() {
            // The last row avoids styling the host only applies to the top of the list
            let source = snapshot::row_nodes(doc, list, &settings.selectors)
                .last()
                .copied()
                .ok_or(HostError::NoTemplateSource)?;
            let clone = doc
                .snapshot_element(source)
                .ok_or(HostError::Detached(source))?;
            let template = Template::derive(source, clone, &settings.selectors, &settings.template)?;
            info!("Derived bundle template from row {}", source);
            self.derivations += 1;
            self.template = Some(template);
        }
        self.template.as_ref().ok_or(HostError::NoTemplateSource)
    }
}
