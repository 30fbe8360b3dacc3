//! Step metadata export for editor tooling.
//!
//! A [`StepCatalog`] lists every registered step with its pattern, tag,
//! description, examples and an insert-text snippet with tab stops. Its JSON
//! form is what Gherkin editor extensions read for completion:
//!
//! ```json
//! { "steps": [ { "label": "I tap on {string}", "tag": "interaction",
//!                "detail": "Appium BDD Step", "documentation": "Taps on an element",
//!                "examples": ["I tap on \"~login_button\""],
//!                "insertText": "I tap on \"${1:text}\"" } ] }
//! ```

use serde::{Deserialize, Serialize};

use crate::registry::{StepRegistry, StepTag};

/// Detail line shown next to every completion item.
pub const STEP_DETAIL: &str = "Appium BDD Step";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// The pattern text.
    pub label: String,
    pub tag: StepTag,
    pub detail: String,
    pub documentation: String,
    pub examples: Vec<String>,
    pub insert_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCatalog {
    pub steps: Vec<CatalogEntry>,
}

impl StepCatalog {
    /// Catalog of every step in `registry`, in registration order.
    pub fn from_registry(registry: &StepRegistry) -> Self {
        let steps = registry
            .registrations()
            .iter()
            .map(|reg| CatalogEntry {
                label: reg.pattern().source().to_string(),
                tag: reg.metadata().tag,
                detail: STEP_DETAIL.to_string(),
                documentation: reg.metadata().description.clone(),
                examples: reg.metadata().examples.clone(),
                insert_text: reg.pattern().snippet(),
            })
            .collect();
        Self { steps }
    }

    /// Keeps only the entries with `tag`.
    pub fn filter_tag(mut self, tag: StepTag) -> Self {
        self.steps.retain(|entry| entry.tag == tag);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps;

    fn builtin() -> StepCatalog {
        let mut registry = StepRegistry::new();
        steps::register_all(&mut registry).unwrap();
        StepCatalog::from_registry(&registry)
    }

    #[test]
    fn test_catalog_covers_every_step() {
        let mut registry = StepRegistry::new();
        steps::register_all(&mut registry).unwrap();
        let catalog = StepCatalog::from_registry(&registry);
        assert_eq!(catalog.len(), registry.len());
        assert!(catalog.steps.iter().all(|s| !s.documentation.is_empty()));
        assert!(catalog.steps.iter().all(|s| !s.examples.is_empty()));
    }

    #[test]
    fn test_entry_json_shape() {
        let catalog = builtin();
        let entry = catalog
            .steps
            .iter()
            .find(|s| s.label == "I long press on {string} for {int}ms")
            .unwrap();
        let json = serde_json::to_value(entry).unwrap();
        assert_eq!(json["insertText"], "I long press on \"${1:text}\" for ${2:0}ms");
        assert_eq!(json["tag"], "gesture");
        assert_eq!(json["detail"], STEP_DETAIL);
    }

    #[test]
    fn test_filter_tag() {
        let inputs = builtin().filter_tag(StepTag::Input);
        assert_eq!(inputs.len(), 2);
        assert!(inputs.steps.iter().all(|s| s.tag == StepTag::Input));
    }

    #[test]
    fn test_examples_resolve_to_their_own_step() {
        let mut registry = StepRegistry::new();
        steps::register_all(&mut registry).unwrap();
        registry.seal();
        for reg in registry.registrations() {
            for example in &reg.metadata().examples {
                let resolved = registry.resolve(example).unwrap();
                assert_eq!(resolved.registration.id(), reg.id(), "{}", example);
            }
        }
    }
}
