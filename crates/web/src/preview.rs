//! Component previews
//!
//! A [`Preview`] groups named [`Scenario`]s for one component kind. Each
//! scenario declares its parameters with default values; callers may
//! override any of them. Previews are a development tool, so a failing or
//! panicking scenario is turned into a [`PreviewError`] and never reaches
//! the rest of the application.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use viewkit_common::{Markup, OptionSet};

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("no previews registered for component `{0}`")]
    UnknownComponent(String),

    #[error("component `{component}` has no preview scenario `{scenario}`")]
    UnknownScenario { component: String, scenario: String },

    #[error("render failed: {0}")]
    Render(#[from] viewkit_common::Error),

    #[error("scenario `{component}/{scenario}` panicked: {message}")]
    Panicked {
        component: String,
        scenario: String,
        message: String,
    },
}

/// How a parameter is edited in the preview UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Text,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewParam {
    pub name: &'static str,
    pub default: Value,
    pub kind: ParamKind,
}

pub type RenderFn = fn(&OptionSet) -> viewkit_common::Result<Markup>;

/// A named default parameterisation of a component
#[derive(Clone)]
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<PreviewParam>,
    render: RenderFn,
}

impl Scenario {
    pub fn new(name: &'static str, render: RenderFn) -> Self {
        Self {
            name,
            description: "",
            params: Vec::new(),
            render,
        }
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Declare a text parameter with its default
    pub fn text_param(mut self, name: &'static str, default: &str) -> Self {
        self.params.push(PreviewParam {
            name,
            default: Value::from(default),
            kind: ParamKind::Text,
        });
        self
    }

    /// Declared defaults as an option set
    pub fn defaults(&self) -> OptionSet {
        self.params
            .iter()
            .map(|p| (p.name, p.default.clone()))
            .collect()
    }

    /// Merge overrides onto the defaults; an override always wins
    pub fn arguments(&self, overrides: &OptionSet) -> OptionSet {
        self.defaults().merged(overrides)
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

/// Previews for one component kind
pub trait Preview: Send + Sync {
    /// Component kind name
    fn component(&self) -> &'static str;

    fn scenarios(&self) -> Vec<Scenario>;
}

/// All registered previews, keyed by component kind
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    components: BTreeMap<&'static str, Vec<Scenario>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: Preview>(&mut self, preview: P) {
        let scenarios = preview.scenarios();
        debug!(
            component = preview.component(),
            count = scenarios.len(),
            "registered previews"
        );
        self.components
            .entry(preview.component())
            .or_default()
            .extend(scenarios);
    }

    pub fn with<P: Preview>(mut self, preview: P) -> Self {
        self.register(preview);
        self
    }

    pub fn components(&self) -> impl Iterator<Item = (&'static str, &[Scenario])> {
        self.components.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    pub fn scenario(&self, component: &str, scenario: &str) -> Result<&Scenario, PreviewError> {
        let scenarios = self
            .components
            .get(component)
            .ok_or_else(|| PreviewError::UnknownComponent(component.to_string()))?;

        scenarios
            .iter()
            .find(|s| s.name == scenario)
            .ok_or_else(|| PreviewError::UnknownScenario {
                component: component.to_string(),
                scenario: scenario.to_string(),
            })
    }

    /// Look up a scenario, merge overrides onto its defaults and render it
    pub fn preview(
        &self,
        component: &str,
        scenario: &str,
        overrides: &OptionSet,
    ) -> Result<Markup, PreviewError> {
        let found = self.scenario(component, scenario)?;
        let arguments = found.arguments(overrides);
        let render = found.render;

        match panic::catch_unwind(AssertUnwindSafe(|| render(&arguments))) {
            Ok(Ok(markup)) => Ok(markup),
            Ok(Err(e)) => {
                warn!(component, scenario, error = %e, "preview render failed");
                Err(PreviewError::Render(e))
            }
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!(component, scenario, %message, "preview scenario panicked");
                Err(PreviewError::Panicked {
                    component: component.to_string(),
                    scenario: scenario.to_string(),
                    message,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use viewkit_common::{Component, SampleButton};

    struct Broken;

    fn render_button(args: &OptionSet) -> viewkit_common::Result<Markup> {
        viewkit_common::component::render::<SampleButton>(args)
    }

    fn explode(_: &OptionSet) -> viewkit_common::Result<Markup> {
        panic!("boom")
    }

    impl Preview for Broken {
        fn component(&self) -> &'static str {
            "Broken"
        }

        fn scenarios(&self) -> Vec<Scenario> {
            vec![
                Scenario::new("panics", explode),
                Scenario::new("missing_text", render_button).text_param("url", "#"),
            ]
        }
    }

    #[test]
    fn test_arguments_prefer_overrides() {
        let scenario = Scenario::new("default", render_button)
            .text_param("url", "#")
            .text_param("text", "Click me");

        let args = scenario.arguments(&OptionSet::new().with("text", "Buy"));
        assert_eq!(args.get_str(SampleButton::KIND, "url").unwrap(), "#");
        assert_eq!(args.get_str(SampleButton::KIND, "text").unwrap(), "Buy");
    }

    #[test]
    fn test_unknown_lookups() {
        let registry = PreviewRegistry::new().with(Broken);
        assert!(matches!(
            registry.preview("Nope", "default", &OptionSet::new()),
            Err(PreviewError::UnknownComponent(_))
        ));
        assert!(matches!(
            registry.preview("Broken", "nope", &OptionSet::new()),
            Err(PreviewError::UnknownScenario { .. })
        ));
    }

    #[test]
    fn test_render_error_is_isolated() {
        let registry = PreviewRegistry::new().with(Broken);
        let err = registry
            .preview("Broken", "missing_text", &OptionSet::new())
            .unwrap_err();
        assert!(matches!(err, PreviewError::Render(_)));
    }

    #[test]
    fn test_panic_is_caught() {
        let registry = PreviewRegistry::new().with(Broken);
        match registry.preview("Broken", "panics", &OptionSet::new()) {
            Err(PreviewError::Panicked { message, .. }) => assert_eq!(message, "boom"),
            other => panic!("expected panic error, got {:?}", other.map(|m| m.into_string())),
        }
    }
}
