//! Preview scenarios for the shipped components

use viewkit_common::component::render;
use viewkit_common::{Component, Markup, OptionSet, SampleButton};

use crate::preview::{Preview, PreviewRegistry, Scenario};

pub struct SampleButtonPreview;

fn render_sample_button(args: &OptionSet) -> viewkit_common::Result<Markup> {
    render::<SampleButton>(args)
}

impl Preview for SampleButtonPreview {
    fn component(&self) -> &'static str {
        SampleButton::KIND
    }

    fn scenarios(&self) -> Vec<Scenario> {
        vec![Scenario::new("default", render_sample_button)
            .describe("Link button with a label")
            .text_param("url", "#")
            .text_param("text", "Click me")]
    }
}

/// Registry with every shipped preview
pub fn registry() -> PreviewRegistry {
    PreviewRegistry::new().with(SampleButtonPreview)
}
