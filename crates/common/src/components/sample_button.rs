//! SampleButton: a link styled as a button, wrapped in a container

use once_cell::sync::Lazy;

use crate::collection::ELEMENT_COUNTER;
use crate::component::Component;
use crate::error::{Error, Result};
use crate::markup::{escape_html, Markup};
use crate::options::{OptionSchema, OptionSet};

static SCHEMA: Lazy<OptionSchema> = Lazy::new(|| {
    OptionSchema::new(SampleButton::KIND)
        .required("url")
        .required("text")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleButton {
    url: String,
    text: String,
    /// One-based position when rendered as part of a collection
    counter: Option<usize>,
}

impl SampleButton {
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            text: text.into(),
            counter: None,
        }
    }

    pub fn with_counter(mut self, counter: usize) -> Self {
        self.counter = Some(counter);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn counter(&self) -> Option<usize> {
        self.counter
    }
}

impl Component for SampleButton {
    const KIND: &'static str = "SampleButton";

    fn schema() -> &'static OptionSchema {
        &SCHEMA
    }

    fn bind(options: &OptionSet) -> Result<Self> {
        let button = Self::new(
            options.get_str(Self::KIND, "url")?,
            options.get_str(Self::KIND, "text")?,
        );
        Ok(match options.get_u64(Self::KIND, ELEMENT_COUNTER)? {
            Some(counter) => {
                let counter = usize::try_from(counter).map_err(|_| Error::InvalidOption {
                    kind: Self::KIND,
                    name: ELEMENT_COUNTER.to_string(),
                    expected: "a counter that fits in usize",
                })?;
                button.with_counter(counter)
            }
            None => button,
        })
    }

    fn render(&self) -> Markup {
        let counter = self
            .counter
            .map(|c| format!(" data-counter=\"{}\"", c))
            .unwrap_or_default();

        Markup::from_trusted(format!(
            "<div class=\"sample-button\"{counter}><a class=\"sample-button__link\" href=\"{url}\">{text}</a></div>",
            counter = counter,
            url = escape_html(&self.url),
            text = escape_html(&self.text),
        ))
    }
}
