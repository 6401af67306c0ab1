//! Collection rendering
//!
//! Renders one component per element of a sequence. Each element travels
//! with its zero-based position as a [`CollectionItem`]; when the item is
//! turned into an option set the element is bound as `element` and its
//! one-based counter as `element_counter`.

use serde_json::Value;
use tracing::debug;

use crate::component::Component;
use crate::error::{Error, Result};
use crate::markup::Markup;
use crate::options::OptionSet;

/// Option name the element itself is bound to
pub const ELEMENT: &str = "element";

/// Option name the one-based counter is bound to
pub const ELEMENT_COUNTER: &str = "element_counter";

/// One element of a collection plus its position
#[derive(Debug)]
pub struct CollectionItem<'a, T> {
    pub value: &'a T,
    /// Zero-based index in the input sequence
    pub position: usize,
}

impl<T> Clone for CollectionItem<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for CollectionItem<'_, T> {}

impl<'a, T> CollectionItem<'a, T> {
    pub fn new(value: &'a T, position: usize) -> Self {
        Self { value, position }
    }

    /// One-based counter; the first item has counter 1
    pub fn counter(&self) -> usize {
        self.position + 1
    }
}

impl CollectionItem<'_, OptionSet> {
    /// The element's own fields plus the implicit `element` and
    /// `element_counter` bindings
    pub fn to_options(&self) -> OptionSet {
        let mut options = self.value.clone();
        options.insert(ELEMENT, self.value.to_json());
        options.insert(ELEMENT_COUNTER, Value::from(self.counter()));
        options
    }
}

/// Pair each element with its position
pub fn items<T>(values: &[T]) -> impl Iterator<Item = CollectionItem<'_, T>> {
    values
        .iter()
        .enumerate()
        .map(|(position, value)| CollectionItem::new(value, position))
}

/// Render one `C` per option set, in input order
pub fn render_collection<C: Component>(elements: &[OptionSet]) -> Result<Vec<Markup>> {
    render_collection_with(elements, C::from_collection_item)
}

/// Render one `C` per element using an explicit per-item constructor
pub fn render_collection_with<T, C, F>(elements: &[T], build: F) -> Result<Vec<Markup>>
where
    C: Component,
    F: Fn(CollectionItem<'_, T>) -> Result<C>,
{
    debug!(kind = C::KIND, len = elements.len(), "rendering collection");

    items(elements)
        .map(|item| {
            let position = item.position;
            build(item)
                .map(|component| component.render())
                .map_err(|source| Error::CollectionItem {
                    position,
                    source: Box::new(source),
                })
        })
        .collect()
}
