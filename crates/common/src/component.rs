//! The component contract
//!
//! A component kind is a plain struct. Its options are declared once in a
//! static [`OptionSchema`]; [`Component::from_options`] validates a supplied
//! [`OptionSet`] against that schema before [`Component::bind`] ever sees it,
//! so a half-bound instance is never observable.

use crate::collection::CollectionItem;
use crate::error::Result;
use crate::markup::Markup;
use crate::options::{OptionSchema, OptionSet};

pub trait Component: Sized + Send + Sync {
    /// Component kind name, e.g. `SampleButton`
    const KIND: &'static str;

    /// Options this kind accepts
    fn schema() -> &'static OptionSchema;

    /// Bind a validated, default-resolved option set
    fn bind(options: &OptionSet) -> Result<Self>;

    /// Render to markup. Must depend only on the bound attributes.
    fn render(&self) -> Markup;

    /// Validate `options` against the schema, then bind
    fn from_options(options: &OptionSet) -> Result<Self> {
        let resolved = Self::schema().resolve(options)?;
        Self::bind(&resolved)
    }

    /// Construct from one element of a collection
    fn from_collection_item(item: CollectionItem<'_, OptionSet>) -> Result<Self> {
        Self::from_options(&item.to_options())
    }
}

/// Construct and render in one step
pub fn render<C: Component>(options: &OptionSet) -> Result<Markup> {
    Ok(C::from_options(options)?.render())
}
