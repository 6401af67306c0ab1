//! viewkit Common Library
//!
//! The component contract shared by the web application and the
//! verification harness: option schemas, component construction, collection
//! rendering and the markup model.

pub mod collection;
pub mod component;
pub mod components;
pub mod error;
pub mod markup;
pub mod options;

// Re-export commonly used types
pub use collection::{render_collection, render_collection_with, CollectionItem};
pub use component::Component;
pub use components::SampleButton;
pub use error::{Error, Result};
pub use markup::{AssertionFailure, Markup};
pub use options::{OptionSchema, OptionSet};

/// viewkit version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
