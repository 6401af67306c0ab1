//! viewkit Web Application
//!
//! Hosts the `/sample` page and the component preview pages.

pub mod config;
pub mod layout;
pub mod preview;
pub mod previews;
pub mod server;

pub use config::WebConfig;
pub use preview::{Preview, PreviewError, PreviewRegistry, Scenario};
pub use server::WebServer;
